//! End-to-end channel service scenarios driven through dispatch.

mod common;

use common::*;
use srvx_ng::actions::Action;
use srvx_ng::chanserv::{self, model::UL_OWNER};
use srvx_ng::state::TimerEvent;

#[test]
fn register_creates_ownership_and_joins_bot() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    join(&mut w, "Alice", "#chan");
    op(&mut w, "Alice", "#chan");

    let actions = cs(&mut w, "Alice", "register #chan");
    assert!(has_key(&actions, "CSMSG_REG_SUCCESS"));

    let reg = w.chanserv.channels.get("#chan").expect("registered");
    assert_eq!(reg.users.get("Alice").unwrap().access, UL_OWNER);
    assert!(reg.users.get("Alice").unwrap().present);
    assert!(actions.iter().any(|a| matches!(
        a,
        Action::BotJoin { channel, op: true, .. } if channel == "#chan"
    )));
    // The owner's account back-links the channel.
    assert!(w
        .accounts
        .get("Alice")
        .unwrap()
        .channels
        .iter()
        .any(|c| c == "#chan"));
}

#[test]
fn register_refused_without_ops_or_for_registered_channel() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    join(&mut w, "Alice", "#chan");

    // Not opped yet.
    let actions = cs(&mut w, "Alice", "register #chan");
    assert!(has_key(&actions, "CSMSG_MUST_BE_OPPED"));

    op(&mut w, "Alice", "#chan");
    cs(&mut w, "Alice", "register #chan");

    connect_authed(&mut w, "Eve", "Eve");
    join(&mut w, "Eve", "#chan");
    let actions = cs(&mut w, "Eve", "register #chan");
    assert!(has_key(&actions, "CSMSG_ALREADY_REGGED"));
}

#[test]
fn timed_ban_schedules_and_triggers_on_join() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#foo");

    let actions = cs(&mut w, "Alice", "addban #foo *!*@evil.example 1h they spam");
    assert!(has_key(&actions, "CSMSG_TIMED_BAN_ADDED"));
    let expires = w.now + 3600;
    assert!(w.timers.contains(Some(expires), |ev| matches!(
        ev,
        TimerEvent::BanExpire { channel, mask }
            if channel == "#foo" && mask == "*!*@evil.example"
    )));

    // The matching joiner is banned and kicked with "(owner) reason".
    connect(&mut w, "bad", "~x", "evil.example");
    w.user_joined("bad", "#foo");
    let actions = w.take_actions();
    assert!(actions.iter().any(|a| matches!(
        a,
        Action::Kick { channel, nick, reason }
            if channel == "#foo" && nick == "bad" && reason == "(Alice) they spam"
    )));
    assert!(actions.iter().any(|a| matches!(
        a,
        Action::Mode { channel, change }
            if channel == "#foo" && change.contains("+b")
    )));
    let reg = w.chanserv.channels.get("#foo").unwrap();
    assert_eq!(reg.bans[0].mask, "*!*@evil.example");
    assert_eq!(reg.bans[0].triggered, w.now);
    // The kick removed the member.
    assert!(!w.channels.get("#foo").unwrap().members.contains("bad"));
}

#[test]
fn broader_ban_replaces_narrower_and_cancels_its_timer() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#foo");

    cs(&mut w, "Alice", "addtimedban #foo *!*@a.b 30m spam");
    assert!(w
        .timers
        .contains(None, |ev| matches!(ev, TimerEvent::BanExpire { .. })));

    let actions = cs(&mut w, "Alice", "addban #foo *!*@*.b widen it");
    assert!(has_key(&actions, "CSMSG_BAN_ADDED"));
    let reg = w.chanserv.channels.get("#foo").unwrap();
    assert_eq!(reg.bans.len(), 1);
    assert_eq!(reg.bans[0].mask, "*!*@*.b");
    assert_eq!(reg.bans[0].expires, 0);
    assert!(!w
        .timers
        .contains(None, |ev| matches!(ev, TimerEvent::BanExpire { .. })));
}

#[test]
fn alias_binding_expands_and_dispatches() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#chan");
    connect_authed(&mut w, "Bob", "Bob");

    w.modcmd
        .bind_alias("chanserv", "addowner", &["*ChanServ.adduser", "$1", "owner"])
        .unwrap();

    // A security-override helper outranks owners and may add at 500.
    connect_staff(&mut w, "Helper", "Helper", 600);
    let actions = cs(&mut w, "Helper", "addowner #chan Bob");
    assert!(
        has_key(&actions, "CSMSG_ADDED_USER"),
        "got {:?}",
        reply_keys(&actions)
    );
    let reg = w.chanserv.channels.get("#chan").unwrap();
    assert_eq!(reg.users.get("Bob").unwrap().access, 500);
}

#[test]
fn protected_deop_bounces_and_deops_aggressor() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#foo");
    connect_authed(&mut w, "Bob", "Bob");
    let now = w.now;
    srvx_ng::chanserv::users::add_channel_user(&mut w, "#foo", "Bob", 500, now);
    join(&mut w, "Bob", "#foo");
    w.mode_changed("Alice", "#foo", &["+o", "Bob"]);
    w.take_actions();

    // Equal-or-lower access is protected.
    w.chanserv.channels.get_mut("#foo").unwrap().ch_opts[chanserv::model::CH_PROTECT] = 'e';

    w.mode_changed("Alice", "#foo", &["-o", "Bob"]);
    let actions = w.take_actions();
    assert!(has_key(&actions, "CSMSG_USER_PROTECTED"));
    let bounce = actions
        .iter()
        .find_map(|a| match a {
            Action::Mode { channel, change } if channel == "#foo" => Some(change.clone()),
            _ => None,
        })
        .expect("bounce mode change");
    // The aggressor loses ops in the same change that restores Bob.
    assert_eq!(bounce, "-o+o Alice Bob");
    let chan = w.channels.get("#foo").unwrap();
    assert!(!chan.is_op("Alice"));
    assert!(chan.is_op("Bob"));
}

#[test]
fn unregister_requires_confirmation_token() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#foo");
    cs(&mut w, "Alice", "addtimedban #foo *!*@x.y 1h spam");

    let actions = cs(&mut w, "Alice", "unregister #foo");
    let token = chanserv::confirmation_token("Alice", "#foo");
    let confirm = reply_text(&actions, "CSMSG_CONFIRM_UNREG").expect("confirm prompt");
    assert!(confirm.contains(&token));
    assert!(w.chanserv.channels.contains("#foo"));

    let actions = cs(&mut w, "Alice", &format!("unregister #foo {}", token));
    assert!(has_key(&actions, "CSMSG_UNREG_SUCCESS"));
    assert!(!w.chanserv.channels.contains("#foo"));
    // Records and timers went with the registration.
    assert!(w.accounts.get("Alice").unwrap().channels.is_empty());
    assert!(!w
        .timers
        .contains(None, |ev| matches!(ev, TimerEvent::BanExpire { .. })));
    assert_eq!(w.chanserv.user_count, 0);
    assert_eq!(w.chanserv.ban_count, 0);
}

#[test]
fn suspension_blanks_presence_and_lifts_on_expiry() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#foo");
    connect_staff(&mut w, "Staff", "Staff", 600);

    let actions = cs(&mut w, "Staff", "csuspend #foo 1h being bad");
    assert!(has_key(&actions, "CSMSG_SUSPENDED"));
    let reg = w.chanserv.channels.get("#foo").unwrap();
    assert!(reg.is_suspended());
    assert!(!reg.users.get("Alice").unwrap().present);
    assert!(actions
        .iter()
        .any(|a| matches!(a, Action::BotPart { channel, .. } if channel == "#foo")));

    // Commands in the suspended channel are refused for plain users.
    let actions = cs(&mut w, "Alice", "users #foo");
    assert!(has_key(&actions, "MCMSG_CHAN_SUSPENDED"));

    // Let the suspension run out.
    w.now += 3601;
    srvx_ng::reactor::run_due_timers(&mut w);
    let reg = w.chanserv.channels.get("#foo").unwrap();
    assert!(!reg.is_suspended());
    assert!(reg.users.get("Alice").unwrap().present);
}

#[test]
fn dnr_blocks_registration_until_removed() {
    let mut w = boot_world();
    connect_staff(&mut w, "Staff", "Staff", 600);
    let actions = cs(&mut w, "Staff", "noregister #bad* 1h spam farm");
    assert!(
        has_key(&actions, "CSMSG_NOREGISTER_CHANNEL"),
        "got {:?}",
        reply_keys(&actions)
    );

    connect_authed(&mut w, "Alice", "Alice");
    join(&mut w, "Alice", "#badchan");
    op(&mut w, "Alice", "#badchan");
    let actions = cs(&mut w, "Alice", "register #badchan");
    assert!(has_key(&actions, "CSMSG_DNR_CHANNEL"));
    assert!(!w.chanserv.channels.contains("#badchan"));

    let actions = cs(&mut w, "Staff", "allowregister #bad*");
    assert!(has_key(&actions, "CSMSG_DNR_REMOVED"));
    let actions = cs(&mut w, "Alice", "register #badchan");
    assert!(has_key(&actions, "CSMSG_REG_SUCCESS"));
}

#[test]
fn giveownership_demotes_and_transfers() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#foo");
    connect_authed(&mut w, "Bob", "Bob");

    let token = chanserv::confirmation_token("Alice", "#foo");
    let actions = cs(&mut w, "Alice", "giveownership #foo Bob");
    assert!(has_key(&actions, "CSMSG_CONFIRM_GIVEOWNERSHIP"));

    let actions = cs(&mut w, "Alice", &format!("giveownership #foo Bob {}", token));
    assert!(has_key(&actions, "CSMSG_OWNERSHIP_GIVEN"));
    let reg = w.chanserv.channels.get("#foo").unwrap();
    assert_eq!(reg.users.get("Bob").unwrap().access, 500);
    assert_eq!(reg.users.get("Alice").unwrap().access, 400);
    assert_eq!(reg.owner_transfer, w.now);
}

#[test]
fn notes_respect_types_and_visibility() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#foo");
    connect_staff(&mut w, "Staff", "Staff", 900);

    let actions = cs(&mut w, "Staff", "createnote topic channel 300 all 200");
    assert!(
        has_key(&actions, "CSMSG_NOTE_CREATED"),
        "got {:?}",
        reply_keys(&actions)
    );

    let actions = cs(&mut w, "Alice", "note #foo topic Weekly meeting Fridays");
    assert!(has_key(&actions, "CSMSG_NOTE_SET"));
    assert_eq!(w.chanserv.note_types.get("topic").unwrap().refs, 1);

    // In-use types need force to delete.
    let actions = cs(&mut w, "Staff", "removenote topic");
    assert!(has_key(&actions, "CSMSG_NOTE_TYPE_USED"));
    let actions = cs(&mut w, "Staff", "removenote topic force");
    assert!(has_key(&actions, "CSMSG_NOTE_DELETED"));
    assert!(w
        .chanserv
        .channels
        .get("#foo")
        .unwrap()
        .notes
        .is_empty());
}
