//! The quantified properties: list consistency, timer backing, expiry
//! rules and presence tracking.

mod common;

use common::*;
use srvx_ng::chanserv::model::{CHANNEL_NODELETE, UL_MASTER};
use srvx_ng::chanserv::users::{add_channel_user, del_channel_user};
use srvx_ng::state::TimerEvent;

#[test]
fn access_records_live_in_both_lists() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#a");
    register_channel(&mut w, "Alice", "#b");
    connect_authed(&mut w, "Bob", "Bob");
    let now = w.now;
    add_channel_user(&mut w, "#a", "Bob", 200, now);
    add_channel_user(&mut w, "#b", "Bob", 300, now);

    // Every record appears in its channel's list and its account's
    // back-list.
    for chan in ["#a", "#b"] {
        assert!(w.chanserv.channels.get(chan).unwrap().users.contains("Bob"));
        assert!(w
            .accounts
            .get("Bob")
            .unwrap()
            .channels
            .iter()
            .any(|c| c == chan));
    }
    assert_eq!(w.chanserv.user_count, 4);

    // One removal updates both sides.
    del_channel_user(&mut w, "#a", "Bob");
    assert!(!w.chanserv.channels.get("#a").unwrap().users.contains("Bob"));
    assert!(!w
        .accounts
        .get("Bob")
        .unwrap()
        .channels
        .iter()
        .any(|c| c == "#a"));
    assert!(w.chanserv.channels.get("#b").unwrap().users.contains("Bob"));
    assert_eq!(w.chanserv.user_count, 3);
}

#[test]
fn every_timed_ban_is_backed_by_a_timer() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#a");
    cs(&mut w, "Alice", "addtimedban #a *!*@one.example 1h x");
    cs(&mut w, "Alice", "addtimedban #a *!*@two.example 2h x");
    cs(&mut w, "Alice", "addban #a *!*@perm.example x");

    let reg = w.chanserv.channels.get("#a").unwrap().clone();
    for ban in &reg.bans {
        if ban.expires > 0 {
            assert!(
                w.timers.contains(Some(ban.expires), |ev| matches!(
                    ev,
                    TimerEvent::BanExpire { channel, mask }
                        if channel == "#a" && mask == &ban.mask
                )),
                "no timer backing {}",
                ban.mask
            );
        }
    }

    // Firing the timer removes the record.
    w.now += 3601;
    srvx_ng::reactor::run_due_timers(&mut w);
    let reg = w.chanserv.channels.get("#a").unwrap();
    assert!(!reg.bans.iter().any(|b| b.mask == "*!*@one.example"));
    assert!(reg.bans.iter().any(|b| b.mask == "*!*@two.example"));
    assert!(reg.bans.iter().any(|b| b.mask == "*!*@perm.example"));
}

#[test]
fn expiry_sweep_honors_presence_and_nodelete() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    connect_authed(&mut w, "Bob", "Bob");
    connect_authed(&mut w, "Carol", "Carol");
    register_channel(&mut w, "Alice", "#stale");
    register_channel(&mut w, "Bob", "#active");
    register_channel(&mut w, "Carol", "#guarded");

    let delay = w.conf.chanserv.channel_expire_delay;
    w.now += delay + 10;

    // Nobody qualifying is present in #stale.
    w.user_parted("Alice", "#stale");
    w.take_actions();

    // Bob stays present at owner level in #active; Carol's channel is
    // protected outright.
    w.chanserv
        .channels
        .get_mut("#guarded")
        .unwrap()
        .flags |= CHANNEL_NODELETE;
    w.user_parted("Carol", "#guarded");
    w.take_actions();

    let expired = srvx_ng::chanserv::expire::channel_expire_sweep(&mut w);
    assert_eq!(expired, 1);
    assert!(!w.chanserv.channels.contains("#stale"));
    assert!(w.chanserv.channels.contains("#active"));
    assert!(w.chanserv.channels.contains("#guarded"));
}

#[test]
fn bot_accounts_do_not_keep_channels_alive() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#botland");
    connect_authed(&mut w, "Robo", "Robo");
    let now = w.now;
    add_channel_user(&mut w, "#botland", "Robo", UL_MASTER, now);
    join(&mut w, "Robo", "#botland");
    w.accounts.get_mut("Robo").unwrap().flags |= srvx_ng::accounts::HANDLE_BOT;

    w.user_parted("Alice", "#botland");
    w.take_actions();
    w.now += w.conf.chanserv.channel_expire_delay + 10;
    let expired = srvx_ng::chanserv::expire::channel_expire_sweep(&mut w);
    assert_eq!(expired, 1);
    assert!(!w.chanserv.channels.contains("#botland"));
}

#[test]
fn presence_follows_join_part_auth_and_kick() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#p");
    connect_authed(&mut w, "Bob", "Bob");
    let now = w.now;
    add_channel_user(&mut w, "#p", "Bob", 300, now);

    let present = |w: &srvx_ng::state::World| {
        w.chanserv
            .channels
            .get("#p")
            .unwrap()
            .users
            .get("Bob")
            .unwrap()
            .present
    };
    assert!(!present(&w));
    join(&mut w, "Bob", "#p");
    assert!(present(&w));
    w.user_parted("Bob", "#p");
    w.take_actions();
    assert!(!present(&w));

    // Authentication after join picks the membership up.
    connect(&mut w, "bob2", "b", "b2.example");
    w.user_joined("bob2", "#p");
    w.take_actions();
    assert!(!present(&w));
    w.user_authed("bob2", "Bob");
    w.take_actions();
    assert!(present(&w));

    w.user_kicked("bob2", "#p");
    w.take_actions();
    assert!(!present(&w));
}

#[test]
fn join_updates_seen_and_visited() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#seen");
    w.user_parted("Alice", "#seen");
    w.take_actions();

    let before = w.chanserv.channels.get("#seen").unwrap().visited;
    w.now += 5000;
    join(&mut w, "Alice", "#seen");
    let reg = w.chanserv.channels.get("#seen").unwrap();
    assert_eq!(reg.users.get("Alice").unwrap().seen, w.now);
    assert!(reg.visited > before);
}
