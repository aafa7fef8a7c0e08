//! Database round-trips through the real flush path: tempfile-and-
//! rename, the channel layout, and reload into a fresh world.

mod common;

use common::*;
use srvx_ng::chanserv::model::{NoteAccess, CHANNEL_NODELETE};
use srvx_ng::recdb::{self, DbExt};
use srvx_ng::state::TimerEvent;

fn conf_with_db(dir: &std::path::Path) -> String {
    format!(
        concat!(
            "\"services\" {{\n",
            "    \"chanserv\" {{ \"nick\" \"ChanServ\"; }};\n",
            "    \"opserv\" {{ \"nick\" \"OpServ\"; \"privileged\" \"1\"; }};\n",
            "}};\n",
            "\"dbs\" {{\n",
            "    \"mondo\" {{ \"frequency\" \"0\"; }};\n",
            "    \"ChanServ\" {{ \"filename\" \"{}/chanserv.db\"; \"frequency\" \"0\"; }};\n",
            "}};\n",
        ),
        dir.display()
    )
}

fn populate(w: &mut srvx_ng::state::World) {
    connect_authed(w, "Alice", "Alice");
    register_channel(w, "Alice", "#keep");
    connect_authed(w, "Bob", "Bob");
    srvx_ng::chanserv::users::add_channel_user(w, "#keep", "Bob", 200, w.now - 50);
    cs(w, "Alice", "addtimedban #keep *!*@timed.example 2h flooding");
    cs(w, "Alice", "addban #keep *!*@perm.example bye");
    cs(w, "Alice", "set #keep greeting Welcome aboard");
    cs(w, "Alice", "set #keep topicmask *official*");
    connect_staff(w, "Staff", "Staff", 900);
    cs(w, "Staff", "createnote url channel 200 all 100");
    cs(w, "Alice", "note #keep url https://keep.example");
    cs(w, "Staff", "noregister #banned* 0 spam farm");
    cs(w, "Staff", "csuspend #keep 0 investigation");
}

#[test]
fn chanserv_database_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let conf = conf_with_db(dir.path());
    let mut w = boot_world_with(&conf);
    populate(&mut w);
    assert!(srvx_ng::saxdb::flush(&w, "ChanServ"));

    // The raw file parses and carries the expected sections.
    let text = std::fs::read_to_string(dir.path().join("chanserv.db")).unwrap();
    let raw = recdb::parse_database(&text).unwrap();
    let channels = raw.get_object("channels").unwrap();
    let keep = channels.get_object("#keep").unwrap();
    assert!(keep.get_object("options").unwrap().get_u64("flags").is_some());
    assert_eq!(
        keep.get_object("users")
            .unwrap()
            .get_object("Alice")
            .unwrap()
            .get_u64("level"),
        Some(500)
    );
    assert!(raw.get_object("dnr").unwrap().get_object("#banned*").is_some());
    assert!(raw.get_object("note_types").unwrap().get_object("url").is_some());

    // A fresh world loads the same state back.
    let mut w2 = boot_world_with(&conf);
    let reg = w2.chanserv.channels.get("#keep").expect("reloaded");
    assert_eq!(reg.users.get("Alice").unwrap().access, 500);
    assert_eq!(reg.users.get("Bob").unwrap().access, 200);
    assert_eq!(reg.greeting.as_deref(), Some("Welcome aboard"));
    assert_eq!(reg.topic_mask.as_deref(), Some("*official*"));
    assert!(reg.is_suspended());
    assert_eq!(
        reg.suspended.as_ref().unwrap().reason,
        "investigation"
    );
    assert_eq!(reg.bans.len(), 2);
    let timed = reg
        .bans
        .iter()
        .find(|b| b.mask == "*!*@timed.example")
        .unwrap();
    assert!(timed.expires > 0);
    // The loaded timed ban is backed by a timer again.
    assert!(w2.timers.contains(Some(timed.expires), |ev| matches!(
        ev,
        TimerEvent::BanExpire { channel, mask }
            if channel == "#keep" && mask == "*!*@timed.example"
    )));
    let ty = w2.chanserv.note_types.get("url").unwrap();
    assert_eq!(ty.set_access, NoteAccess::ChannelAccess(200));
    assert_eq!(ty.refs, 1);
    assert_eq!(
        w2.chanserv
            .channels
            .get("#keep")
            .unwrap()
            .notes
            .get("url")
            .unwrap()
            .text,
        "https://keep.example"
    );
    assert!(w2.chanserv.mask_dnrs.get("#banned*").is_some());
    // Account back-lists were rebuilt by the loader.
    assert!(w2
        .accounts
        .get("Bob")
        .unwrap()
        .channels
        .iter()
        .any(|c| c == "#keep"));
}

#[test]
fn nodelete_flag_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let conf = conf_with_db(dir.path());
    let mut w = boot_world_with(&conf);
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#forever");
    w.chanserv
        .channels
        .get_mut("#forever")
        .unwrap()
        .flags |= CHANNEL_NODELETE;
    assert!(srvx_ng::saxdb::flush(&w, "ChanServ"));

    let w2 = boot_world_with(&conf);
    let reg = w2.chanserv.channels.get("#forever").unwrap();
    assert!(reg.flags & CHANNEL_NODELETE != 0);
}

#[test]
fn legacy_packed_channels_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let conf = conf_with_db(dir.path());
    std::fs::write(
        dir.path().join("chanserv.db"),
        concat!(
            "\"channels\" {\n",
            "\t\"#old\" { \"flags\" \"AAAAB\"; \"registered\" \"5\"; };\n",
            "\t\"#new\" { \"registered\" \"7\"; \"visited\" \"8\";\n",
            "\t\t\"options\" { \"flags\" \"0\"; };\n",
            "\t\t\"users\" { \"Owner\" { \"level\" \"500\"; \"seen\" \"8\"; \"flags\" \"0\"; }; };\n",
            "\t};\n",
            "};\n",
        ),
    )
    .unwrap();
    let w = boot_world_with(&conf);
    assert!(!w.chanserv.channels.contains("#old"));
    let reg = w.chanserv.channels.get("#new").unwrap();
    assert_eq!(reg.registered, 7);
    assert_eq!(reg.users.get("Owner").unwrap().access, 500);
}
