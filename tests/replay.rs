//! Driving the whole daemon from a recorded event log.

mod common;

use srvx_ng::conf::Config;
use srvx_ng::reactor::{self, replay::Replay, ExitHooks};
use srvx_ng::state::World;

#[tokio::test]
async fn replay_log_drives_the_core() {
    let dir = tempfile::tempdir().unwrap();
    let conf_text = format!(
        concat!(
            "\"services\" {{ \"chanserv\" {{ \"nick\" \"ChanServ\"; }}; }};\n",
            "\"dbs\" {{\n",
            "    \"mondo\" {{ \"frequency\" \"0\"; \"filename\" \"{dir}/mondo.db\"; }};\n",
            "    \"ChanServ\" {{ \"frequency\" \"0\"; \"filename\" \"{dir}/chanserv.db\"; }};\n",
            "}};\n",
        ),
        dir = dir.path().display()
    );
    let conf = Config::from_db(srvx_ng::recdb::parse_database(&conf_text).unwrap());

    let log_path = dir.path().join("events.log");
    std::fs::write(
        &log_path,
        concat!(
            "# recorded session\n",
            "TIME 1000000\n",
            "BURST START\n",
            "CONNECT Alice alice a.example\n",
            "AUTH Alice Alice\n",
            "JOIN Alice #chan\n",
            "BURST END\n",
            "MODE Alice #chan +o Alice\n",
            "PRIVMSG Alice ChanServ :register #chan\n",
            "TIME 1000500\n",
            "PRIVMSG Alice ChanServ :addtimedban #chan *!*@evil.example 1h go away\n",
        ),
    )
    .unwrap();

    let mut world = World::boot(conf, 0);
    let mut replay = Replay::open(log_path.to_str().unwrap()).unwrap();
    reactor::run(&mut world, &mut replay, false, "unused.conf", ExitHooks::new())
        .await
        .unwrap();

    // The virtual clock advanced with the log.
    assert_eq!(world.now, 1_000_500);
    let reg = world.chanserv.channels.get("#chan").expect("registered");
    assert_eq!(reg.users.get("Alice").unwrap().access, 500);
    assert_eq!(reg.bans.len(), 1);
    assert_eq!(reg.bans[0].expires, 1_000_500 + 3600);

    // Shutdown flushed the database through the rename path.
    let text = std::fs::read_to_string(dir.path().join("chanserv.db")).unwrap();
    let raw = srvx_ng::recdb::parse_database(&text).unwrap();
    assert!(raw
        .get("channels")
        .and_then(|r| r.as_object())
        .and_then(|c| c.get("#chan"))
        .is_some());
}
