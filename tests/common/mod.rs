//! Shared world-building helpers for the integration suites.

#![allow(dead_code)]

use srvx_ng::actions::Action;
use srvx_ng::conf::Config;
use srvx_ng::state::World;

/// Test configuration: named bots, no periodic database flushes.
pub const CONF: &str = r#"
"services" {
    "chanserv" { "nick" "ChanServ"; };
    "opserv" { "nick" "OpServ"; "privileged" "1"; };
    "nickserv" { "nick" "AuthServ"; };
};
"dbs" {
    "mondo" { "frequency" "0"; };
    "ChanServ" { "frequency" "0"; };
};
"#;

pub fn boot_world() -> World {
    boot_world_with(CONF)
}

pub fn boot_world_with(conf_text: &str) -> World {
    let conf = Config::from_db(srvx_ng::recdb::parse_database(conf_text).unwrap());
    let mut world = World::boot(conf, 1_000_000);
    world.take_actions();
    world
}

pub fn connect(world: &mut World, nick: &str, ident: &str, host: &str) {
    world.user_connected(nick, ident, host);
}

pub fn connect_authed(world: &mut World, nick: &str, handle: &str) {
    world.user_connected(nick, &nick.to_lowercase(), &format!("{}.example", nick.to_lowercase()));
    world.user_authed(nick, handle);
    world.take_actions();
}

/// An authenticated staff member with oper umode and security override.
pub fn connect_staff(world: &mut World, nick: &str, handle: &str, oper_level: u32) {
    connect_authed(world, nick, handle);
    world.users.get_mut(nick).unwrap().oper = true;
    let h = world.accounts.get_mut(handle).unwrap();
    h.oper_level = oper_level;
    h.flags |= srvx_ng::accounts::HANDLE_HELPING;
}

pub fn join(world: &mut World, nick: &str, channel: &str) {
    world.user_joined(nick, channel);
    world.take_actions();
}

pub fn op(world: &mut World, nick: &str, channel: &str) {
    world.mode_changed(nick, channel, &["+o", nick]);
    world.take_actions();
}

/// Message the channel service and collect the resulting actions.
pub fn cs(world: &mut World, nick: &str, text: &str) -> Vec<Action> {
    world.privmsg(nick, "ChanServ", text, false);
    world.take_actions()
}

/// Message the oper service and collect the resulting actions.
pub fn os(world: &mut World, nick: &str, text: &str) -> Vec<Action> {
    world.privmsg(nick, "OpServ", text, false);
    world.take_actions()
}

pub fn reply_keys(actions: &[Action]) -> Vec<&'static str> {
    actions.iter().filter_map(Action::reply_key).collect()
}

pub fn has_key(actions: &[Action], key: &str) -> bool {
    actions.iter().any(|a| a.reply_key() == Some(key))
}

pub fn reply_text<'a>(actions: &'a [Action], key: &str) -> Option<&'a str> {
    actions.iter().find_map(|a| match a {
        Action::Reply { key: k, text, .. } if *k == key => Some(text.as_str()),
        _ => None,
    })
}

/// Register `channel` to the (authenticated, opped) `owner`.
pub fn register_channel(world: &mut World, owner: &str, channel: &str) {
    join(world, owner, channel);
    op(world, owner, channel);
    let actions = cs(world, owner, &format!("register {}", channel));
    assert!(
        has_key(&actions, "CSMSG_REG_SUCCESS"),
        "registration of {} by {} failed: {:?}",
        channel,
        owner,
        reply_keys(&actions)
    );
}
