//! Channel services: the persistent model of registered channels and
//! the policies over them.

pub mod access;
pub mod bans;
pub mod db;
pub mod dnr;
pub mod expire;
pub mod hooks;
pub mod model;
pub mod modes;
pub mod notes;
pub mod register;
pub mod set;
pub mod suspend;
pub mod users;

pub use model::ChanServ;

use crate::modcmd::{
    MODCMD_NEVER_CSUSPEND, MODCMD_NO_LOG, MODCMD_REQUIRE_AUTHED, MODCMD_REQUIRE_CHANNEL,
    MODCMD_REQUIRE_CHANUSER, MODCMD_REQUIRE_REGCHAN,
};
use crate::state::{OnlineUser, TimerEvent, World};

pub const MODULE: &str = "ChanServ";
pub const SERVICE: &str = "chanserv";

/// The deterministic confirmation token for destructive commands: an
/// 8-hex-digit accumulator over the uppercased handle and channel name.
pub fn confirmation_token(handle: &str, channel: &str) -> String {
    let mut accum: u32 = 0;
    for b in handle.bytes() {
        accum = accum
            .wrapping_mul(31)
            .wrapping_add(b.to_ascii_uppercase() as u32);
    }
    for b in channel.bytes() {
        accum = accum
            .wrapping_mul(31)
            .wrapping_add(b.to_ascii_uppercase() as u32);
    }
    format!("{:08x}", accum)
}

/// Register the module, its commands, the service bot, the database and
/// the periodic sweeps.
pub fn init(world: &mut World) {
    let r = &mut world.modcmd;
    r.register_module(MODULE, Some("chanserv.help"));

    type Def = (
        &'static str,
        crate::modcmd::CommandFn,
        usize,
        u32,
        &'static [(&'static str, &'static str)],
    );
    static COMMANDS: &[Def] = &[
        (
            "register",
            register::cmd_register,
            1,
            MODCMD_REQUIRE_AUTHED,
            &[("flags", "+acceptchan")],
        ),
        (
            "noregister",
            dnr::cmd_noregister,
            1,
            MODCMD_REQUIRE_AUTHED,
            &[("flags", "+helping")],
        ),
        ("allowregister", dnr::cmd_allowregister, 2, 0, &[("template", "noregister")]),
        (
            "move",
            register::cmd_move,
            1,
            MODCMD_REQUIRE_AUTHED | MODCMD_REQUIRE_REGCHAN,
            &[("template", "register")],
        ),
        (
            "csuspend",
            suspend::cmd_csuspend,
            2,
            MODCMD_REQUIRE_AUTHED | MODCMD_REQUIRE_REGCHAN,
            &[("flags", "+helping")],
        ),
        (
            "cunsuspend",
            suspend::cmd_cunsuspend,
            1,
            MODCMD_REQUIRE_AUTHED | MODCMD_REQUIRE_REGCHAN,
            &[("flags", "+helping")],
        ),
        ("createnote", notes::cmd_createnote, 5, 0, &[("oper_level", "800")]),
        ("removenote", notes::cmd_removenote, 2, 0, &[("oper_level", "800")]),
        (
            "unregister",
            register::cmd_unregister,
            1,
            MODCMD_REQUIRE_AUTHED | MODCMD_REQUIRE_REGCHAN,
            &[("flags", "+loghostmask")],
        ),
        (
            "merge",
            register::cmd_merge,
            2,
            MODCMD_REQUIRE_AUTHED | MODCMD_REQUIRE_REGCHAN,
            &[("access", "owner")],
        ),
        ("adduser", users::cmd_adduser, 3, MODCMD_REQUIRE_CHANUSER, &[("access", "master")]),
        ("deluser", users::cmd_deluser, 2, MODCMD_REQUIRE_CHANUSER, &[("access", "master")]),
        ("suspend", suspend::cmd_suspend, 2, MODCMD_REQUIRE_CHANUSER, &[("access", "master")]),
        (
            "unsuspend",
            suspend::cmd_unsuspend,
            2,
            MODCMD_REQUIRE_CHANUSER,
            &[("access", "master")],
        ),
        ("deleteme", users::cmd_deleteme, 1, MODCMD_REQUIRE_CHANUSER, &[]),
        (
            "mdelowner",
            users::cmd_mdelowner,
            2,
            MODCMD_REQUIRE_CHANUSER,
            &[("flags", "+helping")],
        ),
        (
            "mdelcoowner",
            users::cmd_mdelcoowner,
            2,
            MODCMD_REQUIRE_CHANUSER,
            &[("access", "owner")],
        ),
        (
            "mdelmaster",
            users::cmd_mdelmaster,
            2,
            MODCMD_REQUIRE_CHANUSER,
            &[("access", "coowner")],
        ),
        ("mdelop", users::cmd_mdelop, 2, MODCMD_REQUIRE_CHANUSER, &[("access", "master")]),
        ("mdelpeon", users::cmd_mdelpeon, 2, MODCMD_REQUIRE_CHANUSER, &[("access", "master")]),
        ("trim", users::cmd_trim, 3, MODCMD_REQUIRE_CHANUSER, &[("access", "master")]),
        ("clvl", users::cmd_clvl, 3, MODCMD_REQUIRE_CHANUSER, &[("access", "master")]),
        (
            "giveownership",
            users::cmd_giveownership,
            2,
            MODCMD_REQUIRE_CHANUSER,
            &[("access", "owner"), ("flags", "+loghostmask")],
        ),
        ("op", modes::cmd_op, 2, MODCMD_REQUIRE_CHANNEL, &[("access", "op")]),
        ("deop", modes::cmd_deop, 2, MODCMD_REQUIRE_CHANNEL, &[("template", "op")]),
        ("voice", modes::cmd_voice, 2, MODCMD_REQUIRE_CHANNEL, &[("template", "op")]),
        ("devoice", modes::cmd_devoice, 2, MODCMD_REQUIRE_CHANNEL, &[("template", "op")]),
        (
            "topic",
            modes::cmd_topic,
            1,
            MODCMD_REQUIRE_REGCHAN | MODCMD_NEVER_CSUSPEND,
            &[("template", "op")],
        ),
        ("mode", modes::cmd_mode, 1, MODCMD_REQUIRE_REGCHAN, &[("template", "op")]),
        ("invite", modes::cmd_invite, 2, MODCMD_REQUIRE_CHANNEL, &[("access", "master")]),
        ("inviteme", modes::cmd_inviteme, 1, MODCMD_REQUIRE_CHANNEL, &[("access", "1")]),
        ("addban", bans::cmd_addban, 2, MODCMD_REQUIRE_REGCHAN, &[("access", "250")]),
        ("addtimedban", bans::cmd_addtimedban, 3, MODCMD_REQUIRE_REGCHAN, &[("access", "250")]),
        ("delban", bans::cmd_delban, 2, MODCMD_REQUIRE_REGCHAN, &[("access", "250")]),
        (
            "bans",
            bans::cmd_bans,
            1,
            MODCMD_REQUIRE_REGCHAN | MODCMD_NO_LOG,
            &[("access", "1")],
        ),
        (
            "users",
            users::cmd_users,
            1,
            MODCMD_REQUIRE_REGCHAN | MODCMD_NO_LOG,
            &[("flags", "+joinable")],
        ),
        (
            "note",
            notes::cmd_note,
            1,
            MODCMD_REQUIRE_REGCHAN,
            &[("flags", "+joinable,+acceptchan")],
        ),
        ("delnote", notes::cmd_delnote, 2, MODCMD_REQUIRE_CHANUSER, &[]),
        ("expire", expire::cmd_expire, 1, 0, &[("flags", "+oper")]),
        ("set", set::cmd_set, 1, MODCMD_REQUIRE_CHANUSER, &[("access", "op")]),
        ("set defaults", set::cmd_set_defaults, 1, 0, &[("access", "owner")]),
        ("set defaulttopic", set::cmd_set_defaulttopic, 1, 0, &[]),
        ("set topic", set::cmd_set_defaulttopic, 1, 0, &[]),
        ("set topicmask", set::cmd_set_topicmask, 1, 0, &[]),
        ("set greeting", set::cmd_set_greeting, 1, 0, &[]),
        ("set usergreeting", set::cmd_set_usergreeting, 1, 0, &[]),
        ("set modes", set::cmd_set_modes, 1, 0, &[]),
        ("set enfops", set::cmd_set_enfops, 1, 0, &[]),
        ("set giveops", set::cmd_set_giveops, 1, 0, &[]),
        ("set enfmodes", set::cmd_set_enfmodes, 1, 0, &[]),
        ("set enftopic", set::cmd_set_enftopic, 1, 0, &[]),
        ("set pubcmd", set::cmd_set_pubcmd, 1, 0, &[]),
        ("set givevoice", set::cmd_set_givevoice, 1, 0, &[]),
        ("set userinfo", set::cmd_set_userinfo, 1, 0, &[]),
        ("set topicsnarf", set::cmd_set_topicsnarf, 1, 0, &[]),
        ("set setters", set::cmd_set_setters, 1, 0, &[]),
        ("set ctcpusers", set::cmd_set_ctcpusers, 1, 0, &[]),
        ("set inviteme", set::cmd_set_inviteme, 1, 0, &[]),
        ("set protect", set::cmd_set_protect, 1, 0, &[]),
        ("set toys", set::cmd_set_toys, 1, 0, &[]),
        ("set topicrefresh", set::cmd_set_topicrefresh, 1, 0, &[]),
        ("set ctcpreaction", set::cmd_set_ctcpreaction, 1, 0, &[]),
        ("set nodelete", set::cmd_set_nodelete, 1, 0, &[]),
        ("set dynlimit", set::cmd_set_dynlimit, 1, 0, &[]),
        ("set offchannel", set::cmd_set_offchannel, 1, 0, &[]),
        ("set unreviewed", set::cmd_set_unreviewed, 1, 0, &[]),
        (
            "uset",
            crate::modcmd::builtin::cmd_joiner,
            1,
            MODCMD_REQUIRE_CHANUSER,
            &[("access", "1")],
        ),
        ("uset noautoop", users::cmd_uset_noautoop, 1, MODCMD_REQUIRE_REGCHAN, &[]),
        ("uset autoinvite", users::cmd_uset_autoinvite, 1, MODCMD_REQUIRE_REGCHAN, &[]),
        ("uset info", users::cmd_uset_info, 1, MODCMD_REQUIRE_REGCHAN, &[]),
    ];
    for (name, func, min_argc, flags, opts) in COMMANDS {
        r.register_command(MODULE, name, *func, *min_argc, *flags, opts);
    }

    let bot = world.conf.chanserv.nick.clone();
    let (trigger, privileged) = world
        .conf
        .bots
        .iter()
        .find(|b| crate::ircstr::irc_eq(&b.service, SERVICE))
        .map(|b| (b.trigger, b.privileged))
        .unwrap_or((None, false));
    world
        .modcmd
        .register_service(SERVICE, &bot, trigger, privileged);
    if let Err(e) = world.modcmd.bind_module(SERVICE, MODULE) {
        tracing::warn!(error = %e, "Default binds for channel service failed");
    }

    // The bot itself exists as a connected client.
    world.users.insert(
        &bot,
        OnlineUser {
            nick: bot.clone(),
            ident: "chanserv".to_string(),
            host: "services".to_string(),
            account: None,
            oper: true,
            is_service: true,
            policer: crate::policer::Policer::new(),
        },
    );

    crate::saxdb::register(world, MODULE, db::chanserv_read, db::chanserv_write);

    // Periodic sweeps; each handler re-arms itself.
    let now = world.now;
    let freq = world.conf.chanserv.channel_expire_frequency;
    if freq > 0 {
        world.timers.add(now + freq, TimerEvent::ChannelExpireSweep);
    }
    let freq = world.conf.chanserv.dnr_expire_frequency;
    if freq > 0 {
        world.timers.add(now + freq, TimerEvent::DnrSweep);
    }
    let freq = world.conf.chanserv.refresh_period;
    if freq > 0 {
        world.timers.add(now + freq, TimerEvent::TopicRefreshSweep);
    }
}

/// Ask the bot to sit in (or mark) every registered, unsuspended
/// channel; used at link time after the burst settles.
pub fn join_channels(world: &mut World) {
    let channels: Vec<String> = world
        .chanserv
        .channels
        .iter()
        .filter(|(_, reg)| !reg.is_suspended())
        .map(|(name, _)| name.to_string())
        .collect();
    for channel in channels {
        register::emit_channel_presence(world, &channel);
        users::rescan_presence(world, &channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_tokens_are_case_insensitive_and_stable() {
        let t1 = confirmation_token("Alice", "#foo");
        let t2 = confirmation_token("ALICE", "#FOO");
        assert_eq!(t1, t2);
        assert_eq!(t1.len(), 8);
        assert!(t1.chars().all(|c| c.is_ascii_hexdigit()));
        // Different inputs give different tokens.
        assert_ne!(t1, confirmation_token("Bob", "#foo"));
    }
}
