//! Dispatch framework behavior: lookup, permissions, joiners, binding
//! management and rate limiting.

mod common;

use common::*;
use srvx_ng::modcmd::{
    dispatch::{can_invoke, BoundCmd, SVCCMD_NOISY},
    Rules, ACTION_ALLOW, MODCMD_DISABLED, MODCMD_REQUIRE_OPER,
};

fn nop(_: &mut srvx_ng::state::World, _: &srvx_ng::modcmd::Invocation) -> bool {
    true
}

#[test]
fn unknown_commands_and_non_commands() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    let actions = cs(&mut w, "Alice", "frobnicate now");
    assert!(has_key(&actions, "MSG_COMMAND_UNKNOWN"));
    // Things that cannot be command words are dropped silently.
    let actions = cs(&mut w, "Alice", "!!!");
    assert!(actions.is_empty());
}

#[test]
fn privileged_service_rejects_non_opers() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    let actions = os(&mut w, "Alice", "version");
    assert!(has_key(&actions, "MSG_COMMAND_PRIVILEGED"));

    connect_staff(&mut w, "Oper", "Oper", 100);
    let actions = os(&mut w, "Oper", "version");
    assert!(has_key(&actions, "MCMSG_VERSION"));
}

#[test]
fn missing_parameters_are_reported() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    register_channel(&mut w, "Alice", "#c");
    let actions = cs(&mut w, "Alice", "adduser #c");
    assert!(has_key(&actions, "MSG_MISSING_PARAMS"));
}

#[test]
fn joiner_lists_and_redispatches() {
    let mut w = boot_world();
    connect_staff(&mut w, "Oper", "Oper", 900);
    let actions = os(&mut w, "Oper", "stats");
    let listing = reply_text(&actions, "MCMSG_JOINER_CHOICES").expect("joiner listing");
    assert!(listing.contains("stats modules"));
    assert!(listing.contains("stats databases"));

    let actions = os(&mut w, "Oper", "stats databases");
    assert!(has_key(&actions, "MCMSG_DB_STATS"));
    assert!(reply_text(&actions, "MCMSG_DB_ROW")
        .expect("database row")
        .contains("ChanServ"));
}

#[test]
fn bind_and_unbind_through_commands() {
    let mut w = boot_world();
    connect_staff(&mut w, "Oper", "Oper", 900);

    let actions = os(&mut w, "Oper", "bind OpServ hello *modcmd.version");
    assert!(
        has_key(&actions, "MCMSG_COMMAND_BOUND"),
        "got {:?}",
        reply_keys(&actions)
    );
    let actions = os(&mut w, "Oper", "hello");
    assert!(has_key(&actions, "MCMSG_VERSION"));

    let actions = os(&mut w, "Oper", "unbind OpServ hello");
    assert!(has_key(&actions, "MCMSG_COMMAND_UNBOUND"));
    let actions = os(&mut w, "Oper", "hello");
    assert!(has_key(&actions, "MSG_COMMAND_UNKNOWN"));

    // The last bind of a keep-bound command is stuck.
    let actions = os(&mut w, "Oper", "unbind OpServ bind");
    assert!(has_key(&actions, "MCMSG_UNBIND_PROHIBITED"));
}

#[test]
fn modcmd_command_adjusts_binding_rules() {
    let mut w = boot_world();
    connect_staff(&mut w, "Oper", "Oper", 900);
    let actions = os(&mut w, "Oper", "modcmd OpServ version oper_level 950");
    assert!(has_key(&actions, "MCMSG_COMMAND_MODIFIED"));
    // Now 900 is no longer enough.
    let actions = os(&mut w, "Oper", "version");
    assert!(has_key(&actions, "MSG_NO_ACCESS"));
}

#[test]
fn god_toggles_security_override() {
    let mut w = boot_world();
    connect_authed(&mut w, "Oper", "Oper");
    w.users.get_mut("Oper").unwrap().oper = true;
    let actions = os(&mut w, "Oper", "god");
    assert!(has_key(&actions, "MCMSG_NOW_HELPING"));
    assert!(w.accounts.get("Oper").unwrap().is_helping());
    let actions = os(&mut w, "Oper", "god off");
    assert!(has_key(&actions, "MCMSG_NOW_NOT_HELPING"));
    let actions = os(&mut w, "Oper", "god off");
    assert!(has_key(&actions, "MCMSG_ALREADY_NOT_HELPING"));
}

#[test]
fn command_policer_drops_floods() {
    let mut w = boot_world();
    connect_authed(&mut w, "Chatty", "Chatty");
    let mut accepted = 0;
    for _ in 0..8 {
        let actions = cs(&mut w, "Chatty", "version");
        if has_key(&actions, "MCMSG_VERSION") {
            accepted += 1;
        }
    }
    // The default luser bucket holds five commands at one instant.
    assert_eq!(accepted, 5);
}

#[test]
fn disabled_commands_refuse_invocation() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    w.modcmd
        .services
        .get_mut("chanserv")
        .unwrap()
        .commands
        .get_mut("version")
        .unwrap()
        .rules
        .flags |= MODCMD_DISABLED;
    let svc = w.modcmd.services.get_mut("chanserv").unwrap();
    let cmd = svc.commands.get_mut("version").unwrap();
    cmd.effective_flags |= MODCMD_DISABLED;
    let actions = cs(&mut w, "Alice", "version");
    assert!(has_key(&actions, "MSG_COMMAND_DISABLED"));
}

#[test]
fn permission_monotonicity() {
    // If an actor satisfies a binding's rules, an actor with pointwise
    // greater attributes also satisfies them.
    let mut w = boot_world();
    connect_authed(&mut w, "Lesser", "Lesser");
    connect_authed(&mut w, "Greater", "Greater");
    w.users.get_mut("Lesser").unwrap().oper = true;
    w.users.get_mut("Greater").unwrap().oper = true;
    w.accounts.get_mut("Lesser").unwrap().oper_level = 500;
    w.accounts.get_mut("Greater").unwrap().oper_level = 900;

    let cmd = BoundCmd {
        name: "probe".to_string(),
        modcmd: ("modcmd".to_string(), "version".to_string()),
        rules: Rules {
            min_opserv_level: 400,
            ..Default::default()
        },
        effective_flags: MODCMD_REQUIRE_OPER | srvx_ng::modcmd::MODCMD_REQUIRE_AUTHED,
        alias: Vec::new(),
        func: nop,
        min_argc: 1,
    };
    let lesser = can_invoke(&mut w, "Lesser", "OpServ", &cmd, None, SVCCMD_NOISY);
    let greater = can_invoke(&mut w, "Greater", "OpServ", &cmd, None, SVCCMD_NOISY);
    assert!(lesser & ACTION_ALLOW != 0);
    assert!(greater & ACTION_ALLOW != 0);

    // And an actor below the threshold fails.
    w.accounts.get_mut("Lesser").unwrap().oper_level = 100;
    let too_low = can_invoke(&mut w, "Lesser", "OpServ", &cmd, None, SVCCMD_NOISY);
    assert_eq!(too_low, 0);
}

#[test]
fn help_searches_bindings_then_module_stores() {
    let mut w = boot_world();
    connect_authed(&mut w, "Alice", "Alice");
    w.modcmd
        .modules
        .get_mut("ChanServ")
        .unwrap()
        .help
        .insert("adduser", "Grants channel access.".to_string());
    w.modcmd
        .modules
        .get_mut("ChanServ")
        .unwrap()
        .help
        .insert("<index>", "ChanServ help index.".to_string());

    let actions = cs(&mut w, "Alice", "help adduser");
    assert!(has_key(&actions, "MCMSG_HELP_COMMAND_HEADER"));
    assert_eq!(
        reply_text(&actions, "MCMSG_HELP_LINE"),
        Some("Grants channel access.")
    );

    // No binding and no topic: fall through to the index.
    let actions = cs(&mut w, "Alice", "help");
    assert_eq!(reply_text(&actions, "MCMSG_HELP_LINE"), Some("ChanServ help index."));

    let actions = cs(&mut w, "Alice", "help nosuchtopic");
    assert!(has_key(&actions, "MSG_TOPIC_UNKNOWN"));
}
