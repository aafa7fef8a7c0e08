//! The dispatch framework's own command surface: binding management,
//! introspection, help, and the service/stats/god/version utilities.

use super::dispatch::invoke_argv;
use super::{
    apply_rule_option, effective_flags, BindError, Invocation, FLAG_NAMES, MODCMD_KEEP_BOUND,
    MODCMD_NO_LOG, MODCMD_REQUIRE_STAFF,
};
use crate::accounts::HANDLE_HELPING;
use crate::ircstr::irc_eq;
use crate::state::{OnlineUser, World};
use tracing::info;

pub const MODULE: &str = "modcmd";

/// Register the module and its commands. Callers bind them to a
/// service afterwards (the oper service gets the whole module).
pub fn init(world: &mut World) {
    let r = &mut world.modcmd;
    r.register_module(MODULE, Some("modcmd.help"));
    r.register_command(
        MODULE,
        "bind",
        cmd_bind,
        4,
        MODCMD_KEEP_BOUND,
        &[("oper_level", "800")],
    );
    r.register_command(MODULE, "unbind", cmd_unbind, 3, 0, &[("template", "bind")]);
    r.register_command(MODULE, "modcmd", cmd_modcmd, 5, 0, &[("template", "bind")]);
    r.register_command(MODULE, "command", cmd_command, 2, 0, &[]);
    r.register_command(MODULE, "readhelp", cmd_readhelp, 2, 0, &[("oper_level", "600")]);
    r.register_command(MODULE, "showcommands", cmd_showcommands, 1, 0, &[]);
    r.register_command(MODULE, "help", cmd_help, 1, MODCMD_NO_LOG, &[]);
    r.register_command(MODULE, "joiner", cmd_joiner, 1, 0, &[]);
    r.register_command(MODULE, "stats modules", cmd_stats_modules, 1, 0, &[("oper_level", "5")]);
    r.register_command(MODULE, "stats services", cmd_stats_services, 1, 0, &[("oper_level", "5")]);
    r.register_command(
        MODULE,
        "stats databases",
        cmd_stats_databases,
        1,
        0,
        &[("oper_level", "5")],
    );
    r.register_command(MODULE, "service add", cmd_service_add, 3, 0, &[("oper_level", "900")]);
    r.register_command(
        MODULE,
        "service rename",
        cmd_service_rename,
        3,
        0,
        &[("template", "service add")],
    );
    r.register_command(
        MODULE,
        "service trigger",
        cmd_service_trigger,
        2,
        0,
        &[("template", "service add")],
    );
    r.register_command(
        MODULE,
        "service privileged",
        cmd_service_privileged,
        3,
        0,
        &[("template", "service add")],
    );
    r.register_command(
        MODULE,
        "service remove",
        cmd_service_remove,
        2,
        0,
        &[("template", "service add")],
    );
    r.register_command(MODULE, "god", cmd_god, 1, 0, &[("flags", "+oper,+networkhelper,+supporthelper")]);
    r.register_command(MODULE, "version", cmd_version, 1, MODCMD_NO_LOG, &[]);
    r.register_command(MODULE, "timecmd", cmd_timecmd, 2, 0, &[("oper_level", "1")]);
}

/// Bind every modcmd command plus the two joiner aliases into the oper
/// service, and the user-facing help/version pair into any service.
pub fn bind_oper_service(world: &mut World, service: &str) {
    if let Err(e) = world.modcmd.bind_module(service, MODULE) {
        tracing::warn!(service, error = %e, "Default modcmd binds failed");
    }
    let _ = world.modcmd.bind_alias(service, "stats", &["*modcmd.joiner"]);
    let _ = world.modcmd.bind_alias(service, "service", &["*modcmd.joiner"]);
}

pub fn bind_user_service(world: &mut World, service: &str) {
    let _ = world.modcmd.bind(service, MODULE, "help", "help");
    let _ = world.modcmd.bind(service, MODULE, "version", "version");
    let _ = world.modcmd.bind(service, MODULE, "showcommands", "showcommands");
}

fn report_bind_error(world: &mut World, user: &str, err: &BindError) {
    match err {
        BindError::UnknownModule(m) => {
            let m = m.clone();
            world.reply(user, "MCMSG_UNKNOWN_MODULE", &[&m]);
        }
        BindError::UnknownService(s) => {
            let s = s.clone();
            world.reply(user, "MCMSG_UNKNOWN_SERVICE", &[&s]);
        }
        BindError::UnknownCommand(m, c) => {
            let name = format!("{}.{}", m, c);
            world.reply(user, "MCMSG_UNKNOWN_COMMAND_2", &[&name, &"*"]);
        }
        BindError::AlreadyBound(bot, name) => {
            let (bot, name) = (bot.clone(), name.clone());
            world.reply(user, "MCMSG_ALREADY_BOUND", &[&bot, &name]);
        }
        BindError::NotBound(name) => {
            let name = name.clone();
            world.reply(user, "MCMSG_NO_COMMAND_BOUND", &[&"service", &name]);
        }
        BindError::KeepBound(name) => {
            let name = name.clone();
            world.reply(user, "MCMSG_UNBIND_PROHIBITED", &[&name]);
        }
    }
}

fn find_service_by_arg(world: &World, arg: &str) -> Option<String> {
    world
        .modcmd
        .service_by_nick(arg)
        .map(str::to_string)
        .or_else(|| {
            world
                .modcmd
                .services
                .display_key(arg)
                .map(str::to_string)
        })
}

/// `bind <service> <name> <command> [alias tokens...]`
pub fn cmd_bind(world: &mut World, inv: &Invocation) -> bool {
    let Some(service) = find_service_by_arg(world, inv.arg(1).unwrap_or("")) else {
        let arg = inv.arg(1).unwrap_or("").to_string();
        world.reply(&inv.user, "MCMSG_UNKNOWN_SERVICE", &[&arg]);
        return false;
    };
    let name = inv.arg(2).unwrap_or("").to_string();
    let reference = inv.arg(3).unwrap_or("").to_string();
    let result = if inv.argv.len() > 4 {
        // Extra arguments make this an alias binding.
        let tokens: Vec<&str> = inv.argv[3..].iter().map(String::as_str).collect();
        world.modcmd.bind_alias(&service, &name, &tokens)
    } else {
        match world.modcmd.resolve_command_ref(&service, &reference) {
            Ok((module, command, _)) => world.modcmd.bind(&service, &module, &command, &name),
            Err(e) => Err(e),
        }
    };
    match result {
        Ok(()) => {
            let bot = world
                .modcmd
                .service(&service)
                .map(|s| s.bot.clone())
                .unwrap_or_default();
            world.reply(&inv.user, "MCMSG_COMMAND_BOUND", &[&name, &bot]);
            true
        }
        Err(e) => {
            report_bind_error(world, &inv.user, &e);
            false
        }
    }
}

/// `unbind <service> <name>`
pub fn cmd_unbind(world: &mut World, inv: &Invocation) -> bool {
    let Some(service) = find_service_by_arg(world, inv.arg(1).unwrap_or("")) else {
        let arg = inv.arg(1).unwrap_or("").to_string();
        world.reply(&inv.user, "MCMSG_UNKNOWN_SERVICE", &[&arg]);
        return false;
    };
    let name = inv.arg(2).unwrap_or("").to_string();
    match world.modcmd.unbind(&service, &name) {
        Ok(()) => {
            let bot = world
                .modcmd
                .service(&service)
                .map(|s| s.bot.clone())
                .unwrap_or_default();
            world.reply(&inv.user, "MCMSG_COMMAND_UNBOUND", &[&name, &bot]);
            true
        }
        Err(e) => {
            report_bind_error(world, &inv.user, &e);
            false
        }
    }
}

/// `modcmd <service> <name> <option> <value> [option value ...]`
pub fn cmd_modcmd(world: &mut World, inv: &Invocation) -> bool {
    let Some(service) = find_service_by_arg(world, inv.arg(1).unwrap_or("")) else {
        let arg = inv.arg(1).unwrap_or("").to_string();
        world.reply(&inv.user, "MCMSG_UNKNOWN_SERVICE", &[&arg]);
        return false;
    };
    let name = inv.arg(2).unwrap_or("").to_string();
    if world
        .modcmd
        .service(&service)
        .and_then(|s| s.commands.get(&name))
        .is_none()
    {
        let bot = service.clone();
        world.reply(&inv.user, "MCMSG_NO_COMMAND_BOUND", &[&bot, &name]);
        return false;
    }
    let mut changed = 0usize;
    let mut ii = 3;
    while ii + 1 < inv.argv.len() {
        let opt = inv.argv[ii].clone();
        let value = inv.argv[ii + 1].clone();
        let ok = {
            let Some(cmd) = world
                .modcmd
                .services
                .get_mut(&service)
                .and_then(|s| s.commands.get_mut(&name))
            else {
                return false;
            };
            apply_rule_option(&mut cmd.rules, &opt, &value)
        };
        if ok {
            changed += 1;
            world.reply(&inv.user, "MCMSG_COMMAND_MODIFIED", &[&opt, &name]);
        } else {
            world.reply(&inv.user, "MCMSG_BAD_OPTION", &[&opt]);
        }
        ii += 2;
    }
    // Recompute the derived flag set after any change.
    if changed > 0 {
        let cmd_flags = world
            .modcmd
            .service(&service)
            .and_then(|s| s.commands.get(&name))
            .map(|c| c.modcmd.clone())
            .and_then(|(m, c)| world.modcmd.modcmd(&m, &c))
            .map(|c| c.flags)
            .unwrap_or(0);
        if let Some(cmd) = world
            .modcmd
            .services
            .get_mut(&service)
            .and_then(|s| s.commands.get_mut(&name))
        {
            cmd.effective_flags = effective_flags(&cmd.rules, cmd_flags);
        }
    }
    changed > 0
}

/// `command <name>`: inspect a binding on the current service.
pub fn cmd_command(world: &mut World, inv: &Invocation) -> bool {
    let name = inv.argv[1..].join(" ");
    let Some(cmd) = world
        .modcmd
        .service(&inv.service)
        .and_then(|s| s.commands.get(&name))
        .cloned()
    else {
        let bot = inv.bot.clone();
        world.reply(&inv.user, "MCMSG_UNKNOWN_COMMAND_2", &[&name, &bot]);
        return false;
    };
    let binding = format!("{}.{}", cmd.modcmd.0, cmd.modcmd.1);
    if cmd.alias.is_empty() {
        world.reply(&inv.user, "MCMSG_COMMAND_BINDING", &[&cmd.name, &binding]);
    } else {
        let expansion = format!("{} {}", binding, cmd.alias.join(" "));
        world.reply(&inv.user, "MCMSG_COMMAND_ALIASES", &[&cmd.name, &expansion]);
    }
    // Refuse detailed inspection of staff commands to non-staff.
    let view_is_staff = world.users.get(&inv.user).is_some_and(|u| u.oper)
        || world
            .account_of(&inv.user)
            .is_some_and(|h| h.is_network_helper() || h.is_support_helper());
    if cmd.effective_flags & MODCMD_REQUIRE_STAFF != 0 && !view_is_staff {
        world.reply(&inv.user, "MCMSG_INSPECTION_REFUSED", &[&cmd.name]);
        return false;
    }
    let flags: Vec<&str> = FLAG_NAMES
        .iter()
        .filter(|(_, f)| cmd.effective_flags & f != 0)
        .map(|(n, _)| *n)
        .collect();
    let flags = format!("+{}", flags.join(",+"));
    world.reply(&inv.user, "MCMSG_COMMAND_FLAGS", &[&flags]);
    if cmd.rules.min_opserv_level > 0 {
        world.reply(
            &inv.user,
            "MCMSG_NEED_OPSERV_LEVEL",
            &[&cmd.rules.min_opserv_level],
        );
    }
    if cmd.rules.min_channel_access > 0 {
        world.reply(
            &inv.user,
            "MCMSG_NEED_CHANSERV_LEVEL",
            &[&cmd.rules.min_channel_access],
        );
    }
    world.reply(&inv.user, "MCMSG_END_REQUIREMENTS", &[&cmd.name]);
    true
}

/// `readhelp <module>`: re-read a module's helpfile.
pub fn cmd_readhelp(world: &mut World, inv: &Invocation) -> bool {
    let module = inv.arg(1).unwrap_or("").to_string();
    let started = std::time::Instant::now();
    match world.modcmd.read_help(&module) {
        Ok(_) => {
            let elapsed = started.elapsed();
            world.reply(
                &inv.user,
                "MCMSG_HELPFILE_READ",
                &[&module, &elapsed.as_secs(), &elapsed.subsec_millis()],
            );
            true
        }
        Err(err) => {
            info!(module = %module, error = %err, "Helpfile read failed");
            world.reply(&inv.user, "MCMSG_HELPFILE_ERROR", &[&module]);
            false
        }
    }
}

/// `showcommands`: every binding the caller could invoke.
pub fn cmd_showcommands(world: &mut World, inv: &Invocation) -> bool {
    let bot = inv.bot.clone();
    world.reply(&inv.user, "MCMSG_SERVICE_INFO", &[&bot]);
    let names: Vec<String> = world
        .modcmd
        .service(&inv.service)
        .map(|s| s.commands.keys().map(str::to_string).collect())
        .unwrap_or_default();
    for chunk in names.chunks(8) {
        let row = chunk.join("  ");
        world.reply(&inv.user, "MCMSG_COMMAND_ROW", &[&row]);
    }
    true
}

/// `help [topic]`: bindings first, then each module's help store, then
/// the index.
pub fn cmd_help(world: &mut World, inv: &Invocation) -> bool {
    let topic = if inv.argv.len() > 1 {
        inv.argv[1..].join(" ")
    } else {
        "<index>".to_string()
    };
    // A binding with this name documents the underlying command.
    let binding = world
        .modcmd
        .service(&inv.service)
        .and_then(|s| s.commands.get(&topic))
        .cloned();
    if let Some(cmd) = binding {
        let title = cmd.name.to_uppercase();
        world.reply(&inv.user, "MCMSG_HELP_COMMAND_HEADER", &[&title]);
        if !cmd.alias.is_empty() {
            let expansion = cmd.alias.join(" ");
            world.reply(&inv.user, "MCMSG_COMMAND_ALIASES", &[&cmd.name, &expansion]);
        }
        let text = world
            .modcmd
            .modules
            .get(&cmd.modcmd.0)
            .and_then(|m| m.help.get(&cmd.modcmd.1))
            .cloned();
        match text {
            Some(text) => {
                for line in text.lines() {
                    let line = line.to_string();
                    world.reply(&inv.user, "MCMSG_HELP_LINE", &[&line]);
                }
                return true;
            }
            None => {
                world.reply(&inv.user, "MSG_TOPIC_UNKNOWN", &[]);
                return false;
            }
        }
    }
    // Module help stores, in the service's search order.
    let modules: Vec<String> = world
        .modcmd
        .service(&inv.service)
        .map(|s| s.modules.clone())
        .unwrap_or_default();
    for module in modules {
        let text = world
            .modcmd
            .modules
            .get(&module)
            .and_then(|m| m.help.get(&topic))
            .cloned();
        if let Some(text) = text {
            for line in text.lines() {
                let line = line.to_string();
                world.reply(&inv.user, "MCMSG_HELP_LINE", &[&line]);
            }
            return true;
        }
    }
    world.reply(&inv.user, "MSG_TOPIC_UNKNOWN", &[]);
    false
}

/// Prefix-joiner: `stats` lists `stats modules` etc.; with arguments it
/// re-dispatches to the concatenated name.
pub fn cmd_joiner(world: &mut World, inv: &Invocation) -> bool {
    if inv.argv.len() < 2 {
        let prefix = format!("{} ", inv.cmd_name);
        let subs: Vec<String> = world
            .modcmd
            .service(&inv.service)
            .map(|s| {
                s.commands
                    .keys()
                    .filter(|n| {
                        n.len() > prefix.len() && irc_eq(&n[..prefix.len()], &prefix)
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let listing = subs.join(", ");
        world.reply(&inv.user, "MCMSG_JOINER_CHOICES", &[&inv.cmd_name, &listing]);
        return true;
    }
    let mut argv = vec![format!("{} {}", inv.cmd_name, inv.argv[1])];
    argv.extend(inv.argv[2..].iter().cloned());
    invoke_argv(
        world,
        &inv.user,
        &inv.service,
        inv.channel.clone(),
        argv,
        false,
    );
    // The recursive dispatch logs for itself.
    false
}

pub fn cmd_stats_modules(world: &mut World, inv: &Invocation) -> bool {
    let rows: Vec<(String, usize)> = world
        .modcmd
        .modules
        .iter()
        .map(|(name, m)| (name.to_string(), m.commands.len()))
        .collect();
    world.reply(&inv.user, "MCMSG_MODULE_STATS", &[&rows.len()]);
    for (name, count) in rows {
        world.reply(&inv.user, "MCMSG_MODULE_ROW", &[&name, &count]);
    }
    true
}

pub fn cmd_stats_services(world: &mut World, inv: &Invocation) -> bool {
    let rows: Vec<(String, String, usize)> = world
        .modcmd
        .services
        .iter()
        .map(|(name, s)| (name.to_string(), s.bot.clone(), s.commands.len()))
        .collect();
    world.reply(&inv.user, "MCMSG_SERVICE_STATS", &[&rows.len()]);
    for (name, bot, count) in rows {
        world.reply(&inv.user, "MCMSG_SERVICE_ROW", &[&name, &bot, &count]);
    }
    true
}

pub fn cmd_stats_databases(world: &mut World, inv: &Invocation) -> bool {
    let names = world.saxdb.names();
    world.reply(&inv.user, "MCMSG_DB_STATS", &[&names.len()]);
    for name in names {
        let (filename, interval, mondo) = world
            .saxdb
            .get(&name)
            .map(|d| {
                (
                    d.filename.clone(),
                    d.write_interval,
                    d.mondo_section.clone().unwrap_or_default(),
                )
            })
            .unwrap_or_default();
        world.reply(
            &inv.user,
            "MCMSG_DB_ROW",
            &[&name, &filename, &interval, &mondo],
        );
    }
    true
}

/// `service add <nick> <description>`: a new bot persona.
pub fn cmd_service_add(world: &mut World, inv: &Invocation) -> bool {
    let nick = inv.arg(1).unwrap_or("").to_string();
    if nick.is_empty() || nick.starts_with('#') || nick.chars().any(|c| c.is_whitespace()) {
        world.reply(&inv.user, "MCMSG_BAD_SERVICE_NICK", &[&nick]);
        return false;
    }
    if world.modcmd.service_by_nick(&nick).is_some() {
        world.reply(&inv.user, "MCMSG_ALREADY_SERVICE", &[&nick]);
        return false;
    }
    world.modcmd.register_service(&nick, &nick, None, false);
    world.users.insert(
        &nick,
        OnlineUser {
            nick: nick.clone(),
            ident: "services".to_string(),
            host: "services".to_string(),
            account: None,
            oper: true,
            is_service: true,
            policer: crate::policer::Policer::new(),
        },
    );
    bind_user_service(world, &nick);
    world.reply(&inv.user, "MCMSG_NEW_SERVICE", &[&nick]);
    true
}

/// `service rename <service> <newnick>`
pub fn cmd_service_rename(world: &mut World, inv: &Invocation) -> bool {
    let Some(service) = find_service_by_arg(world, inv.arg(1).unwrap_or("")) else {
        let arg = inv.arg(1).unwrap_or("").to_string();
        world.reply(&inv.user, "MCMSG_UNKNOWN_SERVICE", &[&arg]);
        return false;
    };
    let new_nick = inv.arg(2).unwrap_or("").to_string();
    if new_nick.is_empty() || new_nick.starts_with('#') {
        world.reply(&inv.user, "MCMSG_BAD_SERVICE_NICK", &[&new_nick]);
        return false;
    }
    let old_nick = world
        .modcmd
        .service(&service)
        .map(|s| s.bot.clone())
        .unwrap_or_default();
    if let Some(s) = world.modcmd.service_mut(&service) {
        s.bot = new_nick.clone();
    }
    if let Some(mut user) = world.users.remove(&old_nick) {
        user.nick = new_nick.clone();
        world.users.insert(&new_nick, user);
    }
    world.reply(&inv.user, "MCMSG_SERVICE_RENAMED", &[&new_nick]);
    true
}

/// `service trigger <service> [char]`
pub fn cmd_service_trigger(world: &mut World, inv: &Invocation) -> bool {
    let Some(service) = find_service_by_arg(world, inv.arg(1).unwrap_or("")) else {
        let arg = inv.arg(1).unwrap_or("").to_string();
        world.reply(&inv.user, "MCMSG_UNKNOWN_SERVICE", &[&arg]);
        return false;
    };
    let bot = world
        .modcmd
        .service(&service)
        .map(|s| s.bot.clone())
        .unwrap_or_default();
    match inv.arg(2) {
        None => {
            let trigger = world.modcmd.service(&service).and_then(|s| s.trigger);
            match trigger {
                Some(c) => world.reply(&inv.user, "MCMSG_CURRENT_TRIGGER", &[&bot, &c]),
                None => world.reply(&inv.user, "MCMSG_NO_TRIGGER", &[&bot]),
            }
            true
        }
        Some(arg) => {
            let trigger = if irc_eq(arg, "none") || irc_eq(arg, "remove") {
                None
            } else {
                arg.chars().next()
            };
            if let Some(s) = world.modcmd.service_mut(&service) {
                s.trigger = trigger;
            }
            match trigger {
                Some(c) => world.reply(&inv.user, "MCMSG_NEW_TRIGGER", &[&bot, &c]),
                None => world.reply(&inv.user, "MCMSG_REMOVED_TRIGGER", &[&bot]),
            }
            true
        }
    }
}

/// `service privileged <service> <on|off>`
pub fn cmd_service_privileged(world: &mut World, inv: &Invocation) -> bool {
    let Some(service) = find_service_by_arg(world, inv.arg(1).unwrap_or("")) else {
        let arg = inv.arg(1).unwrap_or("").to_string();
        world.reply(&inv.user, "MCMSG_UNKNOWN_SERVICE", &[&arg]);
        return false;
    };
    let on = match inv.arg(2) {
        Some(v) if irc_eq(v, "on") || v == "1" => true,
        Some(v) if irc_eq(v, "off") || v == "0" => false,
        other => {
            let arg = other.unwrap_or("").to_string();
            world.reply(&inv.user, "MSG_INVALID_BINARY", &[&arg]);
            return false;
        }
    };
    let bot = world
        .modcmd
        .service(&service)
        .map(|s| s.bot.clone())
        .unwrap_or_default();
    if let Some(s) = world.modcmd.service_mut(&service) {
        s.privileged = on;
    }
    let state = if on { "privileged" } else { "unprivileged" };
    world.reply(&inv.user, "MCMSG_SERVICE_PRIVILEGED", &[&bot, &state]);
    true
}

/// `service remove <service>`
pub fn cmd_service_remove(world: &mut World, inv: &Invocation) -> bool {
    let Some(service) = find_service_by_arg(world, inv.arg(1).unwrap_or("")) else {
        let arg = inv.arg(1).unwrap_or("").to_string();
        world.reply(&inv.user, "MCMSG_UNKNOWN_SERVICE", &[&arg]);
        return false;
    };
    let bot = world
        .modcmd
        .service(&service)
        .map(|s| s.bot.clone())
        .unwrap_or_default();
    // Unbinding each command keeps the per-implementation counts right.
    let names: Vec<String> = world
        .modcmd
        .service(&service)
        .map(|s| s.commands.keys().map(str::to_string).collect())
        .unwrap_or_default();
    for name in names {
        let _ = world.modcmd.unbind(&service, &name);
    }
    world.modcmd.services.remove(&service);
    world.users.remove(&bot);
    world.reply(&inv.user, "MCMSG_SERVICE_REMOVED", &[&bot]);
    true
}

/// `god [on|off]`: toggle security override on the caller's account.
pub fn cmd_god(world: &mut World, inv: &Invocation) -> bool {
    let Some(handle) = world.users.get(&inv.user).and_then(|u| u.account.clone()) else {
        return false;
    };
    let currently = world
        .accounts
        .get(&handle)
        .is_some_and(|h| h.flags & HANDLE_HELPING != 0);
    let target = match inv.arg(1) {
        Some(v) if irc_eq(v, "on") || v == "1" => {
            if currently {
                world.reply(&inv.user, "MCMSG_ALREADY_HELPING", &[]);
                return false;
            }
            true
        }
        Some(v) if irc_eq(v, "off") || v == "0" => {
            if !currently {
                world.reply(&inv.user, "MCMSG_ALREADY_NOT_HELPING", &[]);
                return false;
            }
            false
        }
        Some(other) => {
            let other = other.to_string();
            world.reply(&inv.user, "MSG_INVALID_BINARY", &[&other]);
            return false;
        }
        None => !currently,
    };
    if let Some(h) = world.accounts.get_mut(&handle) {
        if target {
            h.flags |= HANDLE_HELPING;
        } else {
            h.flags &= !HANDLE_HELPING;
        }
    }
    let key = if target {
        "MCMSG_NOW_HELPING"
    } else {
        "MCMSG_NOW_NOT_HELPING"
    };
    world.reply(&inv.user, key, &[]);
    true
}

pub fn cmd_version(world: &mut World, inv: &Invocation) -> bool {
    let version = env!("CARGO_PKG_VERSION");
    world.reply(&inv.user, "MCMSG_VERSION", &[&version]);
    true
}

/// `timecmd <command...>`: run a command and report its wall time.
pub fn cmd_timecmd(world: &mut World, inv: &Invocation) -> bool {
    let line = inv.argv[1..].join(" ");
    let started = std::time::Instant::now();
    super::dispatch::invoke_service_text(
        world,
        &inv.user,
        &inv.service,
        inv.channel.clone(),
        &line,
        false,
    );
    let elapsed = started.elapsed();
    world.reply(
        &inv.user,
        "MCMSG_COMMAND_TIME",
        &[&line, &elapsed.as_secs(), &elapsed.subsec_micros()],
    );
    true
}
