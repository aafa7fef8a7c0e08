//! The dispatch pipeline and permission predicate.
//!
//! Text addressed to a service bot flows through here: command word
//! identification (with the channel-name swap), alias expansion, the
//! permission gate, invocation, and audit logging. Handlers return a
//! bare "worth logging" flag; every message and every audit record is
//! produced by this layer.

use super::{
    alias, ACTION_ALLOW, ACTION_NOCHANNEL, ACTION_OVERRIDE, ACTION_STAFF, CommandFn, Invocation,
    Rules, MODCMD_ACCEPT_CHANNEL, MODCMD_ACCEPT_PCHANNEL, MODCMD_DISABLED,
    MODCMD_IGNORE_CSUSPEND, MODCMD_LOG_HOSTMASK, MODCMD_NEVER_CSUSPEND, MODCMD_NO_LOG,
    MODCMD_REQUIRE_AUTHED, MODCMD_REQUIRE_CHANNEL, MODCMD_REQUIRE_CHANUSER,
    MODCMD_REQUIRE_HELPING, MODCMD_REQUIRE_JOINABLE, MODCMD_REQUIRE_NETWORK_HELPER,
    MODCMD_REQUIRE_OPER, MODCMD_REQUIRE_QUALIFIED, MODCMD_REQUIRE_REGCHAN,
    MODCMD_REQUIRE_STAFF, MODCMD_REQUIRE_SUPPORT_HELPER, MODCMD_TOY,
};
use crate::accounts::{HANDLE_HELPING, HANDLE_SUSPENDED};
use crate::chanserv::model::{CHANNEL_SUSPENDED, LVL_PUBCMD, UL_OWNER};
use crate::ircstr::{irc_eq, is_channel_name};
use crate::state::{World, MODE_INVITEONLY, MODE_KEY, MODE_SECRET};
use tracing::info;

pub const SVCCMD_QUALIFIED: u32 = 0x01;
pub const SVCCMD_DEBIT: u32 = 0x02;
pub const SVCCMD_NOISY: u32 = 0x04;

/// Snapshot of one binding, detached from the registry so handlers can
/// take `&mut World`.
#[derive(Clone)]
pub struct BoundCmd {
    pub name: String,
    pub modcmd: (String, String),
    pub rules: Rules,
    pub effective_flags: u32,
    pub alias: Vec<String>,
    pub func: CommandFn,
    pub min_argc: usize,
}

/// Caller attributes sampled once per dispatch.
#[derive(Debug, Clone, Default)]
struct CallerView {
    authed: bool,
    handle_flags: u32,
    oper_level: u32,
    is_oper: bool,
    is_service: bool,
    hostmask: String,
}

fn caller_view(world: &World, nick: &str) -> CallerView {
    let mut view = CallerView::default();
    if let Some(user) = world.users.get(nick) {
        view.is_oper = user.oper;
        view.is_service = user.is_service;
        view.hostmask = user.hostmask();
    }
    if let Some(handle) = world.account_of(nick) {
        view.authed = true;
        view.handle_flags = handle.flags;
        view.oper_level = handle.oper_level;
    }
    view
}

fn snapshot(world: &World, service: &str, name: &str) -> Option<BoundCmd> {
    let svc = world.modcmd.service(service)?;
    let cmd = svc.commands.get(name)?;
    let imp = world.modcmd.modcmd(&cmd.modcmd.0, &cmd.modcmd.1)?;
    Some(BoundCmd {
        name: cmd.name.clone(),
        modcmd: cmd.modcmd.clone(),
        rules: cmd.rules,
        effective_flags: cmd.effective_flags,
        alias: cmd.alias.clone(),
        func: imp.func,
        min_argc: imp.min_argc,
    })
}

/// Entry point for a text line addressed to a service.
pub fn invoke_service_text(
    world: &mut World,
    user: &str,
    service: &str,
    channel: Option<String>,
    text: &str,
    qualified: bool,
) -> bool {
    let argv: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if argv.is_empty() {
        return false;
    }
    let Some(svc) = world.modcmd.service(service) else {
        return false;
    };
    let (privileged, bot) = (svc.privileged, svc.bot.clone());
    let view = caller_view(world, user);
    if privileged {
        if !view.is_oper {
            world.reply(user, "MSG_COMMAND_PRIVILEGED", &[&bot]);
            return false;
        }
        if !view.authed {
            world.reply(user, "MSG_AUTHENTICATE", &[]);
            return false;
        }
        if view.handle_flags & HANDLE_SUSPENDED != 0 {
            world.reply(user, "MSG_OPER_SUSPENDED", &[]);
            return false;
        }
    }
    // Debit the caller's command policer; floods are dropped silently.
    let params = if view.handle_flags & HANDLE_HELPING != 0 {
        world.conf.policer_god
    } else if view.is_oper {
        world.conf.policer_oper
    } else {
        world.conf.policer_luser
    };
    let now = world.now;
    if let Some(u) = world.users.get_mut(user) {
        if !u.policer.accept(now, &params) {
            return false;
        }
    }
    invoke_argv(world, user, service, channel, argv, qualified)
}

/// The core pipeline over an already-split argv.
pub fn invoke_argv(
    world: &mut World,
    user: &str,
    service: &str,
    mut channel: Option<String>,
    mut argv: Vec<String>,
    qualified: bool,
) -> bool {
    let Some(svc) = world.modcmd.service(service) else {
        return false;
    };
    let is_chanserv = irc_eq(service, "chanserv");
    let bot = svc.bot.clone();

    // Commands issued in a registered channel may be gated by PubCmd.
    if let Some(ref chan) = channel {
        if is_chanserv
            && world.chanserv.channels.contains(chan)
            && !crate::chanserv::access::check_user_level(world, chan, user, LVL_PUBCMD, true, false)
        {
            let chan = chan.clone();
            world.reply(user, "MCMSG_PUBLIC_DENY", &[&chan]);
            return false;
        }
    }

    let options = if qualified { SVCCMD_QUALIFIED } else { 0 } | SVCCMD_DEBIT | SVCCMD_NOISY;

    // Identify the command word; a leading channel name shifts it.
    let mut cmd_arg = usize::from(is_channel_name(&argv[0]));
    if argv.len() < cmd_arg + 1 {
        world.reply(user, "MCMSG_MISSING_COMMAND", &[]);
        return false;
    }
    if !argv[cmd_arg].starts_with(|c: char| c.is_ascii_alphanumeric()) {
        // Silently ignore things that cannot be commands.
        return false;
    }
    let Some(cmd) = snapshot(world, service, &argv[cmd_arg]) else {
        let word = argv[cmd_arg].clone();
        world.reply(user, "MSG_COMMAND_UNKNOWN", &[&word]);
        return false;
    };
    let flags = cmd.effective_flags;

    // If a channel name came first, check the command accepts one and
    // swap it behind the command word.
    if cmd_arg == 1 {
        if flags & MODCMD_ACCEPT_CHANNEL == 0 {
            world.reply(user, "MCMSG_NO_CHANNEL_BEFORE", &[]);
            return false;
        }
        if flags & MODCMD_ACCEPT_PCHANNEL == 0 && argv[0].starts_with('+') {
            world.reply(user, "MCMSG_NO_PLUS_CHANNEL", &[]);
            return false;
        }
        argv.swap(0, 1);
    }

    let grab_channel = |world: &World, argv: &mut Vec<String>, channel: &mut Option<String>| {
        if argv.len() > 1
            && flags & MODCMD_ACCEPT_CHANNEL != 0
            && is_channel_name(&argv[1])
            && (!argv[1].starts_with('+') || flags & MODCMD_ACCEPT_PCHANNEL != 0)
            && world.channels.contains(&argv[1])
        {
            *channel = Some(
                world
                    .channels
                    .display_key(&argv[1])
                    .unwrap_or(&argv[1])
                    .to_string(),
            );
            argv.remove(1);
            true
        } else {
            false
        }
    };
    let mut channel_from_arg = grab_channel(world, &mut argv, &mut channel);

    // Expand alias bindings, then retry the channel grab on the new
    // argument list.
    if !cmd.alias.is_empty() {
        let Some(expanded) = alias::expand(&cmd.alias, &argv) else {
            tracing::error!(
                service,
                command = %cmd.name,
                "Alias expansion parse error"
            );
            world.reply(user, "MCMSG_ALIAS_ERROR", &[&cmd.name.clone()]);
            return false;
        };
        argv = expanded;
        if argv.is_empty() {
            world.reply(user, "MCMSG_ALIAS_ERROR", &[&cmd.name.clone()]);
            return false;
        }
        channel_from_arg |= grab_channel(world, &mut argv, &mut channel);
    }

    // Toys never honor a manually-supplied channel.
    if channel_from_arg && flags & MODCMD_TOY != 0 {
        channel = None;
    }
    if argv.len() < cmd.min_argc {
        let name = cmd.name.clone();
        world.reply(user, "MSG_MISSING_PARAMS", &[&name]);
        return false;
    }
    let perms = can_invoke(world, user, &bot, &cmd, channel.as_deref(), options);
    if perms == 0 {
        return false;
    }
    if perms & ACTION_NOCHANNEL != 0 {
        channel = None;
    }

    if let Some(c) = world
        .modcmd
        .services
        .get_mut(service)
        .and_then(|s| s.commands.get_mut(&cmd.name))
    {
        c.uses += 1;
    }

    let inv = Invocation {
        user: user.to_string(),
        service: service.to_string(),
        bot: bot.clone(),
        channel: channel.clone(),
        argv: argv.clone(),
        cmd_name: cmd.name.clone(),
        modcmd: cmd.modcmd.clone(),
        effective_flags: flags,
        perms,
    };
    if !(cmd.func)(world, &inv) {
        return false;
    }
    if flags & MODCMD_NO_LOG == 0 {
        let severity = if perms & ACTION_STAFF != 0 {
            "staff"
        } else if perms & ACTION_OVERRIDE != 0 {
            "override"
        } else {
            "command"
        };
        let view = caller_view(world, user);
        let source = if flags & MODCMD_LOG_HOSTMASK != 0 {
            view.hostmask
        } else {
            user.to_string()
        };
        info!(
            target: "audit",
            severity,
            source = %source,
            bot = %bot,
            channel = channel.as_deref().unwrap_or(""),
            line = %argv.join(" "),
            "command"
        );
    }
    true
}

/// The permission predicate: every gate in order, noisy errors to the
/// caller, and a bit-set describing how the invocation was allowed.
pub fn can_invoke(
    world: &mut World,
    user: &str,
    bot: &str,
    cmd: &BoundCmd,
    channel: Option<&str>,
    options: u32,
) -> u32 {
    let noisy = options & SVCCMD_NOISY != 0;
    let flags = cmd.effective_flags;
    let view = caller_view(world, user);
    let mut rflags = 0;

    if flags & MODCMD_DISABLED != 0 {
        if noisy {
            world.reply(user, "MSG_COMMAND_DISABLED", &[&cmd.name.clone()]);
        }
        return 0;
    }
    if flags & MODCMD_REQUIRE_QUALIFIED != 0 && options & SVCCMD_QUALIFIED == 0 {
        if noisy {
            world.reply(
                user,
                "MCMSG_MUST_QUALIFY",
                &[&bot.to_string(), &cmd.name.clone(), &bot.to_string()],
            );
        }
        return 0;
    }
    if flags & MODCMD_REQUIRE_AUTHED != 0 {
        if !view.authed {
            if noisy {
                world.reply(user, "MSG_AUTHENTICATE", &[]);
            }
            return 0;
        }
        if view.handle_flags & HANDLE_SUSPENDED != 0 {
            if noisy {
                world.reply(user, "MCMSG_ACCOUNT_SUSPENDED", &[]);
            }
            return 0;
        }
    }

    if channel.is_some() || noisy {
        if flags & MODCMD_REQUIRE_CHANNEL != 0 && channel.is_none() {
            if noisy {
                world.reply(user, "MSG_INVALID_CHANNEL", &[]);
            }
            return 0;
        }
        if let Some(chan) = channel {
            if flags & MODCMD_REQUIRE_REGCHAN != 0 {
                let Some(reg) = world.chanserv.channels.get(chan) else {
                    if noisy {
                        let chan = chan.to_string();
                        world.reply(user, "MCMSG_CHAN_NOT_REGISTERED", &[&chan]);
                    }
                    return 0;
                };
                if reg.flags & CHANNEL_SUSPENDED != 0 && flags & MODCMD_IGNORE_CSUSPEND == 0 {
                    // Security-override users may work in suspended
                    // channels, flagged as a staff action.
                    if view.handle_flags & HANDLE_HELPING == 0
                        || flags & MODCMD_NEVER_CSUSPEND != 0
                    {
                        if noisy {
                            let chan = chan.to_string();
                            let reason = reg
                                .suspended
                                .as_ref()
                                .map(|s| s.reason.clone())
                                .unwrap_or_default();
                            world.reply(user, "MCMSG_CHAN_SUSPENDED", &[&chan, &reason]);
                        }
                        return 0;
                    }
                    rflags |= ACTION_STAFF;
                }
            }
            if flags & MODCMD_REQUIRE_CHANUSER != 0 {
                let level =
                    crate::chanserv::access::channel_user_level(world, chan, user, true, false);
                match level {
                    None => {
                        if noisy {
                            let chan = chan.to_string();
                            world.reply(user, "MCMSG_NO_CHANNEL_ACCESS", &[&chan]);
                        }
                        return 0;
                    }
                    Some(level) if level < cmd.rules.min_channel_access => {
                        if noisy {
                            let chan = chan.to_string();
                            world.reply(user, "MCMSG_LOW_CHANNEL_ACCESS", &[&chan]);
                        }
                        return 0;
                    }
                    Some(_) => {}
                }
            }
            if flags & MODCMD_REQUIRE_JOINABLE != 0 {
                let level =
                    crate::chanserv::access::channel_user_level(world, chan, user, true, false);
                let closed = world
                    .channels
                    .get(chan)
                    .is_some_and(|c| c.modes.mask & (MODE_INVITEONLY | MODE_KEY | MODE_SECRET) != 0);
                let present = world
                    .channels
                    .get(chan)
                    .is_some_and(|c| c.members.contains(user));
                if closed && level.is_none() && !view.is_service && !present {
                    if noisy {
                        let chan = chan.to_string();
                        world.reply(user, "MCMSG_REQUIRES_JOINABLE", &[&chan]);
                    }
                    return 0;
                }
            }
            if flags & MODCMD_TOY != 0 {
                match world.chanserv.channels.get(chan) {
                    None => rflags |= ACTION_NOCHANNEL,
                    Some(reg) => match reg.ch_opts[crate::chanserv::model::CH_TOYS] {
                        'd' => {
                            if noisy {
                                let chan = chan.to_string();
                                world.reply(user, "MCMSG_TOYS_DISABLED", &[&chan]);
                            }
                            return 0;
                        }
                        'n' => rflags |= ACTION_NOCHANNEL,
                        _ => {}
                    },
                }
            }
        }
    }

    if flags & MODCMD_REQUIRE_STAFF != 0 {
        let helper_ok = |get: fn(&crate::accounts::Handle) -> bool| {
            world.account_of(user).map(get).unwrap_or(false)
        };
        let allowed = (flags & MODCMD_REQUIRE_OPER != 0 && view.is_oper)
            || (flags & MODCMD_REQUIRE_NETWORK_HELPER != 0
                && helper_ok(crate::accounts::Handle::is_network_helper))
            || (flags & MODCMD_REQUIRE_SUPPORT_HELPER != 0
                && helper_ok(crate::accounts::Handle::is_support_helper));
        if allowed {
            rflags |= ACTION_STAFF;
        } else {
            if noisy {
                world.reply(user, "MSG_COMMAND_PRIVILEGED", &[&cmd.name.clone()]);
            }
            return 0;
        }
    }
    if flags & MODCMD_REQUIRE_HELPING != 0 {
        if view.handle_flags & HANDLE_HELPING == 0 {
            if noisy {
                world.reply(user, "MCMSG_MUST_BE_HELPING", &[]);
            }
            return 0;
        }
        rflags |= ACTION_STAFF;
    }
    if cmd.rules.min_opserv_level > 0 {
        if view.oper_level < cmd.rules.min_opserv_level {
            if noisy {
                world.reply(user, "MSG_NO_ACCESS", &[]);
            }
            return 0;
        }
        rflags |= ACTION_STAFF;
    }
    if cmd.rules.req_account_flags != 0 || cmd.rules.deny_account_flags != 0 {
        if !view.authed {
            if noisy {
                world.reply(user, "MSG_AUTHENTICATE", &[]);
            }
            return 0;
        }
        if cmd.rules.req_account_flags & !view.handle_flags != 0
            || cmd.rules.deny_account_flags & view.handle_flags != 0
        {
            if noisy {
                world.reply(user, "MSG_COMMAND_PRIVILEGED", &[&cmd.name.clone()]);
            }
            return 0;
        }
    }

    // A security-override caller acting below the binding's threshold is
    // flagged so the audit log records the override.
    if flags & MODCMD_REQUIRE_CHANUSER != 0 && noisy {
        if let Some(chan) = channel {
            let with_override =
                crate::chanserv::access::channel_user_level(world, chan, user, true, false);
            let true_level =
                crate::chanserv::access::channel_user_level(world, chan, user, false, false);
            if with_override.is_some_and(|l| l > UL_OWNER)
                && true_level.unwrap_or(0) < cmd.rules.min_channel_access
                && flags & (MODCMD_REQUIRE_STAFF | MODCMD_REQUIRE_HELPING) == 0
            {
                rflags |= ACTION_OVERRIDE;
            }
        }
    }
    rflags | ACTION_ALLOW
}
