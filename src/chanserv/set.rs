//! The SET command family: numeric level options, multiple-choice
//! character options, string options and flag toggles.

use super::access::{channel_user_level, check_user_level};
use super::model::{
    CHANNEL_DYNAMIC_LIMIT, CHANNEL_NODELETE, CHANNEL_OFFCHANNEL, CHANNEL_UNREVIEWED,
    CHAR_OPTIONS, CH_CTCPREACTION, CH_PROTECT, CH_TOPICREFRESH, CH_TOYS, LEVEL_OPTIONS,
    LVL_GIVE_OPS, LVL_GIVE_VOICE, LVL_SETTERS, NUM_CHAR_OPTIONS, NUM_LEVEL_OPTIONS, UL_HELPER,
    UL_OWNER,
};
use crate::accounts::HANDLE_HELPING;
use crate::actions::Action;
use crate::ircstr::irc_eq;
use crate::modcmd::Invocation;
use crate::state::{ModeChange, ModeLock, ModeOp, TimerEvent, World};

/// Display keys per level option, same order as the option table.
static LEVEL_DISPLAY: [&str; NUM_LEVEL_OPTIONS] = [
    "CSMSG_SET_GIVE_VOICE",
    "CSMSG_SET_GIVE_OPS",
    "CSMSG_SET_ENFOPS",
    "CSMSG_SET_ENFMODES",
    "CSMSG_SET_ENFTOPIC",
    "CSMSG_SET_PUBCMD",
    "CSMSG_SET_SETTERS",
    "CSMSG_SET_CTCPUSERS",
    "CSMSG_SET_USERINFO",
    "CSMSG_SET_INVITEME",
    "CSMSG_SET_TOPICSNARF",
];

static CHAR_DISPLAY: [&str; NUM_CHAR_OPTIONS] = [
    "CSMSG_SET_PROTECT",
    "CSMSG_SET_TOYS",
    "CSMSG_SET_TOPICREFRESH",
    "CSMSG_SET_CTCPREACTION",
];

/// Description key for each character-option value.
fn char_value_key(opt: usize, value: char) -> &'static str {
    match (opt, value) {
        (CH_PROTECT, 'a') => "CSMSG_PROTECT_ALL",
        (CH_PROTECT, 'e') => "CSMSG_PROTECT_EQUAL",
        (CH_PROTECT, 'l') => "CSMSG_PROTECT_LOWER",
        (CH_PROTECT, 'n') => "CSMSG_PROTECT_NONE",
        (CH_TOYS, 'd') => "CSMSG_TOYS_DISABLED",
        (CH_TOYS, 'n') => "CSMSG_TOYS_PRIVATE",
        (CH_TOYS, 'p') => "CSMSG_TOYS_PUBLIC",
        (CH_TOPICREFRESH, 'n') => "CSMSG_TOPICREFRESH_NEVER",
        (CH_TOPICREFRESH, '1') => "CSMSG_TOPICREFRESH_3_HOURS",
        (CH_TOPICREFRESH, '2') => "CSMSG_TOPICREFRESH_6_HOURS",
        (CH_TOPICREFRESH, '3') => "CSMSG_TOPICREFRESH_12_HOURS",
        (CH_TOPICREFRESH, '4') => "CSMSG_TOPICREFRESH_24_HOURS",
        (CH_CTCPREACTION, 'k') => "CSMSG_CTCPREACTION_KICK",
        (CH_CTCPREACTION, 'b') => "CSMSG_CTCPREACTION_KICKBAN",
        (CH_CTCPREACTION, 't') => "CSMSG_CTCPREACTION_SHORTBAN",
        (CH_CTCPREACTION, 'T') => "CSMSG_CTCPREACTION_LONGBAN",
        _ => "CSMSG_INVALID_NUMERIC",
    }
}

fn actor_level(world: &World, inv: &Invocation) -> u16 {
    inv.channel()
        .and_then(|c| channel_user_level(world, c, &inv.user, true, false))
        .unwrap_or(0)
}

/// Modifications require the channel's Setters level; display does not.
fn may_modify(world: &mut World, inv: &Invocation, channel: &str) -> bool {
    if check_user_level(world, channel, &inv.user, LVL_SETTERS, true, false) {
        true
    } else {
        world.reply(&inv.user, "CSMSG_CANNOT_SET", &[]);
        false
    }
}

fn parse_on_off(arg: &str) -> Option<bool> {
    if irc_eq(arg, "on") || arg == "1" {
        Some(true)
    } else if irc_eq(arg, "off") || arg == "0" {
        Some(false)
    } else {
        None
    }
}

fn show_level_option(world: &mut World, inv: &Invocation, channel: &str, opt: usize) {
    let value = world
        .chanserv
        .channels
        .get(channel)
        .map_or(0, |r| r.lvl_opts[opt]);
    world.reply(&inv.user, LEVEL_DISPLAY[opt], &[&value]);
}

fn set_level_option(world: &mut World, inv: &Invocation, opt: usize) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(arg) = inv.arg(1) else {
        show_level_option(world, inv, &channel, opt);
        return true;
    };
    if !may_modify(world, inv, &channel) {
        return false;
    }
    let Some(value) = arg.parse::<u16>().ok().filter(|v| *v <= 501) else {
        let arg = arg.to_string();
        world.reply(&inv.user, "CSMSG_INVALID_ACCESS", &[&arg]);
        return false;
    };
    let actor = actor_level(world, inv);
    if value > actor && actor < UL_HELPER {
        world.reply(&inv.user, "CSMSG_BAD_SETLEVEL", &[]);
        return false;
    }
    let (give_ops, give_voice) = world
        .chanserv
        .channels
        .get(&channel)
        .map_or((0, 0), |r| (r.lvl_opts[LVL_GIVE_OPS], r.lvl_opts[LVL_GIVE_VOICE]));
    if opt == LVL_GIVE_VOICE && value > give_ops {
        world.reply(&inv.user, "CSMSG_BAD_GIVEVOICE", &[&give_ops]);
        return false;
    }
    if opt == LVL_GIVE_OPS && value < give_voice {
        world.reply(&inv.user, "CSMSG_BAD_GIVEOPS", &[&give_voice]);
        return false;
    }
    if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
        reg.lvl_opts[opt] = value;
    }
    show_level_option(world, inv, &channel, opt);
    true
}

fn show_char_option(world: &mut World, inv: &Invocation, channel: &str, opt: usize) {
    let value = world
        .chanserv
        .channels
        .get(channel)
        .map_or(CHAR_OPTIONS[opt].1, |r| r.ch_opts[opt]);
    let choice = CHAR_OPTIONS[opt]
        .2
        .chars()
        .position(|c| c == value)
        .unwrap_or(0);
    let description = crate::msg::render(char_value_key(opt, value), &[], &world.bot_names());
    world.reply(&inv.user, CHAR_DISPLAY[opt], &[&choice, &description]);
}

fn set_char_option(world: &mut World, inv: &Invocation, opt: usize) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(arg) = inv.arg(1) else {
        show_char_option(world, inv, &channel, opt);
        return true;
    };
    if !may_modify(world, inv, &channel) {
        return false;
    }
    let legal = CHAR_OPTIONS[opt].2;
    // Accept the value character itself or its index in the choices.
    let value = if arg.len() == 1 && legal.contains(arg) {
        arg.chars().next()
    } else {
        arg.parse::<usize>().ok().and_then(|n| legal.chars().nth(n))
    };
    let Some(value) = value else {
        let n: i64 = arg.parse().unwrap_or(-1);
        world.reply(&inv.user, "CSMSG_INVALID_NUMERIC", &[&n]);
        for (ii, c) in legal.chars().enumerate() {
            let description =
                crate::msg::render(char_value_key(opt, c), &[], &world.bot_names());
            world.reply(&inv.user, "CSMSG_CHOICE_ROW", &[&ii, &description]);
        }
        return false;
    };
    if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
        reg.ch_opts[opt] = value;
    }
    show_char_option(world, inv, &channel, opt);
    true
}

// One thin wrapper per binding so the command table stays fn pointers.

pub fn cmd_set_givevoice(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_GIVE_VOICE)
}

pub fn cmd_set_giveops(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_GIVE_OPS)
}

pub fn cmd_set_enfops(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_ENF_OPS)
}

pub fn cmd_set_enfmodes(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_ENF_MODES)
}

pub fn cmd_set_enftopic(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_ENF_TOPIC)
}

pub fn cmd_set_pubcmd(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_PUBCMD)
}

pub fn cmd_set_setters(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_SETTERS)
}

pub fn cmd_set_ctcpusers(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_CTCP_USERS)
}

pub fn cmd_set_userinfo(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_USERINFO)
}

pub fn cmd_set_inviteme(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_INVITE_ME)
}

pub fn cmd_set_topicsnarf(world: &mut World, inv: &Invocation) -> bool {
    set_level_option(world, inv, super::model::LVL_TOPIC_SNARF)
}

pub fn cmd_set_protect(world: &mut World, inv: &Invocation) -> bool {
    set_char_option(world, inv, CH_PROTECT)
}

pub fn cmd_set_toys(world: &mut World, inv: &Invocation) -> bool {
    set_char_option(world, inv, CH_TOYS)
}

pub fn cmd_set_topicrefresh(world: &mut World, inv: &Invocation) -> bool {
    set_char_option(world, inv, CH_TOPICREFRESH)
}

pub fn cmd_set_ctcpreaction(world: &mut World, inv: &Invocation) -> bool {
    set_char_option(world, inv, CH_CTCPREACTION)
}

pub fn cmd_set_defaulttopic(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if inv.argv.len() > 1 {
        if !may_modify(world, inv, &channel) {
            return false;
        }
        let text = inv.argv[1..].join(" ");
        let topic = if text == "*" { None } else { Some(text) };
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            reg.topic = topic.clone();
        }
        if let Some(topic) = topic {
            world.actions.push(Action::Topic {
                channel: channel.clone(),
                topic,
            });
        }
    }
    let shown = world
        .chanserv
        .channels
        .get(&channel)
        .and_then(|r| r.topic.clone())
        .unwrap_or_else(|| "(none)".to_string());
    world.reply(&inv.user, "CSMSG_SET_DEFAULT_TOPIC", &[&shown]);
    true
}

pub fn cmd_set_topicmask(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if inv.argv.len() > 1 {
        if !may_modify(world, inv, &channel) {
            return false;
        }
        let mask = inv.arg(1).unwrap_or("*").to_string();
        let mask = if mask == "*" { None } else { Some(mask) };
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            reg.topic_mask = mask;
        }
    }
    let shown = world
        .chanserv
        .channels
        .get(&channel)
        .and_then(|r| r.topic_mask.clone())
        .unwrap_or_else(|| "(none)".to_string());
    world.reply(&inv.user, "CSMSG_SET_TOPICMASK", &[&shown]);
    true
}

fn set_greeting(world: &mut World, inv: &Invocation, user_greeting: bool) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if inv.argv.len() > 1 {
        if !may_modify(world, inv, &channel) {
            return false;
        }
        let text = inv.argv[1..].join(" ");
        let cap = world.conf.chanserv.greeting_length;
        if text != "*" && text.len() > cap {
            world.reply(&inv.user, "CSMSG_GREETING_TOO_LONG", &[&text.len(), &cap]);
            return false;
        }
        let value = if text == "*" { None } else { Some(text) };
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            if user_greeting {
                reg.user_greeting = value;
            } else {
                reg.greeting = value;
            }
        }
    }
    let shown = world
        .chanserv
        .channels
        .get(&channel)
        .and_then(|r| {
            if user_greeting {
                r.user_greeting.clone()
            } else {
                r.greeting.clone()
            }
        })
        .unwrap_or_else(|| "(none)".to_string());
    let key = if user_greeting {
        "CSMSG_SET_USERGREETING"
    } else {
        "CSMSG_SET_GREETING"
    };
    world.reply(&inv.user, key, &[&shown]);
    true
}

pub fn cmd_set_greeting(world: &mut World, inv: &Invocation) -> bool {
    set_greeting(world, inv, false)
}

pub fn cmd_set_usergreeting(world: &mut World, inv: &Invocation) -> bool {
    set_greeting(world, inv, true)
}

pub fn cmd_set_modes(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if inv.argv.len() > 1 {
        if !may_modify(world, inv, &channel) {
            return false;
        }
        let words: Vec<&str> = inv.argv[1..].iter().map(String::as_str).collect();
        let Some(lock) = ModeLock::parse(&words) else {
            let arg = inv.argv[1..].join(" ");
            world.reply(&inv.user, "CSMSG_INVALID_MODE_LOCK", &[&arg]);
            return false;
        };
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            reg.modes = lock;
        }
        // Assert the new lock on the live channel immediately.
        let change = super::hooks::lock_as_change(world, &channel);
        world.push_mode(&channel, &change);
    }
    let shown = world
        .chanserv
        .channels
        .get(&channel)
        .map(|r| r.modes.to_mode_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(none)".to_string());
    world.reply(&inv.user, "CSMSG_SET_MODES", &[&shown]);
    true
}

fn show_flag(world: &mut World, inv: &Invocation, channel: &str, flag: u32, key: &'static str) {
    let on = world
        .chanserv
        .channels
        .get(channel)
        .is_some_and(|r| r.flags & flag != 0);
    let state = if on { "on" } else { "off" };
    world.reply(&inv.user, key, &[&state]);
}

pub fn cmd_set_nodelete(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if let Some(arg) = inv.arg(1) {
        let needed = world.conf.chanserv.nodelete_level;
        let allowed = world
            .account_of(&inv.user)
            .is_some_and(|h| h.oper_level >= needed);
        if !allowed {
            world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
            return false;
        }
        let Some(on) = parse_on_off(arg) else {
            let arg = arg.to_string();
            world.reply(&inv.user, "MSG_INVALID_BINARY", &[&arg]);
            return false;
        };
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            if on {
                reg.flags |= CHANNEL_NODELETE;
            } else {
                reg.flags &= !CHANNEL_NODELETE;
            }
        }
    }
    show_flag(world, inv, &channel, CHANNEL_NODELETE, "CSMSG_SET_NODELETE");
    true
}

pub fn cmd_set_dynlimit(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if let Some(arg) = inv.arg(1) {
        if !may_modify(world, inv, &channel) {
            return false;
        }
        let Some(on) = parse_on_off(arg) else {
            let arg = arg.to_string();
            world.reply(&inv.user, "MSG_INVALID_BINARY", &[&arg]);
            return false;
        };
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            if on {
                reg.flags |= CHANNEL_DYNAMIC_LIMIT;
            } else {
                reg.flags &= !CHANNEL_DYNAMIC_LIMIT;
            }
        }
        if !on {
            // Dropping the option removes the managed limit.
            world.timers.del(None, |ev| {
                matches!(ev, TimerEvent::AdjustLimit { channel: c } if irc_eq(c, &channel))
            });
            let had_limit = world
                .channels
                .get(&channel)
                .is_some_and(|c| c.modes.limit.is_some());
            if had_limit {
                world.push_mode(
                    &channel,
                    &ModeChange {
                        ops: vec![ModeOp::Limit {
                            add: false,
                            value: 0,
                        }],
                    },
                );
            }
        }
    }
    show_flag(world, inv, &channel, CHANNEL_DYNAMIC_LIMIT, "CSMSG_SET_DYNLIMIT");
    true
}

pub fn cmd_set_offchannel(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if let Some(arg) = inv.arg(1) {
        if !may_modify(world, inv, &channel) {
            return false;
        }
        let Some(on) = parse_on_off(arg) else {
            let arg = arg.to_string();
            world.reply(&inv.user, "MSG_INVALID_BINARY", &[&arg]);
            return false;
        };
        let was_on = world
            .chanserv
            .channels
            .get(&channel)
            .is_some_and(|r| r.flags & CHANNEL_OFFCHANNEL != 0);
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            if on {
                reg.flags |= CHANNEL_OFFCHANNEL;
            } else {
                reg.flags &= !CHANNEL_OFFCHANNEL;
            }
        }
        if on && !was_on {
            let bot = world.conf.chanserv.nick.clone();
            world.actions.push(Action::BotPart {
                bot,
                channel: channel.clone(),
                reason: "Going off-channel.".to_string(),
            });
            super::register::emit_channel_presence(world, &channel);
        } else if !on && was_on {
            super::register::emit_channel_presence(world, &channel);
        }
    }
    show_flag(world, inv, &channel, CHANNEL_OFFCHANNEL, "CSMSG_SET_OFFCHANNEL");
    true
}

pub fn cmd_set_unreviewed(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if let Some(arg) = inv.arg(1) {
        let Some(on) = parse_on_off(arg) else {
            let arg = arg.to_string();
            world.reply(&inv.user, "MSG_INVALID_BINARY", &[&arg]);
            return false;
        };
        // Marking a channel reviewed takes an oper; re-flagging it
        // unreviewed takes security override.
        let view_oper = world.users.get(&inv.user).is_some_and(|u| u.oper);
        let helping = world
            .account_of(&inv.user)
            .is_some_and(|h| h.flags & HANDLE_HELPING != 0);
        let allowed = if on { helping } else { view_oper };
        if !allowed {
            world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
            return false;
        }
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            if on {
                reg.flags |= CHANNEL_UNREVIEWED;
            } else {
                reg.flags &= !CHANNEL_UNREVIEWED;
            }
        }
    }
    show_flag(world, inv, &channel, CHANNEL_UNREVIEWED, "CSMSG_SET_UNREVIEWED");
    true
}

/// `set defaults <token>`: owner-only reset of every option, confirmed
/// with the deterministic token.
pub fn cmd_set_defaults(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let level = actor_level(world, inv);
    if level < UL_OWNER {
        world.reply(&inv.user, "CSMSG_OWNER_DEFAULTS", &[&channel]);
        return false;
    }
    let Some(handle) = world.users.get(&inv.user).and_then(|u| u.account.clone()) else {
        return false;
    };
    let confirm = super::confirmation_token(&handle, &channel);
    if inv.arg(1) != Some(confirm.as_str()) {
        world.reply(&inv.user, "CSMSG_CONFIRM_DEFAULTS", &[&channel, &confirm]);
        return false;
    }
    if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
        for (ii, (_, default)) in LEVEL_OPTIONS.iter().enumerate() {
            reg.lvl_opts[ii] = *default;
        }
        for (ii, (_, default, _)) in CHAR_OPTIONS.iter().enumerate() {
            reg.ch_opts[ii] = *default;
        }
        reg.greeting = None;
        reg.user_greeting = None;
        reg.topic_mask = None;
        reg.modes = ModeLock::default();
    }
    world.reply(&inv.user, "CSMSG_SETTINGS_DEFAULTED", &[&channel]);
    true
}

/// The SET surface itself: with no arguments it shows every option;
/// with arguments it re-dispatches to the concatenated subcommand.
pub fn cmd_set(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if inv.argv.len() < 2 {
        for opt in 0..NUM_LEVEL_OPTIONS {
            show_level_option(world, inv, &channel, opt);
        }
        for opt in 0..NUM_CHAR_OPTIONS {
            show_char_option(world, inv, &channel, opt);
        }
        show_flag(world, inv, &channel, CHANNEL_NODELETE, "CSMSG_SET_NODELETE");
        show_flag(world, inv, &channel, CHANNEL_DYNAMIC_LIMIT, "CSMSG_SET_DYNLIMIT");
        show_flag(world, inv, &channel, CHANNEL_OFFCHANNEL, "CSMSG_SET_OFFCHANNEL");
        show_flag(world, inv, &channel, CHANNEL_UNREVIEWED, "CSMSG_SET_UNREVIEWED");
        return true;
    }
    // Re-dispatch as the joined subcommand name.
    let mut argv = vec![format!("{} {}", inv.cmd_name, inv.argv[1])];
    argv.extend(inv.argv[2..].iter().cloned());
    crate::modcmd::dispatch::invoke_argv(
        world,
        &inv.user,
        &inv.service,
        Some(channel),
        argv,
        false,
    );
    // The recursive dispatch does its own logging.
    false
}
