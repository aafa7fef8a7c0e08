//! Channel status commands: topic, mode, op/deop, invite.

use super::access::{channel_user_level, check_user_level};
use super::model::{LVL_ENF_MODES, LVL_INVITE_ME, LVL_TOPIC_SNARF};
use crate::actions::Action;
use crate::ircstr::irc_eq;
use crate::modcmd::Invocation;
use crate::state::{ModeChange, ModeOp, World};

/// `topic [text]`: set the topic (or re-assert the default).
pub fn cmd_topic(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if inv.argv.len() < 2 {
        let Some(topic) = world
            .chanserv
            .channels
            .get(&channel)
            .and_then(|r| r.topic.clone())
        else {
            world.reply(&inv.user, "CSMSG_NO_TOPIC", &[&channel]);
            return false;
        };
        if let Some(c) = world.channels.get_mut(&channel) {
            c.topic = topic.clone();
        }
        world.actions.push(Action::Topic { channel, topic });
        return true;
    }
    let topic = inv.argv[1..].join(" ");
    // Setting through the bot snarfs at or above the snarf level.
    if check_user_level(world, &channel, &inv.user, LVL_TOPIC_SNARF, true, true) {
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            reg.topic = Some(topic.clone());
        }
    }
    if let Some(c) = world.channels.get_mut(&channel) {
        c.topic = topic.clone();
    }
    world.actions.push(Action::Topic {
        channel,
        topic: topic.clone(),
    });
    world.reply(&inv.user, "CSMSG_TOPIC_SET", &[&topic]);
    true
}

/// `mode [change]`: apply a mode change as the bot, or re-assert the
/// stored lock.
pub fn cmd_mode(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if inv.argv.len() < 2 {
        let change = super::hooks::lock_as_change(world, &channel);
        if change.is_empty() {
            world.reply(&inv.user, "CSMSG_NO_MODES", &[&channel]);
            return false;
        }
        world.push_mode(&channel, &change);
        world.reply(&inv.user, "CSMSG_DEFAULTED_MODES", &[&channel]);
        return true;
    }
    if !check_user_level(world, &channel, &inv.user, LVL_ENF_MODES, true, false) {
        world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
        return false;
    }
    let words: Vec<&str> = inv.argv[1..].iter().map(String::as_str).collect();
    let Some(change) = ModeChange::parse(&words) else {
        let arg = inv.argv[1..].join(" ");
        world.reply(&inv.user, "CSMSG_INVALID_MODE_LOCK", &[&arg]);
        return false;
    };
    world.push_mode(&channel, &change);
    let modes = world
        .channels
        .get(&channel)
        .map(|c| c.modes.to_mode_string())
        .unwrap_or_default();
    world.reply(&inv.user, "CSMSG_MODES_SET", &[&modes]);
    true
}

fn status_change(world: &mut World, inv: &Invocation, give: bool, op: bool) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let mut ops = Vec::new();
    let targets: Vec<String> = if inv.argv.len() > 1 {
        inv.argv[1..].to_vec()
    } else {
        vec![inv.user.clone()]
    };
    for nick in &targets {
        let present = world
            .channels
            .get(&channel)
            .is_some_and(|c| c.members.contains(nick));
        if !present {
            continue;
        }
        // Deops against shielded users are refused up front rather than
        // bounced after the fact.
        if !give && op && !irc_eq(nick, &inv.user) {
            let victim_level =
                channel_user_level(world, &channel, nick, false, false).unwrap_or(0);
            let actor_level =
                channel_user_level(world, &channel, &inv.user, true, false).unwrap_or(0);
            if victim_level > actor_level {
                let nick = nick.clone();
                world.reply(&inv.user, "CSMSG_USER_PROTECTED", &[&nick]);
                continue;
            }
        }
        ops.push(match (give, op) {
            (true, true) => ModeOp::GiveOps(nick.clone()),
            (false, true) => ModeOp::TakeOps(nick.clone()),
            (true, false) => ModeOp::GiveVoice(nick.clone()),
            (false, false) => ModeOp::TakeVoice(nick.clone()),
        });
    }
    if ops.is_empty() {
        return false;
    }
    world.push_mode(&channel, &ModeChange { ops });
    let key = match (give, op) {
        (true, true) => "CSMSG_OPPED_USERS",
        (false, true) => "CSMSG_DEOPPED_USERS",
        (true, false) => "CSMSG_VOICED_USERS",
        (false, false) => "CSMSG_DEVOICED_USERS",
    };
    world.reply(&inv.user, key, &[&channel]);
    true
}

pub fn cmd_op(world: &mut World, inv: &Invocation) -> bool {
    status_change(world, inv, true, true)
}

pub fn cmd_deop(world: &mut World, inv: &Invocation) -> bool {
    status_change(world, inv, false, true)
}

pub fn cmd_voice(world: &mut World, inv: &Invocation) -> bool {
    status_change(world, inv, true, false)
}

pub fn cmd_devoice(world: &mut World, inv: &Invocation) -> bool {
    status_change(world, inv, false, false)
}

/// `invite <nick>`: invite someone else into the channel.
pub fn cmd_invite(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(nick) = inv.arg(1).map(str::to_string) else {
        return false;
    };
    if !world.users.contains(&nick) {
        world.reply(&inv.user, "MSG_NICK_UNKNOWN", &[&nick]);
        return false;
    }
    if world
        .channels
        .get(&channel)
        .is_some_and(|c| c.members.contains(&nick))
    {
        world.reply(&inv.user, "CSMSG_ALREADY_PRESENT", &[&nick, &channel]);
        return false;
    }
    world.actions.push(Action::Invite {
        channel: channel.clone(),
        nick: nick.clone(),
    });
    world.actions.push(Action::Reply {
        target: nick.clone(),
        key: "CSMSG_INVITING_YOU",
        text: crate::msg::render(
            "CSMSG_INVITING_YOU",
            &[&inv.user, &channel],
            &world.bot_names(),
        ),
    });
    world.reply(&inv.user, "CSMSG_INVITED_USER", &[&nick, &channel]);
    true
}

/// `inviteme`: ask the bot for an invite past +ik.
pub fn cmd_inviteme(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if !check_user_level(world, &channel, &inv.user, LVL_INVITE_ME, true, false) {
        world.reply(&inv.user, "CSMSG_LOW_CHANNEL_ACCESS", &[&channel]);
        return false;
    }
    if world
        .channels
        .get(&channel)
        .is_some_and(|c| c.members.contains(&inv.user))
    {
        world.reply(&inv.user, "CSMSG_YOU_ALREADY_PRESENT", &[&channel]);
        return false;
    }
    world.actions.push(Action::Invite {
        channel,
        nick: inv.user.clone(),
    });
    true
}
