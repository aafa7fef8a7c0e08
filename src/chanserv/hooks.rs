//! Network event hooks: join enforcement, mode and topic policy,
//! presence tracking, and the CTCP reaction policy.

use super::access::{check_user_level, true_channel_access};
use super::model::{
    CHANNEL_DYNAMIC_LIMIT, CH_CTCPREACTION, CH_PROTECT, LVL_CTCP_USERS, LVL_ENF_MODES,
    LVL_ENF_OPS, LVL_ENF_TOPIC, LVL_GIVE_OPS, LVL_GIVE_VOICE, LVL_TOPIC_SNARF, LVL_USERINFO,
    UL_PRESENT,
};
use crate::accounts::{HANDLE_BOT, HANDLE_HELPING, HANDLE_SUPPORT_HELPER};
use crate::actions::Action;
use crate::ircstr::{irc_eq, match_ircglob};
use crate::state::{ModeChange, ModeOp, TimerEvent, World};
use tracing::debug;

fn is_service(world: &World, nick: &str) -> bool {
    world.users.get(nick).is_some_and(|u| u.is_service)
        || world.modcmd.service_by_nick(nick).is_some()
}

/// A user joined a registered channel: ban enforcement, dynamic limit,
/// auto-op/voice, presence and greeting.
pub fn on_join(world: &mut World, nick: &str, channel: &str) {
    if is_service(world, nick) {
        return;
    }
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return;
    };
    if reg.is_suspended() {
        return;
    }
    let member_count = world
        .channels
        .get(channel)
        .map_or(0, |c| c.members.len() as u32);
    if let Some(reg) = world.chanserv.channels.get_mut(channel) {
        if member_count > reg.max {
            reg.max = member_count;
        }
    }
    let Some(user) = world.users.get(nick) else {
        return;
    };
    let hostmask = user.hostmask();
    let account = user.account.clone();

    // Netburst rides: a banned user surfacing from the far side of a
    // split, with no status, is kicked on sight.
    if world.burst {
        let opped = world
            .channels
            .get(channel)
            .and_then(|c| c.members.get(nick))
            .is_some_and(|m| m.op || m.voice);
        let banned = world
            .channels
            .get(channel)
            .is_some_and(|c| c.bans.iter().any(|b| match_ircglob(&hostmask, b)));
        if banned && !opped {
            kick(world, channel, nick, "User from far side of netsplit should have been banned - bye.");
            return;
        }
    }

    // Registered bans: move the match to the head (recent matches are
    // re-matched cheaply), stamp it, enforce and kick.
    let flooded = world
        .channels
        .get(channel)
        .is_some_and(|c| c.join_flood);
    let ban_room = world
        .channels
        .get(channel)
        .is_some_and(|c| c.bans.len() < world.conf.chanserv.max_chan_bans);
    if !flooded && ban_room {
        let hit = world
            .chanserv
            .channels
            .get(channel)
            .and_then(|reg| {
                reg.bans
                    .iter()
                    .position(|b| match_ircglob(&hostmask, &b.mask))
            });
        if let Some(pos) = hit {
            let now = world.now;
            let (mask, kick_reason) = {
                let reg = world.chanserv.channels.get_mut(channel).expect("present");
                let mut ban = reg.bans.remove(pos);
                ban.triggered = now;
                let reason = format!("({}) {}", ban.owner, ban.reason);
                let mask = ban.mask.clone();
                reg.bans.insert(0, ban);
                (mask, reason)
            };
            world.push_mode(
                channel,
                &ModeChange {
                    ops: vec![ModeOp::Ban(mask)],
                },
            );
            kick(world, channel, nick, &kick_reason);
            return;
        }
    }

    // Dynamic limit: when the headroom shrinks below the threshold,
    // debounce a limit raise.
    let dyn_limit = world
        .chanserv
        .channels
        .get(channel)
        .is_some_and(|r| r.flags & CHANNEL_DYNAMIC_LIMIT != 0);
    if dyn_limit && !flooded {
        let room = world.channels.get(channel).and_then(|c| {
            c.modes
                .limit
                .map(|l| l.saturating_sub(c.members.len() as u32))
        });
        if room.is_some_and(|r| r < world.conf.chanserv.adjust_threshold) {
            schedule_limit_adjust(world, channel);
        }
    }

    let mut give_op = false;
    let mut give_voice = false;
    if !flooded {
        let reg = world.chanserv.channels.get(channel).expect("checked");
        if reg.lvl_opts[LVL_GIVE_OPS] == 0 {
            give_op = true;
        } else if reg.lvl_opts[LVL_GIVE_VOICE] == 0 {
            give_voice = true;
        }
    }

    let mut greeting_key: Option<String> = world
        .chanserv
        .channels
        .get(channel)
        .and_then(|r| r.greeting.clone());
    let mut info_line = None;
    if let Some(ref handle) = account {
        // Helpers entering a support channel go on duty.
        let support = world
            .conf
            .chanserv
            .support_channels
            .iter()
            .any(|c| irc_eq(c, channel));
        if support {
            if let Some(h) = world.accounts.get_mut(handle) {
                if h.flags & HANDLE_SUPPORT_HELPER != 0 && h.flags & HANDLE_HELPING == 0 {
                    h.flags |= HANDLE_HELPING;
                }
            }
        }

        let now = world.now;
        let info_delay = world.conf.chanserv.info_delay;
        let reg = world.chanserv.channels.get_mut(channel).expect("checked");
        let user_greeting = reg.user_greeting.clone();
        let userinfo_level = reg.lvl_opts[LVL_USERINFO];
        let give_ops_level = reg.lvl_opts[LVL_GIVE_OPS];
        let give_voice_level = reg.lvl_opts[LVL_GIVE_VOICE];
        let mut visited = false;
        if let Some(u) = reg.users.get_mut(handle) {
            if !u.suspended() {
                if u.auto_op() {
                    if u.access >= give_ops_level {
                        give_op = true;
                    } else if u.access >= give_voice_level {
                        give_voice = true;
                    }
                }
                if u.access >= UL_PRESENT {
                    visited = true;
                }
                if user_greeting.is_some() {
                    greeting_key = user_greeting;
                }
                if let Some(ref info) = u.info {
                    // The info line is rate-limited per record.
                    if u.access >= userinfo_level
                        && now.saturating_sub(u.seen) >= info_delay
                        && !u.present
                    {
                        info_line = Some(info.clone());
                    }
                }
                u.seen = now;
                u.present = true;
            }
        }
        if visited {
            let bot_account = world
                .accounts
                .get(handle)
                .is_some_and(|h| h.flagged(HANDLE_BOT));
            if !bot_account {
                if let Some(reg) = world.chanserv.channels.get_mut(channel) {
                    reg.visited = now;
                }
            }
        }
    }

    // Status, greeting and info are suppressed while a burst rides.
    if world.burst || flooded {
        return;
    }
    if give_op || give_voice {
        let op = if give_op {
            ModeOp::GiveOps(nick.to_string())
        } else {
            ModeOp::GiveVoice(nick.to_string())
        };
        world.push_mode(channel, &ModeChange { ops: vec![op] });
    }
    if let Some(greeting) = greeting_key {
        world.actions.push(Action::Reply {
            target: nick.to_string(),
            key: "CSMSG_GREETING",
            text: format!("({}) {}", channel, greeting),
        });
    }
    if let Some(info) = info_line {
        world.actions.push(Action::Reply {
            target: channel.to_string(),
            key: "CSMSG_INFO_LINE",
            text: format!("[{}] {}", nick, info),
        });
    }
}

fn kick(world: &mut World, channel: &str, nick: &str, reason: &str) {
    if let Some(c) = world.channels.get_mut(channel) {
        c.members.remove(nick);
    }
    world.actions.push(Action::Kick {
        channel: channel.to_string(),
        nick: nick.to_string(),
        reason: reason.to_string(),
    });
}

pub fn schedule_limit_adjust(world: &mut World, channel: &str) {
    let delay = world.conf.chanserv.adjust_delay;
    // Collapse multiple pending adjustments into one.
    world.timers.del(None, |ev| {
        matches!(ev, TimerEvent::AdjustLimit { channel: c } if irc_eq(c, channel))
    });
    let when = world.now + delay;
    world.timers.add(
        when,
        TimerEvent::AdjustLimit {
            channel: channel.to_string(),
        },
    );
}

/// Timer handler: raise the limit to member count plus padding.
pub fn adjust_limit(world: &mut World, channel: &str) {
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return;
    };
    if reg.is_suspended() || reg.flags & CHANNEL_DYNAMIC_LIMIT == 0 {
        return;
    }
    let locked_limit = reg.modes.limit;
    let now = world.now;
    if let Some(reg) = world.chanserv.channels.get_mut(channel) {
        reg.limit_adjusted = now;
    }
    let Some(chan) = world.channels.get(channel) else {
        return;
    };
    let mut limit = chan.members.len() as u32 + world.conf.chanserv.adjust_threshold + 5;
    if let Some(locked) = locked_limit {
        if limit > locked {
            limit = locked;
        } else if limit == locked {
            return;
        }
    }
    if chan.modes.limit == Some(limit) {
        return;
    }
    world.push_mode(
        channel,
        &ModeChange {
            ops: vec![ModeOp::Limit {
                add: true,
                value: limit,
            }],
        },
    );
}

/// An account's last member of a channel left; drop the present bit and
/// possibly shrink the dynamic limit.
pub fn on_account_left(world: &mut World, channel: &str, handle: &str) {
    super::users::refresh_presence(world, channel, handle);
    let dyn_limit = world
        .chanserv
        .channels
        .get(channel)
        .is_some_and(|r| r.flags & CHANNEL_DYNAMIC_LIMIT != 0 && !r.is_suspended());
    if dyn_limit {
        let padding = world.conf.chanserv.adjust_threshold + 5;
        let roomy = world.channels.get(channel).is_some_and(|c| {
            c.modes
                .limit
                .is_some_and(|l| l.saturating_sub(c.members.len() as u32) > padding)
        });
        if roomy {
            schedule_limit_adjust(world, channel);
        }
    }
}

/// A user authenticated; accounts may now match members already in
/// channels.
pub fn on_auth(world: &mut World, nick: &str, handle: &str) {
    let channels: Vec<String> = world
        .channels
        .iter()
        .filter(|(_, c)| c.members.contains(nick))
        .map(|(name, _)| name.to_string())
        .collect();
    let now = world.now;
    for channel in channels {
        if let Some(u) = world
            .chanserv
            .channels
            .get_mut(&channel)
            .and_then(|r| r.users.get_mut(handle))
        {
            u.present = true;
            u.seen = now;
        }
    }
}

/// Seen-time updates on nick change.
pub fn on_nick_change(world: &mut World, nick: &str) {
    let Some(handle) = world.users.get(nick).and_then(|u| u.account.clone()) else {
        return;
    };
    let now = world.now;
    let channels: Vec<String> = world
        .channels
        .iter()
        .filter(|(_, c)| c.members.contains(nick))
        .map(|(name, _)| name.to_string())
        .collect();
    for channel in channels {
        if let Some(u) = world
            .chanserv
            .channels
            .get_mut(&channel)
            .and_then(|r| r.users.get_mut(&handle))
        {
            u.seen = now;
            u.present = true;
        }
    }
}

/// Should `victim` be shielded from `actor` under the channel's protect
/// policy?
fn protect_user(world: &World, channel: &str, victim: &str, actor: &str) -> bool {
    if irc_eq(victim, actor) {
        return false;
    }
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return false;
    };
    let policy = reg.ch_opts[CH_PROTECT];
    if policy == 'n' {
        return false;
    }
    let victim_level = true_channel_access(world, channel, victim);
    let actor_level = true_channel_access(world, channel, actor).unwrap_or(0);
    match policy {
        // All: even non-users are shielded from equal-or-lower access.
        'a' => actor_level <= victim_level.unwrap_or(0),
        'e' => victim_level.is_some_and(|v| actor_level <= v),
        'l' => victim_level.is_some_and(|v| actor_level < v),
        _ => false,
    }
}

/// May `actor` op `victim` here?
fn validate_op(world: &World, channel: &str, actor: &str, victim: &str) -> bool {
    if is_service(world, victim) {
        return true;
    }
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return true;
    };
    let needed = reg.lvl_opts[LVL_GIVE_OPS];
    if true_channel_access(world, channel, victim).unwrap_or(0) >= needed {
        return true;
    }
    check_user_level(world, channel, actor, LVL_ENF_OPS, true, false)
}

/// Does this change violate the stored mode lock?
fn lock_violated(world: &World, channel: &str, change: &ModeChange) -> bool {
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return false;
    };
    let lock = &reg.modes;
    change.ops.iter().any(|op| match op {
        ModeOp::Simple { bit, add } => {
            (*add && lock.off & bit != 0) || (!*add && lock.on & bit != 0)
        }
        ModeOp::Key { add, value } => match (&lock.key, *add) {
            (Some(locked), true) => !irc_eq(locked, value),
            (Some(_), false) => true,
            (None, _) => false,
        },
        ModeOp::Limit { add, value } => match (lock.limit, *add) {
            (Some(locked), true) => *value != locked,
            (Some(_), false) => true,
            (None, _) => false,
        },
        _ => false,
    })
}

pub(super) fn lock_as_change(world: &World, channel: &str) -> ModeChange {
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return ModeChange::default();
    };
    let lock = &reg.modes;
    let mut ops = Vec::new();
    // The seven simple mode bits; key and limit carry their own values.
    for bit in [1u32, 2, 4, 8, 16, 32, 64] {
        if lock.on & bit != 0 {
            ops.push(ModeOp::Simple { bit, add: true });
        }
        if lock.off & bit != 0 {
            ops.push(ModeOp::Simple { bit, add: false });
        }
    }
    if let Some(ref key) = lock.key {
        ops.push(ModeOp::Key {
            add: true,
            value: key.clone(),
        });
    }
    if let Some(limit) = lock.limit {
        ops.push(ModeOp::Limit {
            add: true,
            value: limit,
        });
    }
    ModeChange { ops }
}

/// Police an observed mode change: re-assert the mode lock, revert
/// unqualified op grants, protected deops and bad bans.
pub fn on_mode_change(world: &mut World, actor: &str, channel: &str, change: &ModeChange) {
    if is_service(world, actor) {
        return;
    }
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return;
    };
    if reg.is_suspended() {
        return;
    }

    let mut bounce = ModeChange::default();
    if !check_user_level(world, channel, actor, LVL_ENF_MODES, true, false)
        && lock_violated(world, channel, change)
    {
        bounce = lock_as_change(world, channel);
        let lock_str = world
            .chanserv
            .channels
            .get(channel)
            .map(|r| r.modes.to_mode_string())
            .unwrap_or_default();
        let chan = channel.to_string();
        world.reply(actor, "CSMSG_MODE_LOCKED", &[&lock_str, &chan]);
    }

    let mut deopped_actor = false;
    for op in &change.ops {
        match op {
            ModeOp::TakeOps(victim) => {
                if !protect_user(world, channel, victim, actor) {
                    continue;
                }
                if !deopped_actor {
                    // The bounce takes the aggressor's ops too.
                    let actor_present = world
                        .channels
                        .get(channel)
                        .is_some_and(|c| c.members.contains(actor));
                    if actor_present {
                        bounce.ops.push(ModeOp::TakeOps(actor.to_string()));
                    }
                    deopped_actor = true;
                }
                bounce.ops.push(ModeOp::GiveOps(victim.clone()));
                let victim = victim.clone();
                world.reply(actor, "CSMSG_USER_PROTECTED", &[&victim]);
            }
            ModeOp::GiveOps(victim) => {
                if validate_op(world, channel, actor, victim) {
                    continue;
                }
                bounce.ops.push(ModeOp::TakeOps(victim.clone()));
                world.reply(actor, "CSMSG_OPBY_LOCKED", &[]);
            }
            ModeOp::Ban(mask) => {
                let hits_protected = world
                    .channels
                    .get(channel)
                    .map(|c| {
                        c.members
                            .keys()
                            .filter(|n| {
                                world
                                    .users
                                    .get(n)
                                    .is_some_and(|u| match_ircglob(&u.hostmask(), mask))
                            })
                            .any(|n| protect_user(world, channel, n, actor))
                    })
                    .unwrap_or(false);
                if !hits_protected {
                    continue;
                }
                bounce.ops.push(ModeOp::Unban(mask.clone()));
                let mask = mask.clone();
                world.reply(actor, "CSMSG_MASK_PROTECTED", &[&mask]);
            }
            _ => {}
        }
    }
    if !bounce.is_empty() {
        debug!(channel, actor, change = %bounce.to_mode_string(), "Bouncing mode change");
        world.push_mode(channel, &bounce);
    }
}

/// Police a topic change: enforcement below EnfTopic, snarfing at or
/// above TopicSnarf.
pub fn on_topic(world: &mut World, actor: &str, channel: &str, topic: &str) {
    if is_service(world, actor) {
        return;
    }
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return;
    };
    if reg.is_suspended() {
        return;
    }
    if !check_user_level(world, channel, actor, LVL_ENF_TOPIC, true, false) {
        let mask_ok = reg
            .topic_mask
            .as_deref()
            .map(|m| match_ircglob(topic, m));
        if mask_ok != Some(true) {
            let restore = reg.topic.clone().unwrap_or_default();
            let chan = channel.to_string();
            world.actions.push(Action::Topic {
                channel: chan.clone(),
                topic: restore.clone(),
            });
            if let Some(c) = world.channels.get_mut(channel) {
                c.topic = restore;
            }
            world.reply(actor, "CSMSG_TOPIC_LOCKED", &[&chan]);
        }
        return;
    }
    if check_user_level(world, channel, actor, LVL_TOPIC_SNARF, true, true) {
        if let Some(reg) = world.chanserv.channels.get_mut(channel) {
            reg.topic = Some(topic.to_string());
        }
    }
}

/// CTCP to a registered channel from someone below CTCPUsers triggers
/// the configured reaction.
pub fn on_channel_ctcp(world: &mut World, nick: &str, channel: &str, _text: &str) {
    if is_service(world, nick) {
        return;
    }
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return;
    };
    if reg.is_suspended() || reg.lvl_opts[LVL_CTCP_USERS] == 0 {
        return;
    }
    if check_user_level(world, channel, nick, LVL_CTCP_USERS, true, false) {
        return;
    }
    let reaction = reg.ch_opts[CH_CTCPREACTION];
    let host = world
        .users
        .get(nick)
        .map(|u| u.host.clone())
        .unwrap_or_default();
    let mask = format!("*!*@{}", host);
    let duration = match reaction {
        't' => Some(world.conf.chanserv.ctcp_short_ban_duration),
        'T' => Some(world.conf.chanserv.ctcp_long_ban_duration),
        _ => None,
    };
    if let Some(duration) = duration {
        let expires = world.now + duration;
        let ban = super::model::BanReg {
            mask: mask.clone(),
            owner: world.conf.chanserv.nick.clone(),
            reason: "Improper use of CTCP in channel.".to_string(),
            set: world.now,
            triggered: world.now,
            expires,
        };
        super::bans::upsert_ban(world, channel, ban);
    }
    if reaction != 'k' {
        world.push_mode(
            channel,
            &ModeChange {
                ops: vec![ModeOp::Ban(mask)],
            },
        );
    }
    kick(world, channel, nick, "Improper use of CTCP in channel.");
}
