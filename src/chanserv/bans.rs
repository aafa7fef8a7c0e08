//! The ban engine: coalescing inserts, expiry timers, and the ban
//! management commands.

use super::access::channel_user_level;
use super::model::BanReg;
use crate::actions::Action;
use crate::ircstr::{glob_covers, interval_string, irc_eq, match_ircglob, parse_interval};
use crate::modcmd::Invocation;
use crate::state::{ModeChange, ModeOp, TimerEvent, World};
use tracing::debug;

const MIN_TIMED_BAN: u64 = 15;
const MAX_TIMED_BAN: u64 = 2 * 365 * 86400;

/// Outcome of a coalescing insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanAdd {
    Added,
    /// The mask was already covered; the existing ban was updated in
    /// place. `extended` reports whether its expiry grew.
    Updated { extended: bool },
    ListFull,
}

/// Is `a` (0 = permanent) a longer expiry than `b`?
fn longer_expiry(a: u64, b: u64) -> bool {
    match (a, b) {
        (0, 0) => false,
        (0, _) => true,
        (_, 0) => false,
        (a, b) => a > b,
    }
}

/// Rewrite masks ending in a legacy hidden-host suffix to the current
/// one (the account store publishes the suffix).
fn rewrite_old_ban_name(world: &World, mask: &str) -> String {
    let Some(current) = world
        .conf
        .get_path_str("services/nickserv/hidden_host_suffix")
    else {
        return mask.to_string();
    };
    for old in &world.conf.chanserv.old_ban_names {
        if mask.len() > old.len() + 1 {
            let tail = &mask[mask.len() - old.len()..];
            if irc_eq(tail, old) {
                return format!("{}{}", &mask[..mask.len() - old.len()], current);
            }
        }
    }
    mask.to_string()
}

fn cancel_ban_timer(world: &mut World, channel: &str, mask: &str) {
    world.timers.del(None, |ev| {
        matches!(ev, TimerEvent::BanExpire { channel: c, mask: m }
            if irc_eq(c, channel) && irc_eq(m, mask))
    });
}

fn schedule_ban_timer(world: &mut World, channel: &str, mask: &str, expires: u64) {
    if expires > 0 {
        world.timers.add(
            expires,
            TimerEvent::BanExpire {
                channel: channel.to_string(),
                mask: mask.to_string(),
            },
        );
    }
}

/// Coalescing insert: a mask subsumed by an existing ban updates it in
/// place; a broader mask silently removes the narrower bans it covers.
pub fn upsert_ban(world: &mut World, channel: &str, ban: BanReg) -> BanAdd {
    let mask = rewrite_old_ban_name(world, &ban.mask);
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return BanAdd::ListFull;
    };

    // Subsumed by an existing mask: update that ban in place.
    if let Some(existing) = reg.bans.iter().find(|b| glob_covers(&b.mask, &mask)) {
        let existing_mask = existing.mask.clone();
        let extended = longer_expiry(ban.expires, existing.expires);
        let reg = world.chanserv.channels.get_mut(channel).expect("present");
        let b = reg
            .bans
            .iter_mut()
            .find(|b| irc_eq(&b.mask, &existing_mask))
            .expect("present");
        b.reason = ban.reason;
        if extended {
            b.expires = ban.expires;
            cancel_ban_timer(world, channel, &existing_mask);
            schedule_ban_timer(world, channel, &existing_mask, ban.expires);
        }
        return BanAdd::Updated { extended };
    }

    // Remove the narrower bans this mask covers.
    let covered: Vec<String> = reg
        .bans
        .iter()
        .filter(|b| glob_covers(&mask, &b.mask))
        .map(|b| b.mask.clone())
        .collect();
    for old in &covered {
        remove_ban_record(world, channel, old);
    }

    let max_bans = world.conf.chanserv.max_chan_bans;
    let Some(reg) = world.chanserv.channels.get_mut(channel) else {
        return BanAdd::ListFull;
    };
    if reg.bans.len() >= max_bans {
        return BanAdd::ListFull;
    }
    let expires = ban.expires;
    reg.bans.insert(
        0,
        BanReg {
            mask: mask.clone(),
            ..ban
        },
    );
    world.chanserv.ban_count += 1;
    schedule_ban_timer(world, channel, &mask, expires);
    BanAdd::Added
}

/// Merge one ban from another channel: broader masks win, and the
/// surviving record carries the later of each timestamp pair.
pub fn merge_ban(world: &mut World, channel: &str, ban: BanReg) {
    let existing = world
        .chanserv
        .channels
        .get(channel)
        .and_then(|reg| reg.bans.iter().find(|b| glob_covers(&b.mask, &ban.mask)))
        .map(|b| b.mask.clone());
    if let Some(mask) = existing {
        let extend = world
            .chanserv
            .channels
            .get(channel)
            .and_then(|r| r.bans.iter().find(|b| irc_eq(&b.mask, &mask)))
            .is_some_and(|b| longer_expiry(ban.expires, b.expires));
        if let Some(b) = world
            .chanserv
            .channels
            .get_mut(channel)
            .and_then(|r| r.bans.iter_mut().find(|b| irc_eq(&b.mask, &mask)))
        {
            b.triggered = b.triggered.max(ban.triggered);
            if extend {
                b.expires = ban.expires;
            }
        }
        if extend {
            cancel_ban_timer(world, channel, &mask);
            let expires = ban.expires;
            schedule_ban_timer(world, channel, &mask, expires);
        }
        return;
    }
    upsert_ban(world, channel, ban);
}

/// Remove one persistent ban and its timer. Does not touch the
/// IRC-level list.
pub fn remove_ban_record(world: &mut World, channel: &str, mask: &str) -> Option<BanReg> {
    let reg = world.chanserv.channels.get_mut(channel)?;
    let pos = reg.bans.iter().position(|b| irc_eq(&b.mask, mask))?;
    let removed = reg.bans.remove(pos);
    world.chanserv.ban_count = world.chanserv.ban_count.saturating_sub(1);
    cancel_ban_timer(world, channel, mask);
    Some(removed)
}

/// Timer handler: a timed ban reached its deadline.
pub fn expire_ban(world: &mut World, channel: &str, mask: &str) {
    debug!(channel, mask, "Channel ban expired");
    if let Some(reg) = world.chanserv.channels.get_mut(channel) {
        if let Some(pos) = reg.bans.iter().position(|b| irc_eq(&b.mask, mask)) {
            reg.bans.remove(pos);
            world.chanserv.ban_count = world.chanserv.ban_count.saturating_sub(1);
        }
    }
    // Lift the IRC-level ban if it is currently set.
    let set = world
        .channels
        .get(channel)
        .is_some_and(|c| c.bans.iter().any(|b| irc_eq(b, mask)));
    if set {
        world.push_mode(
            channel,
            &ModeChange {
                ops: vec![ModeOp::Unban(mask.to_string())],
            },
        );
    }
}

/// Age out bans not triggered since `cutoff`; returns how many.
pub fn trim_bans(world: &mut World, channel: &str, cutoff: u64) -> usize {
    let victims: Vec<String> = world
        .chanserv
        .channels
        .get(channel)
        .map(|reg| {
            reg.bans
                .iter()
                .filter(|b| b.triggered.max(b.set) < cutoff)
                .map(|b| b.mask.clone())
                .collect()
        })
        .unwrap_or_default();
    for mask in &victims {
        remove_ban_record(world, channel, mask);
    }
    victims.len()
}

/// Find the record ban matching a connected user's hostmask, if any.
pub fn matching_ban(world: &World, channel: &str, hostmask: &str) -> Option<String> {
    world
        .chanserv
        .channels
        .get(channel)?
        .bans
        .iter()
        .find(|b| match_ircglob(hostmask, &b.mask))
        .map(|b| b.mask.clone())
}

/// Resolve a ban argument: an explicit mask, or a nick banned by host.
fn ban_mask_for(world: &mut World, from: &str, arg: &str) -> Option<String> {
    if arg.contains('!') || arg.contains('@') || arg.contains('*') || arg.contains('?') {
        // Refuse masks so broad they are all wildcards.
        if arg.chars().all(|c| "*?!@.".contains(c)) {
            let arg = arg.to_string();
            world.reply(from, "CSMSG_LAME_MASK", &[&arg]);
            return None;
        }
        return Some(arg.to_string());
    }
    match world.users.get(arg) {
        Some(u) => Some(format!("*!*@{}", u.host)),
        None => {
            let arg = arg.to_string();
            world.reply(from, "MSG_NICK_UNKNOWN", &[&arg]);
            None
        }
    }
}

/// Does the mask collide with a member the caller cannot outrank?
fn mask_hits_protected(world: &World, channel: &str, mask: &str, actor_level: u16) -> bool {
    let Some(chan) = world.channels.get(channel) else {
        return false;
    };
    chan.members.keys().any(|nick| {
        let Some(user) = world.users.get(nick) else {
            return false;
        };
        if !match_ircglob(&user.hostmask(), mask) {
            return false;
        }
        channel_user_level(world, channel, nick, false, false)
            .is_some_and(|level| level >= actor_level)
    })
}

fn add_ban_command(world: &mut World, inv: &Invocation, expires: u64) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(mask) = ban_mask_for(world, &inv.user, inv.arg(1).unwrap_or("")) else {
        return false;
    };
    let actor_level = channel_user_level(world, &channel, &inv.user, true, false).unwrap_or(0);
    if mask_hits_protected(world, &channel, &mask, actor_level) {
        world.reply(&inv.user, "CSMSG_MASK_PROTECTED", &[&mask]);
        return false;
    }
    let reason_start = if expires > 0 { 3 } else { 2 };
    let reason = if inv.argv.len() > reason_start {
        inv.argv[reason_start..].join(" ")
    } else {
        "Bye.".to_string()
    };
    let owner = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone())
        .unwrap_or_else(|| inv.user.clone());
    let ban = BanReg {
        mask: mask.clone(),
        owner,
        reason,
        set: world.now,
        triggered: 0,
        expires,
    };
    match upsert_ban(world, &channel, ban) {
        BanAdd::ListFull => {
            let max = world.conf.chanserv.max_chan_bans;
            world.reply(&inv.user, "CSMSG_MAXIMUM_BANS", &[&max]);
            false
        }
        BanAdd::Updated { extended } => {
            if extended {
                let left = interval_string(expires.saturating_sub(world.now));
                world.reply(&inv.user, "CSMSG_BAN_EXTENDED", &[&mask, &left]);
            } else {
                world.reply(&inv.user, "CSMSG_REASON_CHANGE", &[&mask]);
            }
            true
        }
        BanAdd::Added => {
            world.push_mode(
                &channel,
                &ModeChange {
                    ops: vec![ModeOp::Ban(mask.clone())],
                },
            );
            if expires > 0 {
                let span = interval_string(expires.saturating_sub(world.now));
                world.reply(&inv.user, "CSMSG_TIMED_BAN_ADDED", &[&mask, &channel, &span]);
            } else {
                world.reply(&inv.user, "CSMSG_BAN_ADDED", &[&mask, &channel]);
            }
            true
        }
    }
}

pub fn cmd_addban(world: &mut World, inv: &Invocation) -> bool {
    // A duration after the mask makes the ban timed.
    let duration = inv
        .arg(2)
        .filter(|a| a.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .and_then(parse_interval);
    match duration {
        Some(d) if d > 0 => {
            if d < MIN_TIMED_BAN {
                world.reply(&inv.user, "CSMSG_DURATION_TOO_LOW", &[]);
                return false;
            }
            if d > MAX_TIMED_BAN {
                world.reply(&inv.user, "CSMSG_DURATION_TOO_HIGH", &[]);
                return false;
            }
            let expires = world.now + d;
            add_ban_command(world, inv, expires)
        }
        _ => add_ban_command(world, inv, 0),
    }
}

pub fn cmd_addtimedban(world: &mut World, inv: &Invocation) -> bool {
    let Some(duration) = inv.arg(2).and_then(parse_interval) else {
        let arg = inv.arg(2).unwrap_or("").to_string();
        world.reply(&inv.user, "MSG_INVALID_DURATION", &[&arg]);
        return false;
    };
    if duration < MIN_TIMED_BAN {
        world.reply(&inv.user, "CSMSG_DURATION_TOO_LOW", &[]);
        return false;
    }
    if duration > MAX_TIMED_BAN {
        world.reply(&inv.user, "CSMSG_DURATION_TOO_HIGH", &[]);
        return false;
    }
    let expires = world.now + duration;
    add_ban_command(world, inv, expires)
}

pub fn cmd_delban(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let arg = inv.arg(1).unwrap_or("").to_string();
    // Accept either a stored mask or a nick currently matching one.
    let mask = if arg.contains('!') || arg.contains('@') || arg.contains('*') {
        Some(arg.clone())
    } else {
        world
            .users
            .get(&arg)
            .map(|u| u.hostmask())
            .and_then(|hm| matching_ban(world, &channel, &hm))
    };
    let removed = mask
        .and_then(|m| {
            remove_ban_record(world, &channel, &m)
                .map(|b| b.mask)
                .or_else(|| {
                    // Fall back to subsumption so `delban *!*@host` can
                    // clear `*!*@*.host` style entries it matches.
                    let candidates: Vec<String> = world
                        .chanserv
                        .channels
                        .get(&channel)
                        .map(|r| {
                            r.bans
                                .iter()
                                .filter(|b| glob_covers(&m, &b.mask))
                                .map(|b| b.mask.clone())
                                .collect()
                        })
                        .unwrap_or_default();
                    for c in &candidates {
                        remove_ban_record(world, &channel, c);
                    }
                    candidates.first().cloned()
                })
        });
    match removed {
        Some(mask) => {
            let lifted = world
                .channels
                .get(&channel)
                .map(|c| {
                    c.bans
                        .iter()
                        .filter(|b| glob_covers(&mask, b) || irc_eq(b, &mask))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            for b in lifted {
                world.push_mode(
                    &channel,
                    &ModeChange {
                        ops: vec![ModeOp::Unban(b)],
                    },
                );
            }
            world.reply(&inv.user, "CSMSG_BAN_REMOVED", &[&mask]);
            true
        }
        None => {
            world.reply(&inv.user, "CSMSG_BAN_NOT_FOUND", &[&arg]);
            false
        }
    }
}

pub fn cmd_bans(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let rows: Vec<(String, String, String)> = world
        .chanserv
        .channels
        .get(&channel)
        .map(|reg| {
            reg.bans
                .iter()
                .map(|b| {
                    let expires = if b.expires == 0 {
                        "never".to_string()
                    } else {
                        interval_string(b.expires.saturating_sub(world.now))
                    };
                    (b.mask.clone(), b.owner.clone(), expires)
                })
                .collect()
        })
        .unwrap_or_default();
    if rows.is_empty() {
        world.reply(&inv.user, "CSMSG_NO_BANS", &[&channel]);
        return true;
    }
    for (mask, owner, expires) in rows {
        world.reply(&inv.user, "CSMSG_BANS_ROW", &[&mask, &owner, &expires]);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::Config;

    fn world_with_channel() -> World {
        let mut w = World::new(Config::default());
        w.now = 1000;
        w.chanserv
            .channels
            .insert("#t", super::super::model::ChannelReg::new("#t", 1000));
        w
    }

    fn ban(mask: &str, expires: u64) -> BanReg {
        BanReg {
            mask: mask.to_string(),
            owner: "ops".to_string(),
            reason: "testing".to_string(),
            set: 1000,
            triggered: 0,
            expires,
        }
    }

    #[test]
    fn broader_mask_removes_narrower_and_cancels_timer() {
        let mut w = world_with_channel();
        assert_eq!(upsert_ban(&mut w, "#t", ban("*!*@a.b", 1000 + 1800)), BanAdd::Added);
        assert_eq!(w.timers.len(), 1);
        assert_eq!(upsert_ban(&mut w, "#t", ban("*!*@*.b", 0)), BanAdd::Added);
        let reg = w.chanserv.channels.get("#t").unwrap();
        assert_eq!(reg.bans.len(), 1);
        assert_eq!(reg.bans[0].mask, "*!*@*.b");
        assert_eq!(reg.bans[0].expires, 0);
        // The narrower ban's expiry timer went with it.
        assert_eq!(w.timers.len(), 0);
        assert_eq!(w.chanserv.ban_count, 1);
    }

    #[test]
    fn subsumed_mask_updates_in_place() {
        let mut w = world_with_channel();
        upsert_ban(&mut w, "#t", ban("*!*@*.b", 2000));
        let result = upsert_ban(&mut w, "#t", ban("*!*@a.b", 9000));
        // Covered mask, longer expiry: the broad ban is extended.
        assert_eq!(result, BanAdd::Updated { extended: true });
        let reg = w.chanserv.channels.get("#t").unwrap();
        assert_eq!(reg.bans.len(), 1);
        assert_eq!(reg.bans[0].expires, 9000);

        // A shorter expiry only refreshes the reason.
        let result = upsert_ban(&mut w, "#t", ban("*!*@a.b", 1500));
        assert_eq!(result, BanAdd::Updated { extended: false });
    }

    #[test]
    fn permanent_is_the_longest_expiry() {
        assert!(longer_expiry(0, 500));
        assert!(!longer_expiry(500, 0));
        assert!(!longer_expiry(0, 0));
        assert!(longer_expiry(9, 5));
    }

    #[test]
    fn ban_cap_is_enforced() {
        let mut w = world_with_channel();
        w.conf.chanserv.max_chan_bans = 2;
        assert_eq!(upsert_ban(&mut w, "#t", ban("*!*@one", 0)), BanAdd::Added);
        assert_eq!(upsert_ban(&mut w, "#t", ban("*!*@two", 0)), BanAdd::Added);
        assert_eq!(upsert_ban(&mut w, "#t", ban("*!*@three", 0)), BanAdd::ListFull);
    }

    #[test]
    fn expire_removes_record_and_lifts_mode() {
        let mut w = world_with_channel();
        upsert_ban(&mut w, "#t", ban("*!*@gone", 1500));
        w.channels
            .insert("#t", crate::state::Channel::new("#t"));
        w.channels.get_mut("#t").unwrap().bans.push("*!*@gone".to_string());
        expire_ban(&mut w, "#t", "*!*@gone");
        assert!(w.chanserv.channels.get("#t").unwrap().bans.is_empty());
        assert!(w.channels.get("#t").unwrap().bans.is_empty());
        assert_eq!(w.chanserv.ban_count, 0);
    }
}
