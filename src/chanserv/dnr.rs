//! Do-not-register rules: exact channel names, wildcard patterns and
//! account handles.

use super::model::Dnr;
use crate::ircstr::{irc_eq, match_ircglob, parse_interval};
use crate::modcmd::Invocation;
use crate::state::World;
use chrono::{TimeZone, Utc};
use tracing::info;

fn format_ts(ts: u64) -> String {
    Utc.timestamp_opt(ts as i64, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "(unknown)".to_string())
}

/// Look for a rule blocking registration of `channel` to `handle`.
/// Expired rules encountered on the way are dropped (lazy expiry).
pub fn blocking_dnr(world: &mut World, channel: &str, handle: &str) -> Option<(String, Dnr)> {
    let now = world.now;
    // Exact channel name.
    if let Some(dnr) = world.chanserv.plain_dnrs.get(channel) {
        if dnr.expired(now) {
            world.chanserv.plain_dnrs.remove(channel);
        } else {
            let target = world
                .chanserv
                .plain_dnrs
                .display_key(channel)
                .unwrap_or(channel)
                .to_string();
            let dnr = world.chanserv.plain_dnrs.get(channel).cloned()?;
            return Some((target, dnr));
        }
    }
    // Wildcard patterns.
    let hit = world
        .chanserv
        .mask_dnrs
        .iter()
        .find(|(pattern, dnr)| !dnr.expired(now) && match_ircglob(channel, pattern))
        .map(|(pattern, dnr)| (pattern.to_string(), dnr.clone()));
    world.chanserv.mask_dnrs.retain(|_, dnr| !dnr.expired(now));
    if let Some(hit) = hit {
        return Some(hit);
    }
    // Handle rules.
    if !handle.is_empty() {
        if let Some(dnr) = world.chanserv.handle_dnrs.get(handle) {
            if dnr.expired(now) {
                world.chanserv.handle_dnrs.remove(handle);
            } else {
                let target = format!(
                    "*{}",
                    world
                        .chanserv
                        .handle_dnrs
                        .display_key(handle)
                        .unwrap_or(handle)
                );
                let dnr = world.chanserv.handle_dnrs.get(handle).cloned()?;
                return Some((target, dnr));
            }
        }
    }
    None
}

/// Describe one rule to a user.
pub fn send_dnr_info(world: &mut World, to: &str, target: &str, dnr: &Dnr) {
    let target = target.to_string();
    let set = format_ts(dnr.set);
    let setter = dnr.setter.clone();
    let reason = dnr.reason.clone();
    world.reply(to, "CSMSG_DNR_INFO_SET", &[&target, &set, &setter, &reason]);
}

/// `noregister [target [duration] reason]`: list rules, or add one.
/// Targets starting with `*` protect accounts.
pub fn cmd_noregister(world: &mut World, inv: &Invocation) -> bool {
    if inv.argv.len() < 2 {
        // Listing mode.
        world.reply(&inv.user, "CSMSG_DNR_SEARCH_RESULTS", &[]);
        let entries: Vec<(String, Dnr)> = world
            .chanserv
            .plain_dnrs
            .iter()
            .chain(world.chanserv.mask_dnrs.iter())
            .map(|(t, d)| (t.to_string(), d.clone()))
            .chain(
                world
                    .chanserv
                    .handle_dnrs
                    .iter()
                    .map(|(t, d)| (format!("*{}", t), d.clone())),
            )
            .collect();
        for (target, dnr) in entries {
            send_dnr_info(world, &inv.user, &target, &dnr);
        }
        return true;
    }
    let target = inv.arg(1).unwrap_or("").to_string();
    if !target.starts_with('*') && !crate::ircstr::is_channel_name(&target) {
        world.reply(&inv.user, "CSMSG_NOT_DNR", &[&target]);
        return false;
    }
    let mut reason_start = 2;
    let duration = inv
        .arg(2)
        .filter(|a| a.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .and_then(parse_interval)
        .inspect(|_| reason_start = 3)
        .unwrap_or(0);
    if inv.argv.len() <= reason_start {
        let name = inv.cmd_name.clone();
        world.reply(&inv.user, "MSG_MISSING_PARAMS", &[&name]);
        return false;
    }
    let reason = inv.argv[reason_start..].join(" ");
    let setter = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone())
        .unwrap_or_else(|| inv.user.clone());
    let dnr = Dnr {
        setter,
        set: world.now,
        expires: if duration > 0 { world.now + duration } else { 0 },
        reason,
    };
    if let Some(handle) = target.strip_prefix('*') {
        world.chanserv.handle_dnrs.insert(handle, dnr);
    } else if target.contains('*') || target.contains('?') {
        world.chanserv.mask_dnrs.insert(&target, dnr);
    } else {
        world.chanserv.plain_dnrs.insert(&target, dnr);
    }
    info!(target: "audit", dnr = %target, by = %inv.user, "Do-not-register added");
    world.reply(&inv.user, "CSMSG_NOREGISTER_CHANNEL", &[&target]);
    true
}

/// `allowregister <target>`: drop a rule.
pub fn cmd_allowregister(world: &mut World, inv: &Invocation) -> bool {
    let target = inv.arg(1).unwrap_or("").to_string();
    let removed = if let Some(handle) = target.strip_prefix('*') {
        world.chanserv.handle_dnrs.remove(handle).is_some()
    } else {
        world.chanserv.plain_dnrs.remove(&target).is_some()
            || world.chanserv.mask_dnrs.remove(&target).is_some()
    };
    if removed {
        info!(target: "audit", dnr = %target, by = %inv.user, "Do-not-register removed");
        world.reply(&inv.user, "CSMSG_DNR_REMOVED", &[&target]);
        true
    } else {
        world.reply(&inv.user, "CSMSG_NO_SUCH_DNR", &[&target]);
        false
    }
}

/// Periodic sweep dropping expired rules from all three maps.
pub fn dnr_sweep(world: &mut World) {
    let now = world.now;
    let mut removed = 0usize;
    for dnrs in [
        &mut world.chanserv.plain_dnrs,
        &mut world.chanserv.mask_dnrs,
        &mut world.chanserv.handle_dnrs,
    ] {
        let before = dnrs.len();
        dnrs.retain(|_, d| !d.expired(now));
        removed += before - dnrs.len();
    }
    if removed > 0 {
        info!(removed, "Expired do-not-register rules removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::Config;

    fn dnr(expires: u64) -> Dnr {
        Dnr {
            setter: "ops".to_string(),
            set: 100,
            expires,
            reason: "spam".to_string(),
        }
    }

    #[test]
    fn lookup_consults_all_three_maps() {
        let mut w = World::new(Config::default());
        w.now = 1000;
        w.chanserv.plain_dnrs.insert("#exact", dnr(0));
        w.chanserv.mask_dnrs.insert("#bad*", dnr(0));
        w.chanserv.handle_dnrs.insert("Spammer", dnr(0));

        assert!(blocking_dnr(&mut w, "#exact", "Someone").is_some());
        assert!(blocking_dnr(&mut w, "#badchannel", "Someone").is_some());
        let (target, _) = blocking_dnr(&mut w, "#fine", "Spammer").unwrap();
        assert_eq!(target, "*Spammer");
        assert!(blocking_dnr(&mut w, "#fine", "Someone").is_none());
    }

    #[test]
    fn expired_rules_drop_on_lookup() {
        let mut w = World::new(Config::default());
        w.now = 2000;
        w.chanserv.plain_dnrs.insert("#old", dnr(1500));
        assert!(blocking_dnr(&mut w, "#old", "x").is_none());
        assert!(w.chanserv.plain_dnrs.is_empty());
    }

    #[test]
    fn sweep_prunes_all_maps() {
        let mut w = World::new(Config::default());
        w.now = 2000;
        w.chanserv.plain_dnrs.insert("#a", dnr(100));
        w.chanserv.mask_dnrs.insert("#b*", dnr(100));
        w.chanserv.handle_dnrs.insert("c", dnr(0));
        dnr_sweep(&mut w);
        assert!(w.chanserv.plain_dnrs.is_empty());
        assert!(w.chanserv.mask_dnrs.is_empty());
        assert_eq!(w.chanserv.handle_dnrs.len(), 1);
    }
}
