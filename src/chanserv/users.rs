//! Channel user-list operations: the access-record mutators every other
//! part of the service goes through, plus the user management commands.

use super::access::{channel_user_level, handle_access};
use super::model::{
    level_from_name, level_name, UserReg, UL_COOWNER, UL_HELPER, UL_MASTER, UL_OP, UL_OWNER,
    UL_PEON, USER_AUTO_INVITE, USER_AUTO_OP,
};
use crate::accounts::HANDLE_FROZEN;
use crate::ircstr::{interval_string, irc_eq, match_ircglob, parse_interval};
use crate::modcmd::Invocation;
use crate::state::World;
use tracing::info;

/// Insert an access record, maintaining the channel list and the
/// account back-list together.
pub fn add_channel_user(world: &mut World, channel: &str, handle: &str, access: u16, seen: u64) {
    let Some(reg) = world.chanserv.channels.get_mut(channel) else {
        return;
    };
    let display = reg.name.clone();
    reg.users.insert(handle, UserReg::new(access, seen));
    world.accounts.ensure(handle).link_channel(&display);
    world.chanserv.user_count += 1;
    refresh_presence(world, channel, handle);
}

/// Remove an access record from both lists in one step.
pub fn del_channel_user(world: &mut World, channel: &str, handle: &str) -> Option<UserReg> {
    let reg = world.chanserv.channels.get_mut(channel)?;
    let removed = reg.users.remove(handle)?;
    if let Some(h) = world.accounts.get_mut(handle) {
        h.unlink_channel(channel);
    }
    world.chanserv.user_count = world.chanserv.user_count.saturating_sub(1);
    Some(removed)
}

/// Recompute one record's `present` bit from the live channel.
pub fn refresh_presence(world: &mut World, channel: &str, handle: &str) {
    let present = world.channels.get(channel).is_some_and(|c| {
        c.members.keys().any(|nick| {
            world
                .users
                .get(nick)
                .and_then(|u| u.account.as_deref())
                .is_some_and(|a| irc_eq(a, handle))
        })
    });
    if let Some(u) = world
        .chanserv
        .channels
        .get_mut(channel)
        .and_then(|reg| reg.users.get_mut(handle))
    {
        u.present = present;
    }
}

/// Rescan every record's presence for one channel (used after moves,
/// suspensions and netbursts).
pub fn rescan_presence(world: &mut World, channel: &str) {
    let handles: Vec<String> = world
        .chanserv
        .channels
        .get(channel)
        .map(|reg| reg.users.keys().map(str::to_string).collect())
        .unwrap_or_default();
    for handle in handles {
        refresh_presence(world, channel, &handle);
    }
}

/// Resolve a command argument naming an account: `*handle` directly, or
/// a nick whose user must be authenticated. Replies on failure.
pub fn resolve_handle(world: &mut World, from: &str, arg: &str) -> Option<String> {
    if let Some(name) = arg.strip_prefix('*') {
        match world.accounts.get(name) {
            Some(h) => return Some(h.handle.clone()),
            None => {
                let name = name.to_string();
                world.reply(from, "MSG_HANDLE_UNKNOWN", &[&name]);
                return None;
            }
        }
    }
    match world.users.get(arg) {
        None => {
            let arg = arg.to_string();
            world.reply(from, "MSG_NICK_UNKNOWN", &[&arg]);
            None
        }
        Some(user) => match user.account.clone() {
            Some(account) => Some(account),
            None => {
                let arg = arg.to_string();
                world.reply(from, "MSG_USER_AUTHENTICATE", &[&arg]);
                None
            }
        },
    }
}

fn actor_level(world: &World, inv: &Invocation) -> u16 {
    inv.channel()
        .and_then(|c| channel_user_level(world, c, &inv.user, true, false))
        .unwrap_or(0)
}

pub fn cmd_adduser(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let actor = actor_level(world, inv);
    let Some(access) = level_from_name(inv.arg(2).unwrap_or(""), UL_OWNER) else {
        let arg = inv.arg(2).unwrap_or("").to_string();
        world.reply(&inv.user, "CSMSG_INVALID_ACCESS", &[&arg]);
        return false;
    };
    if access >= actor {
        world.reply(&inv.user, "CSMSG_NO_BUMP_ACCESS", &[]);
        return false;
    }
    let Some(handle) = resolve_handle(world, &inv.user, inv.arg(1).unwrap_or("")) else {
        return false;
    };
    if let Some(existing) = handle_access(world, &channel, &handle) {
        world.reply(
            &inv.user,
            "CSMSG_USER_EXISTS",
            &[&handle, &channel, &existing],
        );
        return false;
    }
    let max_users = world.conf.chanserv.max_chan_users;
    if world
        .chanserv
        .channels
        .get(&channel)
        .is_some_and(|r| r.users.len() >= max_users)
    {
        world.reply(&inv.user, "CSMSG_MAXIMUM_USERS", &[&max_users]);
        return false;
    }
    let now = world.now;
    add_channel_user(world, &channel, &handle, access, now);
    world.reply(
        &inv.user,
        "CSMSG_ADDED_USER",
        &[&handle, &channel, &access],
    );
    true
}

pub fn cmd_clvl(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let actor = actor_level(world, inv);
    let Some(handle) = resolve_handle(world, &inv.user, inv.arg(1).unwrap_or("")) else {
        return false;
    };
    if world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.as_deref())
        .is_some_and(|a| irc_eq(a, &handle))
    {
        world.reply(&inv.user, "CSMSG_NO_SELF_CLVL", &[]);
        return false;
    }
    let Some(current) = handle_access(world, &channel, &handle) else {
        world.reply(&inv.user, "CSMSG_NO_CHAN_USER", &[&handle, &channel]);
        return false;
    };
    if current >= actor {
        world.reply(&inv.user, "CSMSG_USER_PROTECTED", &[&handle]);
        return false;
    }
    let Some(access) = level_from_name(inv.arg(2).unwrap_or(""), UL_OWNER) else {
        let arg = inv.arg(2).unwrap_or("").to_string();
        world.reply(&inv.user, "CSMSG_INVALID_ACCESS", &[&arg]);
        return false;
    };
    if access >= actor {
        world.reply(&inv.user, "CSMSG_NO_BUMP_ACCESS", &[]);
        return false;
    }
    if let Some(u) = world
        .chanserv
        .channels
        .get_mut(&channel)
        .and_then(|r| r.users.get_mut(&handle))
    {
        u.access = access;
    }
    world.reply(
        &inv.user,
        "CSMSG_CHANGED_ACCESS",
        &[&handle, &access, &channel],
    );
    true
}

pub fn cmd_deluser(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let actor = actor_level(world, inv);
    // With three arguments the second is a level name that must match
    // the record being deleted.
    let target_arg = inv.arg(inv.argv.len() - 1).unwrap_or("").to_string();
    let Some(handle) = resolve_handle(world, &inv.user, &target_arg) else {
        return false;
    };
    let Some(current) = handle_access(world, &channel, &handle) else {
        world.reply(&inv.user, "CSMSG_NO_CHAN_USER", &[&handle, &channel]);
        return false;
    };
    if inv.argv.len() > 2 {
        let claimed = inv.arg(1).unwrap_or("");
        if level_from_name(claimed, UL_OWNER) != Some(current) {
            let claimed = claimed.to_string();
            world.reply(
                &inv.user,
                "CSMSG_INCORRECT_ACCESS",
                &[&handle, &current, &claimed],
            );
            return false;
        }
    }
    if current >= actor {
        world.reply(&inv.user, "CSMSG_USER_PROTECTED", &[&handle]);
        return false;
    }
    del_channel_user(world, &channel, &handle);
    world.reply(
        &inv.user,
        "CSMSG_DELETED_USER",
        &[&handle, &current, &channel],
    );
    true
}

/// Self-removal. Owners may not delete themselves; co-owners and above
/// must confirm with the deterministic token.
pub fn cmd_deleteme(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(handle) = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone())
    else {
        return false;
    };
    let Some(access) = handle_access(world, &channel, &handle) else {
        world.reply(&inv.user, "CSMSG_NOT_USER", &[&channel]);
        return false;
    };
    if access >= UL_OWNER {
        world.reply(&inv.user, "CSMSG_NO_OWNER_DELETEME", &[]);
        return false;
    }
    if access >= UL_COOWNER {
        let confirm = super::confirmation_token(&handle, &channel);
        if inv.arg(1) != Some(confirm.as_str()) {
            world.reply(&inv.user, "CSMSG_CONFIRM_DELETEME", &[&confirm]);
            return false;
        }
    }
    del_channel_user(world, &channel, &handle);
    world.reply(&inv.user, "CSMSG_DELETED_YOU", &[&access, &channel]);
    true
}

/// Bulk delete of one access band matching a handle glob.
fn mdel(world: &mut World, inv: &Invocation, level: u16) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let actor = actor_level(world, inv);
    let upper = match level {
        UL_OWNER => UL_HELPER - 1,
        UL_COOWNER => UL_OWNER - 1,
        UL_MASTER => UL_COOWNER - 1,
        UL_OP => UL_MASTER - 1,
        _ => UL_OP - 1,
    };
    if actor <= upper {
        world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
        return false;
    }
    let glob = inv.arg(1).unwrap_or("*").to_string();
    let victims: Vec<String> = world
        .chanserv
        .channels
        .get(&channel)
        .map(|reg| {
            reg.users
                .iter()
                .filter(|(handle, u)| {
                    u.access >= level && u.access <= upper && match_ircglob(handle, &glob)
                })
                .map(|(handle, _)| handle.to_string())
                .collect()
        })
        .unwrap_or_default();
    for handle in &victims {
        del_channel_user(world, &channel, handle);
    }
    info!(channel = %channel, count = victims.len(), level, "Bulk user deletion");
    world.reply(
        &inv.user,
        "CSMSG_DELETED_USERS",
        &[&glob, &level, &upper, &channel],
    );
    true
}

pub fn cmd_mdelowner(world: &mut World, inv: &Invocation) -> bool {
    mdel(world, inv, UL_OWNER)
}

pub fn cmd_mdelcoowner(world: &mut World, inv: &Invocation) -> bool {
    mdel(world, inv, UL_COOWNER)
}

pub fn cmd_mdelmaster(world: &mut World, inv: &Invocation) -> bool {
    mdel(world, inv, UL_MASTER)
}

pub fn cmd_mdelop(world: &mut World, inv: &Invocation) -> bool {
    mdel(world, inv, UL_OP)
}

pub fn cmd_mdelpeon(world: &mut World, inv: &Invocation) -> bool {
    mdel(world, inv, UL_PEON)
}

/// `trim users <duration>` / `trim <min>[-<max>] <duration>` /
/// `trim bans <duration>`: age out inactive records. Frozen (vacation)
/// accounts are skipped.
pub fn cmd_trim(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let actor = actor_level(world, inv);
    let Some(duration) = inv.arg(2).and_then(parse_interval) else {
        let arg = inv.arg(2).unwrap_or("").to_string();
        world.reply(&inv.user, "MSG_INVALID_DURATION", &[&arg]);
        return false;
    };
    if duration < 60 {
        world.reply(&inv.user, "CSMSG_CANNOT_TRIM", &[]);
        return false;
    }
    let target = inv.arg(1).unwrap_or("").to_string();
    let cutoff = world.now.saturating_sub(duration);

    if irc_eq(&target, "bans") {
        let removed = super::bans::trim_bans(world, &channel, cutoff);
        let pretty = interval_string(duration);
        world.reply(
            &inv.user,
            "CSMSG_TRIMMED_BANS",
            &[&removed, &channel, &pretty],
        );
        return true;
    }

    let (min, max) = if irc_eq(&target, "users") {
        (1, actor.saturating_sub(1))
    } else if let Some((lo, hi)) = target.split_once('-') {
        match (level_from_name(lo, UL_OWNER), level_from_name(hi, UL_OWNER)) {
            (Some(lo), Some(hi)) if lo <= hi => (lo, hi),
            (Some(lo), Some(hi)) => {
                world.reply(&inv.user, "CSMSG_BAD_RANGE", &[&lo, &hi]);
                return false;
            }
            _ => {
                world.reply(&inv.user, "CSMSG_INVALID_TRIM", &[&target]);
                return false;
            }
        }
    } else if let Some(level) = level_from_name(&target, UL_OWNER) {
        (level, level)
    } else {
        world.reply(&inv.user, "CSMSG_INVALID_TRIM", &[&target]);
        return false;
    };
    if max >= actor {
        world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
        return false;
    }

    let victims: Vec<String> = world
        .chanserv
        .channels
        .get(&channel)
        .map(|reg| {
            reg.users
                .iter()
                .filter(|(handle, u)| {
                    u.access >= min
                        && u.access <= max
                        && u.seen < cutoff
                        && !u.present
                        && !world
                            .accounts
                            .get(handle)
                            .is_some_and(|h| h.flagged(HANDLE_FROZEN))
                })
                .map(|(handle, _)| handle.to_string())
                .collect()
        })
        .unwrap_or_default();
    for handle in &victims {
        del_channel_user(world, &channel, handle);
    }
    let pretty = interval_string(duration);
    world.reply(
        &inv.user,
        "CSMSG_TRIMMED_USERS",
        &[&victims.len(), &min, &max, &channel, &pretty],
    );
    true
}

/// Transfer ownership to another account, demoting the current owner.
pub fn cmd_giveownership(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(actor_handle) = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone())
    else {
        return false;
    };
    let staff = inv.perms & crate::modcmd::ACTION_STAFF != 0;
    let Some(reg) = world.chanserv.channels.get(&channel) else {
        return false;
    };
    if reg.owner_count() > 1 {
        world.reply(&inv.user, "CSMSG_MULTIPLE_OWNERS", &[&channel]);
        return false;
    }
    let period = world.conf.chanserv.giveownership_period;
    let elapsed = world.now.saturating_sub(reg.owner_transfer);
    if !staff && period > 0 && elapsed < period {
        let wait = interval_string(period - elapsed);
        world.reply(&inv.user, "CSMSG_TRANSFER_WAIT", &[&wait, &channel]);
        return false;
    }
    let Some(target) = resolve_handle(world, &inv.user, inv.arg(1).unwrap_or("")) else {
        return false;
    };
    if irc_eq(&target, &actor_handle) {
        world.reply(&inv.user, "CSMSG_NO_TRANSFER_SELF", &[]);
        return false;
    }
    let confirm = super::confirmation_token(&actor_handle, &channel);
    if inv.arg(2) != Some(confirm.as_str()) {
        world.reply(
            &inv.user,
            "CSMSG_CONFIRM_GIVEOWNERSHIP",
            &[&target, &target, &confirm],
        );
        return false;
    }
    // Demote the old owner, promote (or add) the new one.
    if let Some(u) = world
        .chanserv
        .channels
        .get_mut(&channel)
        .and_then(|r| r.users.get_mut(&actor_handle))
    {
        u.access = UL_COOWNER;
    }
    let now = world.now;
    match world
        .chanserv
        .channels
        .get_mut(&channel)
        .and_then(|r| r.users.get_mut(&target))
    {
        Some(u) => u.access = UL_OWNER,
        None => add_channel_user(world, &channel, &target, UL_OWNER, now),
    }
    if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
        reg.owner_transfer = now;
    }
    info!(
        target: "audit",
        channel = %channel,
        from = %actor_handle,
        to = %target,
        "Ownership transferred"
    );
    world.reply(&inv.user, "CSMSG_OWNERSHIP_GIVEN", &[&channel, &target]);
    true
}

/// `users`: the channel's access list, highest band first.
pub fn cmd_users(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let rows: Vec<(u16, String, String)> = world
        .chanserv
        .channels
        .get(&channel)
        .map(|reg| {
            let mut rows: Vec<_> = reg
                .users
                .iter()
                .map(|(handle, u)| {
                    let status = if u.suspended() {
                        "suspended"
                    } else if u.present {
                        "present"
                    } else {
                        ""
                    };
                    (u.access, handle.to_string(), status.to_string())
                })
                .collect();
            rows.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
            rows
        })
        .unwrap_or_default();
    world.reply(
        &inv.user,
        "CSMSG_ACCESS_ALL_HEADER",
        &[&channel, &1, &UL_OWNER],
    );
    for (access, handle, status) in rows {
        let band = level_name(access);
        world.reply(
            &inv.user,
            "CSMSG_USERS_ROW",
            &[&access, &band, &handle, &status],
        );
    }
    true
}

fn uset_flag(world: &mut World, inv: &Invocation, flag: u32, key: &'static str) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(handle) = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone())
    else {
        return false;
    };
    let Some(u) = world
        .chanserv
        .channels
        .get_mut(&channel)
        .and_then(|r| r.users.get_mut(&handle))
    else {
        world.reply(&inv.user, "CSMSG_NOT_USER", &[&channel]);
        return false;
    };
    match inv.arg(1) {
        Some(v) if irc_eq(v, "on") || v == "1" => u.flags |= flag,
        Some(v) if irc_eq(v, "off") || v == "0" => u.flags &= !flag,
        Some(other) => {
            let other = other.to_string();
            world.reply(&inv.user, "MSG_INVALID_BINARY", &[&other]);
            return false;
        }
        None => {}
    }
    let state = if world
        .chanserv
        .channels
        .get(&channel)
        .and_then(|r| r.users.get(&handle))
        .is_some_and(|u| u.flags & flag != 0)
    {
        "on"
    } else {
        "off"
    };
    world.reply(&inv.user, key, &[&state]);
    true
}

/// `uset noautoop`: suppress automatic ops at join.
pub fn cmd_uset_noautoop(world: &mut World, inv: &Invocation) -> bool {
    uset_flag(world, inv, USER_AUTO_OP, "CSMSG_USET_NOAUTOOP")
}

/// `uset autoinvite`: invite on request when the channel is closed.
pub fn cmd_uset_autoinvite(world: &mut World, inv: &Invocation) -> bool {
    uset_flag(world, inv, USER_AUTO_INVITE, "CSMSG_USET_AUTOINVITE")
}

/// `uset info [text|*]`: the greeting info line, length-capped.
pub fn cmd_uset_info(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let Some(handle) = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone())
    else {
        return false;
    };
    if !world
        .chanserv
        .channels
        .get(&channel)
        .is_some_and(|r| r.users.contains(&handle))
    {
        world.reply(&inv.user, "CSMSG_NOT_USER", &[&channel]);
        return false;
    }
    if inv.argv.len() > 1 {
        let text = inv.argv[1..].join(" ");
        let new_info = if text == "*" { None } else { Some(text) };
        let cap = world.conf.chanserv.max_userinfo_length;
        if new_info.as_ref().is_some_and(|t| t.len() > cap) {
            world.reply(&inv.user, "CSMSG_INFOLINE_TOO_LONG", &[&cap]);
            return false;
        }
        if let Some(u) = world
            .chanserv
            .channels
            .get_mut(&channel)
            .and_then(|r| r.users.get_mut(&handle))
        {
            u.info = new_info;
        }
    }
    let info = world
        .chanserv
        .channels
        .get(&channel)
        .and_then(|r| r.users.get(&handle))
        .and_then(|u| u.info.clone())
        .unwrap_or_else(|| "(none)".to_string());
    world.reply(&inv.user, "CSMSG_USET_INFO", &[&info]);
    true
}

/// Every record removed when an account is dropped by the store.
pub fn handle_unregistered(world: &mut World, handle: &str) {
    let channels: Vec<String> = world
        .accounts
        .get(handle)
        .map(|h| h.channels.clone())
        .unwrap_or_default();
    for channel in channels {
        del_channel_user(world, &channel, handle);
    }
}
