//! Channel registration lifecycle: register, unregister, move, merge,
//! and the teardown path shared with expiry.

use super::access::channel_user_level;
use super::model::{
    ChannelReg, CHANNEL_NODELETE, CHANNEL_OFFCHANNEL, CHANNEL_UNREVIEWED, UL_OWNER,
};
use super::users::{add_channel_user, del_channel_user, rescan_presence, resolve_handle};
use crate::actions::Action;
use crate::ircstr::irc_eq;
use crate::modcmd::{Invocation, ACTION_STAFF};
use crate::state::{Channel, ModeLock, TimerEvent, World};
use tracing::info;

/// How many channels a handle owns at level 500.
fn owned_count(world: &World, handle: &str) -> usize {
    world
        .accounts
        .get(handle)
        .map(|h| {
            h.channels
                .iter()
                .filter(|chan| {
                    world
                        .chanserv
                        .channels
                        .get(chan)
                        .and_then(|reg| reg.users.get(handle))
                        .is_some_and(|u| u.access >= UL_OWNER)
                })
                .count()
        })
        .unwrap_or(0)
}

/// Join the service bot (opped), or mark the channel registered without
/// joining when it is off-channel.
pub fn emit_channel_presence(world: &mut World, channel: &str) {
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return;
    };
    let bot = world.conf.chanserv.nick.clone();
    if reg.flags & CHANNEL_OFFCHANNEL != 0 {
        world.push_mode(channel, &crate::state::ModeChange::parse(&["+z"]).unwrap_or_default());
    } else {
        world.actions.push(Action::BotJoin {
            bot,
            channel: channel.to_string(),
            op: true,
        });
    }
}

/// Support helpers and security-override staff may register on behalf
/// of others and bypass the in-channel ops requirement.
fn acting_as_staff(world: &World, inv: &Invocation) -> bool {
    inv.perms & ACTION_STAFF != 0
        || world
            .account_of(&inv.user)
            .is_some_and(|h| h.is_helping() || h.is_support_helper())
}

pub fn cmd_register(world: &mut World, inv: &Invocation) -> bool {
    let staff = acting_as_staff(world, inv);
    let channel_name = match inv.channel() {
        Some(c) => c.to_string(),
        None => inv.arg(1).unwrap_or("").to_string(),
    };
    if !channel_name.starts_with('#') {
        world.reply(&inv.user, "CSMSG_ILLEGAL_CHANNEL", &[&channel_name]);
        return false;
    }
    if world.chanserv.channels.contains(&channel_name) {
        world.reply(&inv.user, "CSMSG_ALREADY_REGGED", &[&channel_name]);
        return false;
    }

    // A second non-channel argument registers on behalf of another
    // account (staff only, by the binding's rules).
    let mut handle_arg = None;
    let mut force = false;
    for arg in inv.argv.iter().skip(1) {
        if crate::ircstr::is_channel_name(arg) {
            continue;
        }
        if irc_eq(arg, "force") {
            force = true;
        } else {
            handle_arg = Some(arg.clone());
        }
    }
    let force = force && staff;
    let handle = match handle_arg {
        Some(arg) => match resolve_handle(world, &inv.user, &arg) {
            Some(h) => h,
            None => return false,
        },
        None => match world.users.get(&inv.user).and_then(|u| u.account.clone()) {
            Some(h) => h,
            None => return false,
        },
    };

    // The registrant must hold ops in the live channel, unless staff is
    // doing the registration.
    if !staff
        && !world
            .channels
            .get(&channel_name)
            .is_some_and(|c| c.is_op(&inv.user))
    {
        world.reply(&inv.user, "CSMSG_MUST_BE_OPPED", &[&channel_name]);
        return false;
    }

    if !force {
        if let Some((target, dnr)) = super::dnr::blocking_dnr(world, &channel_name, &handle) {
            super::dnr::send_dnr_info(world, &inv.user, &target, &dnr);
            let key = if target.starts_with('*') {
                "CSMSG_DNR_ACCOUNT"
            } else {
                "CSMSG_DNR_CHANNEL"
            };
            world.reply(&inv.user, key, &[&target]);
            return false;
        }
        let max_owned = world.conf.chanserv.max_owned;
        if max_owned > 0 && owned_count(world, &handle) >= max_owned {
            world.reply(&inv.user, "CSMSG_OWN_TOO_MANY", &[&handle, &max_owned]);
            return false;
        }
    }

    if !world.channels.contains(&channel_name) {
        world.channels.insert(&channel_name, Channel::new(&channel_name));
    }
    let now = world.now;
    let mut reg = ChannelReg::new(&channel_name, now);
    reg.flags |= CHANNEL_UNREVIEWED;
    if world.conf.chanserv.off_channel {
        reg.flags |= CHANNEL_OFFCHANNEL;
    }
    let default_modes: Vec<&str> = world.conf.chanserv.default_modes.split(' ').collect();
    let default_modes = ModeLock::parse(&default_modes).unwrap_or_default();
    reg.modes = default_modes;
    reg.registrar = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone());
    world.chanserv.channels.insert(&channel_name, reg);
    add_channel_user(world, &channel_name, &handle, UL_OWNER, now);
    emit_channel_presence(world, &channel_name);
    // Assert the default mode lock on the fresh channel.
    let lock = super::hooks::lock_as_change(world, &channel_name);
    world.push_mode(&channel_name, &lock);

    info!(target: "audit", channel = %channel_name, owner = %handle, by = %inv.user, "Channel registered");
    let self_reg = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.as_deref())
        .is_some_and(|a| irc_eq(a, &handle));
    if self_reg {
        world.reply(&inv.user, "CSMSG_REG_SUCCESS", &[&channel_name]);
    } else {
        world.reply(&inv.user, "CSMSG_PROXY_SUCCESS", &[&handle, &channel_name]);
    }
    true
}

/// Drop every timer entry keyed to a registration.
fn cancel_channel_timers(world: &mut World, channel: &str) {
    world.timers.del(None, |ev| match ev {
        TimerEvent::BanExpire { channel: c, .. }
        | TimerEvent::SuspensionExpire { channel: c }
        | TimerEvent::AdjustLimit { channel: c } => irc_eq(c, channel),
        _ => false,
    });
}

/// The shared teardown path: manual unregister, expiry, merge source
/// and forced removal all end here.
pub fn unregister_channel(world: &mut World, channel: &str, reason: &str) {
    let handles: Vec<String> = world
        .chanserv
        .channels
        .get(channel)
        .map(|reg| reg.users.keys().map(str::to_string).collect())
        .unwrap_or_default();
    for handle in handles {
        del_channel_user(world, channel, &handle);
    }
    let removed_bans = world
        .chanserv
        .channels
        .get(channel)
        .map_or(0, |reg| reg.bans.len());
    world.chanserv.ban_count = world.chanserv.ban_count.saturating_sub(removed_bans);
    cancel_channel_timers(world, channel);

    // Note-type reference counts drop with the channel's notes.
    let note_types: Vec<String> = world
        .chanserv
        .channels
        .get(channel)
        .map(|reg| reg.notes.keys().map(str::to_string).collect())
        .unwrap_or_default();
    for ty in note_types {
        if let Some(nt) = world.chanserv.note_types.get_mut(&ty) {
            nt.refs = nt.refs.saturating_sub(1);
        }
    }

    let offchannel = world
        .chanserv
        .channels
        .get(channel)
        .is_some_and(|r| r.flags & CHANNEL_OFFCHANNEL != 0);
    world.chanserv.channels.remove(channel);
    if !offchannel {
        let bot = world.conf.chanserv.nick.clone();
        world.actions.push(Action::BotPart {
            bot,
            channel: channel.to_string(),
            reason: reason.to_string(),
        });
    }
    info!(target: "audit", channel, reason, "Channel unregistered");
}

pub fn cmd_unregister(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let level = channel_user_level(world, &channel, &inv.user, true, false).unwrap_or(0);
    if level < UL_OWNER {
        world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
        return false;
    }
    let Some(reg) = world.chanserv.channels.get(&channel) else {
        return false;
    };
    if reg.flags & CHANNEL_NODELETE != 0 {
        world.reply(&inv.user, "CSMSG_UNREG_NODELETE", &[&channel]);
        return false;
    }
    // Owners confirm with the deterministic token; staff without a
    // record in the channel skip it.
    let actor_handle = world.users.get(&inv.user).and_then(|u| u.account.clone());
    if let Some(handle) = actor_handle {
        if world
            .chanserv
            .channels
            .get(&channel)
            .is_some_and(|r| r.users.contains(&handle))
        {
            let confirm = super::confirmation_token(&handle, &channel);
            if inv.arg(1) != Some(confirm.as_str()) {
                world.reply(&inv.user, "CSMSG_CONFIRM_UNREG", &[&confirm]);
                return false;
            }
        }
    }
    let reason = format!("unregistered by {}.", inv.user);
    unregister_channel(world, &channel, &reason);
    world.reply(&inv.user, "CSMSG_UNREG_SUCCESS", &[&channel]);
    true
}

/// Re-key timers when a registration moves between channel names.
fn rekey_timers(world: &mut World, old: &str, new: &str) {
    let mut moved: Vec<(u64, TimerEvent)> = Vec::new();
    world.timers.del(None, |ev| {
        matches!(ev,
            TimerEvent::BanExpire { channel, .. }
            | TimerEvent::SuspensionExpire { channel }
            | TimerEvent::AdjustLimit { channel }
            if irc_eq(channel, old))
    });
    // Deleted entries are rebuilt against the new name from the moved
    // registration itself.
    let Some(reg) = world.chanserv.channels.get(new) else {
        return;
    };
    for ban in &reg.bans {
        if ban.expires > 0 {
            moved.push((
                ban.expires,
                TimerEvent::BanExpire {
                    channel: new.to_string(),
                    mask: ban.mask.clone(),
                },
            ));
        }
    }
    if let Some(susp) = &reg.suspended {
        if susp.expires > 0 && susp.active(world.now) {
            moved.push((
                susp.expires,
                TimerEvent::SuspensionExpire {
                    channel: new.to_string(),
                },
            ));
        }
    }
    for (when, ev) in moved {
        world.timers.add(when, ev);
    }
}

pub fn cmd_move(world: &mut World, inv: &Invocation) -> bool {
    let Some(source) = inv.channel().map(str::to_string) else {
        return false;
    };
    let staff = acting_as_staff(world, inv);
    let level = channel_user_level(world, &source, &inv.user, true, false).unwrap_or(0);
    if level < UL_OWNER {
        world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
        return false;
    }
    let target = inv
        .argv
        .iter()
        .skip(1)
        .find(|a| crate::ircstr::is_channel_name(a))
        .cloned()
        .unwrap_or_default();
    if !target.starts_with('#') {
        world.reply(&inv.user, "CSMSG_ILLEGAL_CHANNEL", &[&target]);
        return false;
    }
    if world.chanserv.channels.contains(&target) {
        world.reply(&inv.user, "CSMSG_ALREADY_REGGED", &[&target]);
        return false;
    }
    if world
        .chanserv
        .channels
        .get(&source)
        .is_some_and(|r| r.flags & CHANNEL_NODELETE != 0)
    {
        world.reply(&inv.user, "CSMSG_MOVE_NODELETE", &[&source]);
        return false;
    }
    if !staff {
        if let Some((dnr_target, dnr)) = super::dnr::blocking_dnr(world, &target, "") {
            super::dnr::send_dnr_info(world, &inv.user, &dnr_target, &dnr);
            world.reply(&inv.user, "CSMSG_DNR_CHANNEL_MOVE", &[&target]);
            return false;
        }
    }

    // Transfer the registration in place; records and bans need no
    // rewriting, only the back-lists and timers re-key.
    let Some(mut reg) = world.chanserv.channels.remove(&source) else {
        return false;
    };
    reg.name = target.clone();
    let handles: Vec<String> = reg.users.keys().map(str::to_string).collect();
    world.chanserv.channels.insert(&target, reg);
    for handle in &handles {
        if let Some(h) = world.accounts.get_mut(handle) {
            h.unlink_channel(&source);
            h.link_channel(&target);
        }
    }
    rekey_timers(world, &source, &target);
    if !world.channels.contains(&target) {
        world.channels.insert(&target, Channel::new(&target));
    }
    let bot = world.conf.chanserv.nick.clone();
    world.actions.push(Action::BotPart {
        bot,
        channel: source.clone(),
        reason: format!("Channel moved to {}", target),
    });
    emit_channel_presence(world, &target);
    rescan_presence(world, &target);
    info!(target: "audit", from = %source, to = %target, by = %inv.user, "Channel moved");
    world.reply(&inv.user, "CSMSG_MOVE_SUCCESS", &[&target]);
    true
}

pub fn cmd_merge(world: &mut World, inv: &Invocation) -> bool {
    let Some(source) = inv.channel().map(str::to_string) else {
        return false;
    };
    let target = inv.arg(1).unwrap_or("").to_string();
    let Some(target) = world
        .chanserv
        .channels
        .display_key(&target)
        .map(str::to_string)
    else {
        world.reply(&inv.user, "CSMSG_NOT_REGISTERED", &[&target]);
        return false;
    };
    if irc_eq(&source, &target) {
        world.reply(&inv.user, "CSMSG_MERGE_SELF", &[]);
        return false;
    }
    if world
        .chanserv
        .channels
        .get(&source)
        .is_some_and(|r| r.flags & CHANNEL_NODELETE != 0)
    {
        world.reply(&inv.user, "CSMSG_MERGE_NODELETE", &[]);
        return false;
    }
    let suspended = |world: &World, c: &str| {
        world
            .chanserv
            .channels
            .get(c)
            .is_some_and(|r| r.is_suspended())
    };
    if suspended(world, &source) || suspended(world, &target) {
        world.reply(&inv.user, "CSMSG_MERGE_SUSPENDED", &[]);
        return false;
    }
    // Owner of the target (or staff) required; owner of source is the
    // binding's own requirement.
    let target_level = channel_user_level(world, &target, &inv.user, true, false).unwrap_or(0);
    if target_level < UL_OWNER {
        world.reply(&inv.user, "CSMSG_MERGE_NOT_OWNER", &[]);
        return false;
    }

    // Colliding access records keep the higher level; equal levels keep
    // the later-seen record's seen time.
    let source_users: Vec<(String, super::model::UserReg)> = world
        .chanserv
        .channels
        .get(&source)
        .map(|reg| {
            reg.users
                .iter()
                .map(|(h, u)| (h.to_string(), u.clone()))
                .collect()
        })
        .unwrap_or_default();
    for (handle, src_user) in source_users {
        let existing = world
            .chanserv
            .channels
            .get(&target)
            .and_then(|r| r.users.get(&handle))
            .cloned();
        match existing {
            None => {
                add_channel_user(world, &target, &handle, src_user.access, src_user.seen);
                if let Some(u) = world
                    .chanserv
                    .channels
                    .get_mut(&target)
                    .and_then(|r| r.users.get_mut(&handle))
                {
                    u.flags = src_user.flags;
                    u.info = src_user.info.clone();
                }
            }
            Some(dst_user) => {
                let u = world
                    .chanserv
                    .channels
                    .get_mut(&target)
                    .and_then(|r| r.users.get_mut(&handle));
                if let Some(u) = u {
                    if src_user.access > dst_user.access
                        || (src_user.access == dst_user.access && src_user.seen > dst_user.seen)
                    {
                        u.access = src_user.access;
                    }
                    u.seen = u.seen.max(src_user.seen);
                }
            }
        }
    }

    // Bans merge through the coalescing inserter: broader masks win and
    // keep the later timestamps.
    let source_bans: Vec<super::model::BanReg> = world
        .chanserv
        .channels
        .get(&source)
        .map(|reg| reg.bans.clone())
        .unwrap_or_default();
    for ban in source_bans {
        super::bans::merge_ban(world, &target, ban);
    }

    let reason = format!("merged into {}.", target);
    unregister_channel(world, &source, &reason);
    rescan_presence(world, &target);
    info!(target: "audit", from = %source, to = %target, by = %inv.user, "Channels merged");
    world.reply(&inv.user, "CSMSG_MERGE_SUCCESS", &[&target]);
    true
}
