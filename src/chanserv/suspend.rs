//! Channel and per-user suspension lifecycle.

use super::access::channel_user_level;
use super::model::{Suspension, CHANNEL_SUSPENDED};
use super::users::rescan_presence;
use crate::actions::{Action, MSG_RECIPIENT_HELPERS, MSG_RECIPIENT_OPERS};
use crate::ircstr::{irc_eq, parse_interval};
use crate::modcmd::Invocation;
use crate::state::{TimerEvent, World};
use tracing::info;

/// `csuspend <duration|0> <reason>`: suspend the channel, parting the
/// bot and blanking presence until expiry or revocation.
pub fn cmd_csuspend(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    if world
        .chanserv
        .channels
        .get(&channel)
        .is_some_and(|r| r.is_protected())
    {
        world.reply(&inv.user, "CSMSG_SUSPEND_NODELETE", &[&channel]);
        return false;
    }
    let duration_arg = inv.arg(1).unwrap_or("0");
    let duration = if duration_arg == "0" {
        0
    } else {
        match parse_interval(duration_arg) {
            Some(d) => d,
            None => {
                let arg = duration_arg.to_string();
                world.reply(&inv.user, "MSG_INVALID_DURATION", &[&arg]);
                return false;
            }
        }
    };
    let reason = if inv.argv.len() > 2 {
        inv.argv[2..].join(" ")
    } else {
        "No reason given.".to_string()
    };
    let suspender = world
        .users
        .get(&inv.user)
        .and_then(|u| u.account.clone())
        .unwrap_or_else(|| inv.user.clone());
    let now = world.now;
    let expires = if duration > 0 { now + duration } else { 0 };

    let Some(reg) = world.chanserv.channels.get_mut(&channel) else {
        return false;
    };
    let previous = reg.suspended.take();
    reg.suspended = Some(Box::new(Suspension {
        suspender: suspender.clone(),
        reason: reason.clone(),
        issued: now,
        expires,
        revoked: 0,
        previous,
    }));
    reg.flags |= CHANNEL_SUSPENDED;
    for user in reg.users.values_mut() {
        user.present = false;
    }
    if expires > 0 {
        world.timers.add(
            expires,
            TimerEvent::SuspensionExpire {
                channel: channel.clone(),
            },
        );
    }
    let bot = world.conf.chanserv.nick.clone();
    world.actions.push(Action::BotPart {
        bot,
        channel: channel.clone(),
        reason: "Channel suspended.".to_string(),
    });
    world.actions.push(Action::Global {
        recipients: MSG_RECIPIENT_OPERS | MSG_RECIPIENT_HELPERS,
        text: format!("{} suspended {}: {}", suspender, channel, reason),
    });
    info!(target: "audit", channel = %channel, by = %suspender, reason = %reason, "Channel suspended");
    world.reply(&inv.user, "CSMSG_SUSPENDED", &[&channel]);
    true
}

/// Lift the active suspension: the bot rejoins and presence rescans.
fn lift_suspension(world: &mut World, channel: &str, revoked_at: Option<u64>) {
    let Some(reg) = world.chanserv.channels.get_mut(channel) else {
        return;
    };
    if let Some(susp) = reg.suspended.as_mut() {
        if let Some(at) = revoked_at {
            susp.revoked = at;
        }
    }
    reg.flags &= !CHANNEL_SUSPENDED;
    world.timers.del(None, |ev| {
        matches!(ev, TimerEvent::SuspensionExpire { channel: c } if irc_eq(c, channel))
    });
    super::register::emit_channel_presence(world, channel);
    rescan_presence(world, channel);
}

pub fn cmd_cunsuspend(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let suspended = world
        .chanserv
        .channels
        .get(&channel)
        .is_some_and(|r| r.is_suspended());
    if !suspended {
        world.reply(&inv.user, "CSMSG_NOT_SUSPENDED", &[&channel]);
        return false;
    }
    let now = world.now;
    lift_suspension(world, &channel, Some(now));
    info!(target: "audit", channel = %channel, by = %inv.user, "Channel unsuspended");
    world.reply(&inv.user, "CSMSG_UNSUSPENDED", &[&channel]);
    true
}

/// Timer handler: the active suspension ran out.
pub fn suspension_expired(world: &mut World, channel: &str) {
    let still_active = world
        .chanserv
        .channels
        .get(channel)
        .and_then(|r| r.suspended.as_ref())
        .is_some_and(|s| s.revoked == 0 && s.expires != 0 && s.expires <= world.now);
    if !still_active {
        return;
    }
    info!(channel, "Channel suspension expired");
    lift_suspension(world, channel, None);
}

/// `suspend <account>`: freeze one access record.
pub fn cmd_suspend(world: &mut World, inv: &Invocation) -> bool {
    set_user_suspension(world, inv, true)
}

/// `unsuspend <account>`: restore one access record.
pub fn cmd_unsuspend(world: &mut World, inv: &Invocation) -> bool {
    set_user_suspension(world, inv, false)
}

fn set_user_suspension(world: &mut World, inv: &Invocation, suspend: bool) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let actor = channel_user_level(world, &channel, &inv.user, true, false).unwrap_or(0);
    let Some(handle) = super::users::resolve_handle(world, &inv.user, inv.arg(1).unwrap_or(""))
    else {
        return false;
    };
    let Some(current) = super::access::handle_access(world, &channel, &handle) else {
        world.reply(&inv.user, "CSMSG_NO_CHAN_USER", &[&handle, &channel]);
        return false;
    };
    if current >= actor {
        world.reply(&inv.user, "CSMSG_USER_PROTECTED", &[&handle]);
        return false;
    }
    if let Some(u) = world
        .chanserv
        .channels
        .get_mut(&channel)
        .and_then(|r| r.users.get_mut(&handle))
    {
        if suspend {
            u.flags |= super::model::USER_SUSPENDED;
            u.present = false;
        } else {
            u.flags &= !super::model::USER_SUSPENDED;
        }
    }
    if !suspend {
        super::users::refresh_presence(world, &channel, &handle);
    }
    let key = if suspend {
        "CSMSG_USER_SUSPENDED"
    } else {
        "CSMSG_USER_UNSUSPENDED"
    };
    world.reply(&inv.user, key, &[&handle, &channel]);
    true
}
