//! Periodic sweeps: channel expiry and topic refresh.

use super::model::{topic_refresh_period, CHANNEL_NODELETE, CH_TOPICREFRESH, UL_PRESENT};
use crate::accounts::HANDLE_BOT;
use crate::actions::Action;
use crate::modcmd::Invocation;
use crate::state::{TimerEvent, World};
use tracing::info;

/// Is anything keeping this registration alive? A present user at or
/// above the presence level whose account is not a bot does.
fn keeps_channel(world: &World, channel: &str) -> bool {
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return true;
    };
    reg.users.iter().any(|(handle, u)| {
        u.present
            && u.access >= UL_PRESENT
            && !world
                .accounts
                .get(handle)
                .is_some_and(|h| h.flagged(HANDLE_BOT))
    })
}

/// One expiry pass: registrations whose `visited` is stale and that
/// have no qualifying present user are unregistered.
pub fn channel_expire_sweep(world: &mut World) -> usize {
    let delay = world.conf.chanserv.channel_expire_delay;
    let cutoff = world.now.saturating_sub(delay);
    let candidates: Vec<String> = world
        .chanserv
        .channels
        .iter()
        .filter(|(_, reg)| reg.flags & CHANNEL_NODELETE == 0 && reg.visited < cutoff)
        .map(|(name, _)| name.to_string())
        .collect();
    let mut expired = 0;
    for channel in candidates {
        if keeps_channel(world, &channel) {
            continue;
        }
        super::register::unregister_channel(world, &channel, "expired.");
        expired += 1;
    }
    if expired > 0 {
        info!(count = expired, "Registered channels expired");
    }
    expired
}

/// Timer handler: run the sweep and re-arm.
pub fn timed_channel_expire(world: &mut World) {
    channel_expire_sweep(world);
    let freq = world.conf.chanserv.channel_expire_frequency;
    if freq > 0 {
        let when = world.now + freq;
        world.timers.add(when, TimerEvent::ChannelExpireSweep);
    }
}

/// Timer handler: dnr sweep plus re-arm.
pub fn timed_dnr_expire(world: &mut World) {
    super::dnr::dnr_sweep(world);
    let freq = world.conf.chanserv.dnr_expire_frequency;
    if freq > 0 {
        let when = world.now + freq;
        world.timers.add(when, TimerEvent::DnrSweep);
    }
}

/// Re-assert default topics on channels whose refresh period elapsed.
pub fn topic_refresh_sweep(world: &mut World) {
    let now = world.now;
    let due: Vec<(String, String)> = world
        .chanserv
        .channels
        .iter()
        .filter_map(|(name, reg)| {
            if reg.is_suspended() {
                return None;
            }
            let period = topic_refresh_period(reg.ch_opts[CH_TOPICREFRESH])?;
            if now.saturating_sub(reg.last_refresh) < period {
                return None;
            }
            reg.topic.clone().map(|t| (name.to_string(), t))
        })
        .collect();
    for (channel, topic) in due {
        if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
            reg.last_refresh = now;
        }
        if let Some(c) = world.channels.get_mut(&channel) {
            c.topic = topic.clone();
        }
        world.actions.push(Action::Topic { channel, topic });
    }
}

/// Timer handler: refresh pass plus re-arm.
pub fn timed_topic_refresh(world: &mut World) {
    topic_refresh_sweep(world);
    let freq = world.conf.chanserv.refresh_period;
    if freq > 0 {
        let when = world.now + freq;
        world.timers.add(when, TimerEvent::TopicRefreshSweep);
    }
}

/// `expire`: run the channel expiry sweep on demand.
pub fn cmd_expire(world: &mut World, inv: &Invocation) -> bool {
    let count = channel_expire_sweep(world);
    world.reply(&inv.user, "CSMSG_CHANNELS_EXPIRED", &[&count]);
    true
}
