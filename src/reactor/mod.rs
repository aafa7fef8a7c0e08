//! The event loop.
//!
//! Strictly single-threaded cooperative: one task owns the `World`,
//! processes ready ingress events, then drains due timers, then flushes
//! any deferred database writes, then pushes queued actions out. Signal
//! deliveries only set flags; their work happens on the next iteration.

pub mod ingress;
pub mod replay;
pub mod uplink;

pub use ingress::{Ingress, WireEvent};

use crate::actions::Action;
use crate::saxdb;
use crate::state::{TimerEvent, World};
use std::time::Duration;
use tracing::{error, info, warn};

/// Apply one decoded event to the world.
pub fn dispatch_event(world: &mut World, event: WireEvent) {
    match event {
        WireEvent::UserConnected { nick, ident, host } => {
            world.user_connected(&nick, &ident, &host);
        }
        WireEvent::UserQuit { nick } => world.user_quit(&nick),
        WireEvent::NickChange { old, new } => world.user_renamed(&old, &new),
        WireEvent::Auth { nick, handle } => world.user_authed(&nick, &handle),
        WireEvent::Join { nick, channel } => world.user_joined(&nick, &channel),
        WireEvent::Part { nick, channel } => world.user_parted(&nick, &channel),
        WireEvent::Kick { nick, channel } => world.user_kicked(&nick, &channel),
        WireEvent::Mode {
            actor,
            channel,
            words,
        } => {
            let words: Vec<&str> = words.iter().map(String::as_str).collect();
            world.mode_changed(&actor, &channel, &words);
        }
        WireEvent::Topic {
            actor,
            channel,
            topic,
        } => world.topic_changed(&actor, &channel, &topic),
        WireEvent::Privmsg {
            from,
            target,
            text,
            qualified,
        } => world.privmsg(&from, &target, &text, qualified),
        WireEvent::BurstStart => world.burst = true,
        WireEvent::BurstEnd => {
            world.burst = false;
            crate::chanserv::join_channels(world);
        }
        WireEvent::TimeAdvance { now } => world.now = now,
        WireEvent::EndOfLog => {}
    }
}

/// Run one expired timer entry.
pub fn run_timer_event(world: &mut World, event: TimerEvent) {
    match event {
        TimerEvent::DbFlush(name) => saxdb::timed_flush(world, &name),
        TimerEvent::BanExpire { channel, mask } => {
            crate::chanserv::bans::expire_ban(world, &channel, &mask);
        }
        TimerEvent::SuspensionExpire { channel } => {
            crate::chanserv::suspend::suspension_expired(world, &channel);
        }
        TimerEvent::ChannelExpireSweep => crate::chanserv::expire::timed_channel_expire(world),
        TimerEvent::DnrSweep => crate::chanserv::expire::timed_dnr_expire(world),
        TimerEvent::TopicRefreshSweep => crate::chanserv::expire::timed_topic_refresh(world),
        TimerEvent::AdjustLimit { channel } => {
            crate::chanserv::hooks::adjust_limit(world, &channel);
        }
    }
}

/// Drain every due timer; handlers may schedule more work for the same
/// instant and it runs within the same drain.
pub fn run_due_timers(world: &mut World) {
    while let Some((_, event)) = world.timers.pop_due(world.now) {
        run_timer_event(world, event);
    }
}

/// Encode one action as the outbound line the codec boundary carries.
pub fn encode_action(action: &Action) -> String {
    match action {
        Action::BotJoin { bot, channel, op } => {
            format!("JOIN {} {}{}", bot, channel, if *op { " +o" } else { "" })
        }
        Action::BotPart {
            bot,
            channel,
            reason,
        } => format!("PART {} {} :{}", bot, channel, reason),
        Action::Mode { channel, change } => format!("MODE {} {}", channel, change),
        Action::Kick {
            channel,
            nick,
            reason,
        } => format!("KICK {} {} :{}", channel, nick, reason),
        Action::Invite { channel, nick } => format!("INVITE {} {}", nick, channel),
        Action::Topic { channel, topic } => format!("TOPIC {} :{}", channel, topic),
        Action::Reply { target, text, .. } => format!("NOTICE {} :{}", target, text),
        Action::Global { recipients, text } => format!("GLOBAL {} :{}", recipients, text),
        Action::Squit { reason } => format!("SQUIT :{}", reason),
    }
}

async fn drain_actions(world: &mut World, ingress: &mut dyn Ingress) -> std::io::Result<()> {
    for action in world.take_actions() {
        ingress.send_line(encode_action(&action)).await?;
    }
    Ok(())
}

fn wall_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Exit callbacks run in reverse registration order at shutdown.
#[derive(Default)]
pub struct ExitHooks {
    hooks: Vec<Box<dyn FnOnce(&mut World)>>,
}

impl ExitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: impl FnOnce(&mut World) + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn run(mut self, world: &mut World) {
        while let Some(hook) = self.hooks.pop() {
            hook(world);
        }
    }
}

fn reload_config(world: &mut World, config_path: &str) {
    match crate::conf::Config::load(config_path) {
        Ok(conf) => {
            world.conf = conf;
            info!(path = config_path, "Configuration reloaded");
        }
        Err(e) => {
            error!(path = config_path, error = %e, "Configuration reload failed");
            return;
        }
    }
    // Helpfiles reload with the configuration.
    let modules: Vec<String> = world.modcmd.modules.keys().map(str::to_string).collect();
    for module in modules {
        if let Err(e) = world.modcmd.read_help(&module) {
            warn!(module = %module, error = %e, "Helpfile reload failed");
        }
    }
}

/// The loop. `live` selects wall-clock time and signal handling; replay
/// runs on the virtual clock and stops at end of log.
pub async fn run(
    world: &mut World,
    ingress: &mut dyn Ingress,
    live: bool,
    config_path: &str,
    exit_hooks: ExitHooks,
) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigquit = signal(SignalKind::quit())?;
    // SIGPIPE is ignored by installing a handler nothing reads; SIGCHLD
    // deliveries are drained the same way (the daemon spawns nothing).
    let mut _sigpipe = signal(SignalKind::pipe())?;
    let mut _sigchld = signal(SignalKind::child())?;

    'outer: loop {
        if live {
            world.now = wall_now();
        }
        run_due_timers(world);
        if world.flush_requested {
            world.flush_requested = false;
            saxdb::flush_all(world);
        }
        if world.reload_requested {
            world.reload_requested = false;
            reload_config(world, config_path);
        }
        drain_actions(world, ingress).await?;

        let next_timer = world.timers.next();
        let timeout = if next_timer > world.now {
            next_timer - world.now
        } else if next_timer > 0 {
            0
        } else {
            3600
        };

        tokio::select! {
            event = ingress.next_event() => {
                match event? {
                    None | Some(WireEvent::EndOfLog) => break 'outer,
                    Some(event) => dispatch_event(world, event),
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(timeout)), if live => {}
            _ = sighup.recv(), if live => {
                world.reload_requested = true;
            }
            _ = sigint.recv(), if live => {
                world.flush_requested = true;
            }
            _ = sigquit.recv(), if live => {
                info!("Shutdown requested");
                break 'outer;
            }
        }
    }

    // Orderly shutdown: part from the network, flush everything, run
    // exit callbacks newest-first.
    world.actions.push(Action::Squit {
        reason: "Services shutting down.".to_string(),
    });
    let _ = drain_actions(world, ingress).await;
    saxdb::flush_all(world);
    exit_hooks.run(world);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::Config;

    #[test]
    fn encode_actions() {
        assert_eq!(
            encode_action(&Action::Kick {
                channel: "#a".into(),
                nick: "bad".into(),
                reason: "(ops) spam".into(),
            }),
            "KICK #a bad :(ops) spam"
        );
        assert_eq!(
            encode_action(&Action::Mode {
                channel: "#a".into(),
                change: "+b *!*@x".into(),
            }),
            "MODE #a +b *!*@x"
        );
    }

    #[test]
    fn timer_drain_runs_rearming_handlers_once_per_deadline() {
        let mut world = World::new(Config::default());
        world.now = 100;
        world
            .timers
            .add(50, TimerEvent::DnrSweep);
        // DnrSweep re-arms itself at now + frequency, which is in the
        // future, so the drain terminates.
        run_due_timers(&mut world);
        assert!(world.timers.next() > world.now);
    }
}
