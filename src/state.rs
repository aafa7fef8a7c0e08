//! Live network state and the `World` aggregate.
//!
//! Everything mutable in the core hangs off one `World` value owned by
//! the event loop: online users, live channels, the account view, the
//! services state, the command registry, the timer queue and the
//! outbound action queue. Handlers receive `&mut World`; nothing in the
//! core is shared or locked.

use crate::accounts::Accounts;
use crate::actions::Action;
use crate::chanserv::ChanServ;
use crate::conf::Config;
use crate::ircstr::{irc_eq, IrcDict};
use crate::modcmd::Registry;
use crate::msg::{self, BotNames};
use crate::policer::Policer;
use crate::saxdb::SaxRegistry;
use crate::timerq::TimerQueue;
use std::fmt::Display;

// Simple channel mode bits.
pub const MODE_INVITEONLY: u32 = 0x001; // +i
pub const MODE_MODERATED: u32 = 0x002; // +m
pub const MODE_NOPRIVMSGS: u32 = 0x004; // +n
pub const MODE_PRIVATE: u32 = 0x008; // +p
pub const MODE_SECRET: u32 = 0x010; // +s
pub const MODE_TOPICLIMIT: u32 = 0x020; // +t
pub const MODE_REGISTERED: u32 = 0x040; // +z
pub const MODE_KEY: u32 = 0x080; // +k
pub const MODE_LIMIT: u32 = 0x100; // +l

pub fn simple_mode_bit(c: char) -> Option<u32> {
    Some(match c {
        'i' => MODE_INVITEONLY,
        'm' => MODE_MODERATED,
        'n' => MODE_NOPRIVMSGS,
        'p' => MODE_PRIVATE,
        's' => MODE_SECRET,
        't' => MODE_TOPICLIMIT,
        'z' => MODE_REGISTERED,
        _ => return None,
    })
}

pub fn simple_mode_chars(mask: u32) -> String {
    let mut out = String::new();
    for (bit, c) in [
        (MODE_INVITEONLY, 'i'),
        (MODE_MODERATED, 'm'),
        (MODE_NOPRIVMSGS, 'n'),
        (MODE_PRIVATE, 'p'),
        (MODE_SECRET, 's'),
        (MODE_TOPICLIMIT, 't'),
        (MODE_REGISTERED, 'z'),
    ] {
        if mask & bit != 0 {
            out.push(c);
        }
    }
    out
}

/// Current modes on a live channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modes {
    pub mask: u32,
    pub key: Option<String>,
    pub limit: Option<u32>,
}

impl Modes {
    pub fn to_mode_string(&self) -> String {
        let mut out = String::from("+");
        out.push_str(&simple_mode_chars(self.mask));
        let mut args = Vec::new();
        if let Some(ref k) = self.key {
            out.push('k');
            args.push(k.clone());
        }
        if let Some(l) = self.limit {
            out.push('l');
            args.push(l.to_string());
        }
        for a in args {
            out.push(' ');
            out.push_str(&a);
        }
        out
    }
}

/// A stored mode lock: bits that must be on, bits that must stay off,
/// plus pinned key/limit values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeLock {
    pub on: u32,
    pub off: u32,
    pub key: Option<String>,
    pub limit: Option<u32>,
}

impl ModeLock {
    pub fn is_empty(&self) -> bool {
        self.on == 0 && self.off == 0 && self.key.is_none() && self.limit.is_none()
    }

    /// Parse `+ntk secret -s` style argument words. Words opening with
    /// `+`/`-` carry mode letters; the remaining words are their value
    /// arguments in order.
    pub fn parse(words: &[&str]) -> Option<ModeLock> {
        let mut lock = ModeLock::default();
        let is_letters = |w: &&&str| w.starts_with('+') || w.starts_with('-');
        let mut args = words.iter().filter(|w| !is_letters(w));
        let mut adding = true;
        for word in words.iter().filter(is_letters) {
            for c in word.chars() {
                match c {
                    '+' => adding = true,
                    '-' => adding = false,
                    'k' => {
                        if adding {
                            lock.key = Some((*args.next()?).to_string());
                            lock.on |= MODE_KEY;
                        } else {
                            lock.off |= MODE_KEY;
                        }
                    }
                    'l' => {
                        if adding {
                            lock.limit = Some(args.next()?.parse().ok()?);
                            lock.on |= MODE_LIMIT;
                        } else {
                            lock.off |= MODE_LIMIT;
                        }
                    }
                    c => {
                        let bit = simple_mode_bit(c)?;
                        if adding {
                            lock.on |= bit;
                            lock.off &= !bit;
                        } else {
                            lock.off |= bit;
                            lock.on &= !bit;
                        }
                    }
                }
            }
        }
        Some(lock)
    }

    /// Render in the `+nt-s` form the database stores.
    pub fn to_mode_string(&self) -> String {
        let mut out = String::new();
        let mut args = Vec::new();
        if self.on != 0 || self.key.is_some() || self.limit.is_some() {
            out.push('+');
            out.push_str(&simple_mode_chars(self.on & !(MODE_KEY | MODE_LIMIT)));
            if let Some(ref k) = self.key {
                out.push('k');
                args.push(k.clone());
            }
            if let Some(l) = self.limit {
                out.push('l');
                args.push(l.to_string());
            }
        }
        if self.off != 0 {
            out.push('-');
            out.push_str(&simple_mode_chars(self.off));
            if self.off & MODE_KEY != 0 {
                out.push('k');
            }
            if self.off & MODE_LIMIT != 0 {
                out.push('l');
            }
        }
        for a in args {
            out.push(' ');
            out.push_str(&a);
        }
        out
    }
}

/// One parsed operation inside an observed mode change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeOp {
    Simple { bit: u32, add: bool },
    Key { add: bool, value: String },
    Limit { add: bool, value: u32 },
    GiveOps(String),
    TakeOps(String),
    GiveVoice(String),
    TakeVoice(String),
    Ban(String),
    Unban(String),
}

/// An observed channel mode change, already split into operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeChange {
    pub ops: Vec<ModeOp>,
}

impl ModeChange {
    /// Parse `["+ok-b", "nick", "key", "mask"]` style words.
    pub fn parse(words: &[&str]) -> Option<ModeChange> {
        let mut change = ModeChange::default();
        let first = words.first()?;
        let mut args = words.iter().skip(1);
        let mut add = true;
        for c in first.chars() {
            match c {
                '+' => add = true,
                '-' => add = false,
                'o' => {
                    let nick = (*args.next()?).to_string();
                    change.ops.push(if add {
                        ModeOp::GiveOps(nick)
                    } else {
                        ModeOp::TakeOps(nick)
                    });
                }
                'v' => {
                    let nick = (*args.next()?).to_string();
                    change.ops.push(if add {
                        ModeOp::GiveVoice(nick)
                    } else {
                        ModeOp::TakeVoice(nick)
                    });
                }
                'b' => {
                    let mask = (*args.next()?).to_string();
                    change.ops.push(if add {
                        ModeOp::Ban(mask)
                    } else {
                        ModeOp::Unban(mask)
                    });
                }
                'k' => {
                    let value = args.next().map(|s| (*s).to_string()).unwrap_or_default();
                    change.ops.push(ModeOp::Key { add, value });
                }
                'l' => {
                    if add {
                        let value = args.next()?.parse().ok()?;
                        change.ops.push(ModeOp::Limit { add: true, value });
                    } else {
                        change.ops.push(ModeOp::Limit {
                            add: false,
                            value: 0,
                        });
                    }
                }
                c => {
                    let bit = simple_mode_bit(c)?;
                    change.ops.push(ModeOp::Simple { bit, add });
                }
            }
        }
        Some(change)
    }

    /// Render back into a single mode string with trailing arguments.
    pub fn to_mode_string(&self) -> String {
        let mut letters = String::new();
        let mut args: Vec<String> = Vec::new();
        let mut cur_add: Option<bool> = None;
        let mut push = |letters: &mut String, add: bool, c: char| {
            if cur_add != Some(add) {
                letters.push(if add { '+' } else { '-' });
                cur_add = Some(add);
            }
            letters.push(c);
        };
        for op in &self.ops {
            match op {
                ModeOp::Simple { bit, add } => {
                    push(&mut letters, *add, simple_mode_chars(*bit).chars().next().unwrap_or('?'))
                }
                ModeOp::Key { add, value } => {
                    push(&mut letters, *add, 'k');
                    if *add || !value.is_empty() {
                        args.push(value.clone());
                    }
                }
                ModeOp::Limit { add, value } => {
                    push(&mut letters, *add, 'l');
                    if *add {
                        args.push(value.to_string());
                    }
                }
                ModeOp::GiveOps(n) => {
                    push(&mut letters, true, 'o');
                    args.push(n.clone());
                }
                ModeOp::TakeOps(n) => {
                    push(&mut letters, false, 'o');
                    args.push(n.clone());
                }
                ModeOp::GiveVoice(n) => {
                    push(&mut letters, true, 'v');
                    args.push(n.clone());
                }
                ModeOp::TakeVoice(n) => {
                    push(&mut letters, false, 'v');
                    args.push(n.clone());
                }
                ModeOp::Ban(m) => {
                    push(&mut letters, true, 'b');
                    args.push(m.clone());
                }
                ModeOp::Unban(m) => {
                    push(&mut letters, false, 'b');
                    args.push(m.clone());
                }
            }
        }
        let mut out = letters;
        for a in args {
            out.push(' ');
            out.push_str(&a);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Per-member channel status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberModes {
    pub op: bool,
    pub voice: bool,
}

/// A live channel as mirrored from the network.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub name: String,
    pub members: IrcDict<MemberModes>,
    pub modes: Modes,
    /// IRC-level ban list (masks currently set as +b).
    pub bans: Vec<String>,
    pub topic: String,
    /// Set while a join flood is being ridden out; op/voice and ban
    /// processing are suppressed.
    pub join_flood: bool,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_op(&self, nick: &str) -> bool {
        self.members.get(nick).is_some_and(|m| m.op)
    }
}

/// A connected user as mirrored from the network.
#[derive(Debug, Clone)]
pub struct OnlineUser {
    pub nick: String,
    pub ident: String,
    pub host: String,
    /// Handle name when authenticated.
    pub account: Option<String>,
    /// Umode +o.
    pub oper: bool,
    /// One of our own service bots.
    pub is_service: bool,
    pub policer: Policer,
}

impl OnlineUser {
    pub fn hostmask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.host)
    }
}

/// Everything that can expire, keyed into the timer heap.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerEvent {
    DbFlush(String),
    BanExpire { channel: String, mask: String },
    SuspensionExpire { channel: String },
    ChannelExpireSweep,
    DnrSweep,
    TopicRefreshSweep,
    AdjustLimit { channel: String },
}

/// The single owner of all core state.
pub struct World {
    pub now: u64,
    pub conf: Config,
    pub accounts: Accounts,
    pub users: IrcDict<OnlineUser>,
    pub channels: IrcDict<Channel>,
    pub chanserv: ChanServ,
    pub modcmd: Registry,
    pub timers: TimerQueue<TimerEvent>,
    pub saxdb: SaxRegistry,
    pub actions: Vec<Action>,
    /// True while riding a netburst.
    pub burst: bool,
    /// SIGINT-triggered flush, deferred to the next loop iteration.
    pub flush_requested: bool,
    /// SIGHUP-triggered reload, deferred likewise.
    pub reload_requested: bool,
}

impl World {
    pub fn new(conf: Config) -> Self {
        Self {
            now: 0,
            chanserv: ChanServ::new(),
            conf,
            accounts: Accounts::new(),
            users: IrcDict::new(),
            channels: IrcDict::new(),
            modcmd: Registry::new(),
            timers: TimerQueue::new(),
            saxdb: SaxRegistry::new(),
            actions: Vec::new(),
            burst: false,
            flush_requested: false,
            reload_requested: false,
        }
    }

    /// Full startup: mondo database, modules, services and bindings,
    /// in two passes. Binding templates only resolve after every
    /// module has registered, so load order cannot break references.
    pub fn boot(conf: Config, now: u64) -> Self {
        // The casemap must be fixed before any keys fold.
        let latin1 = conf
            .get_path_str("server/casemapping")
            .is_some_and(|v| irc_eq(v, "latin1") || irc_eq(v, "latin-1"));
        crate::ircstr::set_latin1_casemap(latin1);

        let mut world = World::new(conf);
        world.now = now;
        crate::saxdb::init_mondo(&mut world);
        crate::modcmd::builtin::init(&mut world);
        crate::chanserv::init(&mut world);

        // The oper service carries the dispatch framework's surface.
        let oper = world
            .conf
            .bots
            .iter()
            .find(|b| irc_eq(&b.service, "opserv"))
            .cloned()
            .unwrap_or(crate::conf::BotConf {
                service: "opserv".to_string(),
                nick: "OpServ".to_string(),
                trigger: None,
                privileged: true,
            });
        world
            .modcmd
            .register_service("opserv", &oper.nick, oper.trigger, oper.privileged);
        world.users.insert(
            &oper.nick,
            OnlineUser {
                nick: oper.nick.clone(),
                ident: "opserv".to_string(),
                host: "services".to_string(),
                account: None,
                oper: true,
                is_service: true,
                policer: Policer::new(),
            },
        );
        crate::modcmd::builtin::bind_oper_service(&mut world, "opserv");
        crate::modcmd::builtin::bind_user_service(&mut world, crate::chanserv::SERVICE);

        // Any remaining configured bots become plain services.
        let extra: Vec<crate::conf::BotConf> = world
            .conf
            .bots
            .iter()
            .filter(|b| !irc_eq(&b.service, "opserv") && !irc_eq(&b.service, "chanserv"))
            .cloned()
            .collect();
        for bot in extra {
            world
                .modcmd
                .register_service(&bot.service, &bot.nick, bot.trigger, bot.privileged);
            world.users.insert(
                &bot.nick,
                OnlineUser {
                    nick: bot.nick.clone(),
                    ident: "services".to_string(),
                    host: "services".to_string(),
                    account: None,
                    oper: true,
                    is_service: true,
                    policer: Policer::new(),
                },
            );
            crate::modcmd::builtin::bind_user_service(&mut world, &bot.service);
        }

        world.modcmd.resolve_templates();

        // Helpfiles are best-effort at boot; readhelp re-reads them.
        let modules: Vec<String> = world.modcmd.modules.keys().map(str::to_string).collect();
        for module in modules {
            if let Err(e) = world.modcmd.read_help(&module) {
                tracing::debug!(module = %module, error = %e, "Helpfile not loaded");
            }
        }
        world
    }

    pub fn bot_names(&self) -> BotNames {
        let find = |svc: &str, dflt: &str| {
            self.conf
                .bots
                .iter()
                .find(|b| irc_eq(&b.service, svc))
                .map(|b| b.nick.clone())
                .unwrap_or_else(|| dflt.to_string())
        };
        BotNames {
            chanserv: self.conf.chanserv.nick.clone(),
            opserv: find("opserv", "OpServ"),
            nickserv: find("nickserv", "NickServ"),
        }
    }

    /// Queue a catalogued reply to a user.
    pub fn reply(&mut self, target: &str, key: &'static str, args: &[&dyn Display]) {
        let text = msg::render(key, args, &self.bot_names());
        self.actions.push(Action::Reply {
            target: target.to_string(),
            key,
            text,
        });
    }

    pub fn account_of(&self, nick: &str) -> Option<&crate::accounts::Handle> {
        let name = self.users.get(nick)?.account.as_deref()?;
        self.accounts.get(name)
    }

    pub fn take_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    // ========== state transitions driven by the wire (and tests) ==========

    /// A user appeared on the network.
    pub fn user_connected(&mut self, nick: &str, ident: &str, host: &str) {
        let user = OnlineUser {
            nick: nick.to_string(),
            ident: ident.to_string(),
            host: host.to_string(),
            account: None,
            oper: false,
            is_service: false,
            policer: Policer::new(),
        };
        self.users.insert(nick, user);
    }

    pub fn user_quit(&mut self, nick: &str) {
        let account = self.users.get(nick).and_then(|u| u.account.clone());
        let channels: Vec<String> = self
            .channels
            .iter()
            .filter(|(_, c)| c.members.contains(nick))
            .map(|(name, _)| name.to_string())
            .collect();
        for chan in channels {
            if let Some(c) = self.channels.get_mut(&chan) {
                c.members.remove(nick);
            }
            if let Some(ref acct) = account {
                crate::chanserv::hooks::on_account_left(self, &chan, acct);
            }
        }
        self.users.remove(nick);
        self.gc_empty_channels();
    }

    /// A user authenticated to an account handle.
    pub fn user_authed(&mut self, nick: &str, handle: &str) {
        self.accounts.ensure(handle);
        if let Some(u) = self.users.get_mut(nick) {
            u.account = Some(handle.to_string());
        }
        crate::chanserv::hooks::on_auth(self, nick, handle);
    }

    pub fn user_renamed(&mut self, old: &str, new: &str) {
        let Some(mut user) = self.users.remove(old) else {
            return;
        };
        user.nick = new.to_string();
        self.users.insert(new, user);
        let chans: Vec<String> = self
            .channels
            .iter()
            .filter(|(_, c)| c.members.contains(old))
            .map(|(n, _)| n.to_string())
            .collect();
        for chan in chans {
            if let Some(c) = self.channels.get_mut(&chan) {
                if let Some(m) = c.members.remove(old) {
                    c.members.insert(new, m);
                }
            }
        }
        crate::chanserv::hooks::on_nick_change(self, new);
    }

    /// A user joined a channel; runs the enforcement hook.
    pub fn user_joined(&mut self, nick: &str, channel: &str) {
        if !self.channels.contains(channel) {
            self.channels.insert(channel, Channel::new(channel));
        }
        if let Some(c) = self.channels.get_mut(channel) {
            c.members.insert(nick, MemberModes::default());
        }
        crate::chanserv::hooks::on_join(self, nick, channel);
    }

    pub fn user_parted(&mut self, nick: &str, channel: &str) {
        let account = self.users.get(nick).and_then(|u| u.account.clone());
        if let Some(c) = self.channels.get_mut(channel) {
            c.members.remove(nick);
        }
        if let Some(acct) = account {
            crate::chanserv::hooks::on_account_left(self, channel, &acct);
        }
        self.gc_empty_channels();
    }

    pub fn user_kicked(&mut self, nick: &str, channel: &str) {
        self.user_parted(nick, channel);
    }

    /// An observed mode change: apply to state, then police it.
    pub fn mode_changed(&mut self, actor: &str, channel: &str, words: &[&str]) {
        let Some(change) = ModeChange::parse(words) else {
            tracing::warn!(channel, ?words, "Unparseable mode change");
            return;
        };
        self.apply_mode_change(channel, &change);
        crate::chanserv::hooks::on_mode_change(self, actor, channel, &change);
    }

    /// Mutate live channel state for a change (no policy).
    pub fn apply_mode_change(&mut self, channel: &str, change: &ModeChange) {
        let Some(c) = self.channels.get_mut(channel) else {
            return;
        };
        for op in &change.ops {
            match op {
                ModeOp::Simple { bit, add } => {
                    if *add {
                        c.modes.mask |= bit;
                    } else {
                        c.modes.mask &= !bit;
                    }
                }
                ModeOp::Key { add, value } => {
                    c.modes.key = add.then(|| value.clone());
                    if *add {
                        c.modes.mask |= MODE_KEY;
                    } else {
                        c.modes.mask &= !MODE_KEY;
                    }
                }
                ModeOp::Limit { add, value } => {
                    c.modes.limit = add.then_some(*value);
                    if *add {
                        c.modes.mask |= MODE_LIMIT;
                    } else {
                        c.modes.mask &= !MODE_LIMIT;
                    }
                }
                ModeOp::GiveOps(n) => {
                    if let Some(m) = c.members.get_mut(n) {
                        m.op = true;
                    }
                }
                ModeOp::TakeOps(n) => {
                    if let Some(m) = c.members.get_mut(n) {
                        m.op = false;
                    }
                }
                ModeOp::GiveVoice(n) => {
                    if let Some(m) = c.members.get_mut(n) {
                        m.voice = true;
                    }
                }
                ModeOp::TakeVoice(n) => {
                    if let Some(m) = c.members.get_mut(n) {
                        m.voice = false;
                    }
                }
                ModeOp::Ban(mask) => {
                    if !c.bans.iter().any(|b| irc_eq(b, mask)) {
                        c.bans.push(mask.clone());
                    }
                }
                ModeOp::Unban(mask) => {
                    c.bans.retain(|b| !irc_eq(b, mask));
                }
            }
        }
    }

    /// Queue a corrective mode change from the channel service bot and
    /// apply it to our own state immediately.
    pub fn push_mode(&mut self, channel: &str, change: &ModeChange) {
        if change.is_empty() {
            return;
        }
        self.apply_mode_change(channel, change);
        self.actions.push(Action::Mode {
            channel: channel.to_string(),
            change: change.to_mode_string(),
        });
    }

    pub fn topic_changed(&mut self, actor: &str, channel: &str, topic: &str) {
        if let Some(c) = self.channels.get_mut(channel) {
            c.topic = topic.to_string();
        }
        crate::chanserv::hooks::on_topic(self, actor, channel, topic);
    }

    /// A PRIVMSG arrived; route service-directed text into dispatch.
    pub fn privmsg(&mut self, src: &str, target: &str, text: &str, qualified: bool) {
        if crate::ircstr::is_channel_name(target) {
            // CTCP to a channel is policed; trigger-prefixed text is a
            // command with channel context.
            if text.starts_with('\x01') {
                crate::chanserv::hooks::on_channel_ctcp(self, src, target, text);
                return;
            }
            let triggered: Option<String> = self
                .modcmd
                .service_names()
                .into_iter()
                .find(|svc| {
                    self.modcmd
                        .service(svc)
                        .and_then(|s| s.trigger)
                        .is_some_and(|t| text.starts_with(t))
                })
                .map(|s| s.to_string());
            if let Some(svc) = triggered {
                let line = text[1..].to_string();
                crate::modcmd::dispatch::invoke_service_text(
                    self,
                    src,
                    &svc,
                    Some(target.to_string()),
                    &line,
                    false,
                );
            }
            return;
        }
        let Some(svc) = self.modcmd.service_by_nick(target).map(str::to_string) else {
            return;
        };
        crate::modcmd::dispatch::invoke_service_text(self, src, &svc, None, text, qualified);
    }

    fn gc_empty_channels(&mut self) {
        // Registered channels persist while empty; unregistered live
        // channels evaporate with their last member.
        let registered = &self.chanserv;
        self.channels
            .retain(|name, c| !c.members.is_empty() || registered.channels.contains(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_lock_parses_and_prints() {
        let lock = ModeLock::parse(&["+ntk", "secret", "-s"]).unwrap();
        assert_eq!(lock.on & MODE_NOPRIVMSGS, MODE_NOPRIVMSGS);
        assert_eq!(lock.key.as_deref(), Some("secret"));
        assert_eq!(lock.off & MODE_SECRET, MODE_SECRET);
        let printed = lock.to_mode_string();
        assert!(printed.starts_with("+ntk-s"));
        assert!(printed.ends_with(" secret"));
    }

    #[test]
    fn mode_lock_rejects_missing_key_arg() {
        assert!(ModeLock::parse(&["+k"]).is_none());
        assert!(ModeLock::parse(&["+q"]).is_none());
    }

    #[test]
    fn mode_change_round_trip() {
        let change = ModeChange::parse(&["+o-b", "Nick", "*!*@x"]).unwrap();
        assert_eq!(change.ops.len(), 2);
        assert_eq!(change.to_mode_string(), "+o-b Nick *!*@x");
    }

    #[test]
    fn apply_mode_change_updates_members_and_bans() {
        let mut w = World::new(Config::default());
        w.user_connected("Bob", "bob", "b.example");
        w.user_joined("Bob", "#t");
        let change = ModeChange::parse(&["+ob", "Bob", "*!*@spam"]).unwrap();
        w.apply_mode_change("#t", &change);
        let c = w.channels.get("#t").unwrap();
        assert!(c.is_op("Bob"));
        assert_eq!(c.bans, vec!["*!*@spam".to_string()]);

        w.apply_mode_change("#t", &ModeChange::parse(&["-o-b", "Bob", "*!*@spam"]).unwrap());
        let c = w.channels.get("#t").unwrap();
        assert!(!c.is_op("Bob"));
        assert!(c.bans.is_empty());
    }

    #[test]
    fn nick_change_carries_membership() {
        let mut w = World::new(Config::default());
        w.user_connected("Old", "id", "host");
        w.user_joined("Old", "#c");
        w.mode_changed("Old", "#c", &["+o", "Old"]);
        w.user_renamed("Old", "New");
        let c = w.channels.get("#c").unwrap();
        assert!(c.is_op("New"));
        assert!(!c.members.contains("Old"));
    }
}
