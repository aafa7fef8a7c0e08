//! Outbound protocol actions.
//!
//! Command handlers and hooks never touch the wire; they queue actions,
//! and the reactor drains the queue into the uplink encoder after every
//! event. Tests inspect the same queue.

/// Broadcast audiences for network-wide staff messages.
pub const MSG_RECIPIENT_OPERS: u32 = 0x1;
pub const MSG_RECIPIENT_HELPERS: u32 = 0x2;

/// One protocol-level effect requested by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Join a service bot to a channel, optionally with ops.
    BotJoin {
        bot: String,
        channel: String,
        op: bool,
    },
    BotPart {
        bot: String,
        channel: String,
        reason: String,
    },
    /// Apply a raw mode change as the service bot.
    Mode {
        channel: String,
        change: String,
    },
    Kick {
        channel: String,
        nick: String,
        reason: String,
    },
    Invite {
        channel: String,
        nick: String,
    },
    Topic {
        channel: String,
        topic: String,
    },
    /// A notice to one user, tagged with its catalog key so tests and
    /// logs can identify replies without string-matching.
    Reply {
        target: String,
        key: &'static str,
        text: String,
    },
    /// Network-wide staff broadcast.
    Global {
        recipients: u32,
        text: String,
    },
    /// Drop the uplink with a reason (orderly shutdown).
    Squit {
        reason: String,
    },
}

impl Action {
    /// The catalog key if this action is a reply.
    pub fn reply_key(&self) -> Option<&'static str> {
        match self {
            Action::Reply { key, .. } => Some(key),
            _ => None,
        }
    }
}
