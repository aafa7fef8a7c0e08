//! Account handles.
//!
//! The account/nickname store lives outside this daemon; the core only
//! consumes its handle abstraction: a unique name, an operator access
//! level, a few flag bits, and the back-list of channels the handle has
//! access records in.

use crate::ircstr::{irc_eq, IrcDict};

/// Handle flag bits.
pub const HANDLE_HELPING: u32 = 0x01;
pub const HANDLE_SUSPENDED: u32 = 0x02;
pub const HANDLE_FROZEN: u32 = 0x04;
pub const HANDLE_BOT: u32 = 0x08;
pub const HANDLE_SUPPORT_HELPER: u32 = 0x10;
pub const HANDLE_NETWORK_HELPER: u32 = 0x20;

/// Parse a `+hsfbSN`-style flag spec into a mask. Unknown letters are
/// ignored by callers that pre-validate; here they simply contribute 0.
pub fn handle_flags_from_spec(spec: &str) -> u32 {
    spec.chars().fold(0, |acc, c| {
        acc | match c {
            'h' => HANDLE_HELPING,
            's' => HANDLE_SUSPENDED,
            'f' => HANDLE_FROZEN,
            'b' => HANDLE_BOT,
            'S' => HANDLE_SUPPORT_HELPER,
            'N' => HANDLE_NETWORK_HELPER,
            _ => 0,
        }
    })
}

/// An authenticated identity, independent of any current nickname.
#[derive(Debug, Clone, Default)]
pub struct Handle {
    pub handle: String,
    pub oper_level: u32,
    pub flags: u32,
    /// Channels this handle holds an access record in; kept consistent
    /// with each channel's user list by the access-record mutators.
    pub channels: Vec<String>,
}

impl Handle {
    pub fn new(name: &str) -> Self {
        Self {
            handle: name.to_string(),
            ..Default::default()
        }
    }

    pub fn flagged(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    pub fn is_helping(&self) -> bool {
        self.flagged(HANDLE_HELPING)
    }

    pub fn is_support_helper(&self) -> bool {
        self.flagged(HANDLE_SUPPORT_HELPER) || self.oper_level > 0
    }

    pub fn is_network_helper(&self) -> bool {
        self.flagged(HANDLE_NETWORK_HELPER) || self.oper_level > 0
    }

    /// Record a channel in the back-list, once.
    pub fn link_channel(&mut self, channel: &str) {
        if !self.channels.iter().any(|c| irc_eq(c, channel)) {
            self.channels.push(channel.to_string());
        }
    }

    pub fn unlink_channel(&mut self, channel: &str) {
        self.channels.retain(|c| !irc_eq(c, channel));
    }
}

/// The in-memory view of the account store.
#[derive(Debug, Default)]
pub struct Accounts {
    handles: IrcDict<Handle>,
}

impl Accounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Handle> {
        self.handles.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Handle> {
        self.handles.get_mut(name)
    }

    pub fn ensure(&mut self, name: &str) -> &mut Handle {
        if !self.handles.contains(name) {
            self.handles.insert(name, Handle::new(name));
        }
        self.handles.get_mut(name).expect("just inserted")
    }

    pub fn remove(&mut self, name: &str) -> Option<Handle> {
        self.handles.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Handle)> {
        self.handles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_backlist_is_case_folded_and_deduplicated() {
        let mut h = Handle::new("Alice");
        h.link_channel("#Foo");
        h.link_channel("#foo");
        assert_eq!(h.channels.len(), 1);
        h.unlink_channel("#FOO");
        assert!(h.channels.is_empty());
    }

    #[test]
    fn helper_roles_include_opers() {
        let mut h = Handle::new("staff");
        assert!(!h.is_support_helper());
        h.oper_level = 100;
        assert!(h.is_support_helper());
        assert!(h.is_network_helper());
    }

    #[test]
    fn flag_spec_parses() {
        let mask = handle_flags_from_spec("hb");
        assert_eq!(mask, HANDLE_HELPING | HANDLE_BOT);
    }
}
