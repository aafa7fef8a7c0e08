//! Channel services data model: registrations, access records, bans,
//! suspensions, do-not-register rules and notes.

use crate::ircstr::{irc_eq, IrcDict};
use crate::state::ModeLock;

// Channel registration flag bits.
pub const CHANNEL_NODELETE: u32 = 0x00000001;
pub const CHANNEL_SUSPENDED: u32 = 0x00000002;
pub const CHANNEL_DYNAMIC_LIMIT: u32 = 0x00000020;
pub const CHANNEL_OFFCHANNEL: u32 = 0x00000100;
pub const CHANNEL_UNREVIEWED: u32 = 0x00000200;

// Access record flag bits. AUTO_OP is inverted: set means the user has
// opted out of automatic ops.
pub const USER_AUTO_OP: u32 = 0x00000001;
pub const USER_SUSPENDED: u32 = 0x00000002;
pub const USER_AUTO_INVITE: u32 = 0x00000004;

// Access level bands.
pub const UL_PEON: u16 = 100;
pub const UL_OP: u16 = 200;
pub const UL_MASTER: u16 = 300;
pub const UL_PRESENT: u16 = UL_MASTER;
pub const UL_COOWNER: u16 = 400;
pub const UL_OWNER: u16 = 500;
pub const UL_HELPER: u16 = 600;

pub static ACCESS_LEVELS: &[(&str, u16)] = &[
    ("owner", UL_OWNER),
    ("coowner", UL_COOWNER),
    ("master", UL_MASTER),
    ("op", UL_OP),
    ("peon", UL_PEON),
];

/// Parse a numeric or named access level, clamped; `None` covers zero,
/// unknown names and levels above the clamp.
pub fn level_from_name(name: &str, clamp: u16) -> Option<u16> {
    let level = if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.parse().ok()?
    } else {
        ACCESS_LEVELS
            .iter()
            .find(|(n, _)| irc_eq(n, name))
            .map(|(_, l)| *l)?
    };
    if level == 0 || level > clamp {
        None
    } else {
        Some(level)
    }
}

/// Display name of the band a level falls in.
pub fn level_name(level: u16) -> &'static str {
    match level {
        UL_OWNER.. => "owner",
        UL_COOWNER.. => "coowner",
        UL_MASTER.. => "master",
        UL_OP.. => "op",
        _ => "peon",
    }
}

// Level option indices into `ChannelReg::lvl_opts`.
pub const LVL_GIVE_VOICE: usize = 0;
pub const LVL_GIVE_OPS: usize = 1;
pub const LVL_ENF_OPS: usize = 2;
pub const LVL_ENF_MODES: usize = 3;
pub const LVL_ENF_TOPIC: usize = 4;
pub const LVL_PUBCMD: usize = 5;
pub const LVL_SETTERS: usize = 6;
pub const LVL_CTCP_USERS: usize = 7;
pub const LVL_USERINFO: usize = 8;
pub const LVL_INVITE_ME: usize = 9;
pub const LVL_TOPIC_SNARF: usize = 10;
pub const NUM_LEVEL_OPTIONS: usize = 11;

/// (database key, default) for each numeric level option.
pub static LEVEL_OPTIONS: [(&str, u16); NUM_LEVEL_OPTIONS] = [
    ("givevoice", 100),
    ("giveops", 200),
    ("enfops", 300),
    ("enfmodes", 200),
    ("enftopic", 200),
    ("pubcmd", 0),
    ("setters", 400),
    ("ctcpusers", 0),
    ("userinfo", 1),
    ("inviteme", 1),
    ("topicsnarf", 501),
];

// Character option indices into `ChannelReg::ch_opts`.
pub const CH_PROTECT: usize = 0;
pub const CH_TOYS: usize = 1;
pub const CH_TOPICREFRESH: usize = 2;
pub const CH_CTCPREACTION: usize = 3;
pub const NUM_CHAR_OPTIONS: usize = 4;

/// (database key, default, legal values) for each character option.
pub static CHAR_OPTIONS: [(&str, char, &str); NUM_CHAR_OPTIONS] = [
    ("protect", 'l', "aeln"),
    ("toys", 'p', "dnp"),
    ("topicrefresh", 'n', "n1234"),
    ("ctcpreaction", 't', "kbtT"),
];

/// Topic refresh period in seconds for a `topicrefresh` option value,
/// or `None` for never.
pub fn topic_refresh_period(opt: char) -> Option<u64> {
    match opt {
        '1' => Some(3 * 3600),
        '2' => Some(6 * 3600),
        '3' => Some(12 * 3600),
        '4' => Some(24 * 3600),
        _ => None,
    }
}

/// One account's access record in one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserReg {
    pub access: u16,
    pub seen: u64,
    pub info: Option<String>,
    pub flags: u32,
    /// Transient: some connected user authed to this handle is in the
    /// channel right now.
    pub present: bool,
}

impl UserReg {
    pub fn new(access: u16, seen: u64) -> Self {
        Self {
            access,
            seen,
            ..Default::default()
        }
    }

    pub fn auto_op(&self) -> bool {
        self.flags & USER_AUTO_OP == 0
    }

    pub fn suspended(&self) -> bool {
        self.flags & USER_SUSPENDED != 0
    }
}

/// A persistent channel ban.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanReg {
    pub mask: String,
    pub owner: String,
    pub reason: String,
    pub set: u64,
    pub triggered: u64,
    /// Zero for permanent bans; otherwise a timer entry exists for this
    /// deadline.
    pub expires: u64,
}

/// One suspension; the channel keeps the most recent at the head of the
/// `previous` chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suspension {
    pub suspender: String,
    pub reason: String,
    pub issued: u64,
    pub expires: u64,
    pub revoked: u64,
    pub previous: Option<Box<Suspension>>,
}

impl Suspension {
    /// Active means not revoked and not past its expiry.
    pub fn active(&self, now: u64) -> bool {
        self.revoked == 0 && (self.expires == 0 || self.expires > now)
    }
}

/// Who may set a note of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAccess {
    ChannelAccess(u16),
    ChannelSetter,
    OpservLevel(u32),
}

/// Who may read notes of a given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteVisibility {
    All,
    ChannelUsers,
    Privileged,
}

/// A registered note type; individual notes reference it by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteType {
    pub set_access: NoteAccess,
    pub visibility: NoteVisibility,
    pub max_length: usize,
    /// Notes of this type across all channels.
    pub refs: usize,
}

/// A note on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub setter: String,
    pub text: String,
}

/// A do-not-register rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dnr {
    pub setter: String,
    pub set: u64,
    pub expires: u64,
    pub reason: String,
}

impl Dnr {
    pub fn expired(&self, now: u64) -> bool {
        self.expires != 0 && self.expires <= now
    }
}

/// The persistent model of one registered channel.
#[derive(Debug, Clone)]
pub struct ChannelReg {
    pub name: String,
    pub registered: u64,
    pub visited: u64,
    pub owner_transfer: u64,
    pub topic: Option<String>,
    pub topic_mask: Option<String>,
    pub greeting: Option<String>,
    pub user_greeting: Option<String>,
    pub registrar: Option<String>,
    pub modes: ModeLock,
    pub flags: u32,
    /// Peak member count, feeds the dynamic limit.
    pub max: u32,
    pub last_refresh: u64,
    pub limit_adjusted: u64,
    pub lvl_opts: [u16; NUM_LEVEL_OPTIONS],
    pub ch_opts: [char; NUM_CHAR_OPTIONS],
    pub users: IrcDict<UserReg>,
    pub bans: Vec<BanReg>,
    pub notes: IrcDict<Note>,
    pub suspended: Option<Box<Suspension>>,
}

impl ChannelReg {
    pub fn new(name: &str, now: u64) -> Self {
        let mut lvl_opts = [0u16; NUM_LEVEL_OPTIONS];
        for (ii, (_, default)) in LEVEL_OPTIONS.iter().enumerate() {
            lvl_opts[ii] = *default;
        }
        let mut ch_opts = ['\0'; NUM_CHAR_OPTIONS];
        for (ii, (_, default, _)) in CHAR_OPTIONS.iter().enumerate() {
            ch_opts[ii] = *default;
        }
        Self {
            name: name.to_string(),
            registered: now,
            visited: now,
            owner_transfer: now,
            topic: None,
            topic_mask: None,
            greeting: None,
            user_greeting: None,
            registrar: None,
            modes: ModeLock::default(),
            flags: 0,
            max: 0,
            last_refresh: now,
            limit_adjusted: 0,
            lvl_opts,
            ch_opts,
            users: IrcDict::new(),
            bans: Vec::new(),
            notes: IrcDict::new(),
            suspended: None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.flags & CHANNEL_SUSPENDED != 0
    }

    pub fn is_protected(&self) -> bool {
        self.flags & CHANNEL_NODELETE != 0
    }

    /// Count of owner-level records.
    pub fn owner_count(&self) -> usize {
        self.users.values().filter(|u| u.access >= UL_OWNER).count()
    }
}

/// Process-wide channel services state, owned by the `World`.
#[derive(Debug, Default)]
pub struct ChanServ {
    pub channels: IrcDict<ChannelReg>,
    pub note_types: IrcDict<NoteType>,
    /// Exact channel-name rules.
    pub plain_dnrs: IrcDict<Dnr>,
    /// Wildcard channel-name rules.
    pub mask_dnrs: IrcDict<Dnr>,
    /// Handle rules, stored without the leading `*`.
    pub handle_dnrs: IrcDict<Dnr>,
    pub user_count: usize,
    pub ban_count: usize,
}

impl ChanServ {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_round_trip() {
        assert_eq!(level_from_name("owner", 500), Some(500));
        assert_eq!(level_from_name("300", 500), Some(300));
        assert_eq!(level_from_name("PEON", 500), Some(100));
        // Clamped and invalid forms.
        assert_eq!(level_from_name("600", 500), None);
        assert_eq!(level_from_name("0", 500), None);
        assert_eq!(level_from_name("wizard", 500), None);
        assert_eq!(level_name(450), "coowner");
        assert_eq!(level_name(99), "peon");
    }

    #[test]
    fn new_registration_gets_option_defaults() {
        let reg = ChannelReg::new("#fresh", 1000);
        assert_eq!(reg.lvl_opts[LVL_GIVE_OPS], 200);
        assert_eq!(reg.lvl_opts[LVL_TOPIC_SNARF], 501);
        assert_eq!(reg.ch_opts[CH_PROTECT], 'l');
        assert_eq!(reg.ch_opts[CH_CTCPREACTION], 't');
        assert_eq!(reg.registered, 1000);
        assert!(reg.registered <= reg.visited);
        assert!(reg.registered <= reg.owner_transfer);
    }

    #[test]
    fn auto_op_flag_is_inverted() {
        let mut u = UserReg::new(200, 0);
        assert!(u.auto_op());
        u.flags |= USER_AUTO_OP;
        assert!(!u.auto_op());
    }

    #[test]
    fn suspension_activity() {
        let s = Suspension {
            expires: 100,
            ..Default::default()
        };
        assert!(s.active(99));
        assert!(!s.active(100));
        let s = Suspension {
            revoked: 50,
            ..Default::default()
        };
        assert!(!s.active(0));
        let s = Suspension::default();
        assert!(s.active(u64::MAX));
    }

    #[test]
    fn topic_refresh_periods() {
        assert_eq!(topic_refresh_period('n'), None);
        assert_eq!(topic_refresh_period('1'), Some(10800));
        assert_eq!(topic_refresh_period('4'), Some(86400));
    }
}
