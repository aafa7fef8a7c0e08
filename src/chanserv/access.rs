//! Access lookups shared by the dispatcher and the command handlers.

use super::model::{UL_HELPER, UL_OWNER};
use crate::accounts::HANDLE_HELPING;
use crate::state::World;

/// The caller's effective access in a registered channel.
///
/// `allow_override` lets security-override staff act with a transient
/// helper level (600) even without a record; `allow_suspended` includes
/// suspended records instead of treating them as absent.
pub fn channel_user_level(
    world: &World,
    channel: &str,
    nick: &str,
    allow_override: bool,
    allow_suspended: bool,
) -> Option<u16> {
    let handle = world.users.get(nick)?.account.as_deref()?;
    let helping = world
        .accounts
        .get(handle)
        .is_some_and(|h| h.flags & HANDLE_HELPING != 0);
    let record = world
        .chanserv
        .channels
        .get(channel)
        .and_then(|reg| reg.users.get(handle))
        .filter(|u| allow_suspended || !u.suspended())
        .map(|u| u.access);
    match record {
        Some(access) => Some(access),
        None if allow_override && helping => Some(UL_HELPER),
        None => None,
    }
}

/// The caller's true access: the record itself, no override, including
/// suspended records.
pub fn true_channel_access(world: &World, channel: &str, nick: &str) -> Option<u16> {
    channel_user_level(world, channel, nick, false, true)
}

/// The access level of a handle (not a nick) in a channel.
pub fn handle_access(world: &World, channel: &str, handle: &str) -> Option<u16> {
    world
        .chanserv
        .channels
        .get(channel)?
        .users
        .get(handle)
        .map(|u| u.access)
}

/// Does `nick` meet a channel's numeric level option?
///
/// A level option of zero gates nothing. `exempt_owner` passes owners
/// even when the option is set above 500 (used by options whose "off"
/// encoding is 501).
pub fn check_user_level(
    world: &World,
    channel: &str,
    nick: &str,
    opt: usize,
    allow_override: bool,
    exempt_owner: bool,
) -> bool {
    let Some(reg) = world.chanserv.channels.get(channel) else {
        return false;
    };
    let needed = reg.lvl_opts[opt];
    if needed == 0 {
        return true;
    }
    let level = channel_user_level(world, channel, nick, allow_override, false).unwrap_or(0);
    level >= needed || (exempt_owner && level >= UL_OWNER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chanserv::model::{ChannelReg, UserReg, LVL_PUBCMD, USER_SUSPENDED};
    use crate::conf::Config;

    fn world() -> World {
        let mut w = World::new(Config::default());
        w.user_connected("Alice", "alice", "a.example");
        w.user_authed("Alice", "Alice");
        let mut reg = ChannelReg::new("#t", 100);
        reg.users.insert("Alice", UserReg::new(300, 100));
        w.chanserv.channels.insert("#t", reg);
        w
    }

    #[test]
    fn record_access_is_returned() {
        let w = world();
        assert_eq!(channel_user_level(&w, "#t", "Alice", true, false), Some(300));
        assert_eq!(true_channel_access(&w, "#t", "Alice"), Some(300));
    }

    #[test]
    fn suspended_records_hide_unless_asked() {
        let mut w = world();
        w.chanserv
            .channels
            .get_mut("#t")
            .unwrap()
            .users
            .get_mut("Alice")
            .unwrap()
            .flags |= USER_SUSPENDED;
        assert_eq!(channel_user_level(&w, "#t", "Alice", false, false), None);
        assert_eq!(channel_user_level(&w, "#t", "Alice", false, true), Some(300));
    }

    #[test]
    fn helping_override_grants_helper_level() {
        let mut w = world();
        w.user_connected("Staff", "s", "staff.example");
        w.user_authed("Staff", "Staff");
        w.accounts.get_mut("Staff").unwrap().flags |= HANDLE_HELPING;
        assert_eq!(channel_user_level(&w, "#t", "Staff", true, false), Some(600));
        assert_eq!(channel_user_level(&w, "#t", "Staff", false, false), None);
    }

    #[test]
    fn zero_level_options_gate_nothing() {
        let mut w = world();
        w.user_connected("Rando", "r", "r.example");
        assert!(check_user_level(&w, "#t", "Rando", LVL_PUBCMD, true, false));
        w.chanserv.channels.get_mut("#t").unwrap().lvl_opts[LVL_PUBCMD] = 100;
        assert!(!check_user_level(&w, "#t", "Rando", LVL_PUBCMD, true, false));
        assert!(check_user_level(&w, "#t", "Alice", LVL_PUBCMD, true, false));
    }
}
