//! Channel notes and the process-wide note-type registry.

use super::access::{channel_user_level, handle_access};
use super::model::{Note, NoteAccess, NoteType, NoteVisibility, LVL_SETTERS};
use crate::ircstr::irc_eq;
use crate::modcmd::Invocation;
use crate::state::World;
use tracing::info;

const MIN_NOTE_LENGTH: usize = 20;
const MAX_NOTE_LENGTH: usize = 450;

/// Byte-cap a note without splitting a character.
fn truncate_note(text: &mut String, max: usize) {
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
}

fn caller_handle(world: &World, nick: &str) -> Option<String> {
    world.users.get(nick).and_then(|u| u.account.clone())
}

fn is_privileged(world: &World, nick: &str) -> bool {
    world.users.get(nick).is_some_and(|u| u.oper)
        || world
            .account_of(nick)
            .is_some_and(|h| h.is_helping() || h.oper_level > 0)
}

fn may_set_note(world: &World, nick: &str, channel: &str, ty: &NoteType) -> bool {
    match ty.set_access {
        NoteAccess::ChannelAccess(level) => {
            channel_user_level(world, channel, nick, true, false).unwrap_or(0) >= level
        }
        NoteAccess::ChannelSetter => {
            let needed = world
                .chanserv
                .channels
                .get(channel)
                .map_or(u16::MAX, |r| r.lvl_opts[LVL_SETTERS]);
            channel_user_level(world, channel, nick, true, false).unwrap_or(0) >= needed
        }
        NoteAccess::OpservLevel(level) => world
            .account_of(nick)
            .is_some_and(|h| h.oper_level >= level),
    }
}

fn may_see_note(world: &World, nick: &str, channel: &str, ty: &NoteType) -> bool {
    match ty.visibility {
        NoteVisibility::All => true,
        NoteVisibility::ChannelUsers => {
            caller_handle(world, nick)
                .is_some_and(|h| handle_access(world, channel, &h).is_some())
                || is_privileged(world, nick)
        }
        NoteVisibility::Privileged => is_privileged(world, nick),
    }
}

/// `createnote <name> channel <level> <visibility> <maxlen>`
/// `createnote <name> setter <visibility> <maxlen>`
/// `createnote <name> opserv <level> <visibility> <maxlen>`
///
/// Creating over an existing type modifies it; a reduced maximum length
/// truncates existing notes of the type.
pub fn cmd_createnote(world: &mut World, inv: &Invocation) -> bool {
    let name = inv.arg(1).unwrap_or("").to_string();
    let kind = inv.arg(2).unwrap_or("");
    let (set_access, rest) = if irc_eq(kind, "channel") {
        let Some(level) = super::model::level_from_name(inv.arg(3).unwrap_or(""), 500) else {
            let arg = inv.arg(3).unwrap_or("").to_string();
            world.reply(&inv.user, "CSMSG_INVALID_ACCESS", &[&arg]);
            return false;
        };
        (NoteAccess::ChannelAccess(level), 4)
    } else if irc_eq(kind, "setter") {
        (NoteAccess::ChannelSetter, 3)
    } else if irc_eq(kind, "opserv") {
        let Some(level) = inv.arg(3).and_then(|a| a.parse().ok()).filter(|l| *l <= 1000)
        else {
            let arg = inv.arg(3).unwrap_or("").to_string();
            world.reply(&inv.user, "MCMSG_BAD_OPSERV_LEVEL", &[&arg]);
            return false;
        };
        (NoteAccess::OpservLevel(level), 4)
    } else {
        let kind = kind.to_string();
        world.reply(&inv.user, "CSMSG_BAD_NOTE_ACCESS", &[&kind]);
        return false;
    };

    let visibility = match inv.arg(rest) {
        Some(v) if irc_eq(v, "all") => NoteVisibility::All,
        Some(v) if irc_eq(v, "channel_users") => NoteVisibility::ChannelUsers,
        Some(v) if irc_eq(v, "privileged") => NoteVisibility::Privileged,
        other => {
            let arg = other.unwrap_or("").to_string();
            world.reply(&inv.user, "CSMSG_BAD_NOTE_ACCESS", &[&arg]);
            return false;
        }
    };
    let max_length: usize = match inv.arg(rest + 1).and_then(|a| a.parse().ok()) {
        Some(len) if (MIN_NOTE_LENGTH..=MAX_NOTE_LENGTH).contains(&len) => len,
        _ => {
            let arg = inv.arg(rest + 1).unwrap_or("").to_string();
            world.reply(&inv.user, "CSMSG_BAD_MAX_LENGTH", &[&arg]);
            return false;
        }
    };

    let existing = world.chanserv.note_types.get(&name).map(|t| t.refs);
    match existing {
        Some(refs) => {
            if let Some(ty) = world.chanserv.note_types.get_mut(&name) {
                ty.set_access = set_access;
                ty.visibility = visibility;
                ty.max_length = max_length;
            }
            // Shrinking the cap truncates every existing note of this
            // type.
            if refs > 0 {
                let channels: Vec<String> = world
                    .chanserv
                    .channels
                    .keys()
                    .map(str::to_string)
                    .collect();
                for chan in channels {
                    if let Some(note) = world
                        .chanserv
                        .channels
                        .get_mut(&chan)
                        .and_then(|r| r.notes.get_mut(&name))
                    {
                        truncate_note(&mut note.text, max_length);
                    }
                }
            }
            world.reply(&inv.user, "CSMSG_NOTE_MODIFIED", &[&name]);
        }
        None => {
            world.chanserv.note_types.insert(
                &name,
                NoteType {
                    set_access,
                    visibility,
                    max_length,
                    refs: 0,
                },
            );
            info!(target: "audit", note_type = %name, by = %inv.user, "Note type created");
            world.reply(&inv.user, "CSMSG_NOTE_CREATED", &[&name]);
        }
    }
    true
}

/// `removenote <name> [force]`: delete a note type; in-use types need
/// the force argument and lose their notes everywhere.
pub fn cmd_removenote(world: &mut World, inv: &Invocation) -> bool {
    let name = inv.arg(1).unwrap_or("").to_string();
    let force = inv.arg(2).is_some_and(|a| irc_eq(a, "force"));
    let Some(ty) = world.chanserv.note_types.get(&name) else {
        world.reply(&inv.user, "CSMSG_BAD_NOTE_TYPE", &[&name]);
        return false;
    };
    if ty.refs > 0 && !force {
        world.reply(&inv.user, "CSMSG_NOTE_TYPE_USED", &[&name]);
        return false;
    }
    let channels: Vec<String> = world.chanserv.channels.keys().map(str::to_string).collect();
    for chan in channels {
        if let Some(reg) = world.chanserv.channels.get_mut(&chan) {
            reg.notes.remove(&name);
        }
    }
    world.chanserv.note_types.remove(&name);
    info!(target: "audit", note_type = %name, by = %inv.user, "Note type removed");
    world.reply(&inv.user, "CSMSG_NOTE_DELETED", &[&name]);
    true
}

/// `note` lists visible notes; `note <type>` reads one; `note <type>
/// <text>` sets or replaces it.
pub fn cmd_note(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    match inv.argv.len() {
        1 => {
            let visible: Vec<(String, Note)> = world
                .chanserv
                .channels
                .get(&channel)
                .map(|reg| {
                    reg.notes
                        .iter()
                        .filter(|(ty_name, _)| {
                            world
                                .chanserv
                                .note_types
                                .get(ty_name)
                                .is_some_and(|ty| may_see_note(world, &inv.user, &channel, ty))
                        })
                        .map(|(n, note)| (n.to_string(), note.clone()))
                        .collect()
                })
                .unwrap_or_default();
            if visible.is_empty() {
                world.reply(&inv.user, "CSMSG_NOTELIST_EMPTY", &[&channel]);
                return true;
            }
            world.reply(&inv.user, "CSMSG_NOTELIST_HEADER", &[&channel]);
            for (name, note) in visible {
                world.reply(
                    &inv.user,
                    "CSMSG_NOTE_FORMAT",
                    &[&name, &note.setter, &note.text],
                );
            }
            world.reply(&inv.user, "CSMSG_NOTELIST_END", &[&channel]);
            true
        }
        2 => {
            let name = inv.arg(1).unwrap_or("").to_string();
            let Some(ty) = world.chanserv.note_types.get(&name).cloned() else {
                world.reply(&inv.user, "CSMSG_BAD_NOTE_TYPE", &[&name]);
                return false;
            };
            if !may_see_note(world, &inv.user, &channel, &ty) {
                world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
                return false;
            }
            let note = world
                .chanserv
                .channels
                .get(&channel)
                .and_then(|r| r.notes.get(&name))
                .cloned();
            match note {
                Some(note) => {
                    world.reply(
                        &inv.user,
                        "CSMSG_NOTE_FORMAT",
                        &[&name, &note.setter, &note.text],
                    );
                    true
                }
                None => {
                    world.reply(&inv.user, "CSMSG_NO_SUCH_NOTE", &[&channel, &name]);
                    false
                }
            }
        }
        _ => {
            let name = inv.arg(1).unwrap_or("").to_string();
            let Some(ty) = world.chanserv.note_types.get(&name).cloned() else {
                world.reply(&inv.user, "CSMSG_BAD_NOTE_TYPE", &[&name]);
                return false;
            };
            if !may_set_note(world, &inv.user, &channel, &ty) {
                world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
                return false;
            }
            let mut text = inv.argv[2..].join(" ");
            truncate_note(&mut text, ty.max_length);
            let setter = caller_handle(world, &inv.user).unwrap_or_else(|| inv.user.clone());
            let replaced = world
                .chanserv
                .channels
                .get(&channel)
                .and_then(|r| r.notes.get(&name))
                .cloned();
            if let Some(reg) = world.chanserv.channels.get_mut(&channel) {
                reg.notes.insert(&name, Note { setter, text });
            }
            match replaced {
                Some(old) => {
                    world.reply(
                        &inv.user,
                        "CSMSG_REPLACED_NOTE",
                        &[&name, &channel, &old.setter, &old.text],
                    );
                }
                None => {
                    if let Some(ty) = world.chanserv.note_types.get_mut(&name) {
                        ty.refs += 1;
                    }
                    world.reply(&inv.user, "CSMSG_NOTE_SET", &[&name, &channel]);
                }
            }
            true
        }
    }
}

/// `delnote <type>`: remove a channel's note of that type.
pub fn cmd_delnote(world: &mut World, inv: &Invocation) -> bool {
    let Some(channel) = inv.channel().map(str::to_string) else {
        return false;
    };
    let name = inv.arg(1).unwrap_or("").to_string();
    let Some(ty) = world.chanserv.note_types.get(&name).cloned() else {
        world.reply(&inv.user, "CSMSG_BAD_NOTE_TYPE", &[&name]);
        return false;
    };
    if !may_set_note(world, &inv.user, &channel, &ty) {
        world.reply(&inv.user, "CSMSG_NO_ACCESS", &[]);
        return false;
    }
    let removed = world
        .chanserv
        .channels
        .get_mut(&channel)
        .and_then(|r| r.notes.remove(&name));
    if removed.is_none() {
        world.reply(&inv.user, "CSMSG_NO_SUCH_NOTE", &[&channel, &name]);
        return false;
    }
    if let Some(ty) = world.chanserv.note_types.get_mut(&name) {
        ty.refs = ty.refs.saturating_sub(1);
    }
    world.reply(&inv.user, "CSMSG_NOTE_REMOVED", &[&name, &channel]);
    true
}
