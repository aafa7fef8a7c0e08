//! Database serialization for the channel services state.
//!
//! One section per concern: `note_types`, `dnr`, `channels`. Corrupt
//! entries are skipped with a warning; they never abort the load.

use super::model::{
    ChannelReg, Dnr, Note, NoteAccess, NoteType, NoteVisibility, Suspension, CHANNEL_SUSPENDED,
    CHAR_OPTIONS, LEVEL_OPTIONS, UL_OWNER,
};
use crate::recdb::{Db, DbExt};
use crate::saxdb::SaxWriter;
use crate::state::{ModeLock, TimerEvent, World};
use std::io;
use tracing::warn;

const KEY_NOTE_TYPES: &str = "note_types";
const KEY_DNR: &str = "dnr";
const KEY_CHANNELS: &str = "channels";

fn read_note_types(world: &mut World, db: &Db) {
    for (name, rec) in db.iter() {
        let Some(obj) = rec.as_object() else {
            warn!(note_type = name, "Skipping malformed note type");
            continue;
        };
        let set_access = if let Some(n) = obj.get_u64("channel_access") {
            NoteAccess::ChannelAccess(n as u16)
        } else if obj.get("setter_access").is_some() {
            NoteAccess::ChannelSetter
        } else if let Some(n) = obj.get_u64("opserv_access") {
            NoteAccess::OpservLevel(n as u32)
        } else {
            warn!(note_type = name, "Skipping note type without access");
            continue;
        };
        let visibility = match obj.get_str("visibility") {
            Some("all") => NoteVisibility::All,
            Some("channel_users") => NoteVisibility::ChannelUsers,
            Some("privileged") | None => NoteVisibility::Privileged,
            Some(other) => {
                warn!(note_type = name, visibility = other, "Unknown visibility");
                NoteVisibility::Privileged
            }
        };
        let max_length = obj.get_u64("max_length").unwrap_or(400) as usize;
        world.chanserv.note_types.insert(
            name,
            NoteType {
                set_access,
                visibility,
                max_length,
                refs: 0,
            },
        );
    }
}

fn read_dnrs(world: &mut World, db: &Db) {
    let now = world.now;
    for (target, rec) in db.iter() {
        let Some(obj) = rec.as_object() else {
            continue;
        };
        let dnr = Dnr {
            setter: obj.get_str("setter").unwrap_or("<unknown>").to_string(),
            set: obj.get_u64("set").unwrap_or(0),
            expires: obj.get_u64("expires").unwrap_or(0),
            reason: obj.get_str("reason").unwrap_or("").to_string(),
        };
        if dnr.expired(now) {
            continue;
        }
        if let Some(handle) = target.strip_prefix('*') {
            world.chanserv.handle_dnrs.insert(handle, dnr);
        } else if target.contains('*') || target.contains('?') {
            world.chanserv.mask_dnrs.insert(target, dnr);
        } else {
            world.chanserv.plain_dnrs.insert(target, dnr);
        }
    }
}

fn read_suspension(obj: &Db) -> Suspension {
    Suspension {
        suspender: obj.get_str("suspender").unwrap_or("<unknown>").to_string(),
        reason: obj.get_str("reason").unwrap_or("").to_string(),
        issued: obj.get_u64("issued").unwrap_or(0),
        expires: obj.get_u64("expires").unwrap_or(0),
        revoked: obj.get_u64("revoked").unwrap_or(0),
        previous: obj
            .get_object("previous")
            .map(|p| Box::new(read_suspension(p))),
    }
}

fn read_channel(world: &mut World, name: &str, obj: &Db) {
    let now = world.now;
    let Some(options) = obj.get_object("options") else {
        // Pre-structured-options records used a packed base64 field;
        // those databases are not read by this implementation.
        warn!(channel = name, "Skipping channel with legacy packed options");
        return;
    };
    let mut reg = ChannelReg::new(name, now);
    reg.registered = obj.get_u64("registered").unwrap_or(now);
    reg.visited = obj.get_u64("visited").unwrap_or(reg.registered);
    reg.owner_transfer = obj.get_u64("owner_transfer").unwrap_or(reg.registered);
    reg.max = obj.get_u64("max").unwrap_or(0) as u32;
    reg.topic = obj.get_str("topic").map(str::to_string);
    reg.registrar = obj.get_str("registrar").map(str::to_string);
    reg.greeting = obj.get_str("greeting").map(str::to_string);
    reg.user_greeting = obj.get_str("user_greeting").map(str::to_string);
    reg.topic_mask = obj.get_str("topic_mask").map(str::to_string);
    if let Some(modes) = obj.get_str("modes") {
        let words: Vec<&str> = modes.split(' ').collect();
        reg.modes = ModeLock::parse(&words).unwrap_or_default();
    }

    reg.flags = options.get_u64("flags").unwrap_or(0) as u32 & !CHANNEL_SUSPENDED;
    for (ii, (key, default)) in LEVEL_OPTIONS.iter().enumerate() {
        reg.lvl_opts[ii] = options.get_u64(key).unwrap_or(*default as u64) as u16;
    }
    for (ii, (key, default, legal)) in CHAR_OPTIONS.iter().enumerate() {
        let value = options
            .get_str(key)
            .and_then(|s| s.chars().next())
            .filter(|c| legal.contains(*c))
            .unwrap_or(*default);
        reg.ch_opts[ii] = value;
    }

    if let Some(susp_obj) = obj.get_object("suspended") {
        let suspension = read_suspension(susp_obj);
        if suspension.active(now) {
            reg.flags |= CHANNEL_SUSPENDED;
            if suspension.expires > 0 {
                world.timers.add(
                    suspension.expires,
                    TimerEvent::SuspensionExpire {
                        channel: name.to_string(),
                    },
                );
            }
        }
        reg.suspended = Some(Box::new(suspension));
    }

    world.chanserv.channels.insert(name, reg);

    if let Some(users) = obj.get_object("users") {
        for (handle, rec) in users.iter() {
            let Some(uobj) = rec.as_object() else {
                continue;
            };
            let Some(level) = uobj.get_u64("level").filter(|l| *l > 0 && *l <= UL_OWNER as u64)
            else {
                warn!(channel = name, handle, "Skipping user record with bad level");
                continue;
            };
            super::users::add_channel_user(
                world,
                name,
                handle,
                level as u16,
                uobj.get_u64("seen").unwrap_or(0),
            );
            if let Some(u) = world
                .chanserv
                .channels
                .get_mut(name)
                .and_then(|r| r.users.get_mut(handle))
            {
                u.flags = uobj.get_u64("flags").unwrap_or(0) as u32;
                u.info = uobj.get_str("info").map(str::to_string);
            }
        }
    }

    if let Some(bans) = obj.get_object("bans") {
        for (mask, rec) in bans.iter() {
            let Some(bobj) = rec.as_object() else {
                continue;
            };
            let expires = bobj.get_u64("expires").unwrap_or(0);
            if expires > 0 && expires <= now {
                continue;
            }
            let ban = super::model::BanReg {
                mask: mask.to_string(),
                owner: bobj.get_str("owner").unwrap_or("<unknown>").to_string(),
                reason: bobj.get_str("reason").unwrap_or("").to_string(),
                set: bobj.get_u64("set").unwrap_or(now),
                triggered: bobj.get_u64("triggered").unwrap_or(0),
                expires,
            };
            if let Some(reg) = world.chanserv.channels.get_mut(name) {
                reg.bans.push(ban);
            }
            world.chanserv.ban_count += 1;
            if expires > 0 {
                world.timers.add(
                    expires,
                    TimerEvent::BanExpire {
                        channel: name.to_string(),
                        mask: mask.to_string(),
                    },
                );
            }
        }
    }

    if let Some(notes) = obj.get_object("notes") {
        for (ty, rec) in notes.iter() {
            let Some(nobj) = rec.as_object() else {
                continue;
            };
            if !world.chanserv.note_types.contains(ty) {
                warn!(channel = name, note_type = ty, "Skipping note of unknown type");
                continue;
            }
            let note = Note {
                setter: nobj.get_str("setter").unwrap_or("<unknown>").to_string(),
                text: nobj.get_str("note").unwrap_or("").to_string(),
            };
            if let Some(reg) = world.chanserv.channels.get_mut(name) {
                reg.notes.insert(ty, note);
            }
            if let Some(nt) = world.chanserv.note_types.get_mut(ty) {
                nt.refs += 1;
            }
        }
    }
}

/// The registered database reader.
pub fn chanserv_read(world: &mut World, db: &Db) -> Result<(), String> {
    if let Some(types) = db.get_object(KEY_NOTE_TYPES) {
        read_note_types(world, types);
    }
    if let Some(dnrs) = db.get_object(KEY_DNR) {
        read_dnrs(world, dnrs);
    }
    if let Some(channels) = db.get_object(KEY_CHANNELS) {
        for (name, rec) in channels.iter() {
            match rec.as_object() {
                Some(obj) => read_channel(world, name, obj),
                None => warn!(channel = name, "Skipping malformed channel record"),
            }
        }
    }
    Ok(())
}

fn write_suspension(w: &mut SaxWriter<'_>, susp: &Suspension) -> io::Result<()> {
    w.write_string("suspender", &susp.suspender)?;
    w.write_string("reason", &susp.reason)?;
    w.write_u64("issued", susp.issued)?;
    w.write_u64("expires", susp.expires)?;
    w.write_u64("revoked", susp.revoked)?;
    if let Some(prev) = &susp.previous {
        w.start_record("previous", false)?;
        write_suspension(w, prev)?;
        w.end_record()?;
    }
    Ok(())
}

fn write_channel(w: &mut SaxWriter<'_>, reg: &ChannelReg) -> io::Result<()> {
    w.write_u64("registered", reg.registered)?;
    w.write_u64("visited", reg.visited)?;
    w.write_u64("owner_transfer", reg.owner_transfer)?;
    w.write_u64("max", reg.max as u64)?;
    if let Some(ref topic) = reg.topic {
        w.write_string("topic", topic)?;
    }
    if let Some(ref registrar) = reg.registrar {
        w.write_string("registrar", registrar)?;
    }
    if let Some(ref greeting) = reg.greeting {
        w.write_string("greeting", greeting)?;
    }
    if let Some(ref greeting) = reg.user_greeting {
        w.write_string("user_greeting", greeting)?;
    }
    if let Some(ref mask) = reg.topic_mask {
        w.write_string("topic_mask", mask)?;
    }
    if !reg.modes.is_empty() {
        w.write_string("modes", &reg.modes.to_mode_string())?;
    }

    w.start_record("options", true)?;
    w.write_u64("flags", reg.flags as u64)?;
    for (ii, (key, _)) in LEVEL_OPTIONS.iter().enumerate() {
        w.write_u64(key, reg.lvl_opts[ii] as u64)?;
    }
    for (ii, (key, _, _)) in CHAR_OPTIONS.iter().enumerate() {
        w.write_string(key, &reg.ch_opts[ii].to_string())?;
    }
    w.end_record()?;

    w.start_record("users", true)?;
    for (handle, u) in reg.users.iter() {
        w.start_record(handle, false)?;
        w.write_u64("level", u.access as u64)?;
        w.write_u64("seen", u.seen)?;
        w.write_u64("flags", u.flags as u64)?;
        if let Some(ref info) = u.info {
            w.write_string("info", info)?;
        }
        w.end_record()?;
    }
    w.end_record()?;

    if !reg.bans.is_empty() {
        w.start_record("bans", true)?;
        for ban in &reg.bans {
            w.start_record(&ban.mask, false)?;
            w.write_u64("set", ban.set)?;
            w.write_u64("triggered", ban.triggered)?;
            w.write_u64("expires", ban.expires)?;
            w.write_string("owner", &ban.owner)?;
            w.write_string("reason", &ban.reason)?;
            w.end_record()?;
        }
        w.end_record()?;
    }

    if !reg.notes.is_empty() {
        w.start_record("notes", true)?;
        for (ty, note) in reg.notes.iter() {
            w.start_record(ty, false)?;
            w.write_string("setter", &note.setter)?;
            w.write_string("note", &note.text)?;
            w.end_record()?;
        }
        w.end_record()?;
    }

    if let Some(ref susp) = reg.suspended {
        w.start_record("suspended", false)?;
        write_suspension(w, susp)?;
        w.end_record()?;
    }
    Ok(())
}

/// The registered database writer.
pub fn chanserv_write(world: &World, w: &mut SaxWriter<'_>) -> io::Result<()> {
    w.start_record(KEY_NOTE_TYPES, true)?;
    for (name, ty) in world.chanserv.note_types.iter() {
        w.start_record(name, false)?;
        match ty.set_access {
            NoteAccess::ChannelAccess(n) => w.write_u64("channel_access", n as u64)?,
            NoteAccess::ChannelSetter => w.write_u64("setter_access", 1)?,
            NoteAccess::OpservLevel(n) => w.write_u64("opserv_access", n as u64)?,
        }
        let visibility = match ty.visibility {
            NoteVisibility::All => "all",
            NoteVisibility::ChannelUsers => "channel_users",
            NoteVisibility::Privileged => "privileged",
        };
        w.write_string("visibility", visibility)?;
        w.write_u64("max_length", ty.max_length as u64)?;
        w.end_record()?;
    }
    w.end_record()?;

    fn write_dnr(w: &mut SaxWriter<'_>, target: &str, dnr: &Dnr) -> io::Result<()> {
        w.start_record(target, false)?;
        w.write_u64("set", dnr.set)?;
        if dnr.expires > 0 {
            w.write_u64("expires", dnr.expires)?;
        }
        w.write_string("setter", &dnr.setter)?;
        w.write_string("reason", &dnr.reason)?;
        w.end_record()
    }
    w.start_record(KEY_DNR, true)?;
    for (target, dnr) in world.chanserv.plain_dnrs.iter() {
        write_dnr(w, target, dnr)?;
    }
    for (target, dnr) in world.chanserv.mask_dnrs.iter() {
        write_dnr(w, target, dnr)?;
    }
    for (target, dnr) in world.chanserv.handle_dnrs.iter() {
        write_dnr(w, &format!("*{}", target), dnr)?;
    }
    w.end_record()?;

    w.start_record(KEY_CHANNELS, true)?;
    for (name, reg) in world.chanserv.channels.iter() {
        w.start_record(name, true)?;
        write_channel(w, reg)?;
        w.end_record()?;
    }
    w.end_record()?;
    Ok(())
}
