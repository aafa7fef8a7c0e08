//! Database subsystem registry.
//!
//! Subsystems register a (reader, writer) pair under a name; the
//! registry resolves each one's filename and flush interval from the
//! `dbs/<name>` configuration, feeds the parsed file to the reader at
//! registration, and schedules periodic flushes on the timer queue.
//!
//! Flushes write to `<file>.new` and rename over the original, so a
//! failed write never damages the previous database. A subsystem with a
//! `mondo_section` key never gets its own file; it appears as a named
//! sub-object of the shared `mondo` database instead.

use crate::ircstr::irc_lower;
use crate::recdb::{self, Db, DbExt, RecWriter};
use crate::state::{TimerEvent, World};
use std::io::{self, Write};
use tracing::{debug, error, info, warn};

/// The write context handed to subsystem writers.
pub type SaxWriter<'a> = RecWriter<&'a mut dyn Write>;

/// Reads a parsed tree into core state. A `Err` is logged and the load
/// proceeds; corrupt entries are skipped, not fatal.
pub type ReaderFn = fn(&mut World, &Db) -> Result<(), String>;

/// Serializes core state through the write context.
pub type WriterFn = fn(&World, &mut SaxWriter<'_>) -> io::Result<()>;

pub const MONDO_NAME: &str = "mondo";
const DEFAULT_INTERVAL: u64 = 1800;

#[derive(Clone)]
pub struct SaxDb {
    pub name: String,
    pub filename: String,
    pub write_interval: u64,
    pub mondo_section: Option<String>,
    reader: ReaderFn,
    writer: WriterFn,
}

/// Registration-ordered list of databases plus the raw mondo tree kept
/// for subsystems that register after the mondo file was read.
#[derive(Default)]
pub struct SaxRegistry {
    dbs: Vec<SaxDb>,
    mondo_raw: Option<Db>,
    pub mondo_filename: String,
    pub mondo_interval: u64,
}

impl SaxRegistry {
    pub fn new() -> Self {
        Self {
            dbs: Vec::new(),
            mondo_raw: None,
            mondo_filename: format!("{}.db", MONDO_NAME),
            mondo_interval: DEFAULT_INTERVAL,
        }
    }

    pub fn get(&self, name: &str) -> Option<&SaxDb> {
        self.dbs.iter().find(|d| crate::ircstr::irc_eq(&d.name, name))
    }

    pub fn names(&self) -> Vec<String> {
        self.dbs.iter().map(|d| d.name.clone()).collect()
    }

    fn mondo_sections(&self) -> Vec<(String, WriterFn)> {
        self.dbs
            .iter()
            .filter_map(|d| d.mondo_section.clone().map(|s| (s, d.writer)))
            .collect()
    }
}

fn read_file(filename: &str) -> Option<Db> {
    let text = match std::fs::read_to_string(filename) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            error!(file = %filename, error = %e, "Unable to read database");
            return None;
        }
    };
    match recdb::parse_database(&text) {
        Ok(db) => Some(db),
        Err(e) => {
            error!(file = %filename, error = %e, "Database parse failed");
            None
        }
    }
}

/// Read the shared mondo file and schedule its flush. Must run before
/// subsystems that use `mondo_section` register.
pub fn init_mondo(world: &mut World) {
    let filename = world
        .conf
        .get_path_str(&format!("dbs/{}/filename", MONDO_NAME))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.db", MONDO_NAME));
    let interval = world
        .conf
        .get_path_str(&format!("dbs/{}/frequency", MONDO_NAME))
        .and_then(crate::ircstr::parse_interval)
        .unwrap_or(DEFAULT_INTERVAL);
    world.saxdb.mondo_raw = read_file(&filename);
    world.saxdb.mondo_filename = filename;
    world.saxdb.mondo_interval = interval;
    if interval > 0 {
        let when = world.now + interval;
        world
            .timers
            .add(when, TimerEvent::DbFlush(MONDO_NAME.to_string()));
    }
}

/// Register a subsystem: resolve filename and interval, read its data
/// (own file or mondo section), and schedule the periodic flush.
pub fn register(world: &mut World, name: &str, reader: ReaderFn, writer: WriterFn) {
    let conf_base = format!("dbs/{}", name);
    let mondo_section = world
        .conf
        .get_path_str(&format!("{}/mondo_section", conf_base))
        .map(str::to_string);
    let filename = world
        .conf
        .get_path_str(&format!("{}/filename", conf_base))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.db", irc_lower(name)));
    let write_interval = world
        .conf
        .get_path_str(&format!("{}/frequency", conf_base))
        .and_then(crate::ircstr::parse_interval)
        .unwrap_or(DEFAULT_INTERVAL);

    let db = SaxDb {
        name: name.to_string(),
        filename,
        write_interval,
        mondo_section: mondo_section.clone(),
        reader,
        writer,
    };

    if let Some(ref section) = mondo_section {
        let data = world
            .saxdb
            .mondo_raw
            .as_ref()
            .and_then(|raw| raw.get_object(section))
            .cloned();
        world.saxdb.dbs.push(db);
        if let Some(data) = data {
            if let Err(e) = reader(world, &data) {
                warn!(db = name, section = %section, error = %e, "Mondo section read failed");
            }
        }
    } else {
        if db.write_interval > 0 {
            let when = world.now + db.write_interval;
            world
                .timers
                .add(when, TimerEvent::DbFlush(name.to_string()));
        }
        let data = read_file(&db.filename);
        world.saxdb.dbs.push(db);
        if let Some(data) = data {
            if let Err(e) = reader(world, &data) {
                warn!(db = name, error = %e, "Database read failed");
            }
        }
    }
    debug!(db = name, "Database registered");
}

fn write_file(
    world: &World,
    filename: &str,
    body: impl FnOnce(&World, &mut SaxWriter<'_>) -> io::Result<()>,
) -> bool {
    let tmp_name = format!("{}.new", filename);
    let result = (|| -> io::Result<()> {
        let file = std::fs::File::create(&tmp_name)?;
        let mut buffered = io::BufWriter::new(file);
        {
            let mut writer = RecWriter::new(&mut buffered as &mut dyn Write);
            body(world, &mut writer)?;
            writer.flush()?;
        }
        buffered.into_inner().map_err(|e| e.into_error())?;
        Ok(())
    })();
    match result {
        Ok(()) => {}
        Err(e) => {
            error!(file = %tmp_name, error = %e, "Error writing database");
            let _ = std::fs::remove_file(&tmp_name);
            return false;
        }
    }
    if let Err(e) = std::fs::rename(&tmp_name, filename) {
        error!(file = %filename, error = %e, "Unable to replace database");
        let _ = std::fs::remove_file(&tmp_name);
        return false;
    }
    true
}

/// Flush one database (or the composite mondo database) to disk.
/// Returns false when the flush was aborted; the previous file and the
/// flush schedule are unaffected either way.
pub fn flush(world: &World, name: &str) -> bool {
    if crate::ircstr::irc_eq(name, MONDO_NAME) {
        let sections = world.saxdb.mondo_sections();
        if sections.is_empty() {
            debug!("No mondo sections registered; skipping mondo flush");
            return true;
        }
        let filename = world.saxdb.mondo_filename.clone();
        let ok = write_file(world, &filename, |world, w| {
            for (section, writer) in &sections {
                w.start_record(section, true)?;
                writer(world, w)?;
                w.end_record()?;
            }
            Ok(())
        });
        if ok {
            info!(db = MONDO_NAME, file = %filename, "Wrote database");
        }
        return ok;
    }
    let Some(db) = world.saxdb.get(name) else {
        warn!(db = name, "Flush requested for unknown database");
        return false;
    };
    if db.mondo_section.is_some() {
        // Mondo sections are only ever written through the mondo flush.
        return flush(world, MONDO_NAME);
    }
    let (filename, writer) = (db.filename.clone(), db.writer);
    let ok = write_file(world, &filename, |world, w| writer(world, w));
    if ok {
        info!(db = name, file = %filename, "Wrote database");
    }
    ok
}

/// Flush every database; used by the deferred SIGINT handler and at
/// orderly shutdown.
pub fn flush_all(world: &World) {
    let mut wrote_mondo = false;
    for db in &world.saxdb.dbs {
        if db.mondo_section.is_some() {
            if !wrote_mondo {
                flush(world, MONDO_NAME);
                wrote_mondo = true;
            }
        } else {
            flush(world, &db.name);
        }
    }
}

/// Timer handler: flush and re-arm.
pub fn timed_flush(world: &mut World, name: &str) {
    flush(world, name);
    let interval = if crate::ircstr::irc_eq(name, MONDO_NAME) {
        world.saxdb.mondo_interval
    } else {
        world.saxdb.get(name).map_or(0, |d| d.write_interval)
    };
    if interval > 0 {
        let when = world.now + interval;
        world.timers.add(when, TimerEvent::DbFlush(name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::Config;
    use crate::recdb::DbExt;

    fn test_reader(world: &mut World, db: &Db) -> Result<(), String> {
        for (name, rec) in db.iter() {
            let level = rec.as_u64().ok_or_else(|| format!("bad entry {}", name))?;
            world.accounts.ensure(name).oper_level = level as u32;
        }
        Ok(())
    }

    fn test_writer(world: &World, w: &mut SaxWriter<'_>) -> io::Result<()> {
        for (name, handle) in world.accounts.iter() {
            w.write_u64(name, handle.oper_level as u64)?;
        }
        Ok(())
    }

    fn failing_writer(_: &World, _: &mut SaxWriter<'_>) -> io::Result<()> {
        Err(io::Error::other("writer exploded"))
    }

    fn world_with_db_conf(dir: &std::path::Path, name: &str, extra: &str) -> World {
        let conf_text = format!(
            "\"dbs\" {{ \"{}\" {{ \"filename\" \"{}/{}.db\"; {} }}; }};",
            name,
            dir.display(),
            name,
            extra
        );
        let conf = Config::from_db(crate::recdb::parse_database(&conf_text).unwrap());
        World::new(conf)
    }

    #[test]
    fn registration_reads_existing_file_and_schedules_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opers.db");
        std::fs::write(&path, "\"Alice\" \"900\";\n").unwrap();
        let mut world = world_with_db_conf(dir.path(), "opers", "\"frequency\" \"60\";");
        world.now = 1000;
        register(&mut world, "opers", test_reader, test_writer);
        assert_eq!(world.accounts.get("Alice").unwrap().oper_level, 900);
        assert_eq!(world.timers.next(), 1060);
    }

    #[test]
    fn flush_writes_via_tempfile_rename() {
        let dir = tempfile::tempdir().unwrap();
        let mut world = world_with_db_conf(dir.path(), "opers", "");
        register(&mut world, "opers", test_reader, test_writer);
        world.accounts.ensure("Bob").oper_level = 200;
        assert!(flush(&world, "opers"));
        let path = dir.path().join("opers.db");
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed = crate::recdb::parse_database(&text).unwrap();
        assert_eq!(parsed.get_u64("Bob"), Some(200));
        assert!(!dir.path().join("opers.db.new").exists());
    }

    #[test]
    fn failed_flush_preserves_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opers.db");
        std::fs::write(&path, "\"Keep\" \"1\";\n").unwrap();
        let mut world = world_with_db_conf(dir.path(), "opers", "");
        register(&mut world, "opers", test_reader, failing_writer);
        assert!(!flush(&world, "opers"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "\"Keep\" \"1\";\n"
        );
        assert!(!dir.path().join("opers.db.new").exists());
    }

    #[test]
    fn mondo_sections_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let mondo_path = dir.path().join("mondo.db");
        std::fs::write(
            &mondo_path,
            "\"OperLevels\" { \"Seeded\" \"700\"; };\n",
        )
        .unwrap();
        let conf_text = format!(
            concat!(
                "\"dbs\" {{ ",
                "\"mondo\" {{ \"filename\" \"{}\"; }}; ",
                "\"opers\" {{ \"mondo_section\" \"OperLevels\"; }}; ",
                "}};"
            ),
            mondo_path.display()
        );
        let conf = Config::from_db(crate::recdb::parse_database(&conf_text).unwrap());
        let mut world = World::new(conf);
        init_mondo(&mut world);
        register(&mut world, "opers", test_reader, test_writer);
        // Section content was routed to the subsystem reader.
        assert_eq!(world.accounts.get("Seeded").unwrap().oper_level, 700);

        world.accounts.ensure("Later").oper_level = 50;
        assert!(flush(&world, MONDO_NAME));
        let text = std::fs::read_to_string(&mondo_path).unwrap();
        let parsed = crate::recdb::parse_database(&text).unwrap();
        let section = parsed.get_object("OperLevels").unwrap();
        assert_eq!(section.get_u64("Later"), Some(50));

        // Flushing the section by name routes to the mondo file.
        assert!(flush(&world, "opers"));
    }
}
