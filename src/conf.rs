//! Configuration surface.
//!
//! The configuration file is itself a record database document. This
//! module keeps the parsed tree for path queries (`a/b/c`) and distills
//! the sections the core consumes into typed structs with defaults.

use crate::ircstr::parse_interval;
use crate::recdb::{self, Db, DbExt, Record};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Parse {
        path: String,
        source: recdb::ParseError,
    },
}

/// ChanServ tunables (`services/chanserv/*`).
#[derive(Debug, Clone)]
pub struct ChanServConf {
    pub nick: String,
    pub db_backup_frequency: u64,
    pub info_delay: u64,
    pub greeting_length: usize,
    pub adjust_threshold: u32,
    pub adjust_delay: u64,
    pub channel_expire_frequency: u64,
    pub channel_expire_delay: u64,
    pub dnr_expire_frequency: u64,
    pub nodelete_level: u32,
    pub max_chan_users: usize,
    pub max_chan_bans: usize,
    pub max_userinfo_length: usize,
    pub refresh_period: u64,
    pub giveownership_period: u64,
    pub ctcp_short_ban_duration: u64,
    pub ctcp_long_ban_duration: u64,
    pub max_owned: usize,
    pub irc_operator_epithet: String,
    pub network_helper_epithet: String,
    pub support_helper_epithet: String,
    pub support_channels: Vec<String>,
    pub default_modes: String,
    pub old_ban_names: Vec<String>,
    pub off_channel: bool,
}

impl Default for ChanServConf {
    fn default() -> Self {
        Self {
            nick: "ChanServ".to_string(),
            db_backup_frequency: 7200,
            info_delay: 180,
            greeting_length: 200,
            adjust_threshold: 15,
            adjust_delay: 30,
            channel_expire_frequency: 86400,
            channel_expire_delay: 86400 * 30,
            dnr_expire_frequency: 3600,
            nodelete_level: 1,
            max_chan_users: 512,
            max_chan_bans: 512,
            max_userinfo_length: 400,
            refresh_period: 3 * 3600,
            giveownership_period: 0,
            ctcp_short_ban_duration: 180,
            ctcp_long_ban_duration: 3600,
            max_owned: 5,
            irc_operator_epithet: "a megalomaniacal power hungry tyrant".to_string(),
            network_helper_epithet: "a wannabe tyrant".to_string(),
            support_helper_epithet: "a wannabe tyrant".to_string(),
            support_channels: Vec::new(),
            default_modes: "+nt".to_string(),
            old_ban_names: Vec::new(),
            off_channel: false,
        }
    }
}

/// One bot persona from `services/<name>`.
#[derive(Debug, Clone)]
pub struct BotConf {
    pub service: String,
    pub nick: String,
    pub trigger: Option<char>,
    pub privileged: bool,
}

/// One uplink block from `uplinks/<name>`.
#[derive(Debug, Clone)]
pub struct UplinkConf {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub password: String,
    pub uplink_password: String,
    pub bind_address: Option<String>,
    pub enabled: bool,
    pub max_tries: u32,
}

/// Token-bucket parameters from `policers/<name>`.
#[derive(Debug, Clone, Copy)]
pub struct PolicerConf {
    pub size: f64,
    pub drain_rate: f64,
}

impl Default for PolicerConf {
    fn default() -> Self {
        Self {
            size: 5.0,
            drain_rate: 0.5,
        }
    }
}

/// `rlimits/*`, reported at startup; raising limits is left to the
/// supervisor (the crate forbids unsafe code).
#[derive(Debug, Clone, Copy, Default)]
pub struct RlimitsConf {
    pub data: Option<u64>,
    pub stack: Option<u64>,
    pub vmem: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    raw: Db,
    pub chanserv: ChanServConf,
    pub bots: Vec<BotConf>,
    pub uplinks: Vec<UplinkConf>,
    pub uplink_max_cycles: u32,
    pub policer_god: PolicerConf,
    pub policer_oper: PolicerConf,
    pub policer_luser: PolicerConf,
    pub rlimits: RlimitsConf,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_db(Db::new())
    }
}

fn interval(db: &Db, key: &str, default: u64) -> u64 {
    db.get_str(key)
        .and_then(parse_interval)
        .unwrap_or(default)
}

fn number<T: std::str::FromStr>(db: &Db, key: &str, default: T) -> T {
    db.get_str(key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn string(db: &Db, key: &str, default: &str) -> String {
    db.get_str(key).unwrap_or(default).to_string()
}

fn string_or_list(db: &Db, key: &str) -> Vec<String> {
    match db.get(key) {
        Some(Record::List(l)) => l.clone(),
        Some(Record::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

impl Config {
    /// Read and distill a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let db = recdb::parse_database(&text).map_err(|source| ConfError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_db(db))
    }

    /// Distill a parsed tree; absent keys get their defaults.
    pub fn from_db(raw: Db) -> Self {
        let mut cs = ChanServConf::default();
        if let Some(node) = raw
            .get_object("services")
            .and_then(|s| s.get_object("chanserv"))
        {
            cs.nick = string(node, "nick", &cs.nick);
            cs.db_backup_frequency = interval(node, "db_backup_freq", cs.db_backup_frequency);
            cs.info_delay = interval(node, "info_delay", cs.info_delay);
            cs.greeting_length = number(node, "max_greetlen", cs.greeting_length);
            cs.adjust_threshold = number(node, "adjust_threshold", cs.adjust_threshold);
            cs.adjust_delay = interval(node, "adjust_delay", cs.adjust_delay);
            cs.channel_expire_frequency =
                interval(node, "chan_expire_freq", cs.channel_expire_frequency);
            cs.channel_expire_delay = interval(node, "chan_expire_delay", cs.channel_expire_delay);
            cs.dnr_expire_frequency = interval(node, "dnr_expire_freq", cs.dnr_expire_frequency);
            cs.nodelete_level = number(node, "nodelete_level", cs.nodelete_level);
            cs.max_chan_users = number(node, "max_chan_users", cs.max_chan_users);
            cs.max_chan_bans = number(node, "max_chan_bans", cs.max_chan_bans);
            cs.max_userinfo_length =
                number(node, "max_userinfo_length", cs.max_userinfo_length);
            cs.refresh_period = interval(node, "refresh_period", cs.refresh_period);
            cs.giveownership_period =
                interval(node, "giveownership_timeout", cs.giveownership_period);
            cs.ctcp_short_ban_duration =
                interval(node, "ctcp_short_ban_duration", cs.ctcp_short_ban_duration);
            cs.ctcp_long_ban_duration =
                interval(node, "ctcp_long_ban_duration", cs.ctcp_long_ban_duration);
            cs.max_owned = number(node, "max_owned", cs.max_owned);
            cs.irc_operator_epithet =
                string(node, "irc_operator_epithet", &cs.irc_operator_epithet);
            cs.network_helper_epithet =
                string(node, "network_helper_epithet", &cs.network_helper_epithet);
            cs.support_helper_epithet =
                string(node, "support_helper_epithet", &cs.support_helper_epithet);
            cs.support_channels = string_or_list(node, "support_channel");
            cs.default_modes = string(node, "default_modes", &cs.default_modes);
            cs.old_ban_names = string_or_list(node, "old_ban_names");
            cs.off_channel = number::<u32>(node, "off_channel", 0) > 1;
        }

        let mut bots = Vec::new();
        if let Some(services) = raw.get_object("services") {
            for (name, rec) in services.iter() {
                let Some(node) = rec.as_object() else { continue };
                bots.push(BotConf {
                    service: name.to_string(),
                    nick: string(node, "nick", name),
                    trigger: node.get_str("trigger").and_then(|s| s.chars().next()),
                    privileged: number::<u32>(node, "privileged", 0) != 0,
                });
            }
        }

        let mut uplinks = Vec::new();
        let mut uplink_max_cycles = 3;
        if let Some(section) = raw.get_object("uplinks") {
            uplink_max_cycles = number(section, "max_cycles", uplink_max_cycles);
            for (name, rec) in section.iter() {
                let Some(node) = rec.as_object() else { continue };
                uplinks.push(UplinkConf {
                    name: name.to_string(),
                    address: string(node, "address", "127.0.0.1"),
                    port: number(node, "port", 6667),
                    password: string(node, "password", ""),
                    uplink_password: string(node, "uplink_password", ""),
                    bind_address: node.get_str("bind_address").map(str::to_string),
                    enabled: number::<u32>(node, "enabled", 1) != 0,
                    max_tries: number(node, "max_tries", 3),
                });
            }
        }

        let policer = |name: &str| -> PolicerConf {
            let mut p = PolicerConf::default();
            if let Some(node) = raw
                .get_object("policers")
                .and_then(|s| s.get_object(name))
            {
                p.size = number(node, "size", p.size);
                p.drain_rate = number(node, "drain-rate", p.drain_rate);
            }
            p
        };
        let policer_god = policer("commands-god");
        let policer_oper = policer("commands-oper");
        let policer_luser = policer("commands-luser");

        let mut rlimits = RlimitsConf::default();
        if let Some(node) = raw.get_object("rlimits") {
            rlimits.data = node.get_str("data").and_then(|s| s.parse().ok());
            rlimits.stack = node.get_str("stack").and_then(|s| s.parse().ok());
            rlimits.vmem = node.get_str("vmem").and_then(|s| s.parse().ok());
        }

        Self {
            raw,
            chanserv: cs,
            bots,
            uplinks,
            uplink_max_cycles,
            policer_god,
            policer_oper,
            policer_luser,
            rlimits,
        }
    }

    /// Path query over the raw tree: `dbs/chanserv/frequency`.
    pub fn get_path(&self, path: &str) -> Option<&Record> {
        let mut parts = path.split('/');
        let first = parts.next()?;
        let mut cur = self.raw.get(first)?;
        for part in parts {
            cur = cur.as_object()?.get(part)?;
        }
        Some(cur)
    }

    pub fn get_path_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(Record::as_str)
    }

    pub fn get_path_object(&self, path: &str) -> Option<&Db> {
        self.get_path(path).and_then(Record::as_object)
    }

    /// Fatal-misconfiguration check run at boot and by `-k`.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.chanserv.nick.is_empty() {
            errors.push("services/chanserv/nick must not be empty".to_string());
        }
        if self.chanserv.max_chan_users == 0 {
            errors.push("services/chanserv/max_chan_users must be positive".to_string());
        }
        if self.chanserv.max_chan_bans == 0 {
            errors.push("services/chanserv/max_chan_bans must be positive".to_string());
        }
        for uplink in &self.uplinks {
            if uplink.address.is_empty() {
                errors.push(format!("uplinks/{}/address must not be empty", uplink.name));
            }
        }
        for (name, p) in [
            ("commands-god", self.policer_god),
            ("commands-oper", self.policer_oper),
            ("commands-luser", self.policer_luser),
        ] {
            if p.size <= 0.0 || p.drain_rate <= 0.0 {
                errors.push(format!("policers/{}: size and drain-rate must be positive", name));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
        "services" {
            "chanserv" {
                "nick" "X";
                "db_backup_freq" "1h";
                "max_owned" "10";
                "support_channel" ("#support", "#help");
                "old_ban_names" ("*.users.example.org");
            };
            "opserv" { "nick" "O"; "privileged" "1"; };
        };
        "dbs" {
            "chanserv" { "frequency" "30m"; "mondo_section" "ChanServ"; };
        };
        "uplinks" {
            "hub" { "address" "10.0.0.1"; "port" "8888"; "enabled" "1"; "max_tries" "10"; };
        };
        "policers" {
            "commands-luser" { "size" "5"; "drain-rate" "0.5"; };
        };
        "rlimits" { "data" "50000000"; };
    "##;

    #[test]
    fn distills_chanserv_section() {
        let conf = Config::from_db(crate::recdb::parse_database(SAMPLE).unwrap());
        assert_eq!(conf.chanserv.nick, "X");
        assert_eq!(conf.chanserv.db_backup_frequency, 3600);
        assert_eq!(conf.chanserv.max_owned, 10);
        assert_eq!(conf.chanserv.support_channels.len(), 2);
        // Untouched keys keep defaults.
        assert_eq!(conf.chanserv.max_chan_bans, 512);
    }

    #[test]
    fn finds_bots_and_uplinks() {
        let conf = Config::from_db(crate::recdb::parse_database(SAMPLE).unwrap());
        assert_eq!(conf.bots.len(), 2);
        let opserv = conf.bots.iter().find(|b| b.service == "opserv").unwrap();
        assert!(opserv.privileged);
        assert_eq!(conf.uplinks.len(), 1);
        assert_eq!(conf.uplinks[0].port, 8888);
        assert_eq!(conf.uplinks[0].max_tries, 10);
    }

    #[test]
    fn path_queries_walk_the_raw_tree() {
        let conf = Config::from_db(crate::recdb::parse_database(SAMPLE).unwrap());
        assert_eq!(conf.get_path_str("dbs/chanserv/frequency"), Some("30m"));
        assert_eq!(conf.get_path_str("dbs/chanserv/mondo_section"), Some("ChanServ"));
        assert_eq!(conf.get_path_str("nope/nothing"), None);
        assert_eq!(conf.rlimits.data, Some(50_000_000));
    }

    #[test]
    fn validation_catches_bad_policers() {
        let mut conf = Config::default();
        conf.policer_god.size = 0.0;
        assert!(!conf.validate().is_empty());
        assert!(Config::default().validate().is_empty());
    }
}
