//! Command-dispatch framework.
//!
//! Code modules export command implementations; service bots carry
//! per-binding permission rules pointing at them. Many bindings may
//! share one implementation, each with its own flags, thresholds and
//! alias expansion.

pub mod alias;
pub mod builtin;
pub mod dispatch;

use crate::ircstr::{irc_eq, IrcDict};
use crate::recdb;
use crate::state::World;
use thiserror::Error;
use tracing::warn;

// Binding flag bits.
pub const MODCMD_DISABLED: u32 = 0x001;
pub const MODCMD_NO_LOG: u32 = 0x002;
pub const MODCMD_KEEP_BOUND: u32 = 0x004;
pub const MODCMD_ACCEPT_CHANNEL: u32 = 0x008;
pub const MODCMD_ACCEPT_PCHANNEL: u32 = 0x010;
pub const MODCMD_NO_DEFAULT_BIND: u32 = 0x020;
pub const MODCMD_LOG_HOSTMASK: u32 = 0x040;
pub const MODCMD_IGNORE_CSUSPEND: u32 = 0x080;
pub const MODCMD_NEVER_CSUSPEND: u32 = 0x100;
pub const MODCMD_REQUIRE_AUTHED: u32 = 0x001000;
pub const MODCMD_REQUIRE_CHANNEL: u32 = 0x002000;
pub const MODCMD_REQUIRE_REGCHAN: u32 = 0x004000;
pub const MODCMD_REQUIRE_CHANUSER: u32 = 0x008000;
pub const MODCMD_REQUIRE_JOINABLE: u32 = 0x010000;
pub const MODCMD_REQUIRE_QUALIFIED: u32 = 0x020000;
pub const MODCMD_REQUIRE_OPER: u32 = 0x040000;
pub const MODCMD_REQUIRE_NETWORK_HELPER: u32 = 0x080000;
pub const MODCMD_REQUIRE_SUPPORT_HELPER: u32 = 0x100000;
pub const MODCMD_REQUIRE_HELPING: u32 = 0x200000;
pub const MODCMD_TOY: u32 = 0x400000;
pub const MODCMD_REQUIRE_STAFF: u32 =
    MODCMD_REQUIRE_OPER | MODCMD_REQUIRE_NETWORK_HELPER | MODCMD_REQUIRE_SUPPORT_HELPER;

/// Flag spellings accepted by `bind` options and the `modcmd` command.
pub static FLAG_NAMES: &[(&str, u32)] = &[
    ("acceptchan", MODCMD_ACCEPT_CHANNEL),
    ("acceptpluschan", MODCMD_ACCEPT_PCHANNEL),
    ("disabled", MODCMD_DISABLED),
    ("helping", MODCMD_REQUIRE_HELPING),
    ("ignore_csuspend", MODCMD_IGNORE_CSUSPEND),
    ("joinable", MODCMD_REQUIRE_JOINABLE),
    ("keepbound", MODCMD_KEEP_BOUND),
    ("loghostmask", MODCMD_LOG_HOSTMASK),
    ("networkhelper", MODCMD_REQUIRE_NETWORK_HELPER),
    ("never_csuspend", MODCMD_NEVER_CSUSPEND),
    ("nolog", MODCMD_NO_LOG),
    ("oper", MODCMD_REQUIRE_OPER),
    ("qualified", MODCMD_REQUIRE_QUALIFIED),
    ("supporthelper", MODCMD_REQUIRE_SUPPORT_HELPER),
    ("toy", MODCMD_TOY),
];

pub fn flag_by_name(name: &str) -> Option<u32> {
    FLAG_NAMES
        .iter()
        .find(|(n, _)| irc_eq(n, name))
        .map(|(_, f)| *f)
}

/// Per-binding permission rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rules {
    pub flags: u32,
    pub min_channel_access: u16,
    pub min_opserv_level: u32,
    pub req_account_flags: u32,
    pub deny_account_flags: u32,
}

impl Rules {
    /// Union with another rule set: bitwise-or of flags and account
    /// masks, max of numeric thresholds.
    pub fn absorb(&mut self, other: &Rules) {
        self.flags |= other.flags;
        self.req_account_flags |= other.req_account_flags;
        self.deny_account_flags |= other.deny_account_flags;
        self.min_opserv_level = self.min_opserv_level.max(other.min_opserv_level);
        self.min_channel_access = self.min_channel_access.max(other.min_channel_access);
    }
}

/// Derive the effective flag set from rules plus the implementation's
/// intrinsic flags.
pub fn effective_flags(rules: &Rules, command_flags: u32) -> u32 {
    let mut flags = rules.flags | command_flags;
    if rules.min_opserv_level > 0 {
        flags |= MODCMD_REQUIRE_OPER;
    }
    if rules.min_channel_access > 0 {
        flags |= MODCMD_REQUIRE_CHANUSER;
    }
    if flags & MODCMD_REQUIRE_CHANUSER != 0 {
        flags |= MODCMD_REQUIRE_REGCHAN;
    }
    if flags & MODCMD_REQUIRE_REGCHAN != 0 {
        flags |= MODCMD_REQUIRE_CHANNEL;
    }
    if flags & (MODCMD_REQUIRE_STAFF | MODCMD_REQUIRE_HELPING) != 0 {
        flags |= MODCMD_REQUIRE_AUTHED;
    }
    flags
}

/// Result bits from the permission predicate.
pub const ACTION_ALLOW: u32 = 1;
pub const ACTION_OVERRIDE: u32 = 2;
pub const ACTION_NOCHANNEL: u32 = 4;
pub const ACTION_STAFF: u32 = 8;

/// The call context handed to command implementations.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Caller's nick.
    pub user: String,
    /// Service key the command was invoked through.
    pub service: String,
    /// The service bot's nick.
    pub bot: String,
    pub channel: Option<String>,
    /// argv[0] is the binding name.
    pub argv: Vec<String>,
    pub cmd_name: String,
    pub modcmd: (String, String),
    pub effective_flags: u32,
    pub perms: u32,
}

impl Invocation {
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.argv.get(n).map(String::as_str)
    }

    /// The channel argument everything channel-scoped operates on.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }
}

/// A command implementation: returns true when the invocation did
/// something worth audit-logging.
pub type CommandFn = fn(&mut World, &Invocation) -> bool;

/// A command implementation exported by a module.
#[derive(Clone)]
pub struct ModCmd {
    pub module: String,
    pub name: String,
    pub func: CommandFn,
    pub min_argc: usize,
    pub flags: u32,
    pub defaults: Rules,
    pub bind_count: u32,
}

/// A binding of a module command into a service.
#[derive(Clone)]
pub struct SvcCmd {
    pub name: String,
    /// (module, command) of the implementation.
    pub modcmd: (String, String),
    pub rules: Rules,
    pub effective_flags: u32,
    /// Alias token list; empty for direct bindings.
    pub alias: Vec<String>,
    /// Template reference, resolved in the second load pass.
    pub template: Option<String>,
    pub uses: u64,
}

/// A bot persona owning a command map.
#[derive(Clone)]
pub struct Service {
    pub name: String,
    pub bot: String,
    pub trigger: Option<char>,
    pub privileged: bool,
    pub commands: IrcDict<SvcCmd>,
    /// Modules contributing help text, in search order.
    pub modules: Vec<String>,
}

/// A named container of command implementations plus its help store.
pub struct Module {
    pub name: String,
    pub commands: IrcDict<ModCmd>,
    pub helpfile: Option<String>,
    pub help: IrcDict<String>,
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("unknown module {0}")]
    UnknownModule(String),
    #[error("unknown service {0}")]
    UnknownService(String),
    #[error("unknown command {0}.{1}")]
    UnknownCommand(String, String),
    #[error("{0} already has a command bound as {1}")]
    AlreadyBound(String, String),
    #[error("nothing bound as {0}")]
    NotBound(String),
    #[error("refusing to unbind the last {0} binding")]
    KeepBound(String),
}

/// The process-wide module/service tables.
#[derive(Default)]
pub struct Registry {
    pub modules: IrcDict<Module>,
    pub services: IrcDict<Service>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, name: &str, helpfile: Option<&str>) {
        if self.modules.contains(name) {
            warn!(module = name, "Module registered twice");
            return;
        }
        self.modules.insert(
            name,
            Module {
                name: name.to_string(),
                commands: IrcDict::new(),
                helpfile: helpfile.map(str::to_string),
                help: IrcDict::new(),
            },
        );
    }

    /// Register a command implementation with default rules given as
    /// (option, value) pairs: `flags`, `oper_level`, `channel_access`,
    /// `account_flags`, `template`.
    pub fn register_command(
        &mut self,
        module: &str,
        name: &str,
        func: CommandFn,
        min_argc: usize,
        flags: u32,
        opts: &[(&str, &str)],
    ) {
        let mut defaults = Rules::default();
        let mut template: Option<Rules> = None;
        {
            let Some(m) = self.modules.get(module) else {
                warn!(module, command = name, "Command registered into unknown module");
                return;
            };
            for (opt, value) in opts {
                if irc_eq(opt, "template") {
                    match m.commands.get(value) {
                        Some(t) => template = Some(t.defaults),
                        None => warn!(module, command = name, template = value, "Unknown template command"),
                    }
                }
            }
        }
        if let Some(t) = template {
            defaults = t;
        }
        // Channel-context commands accept a leading channel argument;
        // staff commands imply authentication.
        if flags
            & (MODCMD_REQUIRE_REGCHAN
                | MODCMD_REQUIRE_CHANNEL
                | MODCMD_REQUIRE_CHANUSER
                | MODCMD_REQUIRE_JOINABLE)
            != 0
        {
            defaults.flags |= MODCMD_ACCEPT_CHANNEL;
        }
        if flags & MODCMD_REQUIRE_STAFF != 0 {
            defaults.flags |= MODCMD_REQUIRE_AUTHED;
        }
        for (opt, value) in opts {
            apply_rule_option(&mut defaults, opt, value);
        }
        let Some(m) = self.modules.get_mut(module) else {
            return;
        };
        m.commands.insert(
            name,
            ModCmd {
                module: module.to_string(),
                name: name.to_string(),
                func,
                min_argc,
                flags,
                defaults,
                bind_count: 0,
            },
        );
    }

    pub fn register_service(
        &mut self,
        name: &str,
        bot: &str,
        trigger: Option<char>,
        privileged: bool,
    ) {
        if self.services.contains(name) {
            warn!(service = name, "Service registered twice");
            return;
        }
        self.services.insert(
            name,
            Service {
                name: name.to_string(),
                bot: bot.to_string(),
                trigger,
                privileged,
                commands: IrcDict::new(),
                modules: Vec::new(),
            },
        );
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut Service> {
        self.services.get_mut(name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().map(str::to_string).collect()
    }

    pub fn service_by_nick(&self, nick: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|(_, s)| irc_eq(&s.bot, nick))
            .map(|(name, _)| name)
    }

    pub fn modcmd(&self, module: &str, command: &str) -> Option<&ModCmd> {
        self.modules.get(module)?.commands.get(command)
    }

    /// Bind one command into a service under `bind_name`, rules copied
    /// from the command's defaults.
    pub fn bind(
        &mut self,
        service: &str,
        module: &str,
        command: &str,
        bind_name: &str,
    ) -> Result<(), BindError> {
        let (defaults, cmd_flags) = {
            let cmd = self
                .modcmd(module, command)
                .ok_or_else(|| BindError::UnknownCommand(module.to_string(), command.to_string()))?;
            (cmd.defaults, cmd.flags)
        };
        {
            let svc = self
                .services
                .get(service)
                .ok_or_else(|| BindError::UnknownService(service.to_string()))?;
            if svc.commands.contains(bind_name) {
                return Err(BindError::AlreadyBound(
                    svc.bot.clone(),
                    bind_name.to_string(),
                ));
            }
        }
        let svccmd = SvcCmd {
            name: bind_name.to_string(),
            modcmd: (module.to_string(), command.to_string()),
            rules: defaults,
            effective_flags: effective_flags(&defaults, cmd_flags),
            alias: Vec::new(),
            template: None,
            uses: 0,
        };
        let svc = self.services.get_mut(service).expect("checked above");
        svc.commands.insert(bind_name, svccmd);
        if !svc.modules.iter().any(|m| irc_eq(m, module)) {
            svc.modules.push(module.to_string());
        }
        if let Some(cmd) = self
            .modules
            .get_mut(module)
            .and_then(|m| m.commands.get_mut(command))
        {
            cmd.bind_count += 1;
        }
        Ok(())
    }

    /// Bind every command of a module that is not marked
    /// NO_DEFAULT_BIND.
    pub fn bind_module(&mut self, service: &str, module: &str) -> Result<usize, BindError> {
        let names: Vec<String> = {
            let m = self
                .modules
                .get(module)
                .ok_or_else(|| BindError::UnknownModule(module.to_string()))?;
            m.commands
                .iter()
                .filter(|(_, c)| c.flags & MODCMD_NO_DEFAULT_BIND == 0)
                .map(|(n, _)| n.to_string())
                .collect()
        };
        let mut bound = 0;
        for name in names {
            match self.bind(service, module, &name, &name) {
                Ok(()) => bound += 1,
                Err(BindError::AlreadyBound(_, _)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(bound)
    }

    /// Create an alias binding: rules template plus a token list.
    pub fn bind_alias(
        &mut self,
        service: &str,
        bind_name: &str,
        tokens: &[&str],
    ) -> Result<(), BindError> {
        // tokens[0] names the underlying binding (service-relative or
        // "*module.command"); the rest are the expansion template.
        let Some(target) = tokens.first() else {
            return Err(BindError::NotBound(bind_name.to_string()));
        };
        let (module, command, rules) = self.resolve_command_ref(service, target)?;
        let cmd_flags = self
            .modcmd(&module, &command)
            .map(|c| c.flags)
            .unwrap_or(0);
        {
            let svc = self
                .services
                .get(service)
                .ok_or_else(|| BindError::UnknownService(service.to_string()))?;
            if svc.commands.contains(bind_name) {
                return Err(BindError::AlreadyBound(
                    svc.bot.clone(),
                    bind_name.to_string(),
                ));
            }
        }
        // A bare command reference is a direct bind under another name;
        // extra tokens make it an expanding alias whose first token is
        // the resolved command word.
        let alias = if tokens.len() > 1 {
            let mut list: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
            list[0] = command.clone();
            list
        } else {
            Vec::new()
        };
        let svccmd = SvcCmd {
            name: bind_name.to_string(),
            modcmd: (module.clone(), command.clone()),
            rules,
            effective_flags: effective_flags(&rules, cmd_flags),
            alias,
            template: None,
            uses: 0,
        };
        let svc = self.services.get_mut(service).expect("checked above");
        svc.commands.insert(bind_name, svccmd);
        if !svc.modules.iter().any(|m| irc_eq(m, &module)) {
            svc.modules.push(module.clone());
        }
        if let Some(cmd) = self
            .modules
            .get_mut(&module)
            .and_then(|m| m.commands.get_mut(&command))
        {
            cmd.bind_count += 1;
        }
        Ok(())
    }

    /// Resolve `name`, `*module.command`, or `service.binding` into the
    /// implementation it denotes plus the rules at that reference.
    pub fn resolve_command_ref(
        &self,
        service: &str,
        reference: &str,
    ) -> Result<(String, String, Rules), BindError> {
        if let Some(rest) = reference.strip_prefix('*') {
            let (module, command) = rest
                .split_once('.')
                .ok_or_else(|| BindError::NotBound(reference.to_string()))?;
            let cmd = self
                .modcmd(module, command)
                .ok_or_else(|| BindError::UnknownCommand(module.to_string(), command.to_string()))?;
            return Ok((cmd.module.clone(), cmd.name.clone(), cmd.defaults));
        }
        let (svc_name, bind_name) = match reference.split_once('.') {
            Some((s, b)) => (s, b),
            None => (service, reference),
        };
        let svc = self
            .services
            .get(svc_name)
            .ok_or_else(|| BindError::UnknownService(svc_name.to_string()))?;
        let cmd = svc
            .commands
            .get(bind_name)
            .ok_or_else(|| BindError::NotBound(reference.to_string()))?;
        Ok((cmd.modcmd.0.clone(), cmd.modcmd.1.clone(), cmd.rules))
    }

    /// Unbind a command from a service.
    pub fn unbind(&mut self, service: &str, name: &str) -> Result<(), BindError> {
        let (modcmd, keep_bound) = {
            let svc = self
                .services
                .get(service)
                .ok_or_else(|| BindError::UnknownService(service.to_string()))?;
            let cmd = svc
                .commands
                .get(name)
                .ok_or_else(|| BindError::NotBound(name.to_string()))?;
            let implementation = self.modcmd(&cmd.modcmd.0, &cmd.modcmd.1);
            let keep = implementation.is_some_and(|c| {
                (c.flags | c.defaults.flags) & MODCMD_KEEP_BOUND != 0 && c.bind_count <= 1
            });
            (cmd.modcmd.clone(), keep)
        };
        if keep_bound {
            return Err(BindError::KeepBound(name.to_string()));
        }
        let svc = self.services.get_mut(service).expect("checked above");
        svc.commands.remove(name);
        if let Some(cmd) = self
            .modules
            .get_mut(&modcmd.0)
            .and_then(|m| m.commands.get_mut(&modcmd.1))
        {
            cmd.bind_count = cmd.bind_count.saturating_sub(1);
        }
        Ok(())
    }

    /// Second load pass: apply template rules to every binding that
    /// declares one. Unresolved references log a warning and leave the
    /// binding's own rules in force.
    pub fn resolve_templates(&mut self) {
        let services: Vec<String> = self.services.keys().map(str::to_string).collect();
        for svc_name in services {
            let pending: Vec<(String, String)> = self
                .services
                .get(&svc_name)
                .map(|svc| {
                    svc.commands
                        .iter()
                        .filter_map(|(n, c)| {
                            c.template.clone().map(|t| (n.to_string(), t))
                        })
                        .collect()
                })
                .unwrap_or_default();
            for (bind_name, template) in pending {
                match self.resolve_command_ref(&svc_name, &template) {
                    Ok((module, command, rules)) => {
                        let cmd_flags = self
                            .modcmd(&module, &command)
                            .map(|c| c.flags)
                            .unwrap_or(0);
                        if let Some(cmd) = self
                            .services
                            .get_mut(&svc_name)
                            .and_then(|s| s.commands.get_mut(&bind_name))
                        {
                            cmd.rules.absorb(&rules);
                            cmd.effective_flags = effective_flags(&cmd.rules, cmd_flags);
                            cmd.template = None;
                        }
                    }
                    Err(_) => {
                        warn!(
                            service = %svc_name,
                            binding = %bind_name,
                            template = %template,
                            "Unresolved binding template"
                        );
                    }
                }
            }
        }
    }

    /// Load a module's help store from its helpfile (a record database
    /// of topic to string or string-list).
    pub fn read_help(&mut self, module: &str) -> Result<usize, String> {
        let Some(m) = self.modules.get(module) else {
            return Err(format!("unknown module {}", module));
        };
        let Some(filename) = m.helpfile.clone() else {
            return Err(format!("module {} has no help file", module));
        };
        let text = std::fs::read_to_string(&filename)
            .map_err(|e| format!("cannot read {}: {}", filename, e))?;
        let db = recdb::parse_database(&text).map_err(|e| format!("{}: {}", filename, e))?;
        let mut help = IrcDict::new();
        for (topic, rec) in db.iter() {
            let text = match rec {
                recdb::Record::String(s) => s.clone(),
                recdb::Record::List(l) => l.join("\n"),
                recdb::Record::Object(_) => continue,
            };
            help.insert(topic, text);
        }
        let count = help.len();
        if let Some(m) = self.modules.get_mut(module) {
            m.help = help;
        }
        Ok(count)
    }
}

/// Apply one (option, value) rule pair; unknown options are reported to
/// the caller for user feedback.
pub fn apply_rule_option(rules: &mut Rules, opt: &str, value: &str) -> bool {
    if irc_eq(opt, "flags") {
        for part in value.split(',') {
            let (add, name) = match part.strip_prefix('+') {
                Some(n) => (true, n),
                None => match part.strip_prefix('-') {
                    Some(n) => (false, n),
                    None => return false,
                },
            };
            let Some(flag) = flag_by_name(name) else {
                return false;
            };
            if add {
                rules.flags |= flag;
            } else {
                rules.flags &= !flag;
            }
        }
        true
    } else if irc_eq(opt, "oper_level") || irc_eq(opt, "opserv_level") {
        match value.parse() {
            Ok(level) if level <= 1000 => {
                rules.min_opserv_level = level;
                true
            }
            _ => false,
        }
    } else if irc_eq(opt, "channel_level") || irc_eq(opt, "channel_access") || irc_eq(opt, "access")
    {
        if irc_eq(value, "none") {
            rules.min_channel_access = 0;
            return true;
        }
        match crate::chanserv::model::level_from_name(value, 500) {
            Some(level) => {
                rules.min_channel_access = level;
                true
            }
            None => false,
        }
    } else if irc_eq(opt, "account_flags") {
        for part in value.split(',') {
            if let Some(name) = part.strip_prefix('+') {
                rules.req_account_flags |= crate::accounts::handle_flags_from_spec(name);
            } else if let Some(name) = part.strip_prefix('-') {
                rules.deny_account_flags |= crate::accounts::handle_flags_from_spec(name);
            } else {
                return false;
            }
        }
        true
    } else if irc_eq(opt, "template") {
        // Handled at registration; accepted so option loops can pass it.
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &mut World, _: &Invocation) -> bool {
        true
    }

    fn registry_with_module() -> Registry {
        let mut r = Registry::new();
        r.register_module("testmod", None);
        r.register_command("testmod", "widget", nop, 1, 0, &[("oper_level", "800")]);
        r.register_command("testmod", "gadget", nop, 1, MODCMD_KEEP_BOUND, &[]);
        r.register_service("testserv", "TestBot", Some('!'), false);
        r
    }

    #[test]
    fn effective_flags_derivation() {
        let rules = Rules {
            min_opserv_level: 100,
            ..Default::default()
        };
        let flags = effective_flags(&rules, 0);
        assert!(flags & MODCMD_REQUIRE_OPER != 0);
        assert!(flags & MODCMD_REQUIRE_AUTHED != 0);

        let rules = Rules {
            min_channel_access: 200,
            ..Default::default()
        };
        let flags = effective_flags(&rules, 0);
        assert!(flags & MODCMD_REQUIRE_CHANUSER != 0);
        assert!(flags & MODCMD_REQUIRE_REGCHAN != 0);
        assert!(flags & MODCMD_REQUIRE_CHANNEL != 0);
    }

    #[test]
    fn effective_flags_superset_of_flags() {
        let rules = Rules {
            flags: MODCMD_TOY | MODCMD_REQUIRE_HELPING,
            ..Default::default()
        };
        let eff = effective_flags(&rules, MODCMD_NO_LOG);
        assert_eq!(eff & rules.flags, rules.flags);
        assert!(eff & MODCMD_NO_LOG != 0);
    }

    #[test]
    fn binding_copies_defaults_and_counts() {
        let mut r = registry_with_module();
        r.bind("testserv", "testmod", "widget", "widget").unwrap();
        let svc = r.service("testserv").unwrap();
        let cmd = svc.commands.get("widget").unwrap();
        assert_eq!(cmd.rules.min_opserv_level, 800);
        assert!(cmd.effective_flags & MODCMD_REQUIRE_OPER != 0);
        assert_eq!(r.modcmd("testmod", "widget").unwrap().bind_count, 1);

        assert!(matches!(
            r.bind("testserv", "testmod", "widget", "widget"),
            Err(BindError::AlreadyBound(_, _))
        ));
    }

    #[test]
    fn unbind_respects_keep_bound() {
        let mut r = registry_with_module();
        r.bind("testserv", "testmod", "gadget", "gadget").unwrap();
        assert!(matches!(
            r.unbind("testserv", "gadget"),
            Err(BindError::KeepBound(_))
        ));
        // A second binding makes the first removable.
        r.bind("testserv", "testmod", "gadget", "gadget2").unwrap();
        r.unbind("testserv", "gadget").unwrap();
        assert_eq!(r.modcmd("testmod", "gadget").unwrap().bind_count, 1);
    }

    #[test]
    fn templates_union_rules() {
        let mut r = registry_with_module();
        r.bind("testserv", "testmod", "widget", "widget").unwrap();
        r.bind("testserv", "testmod", "gadget", "gadget").unwrap();
        r.service_mut("testserv")
            .unwrap()
            .commands
            .get_mut("gadget")
            .unwrap()
            .template = Some("widget".to_string());
        r.resolve_templates();
        let cmd = r.service("testserv").unwrap().commands.get("gadget").unwrap();
        assert_eq!(cmd.rules.min_opserv_level, 800);
        assert!(cmd.template.is_none());
    }

    #[test]
    fn module_default_binds_skip_marked_commands() {
        let mut r = registry_with_module();
        r.register_command("testmod", "hidden", nop, 1, MODCMD_NO_DEFAULT_BIND, &[]);
        let bound = r.bind_module("testserv", "testmod").unwrap();
        assert_eq!(bound, 2);
        assert!(!r.service("testserv").unwrap().commands.contains("hidden"));
    }

    #[test]
    fn star_references_resolve_to_module_defaults() {
        let r = {
            let mut r = registry_with_module();
            r.bind("testserv", "testmod", "widget", "renamed").unwrap();
            r
        };
        let (module, command, rules) =
            r.resolve_command_ref("testserv", "*testmod.widget").unwrap();
        assert_eq!((module.as_str(), command.as_str()), ("testmod", "widget"));
        assert_eq!(rules.min_opserv_level, 800);

        let (_, command, _) = r.resolve_command_ref("testserv", "renamed").unwrap();
        assert_eq!(command, "widget");
    }
}
