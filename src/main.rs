//! srvxd - services daemon entry point.
//!
//! Process lifecycle only: command line, configuration check, pid file,
//! runtime selection and the hand-off into the event loop. Everything
//! interesting lives in the library crate.

use clap::Parser;
use srvx_ng::conf::Config;
use srvx_ng::reactor::{self, replay::Replay, uplink::Uplink, ExitHooks, Ingress};
use srvx_ng::state::World;
use tracing::{error, info, warn};

const PID_FILE: &str = "srvx.pid";

#[derive(Parser)]
#[command(name = "srvxd", about = "Modular IRC services daemon", disable_version_flag = true)]
struct Cli {
    /// Configuration file.
    #[arg(short = 'c', long = "config", value_name = "CONFIG", default_value = "srvx.conf")]
    config: String,

    /// Enable debug logging.
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Stay in the foreground (supervision is expected to come from the
    /// service manager either way).
    #[arg(short = 'f', long = "foreground")]
    foreground: bool,

    /// Check the configuration and exit.
    #[arg(short = 'k', long = "check")]
    check: bool,

    /// Replay a recorded event log instead of connecting.
    #[arg(short = 'r', long = "replay", value_name = "FILE")]
    replay: Option<String>,

    /// Print version and license information.
    #[arg(short = 'v', long = "version")]
    version: bool,
}

fn wall_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    if cli.version {
        println!("srvxd {} - modular IRC services daemon", env!("CARGO_PKG_VERSION"));
        println!("Distributed under the GNU General Public License, version 2 or later.");
        return 0;
    }

    let default_filter = if cli.debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let conf = match Config::load(&cli.config) {
        Ok(conf) => conf,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return 1;
        }
    };
    let problems = conf.validate();
    if cli.check {
        for problem in &problems {
            error!(problem = %problem, "Configuration check");
        }
        if problems.is_empty() {
            info!(config = %cli.config, "Configuration OK");
            return 0;
        }
        return 3;
    }
    if !problems.is_empty() {
        for problem in &problems {
            error!(problem = %problem, "Configuration validation failed");
        }
        return 1;
    }

    if conf.rlimits.data.is_some() || conf.rlimits.stack.is_some() || conf.rlimits.vmem.is_some() {
        // Resource limits are applied by the supervisor; this build
        // forbids the unsafe surface setrlimit needs.
        info!(
            data = ?conf.rlimits.data,
            stack = ?conf.rlimits.stack,
            vmem = ?conf.rlimits.vmem,
            "Resource limits requested; expecting the supervisor to apply them"
        );
    }
    if !cli.foreground && cli.replay.is_none() {
        info!("Running in the foreground; background the process via the supervisor");
    }

    // The core is strictly single-threaded; every handler runs on this
    // one loop thread.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return 1;
        }
    };

    let replaying = cli.replay.is_some();
    let start_now = if replaying { 0 } else { wall_now() };
    let mut world = World::boot(conf, start_now);

    let mut exit_hooks = ExitHooks::new();
    if !replaying {
        match std::fs::write(PID_FILE, format!("{}\n", std::process::id())) {
            Ok(()) => exit_hooks.register(|_| {
                let _ = std::fs::remove_file(PID_FILE);
            }),
            Err(e) => warn!(error = %e, "Unable to write pid file"),
        }
    }

    let result = runtime.block_on(async {
        let mut ingress: Box<dyn Ingress> = match cli.replay {
            Some(ref path) => match Replay::open(path) {
                Ok(replay) => Box::new(replay),
                Err(e) => {
                    error!(file = %path, error = %e, "Cannot open replay log");
                    return 2;
                }
            },
            None => {
                let mut uplink = Uplink::new(&world.conf);
                if let Err(e) = uplink.connect().await {
                    error!(error = %e, "No uplink available");
                    return 1;
                }
                Box::new(uplink)
            }
        };
        match reactor::run(&mut world, ingress.as_mut(), !replaying, &cli.config, exit_hooks).await
        {
            Ok(()) => 0,
            Err(e) => {
                error!(error = %e, "Event loop failed");
                if replaying { 2 } else { 1 }
            }
        }
    });
    info!("srvxd exiting");
    result
}
