//! Mount the Open Build Service as a filesystem.
use std::path::PathBuf;

use clap::Parser;
use secrecy::SecretString;
use tracing::{debug, error};

mod app_config;
mod daemon;
mod trc;

use crate::app_config::Config;
use crate::trc::Trc;

#[derive(Parser)]
#[command(
    version,
    about = "Browse projects, packages, sources and build results of an Open Build Service \
             instance as files."
)]
struct Args {
    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to an obs-fs config TOML."
    )]
    config_path: Option<PathBuf>,

    /// Stay in the foreground instead of daemonizing.
    #[arg(short, long)]
    foreground: bool,

    /// Base URL of the OBS API.
    #[arg(long, env = "OBS_API_URL")]
    api_url: Option<String>,

    /// List `home:` projects.
    #[arg(long)]
    homes: bool,

    /// List `:Maintenance:` projects.
    #[arg(long)]
    maintenance: bool,

    /// List PTF projects.
    #[arg(long)]
    ptf: bool,

    /// Seconds before cached listings and content are fetched again. 0 disables caching.
    #[arg(long, value_name = "SECS")]
    cache_time: Option<u64>,

    /// OBS account name.
    #[arg(long, env = "OBS_USER")]
    user: Option<String>,

    /// OBS account password.
    #[arg(long, env = "OBS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Where to mount the filesystem.
    mount_point: Option<PathBuf>,
}

impl Args {
    /// Flags win over the configuration file.
    fn apply(self, config: &mut Config) {
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
        config.projects.include_homes |= self.homes;
        config.projects.include_maintenance |= self.maintenance;
        config.projects.include_ptf |= self.ptf;
        if let Some(secs) = self.cache_time {
            config.cache.ttl_secs = secs;
        }
        if let Some(user) = self.user {
            config.credentials.user = Some(user);
        }
        if let Some(password) = self.password {
            config.credentials.password = Some(SecretString::from(password));
        }
        if let Some(mount_point) = self.mount_point {
            config.mount_point = mount_point;
        }
    }
}

fn detach(config: &Config) -> Result<(), String> {
    let pid_file_parent = config
        .daemon
        .pid_file
        .parent()
        .ok_or_else(|| "PID file path has no parent directory".to_owned())?;
    std::fs::create_dir_all(pid_file_parent)
        .map_err(|e| format!("Failed to create PID file directory: {e}"))?;

    let mut daemonize = daemonize::Daemonize::new()
        .pid_file(&config.daemon.pid_file)
        .chown_pid_file(true)
        .user(config.uid)
        .group(config.gid);

    if let Some(path) = &config.daemon.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open log file: {e}"))?;
        let clone = file
            .try_clone()
            .map_err(|e| format!("Failed to clone log file handle: {e}"))?;
        daemonize = daemonize.stdout(file).stderr(clone);
    }

    daemonize
        .start()
        .map_err(|e| format!("Failed to spawn the daemon: {e}"))
}

/// Main entry point for the application.
fn main() {
    let args = Args::parse();

    // Errors use eprintln since tracing isn't initialized yet.
    let mut config = Config::load_or_default(args.config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });
    let foreground = args.foreground;
    args.apply(&mut config);
    if let Err(error_messages) = config.validate() {
        eprintln!("Configuration is invalid.");
        for msg in &error_messages {
            eprintln!(" - {msg}");
        }
        std::process::exit(1);
    }

    let trc = if foreground {
        Trc::default()
    } else {
        Trc::default().daemonized()
    };
    trc.init().unwrap_or_else(|e| {
        eprintln!(
            "Failed to initialize logging. Without logging, we can't provide any useful error \
             messages, so we have to exit: {e}"
        );
        std::process::exit(1);
    });

    if let Err(e) = daemon::preflight(&config) {
        error!("{e}");
        std::process::exit(1);
    }

    if !foreground {
        debug!(config = ?config, "Initializing daemon with configuration...");
        if let Err(e) = detach(&config) {
            error!("{e}");
            std::process::exit(1);
        }
    }

    if let Err(e) = daemon::spawn(config, foreground) {
        error!("Daemon failed: {e}");
        std::process::exit(1);
    }
}
