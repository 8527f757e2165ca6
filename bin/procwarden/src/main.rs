//! procwarden - run a long-lived server under supervision
//!
//! Starts the configured server, streams its classified log output to the
//! terminal, relays Enter when the server waits for it, and stops the server
//! cleanly on Ctrl+C.

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use procwarden::config::{Config, ConfigLoader, LoadOptions};
use procwarden::error::Result;
use procwarden::models::{LogNotification, NotificationKind};
use procwarden::reload::ReloadWatcher;
use procwarden::supervisor::ALL_TAG;
use procwarden::ServerBridge;

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Settings file path
    settings_path: Option<PathBuf>,
    /// Only print lines containing this tag
    filter: Option<String>,
    /// Restart the server when files under this directory change
    watch_dir: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    /// Server command and arguments given after `--`
    command: Vec<String>,
}

impl AppArgs {
    /// Parse command line arguments
    fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1).collect())
    }

    fn parse_from(args: Vec<String>) -> Result<Self> {
        let mut app_args = AppArgs::default();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    app_args.config_path = Some(PathBuf::from(Self::value(&args, i, "config file path")?));
                    i += 1;
                }
                "--settings" | "-s" => {
                    app_args.settings_path = Some(PathBuf::from(Self::value(&args, i, "settings file path")?));
                    i += 1;
                }
                "--filter" | "-f" => {
                    app_args.filter = Some(Self::value(&args, i, "filter tag")?.to_string());
                    i += 1;
                }
                "--watch" | "-w" => {
                    app_args.watch_dir = Some(PathBuf::from(Self::value(&args, i, "watch directory")?));
                    i += 1;
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--help" | "-?" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-v" => {
                    println!("procwarden v{}", procwarden::VERSION);
                    process::exit(0);
                }
                "--" => {
                    app_args.command = args[i + 1..].to_vec();
                    break;
                }
                arg if arg.starts_with('-') => {
                    return Err(format!("Unknown option: {}", arg).into());
                }
                arg => {
                    return Err(format!("Unexpected argument: {} (put the server command after --)", arg).into());
                }
            }
            i += 1;
        }

        Ok(app_args)
    }

    fn value<'a>(args: &'a [String], i: usize, what: &str) -> Result<&'a str> {
        args.get(i + 1)
            .map(String::as_str)
            .ok_or_else(|| format!("Missing {}", what).into())
    }

    fn debug_requested(&self) -> bool {
        self.debug
            || env::var("PROCWARDEN_DEBUG")
                .map_or(false, |v| v == "1" || v.to_lowercase() == "true")
    }
}

/// Print help information
fn print_help() {
    println!("procwarden - supervise a long-running server and stream its logs");
    println!();
    println!("USAGE:");
    println!("    procwarden [OPTIONS] [-- COMMAND [ARGS...]]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>      Path to configuration file");
    println!("    -s, --settings <PATH>    Path to the JSON settings passed as environment");
    println!("    -f, --filter <TAG>       Only show lines containing TAG (\"all\" shows everything)");
    println!("    -w, --watch <DIR>        Restart the server when files in DIR change");
    println!("    -d, --debug              Enable debug logging");
    println!("    -?, --help               Print this help message");
    println!("    -v, --version            Print version information");
    println!();
    println!("INPUT:");
    println!("    Press Enter to continue when the server waits for input.");
    println!("    Press Ctrl+C to stop the server and exit.");
    println!();
    println!("CONFIGURATION:");
    println!("    procwarden looks for configuration files in the following order:");
    println!("    1. Path specified with --config");
    println!("    2. $PROCWARDEN_CONFIG");
    println!("    3. <config dir>/procwarden/config.toml");
    println!("    4. ~/.procwarden/config.toml");
    println!("    5. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    PROCWARDEN_CONFIG      Path to configuration file");
    println!("    PROCWARDEN_DEBUG       Enable debug mode (1 or true)");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

fn init_logging(args: &AppArgs) {
    let log_level = if args.debug_requested() { "debug" } else { "info" };

    // Server output owns stdout; diagnostics go to stderr
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Load configuration and apply command line overrides
fn load_configuration(args: &AppArgs) -> anyhow::Result<Config> {
    let mut loader = match &args.config_path {
        Some(path) => {
            debug!("Loading config from: {}", path.display());
            let mut loader = ConfigLoader::new();
            loader.set_search_path(path.clone());
            loader
        }
        None => ConfigLoader::new(),
    };

    let mut config = loader
        .load_with_options(LoadOptions {
            create_default: args.config_path.is_none(),
            validate: false,
        })
        .context("Failed to load configuration")?;

    if let Some((command, rest)) = args.command.split_first() {
        config.server.command = command.clone();
        config.server.args = rest.to_vec();
    }
    if let Some(path) = &args.settings_path {
        config.settings_path = Some(path.clone());
    }
    if let Some(dir) = &args.watch_dir {
        config.reload.enabled = true;
        config.reload.watch_dir = dir.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn format_notification(notification: &LogNotification) -> String {
    match notification.kind {
        NotificationKind::Stdout => notification.message.clone(),
        NotificationKind::Stderr => format!("[stderr] {}", notification.message),
        NotificationKind::Info => format!("[info] {}", notification.message),
        NotificationKind::Warning => format!("[warning] {}", notification.message),
        NotificationKind::Error => format!("[error] {}", notification.message),
    }
}

fn print_notification(notification: &LogNotification, filter: &str) {
    if filter == ALL_TAG || notification.message.contains(filter) {
        println!("{}", format_notification(notification));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("Failed to parse arguments: {}", e);
        print_help();
        process::exit(1);
    });

    init_logging(&args);
    info!("Starting procwarden v{}", procwarden::VERSION);

    let config = match load_configuration(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    };
    let filter = args.filter.clone().unwrap_or_else(|| ALL_TAG.to_string());

    let bridge = Arc::new(ServerBridge::from_config(&config));
    let mut notifications = bridge.subscribe();

    let started = bridge.start_server().await;
    if !started.success {
        while let Some(notification) = notifications.try_recv() {
            print_notification(&notification, &filter);
        }
        error!(
            "Failed to start server: {}",
            started.message.unwrap_or_default()
        );
        process::exit(1);
    }

    let reload_watcher = if config.reload.enabled {
        match ReloadWatcher::spawn(Arc::clone(&bridge), config.reload.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Hot reload disabled: {}", e);
                None
            }
        }
    } else {
        None
    };
    let keep_alive = reload_watcher.is_some();

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let exit = bridge.wait_for_exit();
    tokio::pin!(exit);
    let mut exit_armed = true;

    loop {
        tokio::select! {
            notification = notifications.recv() => {
                let Some(notification) = notification else { break };
                print_notification(&notification, &filter);
                if !exit_armed && bridge.get_server_status().running {
                    exit.set(bridge.wait_for_exit());
                    exit_armed = true;
                }
            }
            line = stdin_lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(text)) => {
                        let result = bridge.send_input(&text).await;
                        if let Some(err) = result.error {
                            eprintln!("{}", err);
                        }
                    }
                    Ok(None) => {
                        debug!("Standard input closed");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("Failed to read standard input: {}", e);
                        stdin_open = false;
                    }
                }
            }
            summary = &mut exit, if exit_armed => {
                exit_armed = false;
                let unexpected = summary.map_or(false, |s| !s.requested);
                if unexpected && !keep_alive {
                    while let Some(notification) = notifications.try_recv() {
                        print_notification(&notification, &filter);
                    }
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping server");
                let stopped = bridge.stop_server().await;
                while let Some(notification) = notifications.try_recv() {
                    print_notification(&notification, &filter);
                }
                if let Some(message) = stopped.message.filter(|_| !stopped.success) {
                    error!("{}", message);
                }
                break;
            }
        }
    }

    info!("procwarden shutdown complete");
    Ok(())
}
