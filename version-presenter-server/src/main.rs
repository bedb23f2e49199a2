//! Entrypoint for the version presenter, serving the version page or resolving it once

#![warn(missing_docs, non_ascii_idents, trivial_numeric_casts,
    unused_crate_dependencies, noop_method_call, single_use_lifetimes, trivial_casts,
    unused_lifetimes, nonstandard_style, variant_size_differences)]
#![deny(keyword_idents)]
#![allow(clippy::needless_return)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};
use version_presenter::{ProcessEnv, ResolvedVersion, COLOR_VARIABLE, VERSION_VARIABLE};

use crate::config::load_configuration;
use crate::logging::configure_logging;

mod config;
mod error;
mod http;
mod logging;
mod web;


#[derive(Debug, Parser)]
#[command(name="version-presenter")]
#[command(bin_name="version-presenter")]
struct Args {
    /// Configuration file, overrides VERSION_PRESENTER_CONFIG_PATH
    config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the version page and api
    Serve {

    },
    /// Resolve the version once and print it
    Resolve {
        /// Print the resolved version as json
        #[arg(long)]
        json: bool,
        /// Write defaults into the environment first and print shell export lines
        #[arg(long)]
        export: bool,
    },
}


#[tokio::main]
async fn main() -> ExitCode {
    // Load CLI
    let args = Args::parse();

    match args.command {
        // no logger here, stdout carries the result
        Commands::Resolve { json, export } => match resolve_once(json, export) {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            },
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        },
        Commands::Serve {  } => {
            // Load configuration
            let config = match load_configuration(args.config).await {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("Could not load configuration: {err}");
                    return ExitCode::FAILURE;
                }
            };

            // configure logging, the object returned here owns the log processing internals
            // and needs to be held until the program ends
            let _log_manager = match configure_logging(&config.logging) {
                Ok(manager) => manager,
                Err(err) => {
                    eprintln!("Could not configure logging: {err}");
                    return ExitCode::FAILURE;
                }
            };

            // log if the server failed
            match web::main(config).await {
                Ok(_) => ExitCode::SUCCESS,
                Err(err) => {
                    error!("{err:#}");
                    return ExitCode::FAILURE;
                },
            }
        },
    }
}

/// Resolve the version against the process environment and format it for printing
fn resolve_once(json: bool, export: bool) -> Result<String> {
    let resolved = if export {
        version_presenter::apply_defaults(&mut ProcessEnv)
    } else {
        version_presenter::resolve(&ProcessEnv)
    };

    if json {
        Ok(serde_json::to_string_pretty(&resolved)?)
    } else {
        format_shell(&resolved, export)
    }
}

/// Render the resolved version as `NAME=value` lines a shell can evaluate
fn format_shell(resolved: &ResolvedVersion, export: bool) -> Result<String> {
    let prefix = if export { "export " } else { "" };
    let label = shlex::try_quote(&resolved.label)?;
    let color = shlex::try_quote(&resolved.color)?;
    Ok(format!("{prefix}{VERSION_VARIABLE}={label}\n{prefix}{COLOR_VARIABLE}={color}"))
}

/// Stop the server once the process is asked to shut down
async fn watch_signals(running: Arc<Flag>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            },
            Err(err) => {
                error!("Could not listen for SIGTERM: {err}");
                _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested");
    running.set(false);
}

/// Shared boolean that tasks can wait on
pub struct Flag {
    condition: tokio::sync::watch::Sender<bool>,
}

impl Flag {
    pub fn new(value: bool) -> Self {
        Flag {
            condition: tokio::sync::watch::channel(value).0,
        }
    }

    pub fn read(&self) -> bool {
        *self.condition.borrow()
    }

    pub fn set(&self, value: bool) {
        self.condition.send_modify(|current| *current = value);
    }

    pub async fn wait_for(&self, value: bool) {
        let mut watcher = self.condition.subscribe();
        while *watcher.borrow_and_update() != value {
            _ = watcher.changed().await;
        }
    }
}


#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use clap::Parser;
    use version_presenter::{Origin, ResolvedVersion, COLOR_VARIABLE, VERSION_VARIABLE};

    use super::{format_shell, resolve_once, Args, Commands, Flag};
    use crate::config::Config;

    fn resolved(label: &str, color: &str) -> ResolvedVersion {
        ResolvedVersion {
            label: label.to_owned(),
            label_origin: Origin::Environment,
            color: color.to_owned(),
            color_origin: Origin::Default,
        }
    }

    #[test]
    fn shell_lines() {
        let output = format_shell(&resolved("Unknown Version", "orange"), false).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let label = lines[0].strip_prefix("APP_VERSION=").unwrap();
        assert_eq!(shlex::split(label).unwrap(), vec!["Unknown Version".to_owned()]);
        assert_eq!(lines[1], "APP_VERSION_COLOR=orange");

        let output = format_shell(&resolved("it's GREEN", "green"), false).unwrap();
        let label = output.lines().next().unwrap().strip_prefix("APP_VERSION=").unwrap();
        assert_eq!(shlex::split(label).unwrap(), vec!["it's GREEN".to_owned()]);

        assert_eq!(
            format_shell(&resolved("v2", "blue"), true).unwrap(),
            "export APP_VERSION=v2\nexport APP_VERSION_COLOR=blue"
        );
        assert!(format_shell(&resolved("bad\0label", "blue"), false).is_err());
    }

    #[test]
    fn arguments() {
        let args = Args::try_parse_from(["version-presenter", "serve"]).unwrap();
        assert!(args.config.is_none());
        assert!(matches!(args.command, Commands::Serve {}));

        let args = Args::try_parse_from(["version-presenter", "/tmp/config.yml", "resolve", "--json"]).unwrap();
        assert_eq!(args.config.unwrap().to_str().unwrap(), "/tmp/config.yml");
        assert!(matches!(args.command, Commands::Resolve { json: true, export: false }));

        assert!(Args::try_parse_from(["version-presenter"]).is_err());
    }

    #[tokio::test]
    async fn flag_wait() {
        let flag = Arc::new(Flag::new(true));
        assert!(flag.read());

        let waiter = tokio::spawn({
            let flag = flag.clone();
            async move { flag.wait_for(false).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        flag.set(false);
        tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
        assert!(!flag.read());
    }

    #[test]
    fn process_write_back() {
        // the only test in this crate that touches the version variables of the process
        std::env::remove_var(VERSION_VARIABLE);
        std::env::remove_var(COLOR_VARIABLE);

        // plain resolution leaves the environment alone
        let output = resolve_once(false, false).unwrap();
        assert!(output.ends_with("\nAPP_VERSION_COLOR=orange"));
        assert!(std::env::var(VERSION_VARIABLE).is_err());

        let output = resolve_once(false, true).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("export APP_VERSION="));
        assert_eq!(lines[1], "export APP_VERSION_COLOR=orange");
        assert_eq!(std::env::var(VERSION_VARIABLE).unwrap(), "Unknown Version");
        assert_eq!(std::env::var(COLOR_VARIABLE).unwrap(), "orange");

        // server startup export, off by default
        std::env::set_var(VERSION_VARIABLE, "7.0.0-GREEN");
        std::env::remove_var(COLOR_VARIABLE);
        let mut config = Config::default();
        assert!(crate::web::export_defaults(&config).is_none());
        assert!(std::env::var(COLOR_VARIABLE).is_err());

        config.presenter.export_defaults = true;
        let resolved = crate::web::export_defaults(&config).unwrap();
        assert_eq!(resolved.color, "green");
        assert_eq!(std::env::var(COLOR_VARIABLE).unwrap(), "green");

        let json: serde_json::Value = serde_json::from_str(&resolve_once(true, false).unwrap()).unwrap();
        assert_eq!(json["label"], "7.0.0-GREEN");
        assert_eq!(json["color_origin"], "environment");

        std::env::remove_var(VERSION_VARIABLE);
        std::env::remove_var(COLOR_VARIABLE);
    }
}
