use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use poem::middleware::NormalizePath;
use poem::{get, Endpoint, EndpointExt, Route, Server};
use version_presenter::{EnvSource, ProcessEnv, ResolvedVersion};

use crate::config::{Config, TLSConfig};
use crate::logging::LoggerMiddleware;
use crate::Flag;

mod health;
mod page;
mod version;

/// Everything a request handler needs to present the version
pub struct Presenter {
    pub config: Arc<Config>,
    /// Where version settings are read from on every request
    pub env: Arc<dyn EnvSource + Send + Sync>,
    pub running: Arc<Flag>,
}

impl Presenter {
    pub fn new(config: Arc<Config>, env: Arc<dyn EnvSource + Send + Sync>, running: Arc<Flag>) -> Self {
        Presenter { config, env, running }
    }

    /// Resolve the version from the current settings, nothing is cached between calls
    pub fn resolve(&self) -> ResolvedVersion {
        version_presenter::resolve(&self.env)
    }
}

pub fn api(presenter: Arc<Presenter>) -> impl Endpoint {
    Route::new()
    .at("/", get(page::index))
    .at("/api/v1/version", get(version::current))
    .nest("/healthz", health::api())
    .data(presenter)
    .with(LoggerMiddleware)
    .with(NormalizePath::new(poem::middleware::TrailingSlash::Trim))
}

/// Write defaulted version values into the process environment when configured to
pub fn export_defaults(config: &Config) -> Option<ResolvedVersion> {
    if !config.presenter.export_defaults {
        return None
    }
    let resolved = version_presenter::apply_defaults(&mut ProcessEnv);
    info!("Exported version defaults: {} ({})", resolved.label, resolved.color);
    Some(resolved)
}

pub async fn main(config: Arc<Config>) -> Result<()> {
    // Bind the HTTP interface
    let bind_address = crate::config::load_bind_address()?;
    let tls_config = TLSConfig::load().await?;
    if tls_config.is_none() {
        warn!("No TLS certificate configured, serving plain HTTP");
    }
    let listener = crate::http::create_binding(bind_address, tls_config);

    // Nothing else is running yet, so this is the one point the process environment can be written
    export_defaults(&config);

    let running = Arc::new(Flag::new(true));
    tokio::spawn(crate::watch_signals(running.clone()));

    // Build the interface
    let presenter = Arc::new(Presenter::new(config, Arc::new(ProcessEnv), running.clone()));
    let app = api(presenter);

    // launch the interface
    info!("Serving version page on {bind_address}");
    Server::new(listener)
        .run_with_graceful_shutdown(app, running.wait_for(false), None)
        .await.context("Error in server runtime.")?;
    info!("HTTP interface stopped");
    Ok(())
}
