use std::collections::HashMap;
use std::ffi::OsString;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::{Error, Result};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_VARIABLE: &str = "VERSION_PRESENTER_CONFIG_PATH";
/// Configuration file used when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/version-presenter/config.yml";


#[derive(Debug, strum::Display, SerializeDisplay, strum::EnumString, DeserializeFromStr, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all="UPPERCASE", ascii_case_insensitive)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Disabled,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all="lowercase")]
pub enum SyslogTransport {
    Udp,
    Tcp
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// What level of logging should we have?
    pub log_level: LogLevel,
    /// Should we log to console?
    pub log_to_console: bool,
    /// Should we log to files on the server?
    pub log_to_file: bool,
    /// If `log_to_file: true`, what is the directory to store logs?
    pub log_directory: PathBuf,
    /// Should logs be sent to a syslog server?
    pub log_to_syslog: bool,
    /// If `log_to_syslog: true`, provide hostname/IP of the syslog server?
    pub syslog_host: String,
    /// If `log_to_syslog: true`, provide port of the syslog server?
    pub syslog_port: u16,
    /// If `log_to_syslog: true`, provide transport for syslog server?
    pub syslog_transport: SyslogTransport,
    /// Log in JSON format?
    pub log_as_json: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            log_directory: "/var/log/version-presenter/".into(),
            log_as_json: true,
            log_level: LogLevel::Info,
            log_to_console: true,
            log_to_file: false,
            log_to_syslog: false,
            syslog_host: "localhost".to_owned(),
            syslog_port: 514,
            syslog_transport: SyslogTransport::Tcp,
        }
    }
}

/// Settings for the rendered version page
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UI {
    /// Title of the html page
    pub title: String,
    /// Have browsers reload the page on this interval
    pub refresh_seconds: Option<u32>,
}

impl Default for UI {
    fn default() -> Self {
        Self {
            title: "Application Version".to_owned(),
            refresh_seconds: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Presenter {
    /// Write defaulted version values into the process environment at startup
    pub export_defaults: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: Logging,
    pub ui: UI,
    pub presenter: Presenter,
}


/// Load the configuration file, applying environment variable substitution.
///
/// Without an explicit path `VERSION_PRESENTER_CONFIG_PATH` is used, and
/// failing that the default path. Only the default path may be missing, in
/// which case the built in defaults are used.
pub async fn load_configuration(path: Option<PathBuf>) -> Result<Arc<Config>> {
    // figure out which file path to use
    let (path, explicit) = match path {
        Some(path) => (path, true),
        None => match std::env::var(CONFIG_PATH_VARIABLE) {
            Ok(path) => (PathBuf::from(path), true),
            Err(std::env::VarError::NotPresent) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
            Err(std::env::VarError::NotUnicode(_)) => return Err(Error::NotUnicode(CONFIG_PATH_VARIABLE.to_owned())),
        }
    };

    let body = match tokio::fs::read_to_string(&path).await {
        Ok(body) => body,
        Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Arc::new(Config::default()))
        },
        Err(source) => return Err(Error::ConfigRead { path, source }),
    };

    // load environment variables into config
    let variables = environment_variables(std::env::vars_os());
    let body = environment_template::apply_variables(&body, &variables)?;

    // parse the configuration
    Ok(Arc::new(parse_configuration(&body)?))
}

/// Collect variables for substitution, skipping any that aren't valid unicode
fn environment_variables(vars: impl Iterator<Item=(OsString, OsString)>) -> HashMap<String, String> {
    let mut output = HashMap::new();
    for (name, value) in vars {
        match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => { output.insert(name, value); },
            (Ok(name), Err(_)) => warn!("Environment variable {name} is not valid unicode, it can't be used in the configuration"),
            (Err(name), _) => warn!("Environment variable {} has a name that is not valid unicode, it can't be used in the configuration", name.to_string_lossy()),
        }
    }
    output
}

fn parse_configuration(body: &str) -> Result<Config> {
    // an empty document is null to yaml, treat it like an empty mapping
    if body.trim().is_empty() {
        return Ok(Config::default())
    }
    Ok(serde_yaml::from_str(body)?)
}


/// Information server can use to configure its tls binding
#[derive(Debug, Clone)]
pub struct TLSConfig {
    /// Private key for the server certificate
    pub key_pem: String,
    /// TLS certificate for the server to use
    pub certificate_pem: String
}

impl TLSConfig {
    /// Load the TLS information that should be used to serve content
    pub async fn load() -> Result<Option<Self>> {
        let server_key = load_file("SERVER_KEY", "SERVER_KEY_PATH", "/etc/ssl/key.pem").await?;
        let server_cert = load_file("SERVER_CERT", "SERVER_CERT_PATH", "/etc/ssl/cert.pem").await?;
        Self::from_parts(server_key, server_cert)
    }

    fn from_parts(key: Option<String>, cert: Option<String>) -> Result<Option<Self>> {
        match (key, cert) {
            (Some(key_pem), Some(certificate_pem)) => Ok(Some(TLSConfig { key_pem, certificate_pem })),
            (None, Some(_)) => Err(Error::PartialTls { found: "certificate", missing: "key" }),
            (Some(_), None) => Err(Error::PartialTls { found: "key", missing: "certificate" }),
            (None, None) => Ok(None),
        }
    }
}

async fn load_file(direct_key: &str, path_key: &str, default_path: &str) -> Result<Option<String>> {
    // Try to load the certificates directly from env variables
    match std::env::var(direct_key) {
        Ok(key) => return Ok(Some(key)),
        Err(std::env::VarError::NotPresent) => {},
        Err(std::env::VarError::NotUnicode(_)) => return Err(Error::NotUnicode(direct_key.to_owned())),
    }

    // See if there are env variables defining a path to load certificates from
    let (path, explicit) = match std::env::var(path_key) {
        Ok(path) => (PathBuf::from(path), true),
        Err(std::env::VarError::NotPresent) => (PathBuf::from(default_path), false),
        Err(std::env::VarError::NotUnicode(_)) => return Err(Error::NotUnicode(path_key.to_owned())),
    };

    read_optional(&path, explicit).await
}

async fn read_optional(path: &Path, explicit: bool) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(body) => Ok(Some(body)),
        Err(err) if !explicit && err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::TlsRead { path: path.to_owned(), source }),
    }
}

/// Load the address the server should bind to
pub fn load_bind_address() -> Result<SocketAddr> {
    bind_address_from(std::env::var("BIND_ADDRESS"))
}

fn bind_address_from(value: std::result::Result<String, std::env::VarError>) -> Result<SocketAddr> {
    match value {
        Ok(address) => Ok(address.parse()?),
        Err(std::env::VarError::NotPresent) => Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080))),
        Err(std::env::VarError::NotUnicode(_)) => {
            warn!("BIND_ADDRESS is not valid unicode");
            Err(Error::NotUnicode("BIND_ADDRESS".to_owned()))
        }
    }
}
