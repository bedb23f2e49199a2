use std::path::PathBuf;

use poem::http::StatusCode;


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read configuration file {path:?}: {source}")]
    ConfigRead { path: PathBuf, source: std::io::Error },

    #[error(transparent)]
    ConfigTemplate(#[from] environment_template::EnvError),

    #[error("Could not parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Could not parse {0} environment variable")]
    NotUnicode(String),

    #[error("Invalid bind address: {0}")]
    BindAddress(#[from] std::net::AddrParseError),

    #[error("Initialization error, found {found} but no {missing}")]
    PartialTls { found: &'static str, missing: &'static str },

    #[error("Could not read {path:?}: {source}")]
    TlsRead { path: PathBuf, source: std::io::Error },

    #[error("Could not render page: {0}")]
    Render(#[from] askama::Error),
}

impl poem::error::ResponseError for Error {
    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub type Result<T> = std::result::Result<T, Error>;
