use std::path::PathBuf;

use xtrap_instrument::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot read unit `{}`: {source}", path.display())]
    ReadUnit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed unit `{}`: {source}", path.display())]
    ParseUnit {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Usage(String),
}
