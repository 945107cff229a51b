use thiserror::Error;

#[derive(Error, Debug)]
pub enum TermlinkError {
    #[error("no glossary provider registered; cannot rewrite document {0:?}")]
    MissingGlossaryProvider(Option<String>),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TermlinkError>;

impl From<anyhow::Error> for TermlinkError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
