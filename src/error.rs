use thiserror::Error;

#[derive(Debug, Error)]
pub enum StylerError {
    /// Connection or model settings are incomplete; raised before any network call.
    #[error("{0}")]
    Config(String),

    #[error("failed to load verses: {0}")]
    Load(String),

    #[error("Filter removed all verses.")]
    FilterExhausted,

    /// The caller asked for something the loaded data cannot satisfy.
    #[error("{0}")]
    Selection(String),

    #[error("{message}")]
    Gateway {
        status: Option<u16>,
        message: String,
    },
}

impl StylerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn selection(msg: impl Into<String>) -> Self {
        Self::Selection(msg.into())
    }

    pub fn gateway(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Gateway {
            status,
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StylerError>;
