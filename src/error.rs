//! Error types for the CI uploader

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid {0}")]
    InvalidVariable(String),

    #[error("No files to upload")]
    NoFiles,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    ConfigFile(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Bot authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Errors detected before any network activity.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidVariable(_)
                | Error::NoFiles
                | Error::FileNotFound(_)
                | Error::ConfigFile(_)
                | Error::SessionError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ConfigFile(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::SessionError(format!("SESSION_STRING is not valid base64: {}", err))
    }
}
