//! Telegram CI Upload Library
//!
//! This library provides tools to:
//! - Load build metadata from the CI environment
//! - Render the build caption with a bare-link fallback
//! - Upload build artifacts to a Telegram chat or topic as one album

pub mod caption;
pub mod config;
pub mod error;
pub mod session;
pub mod upload;

// Re-export common types
pub use caption::{build_caption, caption_list};
pub use config::{ApiCredentials, BuildContext, ChatTarget};
pub use error::{Error, Result};
pub use session::{SessionFile, SessionSource, SessionStore, TelegramClient};
pub use upload::{upload, UploadRequest};
