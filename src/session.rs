//! Session management for the Telegram client
//!
//! Provides:
//! - Session material from `SESSION_STRING` or an in-memory session
//! - Client creation with a guaranteed disconnect

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use grammers_client::Client;
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::{MemorySession, SqliteSession};
use grammers_session::Session;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::BuildContext;
use crate::error::{Error, Result};

/// File name of the session database inside its scratch directory
pub const SESSION_FILE_NAME: &str = "bot.session";

/// Where the session comes from
#[derive(Clone, PartialEq, Eq)]
pub enum SessionSource {
    /// Base64 of a session database from an earlier run
    Encoded(String),
    /// Fresh session, kept in memory and lost at the end of the run
    Ephemeral,
}

impl std::fmt::Debug for SessionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionSource::Encoded(_) => f.write_str("Encoded(<redacted>)"),
            SessionSource::Ephemeral => f.write_str("Ephemeral"),
        }
    }
}

impl SessionSource {
    pub fn from_context(ctx: &BuildContext) -> Self {
        match ctx.session_string.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => SessionSource::Encoded(encoded.to_string()),
            _ => SessionSource::Ephemeral,
        }
    }
}

/// Session database living in a private scratch directory.
///
/// The directory, and with it the decoded session, is removed on drop.
pub struct SessionFile {
    dir: TempDir,
}

impl SessionFile {
    /// Write the session material to disk.
    pub fn materialize(source: &SessionSource) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("telegram-ci-session")
            .tempdir()
            .map_err(|e| Error::SessionError(format!("Failed to create session dir: {}", e)))?;
        let path = dir.path().join(SESSION_FILE_NAME);

        if let SessionSource::Encoded(encoded) = source {
            let bytes = STANDARD.decode(encoded.as_bytes())?;
            if bytes.is_empty() {
                return Err(Error::SessionError("SESSION_STRING decodes to nothing".into()));
            }
            fs::write(&path, bytes)?;
            debug!(path = %path.display(), "restored session from SESSION_STRING");
        } else {
            debug!(path = %path.display(), "creating session database");
        }

        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join(SESSION_FILE_NAME)
    }

    #[cfg(test)]
    fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Open the session database, creating it if needed.
    pub fn open(&self) -> Result<Arc<SqliteSession>> {
        let session_file = self.path().to_string_lossy().into_owned();
        let session = SqliteSession::open(&session_file)
            .map_err(|e| Error::SessionError(format!("Failed to open session: {}", e)))?;
        Ok(Arc::new(session))
    }

    /// Encode the session database for reuse through `SESSION_STRING`.
    pub fn export(&self) -> Result<String> {
        let bytes = fs::read(self.path())?;
        Ok(STANDARD.encode(bytes))
    }
}

/// Session storage for one run
pub enum SessionStore {
    /// Nothing is written to disk
    Memory,
    /// Session database in a scratch directory
    File(SessionFile),
}

impl SessionStore {
    /// An ephemeral source stays in memory unless `persist` asks for a
    /// database that can be exported after the run.
    pub fn prepare(source: &SessionSource, persist: bool) -> Result<Self> {
        match source {
            SessionSource::Ephemeral if !persist => {
                debug!("using in-memory session");
                Ok(SessionStore::Memory)
            }
            source => Ok(SessionStore::File(SessionFile::materialize(source)?)),
        }
    }

    pub async fn connect(&self, api_id: i32) -> Result<TelegramClient> {
        match self {
            SessionStore::Memory => {
                TelegramClient::connect(Arc::new(MemorySession::default()), api_id).await
            }
            SessionStore::File(file) => TelegramClient::connect(file.open()?, api_id).await,
        }
    }

    /// Encode the session for reuse through `SESSION_STRING`.
    pub fn export(&self) -> Result<String> {
        match self {
            SessionStore::Memory => Err(Error::SessionError(
                "In-memory session cannot be exported".into(),
            )),
            SessionStore::File(file) => file.export(),
        }
    }
}

/// Connected client plus the background runner driving its connections
pub struct TelegramClient {
    client: Client,
    handle: SenderPoolHandle,
    runner: Option<JoinHandle<()>>,
}

impl TelegramClient {
    /// Create a new TelegramClient from session
    pub async fn connect<S: Session + 'static>(session: Arc<S>, api_id: i32) -> Result<Self> {
        let pool = SenderPool::new(session, api_id);

        // Create client from pool (need reference to whole pool)
        let client = Client::new(&pool);

        // Updates are never consumed, only the handle and the runner are kept
        let SenderPool { runner, handle, .. } = pool;

        let runner = tokio::spawn(async move {
            runner.run().await;
        });

        debug!(api_id, "sender pool started");
        Ok(Self {
            client,
            handle,
            runner: Some(runner),
        })
    }

    /// Close all connections and wait for the runner to stop.
    pub async fn disconnect(mut self) {
        let _ = self.handle.quit();
        if let Some(runner) = self.runner.take() {
            if let Err(e) = runner.await {
                warn!("sender pool runner ended abnormally: {}", e);
            }
        }
        debug!("disconnected from Telegram");
    }
}

impl Drop for TelegramClient {
    fn drop(&mut self) {
        if let Some(runner) = self.runner.take() {
            warn!("client dropped without disconnect, aborting sender pool");
            runner.abort();
        }
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
