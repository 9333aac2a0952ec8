//! Upload build artifacts to Telegram as one album

use std::path::{Path, PathBuf};

use grammers_client::types::InputMedia;
use grammers_session::defs::{PeerAuth, PeerId, PeerRef};
use tracing::{debug, info};

use crate::caption::{caption_list, with_hard_breaks};
use crate::config::{ApiCredentials, BuildContext, ChatTarget};
use crate::error::{Error, Result};
use crate::session::{SessionSource, SessionStore, TelegramClient};

/// Offset of channel ids in the Bot API encoding (`-100…`)
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// Files to send, each paired with its caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    files: Vec<PathBuf>,
    captions: Vec<String>,
}

impl UploadRequest {
    /// Requires at least one file, and every file must exist.
    pub fn new(files: Vec<PathBuf>, caption: &str) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::NoFiles);
        }
        if let Some(missing) = files.iter().find(|path| !path.is_file()) {
            return Err(Error::FileNotFound(missing.display().to_string()));
        }

        let captions = caption_list(files.len(), caption);
        Ok(Self { files, captions })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    /// Files with their captions, in upload order.
    pub fn items(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files
            .iter()
            .map(PathBuf::as_path)
            .zip(self.captions.iter().map(String::as_str))
    }
}

/// Peer kinds behind a Bot API style chat id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    User(i64),
    Chat(i64),
    Channel(i64),
}

impl PeerKind {
    pub fn from_bot_api_id(id: i64) -> Result<Self> {
        match id {
            0 => Err(Error::ChatNotFound(id.to_string())),
            id if id > 0 => Ok(PeerKind::User(id)),
            id if id > -CHANNEL_ID_OFFSET => Ok(PeerKind::Chat(-id)),
            id => id
                .checked_neg()
                .and_then(|n| n.checked_sub(CHANNEL_ID_OFFSET))
                .filter(|channel| *channel > 0)
                .map(PeerKind::Channel)
                .ok_or_else(|| Error::ChatNotFound(id.to_string())),
        }
    }

    /// Bots may address peers without a known access hash.
    fn to_peer_ref(self) -> PeerRef {
        let id = match self {
            PeerKind::User(id) => PeerId::user(id),
            PeerKind::Chat(id) => PeerId::chat(id),
            PeerKind::Channel(id) => PeerId::channel(id),
        };
        PeerRef {
            id,
            auth: PeerAuth::default(),
        }
    }
}

/// Strip the leading `@` from a handle.
pub fn normalize_handle(handle: &str) -> &str {
    let handle = handle.trim();
    handle.strip_prefix('@').unwrap_or(handle)
}

/// Sign in as the bot unless the session already is.
async fn sign_in(client: &TelegramClient, ctx: &BuildContext, creds: &ApiCredentials) -> Result<()> {
    if client.is_authorized().await? {
        debug!("session already authorized");
        return Ok(());
    }

    client
        .bot_sign_in(&ctx.bot_token, &creds.api_hash)
        .await
        .map_err(|e| Error::AuthorizationFailed(e.to_string()))?;
    info!("signed in as bot");
    Ok(())
}

async fn build_album(
    client: &TelegramClient,
    ctx: &BuildContext,
    request: &UploadRequest,
) -> Result<Vec<InputMedia>> {
    let mut album = Vec::with_capacity(request.files().len());

    for (path, caption) in request.items() {
        info!(file = %path.display(), "uploading file");
        let uploaded = client.upload_file(path).await?;

        album.push(
            InputMedia::new()
                .markdown(with_hard_breaks(caption))
                .document(uploaded)
                .reply_to(ctx.message_thread_id),
        );
    }

    Ok(album)
}

async fn send(
    client: &TelegramClient,
    ctx: &BuildContext,
    creds: &ApiCredentials,
    request: &UploadRequest,
) -> Result<()> {
    sign_in(client, ctx, creds).await?;
    info!(
        chat = %ctx.chat,
        thread = ?ctx.message_thread_id,
        files = request.files().len(),
        "sending album"
    );

    // Chat is resolved before uploading so a bad target fails fast
    match &ctx.chat {
        ChatTarget::Id(id) => {
            let peer = PeerKind::from_bot_api_id(*id)?.to_peer_ref();
            let album = build_album(client, ctx, request).await?;
            println!("[+] Sending");
            client.send_album(peer, album).await?;
        }
        ChatTarget::Handle(handle) => {
            let peer = client
                .resolve_username(normalize_handle(handle))
                .await?
                .ok_or_else(|| Error::ChatNotFound(handle.clone()))?;
            let album = build_album(client, ctx, request).await?;
            println!("[+] Sending");
            client.send_album(&peer, album).await?;
        }
    }

    Ok(())
}

/// Connect, send the album and disconnect.
///
/// The connection is closed on every path out of here, including failures
/// while signing in, uploading or sending. When `save_session` is given,
/// the session is written there as a `SESSION_STRING` value after a
/// successful send.
pub async fn upload(
    ctx: &BuildContext,
    creds: &ApiCredentials,
    request: &UploadRequest,
    save_session: Option<&Path>,
) -> Result<()> {
    let source = SessionSource::from_context(ctx);
    let store = SessionStore::prepare(&source, save_session.is_some())?;

    println!("[+] Logging in Telegram with bot");
    let client = store.connect(creds.api_id).await?;

    let outcome = send(&client, ctx, creds, request).await;
    client.disconnect().await;
    outcome?;

    if let Some(path) = save_session {
        std::fs::write(path, store.export()?)?;
        info!(path = %path.display(), "session string saved");
    }

    println!("[+] Done!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn zero_files_is_rejected() {
        let err = UploadRequest::new(Vec::new(), "caption").unwrap_err();
        assert!(matches!(err, Error::NoFiles));
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let present = dir.path().join("app.apk");
        std::fs::write(&present, b"apk").unwrap();
        let absent = dir.path().join("missing.zip");

        let err = UploadRequest::new(vec![present, absent.clone()], "caption").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(ref p) if p == &absent.display().to_string()));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempdir().expect("tempdir");
        let err = UploadRequest::new(vec![dir.path().to_path_buf()], "caption").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn request_keeps_order_and_aligns_captions() {
        let dir = tempdir().expect("tempdir");
        let names = ["b.zip", "a.apk", "c.txt"];
        let files: Vec<PathBuf> = names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect();

        let request = UploadRequest::new(files.clone(), "build caption").unwrap();
        assert_eq!(request.files(), files.as_slice());
        assert_eq!(request.captions().len(), 3);

        let items: Vec<(&Path, &str)> = request.items().collect();
        assert_eq!(items[0], (files[0].as_path(), ""));
        assert_eq!(items[1], (files[1].as_path(), ""));
        assert_eq!(items[2], (files[2].as_path(), "build caption"));
    }

    #[test]
    fn bot_api_user_ids() {
        assert_eq!(PeerKind::from_bot_api_id(777).unwrap(), PeerKind::User(777));
    }

    #[test]
    fn bot_api_group_ids() {
        assert_eq!(PeerKind::from_bot_api_id(-4242).unwrap(), PeerKind::Chat(4242));
        assert_eq!(
            PeerKind::from_bot_api_id(-999_999_999_999).unwrap(),
            PeerKind::Chat(999_999_999_999)
        );
    }

    #[test]
    fn bot_api_channel_ids() {
        assert_eq!(
            PeerKind::from_bot_api_id(-1001234567890).unwrap(),
            PeerKind::Channel(1234567890)
        );
    }

    #[test]
    fn bot_api_invalid_ids() {
        assert!(PeerKind::from_bot_api_id(0).is_err());
        assert!(PeerKind::from_bot_api_id(-CHANNEL_ID_OFFSET).is_err());
        assert!(PeerKind::from_bot_api_id(i64::MIN).is_err());
    }

    #[test]
    fn handles_lose_their_at_sign() {
        assert_eq!(normalize_handle("@ci_builds"), "ci_builds");
        assert_eq!(normalize_handle("ci_builds"), "ci_builds");
        assert_eq!(normalize_handle(" @ci_builds "), "ci_builds");
    }
}
