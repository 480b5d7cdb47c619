//! Signed-in user state
//!
//! [`AuthContext`] owns the current bearer token and user, backed by an
//! injectable [`TokenStore`]. A saved credential is restored on construction;
//! any 401 from the backend drops it.

use async_trait::async_trait;
use ns_common::api::{AuthResponse, SessionRecord, UploadResponse, UserInfo};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::assembler::Blob;
use crate::error::{CaptureError, CaptureResult};
use crate::upload::{ensure_non_empty, ApiClient, AssessmentApi};

/// File name of the saved credential inside the root folder
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Token plus the user it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    pub user: UserInfo,
}

impl From<AuthResponse> for StoredCredential {
    fn from(response: AuthResponse) -> Self {
        Self {
            token: response.token,
            user: response.user,
        }
    }
}

/// Persistence for the signed-in credential
pub trait TokenStore: Send + Sync {
    fn load(&self) -> CaptureResult<Option<StoredCredential>>;
    fn save(&self, credential: &StoredCredential) -> CaptureResult<()>;
    fn clear(&self) -> CaptureResult<()>;
}

/// Keeps the credential for the life of the process
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<StoredCredential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: StoredCredential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> CaptureResult<Option<StoredCredential>> {
        Ok(self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, credential: &StoredCredential) -> CaptureResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> CaptureResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<root>/credentials.json`
    pub fn in_root_folder(root: &Path) -> Self {
        Self::new(root.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> CaptureResult<Option<StoredCredential>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&self.path, e)),
        };

        match serde_json::from_str(&content) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unreadable credential file: {}", e);
                Ok(None)
            }
        }
    }

    fn save(&self, credential: &StoredCredential) -> CaptureResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| storage_error(parent, e))?;
        }
        let json = serde_json::to_string_pretty(credential)
            .map_err(|e| CaptureError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| storage_error(&self.path, e))?;
        debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    fn clear(&self) -> CaptureResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}

fn storage_error(path: &Path, err: io::Error) -> CaptureError {
    CaptureError::Storage(format!("{}: {}", path.display(), err))
}

/// Current authentication state plus the client that uses it
pub struct AuthContext<S: TokenStore> {
    client: ApiClient,
    store: S,
    current: RwLock<Option<StoredCredential>>,
}

impl<S: TokenStore> AuthContext<S> {
    /// Create the context, restoring any saved credential
    pub fn new(client: ApiClient, store: S) -> Self {
        let restored = match store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Could not restore saved credential");
                None
            }
        };
        if let Some(credential) = &restored {
            info!(email = %credential.user.email, "Restored saved credential");
        }

        Self {
            client,
            store,
            current: RwLock::new(restored),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|c| c.token.clone())
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.read().as_ref().map(|c| c.user.clone())
    }

    pub async fn login(&self, email: &str, password: &str) -> CaptureResult<UserInfo> {
        let response = self.client.login(email, password).await?;
        self.sign_in(response)
    }

    pub async fn register(&self, email: &str, password: &str) -> CaptureResult<UserInfo> {
        let response = self.client.register(email, password).await?;
        self.sign_in(response)
    }

    /// Forget the credential locally and in the store
    pub fn logout(&self) -> CaptureResult<()> {
        *self.write() = None;
        self.store.clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Session history of the signed-in user
    pub async fn sessions(&self) -> CaptureResult<Vec<SessionRecord>> {
        let token = self.require_token()?;
        let result = self.client.sessions(&token).await;
        self.check_unauthorized(result)
    }

    fn sign_in(&self, response: AuthResponse) -> CaptureResult<UserInfo> {
        let credential = StoredCredential::from(response);
        self.store.save(&credential)?;
        let user = credential.user.clone();
        *self.write() = Some(credential);
        info!(user_id = %user.id, email = %user.email, "Signed in");
        Ok(user)
    }

    fn require_token(&self) -> CaptureResult<String> {
        self.token()
            .ok_or_else(|| CaptureError::Unauthorized("not signed in".to_string()))
    }

    fn check_unauthorized<T>(&self, result: CaptureResult<T>) -> CaptureResult<T> {
        if let Err(CaptureError::Unauthorized(message)) = &result {
            warn!(message = %message, "Backend rejected the credential, signing out");
            *self.write() = None;
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear stored credential");
            }
        }
        result
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<StoredCredential>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<StoredCredential>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<S: TokenStore> AssessmentApi for AuthContext<S> {
    async fn upload_assessment(&self, video: &Blob, audio: &Blob) -> CaptureResult<UploadResponse> {
        ensure_non_empty(video, audio)?;
        let token = self.require_token()?;
        let result = self.client.upload(&token, video, audio).await;
        self.check_unauthorized(result)
    }
}
