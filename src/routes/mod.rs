pub mod api;

use std::sync::Arc;

use crate::sync::SyncOrchestrator;
use crate::vault::{CredentialVault, LinkedInOAuth};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub vault: Arc<CredentialVault>,
    pub oauth: Arc<LinkedInOAuth>,
    /// SHA-256 hex digest of the API bearer token.
    pub api_token_hash: Arc<str>,
    pub soft_delete_days: u32,
    pub hard_delete_days: u32,
}
