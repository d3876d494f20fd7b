use std::sync::Arc;

use tokio::sync::RwLock;

use super::auth::AuthData;
use super::middleware::auth::AuthError;

#[derive(Default, Clone)]
struct ContextData {
    auth: Option<AuthData>,
}

/// Per-request state, populated by the auth middleware.
#[derive(Default, Clone)]
pub struct RequestContext(Arc<RwLock<ContextData>>);

impl RequestContext {
    pub async fn set_auth(&self, data: AuthData) {
        let mut guard = self.0.write().await;
        guard.auth = Some(data);
    }

    /// The caller's auth data, if any. The session is re-checked so a
    /// session that expired mid-request does not keep working.
    pub async fn auth(&self) -> Result<Option<AuthData>, AuthError> {
        let inner = self.0.read().await.clone();

        match inner.auth {
            Some(auth) if !auth.session.is_valid() => Err(AuthError::SessionExpired),
            auth => Ok(auth),
        }
    }
}
