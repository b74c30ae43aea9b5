use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    config::ApiConfig,
    error::RefreshError,
    logging::redact,
    session::{StorageKey, TokenStore, is_absent},
};

pub const REFRESH_PATH: &str = "/auth/token/refresh/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshErrorBody {
    detail: Option<String>,
    code: Option<String>,
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait RefreshEndpoint: Send + Sync {
    async fn exchange(&self, refresh_token: &str) -> Result<RefreshResponse, RefreshError>;
}

pub struct HttpRefreshEndpoint {
    http: Client,
    url: String,
}

impl HttpRefreshEndpoint {
    pub fn new(http: Client, api: &ApiConfig) -> Self {
        Self {
            http,
            url: api.endpoint(REFRESH_PATH),
        }
    }
}

#[async_trait]
impl RefreshEndpoint for HttpRefreshEndpoint {
    async fn exchange(&self, refresh_token: &str) -> Result<RefreshResponse, RefreshError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let body: RefreshErrorBody = serde_json::from_str(&text).unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                detail: body.detail,
                code: body.code,
            });
        }

        let parsed: RefreshResponse = serde_json::from_str(&text)
            .map_err(|err| RefreshError::InvalidResponse(err.to_string()))?;
        if is_absent(&parsed.access) {
            return Err(RefreshError::InvalidResponse(
                "response carries no access token".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Renewed { access_token: String },
    Expired,
}

impl RefreshOutcome {
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::Renewed { access_token } => Some(access_token),
            Self::Expired => None,
        }
    }
}

/// Renews the stored access token.
///
/// Every failure is reported as [`RefreshOutcome::Expired`]; only a server
/// answer that the refresh token is invalid also clears the store.
#[derive(Clone)]
pub struct TokenRefresher {
    store: TokenStore,
    endpoint: Arc<dyn RefreshEndpoint>,
}

impl TokenRefresher {
    pub fn new(store: TokenStore, endpoint: Arc<dyn RefreshEndpoint>) -> Self {
        Self { store, endpoint }
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.refresh_token() else {
            tracing::debug!("no refresh token stored, session expired");
            return RefreshOutcome::Expired;
        };

        match self.endpoint.exchange(&refresh_token).await {
            Ok(renewed) => {
                self.store.put(StorageKey::AccessToken, &renewed.access);
                if let Some(rotated) = renewed.refresh.as_deref().filter(|r| !is_absent(r)) {
                    self.store.put(StorageKey::RefreshToken, rotated);
                }
                tracing::debug!(access = %redact(&renewed.access), "access token renewed");
                RefreshOutcome::Renewed {
                    access_token: renewed.access,
                }
            }
            Err(err) if err.is_token_invalid() => {
                tracing::warn!(error = %err, "refresh token rejected, clearing session");
                self.store.clear();
                RefreshOutcome::Expired
            }
            Err(err) => {
                tracing::error!(error = %err, "token refresh failed");
                RefreshOutcome::Expired
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::{RefreshEndpoint, RefreshOutcome, RefreshResponse, TokenRefresher};
    use crate::{
        error::RefreshError,
        session::{MemoryStorage, TokenStore},
    };

    struct ScriptedEndpoint {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        reply: fn() -> Result<RefreshResponse, RefreshError>,
    }

    impl ScriptedEndpoint {
        fn new(reply: fn() -> Result<RefreshResponse, RefreshError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    #[async_trait]
    impl RefreshEndpoint for ScriptedEndpoint {
        async fn exchange(&self, refresh_token: &str) -> Result<RefreshResponse, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(refresh_token.to_string());
            (self.reply)()
        }
    }

    fn store_with(entries: &[(&'static str, &'static str)]) -> (TokenStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::with_entries(entries.iter().copied()));
        (TokenStore::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn missing_refresh_token_short_circuits() {
        let endpoint = ScriptedEndpoint::new(|| unreachable!("no call expected"));
        let (store, _) = store_with(&[("REFRESH_TOKEN", "undefined"), ("role", "farmer")]);
        let refresher = TokenRefresher::new(store, endpoint.clone());

        assert_eq!(refresher.refresh().await, RefreshOutcome::Expired);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn renewal_persists_access_and_rotated_refresh() {
        let endpoint = ScriptedEndpoint::new(|| {
            Ok(RefreshResponse {
                access: "new.access.token".into(),
                refresh: Some("refresh-2".into()),
            })
        });
        let (store, storage) = store_with(&[("REFRESH_TOKEN", "refresh-1")]);
        let refresher = TokenRefresher::new(store, endpoint.clone());

        let outcome = refresher.refresh().await;
        assert_eq!(outcome.access_token(), Some("new.access.token"));
        assert_eq!(endpoint.seen.lock().unwrap().as_slice(), ["refresh-1"]);

        let saved = storage.snapshot();
        assert_eq!(saved["ACCESS_TOKEN"], "new.access.token");
        assert_eq!(saved["REFRESH_TOKEN"], "refresh-2");
    }

    #[tokio::test]
    async fn renewal_without_rotation_keeps_refresh_token() {
        let endpoint = ScriptedEndpoint::new(|| {
            Ok(RefreshResponse {
                access: "new.access.token".into(),
                refresh: None,
            })
        });
        let (store, storage) = store_with(&[("REFRESH_TOKEN", "refresh-1")]);
        TokenRefresher::new(store, endpoint).refresh().await;

        assert_eq!(storage.snapshot()["REFRESH_TOKEN"], "refresh-1");
    }

    #[tokio::test]
    async fn invalid_token_answer_clears_store() {
        let endpoint = ScriptedEndpoint::new(|| {
            Err(RefreshError::Rejected {
                status: 401,
                detail: Some("Token is invalid or expired".into()),
                code: Some("token_not_valid".into()),
            })
        });
        let (store, storage) = store_with(&[
            ("ACCESS_TOKEN", "old.access.token"),
            ("REFRESH_TOKEN", "refresh-1"),
            ("role", "farmer"),
        ]);

        let outcome = TokenRefresher::new(store, endpoint).refresh().await;
        assert_eq!(outcome, RefreshOutcome::Expired);
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn other_failures_expire_without_clearing() {
        let endpoint = ScriptedEndpoint::new(|| {
            Err(RefreshError::InvalidResponse("expected value at line 1".into()))
        });
        let (store, storage) = store_with(&[("REFRESH_TOKEN", "refresh-1"), ("role", "farmer")]);

        let outcome = TokenRefresher::new(store, endpoint).refresh().await;
        assert_eq!(outcome, RefreshOutcome::Expired);
        assert_eq!(storage.snapshot().len(), 2);
    }
}
