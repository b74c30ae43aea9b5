use std::sync::Arc;

use anyhow::Context;
use reqwest::Client;

use crate::{
    auth::{KycGuard, RedirectPolicy, RoleResolver, RouteAuthorizer, RouteGuard, Role},
    config::AppConfig,
    services::{AuthService, HttpRefreshEndpoint, KycService, RefreshEndpoint, TokenRefresher},
    session::TokenStore,
};

/// Everything one client session needs, wired over a single token store.
#[derive(Clone)]
pub struct AppState {
    pub cfg: AppConfig,
    pub store: TokenStore,
    pub refresher: TokenRefresher,
    pub authorizer: RouteAuthorizer,
    pub auth: AuthService,
    pub kyc: KycService,
}

impl AppState {
    /// Uses a file-backed store at the configured path.
    pub fn new(cfg: AppConfig) -> anyhow::Result<Arc<Self>> {
        let store = TokenStore::file(&cfg.storage.path);
        Self::with_store(cfg, store)
    }

    pub fn with_store(cfg: AppConfig, store: TokenStore) -> anyhow::Result<Arc<Self>> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.api.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;

        let endpoint: Arc<dyn RefreshEndpoint> =
            Arc::new(HttpRefreshEndpoint::new(http.clone(), &cfg.api));
        Ok(Self::from_parts(cfg, store, http, endpoint))
    }

    pub fn from_parts(
        cfg: AppConfig,
        store: TokenStore,
        http: Client,
        endpoint: Arc<dyn RefreshEndpoint>,
    ) -> Arc<Self> {
        let refresher = TokenRefresher::new(store.clone(), endpoint);
        let authorizer = RouteAuthorizer::new(
            store.clone(),
            refresher.clone(),
            RedirectPolicy::from(&cfg.redirects),
        );
        let auth = AuthService::new(http.clone(), cfg.api.clone(), store.clone());
        let kyc = KycService::new(http, cfg.api.clone(), store.clone());

        Arc::new(Self {
            cfg,
            store,
            refresher,
            authorizer,
            auth,
            kyc,
        })
    }

    pub fn resolver(&self) -> RoleResolver {
        RoleResolver::new(self.store.clone())
    }

    pub fn kyc_guard(&self) -> KycGuard {
        KycGuard::new(self.store.clone())
    }

    pub fn route_guard(&self, required: Role) -> RouteGuard {
        RouteGuard::new(self.authorizer.clone(), required)
    }
}
