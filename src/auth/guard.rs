use super::{RequiredRole, Role, RoleResolver, jwt};
use crate::{
    config::RedirectConfig,
    services::refresh_service::{RefreshOutcome, TokenRefresher},
    session::TokenStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No access token and the refresh attempt did not yield one.
    SessionExpired,
    NoRole,
    RoleMismatch { resolved: Role },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    pub reason: DenyReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationState {
    Unchecked,
    /// Held only while [`RouteGuard::check`] awaits the authorizer. The guard
    /// is borrowed mutably for that whole call, so callers observe
    /// `Unchecked` before it and a resolved state after it.
    Checking,
    Authorized(Role),
    Unauthorized(Redirect),
}

impl AuthorizationState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Authorized(_) | Self::Unauthorized(_))
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::Unauthorized(redirect) => Some(redirect),
            _ => None,
        }
    }
}

/// Redirect targets for denied checks.
///
/// The defaults keep the web client's split: an expired session goes to the
/// landing page, a missing or wrong role goes to the login page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPolicy {
    pub expired: String,
    pub denied: String,
    /// Treat a stored access token whose `exp` has passed as missing.
    pub refresh_expired_access: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::from(&RedirectConfig::default())
    }
}

impl From<&RedirectConfig> for RedirectPolicy {
    fn from(cfg: &RedirectConfig) -> Self {
        Self {
            expired: cfg.expired.clone(),
            denied: cfg.denied.clone(),
            refresh_expired_access: cfg.refresh_expired_access,
        }
    }
}

#[derive(Clone)]
pub struct RouteAuthorizer {
    store: TokenStore,
    refresher: TokenRefresher,
    resolver: RoleResolver,
    policy: RedirectPolicy,
}

impl RouteAuthorizer {
    pub fn new(store: TokenStore, refresher: TokenRefresher, policy: RedirectPolicy) -> Self {
        Self {
            resolver: RoleResolver::new(store.clone()),
            store,
            refresher,
            policy,
        }
    }

    /// Runs one check and returns its terminal state.
    pub async fn authorize(&self, required: Role) -> AuthorizationState {
        let access = match self.current_access_token() {
            Some(token) => token,
            None => match self.refresher.refresh().await {
                RefreshOutcome::Renewed { access_token } => access_token,
                RefreshOutcome::Expired => {
                    tracing::info!(%required, "session expired");
                    return self.deny(&self.policy.expired, DenyReason::SessionExpired);
                }
            },
        };

        let cached = self.store.role();
        let Some(resolved) = self.resolver.resolve(Some(&access), cached.as_deref()) else {
            tracing::info!(%required, "no role for session");
            return self.deny(&self.policy.denied, DenyReason::NoRole);
        };

        if resolved == required {
            tracing::debug!(%required, "route authorized");
            AuthorizationState::Authorized(resolved)
        } else {
            tracing::info!(%required, %resolved, "role does not match route");
            self.deny(&self.policy.denied, DenyReason::RoleMismatch { resolved })
        }
    }

    pub async fn authorize_for<R: RequiredRole>(&self) -> AuthorizationState {
        self.authorize(R::required()).await
    }

    fn current_access_token(&self) -> Option<String> {
        let token = self.store.access_token()?;
        if self.policy.refresh_expired_access && jwt::is_token_expired(&token) {
            tracing::debug!("stored access token expired, refreshing");
            return None;
        }
        Some(token)
    }

    fn deny(&self, to: &str, reason: DenyReason) -> AuthorizationState {
        AuthorizationState::Unauthorized(Redirect {
            to: to.to_string(),
            reason,
        })
    }
}

/// Authorization for one mounted view.
///
/// The check runs once; it runs again only after the required role changes.
pub struct RouteGuard {
    authorizer: RouteAuthorizer,
    required: Role,
    state: AuthorizationState,
}

impl RouteGuard {
    pub fn new(authorizer: RouteAuthorizer, required: Role) -> Self {
        Self {
            authorizer,
            required,
            state: AuthorizationState::Unchecked,
        }
    }

    pub fn required(&self) -> Role {
        self.required
    }

    pub fn state(&self) -> &AuthorizationState {
        &self.state
    }

    pub async fn check(&mut self) -> &AuthorizationState {
        if !self.state.is_resolved() {
            self.state = AuthorizationState::Checking;
            self.state = self.authorizer.authorize(self.required).await;
        }
        &self.state
    }

    pub async fn set_required(&mut self, required: Role) -> &AuthorizationState {
        if required != self.required {
            self.required = required;
            self.state = AuthorizationState::Unchecked;
        }
        self.check().await
    }
}
