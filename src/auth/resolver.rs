use super::{Role, jwt};
use crate::session::{StorageKey, TokenStore};

/// Picks the effective role: token claim first, then the cached role.
#[derive(Clone)]
pub struct RoleResolver {
    store: TokenStore,
}

impl RoleResolver {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }

    pub fn resolve(&self, access_token: Option<&str>, cached_role: Option<&str>) -> Option<Role> {
        if let Some(role) = access_token.and_then(token_role) {
            if cached_role != Some(role.as_str()) {
                self.store.put(StorageKey::Role, role.as_str());
            }
            return Some(role);
        }

        let role = cached_role.and_then(|cached| Role::try_from(cached).ok());
        if role.is_none() {
            tracing::debug!(cached = ?cached_role, "no usable role in token or cache");
        }
        role
    }

    /// Resolves against whatever the store currently holds.
    pub fn resolve_current(&self) -> Option<Role> {
        let access = self.store.access_token();
        let cached = self.store.role();
        self.resolve(access.as_deref(), cached.as_deref())
    }
}

fn token_role(token: &str) -> Option<Role> {
    let claims = match jwt::decode(token) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, "access token not decodable, falling back to cached role");
            return None;
        }
    };
    let raw = claims.role_claim()?;
    match Role::try_from(raw) {
        Ok(role) => Some(role),
        Err(()) => {
            tracing::warn!(role = raw, "access token carries an unknown role");
            None
        }
    }
}
