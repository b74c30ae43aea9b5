use super::{Role, jwt};
use crate::{
    error::AuthError,
    session::{StorageKey, TokenStore, is_absent},
};

pub const SESSION_EXPIRED_MARKER: &str = "Session expired";

/// What the KYC wizard reports about its submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KycStatus {
    pub submitting: bool,
    pub error: Option<String>,
    pub submitted: bool,
}

impl KycStatus {
    /// Status once a submission attempt has finished.
    pub fn settled<T>(outcome: &Result<T, AuthError>) -> Self {
        match outcome {
            Ok(_) => Self {
                submitted: true,
                ..Self::default()
            },
            Err(err) => Self {
                error: Some(err.to_string()),
                ..Self::default()
            },
        }
    }
}

/// The signed-up user known to the wizard, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct KycUser<'a> {
    pub role: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KycDecision {
    /// Submission in flight; show progress.
    Wait,
    Stay,
    Redirect { to: String, cleared_session: bool },
}

impl KycDecision {
    fn to(path: &str) -> Self {
        Self::Redirect {
            to: path.to_string(),
            cleared_session: false,
        }
    }
}

/// Navigation guard around the farmer and investor KYC wizards.
#[derive(Clone)]
pub struct KycGuard {
    store: TokenStore,
    login_path: String,
    signup_path: String,
}

impl KycGuard {
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            login_path: "/login".to_string(),
            signup_path: "/signup".to_string(),
        }
    }

    pub fn evaluate(&self, status: &KycStatus, user: Option<KycUser<'_>>, path: &str) -> KycDecision {
        if status.submitting {
            return KycDecision::Wait;
        }

        // An expired session has usually been cleared already, so this runs
        // before the anonymous-visitor check.
        if status.error.as_deref().is_some_and(|e| e.contains(SESSION_EXPIRED_MARKER)) {
            tracing::info!("session expired during KYC, clearing storage");
            return self.clear_and_login();
        }

        let has_token = self.store.access_token().is_some();

        if user.is_none() && !has_token && path.contains("kyc") {
            tracing::debug!(path, "no user or token on KYC page");
            return KycDecision::to(&self.signup_path);
        }

        if status.error.is_some() {
            return KycDecision::Stay;
        }

        if has_token && user.is_none() && !status.submitted {
            tracing::debug!("token without user state, re-authenticating");
            return KycDecision::to(&self.login_path);
        }

        if !status.submitted {
            return KycDecision::Stay;
        }

        match self.final_role(user) {
            Some(raw) => match Role::try_from(raw.as_str()) {
                Ok(role) => {
                    tracing::info!(%role, "KYC submitted, opening dashboard");
                    KycDecision::to(role.dashboard_path())
                }
                Err(()) => {
                    tracing::error!(role = %raw, "unknown role after KYC submission");
                    KycDecision::to(&self.login_path)
                }
            },
            None => {
                tracing::error!("no valid role after KYC submission");
                self.clear_and_login()
            }
        }
    }

    /// Signup user's role, then the cached role, then the token claim.
    fn final_role(&self, user: Option<KycUser<'_>>) -> Option<String> {
        user.and_then(|u| u.role)
            .filter(|role| !is_absent(role))
            .map(str::to_string)
            .or_else(|| self.store.role())
            .or_else(|| self.token_role())
    }

    fn token_role(&self) -> Option<String> {
        let token = self.store.access_token()?;
        let claims = jwt::decode(&token).ok()?;
        let raw = claims.role_claim()?.to_string();
        if let Ok(role) = Role::try_from(raw.as_str()) {
            self.store.put(StorageKey::Role, role.as_str());
        }
        Some(raw)
    }

    fn clear_and_login(&self) -> KycDecision {
        self.store.clear();
        KycDecision::Redirect {
            to: self.login_path.clone(),
            cleared_session: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{KycDecision, KycGuard, KycStatus, KycUser, SESSION_EXPIRED_MARKER};
    use crate::{
        error::AuthError,
        session::{MemoryStorage, TokenStore},
        test_helpers::unsigned_token,
    };

    fn kyc_guard(entries: &[(&str, &str)]) -> (KycGuard, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::with_entries(entries.iter().copied()));
        (KycGuard::new(TokenStore::new(storage.clone())), storage)
    }

    fn submitted() -> KycStatus {
        KycStatus {
            submitted: true,
            ..KycStatus::default()
        }
    }

    fn redirect(to: &str, cleared_session: bool) -> KycDecision {
        KycDecision::Redirect {
            to: to.to_string(),
            cleared_session,
        }
    }

    #[test]
    fn submitting_waits() {
        let (guard, _) = kyc_guard(&[]);
        let status = KycStatus {
            submitting: true,
            ..KycStatus::default()
        };
        assert_eq!(guard.evaluate(&status, None, "/kyc/farmer"), KycDecision::Wait);
    }

    #[test]
    fn anonymous_visitor_goes_to_signup() {
        let (guard, _) = kyc_guard(&[]);
        let decision = guard.evaluate(&KycStatus::default(), None, "/kyc/investor");
        assert_eq!(decision, redirect("/signup", false));

        assert_eq!(guard.evaluate(&KycStatus::default(), None, "/about"), KycDecision::Stay);
    }

    #[test]
    fn session_expired_error_clears_and_goes_to_login() {
        let (guard, storage) = kyc_guard(&[("ACCESS_TOKEN", "a.b.c"), ("role", "farmer")]);
        let status = KycStatus {
            error: Some("Session expired. Please log in again.".into()),
            ..KycStatus::default()
        };
        let user = Some(KycUser { role: Some("Farmer") });

        assert_eq!(guard.evaluate(&status, user, "/kyc/farmer"), redirect("/login", true));
        assert!(storage.snapshot().is_empty());
    }

    #[test]
    fn expired_session_goes_to_login_after_storage_was_cleared() {
        let (guard, _) = kyc_guard(&[]);
        let status = KycStatus {
            error: Some("Session expired. Please login again.".into()),
            ..KycStatus::default()
        };
        assert_eq!(guard.evaluate(&status, None, "/kyc/investor"), redirect("/login", true));
    }

    #[test]
    fn other_errors_stay_on_the_form() {
        let (guard, storage) = kyc_guard(&[("ACCESS_TOKEN", "a.b.c")]);
        let status = KycStatus {
            error: Some("ID number is required".into()),
            ..KycStatus::default()
        };
        let user = Some(KycUser::default());
        assert_eq!(guard.evaluate(&status, user, "/kyc/farmer"), KycDecision::Stay);
        assert_eq!(storage.snapshot().len(), 1);
    }

    #[test]
    fn token_without_user_reauthenticates() {
        let (guard, _) = kyc_guard(&[("ACCESS_TOKEN", "a.b.c")]);
        let decision = guard.evaluate(&KycStatus::default(), None, "/kyc/farmer");
        assert_eq!(decision, redirect("/login", false));
    }

    #[test]
    fn submission_opens_the_role_dashboard() {
        let (guard, _) = kyc_guard(&[("ACCESS_TOKEN", "a.b.c")]);
        let user = Some(KycUser { role: Some("Investor") });
        assert_eq!(guard.evaluate(&submitted(), user, "/kyc/investor"), redirect("/investor", false));

        let token = unsigned_token(json!({"role": "Farmer"}));
        let (guard, storage) = kyc_guard(&[("ACCESS_TOKEN", token.as_str())]);
        let user = Some(KycUser { role: Some("undefined") });
        assert_eq!(guard.evaluate(&submitted(), user, "/kyc/farmer"), redirect("/farmer", false));
        assert_eq!(storage.snapshot().get("role").map(String::as_str), Some("farmer"));
    }

    #[test]
    fn cached_role_is_preferred_over_token_claim() {
        let token = unsigned_token(json!({"role": "Farmer"}));
        let (guard, storage) = kyc_guard(&[("ACCESS_TOKEN", token.as_str()), ("role", "investor")]);
        let decision = guard.evaluate(&submitted(), Some(KycUser::default()), "/kyc/investor");
        assert_eq!(decision, redirect("/investor", false));
        assert_eq!(storage.snapshot().get("role").map(String::as_str), Some("investor"));
    }

    #[test]
    fn unknown_role_goes_to_login_without_clearing() {
        let (guard, storage) = kyc_guard(&[("ACCESS_TOKEN", "a.b.c"), ("role", "farmer")]);
        let user = Some(KycUser { role: Some("admin") });
        assert_eq!(guard.evaluate(&submitted(), user, "/kyc/farmer"), redirect("/login", false));
        assert_eq!(storage.snapshot().len(), 2);
    }

    #[test]
    fn settled_status_reflects_the_outcome() {
        let ok: Result<(), AuthError> = Ok(());
        assert_eq!(KycStatus::settled(&ok), submitted());

        let expired: Result<(), AuthError> = Err(AuthError::SessionExpired);
        let status = KycStatus::settled(&expired);
        assert!(!status.submitted);
        assert!(status.error.unwrap().contains(SESSION_EXPIRED_MARKER));
    }

    #[test]
    fn submission_without_role_clears_session() {
        let (guard, storage) = kyc_guard(&[("ACCESS_TOKEN", "a.b.c"), ("role", "undefined")]);
        let decision = guard.evaluate(&submitted(), Some(KycUser::default()), "/kyc/farmer");
        assert_eq!(decision, redirect("/login", true));
        assert!(storage.snapshot().is_empty());
    }
}
