use reqwest::{Client, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    auth::{Role, jwt},
    config::ApiConfig,
    error::AuthError,
    session::{TokenStore, is_absent},
};

pub const LOGIN_PATH: &str = "/auth/login/";
pub const VERIFY_OTP_PATH: &str = "/auth/verify-otp/";
pub const RESEND_OTP_PATH: &str = "/auth/resend-otp/";
pub const SIGNUP_PATH: &str = "/auth/signup/";
pub const LOGOUT_PATH: &str = "/auth/logout/";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyOtpRequest<'a> {
    username: &'a str,
    otp_code: &'a str,
}

#[derive(Debug, Serialize)]
struct ResendOtpRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    requires_otp: bool,
    username: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestorType {
    Individual,
    Organization,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Sent capitalised, as the API stores it.
    #[serde(serialize_with = "serialize_api_role")]
    pub role: Role,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_type: Option<InvestorType>,
}

fn serialize_api_role<S: serde::Serializer>(role: &Role, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(match role {
        Role::Farmer => "Farmer",
        Role::Investor => "Investor",
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    pub phone_number: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
    pub investor_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Signup responses carry the role here, OTP responses under `profile`.
    pub role: Option<String>,
    pub profile: Option<UserProfile>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        [
            self.role.as_deref(),
            self.profile.as_ref().and_then(|p| p.role.as_deref()),
        ]
        .into_iter()
        .flatten()
        .find_map(|role| Role::try_from(role).ok())
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    user: Option<User>,
    access: String,
    refresh: String,
}

/// Outcome of the credential step of login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOtp {
    pub username: String,
    pub message: Option<String>,
}

/// A session written to the token store.
#[derive(Debug, Clone)]
pub struct Established {
    pub user: Option<User>,
    pub role: Option<Role>,
}

/// Login, signup and logout against the Agriconnect API.
#[derive(Clone)]
pub struct AuthService {
    http: Client,
    api: ApiConfig,
    store: TokenStore,
}

impl AuthService {
    pub fn new(http: Client, api: ApiConfig, store: TokenStore) -> Self {
        Self { http, api, store }
    }

    /// Checks credentials; the server mails an OTP and no tokens are issued yet.
    pub async fn login(&self, email: &str, password: &str) -> Result<PendingOtp, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::rejected(400, "Email and password are required"));
        }

        let resp: LoginResponse = self
            .post_json(LOGIN_PATH, &LoginRequest { email, password }, "Login failed")
            .await?;

        match resp.username {
            Some(username) if resp.requires_otp => Ok(PendingOtp {
                username,
                message: resp.message,
            }),
            _ => Err(AuthError::InvalidResponse(
                "login response did not request an OTP".to_string(),
            )),
        }
    }

    pub async fn resend_otp(&self, username: &str) -> Result<(), AuthError> {
        let _: Value = self
            .post_json(RESEND_OTP_PATH, &ResendOtpRequest { username }, "Failed to resend OTP")
            .await?;
        Ok(())
    }

    pub async fn verify_otp(&self, username: &str, otp_code: &str) -> Result<Established, AuthError> {
        let resp: SessionResponse = self
            .post_json(
                VERIFY_OTP_PATH,
                &VerifyOtpRequest { username, otp_code: otp_code.trim() },
                "OTP verification failed",
            )
            .await?;
        self.establish(resp, None)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<Established, AuthError> {
        if request.password != request.confirm_password {
            return Err(AuthError::rejected(400, "Passwords do not match"));
        }
        let resp: SessionResponse = self
            .post_json(SIGNUP_PATH, request, "Signup failed. Please try again.")
            .await?;
        self.establish(resp, Some(request.role))
    }

    /// Clears the local session even when the server call fails.
    pub async fn logout(&self) {
        if let Some(access) = self.store.access_token() {
            let result = self
                .http
                .post(self.api.endpoint(LOGOUT_PATH))
                .bearer_auth(access)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => tracing::debug!("server session closed"),
                Ok(resp) => tracing::warn!(status = %resp.status(), "logout rejected by server"),
                Err(err) => tracing::warn!(error = %err, "logout request failed"),
            }
        }
        self.store.clear();
    }

    fn establish(
        &self,
        resp: SessionResponse,
        requested: Option<Role>,
    ) -> Result<Established, AuthError> {
        let role = resp
            .user
            .as_ref()
            .and_then(User::role)
            .or(requested)
            .or_else(|| {
                jwt::decode(&resp.access)
                    .ok()
                    .and_then(|claims| claims.role_claim().and_then(|r| Role::try_from(r).ok()))
            });

        // An unknown role is stored as absent rather than as "undefined".
        let role_value = role.map(|r| r.as_str()).unwrap_or("");
        self.store.set(&resp.access, &resp.refresh, role_value)?;
        tracing::info!(role = ?role, "session established");

        Ok(Established {
            user: resp.user,
            role,
        })
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.api.endpoint(path))
            .json(body)
            .send()
            .await?;
        read_json(resp, path, fallback).await
    }
}

/// Parses a success body, or turns an error body into [`AuthError::Rejected`].
pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: Response,
    path: &str,
    fallback: &str,
) -> Result<T, AuthError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| fallback.to_string());
        tracing::warn!(path, %status, %message, "request rejected");
        return Err(AuthError::rejected(status.as_u16(), message));
    }

    serde_json::from_str(&text)
        .map_err(|err| AuthError::InvalidResponse(format!("{path} ({status}): {err}")))
}

/// Flattens the API's error shapes into one line.
pub fn error_message(body: &Value) -> Option<String> {
    if let Some(general) = body.pointer("/errors/general").and_then(Value::as_str) {
        return Some(general.to_string());
    }

    if let Some(fields) = body.get("errors").and_then(Value::as_object) {
        let messages: Vec<String> = fields
            .values()
            .flat_map(|value| match value {
                Value::String(msg) => vec![msg.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            })
            .collect();
        if !messages.is_empty() {
            return Some(messages.join(". "));
        }
    }

    ["detail", "message"]
        .into_iter()
        .filter_map(|key| body.get(key).and_then(Value::as_str))
        .find(|msg| !is_absent(msg))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{SignupRequest, User, error_message};
    use crate::auth::Role;

    #[test]
    fn error_message_prefers_general_then_fields_then_detail() {
        let general = json!({"errors": {"general": "Invalid credentials", "email": ["bad"]}});
        assert_eq!(error_message(&general).as_deref(), Some("Invalid credentials"));

        let fields = json!({"errors": {"email": ["This email is already registered"], "phone_number": "Enter a valid number"}});
        let message = error_message(&fields).unwrap();
        assert!(message.contains("This email is already registered"));
        assert!(message.contains("Enter a valid number"));

        assert_eq!(error_message(&json!({"detail": "Not found."})).as_deref(), Some("Not found."));
        assert_eq!(error_message(&json!({"message": "Oops"})).as_deref(), Some("Oops"));
        assert_eq!(error_message(&json!({"success": false})), None);
    }

    #[test]
    fn user_role_reads_top_level_then_profile() {
        let signup: User = serde_json::from_value(json!({"id": 1, "role": "Investor"})).unwrap();
        assert_eq!(signup.role(), Some(Role::Investor));

        let otp: User = serde_json::from_value(json!({
            "id": 2,
            "role": "undefined",
            "profile": {"role": "Farmer", "phone_number": "+254700000000"}
        }))
        .unwrap();
        assert_eq!(otp.role(), Some(Role::Farmer));
    }

    #[test]
    fn signup_request_sends_api_casing() {
        let request = SignupRequest {
            first_name: "Wanjiru".into(),
            last_name: "Kamau".into(),
            email: "w@example.com".into(),
            password: "secret-pass".into(),
            confirm_password: "secret-pass".into(),
            role: Role::Farmer,
            phone_number: "+254700000000".into(),
            organization: None,
            investor_type: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["role"], "Farmer");
        assert!(body.get("organization").is_none());
        assert!(body.get("investor_type").is_none());
    }
}
