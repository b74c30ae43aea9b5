use std::path::PathBuf;

use reqwest::{
    Client, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::Value;

use super::auth_service::read_json;
use crate::{
    auth::{Role, RoleResolver},
    config::ApiConfig,
    error::AuthError,
    logging::redact,
    session::TokenStore,
};

pub const USER_KYC_PATH: &str = "/kyc/user/";

pub fn submit_path(role: Role) -> String {
    format!("/kyc/{}/submit/", role.as_str())
}

/// Text fields and attachments of one KYC wizard submission.
#[derive(Debug, Clone, Default)]
pub struct KycForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, PathBuf)>,
}

impl KycForm {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.push((name.into(), path.into()));
        self
    }

    async fn into_multipart(self) -> Result<Form, AuthError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for (name, path) in self.files {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| AuthError::Attachment {
                    path: path.clone(),
                    source,
                })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone());
            form = form.part(name, Part::bytes(bytes).file_name(file_name));
        }
        Ok(form)
    }
}

/// The caller's KYC record as returned by `GET /kyc/user/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserKyc {
    #[serde(default)]
    pub success: bool,
    pub role: Option<String>,
    pub kyc: Option<Value>,
    pub message: Option<String>,
}

/// KYC submission and lookup for the logged-in user.
///
/// A 401 from either endpoint clears the whole session and surfaces as
/// [`AuthError::SessionExpired`], which the KYC guard turns into a login
/// redirect.
#[derive(Clone)]
pub struct KycService {
    http: Client,
    api: ApiConfig,
    store: TokenStore,
}

impl KycService {
    pub fn new(http: Client, api: ApiConfig, store: TokenStore) -> Self {
        Self { http, api, store }
    }

    pub async fn submit(&self, role: Role, form: KycForm) -> Result<Value, AuthError> {
        let token = self.store.access_token().ok_or(AuthError::NotLoggedIn)?;
        let path = submit_path(role);
        let form = form.into_multipart().await?;

        tracing::debug!(%role, token = %redact(&token), "submitting KYC");
        let resp = self
            .http
            .post(self.api.endpoint(&path))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await?;
        let resp = self.expire_on_unauthorized(resp)?;
        let body: Value = read_json(resp, &path, "KYC submission failed").await?;

        self.restore_role(&token);
        tracing::info!(%role, "KYC submitted");
        Ok(body)
    }

    pub async fn user_kyc(&self) -> Result<UserKyc, AuthError> {
        let token = self.store.access_token().ok_or(AuthError::NotLoggedIn)?;
        let resp = self
            .http
            .get(self.api.endpoint(USER_KYC_PATH))
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = self.expire_on_unauthorized(resp)?;
        let record: UserKyc = read_json(resp, USER_KYC_PATH, "Failed to fetch KYC data").await?;

        if !record.success {
            return Err(AuthError::InvalidResponse(
                record
                    .message
                    .unwrap_or_else(|| "KYC fetch was not successful".to_string()),
            ));
        }
        if record.kyc.is_none() {
            return Err(AuthError::InvalidResponse(
                "No KYC data found for your account".to_string(),
            ));
        }
        Ok(record)
    }

    fn expire_on_unauthorized(&self, resp: Response) -> Result<Response, AuthError> {
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        tracing::warn!(url = %resp.url(), "KYC request unauthorized, clearing session");
        self.store.clear();
        Err(AuthError::SessionExpired)
    }

    // Only fills a missing cached role; an existing one is left alone.
    fn restore_role(&self, token: &str) {
        if self.store.role().is_some() {
            return;
        }
        match RoleResolver::new(self.store.clone()).resolve(Some(token), None) {
            Some(role) => tracing::debug!(%role, "role restored from token after KYC"),
            None => tracing::warn!("no role in token after KYC"),
        }
    }
}
