use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    auth::{AuthorizationState, DenyReason, KycDecision, KycStatus, Role, jwt},
    routes,
    services::{KycForm, RefreshOutcome, SignupRequest, auth_service::InvestorType},
    state::AppState,
};

#[derive(Parser)]
#[command(author, version, about = "Agriconnect session client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check credentials and have the server mail an OTP
    Login(LoginArgs),
    /// Complete login with the mailed OTP and store the session
    VerifyOtp(VerifyOtpArgs),
    /// Ask the server for a fresh OTP
    ResendOtp(ResendOtpArgs),
    Signup(SignupArgs),
    /// Show the stored session and its resolved role
    Whoami,
    /// Authorize and open a page the way the web client would
    Open(OpenArgs),
    /// Submit or inspect the KYC record of the logged-in user
    Kyc {
        #[command(subcommand)]
        command: KycCommand,
    },
    /// Exchange the refresh token for a new access token
    Refresh,
    Logout,
    /// List known pages and the role each requires
    Routes,
}

#[derive(Args, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
}

#[derive(Args, Clone)]
pub struct VerifyOtpArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub code: String,
}

#[derive(Args, Clone)]
pub struct ResendOtpArgs {
    #[arg(long)]
    pub username: String,
}

#[derive(Args, Clone)]
pub struct SignupArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub password: String,
    /// Defaults to --password
    #[arg(long)]
    pub confirm_password: Option<String>,
    /// farmer or investor
    #[arg(long)]
    pub role: Role,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub organization: Option<String>,
    #[arg(long, value_enum)]
    pub investor_type: Option<InvestorKind>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum InvestorKind {
    Individual,
    Organization,
}

impl From<InvestorKind> for InvestorType {
    fn from(kind: InvestorKind) -> Self {
        match kind {
            InvestorKind::Individual => InvestorType::Individual,
            InvestorKind::Organization => InvestorType::Organization,
        }
    }
}

#[derive(Subcommand)]
pub enum KycCommand {
    /// Send the KYC form for the given role
    Submit(KycSubmitArgs),
    /// Show the KYC record stored by the API
    Status,
}

#[derive(Args, Clone)]
pub struct KycSubmitArgs {
    #[arg(long)]
    pub role: Role,
    /// Form field as NAME=VALUE, repeatable
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
    /// Attachment as NAME=PATH, repeatable
    #[arg(long = "file", value_parser = parse_file)]
    pub files: Vec<(String, PathBuf)>,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))?;
    if name.trim().is_empty() {
        return Err(format!("missing field name in {raw:?}"));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

fn parse_file(raw: &str) -> Result<(String, PathBuf), String> {
    parse_field(raw).map(|(name, path)| (name, PathBuf::from(path)))
}

#[derive(Args, Clone)]
pub struct OpenArgs {
    /// Page path, e.g. /farmer
    pub path: String,
}

pub async fn run(command: Commands, state: &AppState) -> Result<()> {
    match command {
        Commands::Login(args) => {
            let pending = state.auth.login(&args.email, &args.password).await?;
            if let Some(message) = pending.message {
                println!("{message}");
            }
            println!(
                "verify with: agriconnect verify-otp --username {} --code <OTP>",
                pending.username
            );
        }
        Commands::VerifyOtp(args) => {
            let established = state.auth.verify_otp(&args.username, &args.code).await?;
            report_established(established.role);
        }
        Commands::ResendOtp(args) => {
            state.auth.resend_otp(&args.username).await?;
            println!("a new OTP was sent");
        }
        Commands::Signup(args) => {
            let request = SignupRequest {
                confirm_password: args.confirm_password.unwrap_or_else(|| args.password.clone()),
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                password: args.password,
                role: args.role,
                phone_number: args.phone,
                organization: args.organization,
                investor_type: args.investor_type.map(Into::into),
            };
            let established = state.auth.signup(&request).await?;
            report_established(established.role);
        }
        Commands::Whoami => whoami(state),
        Commands::Open(args) => {
            println!("{}", open(state, &args.path).await?);
        }
        Commands::Kyc { command } => kyc(state, command).await?,
        Commands::Refresh => match state.refresher.refresh().await {
            RefreshOutcome::Renewed { .. } => println!("access token renewed"),
            RefreshOutcome::Expired => bail!("session expired, log in again"),
        },
        Commands::Logout => {
            state.auth.logout().await;
            println!("logged out");
        }
        Commands::Routes => {
            for route in routes::routes() {
                let required = route.required.map(|r| r.as_str()).unwrap_or("-");
                println!("{:<26} {:<9} {}", route.path, required, route.view);
            }
        }
    }
    Ok(())
}

/// Describes what opening `path` leads to.
pub async fn open(state: &AppState, path: &str) -> Result<String> {
    let route = routes::find(path).with_context(|| format!("no page at {path}"))?;
    let Some(required) = route.required else {
        return Ok(format!("{} ({})", route.view, route.path));
    };

    let mut guard = state.route_guard(required);
    let outcome = match guard.check().await {
        AuthorizationState::Authorized(role) => format!("{} ({}) as {role}", route.view, route.path),
        AuthorizationState::Unauthorized(redirect) => {
            let why = match &redirect.reason {
                DenyReason::SessionExpired => "session expired".to_string(),
                DenyReason::NoRole => "no role on session".to_string(),
                DenyReason::RoleMismatch { resolved } => {
                    format!("requires {required}, session is {resolved}")
                }
            };
            format!("redirect to {} ({why})", redirect.to)
        }
        AuthorizationState::Unchecked | AuthorizationState::Checking => {
            bail!("authorization for {path} did not complete")
        }
    };
    Ok(outcome)
}

/// Submits a KYC form and decides where the wizard goes next.
pub async fn submit_kyc(state: &AppState, role: Role, form: KycForm) -> (KycStatus, KycDecision) {
    let outcome = state.kyc.submit(role, form).await;
    if let Err(err) = &outcome {
        tracing::warn!(%role, error = %err, "KYC submission failed");
    }
    let status = KycStatus::settled(&outcome);
    let decision = state
        .kyc_guard()
        .evaluate(&status, None, &format!("/kyc/{role}"));
    (status, decision)
}

async fn kyc(state: &AppState, command: KycCommand) -> Result<()> {
    match command {
        KycCommand::Submit(args) => {
            let form = KycForm {
                fields: args.fields,
                files: args.files,
            };
            let (status, decision) = submit_kyc(state, args.role, form).await;
            match decision {
                KycDecision::Redirect { to, cleared_session } => {
                    let note = if cleared_session { ", session cleared" } else { "" };
                    println!("next page: {to}{note}");
                }
                KycDecision::Stay => println!("staying on /kyc/{}", args.role),
                KycDecision::Wait => println!("submission still in progress"),
            }
            if let Some(error) = status.error {
                bail!("KYC not submitted: {error}");
            }
        }
        KycCommand::Status => {
            let record = state.kyc.user_kyc().await?;
            println!("role: {}", record.role.as_deref().unwrap_or("unknown"));
            if let Some(kyc) = record.kyc {
                println!("{}", serde_json::to_string_pretty(&kyc)?);
            }
        }
    }
    Ok(())
}

fn whoami(state: &AppState) {
    let session = state.store.snapshot();
    if session.is_empty() {
        println!("no session stored");
        return;
    }

    match state.resolver().resolve_current() {
        Some(role) => println!("role: {role}"),
        None => println!("role: unknown"),
    }

    match session.access_token.as_deref().map(jwt::decode) {
        Some(Ok(claims)) => match claims.exp() {
            Some(exp) if claims.is_expired_at(jwt::now_unix()) => {
                println!("access token: expired at {}", format_epoch(exp))
            }
            Some(exp) => println!("access token: valid until {}", format_epoch(exp)),
            None => println!("access token: no expiry"),
        },
        Some(Err(err)) => println!("access token: unreadable ({err})"),
        None => println!("access token: none"),
    }
    println!(
        "refresh token: {}",
        if session.refresh_token.is_some() { "stored" } else { "none" }
    );
}

fn report_established(role: Option<Role>) {
    match role {
        Some(role) => println!("logged in as {role}, dashboard at {}", role.dashboard_path()),
        None => println!("logged in, but the account has no known role"),
    }
}

fn format_epoch(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
