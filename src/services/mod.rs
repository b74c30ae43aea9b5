pub mod auth_service;
pub mod kyc_service;
pub mod refresh_service;

pub use auth_service::{AuthService, Established, PendingOtp, SignupRequest};
pub use kyc_service::{KycForm, KycService, UserKyc};
pub use refresh_service::{
    HttpRefreshEndpoint, RefreshEndpoint, RefreshOutcome, RefreshResponse, TokenRefresher,
};
