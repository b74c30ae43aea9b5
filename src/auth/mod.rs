pub mod guard;
pub mod jwt;
pub mod kyc;
mod resolver;
mod types;

pub use guard::{AuthorizationState, DenyReason, Redirect, RedirectPolicy, RouteAuthorizer, RouteGuard};
pub use jwt::Claims;
pub use kyc::{KycDecision, KycGuard, KycStatus, KycUser};
pub use resolver::RoleResolver;
pub use types::{FarmerRole, InvestorRole, RequiredRole, Role};
