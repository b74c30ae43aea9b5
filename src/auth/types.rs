use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::session::is_absent;

/// Which dashboard a session may view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Investor,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Farmer, Role::Investor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Investor => "investor",
        }
    }

    /// Landing page after login or a completed KYC wizard.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Farmer => "/farmer",
            Role::Investor => "/investor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// The API capitalises roles ("Farmer"), local storage may hold either form.
impl TryFrom<&str> for Role {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if is_absent(value) {
            return Err(());
        }
        match value.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Role::Farmer),
            "investor" => Ok(Role::Investor),
            _ => Err(()),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::try_from(value).map_err(|_| format!("unknown role {value:?}, expected farmer or investor"))
    }
}

pub trait RequiredRole {
    fn required() -> Role;
}

pub struct FarmerRole;

impl RequiredRole for FarmerRole {
    fn required() -> Role {
        Role::Farmer
    }
}

pub struct InvestorRole;

impl RequiredRole for InvestorRole {
    fn required() -> Role {
        Role::Investor
    }
}
