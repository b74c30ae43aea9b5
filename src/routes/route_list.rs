use serde::Serialize;

use crate::auth::Role;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteInfo {
    pub path: &'static str,
    /// `None` for pages anyone may open.
    pub required: Option<Role>,
    pub view: &'static str,
}

pub static ROUTES: &[RouteInfo] = &[
    RouteInfo { path: "/", required: None, view: "landing page" },
    RouteInfo { path: "/about", required: None, view: "landing page" },
    RouteInfo { path: "/faqs", required: None, view: "landing page" },
    RouteInfo { path: "/reviews", required: None, view: "landing page" },
    RouteInfo { path: "/grants", required: None, view: "grants" },
    RouteInfo { path: "/login", required: None, view: "login" },
    RouteInfo { path: "/signup", required: None, view: "signup" },
    RouteInfo { path: "/kyc/farmer", required: Some(Role::Farmer), view: "farmer KYC wizard" },
    RouteInfo { path: "/kyc/investor", required: Some(Role::Investor), view: "investor KYC wizard" },
    RouteInfo { path: "/farmer", required: Some(Role::Farmer), view: "farmer dashboard" },
    RouteInfo { path: "/farmer/projects/create", required: Some(Role::Farmer), view: "create project" },
    RouteInfo { path: "/investor", required: Some(Role::Investor), view: "investor dashboard" },
    RouteInfo { path: "/investor/nda", required: Some(Role::Investor), view: "NDA e-signature" },
];

pub fn routes() -> &'static [RouteInfo] {
    ROUTES
}

/// Exact match, ignoring a trailing slash.
pub fn find(path: &str) -> Option<&'static RouteInfo> {
    let trimmed = path.trim_end_matches('/');
    let path = if trimmed.is_empty() { "/" } else { trimmed };
    ROUTES.iter().find(|route| route.path == path)
}

#[cfg(test)]
mod tests {
    use super::{ROUTES, find};
    use crate::auth::Role;

    #[test]
    fn dashboards_are_gated_by_role() {
        assert_eq!(find("/farmer").and_then(|r| r.required), Some(Role::Farmer));
        assert_eq!(find("/investor/").and_then(|r| r.required), Some(Role::Investor));
        assert_eq!(find("/kyc/investor").and_then(|r| r.required), Some(Role::Investor));
        assert!(find("/").unwrap().required.is_none());
        assert!(find("/projects/42").is_none());
    }

    #[test]
    fn every_role_dashboard_is_listed() {
        for role in Role::ALL {
            let route = find(role.dashboard_path()).unwrap();
            assert_eq!(route.required, Some(role));
        }
        let mut paths: Vec<_> = ROUTES.iter().map(|r| r.path).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), ROUTES.len());
    }
}
