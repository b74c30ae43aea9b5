pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod test_helpers;
