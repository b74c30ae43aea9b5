pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STORAGE_PATH: &str = ".agriconnect/session.json";
pub const DEFAULT_RUST_LOG: &str = "info";
pub const DEFAULT_EXPIRED_REDIRECT: &str = "/";
pub const DEFAULT_DENIED_REDIRECT: &str = "/login";
pub const DEFAULT_REFRESH_EXPIRED_ACCESS: bool = false;
