use anyhow::{Result, bail};

use super::AppConfig;

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    let url = cfg.api.url.trim();
    if url.is_empty() {
        errors.push("api.url must not be empty".to_string());
    } else if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("api.url must be an http(s) URL, got {url:?}"));
    }

    if cfg.api.timeout_secs == Some(0) {
        errors.push("api.timeout_secs must be > 0 when set".to_string());
    }

    if cfg.storage.path.as_os_str().is_empty() {
        errors.push("storage.path must not be empty".to_string());
    }

    if !cfg.redirects.expired.starts_with('/') {
        errors.push(format!(
            "redirects.expired must be an absolute path, got {:?}",
            cfg.redirects.expired
        ));
    }

    if !cfg.redirects.denied.starts_with('/') {
        errors.push(format!(
            "redirects.denied must be an absolute path, got {:?}",
            cfg.redirects.denied
        ));
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}

#[cfg(test)]
mod tests {
    use super::validate;
    use crate::config::AppConfig;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut cfg = AppConfig::default();
        cfg.api.url = "ftp://nowhere".to_string();
        cfg.api.timeout_secs = Some(0);
        cfg.redirects.denied = "login".to_string();

        let message = validate(&cfg).unwrap_err().to_string();
        assert!(message.contains("api.url"));
        assert!(message.contains("api.timeout_secs"));
        assert!(message.contains("redirects.denied"));
        assert!(!message.contains("redirects.expired"));
    }
}
