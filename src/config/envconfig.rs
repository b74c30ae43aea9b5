use ::config as config_rs;
use anyhow::{Context, Result};
use config_rs::{Environment, Map};
use serde::de::DeserializeOwned;

/// Configuration read from `AGRICONNECT_<SECTION>__<KEY>` variables.
pub trait EnvConfig: Sized + DeserializeOwned {
    const PREFIX: &'static str = "AGRICONNECT";
    const SEPARATOR: &'static str = "__";

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn environment() -> Environment {
        Environment::with_prefix(Self::PREFIX)
            .prefix_separator("_")
            .separator(Self::SEPARATOR)
            .try_parsing(true)
    }

    /// Process environment, after a `.env` in the working directory.
    fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(err).context("failed to read .env");
            }
        }
        Self::from_source(Self::environment())
    }

    /// An explicit variable map in place of the process environment.
    fn from_vars(vars: Map<String, String>) -> Result<Self> {
        Self::from_source(Self::environment().source(Some(vars)))
    }

    fn from_source(env: Environment) -> Result<Self> {
        let cfg = config_rs::Config::builder()
            .add_source(env)
            .build()
            .context("failed to read environment variables for config")?
            .try_deserialize::<Self>()
            .context("failed to deserialize environment into config")?;

        cfg.validate()?;
        Ok(cfg)
    }
}
