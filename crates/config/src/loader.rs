use config::{Config, Environment};

use crate::{Result, WorkerConfig, DEFAULT_DNS_LABEL};

/// Environment variable prefix: `BOXROTATE_GIST_ID`, `BOXROTATE_GH_TOKEN`,
/// `BOXROTATE_DNS_LABEL`, `BOXROTATE_FTP_PASSWORD`.
pub const ENV_PREFIX: &str = "BOXROTATE";

/// Load the worker configuration from the process environment.
pub fn from_env() -> Result<WorkerConfig> {
    from_env_with_prefix(ENV_PREFIX)
}

/// Load with a custom prefix. Split out so tests can use throwaway
/// prefixes without touching the real variables.
pub fn from_env_with_prefix(prefix: &str) -> Result<WorkerConfig> {
    let config = Config::builder()
        .set_default("gist_id", "")?
        .set_default("gh_token", "")?
        .set_default("dns_label", DEFAULT_DNS_LABEL)?
        .add_source(Environment::with_prefix(prefix))
        .build()?;

    let worker: WorkerConfig = config.try_deserialize()?;
    worker.validate()?;
    Ok(worker)
}
