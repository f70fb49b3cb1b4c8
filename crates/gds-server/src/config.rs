//! Service configuration
//!
//! Configuration comes from `GDS_*` environment variables with defaults
//! suitable for local development. Tests construct [`Config`] directly.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Registration API configuration.
#[derive(Debug, Clone)]
pub struct GdsConfig {
    pub enabled: bool,
    pub bind_addr: String,
}

/// Certificate manager configuration.
#[derive(Debug, Clone)]
pub struct CertManConfig {
    /// Tick interval of the background loop
    pub interval: Duration,
    /// Directory downloaded bundles are archived into for operators
    pub storage: PathBuf,
}

/// Certificate authority client configuration.
#[derive(Debug, Clone)]
pub struct SectigoConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// CA profile certificate requests are submitted under
    pub profile: String,
}

/// Courier configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub service_email: String,
    pub admin_email: String,
    /// Base URL contact verification links point at
    pub verify_base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the directory this service is authoritative for
    pub directory_id: String,
    /// In maintenance mode the service answers status probes with
    /// MAINTENANCE but keeps serving
    pub maintenance: bool,
    pub gds: GdsConfig,
    pub certman: CertManConfig,
    pub sectigo: SectigoConfig,
    pub email: EmailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            directory_id: "trisa.directory".into(),
            maintenance: false,
            gds: GdsConfig {
                enabled: true,
                bind_addr: "0.0.0.0:4433".into(),
            },
            certman: CertManConfig {
                interval: Duration::from_secs(600),
                storage: PathBuf::from("certs"),
            },
            sectigo: SectigoConfig {
                base_url: "https://iot.sectigo.com".into(),
                username: String::new(),
                password: String::new(),
                profile: "CipherTraceEE".into(),
            },
            email: EmailConfig {
                service_email: "admin@trisa.directory".into(),
                admin_email: "admin@trisa.directory".into(),
                verify_base_url: "https://trisa.directory".into(),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(value) => value
            .parse::<bool>()
            .with_context(|| format!("{key} must be true or false")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from the environment on top of the defaults.
    pub fn from_env() -> Result<Config> {
        let defaults = Config::default();

        let interval = match env::var("GDS_CERTMAN_INTERVAL") {
            Ok(value) => Duration::from_secs(
                value
                    .parse::<u64>()
                    .context("GDS_CERTMAN_INTERVAL must be a number of seconds")?,
            ),
            Err(_) => defaults.certman.interval,
        };

        Ok(Config {
            directory_id: env_or("GDS_DIRECTORY_ID", &defaults.directory_id),
            maintenance: env_bool("GDS_MAINTENANCE", false)?,
            gds: GdsConfig {
                enabled: env_bool("GDS_ENABLED", true)?,
                bind_addr: env_or("GDS_BIND_ADDR", &defaults.gds.bind_addr),
            },
            certman: CertManConfig {
                interval,
                storage: PathBuf::from(env_or("GDS_CERTMAN_STORAGE", "certs")),
            },
            sectigo: SectigoConfig {
                base_url: env_or("GDS_SECTIGO_URL", &defaults.sectigo.base_url),
                username: env_or("GDS_SECTIGO_USERNAME", ""),
                password: env_or("GDS_SECTIGO_PASSWORD", ""),
                profile: env_or("GDS_SECTIGO_PROFILE", &defaults.sectigo.profile),
            },
            email: EmailConfig {
                service_email: env_or("GDS_SERVICE_EMAIL", &defaults.email.service_email),
                admin_email: env_or("GDS_ADMIN_EMAIL", &defaults.email.admin_email),
                verify_base_url: env_or("GDS_VERIFY_BASE_URL", &defaults.email.verify_base_url),
            },
        })
    }
}
