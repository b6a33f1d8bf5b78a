use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::*;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

const ENV_PREFIX: &str = "COFFEESHOP_";

#[derive(Deserialize, Debug)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthConfig {
    /// Expected `iss` claim, e.g. `https://example.eu.auth0.com/`.
    pub issuer: Url,
    /// Expected `aud` claim.
    pub audience: String,
    /// Defaults to the issuer's `/.well-known/jwks.json`.
    #[serde(default)]
    pub jwks_url: Option<Url>,
    #[serde(default = "default_key_cache_secs")]
    pub key_cache_secs: u64,
    /// Bounds each fetch of the key set, including the one at startup.
    #[serde(default = "default_key_fetch_timeout_secs")]
    pub key_fetch_timeout_secs: u64,
}

/// Settings that may be supplied through `COFFEESHOP_*` environment
/// variables, overriding the file.
#[derive(Deserialize, Debug, Default)]
struct EnvOverrides {
    database_url: Option<String>,
    auth_issuer: Option<Url>,
    auth_audience: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct EnvLogger {
    level: Option<LogLevel>,
    modules: HashMap<String, LogLevel>,
    timestamp_nanos: bool,
}

fn default_pool_size() -> u32 {
    8
}

fn default_key_cache_secs() -> u64 {
    3600
}

fn default_key_fetch_timeout_secs() -> u64 {
    10
}

pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut config_buf = String::new();
    File::open(path)
        .with_context(|| format!("open {:?}", path))?
        .read_to_string(&mut config_buf)?;
    let config = toml::from_str(&config_buf).with_context(|| format!("parse {:?}", path))?;
    Ok(config)
}

impl Config {
    pub fn apply_env(&mut self) -> Result<()> {
        let overrides = envy::prefixed(ENV_PREFIX)
            .from_env::<EnvOverrides>()
            .context("read environment")?;
        self.apply(overrides);
        Ok(())
    }

    fn apply(&mut self, overrides: EnvOverrides) {
        debug!("Environment overrides: {:?}", overrides);
        if let Some(url) = overrides.database_url {
            self.postgres.url = url;
        }
        if let Some(issuer) = overrides.auth_issuer {
            self.auth.issuer = issuer;
        }
        if let Some(audience) = overrides.auth_audience {
            self.auth.audience = audience;
        }
    }
}

impl PostgresConfig {
    pub fn build(&self) -> Result<Pool<PostgresConnectionManager>> {
        debug!("Build pool of {} connections", self.pool_size);
        infra::persistence::postgres_pool(&self.url, self.pool_size)
    }
}

impl AuthConfig {
    pub fn jwks_url(&self) -> Result<Url> {
        match &self.jwks_url {
            Some(url) => Ok(url.clone()),
            None => Ok(self
                .issuer
                .join(".well-known/jwks.json")
                .context("jwks url")?),
        }
    }

    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_secs)
    }

    pub fn key_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.key_fetch_timeout_secs)
    }
}

impl LogLevel {
    fn to_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl EnvLogger {
    pub fn builder(&self) -> env_logger::Builder {
        let mut b = env_logger::Builder::from_default_env();
        if let Some(level) = self.level.as_ref() {
            b.filter_level(level.to_filter());
        }

        for (module, level) in self.modules.iter() {
            b.filter_module(&module, level.to_filter());
        }

        if self.timestamp_nanos {
            b.format_timestamp_nanos();
        }

        b
    }
}
