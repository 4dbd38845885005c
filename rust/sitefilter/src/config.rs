use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub property_table: String,
    pub max_pool_size: u32,
    pub pg_ssl_root_cert: Option<String>,
    pub pg_ssl_cert: Option<String>,
    pub pg_ssl_key: Option<String>,
    pub api_key: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub page_size: i64,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    sitefilter_listen_addr: Option<String>,
    #[serde(default)]
    sitefilter_listen_host: Option<String>,
    #[serde(default)]
    sitefilter_listen_port: Option<u16>,
    #[serde(default)]
    sitefilter_database_url: Option<String>,
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default = "default_property_table")]
    sitefilter_property_table: String,
    #[serde(default = "default_pool_size")]
    sitefilter_max_pool_size: u32,
    #[serde(default)]
    pgsslrootcert: Option<String>,
    #[serde(default)]
    pgsslcert: Option<String>,
    #[serde(default)]
    pgsslkey: Option<String>,
    #[serde(default)]
    sitefilter_api_key: Option<String>,
    #[serde(default)]
    sitefilter_allowed_origins: Option<String>,
    #[serde(default = "default_page_size")]
    sitefilter_page_size: i64,
    #[serde(default = "default_timeout_secs")]
    sitefilter_request_timeout_secs: u64,
}

fn default_property_table() -> String {
    "property_listings".to_string()
}

const fn default_pool_size() -> u32 {
    10
}

const fn default_page_size() -> i64 {
    50
}

const fn default_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig =
            envy::from_env().context("failed to parse SITEFILTER_* environment variables")?;

        let listen_addr = resolve_addr(
            raw.sitefilter_listen_addr,
            raw.sitefilter_listen_host,
            raw.sitefilter_listen_port,
        )?;

        let database_url = raw
            .sitefilter_database_url
            .or(raw.database_url)
            .or_else(|| env::var("DATABASE_URL").ok())
            .context("SITEFILTER_DATABASE_URL or DATABASE_URL must be set")?;

        let allowed_origins = raw.sitefilter_allowed_origins.and_then(|csv| {
            let trimmed: Vec<_> = csv
                .split(',')
                .filter_map(|part| {
                    let entry = part.trim();
                    if entry.is_empty() {
                        None
                    } else {
                        Some(entry.to_string())
                    }
                })
                .collect();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        });

        Ok(Self {
            listen_addr,
            database_url,
            property_table: raw.sitefilter_property_table,
            max_pool_size: raw.sitefilter_max_pool_size,
            pg_ssl_root_cert: raw.pgsslrootcert,
            pg_ssl_cert: raw.pgsslcert,
            pg_ssl_key: raw.pgsslkey,
            api_key: raw.sitefilter_api_key,
            allowed_origins,
            page_size: raw.sitefilter_page_size.max(1),
            request_timeout: Duration::from_secs(raw.sitefilter_request_timeout_secs.max(1)),
        })
    }

    /// A config suitable for embedding the engine without a real listener,
    /// e.g. in tests or tooling.
    pub fn embedded(database_url: String) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url,
            property_table: default_property_table(),
            max_pool_size: 1,
            pg_ssl_root_cert: None,
            pg_ssl_cert: None,
            pg_ssl_key: None,
            api_key: None,
            allowed_origins: None,
            page_size: default_page_size(),
            request_timeout: Duration::from_secs(default_timeout_secs()),
        }
    }
}

fn resolve_addr(
    addr: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<SocketAddr> {
    if let Some(addr) = addr {
        return addr
            .to_socket_addrs()
            .context("invalid SITEFILTER_LISTEN_ADDR value")?
            .next()
            .context("SITEFILTER_LISTEN_ADDR resolved to no addresses");
    }

    let host = host.unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.unwrap_or(8470);
    let combined = format!("{}:{}", host, port);
    combined
        .to_socket_addrs()
        .context("invalid sitefilter listen host/port combination")?
        .next()
        .context("listen address resolved to no targets")
}
