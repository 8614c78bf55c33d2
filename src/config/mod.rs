use std::{env, str::FromStr, time::Duration};

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    pub indexer: IndexerConfig,
    pub live: LiveConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allow_origins: Vec<String>,
    pub max_concurrent_requests: usize,
    pub paths: EndpointPaths,
}

#[derive(Debug, Clone)]
pub struct EndpointPaths {
    pub live: String,
    pub pending: String,
    pub snapshot: String,
    pub health: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            live: "/live".into(),
            pending: "/pending".into(),
            snapshot: "/snapshot".into(),
            health: "/health".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub shared_secret: Option<String>,
    pub header_name: String,
    pub query_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            shared_secret: None,
            header_name: "x-live-feed-secret".into(),
            query_name: "secret".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub contract_id: Option<String>,
    pub feed_url: Option<String>,
    pub node_url: Option<String>,
    pub wallet_target: Option<String>,
    pub wallet_id: Option<String>,
    pub chain_id: String,
    pub decoder_url: Option<String>,
    pub decoder_cache_capacity: u64,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerMode {
    Auto,
    State,
    History,
}

impl FromStr for IndexerMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "state" => Ok(Self::State),
            "history" => Ok(Self::History),
            other => Err(AppError::InvalidConfig(format!(
                "Unknown indexer mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackendMode {
    Auto,
    Wallet,
    Node,
}

impl FromStr for StateBackendMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "wallet" => Ok(Self::Wallet),
            "node" => Ok(Self::Node),
            other => Err(AppError::InvalidConfig(format!(
                "Unknown state backend '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub mode: IndexerMode,
    pub state_backend: StateBackendMode,
    pub poll_interval: Duration,
    pub page_size: u64,
    pub page_calls: u64,
    pub history_page_size: u64,
    pub disabled: bool,
    pub force: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            mode: IndexerMode::Auto,
            state_backend: StateBackendMode::Auto,
            poll_interval: Duration::from_millis(15_000),
            page_size: 1000,
            page_calls: 4,
            history_page_size: 50,
            disabled: false,
            force: false,
        }
    }
}

impl IndexerConfig {
    /// Reads the indexer settings through `lookup`. Anything unusable leaves
    /// the indexer switched off instead of failing startup.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match Self::from_lookup(&lookup).and_then(|config| config.validate().map(|_| config)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Indexer settings rejected; indexer disabled");
                Self {
                    disabled: true,
                    ..Self::default()
                }
            }
        }
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        Ok(Self {
            mode: read("LIVE_FEED_INDEXER_MODE").map_or(Ok(defaults.mode), |val| val.parse())?,
            state_backend: read("LIVE_FEED_STATE_BACKEND")
                .map_or(Ok(defaults.state_backend), |val| val.parse())?,
            poll_interval: Duration::from_millis(parse_or(
                "LIVE_FEED_INDEXER_POLL_MS",
                read("LIVE_FEED_INDEXER_POLL_MS"),
                15_000,
            )?),
            page_size: parse_or(
                "LIVE_FEED_INDEXER_PAGE_SIZE",
                read("LIVE_FEED_INDEXER_PAGE_SIZE"),
                defaults.page_size,
            )?,
            page_calls: parse_or(
                "LIVE_FEED_INDEXER_PAGE_CALLS",
                read("LIVE_FEED_INDEXER_PAGE_CALLS"),
                defaults.page_calls,
            )?,
            history_page_size: parse_or(
                "LIVE_FEED_INDEXER_HISTORY_PAGE_SIZE",
                read("LIVE_FEED_INDEXER_HISTORY_PAGE_SIZE"),
                defaults.history_page_size,
            )?,
            disabled: is_true(read("LIVE_FEED_INDEXER_DISABLED")),
            force: is_true(read("LIVE_FEED_FORCE_INDEXER")),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_calls == 0 {
            return Err(AppError::InvalidConfig(
                "Indexer page size and page calls must be positive".into(),
            ));
        }

        if self.history_page_size == 0 {
            return Err(AppError::InvalidConfig(
                "History page size must be positive".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub heartbeat_interval: Duration,
    pub pending_ttl: Duration,
    pub subscriber_buffer: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(15_000),
            pending_ttl: Duration::from_millis(5 * 60 * 1000),
            subscriber_buffer: 256,
        }
    }
}

/// Which state endpoint flavour to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateBackend {
    Wallet { target: String, wallet_id: Option<String> },
    Node { url: String },
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: env_or_default("LIVE_FEED_HOST", "0.0.0.0"),
                port: env_or_parse("LIVE_FEED_PORT", 4546)?,
                allow_origins: env_list("LIVE_FEED_ALLOW_ORIGIN", vec!["*".into()]),
                max_concurrent_requests: env_or_parse("LIVE_FEED_MAX_CONCURRENT_REQUESTS", 256)?,
                paths: EndpointPaths {
                    live: env_or_default("LIVE_FEED_PATH", "/live"),
                    pending: env_or_default("LIVE_FEED_PENDING_PATH", "/pending"),
                    snapshot: env_or_default("LIVE_FEED_SNAPSHOT_PATH", "/snapshot"),
                    health: env_or_default("LIVE_FEED_HEALTH_PATH", "/health"),
                },
            },
            auth: AuthConfig {
                shared_secret: env_first(&["LIVE_FEED_SHARED_SECRET", "NEXT_PUBLIC_LIVE_FEED_SECRET"]),
                header_name: env_or_default("LIVE_FEED_SHARED_SECRET_HEADER", "x-live-feed-secret")
                    .to_ascii_lowercase(),
                query_name: env_or_default("LIVE_FEED_SHARED_SECRET_QUERY", "secret"),
            },
            upstream: UpstreamConfig {
                contract_id: env_first(&["NEXT_PUBLIC_CANVAS_CONTRACT"]),
                feed_url: env_first(&["HATHOR_WS_URL", "NEXT_PUBLIC_HATHOR_WS_URL"]),
                node_url: env_first(&[
                    "LIVE_FEED_NODE_URL",
                    "NEXT_PUBLIC_HATHOR_NODE_URL",
                    "HATHOR_NODE_URL",
                ])
                .or_else(|| Some("http://localhost:8080/v1a".into())),
                wallet_target: env_first(&[
                    "LIVE_FEED_WALLET_TARGET",
                    "NEXT_PUBLIC_WALLET_TARGET",
                    "WALLET_TARGET",
                ]),
                wallet_id: env_first(&["LIVE_FEED_WALLET_ID", "NEXT_PUBLIC_WALLET_ID", "WALLET_ID"]),
                chain_id: env_first(&[
                    "LIVE_FEED_HATHOR_CHAIN",
                    "NEXT_PUBLIC_HATHOR_CHAIN",
                    "HATHOR_CHAIN",
                ])
                .unwrap_or_default(),
                decoder_url: env_first(&["LIVE_FEED_DECODER_URL"]),
                decoder_cache_capacity: env_or_parse("LIVE_FEED_DECODER_CACHE_CAPACITY", 10_000)?,
                request_timeout: Duration::from_secs(env_or_parse(
                    "LIVE_FEED_REQUEST_TIMEOUT_SECS",
                    10,
                )?),
            },
            indexer: IndexerConfig::resolve(|key| env::var(key).ok()),
            live: LiveConfig {
                heartbeat_interval: Duration::from_millis(env_or_parse(
                    "LIVE_FEED_HEARTBEAT_MS",
                    15_000,
                )?),
                pending_ttl: Duration::from_millis(env_or_parse(
                    "LIVE_FEED_PENDING_TTL_MS",
                    300_000, // 5mins
                )?),
                subscriber_buffer: env_or_parse("LIVE_FEED_SUBSCRIBER_BUFFER", 256)?,
            },
        })
    }

    pub fn validate(&self) -> Result<()> {
        let paths = &self.server.paths;
        for path in [&paths.live, &paths.pending, &paths.snapshot, &paths.health] {
            if !path.starts_with('/') {
                return Err(AppError::InvalidConfig(format!(
                    "Endpoint path '{path}' must start with '/'"
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for path in [&paths.live, &paths.pending, &paths.snapshot, &paths.health] {
            if !seen.insert(path.as_str()) {
                return Err(AppError::InvalidConfig(format!(
                    "Endpoint path '{path}' is configured twice"
                )));
            }
        }

        if self.live.heartbeat_interval.is_zero() || self.live.pending_ttl.is_zero() {
            return Err(AppError::InvalidConfig(
                "Heartbeat interval and pending TTL must be positive".into(),
            ));
        }

        if self.live.subscriber_buffer == 0 {
            return Err(AppError::InvalidConfig(
                "Subscriber buffer must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Resolves the state endpoint according to the configured backend preference.
    pub fn state_backend(&self) -> Option<StateBackend> {
        let wallet = self
            .upstream
            .wallet_target
            .as_ref()
            .map(|target| StateBackend::Wallet {
                target: target.clone(),
                wallet_id: self.upstream.wallet_id.clone(),
            });
        let node = self
            .upstream
            .node_url
            .as_ref()
            .map(|url| StateBackend::Node { url: url.clone() });

        match self.indexer.state_backend {
            StateBackendMode::Wallet => wallet,
            StateBackendMode::Node => node,
            StateBackendMode::Auto => wallet.or(node),
        }
    }

    /// Network name handed to the argument decoder, e.g. `hathor:testnet` -> `testnet`.
    pub fn network_name(&self) -> String {
        let raw = self.upstream.chain_id.trim();
        if raw.is_empty() {
            return "testnet".into();
        }
        match raw.rsplit(':').next() {
            Some(tail) if !tail.is_empty() => tail.to_string(),
            _ => raw.to_string(),
        }
    }

    /// The indexer only runs when forced or when no confirmed feed is configured.
    pub fn should_run_indexer(&self) -> bool {
        if self.indexer.disabled {
            return false;
        }
        if self.indexer.force {
            return true;
        }
        self.upstream.feed_url.is_none()
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    parse_or(key, env::var(key).ok(), default)
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidConfig(format!("Invalid value for {key}"))),
        _ => Ok(default),
    }
}

/// First non-empty value among `keys`, in order.
fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .map(|val| val.trim().to_string())
        .find(|val| !val.is_empty())
}

fn is_true(raw: Option<String>) -> bool {
    raw.is_some_and(|val| val.trim().eq_ignore_ascii_case("true"))
}

fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    env::var(key)
        .map(|val| {
            val.split(',')
                .map(|str_val| str_val.trim().to_string())
                .filter(|str_val| !str_val.is_empty())
                .collect()
        })
        .unwrap_or(default)
}
