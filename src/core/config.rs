use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ServiceConfig: file-based config loader (beacon-resolver.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "BEACON_RESOLVER_CONFIG";

/// Top-level config loaded from `beacon-resolver.json`.
///
/// Every field is optional; the `resolve_*` helpers apply JSON → env var → default.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ServiceConfig {
    /// Listen port. `--port` on the command line wins over everything.
    pub port: Option<u16>,
    /// Total per-request budget for outbound fetches.
    pub http_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    /// Age after which a served record triggers a background refresh.
    pub staleness_secs: Option<u64>,
    /// Max records held by the in-memory metadata store.
    pub store_capacity: Option<u64>,
    pub user_agent: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl ServiceConfig {
    /// Port: JSON field → `BEACON_RESOLVER_PORT` → `PORT` → 8080.
    pub fn resolve_port(&self) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        ["BEACON_RESOLVER_PORT", "PORT"]
            .iter()
            .find_map(|k| env_parse::<u16>(k))
            .unwrap_or(8080)
    }

    /// Fetch timeout: JSON field → `HTTP_TIMEOUT_SECS` → 30s.
    pub fn resolve_http_timeout(&self) -> Duration {
        let secs = self
            .http_timeout_secs
            .or_else(|| env_parse("HTTP_TIMEOUT_SECS"))
            .unwrap_or(30);
        Duration::from_secs(secs)
    }

    /// Connect timeout: JSON field → `HTTP_CONNECT_TIMEOUT_SECS` → 10s.
    pub fn resolve_connect_timeout(&self) -> Duration {
        let secs = self
            .connect_timeout_secs
            .or_else(|| env_parse("HTTP_CONNECT_TIMEOUT_SECS"))
            .unwrap_or(10);
        Duration::from_secs(secs)
    }

    /// Staleness window: JSON field → `STALENESS_SECS` → 300s (5 minutes).
    pub fn resolve_staleness(&self) -> chrono::Duration {
        let secs = self
            .staleness_secs
            .or_else(|| env_parse("STALENESS_SECS"))
            .unwrap_or(300);
        i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::seconds(300))
    }

    /// Store capacity: JSON field → `STORE_CAPACITY` → 100_000 records.
    pub fn resolve_store_capacity(&self) -> u64 {
        self.store_capacity
            .or_else(|| env_parse("STORE_CAPACITY"))
            .unwrap_or(100_000)
    }

    /// User agent: JSON field → `USER_AGENT` → `beacon-resolver/<version>`.
    pub fn resolve_user_agent(&self) -> String {
        if let Some(ua) = &self.user_agent {
            if !ua.trim().is_empty() {
                return ua.clone();
            }
        }
        std::env::var("USER_AGENT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("beacon-resolver/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// Load `beacon-resolver.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `BEACON_RESOLVER_CONFIG` env var path
/// 2. `./beacon-resolver.json`
/// 3. `../beacon-resolver.json`
/// 4. `~/.beacon-resolver/config.json`
///
/// Missing file → `ServiceConfig::default()` (silent, all env-var fallbacks apply).
/// Parse error → log a warning, return `ServiceConfig::default()`.
pub fn load_service_config() -> ServiceConfig {
    let mut candidates = vec![
        PathBuf::from("beacon-resolver.json"),
        PathBuf::from("../beacon-resolver.json"),
    ];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".beacon-resolver").join("config.json"));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match parse_service_config(&contents) {
            Ok(cfg) => {
                tracing::info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "config parse error at {}: {}, using defaults",
                    path.display(),
                    e
                );
                ServiceConfig::default()
            }
        };
    }

    ServiceConfig::default()
}

pub fn parse_service_config(contents: &str) -> Result<ServiceConfig, serde_json::Error> {
    serde_json::from_str::<ServiceConfig>(contents)
}
