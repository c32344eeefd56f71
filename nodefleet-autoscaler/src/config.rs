use std::env;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use nodefleet_common::discovery::split_specs;
use nodefleet_common::AutoscalerError;
use nodefleet_providers::DEFAULT_UPCLOUD_API_URL;

use crate::context::Timeouts;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8085";
const DEFAULT_PASSWORD_FILE: &str = "/run/secrets/upcloud_password";

/// Inputs of `FleetManager::new`.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    pub cluster_id: String,
    /// 0 means "use the plan maximum".
    pub max_nodes_total: usize,
    /// Raw `<minSize>:<maxSize>:<nodeGroupName>` specs.
    pub node_group_specs: Vec<String>,
    pub scale_to_zero: bool,
    pub timeouts: Timeouts,
}

impl ManagerConfig {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            max_nodes_total: 0,
            node_group_specs: Vec::new(),
            scale_to_zero: false,
            timeouts: Timeouts::default(),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Process configuration of the `nodefleet-autoscaler` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoscalerConfig {
    /// `upcloud` (default) or `mock`.
    pub provider: String,
    pub api_url: String,
    /// Required for the `upcloud` provider.
    pub credentials: Option<Credentials>,
    pub user_agent: String,
    pub refresh_interval: Duration,
    pub listen_addr: SocketAddr,
    pub manager: ManagerConfig,
}

impl AutoscalerConfig {
    pub fn from_env() -> Result<Self, AutoscalerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AutoscalerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = var("NODEFLEET_PROVIDER")
            .unwrap_or_else(|| "upcloud".to_string())
            .to_lowercase();

        let cluster_id = var("UPCLOUD_CLUSTER_ID")
            .ok_or_else(|| AutoscalerError::configuration("UPCLOUD_CLUSTER_ID must be set"))?;

        let credentials = match provider.as_str() {
            "upcloud" => {
                let username = var("UPCLOUD_USERNAME")
                    .ok_or_else(|| AutoscalerError::configuration("UPCLOUD_USERNAME must be set"))?;
                // Prefer *_FILE for secrets (Docker/K8s friendly), fallback to env var.
                let password_file =
                    var("UPCLOUD_PASSWORD_FILE").unwrap_or_else(|| DEFAULT_PASSWORD_FILE.to_string());
                let password = fs::read_to_string(&password_file)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .or_else(|| var("UPCLOUD_PASSWORD"))
                    .ok_or_else(|| {
                        AutoscalerError::configuration(
                            "UPCLOUD_PASSWORD or UPCLOUD_PASSWORD_FILE must be set",
                        )
                    })?;
                Some(Credentials { username, password })
            }
            "mock" => None,
            other => {
                return Err(AutoscalerError::configuration(format!(
                    "unknown NODEFLEET_PROVIDER '{}'",
                    other
                )))
            }
        };

        let manager = ManagerConfig {
            cluster_id,
            max_nodes_total: parse_or(&var, "NODEFLEET_MAX_NODES_TOTAL", 0usize)?,
            node_group_specs: split_specs(var("NODEFLEET_NODE_GROUPS").as_deref()),
            scale_to_zero: parse_or(&var, "NODEFLEET_SCALE_TO_ZERO", false)?,
            timeouts: Timeouts::default(),
        };

        let refresh_secs: u64 = parse_or(&var, "NODEFLEET_REFRESH_INTERVAL_SECS", 10)?;
        if refresh_secs == 0 {
            return Err(AutoscalerError::configuration(
                "NODEFLEET_REFRESH_INTERVAL_SECS must be >= 1",
            ));
        }

        Ok(Self {
            provider,
            api_url: var("UPCLOUD_API_URL").unwrap_or_else(|| DEFAULT_UPCLOUD_API_URL.to_string()),
            credentials,
            user_agent: var("NODEFLEET_USER_AGENT").unwrap_or_else(|| {
                format!("nodefleet-autoscaler/{}", env!("CARGO_PKG_VERSION"))
            }),
            refresh_interval: Duration::from_secs(refresh_secs),
            listen_addr: parse_or(
                &var,
                "NODEFLEET_LISTEN_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8085)),
            )?,
            manager,
        })
    }
}

fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T, AutoscalerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| {
            AutoscalerError::configuration(format!("invalid {} '{}': {}", key, raw, e))
        }),
    }
}
