//! Closed keyword sets. Each variant serializes as its HAProxy keyword.

use serde::{Deserialize, Serialize};

/// Proxy mode of a frontend or backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Tcp,
    Http,
}

/// Load-balancing algorithm of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceAlgorithm {
    #[serde(rename = "roundrobin")]
    RoundRobin,
    #[serde(rename = "static-rr")]
    StaticRoundRobin,
    #[serde(rename = "leastconn")]
    LeastConn,
    #[serde(rename = "first")]
    First,
    #[serde(rename = "source")]
    Source,
    #[serde(rename = "uri")]
    Uri,
    #[serde(rename = "url_param")]
    UrlParam,
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "hash")]
    Hash,
}

/// `enabled` / `disabled` switch used by server options such as `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Enabled,
    Disabled,
}

impl From<bool> for Toggle {
    fn from(on: bool) -> Self {
        if on { Toggle::Enabled } else { Toggle::Disabled }
    }
}
