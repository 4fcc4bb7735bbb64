//! Server: a member of a backend's pool.

use serde::{Deserialize, Serialize};

use super::Toggle;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    /// Health checking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Toggle>,
}

impl Server {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    pub fn with_address(mut self, address: impl Into<String>, port: u16) -> Self {
        self.address = Some(address.into());
        self.port = Some(port);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_check(mut self, check: impl Into<Toggle>) -> Self {
        self.check = Some(check.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_encoding() {
        let server = Server::new("s1").with_address("10.0.0.5", 8080).with_check(true);
        let json: serde_json::Value = serde_json::to_value(&server).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "s1", "address": "10.0.0.5", "port": 8080, "check": "enabled"})
        );
    }
}
