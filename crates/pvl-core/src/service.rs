use crate::error::ProofError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Remote service a proof is made against, keyed the way PVL documents name
/// them under `services`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Twitter,
    Github,
    Reddit,
    Coinbase,
    Hackernews,
    Dns,
    Rooter,
    Web,
}

impl ServiceType {
    pub const ALL: [ServiceType; 8] = [
        ServiceType::Twitter,
        ServiceType::Github,
        ServiceType::Reddit,
        ServiceType::Coinbase,
        ServiceType::Hackernews,
        ServiceType::Dns,
        ServiceType::Rooter,
        ServiceType::Web,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Twitter => "twitter",
            ServiceType::Github => "github",
            ServiceType::Reddit => "reddit",
            ServiceType::Coinbase => "coinbase",
            ServiceType::Hackernews => "hackernews",
            ServiceType::Dns => "dns",
            ServiceType::Rooter => "rooter",
            ServiceType::Web => "web",
        }
    }

    pub fn is_dns(self) -> bool {
        self == ServiceType::Dns
    }

    /// Services identified by a hostname rather than a remote username.
    pub fn is_webish(self) -> bool {
        matches!(self, ServiceType::Dns | ServiceType::Web)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceType::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| ProofError::invalid_pvl(format!("Unsupported service {s}")))
    }
}
