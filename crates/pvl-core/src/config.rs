use serde::{Deserialize, Serialize};

/// The only document version this interpreter understands.
pub const SUPPORTED_PVL_VERSION: i64 = 1;

/// Process-wide interpreter settings, passed explicitly into every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvlConfig {
    pub supported_version: i64,
    pub enabled: bool,
}

impl Default for PvlConfig {
    fn default() -> Self {
        Self {
            supported_version: SUPPORTED_PVL_VERSION,
            enabled: true,
        }
    }
}
