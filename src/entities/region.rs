// 🗺️ Region Entity - one row per distinct state code (UF)

use super::NormalizedEntity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// State code, e.g. "SP"; the configured default when the source is blank
    pub code: String,
}

impl Region {
    pub fn new(code: impl Into<String>) -> Self {
        Region { code: code.into() }
    }
}

impl NormalizedEntity for Region {
    const KIND: &'static str = "region";

    fn from_key(key: String) -> Self {
        Region { code: key }
    }

    fn key(&self) -> &str {
        &self.code
    }
}
