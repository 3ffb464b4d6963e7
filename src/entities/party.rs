// Party Entity - political party by acronym

use super::NormalizedEntity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    /// Party acronym, e.g. "PT", "PSDB"
    pub code: String,
}

impl Party {
    pub fn new(code: impl Into<String>) -> Self {
        Party { code: code.into() }
    }
}

impl NormalizedEntity for Party {
    const KIND: &'static str = "party";

    fn from_key(key: String) -> Self {
        Party { code: key }
    }

    fn key(&self) -> &str {
        &self.code
    }
}
