// 🏷️ Category Entity - expense quota categories ("sub-cotas")
//
// Built from the distinct expense descriptions, e.g. "COMBUSTÍVEIS E
// LUBRIFICANTES." or "PASSAGENS AÉREAS".

use super::NormalizedEntity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Category { name: name.into() }
    }
}

impl NormalizedEntity for Category {
    const KIND: &'static str = "category";

    fn from_key(key: String) -> Self {
        Category { name: key }
    }

    fn key(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_matches_accented_names() {
        let category = Category::new("PASSAGENS AÉREAS");
        assert!(category.matches("passagens aéreas"));
        assert!(!category.matches("PASSAGENS AEREAS"));
    }
}
