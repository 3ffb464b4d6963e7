// 👤 Legislator Entity - a deputy and the party they were elected under
//
// Identity is a UUID assigned on creation. The same person appearing
// under two parties yields two legislators, one per (name, party) pair.

use super::Party;
use crate::error::ParseError;
use crate::parser::{eq_ignore_case, non_blank, not_null, parse_numeric_id};
use serde::{Deserialize, Serialize};

/// Distinct (name, party code, registration id) tuple read from the source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegislatorKey {
    pub name: Option<String>,
    pub party_code: Option<String>,
    pub registration_id: Option<String>,
}

impl LegislatorKey {
    pub fn new(name: &str, party_code: Option<&str>, registration_id: Option<&str>) -> Self {
        LegislatorKey {
            name: Some(name.to_string()),
            party_code: party_code.map(str::to_string),
            registration_id: registration_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislator {
    /// Stable identity (UUID)
    pub id: String,

    pub name: String,

    /// Chamber registration number ("ideCadastro"); unset for leadership
    /// accounts that are not a person
    pub registration_id: Option<i64>,

    /// Party matched by exact code; None when the code matched no party
    pub party: Option<Party>,
}

impl Legislator {
    pub fn new(name: impl Into<String>, registration_id: Option<i64>, party: Option<Party>) -> Self {
        Legislator {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            registration_id,
            party,
        }
    }

    /// Build from a distinct source tuple, resolving the party against `parties`.
    ///
    /// The party code goes through the not-null rule first; lookup is a
    /// case-sensitive exact match where the first hit wins.
    pub fn from_key(
        key: &LegislatorKey,
        parties: &[Party],
        default_party_code: &str,
    ) -> Result<Self, ParseError> {
        let name = non_blank(key.name.as_deref())
            .ok_or_else(|| ParseError::missing("legislator name"))?;
        let party_code = not_null(key.party_code.as_deref(), default_party_code);
        let registration_id = parse_numeric_id("registration id", key.registration_id.as_deref())?;

        let party = parties.iter().find(|p| p.code == party_code).cloned();

        Ok(Legislator::new(name, registration_id, party))
    }

    pub fn party_code(&self) -> Option<&str> {
        self.party.as_ref().map(|p| p.code.as_str())
    }

    /// Same name and same party, both compared without case
    pub fn matches(&self, name: &str, party_code: &str) -> bool {
        eq_ignore_case(&self.name, name)
            && self
                .party_code()
                .map(|code| eq_ignore_case(code, party_code))
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parties() -> Vec<Party> {
        vec![Party::new("PT"), Party::new("PSDB"), Party::new("OUTROS")]
    }

    #[test]
    fn test_legislator_creation() {
        let legislator = Legislator::new("JOAO SILVA", Some(141), Some(Party::new("PT")));

        assert!(!legislator.id.is_empty());
        assert_eq!(legislator.name, "JOAO SILVA");
        assert_eq!(legislator.registration_id, Some(141));
        assert_eq!(legislator.party_code(), Some("PT"));
    }

    #[test]
    fn test_from_key_resolves_party() {
        let key = LegislatorKey::new("JOAO SILVA", Some("PSDB"), Some("74646"));
        let legislator = Legislator::from_key(&key, &parties(), "OUTROS").unwrap();

        assert_eq!(legislator.party_code(), Some("PSDB"));
        assert_eq!(legislator.registration_id, Some(74646));
    }

    #[test]
    fn test_from_key_party_match_is_case_sensitive() {
        let key = LegislatorKey::new("JOAO SILVA", Some("pt"), None);
        let legislator = Legislator::from_key(&key, &parties(), "OUTROS").unwrap();

        assert!(legislator.party.is_none());
    }

    #[test]
    fn test_from_key_blank_party_uses_default() {
        let key = LegislatorKey::new("LIDERANÇA DO PT", None, None);
        let legislator = Legislator::from_key(&key, &parties(), "OUTROS").unwrap();

        assert_eq!(legislator.party_code(), Some("OUTROS"));
        assert_eq!(legislator.registration_id, None);
    }

    #[test]
    fn test_from_key_bad_registration_id() {
        let key = LegislatorKey::new("JOAO SILVA", Some("PT"), Some("n/a"));
        let err = Legislator::from_key(&key, &parties(), "OUTROS").unwrap_err();

        assert_eq!(err.field, "registration id");
    }

    #[test]
    fn test_from_key_null_name_is_error() {
        let key = LegislatorKey {
            name: None,
            party_code: Some("PT".to_string()),
            registration_id: Some("141".to_string()),
        };
        let err = Legislator::from_key(&key, &parties(), "OUTROS").unwrap_err();
        assert_eq!(err.field, "legislator name");

        let blank = LegislatorKey::new("  ", Some("PT"), None);
        assert!(Legislator::from_key(&blank, &parties(), "OUTROS").is_err());
    }

    #[test]
    fn test_from_key_party_first_exact_match_wins() {
        let parties = vec![Party::new("PT"), Party::new("pt"), Party::new("pt")];

        let key = LegislatorKey::new("JOAO SILVA", Some("pt"), None);
        let legislator = Legislator::from_key(&key, &parties, "OUTROS").unwrap();
        assert_eq!(legislator.party_code(), Some("pt"));

        let key = LegislatorKey::new("JOAO SILVA", Some("PT"), None);
        let legislator = Legislator::from_key(&key, &parties, "OUTROS").unwrap();
        assert_eq!(legislator.party_code(), Some("PT"));
    }

    #[test]
    fn test_from_key_unknown_party_leaves_link_unset() {
        let key = LegislatorKey::new("MARIA", Some("NOVO"), Some("1"));
        let legislator = Legislator::from_key(&key, &parties(), "OUTROS").unwrap();

        assert!(legislator.party.is_none());
        assert!(!legislator.matches("MARIA", "NOVO"));
    }

    #[test]
    fn test_matches_requires_name_and_party() {
        let legislator = Legislator::new("JOAO SILVA", None, Some(Party::new("PT")));

        assert!(legislator.matches("joao silva", "pt"));
        assert!(!legislator.matches("JOAO SILVA", "PSDB"));
        assert!(!legislator.matches("JOAO SOUZA", "PT"));
    }
}
