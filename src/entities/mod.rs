// Entity Models - the normalized side of the expense database
//
// Region, Category and Party are plain value entities keyed by a single
// string. Legislator adds a registration id and a Party link. A
// FiscalDocument borrows the entities it links to from the sets built by
// earlier stages.

pub mod region;
pub mod category;
pub mod party;
pub mod legislator;
pub mod fiscal_document;

pub use region::Region;
pub use category::Category;
pub use party::Party;
pub use legislator::{Legislator, LegislatorKey};
pub use fiscal_document::{FiscalDocument, FiscalDocumentRow};

/// An entity identified by one canonicalized string
pub trait NormalizedEntity: Clone + std::fmt::Debug {
    /// Human-readable kind, used in log lines
    const KIND: &'static str;

    fn from_key(key: String) -> Self;

    fn key(&self) -> &str;

    /// Case-insensitive comparison of the key
    fn matches(&self, value: &str) -> bool {
        crate::parser::eq_ignore_case(self.key(), value)
    }
}
