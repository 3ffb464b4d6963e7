// Fiscal Normalizer - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;     // Defaults, log interval, legislature window
pub mod db;         // Source import + SQLite store
pub mod entities;   // Region, Category, Party, Legislator, FiscalDocument
pub mod error;
pub mod linker;     // Stage 5: fiscal documents
pub mod normalizer; // Stages 1-4: reference entities
pub mod parser;     // Null-safe text + numeric/date parsing
pub mod pipeline;   // Stage ordering + transactions
pub mod progress;
pub mod store;      // ExpenseStore trait + InMemoryStore

// Re-export commonly used types
pub use config::{LegislatureWindow, NormalizerConfig};
pub use db::{
    RawExpenseRecord, SqliteStore,
    load_csv, setup_database, insert_expenses, table_counts,
};
pub use entities::{
    Category, FiscalDocument, FiscalDocumentRow, Legislator, LegislatorKey,
    NormalizedEntity, Party, Region,
};
pub use error::{NormalizeError, ParseError, StorageError, StorageResult};
pub use linker::{DocumentLinker, Exclusion, LinkOutcome, LinkReport, SkippedRecord};
pub use normalizer::{normalize_entities, normalize_legislators, Normalizable, Normalized};
pub use pipeline::{Pipeline, PipelineError, RunReport, Stage, StageOutcome, StageReport};
pub use progress::ProgressLog;
pub use store::{ExpenseStore, InMemoryStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
