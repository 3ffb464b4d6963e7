// 🔁 Entity Normalizers - distinct source strings → persisted entities
//
// Regions, categories and parties share one shape: canonicalize each
// distinct value with the not-null rule, collapse values that differ only
// in case, insert the ones storage does not already hold. Legislators are
// keyed on a tuple, link to a party and are always inserted.

use crate::config::NormalizerConfig;
use crate::entities::{Category, Legislator, NormalizedEntity, Party, Region};
use crate::error::{NormalizeError, StorageError, StorageResult};
use crate::parser::not_null;
use crate::store::ExpenseStore;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Entities observed in one stage, plus how many rows it read and wrote
#[derive(Debug, Clone)]
pub struct Normalized<E> {
    pub entities: Vec<E>,
    pub read: usize,
    pub persisted: usize,
    pub elapsed: Duration,
}

// ============================================================================
// SINGLE-KEY ENTITIES
// ============================================================================

/// Binds a single-key entity to its source column, default and store calls
pub trait Normalizable: NormalizedEntity {
    fn distinct_values<S: ExpenseStore + ?Sized>(store: &S) -> StorageResult<Vec<Option<String>>>;

    fn default_key(config: &NormalizerConfig) -> &str;

    fn exists<S: ExpenseStore + ?Sized>(store: &S, entity: &Self) -> StorageResult<bool>;

    fn save<S: ExpenseStore + ?Sized>(store: &mut S, entity: &Self) -> StorageResult<()>;
}

impl Normalizable for Region {
    fn distinct_values<S: ExpenseStore + ?Sized>(store: &S) -> StorageResult<Vec<Option<String>>> {
        store.list_distinct_region_codes()
    }

    fn default_key(config: &NormalizerConfig) -> &str {
        &config.default_region_code
    }

    fn exists<S: ExpenseStore + ?Sized>(store: &S, entity: &Self) -> StorageResult<bool> {
        store.region_exists(entity)
    }

    fn save<S: ExpenseStore + ?Sized>(store: &mut S, entity: &Self) -> StorageResult<()> {
        store.save_region(entity)
    }
}

impl Normalizable for Category {
    fn distinct_values<S: ExpenseStore + ?Sized>(store: &S) -> StorageResult<Vec<Option<String>>> {
        store.list_distinct_category_names()
    }

    fn default_key(config: &NormalizerConfig) -> &str {
        &config.default_category_name
    }

    fn exists<S: ExpenseStore + ?Sized>(store: &S, entity: &Self) -> StorageResult<bool> {
        store.category_exists(entity)
    }

    fn save<S: ExpenseStore + ?Sized>(store: &mut S, entity: &Self) -> StorageResult<()> {
        store.save_category(entity)
    }
}

impl Normalizable for Party {
    fn distinct_values<S: ExpenseStore + ?Sized>(store: &S) -> StorageResult<Vec<Option<String>>> {
        store.list_distinct_party_codes()
    }

    fn default_key(config: &NormalizerConfig) -> &str {
        &config.default_party_code
    }

    fn exists<S: ExpenseStore + ?Sized>(store: &S, entity: &Self) -> StorageResult<bool> {
        store.party_exists(entity)
    }

    fn save<S: ExpenseStore + ?Sized>(store: &mut S, entity: &Self) -> StorageResult<()> {
        store.save_party(entity)
    }
}

/// Canonicalize raw values and keep one entity per case-folded key.
/// The first spelling seen wins.
pub fn build_entities<E: NormalizedEntity>(raw: &[Option<String>], default: &str) -> Vec<E> {
    let mut entities: Vec<E> = Vec::with_capacity(raw.len());

    for value in raw {
        let key = not_null(value.as_deref(), default);
        if !entities.iter().any(|e| e.matches(&key)) {
            entities.push(E::from_key(key));
        }
    }

    entities
}

/// Normalize one single-key entity kind.
///
/// Returns every entity observed this run, whether it was inserted now or
/// already present. A storage error stops the loop and is returned.
pub fn normalize_entities<E, S>(
    store: &mut S,
    config: &NormalizerConfig,
) -> Result<Normalized<E>, NormalizeError>
where
    E: Normalizable,
    S: ExpenseStore + ?Sized,
{
    info!("Normalizing {} entities...", E::KIND);
    let start = Instant::now();

    let raw = E::distinct_values(store)?;
    let entities: Vec<E> = build_entities(&raw, E::default_key(config));

    let mut persisted = 0;
    for (iteration, entity) in entities.iter().enumerate() {
        let found = E::exists(store, entity).map_err(|e| save_failed(E::KIND, iteration, e))?;
        if !found {
            E::save(store, entity).map_err(|e| save_failed(E::KIND, iteration, e))?;
            persisted += 1;
        }
    }

    let elapsed = start.elapsed();
    info!(
        "{} normalization done in {}s: read {}, new {}",
        E::KIND,
        elapsed.as_secs(),
        raw.len(),
        persisted
    );

    Ok(Normalized {
        entities,
        read: raw.len(),
        persisted,
        elapsed,
    })
}

fn save_failed(kind: &str, iteration: usize, err: StorageError) -> NormalizeError {
    error!("Failed to save {} (iteration {}): {}", kind, iteration, err);
    NormalizeError::Storage(err)
}

// ============================================================================
// LEGISLATORS
// ============================================================================

/// Build and insert one legislator per distinct source tuple.
///
/// No existence check: every run inserts every tuple again. A registration
/// id that is not an integer aborts the stage before anything is written.
pub fn normalize_legislators<S>(
    store: &mut S,
    parties: &[Party],
    config: &NormalizerConfig,
) -> Result<Normalized<Legislator>, NormalizeError>
where
    S: ExpenseStore + ?Sized,
{
    info!("Normalizing legislator entities...");
    let start = Instant::now();

    let keys = store.list_distinct_legislators()?;

    let legislators = keys
        .iter()
        .map(|key| Legislator::from_key(key, parties, &config.default_party_code))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            error!("Cannot build legislator: {}", e);
            NormalizeError::Parse(e)
        })?;

    let mut persisted = 0;
    for (iteration, legislator) in legislators.iter().enumerate() {
        store
            .save_legislator(legislator)
            .map_err(|e| save_failed("legislator", iteration, e))?;
        persisted += 1;
    }

    let elapsed = start.elapsed();
    info!(
        "legislator normalization done in {}s: read {}, new {}",
        elapsed.as_secs(),
        keys.len(),
        persisted
    );

    Ok(Normalized {
        entities: legislators,
        read: keys.len(),
        persisted,
        elapsed,
    })
}
