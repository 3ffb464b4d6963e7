// 🗄️ Expense Store - the persistence collaborator the pipeline talks to
//
// The core only needs bulk reads, distinct-value reads, exact-match
// existence checks and single-row writes. Stage transactions are optional
// hooks; stores without transactions keep the default no-ops.

use crate::db::RawExpenseRecord;
use crate::entities::{
    Category, FiscalDocument, FiscalDocumentRow, Legislator, LegislatorKey, Party, Region,
};
use crate::error::{StorageError, StorageResult};
use crate::pipeline::Stage;
use tracing::debug;

pub trait ExpenseStore {
    // === Source reads ===

    /// Every raw expense record
    fn list_expenses(&self) -> StorageResult<Vec<RawExpenseRecord>>;

    fn list_distinct_region_codes(&self) -> StorageResult<Vec<Option<String>>>;

    fn list_distinct_category_names(&self) -> StorageResult<Vec<Option<String>>>;

    fn list_distinct_party_codes(&self) -> StorageResult<Vec<Option<String>>>;

    fn list_distinct_legislators(&self) -> StorageResult<Vec<LegislatorKey>>;

    // === Existence checks (exact match) ===

    fn region_exists(&self, region: &Region) -> StorageResult<bool>;

    fn category_exists(&self, category: &Category) -> StorageResult<bool>;

    fn party_exists(&self, party: &Party) -> StorageResult<bool>;

    // === Writes ===

    fn save_region(&mut self, region: &Region) -> StorageResult<()>;

    fn save_category(&mut self, category: &Category) -> StorageResult<()>;

    fn save_party(&mut self, party: &Party) -> StorageResult<()>;

    fn save_legislator(&mut self, legislator: &Legislator) -> StorageResult<()>;

    fn save_fiscal_document(&mut self, document: &FiscalDocument<'_>) -> StorageResult<()>;

    // === Stage transactions ===

    fn begin_stage(&mut self, _stage: Stage) -> StorageResult<()> {
        Ok(())
    }

    fn commit_stage(&mut self, _stage: Stage) -> StorageResult<()> {
        Ok(())
    }

    fn rollback_stage(&mut self, _stage: Stage) -> StorageResult<()> {
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Rejects writes of one entity kind once `after` of them have succeeded
/// since the plan was armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePlan {
    pub kind: &'static str,
    pub after: usize,
    pub succeeded: usize,
}

/// Row counts captured at `begin_stage`, restored on rollback
#[derive(Debug, Clone, Copy, Default)]
struct Snapshot {
    regions: usize,
    categories: usize,
    parties: usize,
    legislators: usize,
    documents: usize,
}

/// Vec-backed store for tests and small embedded runs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    pub expenses: Vec<RawExpenseRecord>,
    pub regions: Vec<Region>,
    pub categories: Vec<Category>,
    pub parties: Vec<Party>,
    pub legislators: Vec<Legislator>,
    pub documents: Vec<FiscalDocumentRow>,
    failure: Option<FailurePlan>,
    snapshot: Option<Snapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expenses(expenses: Vec<RawExpenseRecord>) -> Self {
        InMemoryStore {
            expenses,
            ..Self::default()
        }
    }

    /// Make writes of `kind` fail after `after` successful ones
    pub fn fail_saves(&mut self, kind: &'static str, after: usize) {
        self.failure = Some(FailurePlan {
            kind,
            after,
            succeeded: 0,
        });
    }

    /// Count a write of `kind` against the plan, or refuse it
    fn check_failure(&mut self, kind: &'static str) -> StorageResult<()> {
        match self.failure.as_mut() {
            Some(plan) if plan.kind == kind => {
                if plan.succeeded >= plan.after {
                    return Err(StorageError::Rejected(format!(
                        "{} write #{} refused",
                        kind,
                        plan.succeeded + 1
                    )));
                }
                plan.succeeded += 1;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn distinct<F>(&self, field: F) -> Vec<Option<String>>
    where
        F: Fn(&RawExpenseRecord) -> &Option<String>,
    {
        let mut values: Vec<Option<String>> = Vec::new();
        for record in &self.expenses {
            let value = field(record);
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        values
    }
}

impl ExpenseStore for InMemoryStore {
    fn list_expenses(&self) -> StorageResult<Vec<RawExpenseRecord>> {
        Ok(self.expenses.clone())
    }

    fn list_distinct_region_codes(&self) -> StorageResult<Vec<Option<String>>> {
        Ok(self.distinct(|r| &r.region_code))
    }

    fn list_distinct_category_names(&self) -> StorageResult<Vec<Option<String>>> {
        Ok(self.distinct(|r| &r.description))
    }

    fn list_distinct_party_codes(&self) -> StorageResult<Vec<Option<String>>> {
        Ok(self.distinct(|r| &r.party_code))
    }

    fn list_distinct_legislators(&self) -> StorageResult<Vec<LegislatorKey>> {
        let mut keys: Vec<LegislatorKey> = Vec::new();
        for record in &self.expenses {
            let key = LegislatorKey {
                name: record.legislator_name.clone(),
                party_code: record.party_code.clone(),
                registration_id: record.registration_id.clone(),
            };
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn region_exists(&self, region: &Region) -> StorageResult<bool> {
        Ok(self.regions.iter().any(|r| r == region))
    }

    fn category_exists(&self, category: &Category) -> StorageResult<bool> {
        Ok(self.categories.iter().any(|c| c == category))
    }

    fn party_exists(&self, party: &Party) -> StorageResult<bool> {
        Ok(self.parties.iter().any(|p| p == party))
    }

    fn save_region(&mut self, region: &Region) -> StorageResult<()> {
        self.check_failure("region")?;
        self.regions.push(region.clone());
        debug!("Saved region {}", region.code);
        Ok(())
    }

    fn save_category(&mut self, category: &Category) -> StorageResult<()> {
        self.check_failure("category")?;
        self.categories.push(category.clone());
        debug!("Saved category {}", category.name);
        Ok(())
    }

    fn save_party(&mut self, party: &Party) -> StorageResult<()> {
        self.check_failure("party")?;
        self.parties.push(party.clone());
        debug!("Saved party {}", party.code);
        Ok(())
    }

    fn save_legislator(&mut self, legislator: &Legislator) -> StorageResult<()> {
        self.check_failure("legislator")?;
        self.legislators.push(legislator.clone());
        debug!("Saved legislator {} ({})", legislator.name, legislator.id);
        Ok(())
    }

    fn save_fiscal_document(&mut self, document: &FiscalDocument<'_>) -> StorageResult<()> {
        self.check_failure("fiscal document")?;
        self.documents.push(document.to_row());
        Ok(())
    }

    fn begin_stage(&mut self, _stage: Stage) -> StorageResult<()> {
        self.snapshot = Some(Snapshot {
            regions: self.regions.len(),
            categories: self.categories.len(),
            parties: self.parties.len(),
            legislators: self.legislators.len(),
            documents: self.documents.len(),
        });
        Ok(())
    }

    fn commit_stage(&mut self, _stage: Stage) -> StorageResult<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback_stage(&mut self, _stage: Stage) -> StorageResult<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.regions.truncate(snapshot.regions);
            self.categories.truncate(snapshot.categories);
            self.parties.truncate(snapshot.parties);
            self.legislators.truncate(snapshot.legislators);
            self.documents.truncate(snapshot.documents);
        }
        Ok(())
    }
}
