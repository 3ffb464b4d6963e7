// 🔗 Document Linker - raw expense rows → fiscal documents
//
// Each raw record is parsed and linked against the entity sets built by
// the earlier stages. Matching is a linear scan where the first hit wins,
// so duplicate keys in a set resolve the same way every run.
//
// A record that fails to parse is skipped and counted; the batch goes on.
// Storage errors while persisting the accepted documents end the stage.

use crate::config::NormalizerConfig;
use crate::db::RawExpenseRecord;
use crate::entities::{Category, FiscalDocument, Legislator, NormalizedEntity, Region};
use crate::error::{NormalizeError, ParseError};
use crate::parser::{non_blank, not_null};
use crate::progress::ProgressLog;
use crate::store::ExpenseStore;
use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

// ============================================================================
// PER-RECORD OUTCOME
// ============================================================================

/// Why a well-formed record was left out
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Exclusion {
    /// Negative net value: a credit to the payer, not a reimbursement
    Credit { net_value: f64 },

    /// Outside the configured legislature window
    OutsideLegislature { year: i32, month: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome<'a> {
    Accepted(FiscalDocument<'a>),
    Excluded(Exclusion),
    Skipped(ParseError),
}

/// A record dropped because one of its fields did not parse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

/// Accepted documents of one batch plus what was left out
#[derive(Debug, Clone)]
pub struct Linked<'a> {
    pub documents: Vec<FiscalDocument<'a>>,
    pub read: usize,
    pub excluded: usize,
    pub skipped: Vec<SkippedRecord>,
}

// ============================================================================
// LINKER
// ============================================================================

pub struct DocumentLinker<'a> {
    regions: &'a [Region],
    legislators: &'a [Legislator],
    categories: &'a [Category],
    config: &'a NormalizerConfig,
}

impl<'a> DocumentLinker<'a> {
    pub fn new(
        regions: &'a [Region],
        legislators: &'a [Legislator],
        categories: &'a [Category],
        config: &'a NormalizerConfig,
    ) -> Self {
        DocumentLinker {
            regions,
            legislators,
            categories,
            config,
        }
    }

    pub fn resolve_region(&self, raw_code: Option<&str>) -> Option<&'a Region> {
        let code = not_null(raw_code, &self.config.default_region_code);
        self.regions.iter().find(|r| r.matches(&code))
    }

    /// Name and party must both match; a legislator without a party never does
    pub fn resolve_legislator(
        &self,
        raw_name: Option<&str>,
        raw_party: Option<&str>,
    ) -> Option<&'a Legislator> {
        let name = raw_name?.trim();
        let party_code = not_null(raw_party, &self.config.default_party_code);
        self.legislators
            .iter()
            .find(|l| l.matches(name, &party_code))
    }

    /// No not-null rule here: a blank description links to no category
    pub fn resolve_category(&self, raw_description: Option<&str>) -> Option<&'a Category> {
        let name = non_blank(raw_description)?;
        self.categories.iter().find(|c| c.matches(name))
    }

    /// Parse, link and apply the acceptance rules to one record
    pub fn link(&self, record: &RawExpenseRecord) -> LinkOutcome<'a> {
        let mut document = match FiscalDocument::parse(record) {
            Ok(document) => document,
            Err(e) => return LinkOutcome::Skipped(e),
        };

        document.region = self.resolve_region(record.region_code.as_deref());
        document.legislator = self.resolve_legislator(
            record.legislator_name.as_deref(),
            record.party_code.as_deref(),
        );
        document.category = self.resolve_category(record.description.as_deref());

        if !document.is_reimbursable() {
            return LinkOutcome::Excluded(Exclusion::Credit {
                net_value: document.net_value,
            });
        }

        if let Some(window) = &self.config.legislature_window {
            if !window.contains(document.year, document.month) {
                return LinkOutcome::Excluded(Exclusion::OutsideLegislature {
                    year: document.year,
                    month: document.month,
                });
            }
        }

        LinkOutcome::Accepted(document)
    }

    /// Link a whole batch. Parse failures are logged and skipped.
    pub fn link_all(&self, records: &[RawExpenseRecord], progress: &mut ProgressLog) -> Linked<'a> {
        let mut linked = Linked {
            documents: Vec::with_capacity(records.len()),
            read: records.len(),
            excluded: 0,
            skipped: Vec::new(),
        };

        for (index, record) in records.iter().enumerate() {
            match self.link(record) {
                LinkOutcome::Accepted(document) => linked.documents.push(document),
                LinkOutcome::Excluded(_) => linked.excluded += 1,
                LinkOutcome::Skipped(reason) => {
                    warn!("Skipping expense record {}: {}", index, reason);
                    linked.skipped.push(SkippedRecord {
                        index,
                        reason: reason.to_string(),
                    });
                }
            }

            progress.tick(|| format!("Linking fiscal documents: {}/{}", index + 1, records.len()));
        }

        linked
    }
}

// ============================================================================
// STAGE
// ============================================================================

/// Outcome of the document stage
#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub read: usize,
    pub accepted: usize,
    pub excluded: usize,
    pub skipped: Vec<SkippedRecord>,
    pub persisted: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Stamp and save every document. The first storage error is returned.
pub fn persist_documents<S>(
    store: &mut S,
    documents: &mut [FiscalDocument<'_>],
    progress: &mut ProgressLog,
) -> Result<usize, NormalizeError>
where
    S: ExpenseStore + ?Sized,
{
    let total = documents.len();
    let mut persisted = 0;

    for (iteration, document) in documents.iter_mut().enumerate() {
        document.stamp_created(Utc::now());
        store.save_fiscal_document(document).map_err(|e| {
            error!("Failed to save fiscal document (iteration {}): {}", iteration, e);
            NormalizeError::Storage(e)
        })?;
        persisted += 1;

        progress.tick(|| format!("Saving fiscal documents: {}/{}", persisted, total));
    }

    Ok(persisted)
}

/// Read every raw record, link it, persist the accepted documents
pub fn link_documents<S>(
    store: &mut S,
    regions: &[Region],
    legislators: &[Legislator],
    categories: &[Category],
    config: &NormalizerConfig,
) -> Result<LinkReport, NormalizeError>
where
    S: ExpenseStore + ?Sized,
{
    info!("Normalizing fiscal documents...");
    let start = Instant::now();
    let mut progress = ProgressLog::new(config.log_interval());

    info!("Reading expense records, this can take a few minutes...");
    let records = store.list_expenses()?;
    info!("Read {} expense records", records.len());

    let linker = DocumentLinker::new(regions, legislators, categories, config);
    let mut linked = linker.link_all(&records, &mut progress);

    info!("Saving {} fiscal documents...", linked.documents.len());
    let persisted = persist_documents(store, &mut linked.documents, &mut progress)?;

    let elapsed = start.elapsed();
    info!(
        "fiscal document normalization done in {}s: read {}, accepted {}, excluded {}, skipped {}",
        elapsed.as_secs(),
        linked.read,
        linked.documents.len(),
        linked.excluded,
        linked.skipped.len()
    );

    Ok(LinkReport {
        read: linked.read,
        accepted: linked.documents.len(),
        excluded: linked.excluded,
        skipped: linked.skipped,
        persisted,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LegislatureWindow;
    use crate::entities::Party;
    use crate::store::InMemoryStore;

    fn expense(region: Option<&str>, party: Option<&str>, name: &str, amount: &str) -> RawExpenseRecord {
        RawExpenseRecord {
            legislator_name: Some(name.to_string()),
            region_code: region.map(str::to_string),
            party_code: party.map(str::to_string),
            description: Some("TELEFONIA".to_string()),
            document_type: Some("0".to_string()),
            issue_date: Some("2016-03-02T00:00:00".to_string()),
            document_value: Some(amount.to_string()),
            disallowed_value: Some("0".to_string()),
            net_value: Some(amount.to_string()),
            month: Some("3".to_string()),
            year: Some("2016".to_string()),
            installment: Some("0".to_string()),
            ..RawExpenseRecord::default()
        }
    }

    struct Sets {
        regions: Vec<Region>,
        legislators: Vec<Legislator>,
        categories: Vec<Category>,
    }

    fn sets() -> Sets {
        Sets {
            regions: vec![Region::new("SP"), Region::new("UNDEFINED")],
            legislators: vec![
                Legislator::new("JOAO SILVA", Some(141), Some(Party::new("PT"))),
                Legislator::new("MARIA SOUZA", Some(77), Some(Party::new("PSDB"))),
            ],
            categories: vec![Category::new("TELEFONIA"), Category::new("OUTROS")],
        }
    }

    fn accepted(outcome: LinkOutcome<'_>) -> FiscalDocument<'_> {
        match outcome {
            LinkOutcome::Accepted(document) => document,
            other => panic!("expected accepted document, got {:?}", other),
        }
    }

    #[test]
    fn test_link_resolves_all_references() {
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);

        let doc = accepted(linker.link(&expense(Some("sp"), Some("pt"), "JOAO SILVA", "150,00")));

        assert_eq!(doc.net_value, 150.0);
        assert_eq!(doc.region.map(|r| r.code.as_str()), Some("SP"));
        assert_eq!(doc.legislator.map(|l| l.name.as_str()), Some("JOAO SILVA"));
        assert_eq!(doc.legislator.and_then(|l| l.party_code()), Some("PT"));
        assert_eq!(doc.category.map(|c| c.name.as_str()), Some("TELEFONIA"));
    }

    #[test]
    fn test_link_party_mismatch_leaves_legislator_unset() {
        let sets = Sets {
            legislators: vec![Legislator::new("JOAO SILVA", None, Some(Party::new("PSDB")))],
            ..sets()
        };
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);

        let doc = accepted(linker.link(&expense(Some("SP"), Some("PT"), "JOAO SILVA", "150,00")));

        assert!(doc.legislator.is_none());
        assert!(doc.region.is_some());
    }

    #[test]
    fn test_link_blank_region_uses_default_entity() {
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);

        let doc = accepted(linker.link(&expense(None, Some("PT"), "JOAO SILVA", "1,00")));
        assert_eq!(doc.region.map(|r| r.code.as_str()), Some("UNDEFINED"));

        let doc = accepted(linker.link(&expense(Some(" "), Some("PT"), "JOAO SILVA", "1,00")));
        assert_eq!(doc.region.map(|r| r.code.as_str()), Some("UNDEFINED"));
    }

    #[test]
    fn test_link_unknown_values_leave_links_unset() {
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);

        let mut raw = expense(Some("AC"), Some("PT"), "NOBODY", "1,00");
        raw.description = Some("LOCAÇÃO DE VEÍCULOS".to_string());
        let doc = accepted(linker.link(&raw));

        assert!(doc.region.is_none());
        assert!(doc.legislator.is_none());
        assert!(doc.category.is_none());
    }

    #[test]
    fn test_link_first_match_wins() {
        let regions = vec![Region::new("SP"), Region::new("sp")];
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&regions, &sets.legislators, &sets.categories, &config);

        let doc = accepted(linker.link(&expense(Some("sP"), Some("PT"), "JOAO SILVA", "1,00")));
        assert!(std::ptr::eq(doc.region.unwrap(), &regions[0]));
    }

    #[test]
    fn test_link_first_legislator_match_wins() {
        // same name and party under two registration ids
        let legislators = vec![
            Legislator::new("JOAO SILVA", Some(141), Some(Party::new("PT"))),
            Legislator::new("JOAO SILVA", Some(142), Some(Party::new("PT"))),
        ];
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &legislators, &sets.categories, &config);

        let doc = accepted(linker.link(&expense(Some("SP"), Some("pt"), "joao silva", "1,00")));
        assert!(std::ptr::eq(doc.legislator.unwrap(), &legislators[0]));
        assert_eq!(doc.legislator.and_then(|l| l.registration_id), Some(141));
    }

    #[test]
    fn test_link_first_category_match_wins() {
        let categories = vec![Category::new("TELEFONIA"), Category::new("telefonia")];
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &categories, &config);

        let mut raw = expense(Some("SP"), Some("PT"), "JOAO SILVA", "1,00");
        raw.description = Some("Telefonia".to_string());
        let doc = accepted(linker.link(&raw));

        assert!(std::ptr::eq(doc.category.unwrap(), &categories[0]));
    }

    #[test]
    fn test_link_missing_description_leaves_category_unset() {
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);

        let mut raw = expense(Some("SP"), Some("PT"), "JOAO SILVA", "1,00");
        raw.description = None;
        let doc = accepted(linker.link(&raw));
        assert!(doc.category.is_none());

        raw.description = Some("   ".to_string());
        let doc = accepted(linker.link(&raw));
        assert!(doc.category.is_none());

        raw.description = Some(" telefonia ".to_string());
        let doc = accepted(linker.link(&raw));
        assert_eq!(doc.category.map(|c| c.name.as_str()), Some("TELEFONIA"));
    }

    #[test]
    fn test_link_monetary_sign_boundary() {
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);

        assert!(matches!(
            linker.link(&expense(Some("SP"), Some("PT"), "JOAO SILVA", "0")),
            LinkOutcome::Accepted(_)
        ));
        assert!(matches!(
            linker.link(&expense(Some("SP"), Some("PT"), "JOAO SILVA", "0,01")),
            LinkOutcome::Accepted(_)
        ));
        assert_eq!(
            linker.link(&expense(Some("SP"), Some("PT"), "JOAO SILVA", "-0,01")),
            LinkOutcome::Excluded(Exclusion::Credit { net_value: -0.01 })
        );
    }

    #[test]
    fn test_link_unparseable_date_is_skipped() {
        let sets = sets();
        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);

        let mut raw = expense(Some("SP"), Some("PT"), "JOAO SILVA", "1,00");
        raw.issue_date = Some("not a date".to_string());

        match linker.link(&raw) {
            LinkOutcome::Skipped(reason) => assert_eq!(reason.field, "issue date"),
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_legislature_window_only_when_configured() {
        let sets = sets();
        let mut raw = expense(Some("SP"), Some("PT"), "JOAO SILVA", "1,00");
        raw.year = Some("2014".to_string());

        let config = NormalizerConfig::default();
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);
        assert!(matches!(linker.link(&raw), LinkOutcome::Accepted(_)));

        let config = NormalizerConfig {
            legislature_window: Some(LegislatureWindow::fifty_fifth()),
            ..NormalizerConfig::default()
        };
        let linker = DocumentLinker::new(&sets.regions, &sets.legislators, &sets.categories, &config);
        assert_eq!(
            linker.link(&raw),
            LinkOutcome::Excluded(Exclusion::OutsideLegislature { year: 2014, month: 3 })
        );
    }

    #[test]
    fn test_link_documents_partial_failure_tolerant() {
        let mut bad = expense(Some("SP"), Some("PT"), "JOAO SILVA", "5,00");
        bad.issue_date = Some("2016-13-45".to_string());

        let mut store = InMemoryStore::with_expenses(vec![
            expense(Some("SP"), Some("PT"), "JOAO SILVA", "150,00"),
            bad,
            expense(Some("SP"), Some("PSDB"), "MARIA SOUZA", "-3,00"),
            expense(Some("SP"), Some("PSDB"), "MARIA SOUZA", "20,00"),
        ]);
        let sets = sets();
        let config = NormalizerConfig::default();

        let report = link_documents(
            &mut store,
            &sets.regions,
            &sets.legislators,
            &sets.categories,
            &config,
        )
        .unwrap();

        assert_eq!(report.read, 4);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.persisted, 2);

        assert_eq!(store.documents.len(), 2);
        assert_eq!(store.documents[0].net_value, 150.0);
        assert_eq!(store.documents[1].net_value, 20.0);
        assert!(store.documents.iter().all(|d| d.created_at.is_some()));
        assert_eq!(store.documents[0].legislator_id.as_deref(), Some(sets.legislators[0].id.as_str()));
    }

    #[test]
    fn test_link_documents_storage_failure_is_fatal() {
        let mut store = InMemoryStore::with_expenses(vec![
            expense(Some("SP"), Some("PT"), "JOAO SILVA", "1,00"),
            expense(Some("SP"), Some("PT"), "JOAO SILVA", "2,00"),
            expense(Some("SP"), Some("PT"), "JOAO SILVA", "3,00"),
        ]);
        store.fail_saves("fiscal document", 1);
        let sets = sets();

        let result = link_documents(
            &mut store,
            &sets.regions,
            &sets.legislators,
            &sets.categories,
            &NormalizerConfig::default(),
        );

        assert!(matches!(result, Err(NormalizeError::Storage(_))));
        assert_eq!(store.documents.len(), 1);
    }
}
