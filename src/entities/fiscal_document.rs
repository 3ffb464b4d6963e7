// 🧾 Fiscal Document Entity - the normalized expense record
//
// Parsed from one RawExpenseRecord. Region, legislator and category are
// borrowed from the entity sets built by the earlier stages; the document
// never owns them.

use super::{Category, Legislator, Region};
use crate::db::RawExpenseRecord;
use crate::error::ParseError;
use crate::parser::{
    parse_decimal, parse_decimal_or, parse_int, parse_int_or, parse_issue_date, parse_month,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct FiscalDocument<'a> {
    // ========================================================================
    // PARSED FIELDS
    // ========================================================================
    pub issue_date: Option<NaiveDateTime>,

    /// 0 = invoice, 1 = simple receipt, 2 = foreign expense
    pub document_type: i32,

    pub year: i32,
    pub month: u32,
    pub installment: i32,

    // ========================================================================
    // FREE TEXT (copied as-is)
    // ========================================================================
    pub description: Option<String>,
    pub category_description: Option<String>,
    pub beneficiary: Option<String>,
    pub document_number: Option<String>,
    pub payer_id: Option<String>,
    pub passenger_name: Option<String>,
    pub travel_segment: Option<String>,

    // ========================================================================
    // AMOUNTS
    // ========================================================================
    pub document_value: f64,
    pub disallowed_value: f64,
    pub net_value: f64,

    // ========================================================================
    // LINKS
    // ========================================================================
    pub region: Option<&'a Region>,
    pub legislator: Option<&'a Legislator>,
    pub category: Option<&'a Category>,

    /// Stamped right before the document is persisted
    pub created_at: Option<DateTime<Utc>>,
}

impl<'a> FiscalDocument<'a> {
    /// Parse every typed field of a raw record. Links are left unset.
    pub fn parse(record: &RawExpenseRecord) -> Result<Self, ParseError> {
        Ok(FiscalDocument {
            issue_date: parse_issue_date("issue date", record.issue_date.as_deref())?,
            document_type: parse_int("document type", record.document_type.as_deref())?,
            year: parse_int("year", record.year.as_deref())?,
            month: parse_month("month", record.month.as_deref())?,
            installment: parse_int_or("installment", record.installment.as_deref(), 0)?,
            description: record.description.clone(),
            category_description: record.category_description.clone(),
            beneficiary: record.beneficiary.clone(),
            document_number: record.document_number.clone(),
            payer_id: record.payer_id.clone(),
            passenger_name: record.passenger_name.clone(),
            travel_segment: record.travel_segment.clone(),
            document_value: parse_decimal("document value", record.document_value.as_deref())?,
            disallowed_value: parse_decimal_or(
                "disallowed value",
                record.disallowed_value.as_deref(),
                0.0,
            )?,
            net_value: parse_decimal("net value", record.net_value.as_deref())?,
            region: None,
            legislator: None,
            category: None,
            created_at: None,
        })
    }

    /// Negative net values are credits back to the payer, not reimbursements
    pub fn is_reimbursable(&self) -> bool {
        self.net_value >= 0.0
    }

    pub fn stamp_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    /// Owned, flat form with links reduced to their keys
    pub fn to_row(&self) -> FiscalDocumentRow {
        FiscalDocumentRow {
            issue_date: self.issue_date,
            document_type: self.document_type,
            year: self.year,
            month: self.month,
            installment: self.installment,
            description: self.description.clone(),
            category_description: self.category_description.clone(),
            beneficiary: self.beneficiary.clone(),
            document_number: self.document_number.clone(),
            payer_id: self.payer_id.clone(),
            passenger_name: self.passenger_name.clone(),
            travel_segment: self.travel_segment.clone(),
            document_value: self.document_value,
            disallowed_value: self.disallowed_value,
            net_value: self.net_value,
            region_code: self.region.map(|r| r.code.clone()),
            legislator_id: self.legislator.map(|l| l.id.clone()),
            category_name: self.category.map(|c| c.name.clone()),
            created_at: self.created_at,
        }
    }
}

/// What a store actually keeps for a fiscal document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalDocumentRow {
    pub issue_date: Option<NaiveDateTime>,
    pub document_type: i32,
    pub year: i32,
    pub month: u32,
    pub installment: i32,
    pub description: Option<String>,
    pub category_description: Option<String>,
    pub beneficiary: Option<String>,
    pub document_number: Option<String>,
    pub payer_id: Option<String>,
    pub passenger_name: Option<String>,
    pub travel_segment: Option<String>,
    pub document_value: f64,
    pub disallowed_value: f64,
    pub net_value: f64,
    pub region_code: Option<String>,
    pub legislator_id: Option<String>,
    pub category_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
