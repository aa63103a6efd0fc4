//! # Reporting Service
//!
//! Entry point for normalized reporting payloads coming from the case
//! services. Payloads missing a prerequisite (no field worker, unknown type,
//! ...) are logged and skipped rather than failing the caller; malformed
//! dates and quantities still propagate as errors.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::reports::{AnmReports, SaveOutcome};
use crate::rules::{RuleRegistry, SafeMap};
use crate::Result;

pub const ANM_REPORT_DATA_TYPE: &str = "anmReportData";

pub const ANM_IDENTIFIER_FIELD: &str = "anmIdentifier";
pub const EXTERNAL_ID_FIELD: &str = "externalId";
pub const INDICATOR_FIELD: &str = "indicator";
pub const DATE_FIELD: &str = "date";
pub const QUANTITY_FIELD: &str = "quantity";

/// A reporting payload: a type tag plus its fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportingData {
    #[serde(rename = "type")]
    pub report_type: String,
    pub data: SafeMap,
}

impl ReportingData {
    pub fn anm_report_data(
        anm_identifier: &str,
        external_id: &str,
        indicator: &str,
        date: &str,
        quantity: Option<&str>,
    ) -> Self {
        let mut data = SafeMap::new();
        data.insert(ANM_IDENTIFIER_FIELD, anm_identifier);
        data.insert(EXTERNAL_ID_FIELD, external_id);
        data.insert(INDICATOR_FIELD, indicator);
        data.insert(DATE_FIELD, date);
        if let Some(quantity) = quantity {
            data.insert(QUANTITY_FIELD, quantity);
        }
        Self {
            report_type: ANM_REPORT_DATA_TYPE.to_string(),
            data,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// An indicator reported when all of its rules hold for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorDefinition {
    pub indicator: String,
    pub rules: Vec<String>,
    /// Submission field holding the quantity; 1 when unset.
    pub quantity_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved(SaveOutcome),
    Skipped { reason: String },
}

pub struct ReportingService {
    reports: Arc<AnmReports>,
    rules: RuleRegistry,
}

impl ReportingService {
    pub fn new(reports: Arc<AnmReports>, rules: RuleRegistry) -> Self {
        Self { reports, rules }
    }

    /// Dispatches one payload by its type.
    pub fn submit(&self, reporting_data: &ReportingData) -> Result<SubmitOutcome> {
        if reporting_data.report_type != ANM_REPORT_DATA_TYPE {
            return Ok(skip(format!(
                "unsupported report type '{}'",
                reporting_data.report_type
            )));
        }

        let data = &reporting_data.data;
        let Some(anm_identifier) = non_empty(data, ANM_IDENTIFIER_FIELD) else {
            return Ok(skip("report has no field worker".to_string()));
        };
        let Some(indicator) = non_empty(data, INDICATOR_FIELD) else {
            return Ok(skip(format!("report for '{}' has no indicator", anm_identifier)));
        };
        let Some(date) = non_empty(data, DATE_FIELD) else {
            return Ok(skip(format!("report for '{}' has no date", anm_identifier)));
        };
        let external_id = data.get(EXTERNAL_ID_FIELD).unwrap_or_default();

        let outcome = self.reports.save(
            anm_identifier,
            external_id,
            indicator,
            date,
            data.get(QUANTITY_FIELD),
        )?;
        Ok(SubmitOutcome::Saved(outcome))
    }

    /// Reports every defined indicator whose rules hold over `fields`.
    pub fn report_indicators(
        &self,
        anm_identifier: &str,
        external_id: &str,
        date: &str,
        fields: &SafeMap,
        definitions: &[IndicatorDefinition],
    ) -> Result<Vec<SubmitOutcome>> {
        if anm_identifier.is_empty() {
            return Ok(vec![skip(format!(
                "case '{}' has no field worker; {} indicator(s) not reported",
                external_id,
                definitions.len()
            ))]);
        }

        let mut outcomes = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if !self.rules.apply_all(&definition.rules, fields)? {
                debug!(indicator = %definition.indicator, "indicator rules not satisfied");
                outcomes.push(SubmitOutcome::Skipped {
                    reason: format!("rules for '{}' not satisfied", definition.indicator),
                });
                continue;
            }

            let quantity = definition
                .quantity_field
                .as_deref()
                .and_then(|field| fields.get(field));
            let outcome = self.reports.save(
                anm_identifier,
                external_id,
                &definition.indicator,
                date,
                quantity,
            )?;
            outcomes.push(SubmitOutcome::Saved(outcome));
        }

        Ok(outcomes)
    }
}

/// The field's value with surrounding whitespace removed, if any remains.
fn non_empty<'a>(data: &'a SafeMap, field: &str) -> Option<&'a str> {
    data.get(field)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn skip(reason: String) -> SubmitOutcome {
    warn!(%reason, "skipping report");
    SubmitOutcome::Skipped { reason }
}
