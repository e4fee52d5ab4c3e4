//! ClinicalTrials.gov JSON: one unit per study.
//!
//! Both the legacy `StudyFieldsResponse` layout (every field a list, first
//! value taken) and the v2 `studies[].protocolSection` layout are accepted.

use serde_json::Value;

use crate::error::ExtractionError;
use crate::traits::UnitResult;
use crate::types::TextUnit;

#[derive(Debug, Default, PartialEq, Eq)]
struct Study {
    nct_id: String,
    title: String,
    condition: String,
    phase: String,
    status: String,
}

impl Study {
    fn into_unit(self, name: &str, index: usize) -> UnitResult {
        if self.nct_id.trim().is_empty() {
            return Err(ExtractionError::MissingField { name: name.to_string(), index, field: "NCTId" });
        }
        let text = format!(
            "Trial ID: {}\nTitle: {}\nCondition: {}\nPhase: {}\nStatus: {}",
            self.nct_id, self.title, self.condition, self.phase, self.status
        );
        Ok(TextUnit::new(text, format!("NCT ID: {}", self.nct_id)))
    }
}

pub fn extract_studies(name: &str, bytes: &[u8]) -> Result<Vec<UnitResult>, ExtractionError> {
    let root: Value = serde_json::from_slice(bytes).map_err(|e| ExtractionError::malformed(name, e))?;

    let studies: Vec<Study> = if let Some(fields) = root.pointer("/StudyFieldsResponse/StudyFields") {
        let list = fields
            .as_array()
            .ok_or_else(|| ExtractionError::malformed(name, "StudyFields is not a list"))?;
        list.iter().map(legacy_study).collect()
    } else if let Some(studies) = root.get("studies") {
        let list = studies
            .as_array()
            .ok_or_else(|| ExtractionError::malformed(name, "studies is not a list"))?;
        list.iter().map(v2_study).collect()
    } else {
        return Err(ExtractionError::malformed(name, "no StudyFieldsResponse or studies list"));
    };

    Ok(studies.into_iter().enumerate().map(|(i, s)| s.into_unit(name, i)).collect())
}

fn first_of(record: &Value, key: &str) -> String {
    match record.get(key) {
        Some(Value::Array(items)) => items.first().map(value_text).unwrap_or_default(),
        Some(other) => value_text(other),
        None => String::new(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn legacy_study(record: &Value) -> Study {
    Study {
        nct_id: first_of(record, "NCTId"),
        title: first_of(record, "BriefTitle"),
        condition: first_of(record, "Condition"),
        phase: first_of(record, "Phase"),
        status: first_of(record, "OverallStatus"),
    }
}

fn joined(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Some(other) => value_text(other),
        None => String::new(),
    }
}

fn v2_study(record: &Value) -> Study {
    let text_at = |pointer: &str| record.pointer(pointer).map(value_text).unwrap_or_default();
    Study {
        nct_id: text_at("/protocolSection/identificationModule/nctId"),
        title: text_at("/protocolSection/identificationModule/briefTitle"),
        condition: joined(record.pointer("/protocolSection/conditionsModule/conditions")),
        phase: joined(record.pointer("/protocolSection/designModule/phases")),
        status: text_at("/protocolSection/statusModule/overallStatus"),
    }
}
