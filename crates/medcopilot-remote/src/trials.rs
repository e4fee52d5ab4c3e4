//! ClinicalTrials.gov download (v2 studies API).

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use serde_json::Value;

use crate::dated_file_name;
use crate::error::Result;

pub const STUDIES_URL: &str = "https://clinicaltrials.gov/api/v2/studies";

const FIELDS: &str = "NCTId,BriefTitle,Condition,Phase,EnrollmentCount,OverallStatus";

/// Save up to `max_results` studies for `condition` under `dir` as
/// `trials_<condition>_<YYYYMMDD>.json`. Returns the path and the study count.
pub fn fetch_trials(client: &Client, condition: &str, max_results: usize, dir: &Path) -> Result<(PathBuf, usize)> {
    tracing::info!("Searching ClinicalTrials.gov for: {}", condition);
    let page_size = max_results.to_string();
    let data: Value = client
        .get(STUDIES_URL)
        .query(&[
            ("query.cond", condition),
            ("pageSize", page_size.as_str()),
            ("fields", FIELDS),
            ("format", "json"),
        ])
        .send()?
        .error_for_status()?
        .json()?;
    let count = data.get("studies").and_then(Value::as_array).map_or(0, Vec::len);

    fs::create_dir_all(dir)?;
    let path = dir.join(dated_file_name("trials", condition, "json"));
    fs::write(&path, serde_json::to_vec_pretty(&data)?)?;
    tracing::info!("Saved {} stud(ies) to {}", count, path.display());
    Ok((path, count))
}
