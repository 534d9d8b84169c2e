//! Per-recipient report files.
//!
//! Each recipient gets `statistics_<identity>.json` in the output directory.
//! Next to the rows it carries the processed-rate comparison of every SIG
//! those rows belong to, when one is known. Rendering and delivery are left
//! to whatever consumes these files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use attention::{AddressBook, Identity, OrderedReport, RateComparison, ReportRow, SigName};

/// Prefix of every report file name.
pub const FILE_PREFIX: &str = "statistics_";

#[derive(Debug, Serialize)]
struct RecipientReport<'a> {
    recipient: &'a Identity,
    address: Option<&'a str>,
    rows: &'a [ReportRow],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    processed_rates: BTreeMap<&'a SigName, &'a RateComparison>,
}

/// Report file name for `recipient`, or `None` when the identity cannot name
/// a file inside the output directory.
pub fn file_name(recipient: &Identity) -> Option<String> {
    let id = recipient.as_str();
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        return None;
    }
    Some(format!("{FILE_PREFIX}{id}.json"))
}

/// Removes reports left over from an earlier run.
fn clear_previous(dir: &Path) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_report = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
        if is_report && path.is_file() {
            debug!(path = %path.display(), "Removing stale report");
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
    }
    Ok(())
}

/// Writes one file per recipient of `report` into `dir` and returns their
/// paths in recipient order.
///
/// A recipient whose report cannot be written is logged and skipped.
pub fn write_reports(
    dir: &Path,
    report: &OrderedReport,
    addresses: &dyn AddressBook,
    rates: &BTreeMap<SigName, RateComparison>,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    clear_previous(dir)?;

    let mut written = Vec::with_capacity(report.len());
    for (recipient, rows) in report.iter() {
        let address = addresses.address_of(recipient);
        let Some(name) = file_name(recipient) else {
            warn!(recipient = %recipient, "Skipping recipient whose identity is not a valid file name");
            continue;
        };
        let path = dir.join(name);
        let processed_rates = rows
            .iter()
            .filter_map(|row| rates.get_key_value(&row.sig))
            .collect();
        let body = serde_json::to_vec_pretty(&RecipientReport {
            recipient,
            address,
            rows,
            processed_rates,
        })?;
        if let Err(e) = fs::write(&path, body) {
            warn!(recipient = %recipient, path = %path.display(), error = %e, "Could not write report");
            continue;
        }

        match address {
            Some(address) => info!(
                recipient = %recipient,
                rows = rows.len(),
                "Ready to send statistics for {recipient} whose email address is {address}"
            ),
            None => warn!(
                recipient = %recipient,
                rows = rows.len(),
                "Ready to send statistics for {recipient} but cannot find the email address"
            ),
        }
        written.push(path);
    }
    Ok(written)
}
