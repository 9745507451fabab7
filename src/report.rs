use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::ParentScanError;
use crate::reconcile::VerifiedCollection;
use crate::sort::NameCollator;

pub const COLLECTIONS_FILE: &str = "collections.json";
pub const MISMATCHES_FILE: &str = "mismatches.json";
pub const MINOR_MISMATCHES_FILE: &str = "mismatches-minor.json";

/// Collections with fewer unconfirmed ids than this (but at least one) are
/// minor mismatches, usually a handful of mis-catalogued items.
pub const MINOR_MISMATCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// Membership defined by one or more parent inscriptions.
    Parent,
    /// Membership defined by a single gallery inscription.
    Gallery,
}

impl RecordType {
    pub const ALL: [RecordType; 2] = [RecordType::Parent, RecordType::Gallery];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Parent => "parent",
            RecordType::Gallery => "gallery",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// One entry of the canonical collections file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub ids: Vec<String>,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MismatchRecord {
    pub name: String,
    pub slug: String,
    pub parent_ids: Vec<String>,
    pub in_file_not_api: Vec<String>,
    pub in_api_not_file: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 1 to 9 local ids unconfirmed.
    Minor,
    /// None, or 10 or more, unconfirmed. Clean collections land here too so
    /// every checked collection stays on record.
    Major,
}

impl Severity {
    pub fn of(verified: &VerifiedCollection) -> Self {
        let count = verified.mismatch_count();
        if count > 0 && count < MINOR_MISMATCH_LIMIT {
            Severity::Minor
        } else {
            Severity::Major
        }
    }
}

impl From<&VerifiedCollection> for CanonicalRecord {
    fn from(verified: &VerifiedCollection) -> Self {
        CanonicalRecord {
            name: verified.name.clone(),
            record_type: RecordType::Parent,
            ids: verified.parent_ids.clone(),
            slug: verified.slug.clone(),
        }
    }
}

impl From<&VerifiedCollection> for MismatchRecord {
    fn from(verified: &VerifiedCollection) -> Self {
        MismatchRecord {
            name: verified.name.clone(),
            slug: verified.slug.clone(),
            parent_ids: verified.parent_ids.clone(),
            in_file_not_api: verified.discrepancy.in_file_not_api.clone(),
            in_api_not_file: verified.discrepancy.in_api_not_file.clone(),
        }
    }
}

/// The three output views of a verification run, each sorted by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    pub canonical: Vec<CanonicalRecord>,
    pub major: Vec<MismatchRecord>,
    pub minor: Vec<MismatchRecord>,
}

impl MismatchReport {
    pub fn build(verified: &[VerifiedCollection], collator: &NameCollator) -> Self {
        let mut sorted: Vec<&VerifiedCollection> = verified.iter().collect();
        collator.sort_by_name(&mut sorted, |v| v.name.as_str());

        let mut report = MismatchReport::default();
        for v in sorted {
            report.canonical.push(CanonicalRecord::from(v));
            match Severity::of(v) {
                Severity::Minor => report.minor.push(MismatchRecord::from(v)),
                Severity::Major => report.major.push(MismatchRecord::from(v)),
            }
        }
        report
    }

    pub fn write(&self, output_dir: &Path) -> Result<(), ParentScanError> {
        fs::create_dir_all(output_dir)?;

        write_json_pretty(&output_dir.join(COLLECTIONS_FILE), &self.canonical)?;
        info!("Wrote {} entries to {}", self.canonical.len(), COLLECTIONS_FILE);

        write_json_pretty(&output_dir.join(MISMATCHES_FILE), &self.major)?;
        info!("Wrote {} mismatch entries to {}", self.major.len(), MISMATCHES_FILE);

        write_json_pretty(&output_dir.join(MINOR_MISMATCHES_FILE), &self.minor)?;
        info!(
            "Wrote {} minor mismatch entries to {}",
            self.minor.len(),
            MINOR_MISMATCHES_FILE
        );

        Ok(())
    }
}

/// Two-space indented JSON with a trailing newline.
pub fn write_json_pretty<T>(path: &Path, value: &T) -> Result<(), ParentScanError>
where
    T: Serialize + ?Sized,
{
    let mut json = serde_json::to_string_pretty(value).map_err(|e| {
        ParentScanError::Error(format!("Failed to serialize {}: {}", path.display(), e))
    })?;
    json.push('\n');
    fs::write(path, json)?;
    Ok(())
}

/// Logs every collection with unconfirmed local ids, in input order.
pub fn log_summary(verified: &[VerifiedCollection]) {
    let mismatched: Vec<&VerifiedCollection> =
        verified.iter().filter(|v| v.mismatch_count() > 0).collect();

    if mismatched.is_empty() {
        info!("All detected collections verified successfully!");
        return;
    }

    info!("=== MISMATCH SUMMARY ===");
    for v in mismatched {
        info!(
            "  {}: {} IDs in file but not in API children",
            v.name,
            v.mismatch_count()
        );
    }
}
