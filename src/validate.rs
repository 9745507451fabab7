//! Static checks for a canonical collections file.
//!
//! Every violation is collected before reporting so one run surfaces the whole
//! list instead of stopping at the first problem.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ParentScanError;
use crate::report::RecordType;
use crate::sort::NameCollator;

static INSCRIPTION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{64}i[0-9]+$").expect("inscription id pattern is valid"));

pub fn is_inscription_id(id: &str) -> bool {
    INSCRIPTION_ID_RE.is_match(id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    InvalidJson(String),
    NotAnArray,
    NotSorted { name: String, previous: String },
    DuplicateSlug(String),
    EmptyName { label: String },
    InvalidType { label: String, found: String },
    EmptySlug { label: String },
    EmptyParentIds { label: String },
    InvalidInscriptionId { label: String, id: String },
    InvalidGalleryId { label: String },
}

impl SchemaViolation {
    pub fn is_ordering(&self) -> bool {
        matches!(self, SchemaViolation::NotSorted { .. })
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchemaViolation::InvalidJson(msg) => write!(f, "Invalid JSON: {}", msg),
            SchemaViolation::NotAnArray => write!(f, "Root must be an array"),
            SchemaViolation::NotSorted { name, previous } => {
                write!(f, "Not sorted: \"{}\" comes after \"{}\"", name, previous)
            }
            SchemaViolation::DuplicateSlug(slug) => write!(f, "Duplicate slug: \"{}\"", slug),
            SchemaViolation::EmptyName { label } => write!(f, "[{}] missing or empty name", label),
            SchemaViolation::InvalidType { label, found } => {
                let valid: Vec<&str> = RecordType::ALL.iter().map(|t| t.as_str()).collect();
                write!(
                    f,
                    "[{}] invalid type \"{}\", must be: {}",
                    label,
                    found,
                    valid.join(", ")
                )
            }
            SchemaViolation::EmptySlug { label } => write!(f, "[{}] missing or empty slug", label),
            SchemaViolation::EmptyParentIds { label } => {
                write!(f, "[{}] parent type must have non-empty ids array", label)
            }
            SchemaViolation::InvalidInscriptionId { label, id } => {
                write!(f, "[{}] invalid inscription ID: \"{}\"", label, id)
            }
            SchemaViolation::InvalidGalleryId { label } => {
                write!(f, "[{}] gallery type must have valid id string", label)
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub entries: usize,
    pub violations: Vec<SchemaViolation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn ordering_errors(&self) -> usize {
        self.violations.iter().filter(|v| v.is_ordering()).count()
    }
}

fn non_empty_str<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Loose truthiness: null, false, zero and "" are the only false values.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Checks the raw contents of a canonical collections file.
pub fn validate_collections(raw: &str, collator: &NameCollator) -> ValidationReport {
    let mut report = ValidationReport::default();

    let root: Value = match serde_json::from_str(raw) {
        Ok(root) => root,
        Err(e) => {
            report.violations.push(SchemaViolation::InvalidJson(e.to_string()));
            return report;
        }
    };
    let Some(entries) = root.as_array() else {
        report.violations.push(SchemaViolation::NotAnArray);
        return report;
    };
    report.entries = entries.len();

    for pair in entries.windows(2) {
        let previous = pair[0].get("name").and_then(Value::as_str);
        let name = pair[1].get("name").and_then(Value::as_str);
        // a missing name is reported per entry below
        if let (Some(previous), Some(name)) = (previous, name) {
            if collator.compare(name, previous).is_lt() {
                report.violations.push(SchemaViolation::NotSorted {
                    name: name.to_string(),
                    previous: previous.to_string(),
                });
            }
        }
    }

    // a missing slug is a key of its own; arrays and objects never collide
    let mut slugs: HashSet<Option<String>> = HashSet::new();
    for entry in entries {
        let slug = entry.get("slug");
        let key = match slug {
            None => None,
            Some(Value::Array(_) | Value::Object(_)) => continue,
            Some(value) => Some(value.to_string()),
        };
        if !slugs.insert(key) {
            report.violations.push(SchemaViolation::DuplicateSlug(describe(slug)));
        }
    }

    for entry in entries {
        check_entry(entry, &mut report.violations);
    }

    report
}

fn check_entry(entry: &Value, violations: &mut Vec<SchemaViolation>) {
    let label = entry
        .get("slug")
        .filter(|v| is_truthy(v))
        .or_else(|| entry.get("name").filter(|v| is_truthy(v)))
        .map_or_else(|| "(unknown)".to_string(), |v| describe(Some(v)));

    if non_empty_str(entry, "name").is_none() {
        violations.push(SchemaViolation::EmptyName { label: label.clone() });
    }

    let record_type = entry
        .get("type")
        .and_then(Value::as_str)
        .and_then(RecordType::from_string);
    if record_type.is_none() {
        violations.push(SchemaViolation::InvalidType {
            label: label.clone(),
            found: describe(entry.get("type")),
        });
    }

    if non_empty_str(entry, "slug").is_none() {
        violations.push(SchemaViolation::EmptySlug { label: label.clone() });
    }

    match record_type {
        Some(RecordType::Parent) => match entry.get("ids").and_then(Value::as_array) {
            Some(ids) if !ids.is_empty() => {
                for id in ids {
                    let valid = id.as_str().is_some_and(is_inscription_id);
                    if !valid {
                        violations.push(SchemaViolation::InvalidInscriptionId {
                            label: label.clone(),
                            id: describe(Some(id)),
                        });
                    }
                }
            }
            _ => violations.push(SchemaViolation::EmptyParentIds { label }),
        },
        Some(RecordType::Gallery) => {
            let valid = entry
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(is_inscription_id);
            if !valid {
                violations.push(SchemaViolation::InvalidGalleryId { label });
            }
        }
        None => {}
    }
}

/// Validates the file at `path`, logging every violation.
/// Returns the entry count, or a schema error carrying the violation count.
pub fn validate_file(path: &Path, collator: &NameCollator) -> Result<usize, ParentScanError> {
    let raw = fs::read_to_string(path)?;
    let report = validate_collections(&raw, collator);

    if !report.is_valid() {
        for violation in &report.violations {
            error!("ERROR: {}", violation);
        }
        error!("{} error(s) found", report.violations.len());
        return Err(ParentScanError::Schema {
            count: report.violations.len(),
        });
    }

    info!("OK - {} entries validated", report.entries);
    Ok(report.entries)
}
