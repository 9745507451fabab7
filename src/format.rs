use std::fs;
use std::path::Path;

use log::info;
use serde_json::Value;

use crate::error::ParentScanError;
use crate::report::write_json_pretty;
use crate::sort::NameCollator;

/// Trims every entry's name and re-sorts the entries by name.
/// Other fields and their key order are left alone.
pub fn format_entries(entries: &mut [Value], collator: &NameCollator) {
    for entry in entries.iter_mut() {
        if let Some(Value::String(name)) = entry.get_mut("name") {
            *name = name.trim().to_string();
        }
    }

    collator.sort_by_name(entries, |entry| {
        entry.get("name").and_then(Value::as_str).unwrap_or_default()
    });
}

/// Rewrites the collections file at `path` in canonical form.
pub fn format_file(path: &Path, collator: &NameCollator) -> Result<usize, ParentScanError> {
    let raw = fs::read_to_string(path)?;
    let mut entries: Vec<Value> = serde_json::from_str(&raw)
        .map_err(|e| ParentScanError::parse(path.display().to_string(), e))?;

    format_entries(&mut entries, collator);
    write_json_pretty(path, &entries)?;

    info!("Formatted {} entries", entries.len());
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_collections;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_format_trims_and_sorts() {
        let collator = NameCollator::new().unwrap();
        let mut entries = vec![
            json!({ "name": "  zebras ", "type": "parent", "slug": "z" }),
            json!({ "name": "Apes", "type": "parent", "slug": "a" }),
            json!({ "name": "\tbitmap", "type": "gallery", "slug": "b" }),
        ];

        format_entries(&mut entries, &collator);

        let names: Vec<&str> = entries.iter().filter_map(|e| e["name"].as_str()).collect();
        assert_eq!(names, vec!["Apes", "bitmap", "zebras"]);
    }

    #[test]
    fn test_format_file_preserves_key_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collections.json");
        fs::write(
            &path,
            concat!(
                r#"[{"slug":"b","name":" B","ids":["x"],"type":"parent"},"#,
                r#"{"slug":"a","name":"A","ids":["y"],"type":"parent"}]"#
            ),
        )
        .unwrap();
        let collator = NameCollator::new().unwrap();

        let count = format_file(&path, &collator).unwrap();

        assert_eq!(count, 2);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("]\n"));
        let slug_at = written.find("\"slug\": \"a\"").unwrap();
        assert!(slug_at < written.find("\"name\": \"A\"").unwrap());
        assert_eq!(validate_collections(&written, &collator).ordering_errors(), 0);
    }

    #[test]
    fn test_format_file_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collections.json");
        fs::write(&path, "[{").unwrap();
        let collator = NameCollator::new().unwrap();

        let err = format_file(&path, &collator).unwrap_err();
        assert!(matches!(err, ParentScanError::Parse { .. }));
    }

    #[test]
    fn test_unsorted_input_passes_ordering_after_format() {
        let collator = NameCollator::new().unwrap();
        let ordering_errors = |entries: &[Value]| {
            validate_collections(&json!(entries).to_string(), &collator).ordering_errors()
        };
        let mut entries = vec![json!({ "name": "B" }), json!({ "name": "A" })];
        assert_eq!(ordering_errors(&entries), 1);

        format_entries(&mut entries, &collator);
        assert_eq!(ordering_errors(&entries), 0);
    }
}
