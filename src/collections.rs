use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::ParentScanError;

/// A locally curated collection: display name, stable symbol and the
/// membership list as it appears in the corpus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection {
    symbol: String,
    name: String,
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct IndexEntry {
    symbol: String,
    name: String,
}

#[derive(Deserialize)]
struct MemberEntry {
    id: String,
}

impl Collection {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, ids: Vec<String>) -> Self {
        Collection {
            symbol: symbol.into(),
            name: name.into(),
            ids,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Loads every collection under `legacy_dir`.
    ///
    /// Expects `collections.json` (an array of `{symbol, name}`) next to a
    /// `collections/` directory holding one `{symbol}.json` membership file per
    /// collection. Symbols missing from the index use the symbol as name.
    pub fn load_all(legacy_dir: &Path) -> Result<Vec<Collection>, ParentScanError> {
        let index_path = legacy_dir.join("collections.json");
        let index: Vec<IndexEntry> = read_json(&index_path)?;
        let symbol_to_name: HashMap<String, String> = index
            .into_iter()
            .map(|entry| (entry.symbol, entry.name))
            .collect();

        let mut file_names = Vec::new();
        for entry in fs::read_dir(legacy_dir.join("collections"))? {
            let file_name = entry?.file_name().to_string_lossy().into_owned();
            if file_name.ends_with(".json") {
                file_names.push(file_name);
            }
        }
        // read_dir order is platform dependent
        file_names.sort();

        let mut collections = Vec::with_capacity(file_names.len());
        for file_name in file_names {
            let symbol = file_name
                .strip_suffix(".json")
                .unwrap_or(&file_name)
                .to_owned();
            let name = symbol_to_name
                .get(&symbol)
                .cloned()
                .unwrap_or_else(|| symbol.clone());

            let members: Vec<MemberEntry> =
                read_json(&legacy_dir.join("collections").join(&file_name))?;
            let ids = members.into_iter().map(|member| member.id).collect();

            collections.push(Collection { symbol, name, ids });
        }

        info!("Loaded {} collections", collections.len());
        Ok(collections)
    }
}

fn read_json<T>(path: &Path) -> Result<T, ParentScanError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| ParentScanError::parse(path.display().to_string(), e))
}
