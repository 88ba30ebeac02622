//! Keyword table used to recognize each document category.
//!
//! The table is built once at startup, either from the built-in defaults or from
//! a JSON file, and is read-only afterwards. Keywords are stored uppercased so
//! matching only has to normalize the extracted text.

use crate::category::DocumentCategory;
use crate::error::DocError;
use std::collections::BTreeMap;
use std::path::Path;

const TAX_ID_KEYWORDS: &[&str] = &["CPF", "MINISTERIO DA FAZENDA", "RECEITA FEDERAL", "PESSOA FISICA"];

const DRIVERS_LICENSE_KEYWORDS: &[&str] = &[
    "HABILITACAO",
    "CNH",
    "DETRAN",
    "MOTORISTA",
    "CARTEIRA NACIONAL",
    "PERMISSION",
];

const NATIONAL_ID_KEYWORDS: &[&str] = &[
    "REGISTRO GERAL",
    "CARTEIRA DE IDENTIDADE",
    "SSP",
    "SECRETARIA",
    "POLICIA CIVIL",
    "IDENTIDADE",
];

/// Ordered keyword lists per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    table: BTreeMap<DocumentCategory, Vec<String>>,
}

impl KeywordSet {
    /// Build from arbitrary lists, normalizing and checking every category is covered.
    pub fn new<I, K>(entries: I) -> Result<Self, DocError>
    where
        I: IntoIterator<Item = (DocumentCategory, Vec<K>)>,
        K: AsRef<str>,
    {
        let mut table = BTreeMap::new();
        for (category, keywords) in entries {
            let normalized: Vec<String> = keywords
                .iter()
                .map(|k| k.as_ref().trim().to_uppercase())
                .filter(|k| !k.is_empty())
                .collect();

            if normalized.is_empty() {
                return Err(DocError::KeywordConfig(format!(
                    "category '{}' has no keywords",
                    category
                )));
            }
            if table.insert(category, normalized).is_some() {
                return Err(DocError::KeywordConfig(format!(
                    "category '{}' is defined more than once",
                    category
                )));
            }
        }

        if let Some(missing) = DocumentCategory::ALL
            .iter()
            .find(|c| !table.contains_key(*c))
        {
            return Err(DocError::KeywordConfig(format!(
                "category '{}' is missing",
                missing
            )));
        }

        Ok(Self { table })
    }

    /// Parse a JSON object of `category -> [keyword, ...]`.
    pub fn from_json(json: &str) -> Result<Self, DocError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| DocError::KeywordConfig(format!("invalid JSON: {}", e)))?;

        let mut entries = Vec::with_capacity(raw.len());
        for (key, keywords) in raw {
            let category = key.parse::<DocumentCategory>().map_err(|_| {
                DocError::KeywordConfig(format!("unknown category key '{}'", key))
            })?;
            entries.push((category, keywords));
        }

        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self, DocError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DocError::KeywordConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        let set = Self::from_json(&json)?;
        tracing::info!(
            "Loaded keyword table from {} ({} keywords)",
            path.display(),
            set.total()
        );
        Ok(set)
    }

    /// Use the file when given, the built-in table otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, DocError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn keywords(&self, category: DocumentCategory) -> &[String] {
        self.table
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentCategory, &[String])> {
        self.table.iter().map(|(c, k)| (*c, k.as_slice()))
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        let table = [
            (DocumentCategory::TaxId, TAX_ID_KEYWORDS),
            (DocumentCategory::DriversLicense, DRIVERS_LICENSE_KEYWORDS),
            (DocumentCategory::NationalId, NATIONAL_ID_KEYWORDS),
        ]
        .into_iter()
        .map(|(c, k)| (c, k.iter().map(|s| s.to_string()).collect()))
        .collect();

        Self { table }
    }
}
