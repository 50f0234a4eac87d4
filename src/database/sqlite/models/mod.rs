
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const PRIORITY_MIN: i64 = 1;
pub const PRIORITY_MAX: i64 = 10;
pub const PRIORITY_DEFAULT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Documentation {
    pub name: String,
    pub display_name: String,
    pub version: Option<String>,
    pub base_url: String,
    pub created_date: NaiveDateTime,
    pub updated_date: NaiveDateTime,
}

/// Documentation header with its live section count, as returned by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentationSummary {
    pub name: String,
    pub display_name: String,
    pub version: Option<String>,
    pub sections: i64,
}

/// Raw section row as stored; facet lists are JSON text columns.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SectionRow {
    pub id: i64,
    pub doc_name: String,
    pub title: String,
    pub path: String,
    pub url: String,
    pub priority: i64,
    pub keywords: String,
    pub use_cases: String,
    pub tags: String,
    pub content: String,
}

/// Section row joined with its BM25 rank from `sections_fts`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FtsSectionRow {
    pub id: i64,
    pub doc_name: String,
    pub title: String,
    pub path: String,
    pub url: String,
    pub priority: i64,
    pub keywords: String,
    pub use_cases: String,
    pub tags: String,
    pub content: String,
    pub rank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub doc_name: String,
    pub title: String,
    pub path: String,
    pub url: String,
    pub priority: i64,
    pub keywords: Vec<String>,
    pub use_cases: Vec<String>,
    pub tags: Vec<String>,
    pub content: String,
}

impl From<SectionRow> for Section {
    #[inline]
    fn from(row: SectionRow) -> Self {
        Self {
            id: row.id,
            doc_name: row.doc_name,
            title: row.title,
            path: row.path,
            url: row.url,
            priority: row.priority,
            keywords: parse_facet_json(&row.keywords),
            use_cases: parse_facet_json(&row.use_cases),
            tags: parse_facet_json(&row.tags),
            content: row.content,
        }
    }
}

impl From<FtsSectionRow> for Section {
    #[inline]
    fn from(row: FtsSectionRow) -> Self {
        Self {
            id: row.id,
            doc_name: row.doc_name,
            title: row.title,
            path: row.path,
            url: row.url,
            priority: row.priority,
            keywords: parse_facet_json(&row.keywords),
            use_cases: parse_facet_json(&row.use_cases),
            tags: parse_facet_json(&row.tags),
            content: row.content,
        }
    }
}

fn parse_facet_json(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Incoming document in the external JSON schema, the single ingest boundary.
///
/// Unknown fields are ignored here; strict-mode rejection happens in
/// [`DocumentInput::from_json`] before deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SectionInput {
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub content: String,
}

const DOCUMENT_FIELDS: &[&str] = &["name", "display_name", "version", "base_url", "sections"];
const SECTION_FIELDS: &[&str] = &[
    "title",
    "path",
    "url",
    "keywords",
    "use_cases",
    "tags",
    "priority",
    "content",
];

impl DocumentInput {
    /// Parse a document from its JSON value, validating shape and coercing
    /// defaults. With `strict`, unknown fields are rejected instead of ignored.
    #[inline]
    pub fn from_json(value: &serde_json::Value, strict: bool) -> crate::Result<Self> {
        if strict {
            reject_unknown_fields(value)?;
        }

        let input: DocumentInput = serde_json::from_value(value.clone())
            .map_err(|e| crate::CascadeError::InvalidInput(format!("Malformed document: {e}")))?;
        input.validate()?;

        Ok(input)
    }

    #[inline]
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::CascadeError::InvalidInput(
                "Document name must not be empty".to_string(),
            ));
        }

        url::Url::parse(&self.base_url).map_err(|_| {
            crate::CascadeError::InvalidInput(format!("Invalid base_url: {}", self.base_url))
        })?;

        let mut seen_paths = std::collections::HashSet::new();
        for (i, section) in self.sections.iter().enumerate() {
            if section.title.trim().is_empty() {
                return Err(crate::CascadeError::InvalidInput(format!(
                    "Section {i} has an empty title"
                )));
            }
            if section.path.trim().is_empty() {
                return Err(crate::CascadeError::InvalidInput(format!(
                    "Section {i} has an empty path"
                )));
            }
            if !seen_paths.insert(section.path.as_str()) {
                return Err(crate::CascadeError::InvalidInput(format!(
                    "Duplicate section path: {}",
                    section.path
                )));
            }
        }

        Ok(())
    }
}

impl SectionInput {
    /// Priority clamped to the valid range; unknown or missing becomes the default.
    #[inline]
    pub fn clamped_priority(&self) -> i64 {
        self.priority
            .unwrap_or(PRIORITY_DEFAULT)
            .clamp(PRIORITY_MIN, PRIORITY_MAX)
    }
}

fn reject_unknown_fields(value: &serde_json::Value) -> crate::Result<()> {
    let Some(object) = value.as_object() else {
        return Err(crate::CascadeError::InvalidInput(
            "Document must be a JSON object".to_string(),
        ));
    };

    for key in object.keys() {
        if !DOCUMENT_FIELDS.contains(&key.as_str()) {
            return Err(crate::CascadeError::InvalidInput(format!(
                "Unknown document field: {key}"
            )));
        }
    }

    if let Some(sections) = object.get("sections").and_then(|s| s.as_array()) {
        for (i, section) in sections.iter().enumerate() {
            let Some(section_object) = section.as_object() else {
                return Err(crate::CascadeError::InvalidInput(format!(
                    "Section {i} must be a JSON object"
                )));
            };
            for key in section_object.keys() {
                if !SECTION_FIELDS.contains(&key.as_str()) {
                    return Err(crate::CascadeError::InvalidInput(format!(
                        "Unknown section field in section {i}: {key}"
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Lower-case, trim and de-duplicate a facet list, preserving first-seen order.
pub fn normalize_facet(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}
