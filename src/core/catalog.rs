//! JP-005: Function and template catalogs.
//!
//! Two JSON registries: `{"functions": [...]}` and `{"templates": [...]}`.
//! A missing or broken file is not fatal: that side loads empty and a
//! `CatalogUnavailable` warning is recorded, one in total when both fail.
//! Duplicate ids keep the first entry. Entries stay in file order.

use super::diagnostics::{DiagCode, Diagnostic, Diagnostics};
use super::types::{FunctionEntry, Tagged, TemplateEntry};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct FunctionRegistry {
    #[serde(default)]
    functions: Vec<FunctionEntry>,
}

#[derive(Debug, Deserialize)]
struct TemplateRegistry {
    #[serde(default)]
    templates: Vec<TemplateEntry>,
}

/// Loaded catalog. Read-only after load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    functions: Vec<FunctionEntry>,
    templates: Vec<TemplateEntry>,
}

impl Catalog {
    /// Build a catalog from in-memory entries, dropping duplicate ids.
    pub fn from_entries(
        functions: Vec<FunctionEntry>,
        templates: Vec<TemplateEntry>,
        diags: &mut Diagnostics,
    ) -> Self {
        Self {
            functions: dedupe(functions, "function", diags),
            templates: dedupe(templates, "template", diags),
        }
    }

    /// Load both registries. Never fails. When both sides are unavailable a
    /// single `CatalogUnavailable` covers them.
    pub fn load(functions_path: &Path, templates_path: &Path) -> (Self, Diagnostics) {
        let mut diags = Diagnostics::default();
        let functions = read_registry::<FunctionRegistry>(functions_path).map(|r| r.functions);
        let templates = read_registry::<TemplateRegistry>(templates_path).map(|r| r.templates);
        let (functions, templates) = match (functions, templates) {
            (Err(f), Err(t)) => {
                diags.push(
                    Diagnostic::warning(
                        DiagCode::CatalogUnavailable,
                        format!("catalog unavailable: {}; {}", f, t),
                    )
                    .with_field("functions", functions_path.display().to_string())
                    .with_field("templates", templates_path.display().to_string()),
                );
                (Vec::new(), Vec::new())
            }
            (functions, templates) => (
                functions.unwrap_or_else(|reason| {
                    diags.push(unavailable("function", functions_path, reason));
                    Vec::new()
                }),
                templates.unwrap_or_else(|reason| {
                    diags.push(unavailable("template", templates_path, reason));
                    Vec::new()
                }),
            ),
        };
        let catalog = Self::from_entries(functions, templates, &mut diags);
        tracing::debug!(
            functions = catalog.functions.len(),
            templates = catalog.templates.len(),
            "catalog loaded"
        );
        (catalog, diags)
    }

    pub fn all_functions(&self) -> &[FunctionEntry] {
        &self.functions
    }

    pub fn all_templates(&self) -> &[TemplateEntry] {
        &self.templates
    }

    pub fn function(&self, id: &str) -> Option<&FunctionEntry> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&TemplateEntry> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Functions carrying any of the query tags. An empty query matches all.
    pub fn functions_by_tags(&self, query: &BTreeSet<String>) -> Vec<FunctionEntry> {
        filter_by_tags(&self.functions, query)
    }

    /// Templates carrying any of the query tags. An empty query matches all.
    pub fn templates_by_tags(&self, query: &BTreeSet<String>) -> Vec<TemplateEntry> {
        filter_by_tags(&self.templates, query)
    }

    pub fn templates_by_category(&self, category: &str) -> Vec<TemplateEntry> {
        self.templates
            .iter()
            .filter(|t| t.category.eq_ignore_ascii_case(category.trim()))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.templates.is_empty()
    }
}

fn filter_by_tags<T: Tagged + Clone>(entries: &[T], query: &BTreeSet<String>) -> Vec<T> {
    if query.is_empty() {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|e| query.iter().any(|q| e.has_tag(q)))
        .cloned()
        .collect()
}

fn dedupe<T: Tagged>(entries: Vec<T>, side: &str, diags: &mut Diagnostics) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        if seen.insert(entry.id().to_string()) {
            out.push(entry);
        } else {
            diags.push(
                Diagnostic::warning(
                    DiagCode::DuplicateCatalogEntry,
                    format!("duplicate {} id '{}'; keeping the first", side, entry.id()),
                )
                .with_field("id", entry.id()),
            );
        }
    }
    out
}

fn unavailable(side: &str, path: &Path, reason: String) -> Diagnostic {
    Diagnostic::warning(
        DiagCode::CatalogUnavailable,
        format!("{} catalog unavailable: {}", side, reason),
    )
    .with_field("path", path.display().to_string())
}

fn read_registry<R: serde::de::DeserializeOwned>(path: &Path) -> Result<R, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))
}
