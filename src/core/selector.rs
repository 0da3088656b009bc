//! JP-006: Tag-based selection of catalog entries.
//!
//! The query is the union of configured feature tags and the lowercase
//! names of enabled integrations. An empty query selects the whole catalog.

use super::catalog::Catalog;
use super::config::SelectionRules;
use super::diagnostics::{DiagCode, Diagnostic, Diagnostics};
use super::types::{Intent, Selection};
use std::collections::BTreeSet;

/// Build the tag query for an intent.
pub fn tag_query(
    intent: &Intent,
    rules: &SelectionRules,
    diags: &mut Diagnostics,
) -> BTreeSet<String> {
    let mut query = BTreeSet::new();

    for (name, _) in intent.enabled_features() {
        match rules.tags_for(name) {
            Some(tags) => {
                query.extend(tags.iter().map(|t| t.trim().to_ascii_lowercase()));
            }
            None => diags.push(
                Diagnostic::info(
                    DiagCode::UnmappedFeature,
                    format!("feature '{}' has no tag mapping", name),
                )
                .with_field("feature", name.as_str()),
            ),
        }
    }

    for (name, _) in intent.enabled_integrations() {
        query.insert(name.trim().to_ascii_lowercase());
    }

    query.retain(|t| !t.is_empty());
    query
}

/// Select catalog entries for an intent, preserving catalog order.
pub fn select(
    intent: &Intent,
    catalog: &Catalog,
    rules: &SelectionRules,
    diags: &mut Diagnostics,
) -> Selection {
    let query = tag_query(intent, rules, diags);
    let selection = if query.is_empty() {
        tracing::debug!("empty tag query, selecting full catalog");
        Selection {
            functions: catalog.all_functions().to_vec(),
            templates: catalog.all_templates().to_vec(),
        }
    } else {
        Selection {
            functions: catalog.functions_by_tags(&query),
            templates: catalog.templates_by_tags(&query),
        }
    };
    tracing::debug!(
        query = ?query,
        functions = selection.functions.len(),
        templates = selection.templates.len(),
        "selection complete"
    );
    selection
}
