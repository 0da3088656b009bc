//! JP-001: Non-fatal diagnostics recorded while compiling.
//!
//! Diagnostics carry no timestamps or machine-specific data. Each one is
//! mirrored to `tracing` when recorded.

use std::collections::BTreeMap;
use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Info,
    Warning,
}

/// Stable diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagCode {
    /// A catalog file was missing or unparseable; that side is empty.
    CatalogUnavailable,
    /// A catalog id appeared twice; the first entry was kept.
    DuplicateCatalogEntry,
    /// An enabled integration has no catalog backing.
    ExternalIntegration,
    /// An enabled feature has no entry in the feature→tag table.
    UnmappedFeature,
    /// An operator variable cannot be written to `config/.env`.
    VariableSkipped,
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogUnavailable => write!(f, "CatalogUnavailable"),
            Self::DuplicateCatalogEntry => write!(f, "DuplicateCatalogEntry"),
            Self::ExternalIntegration => write!(f, "ExternalIntegration"),
            Self::UnmappedFeature => write!(f, "UnmappedFeature"),
            Self::VariableSkipped => write!(f, "VariableSkipped"),
        }
    }
}

/// A structured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagLevel,
    pub code: DiagCode,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, code: DiagCode, message: impl Into<String>) -> Self {
        Self {
            level,
            code,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, code, message)
    }

    pub fn info(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Info, code, message)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Emit through `tracing` at the matching level.
    pub fn emit(&self) {
        match self.level {
            DiagLevel::Warning => {
                tracing::warn!(code = %self.code, fields = ?self.fields, "{}", self.message)
            }
            DiagLevel::Info => {
                tracing::info!(code = %self.code, fields = ?self.fields, "{}", self.message)
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Record and emit a diagnostic.
    pub fn push(&mut self, d: Diagnostic) {
        d.emit();
        self.items.push(d);
    }

    pub fn has_code(&self, code: DiagCode) -> bool {
        self.items.iter().any(|d| d.code == code)
    }

    pub fn warnings(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.level == DiagLevel::Warning)
            .count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jp001_push_and_query() {
        let mut diags = Diagnostics::default();
        diags.push(
            Diagnostic::warning(DiagCode::CatalogUnavailable, "function catalog missing")
                .with_field("path", "tula_spec/registry/functions.json"),
        );
        diags.push(Diagnostic::info(
            DiagCode::ExternalIntegration,
            "telegram_bot is external",
        ));
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.warnings(), 1);
        assert!(diags.has_code(DiagCode::CatalogUnavailable));
        assert!(!diags.has_code(DiagCode::UnmappedFeature));
    }

    #[test]
    fn test_jp001_display() {
        let d = Diagnostic::warning(DiagCode::DuplicateCatalogEntry, "slot_validator twice");
        assert_eq!(d.to_string(), "DuplicateCatalogEntry: slot_validator twice");
    }
}
