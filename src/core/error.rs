//! JP-000: Error taxonomy for the compile pipeline.
//!
//! Every fatal failure renders as a single line `<ErrorKind>: <detail>`.
//! Catalog read failures are not errors; see [`super::diagnostics`].

use std::path::PathBuf;
use thiserror::Error;

/// Line/column inside the intent document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

/// Fatal compile error.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("IntentUnreadable: cannot read {}: {source}", .path.display())]
    IntentUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IntentMalformed: {}{}", .message, location_suffix(.location))]
    IntentMalformed {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("IntentInvalid: {0}")]
    IntentInvalid(String),

    #[error("PlanInconsistent: {0}")]
    PlanInconsistent(String),

    #[error("MaterializationFailed: {}: {source}", .path.display())]
    MaterializationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ConfigInvalid: {0}")]
    ConfigInvalid(String),
}

impl CompileError {
    /// Bare kind name, as printed before the colon.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IntentUnreadable { .. } => "IntentUnreadable",
            Self::IntentMalformed { .. } => "IntentMalformed",
            Self::IntentInvalid(_) => "IntentInvalid",
            Self::PlanInconsistent(_) => "PlanInconsistent",
            Self::MaterializationFailed { .. } => "MaterializationFailed",
            Self::ConfigInvalid(_) => "ConfigInvalid",
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::IntentMalformed {
            message: message.into(),
            location: None,
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::MaterializationFailed {
            path: path.into(),
            source,
        }
    }
}

fn location_suffix(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" (line {}, column {})", loc.line, loc.column),
        None => String::new(),
    }
}

/// Result alias for the compile pipeline.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jp000_display_is_single_line_with_kind() {
        let e = CompileError::IntentInvalid("app.name is required".to_string());
        assert_eq!(e.to_string(), "IntentInvalid: app.name is required");
        assert_eq!(e.kind(), "IntentInvalid");
    }

    #[test]
    fn test_jp000_malformed_with_location() {
        let e = CompileError::IntentMalformed {
            message: "did not find expected key".to_string(),
            location: Some(SourceLocation { line: 3, column: 7 }),
        };
        assert_eq!(
            e.to_string(),
            "IntentMalformed: did not find expected key (line 3, column 7)"
        );
    }

    #[test]
    fn test_jp000_materialization_names_path() {
        let e = CompileError::write_failed(
            "/ro/demo/Dockerfile",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = e.to_string();
        assert!(msg.starts_with("MaterializationFailed: /ro/demo/Dockerfile"));
        assert!(!msg.contains('\n'));
    }
}
