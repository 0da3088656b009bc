//! JP-003: Compiler configuration: catalog paths, backend URLs and the
//! mapping tables that drive selection and planning.
//!
//! Loaded from `jalm.toml`. Every field has a default, so an empty file (or
//! no file) yields the stock configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{CompileError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub catalog: CatalogPaths,
    pub backends: Backends,
    pub runtime: RuntimeSettings,
    pub selection: SelectionRules,
    pub planning: PlanningRules,
}

/// Catalog file locations, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogPaths {
    pub functions: PathBuf,
    pub templates: PathBuf,
}

impl Default for CatalogPaths {
    fn default() -> Self {
        Self {
            functions: PathBuf::from("tula_spec/registry/functions.json"),
            templates: PathBuf::from("shablon_spec/registry/templates.json"),
        }
    }
}

/// Shared backend services the emitted client calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backends {
    pub core: String,
    pub tula: String,
    pub shablon: String,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            core: "http://localhost:8000".to_string(),
            tula: "http://localhost:8001".to_string(),
            shablon: "http://localhost:8002".to_string(),
        }
    }
}

/// Client runtime settings written into the deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub port: u16,
    pub log_level: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "INFO".to_string(),
        }
    }
}

/// Feature → catalog tag table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionRules {
    pub feature_tags: IndexMap<String, Vec<String>>,
}

impl Default for SelectionRules {
    fn default() -> Self {
        let table: [(&str, &[&str]); 6] = [
            ("booking_widget", &["booking", "validation", "notification", "slots"]),
            ("slot_validation", &["validation", "slots"]),
            ("telegram_notifications", &["notification", "telegram"]),
            ("notifications", &["notification"]),
            ("admin_panel", &["admin"]),
            ("payment_integration", &["payment"]),
        ];
        Self {
            feature_tags: table
                .iter()
                .map(|(k, tags)| (k.to_string(), tags.iter().map(|t| t.to_string()).collect()))
                .collect(),
        }
    }
}

impl SelectionRules {
    /// Tags for a feature name (case-insensitive), if mapped.
    pub fn tags_for(&self, feature: &str) -> Option<&[String]> {
        self.feature_tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(feature.trim()))
            .map(|(_, v)| v.as_slice())
    }
}

/// Tables consulted by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningRules {
    /// Integration → secret placeholders for its `api_layer` entry
    pub secret_integrations: IndexMap<String, Vec<String>>,
    /// Features that switch file storage to the object store
    pub file_features: Vec<String>,
    /// Integration → delivery channel
    pub channel_integrations: IndexMap<String, String>,
    /// Integration names or `type` values that denote a database
    pub datastore_integrations: Vec<String>,
    pub default_datastore_version: String,
    /// Version given to external services that declare none
    pub external_version: String,
    pub provisioner: String,
}

impl Default for PlanningRules {
    fn default() -> Self {
        let channels = [
            ("telegram_bot", "telegram"),
            ("telegram", "telegram"),
            ("email", "email"),
            ("smtp", "email"),
            ("sendgrid", "email"),
            ("mailgun", "email"),
            ("sms", "sms"),
            ("twilio", "sms"),
            ("web", "web"),
            ("widget", "web"),
            ("messaging", "web"),
            ("chat", "web"),
        ];
        Self {
            secret_integrations: IndexMap::from([(
                "telegram_bot".to_string(),
                vec!["${{secrets.TELEGRAM_TOKEN}}".to_string()],
            )]),
            file_features: ["file_upload", "file_storage", "uploads", "attachments", "documents"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            channel_integrations: channels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            datastore_integrations: ["database", "postgresql", "postgres", "mysql", "mariadb", "mongodb"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_datastore_version: "15".to_string(),
            external_version: "1.0.0".to_string(),
            provisioner: "jalm-fullstack".to_string(),
        }
    }
}

impl PlanningRules {
    pub fn secrets_for(&self, integration: &str) -> Option<&Vec<String>> {
        self.secret_integrations
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(integration))
            .map(|(_, v)| v)
    }

    pub fn channel_for(&self, integration: &str) -> Option<&str> {
        self.channel_integrations
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(integration))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_file_feature(&self, feature: &str) -> bool {
        self.file_features
            .iter()
            .any(|f| f.eq_ignore_ascii_case(feature.trim()))
    }

    pub fn is_datastore(&self, token: &str) -> bool {
        self.datastore_integrations
            .iter()
            .any(|d| d.eq_ignore_ascii_case(token.trim()))
    }
}

impl CompilerConfig {
    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CompileError::ConfigInvalid(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse TOML configuration text.
    pub fn parse(toml_text: &str) -> Result<Self> {
        toml::from_str(toml_text)
            .map_err(|e| CompileError::ConfigInvalid(format!("TOML parse error: {}", e)))
    }

    /// Load `path` when it exists; otherwise fall back to defaults unless the
    /// caller insisted on that file.
    pub fn load_or_default(path: &Path, explicit: bool) -> Result<Self> {
        if path.exists() || explicit {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
