//! JP-004: Intent parsing and validation.
//!
//! Turns intent bytes into a normalized [`Intent`]:
//! - lines starting with three backticks are dropped (LLM fencing)
//! - bytes must be UTF-8 YAML with a mapping at the top level
//! - `app.name` must be present and non-empty
//! - every other section defaults when absent
//!
//! Variable values are never interpreted.

use super::error::{CompileError, Result, SourceLocation};
use super::types::*;
use indexmap::IndexMap;
use std::path::Path;

/// Read and parse an intent file from disk.
pub fn parse_intent_file(path: &Path) -> Result<Intent> {
    let bytes = std::fs::read(path).map_err(|source| CompileError::IntentUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&bytes)
}

/// Parse intent bytes.
pub fn parse(bytes: &[u8]) -> Result<Intent> {
    let text = std::str::from_utf8(bytes).map_err(|e| CompileError::IntentMalformed {
        message: format!("intent is not UTF-8 text: {}", e),
        location: None,
    })?;
    let cleaned = strip_fences(text);

    let value: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(&cleaned).map_err(|e| CompileError::IntentMalformed {
            message: format!("YAML parse error: {}", e),
            location: e.location().map(|l| SourceLocation {
                line: l.line(),
                column: l.column(),
            }),
        })?;

    match value {
        serde_yaml_ng::Value::Mapping(_) => {}
        serde_yaml_ng::Value::Null => {
            return Err(CompileError::IntentInvalid(
                "intent is empty; app.name is required".to_string(),
            ))
        }
        ref other => {
            return Err(CompileError::malformed(format!(
                "intent must be a mapping of sections, got {}",
                value_kind(other)
            )))
        }
    }

    let doc: IntentDocument = serde_yaml_ng::from_value(value)
        .map_err(|e| CompileError::IntentInvalid(format!("bad section shape: {}", e)))?;
    from_document(doc)
}

/// Validate and normalize a wire document.
pub fn from_document(doc: IntentDocument) -> Result<Intent> {
    let app = doc.app.unwrap_or_default();
    let name = scalar_text("app.name", app.name)?
        .map(|n| normalize_ws(&n))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| CompileError::IntentInvalid("app.name is required".to_string()))?;

    let flavor = match app.runtime.as_deref() {
        None => Flavor::default(),
        Some(token) => Flavor::from_token(token).ok_or_else(|| {
            CompileError::IntentInvalid(format!(
                "unsupported runtime flavor '{}' (expected python or node)",
                token
            ))
        })?,
    };

    let env = match scalar_text("env", doc.env)?.as_deref() {
        None => EnvHint::Unspecified,
        Some(token) => EnvHint::from_token(token).ok_or_else(|| {
            CompileError::IntentInvalid(format!(
                "unsupported env '{}' (expected prod or dev)",
                token
            ))
        })?,
    };

    let mut features = IndexMap::new();
    for (key, value) in doc.features {
        features.insert(key.clone(), parse_feature(&key, value)?);
    }

    let mut integrations = IndexMap::new();
    for (key, value) in doc.integrations {
        integrations.insert(key.clone(), parse_integration(&key, value)?);
    }

    let domain = scalar_text("domain", doc.domain)?
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(Intent {
        identity: Identity {
            slug: slugify(&name),
            name,
        },
        flavor,
        features,
        integrations,
        variables: doc.variables,
        env,
        domain,
    })
}

/// Derive the app id: lowercase, runs outside `[a-z0-9_]` become `_`,
/// edge underscores trimmed. Names with no usable characters hash instead.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    let slug = out.trim_matches('_');
    if slug.is_empty() {
        let digest = blake3::hash(name.as_bytes()).to_hex();
        format!("app_{}", &digest[..8])
    } else {
        slug.to_string()
    }
}

/// Drop markup-fence lines (```yaml, ```).
pub fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of a scalar field. Null reads as absent; collections are rejected.
fn scalar_text(field: &str, value: Option<serde_yaml_ng::Value>) -> Result<Option<String>> {
    match value {
        None | Some(serde_yaml_ng::Value::Null) => Ok(None),
        Some(
            v @ (serde_yaml_ng::Value::String(_)
            | serde_yaml_ng::Value::Number(_)
            | serde_yaml_ng::Value::Bool(_)),
        ) => Ok(Some(yaml_value_to_string(&v))),
        Some(other) => Err(CompileError::IntentInvalid(format!(
            "{} must be a scalar, got {}",
            field,
            value_kind(&other)
        ))),
    }
}

fn parse_feature(name: &str, value: serde_yaml_ng::Value) -> Result<FeatureValue> {
    match value {
        serde_yaml_ng::Value::Bool(on) => Ok(FeatureValue::Toggle(on)),
        serde_yaml_ng::Value::Null => Ok(FeatureValue::Toggle(false)),
        serde_yaml_ng::Value::Mapping(m) => Ok(FeatureValue::Options(string_keyed(name, m)?)),
        other => Err(CompileError::IntentInvalid(format!(
            "feature '{}' must be a bool or an option map, got {}",
            name,
            value_kind(&other)
        ))),
    }
}

fn parse_integration(name: &str, value: serde_yaml_ng::Value) -> Result<Integration> {
    let mut options = match value {
        serde_yaml_ng::Value::Bool(enabled) => {
            return Ok(Integration {
                enabled,
                kind: None,
                version: None,
                options: IndexMap::new(),
            })
        }
        serde_yaml_ng::Value::Null => IndexMap::new(),
        serde_yaml_ng::Value::Mapping(m) => string_keyed(name, m)?,
        other => {
            return Err(CompileError::IntentInvalid(format!(
                "integration '{}' must be a bool or an option map, got {}",
                name,
                value_kind(&other)
            )))
        }
    };

    let enabled = match options.shift_remove("enabled") {
        None | Some(serde_yaml_ng::Value::Null) => true,
        Some(serde_yaml_ng::Value::Bool(b)) => b,
        Some(other) => {
            return Err(CompileError::IntentInvalid(format!(
                "integration '{}': enabled must be a bool, got {}",
                name,
                value_kind(&other)
            )))
        }
    };
    let kind = options
        .shift_remove("type")
        .map(|v| normalize_ws(&yaml_value_to_string(&v)))
        .filter(|s| !s.is_empty());
    let version = options
        .shift_remove("version")
        .map(|v| normalize_ws(&yaml_value_to_string(&v)))
        .filter(|s| !s.is_empty());

    Ok(Integration {
        enabled,
        kind,
        version,
        options,
    })
}

fn string_keyed(
    owner: &str,
    mapping: serde_yaml_ng::Mapping,
) -> Result<IndexMap<String, serde_yaml_ng::Value>> {
    let mut out = IndexMap::new();
    for (k, v) in mapping {
        match k {
            serde_yaml_ng::Value::String(s) => {
                out.insert(s, v);
            }
            other => {
                return Err(CompileError::IntentInvalid(format!(
                    "'{}' has a non-string key: {}",
                    owner,
                    yaml_value_to_string(&other)
                )))
            }
        }
    }
    Ok(out)
}

fn value_kind(v: &serde_yaml_ng::Value) -> &'static str {
    match v {
        serde_yaml_ng::Value::Null => "null",
        serde_yaml_ng::Value::Bool(_) => "a bool",
        serde_yaml_ng::Value::Number(_) => "a number",
        serde_yaml_ng::Value::String(_) => "a string",
        serde_yaml_ng::Value::Sequence(_) => "a sequence",
        serde_yaml_ng::Value::Mapping(_) => "a mapping",
        serde_yaml_ng::Value::Tagged(_) => "a tagged value",
    }
}
