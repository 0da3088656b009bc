//! JP-002: Data model: intents, catalog entries, selections, provision plans.
//!
//! The intent document and the provision plan both roundtrip through YAML.
//! Plan field order is the canonical key order; `IndexMap` keeps every
//! user-supplied mapping in document order.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Intent document (wire form)
// ============================================================================

/// Raw intent document as written by an operator or an LLM.
///
/// Unknown top-level sections are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntentDocument {
    /// Application identity and runtime flavor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppSection>,

    /// Feature toggles (bool) or option bags
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    #[schemars(with = "std::collections::BTreeMap<String, serde_json::Value>")]
    pub features: IndexMap<String, serde_yaml_ng::Value>,

    /// Integration option bags, keyed by integration name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    #[schemars(with = "std::collections::BTreeMap<String, serde_json::Value>")]
    pub integrations: IndexMap<String, serde_yaml_ng::Value>,

    /// Operator-filled configuration keys, passed through verbatim
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    #[schemars(with = "std::collections::BTreeMap<String, serde_json::Value>")]
    pub variables: IndexMap<String, serde_yaml_ng::Value>,

    /// Environment hint: prod | dev
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    pub env: Option<serde_yaml_ng::Value>,

    /// Domain template, may contain `{tenant}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    pub domain: Option<serde_yaml_ng::Value>,
}

/// The `app` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppSection {
    /// Display name (required). Any scalar is read as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    pub name: Option<serde_yaml_ng::Value>,

    /// Runtime flavor token (python | node)
    #[serde(default, alias = "flavor", skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    /// Informational application type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Informational application version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<serde_json::Value>")]
    pub version: Option<serde_yaml_ng::Value>,
}

// ============================================================================
// Intent (validated)
// ============================================================================

/// Runtime family of the emitted client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// runtime-A: Python / FastAPI
    #[default]
    Python,
    /// runtime-B: Node.js / express
    Node,
}

impl Flavor {
    /// Resolve a flavor token from an intent (case-insensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "python" | "py" | "fastapi" | "runtime-a" => Some(Self::Python),
            "node" | "nodejs" | "js" | "express" | "runtime-b" => Some(Self::Node),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Environment hint from the intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvHint {
    Prod,
    Dev,
    #[default]
    Unspecified,
}

impl EnvHint {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Some(Self::Prod),
            "dev" | "development" => Some(Self::Dev),
            "" | "unspecified" => Some(Self::Unspecified),
            _ => None,
        }
    }

    /// Token written back by the canonical serializer.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Self::Prod => Some("prod"),
            Self::Dev => Some("dev"),
            Self::Unspecified => None,
        }
    }
}

/// Display name and its slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub slug: String,
}

/// A feature: plain toggle or option bag.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Toggle(bool),
    Options(IndexMap<String, serde_yaml_ng::Value>),
}

impl FeatureValue {
    /// Option bags count as enabled unless they say `enabled: false`.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Toggle(on) => *on,
            Self::Options(opts) => !matches!(
                opts.get("enabled"),
                Some(serde_yaml_ng::Value::Bool(false))
            ),
        }
    }
}

/// A normalized integration entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Integration {
    pub enabled: bool,
    /// Declared `type` (e.g. `postgresql`)
    pub kind: Option<String>,
    /// Declared version, as text
    pub version: Option<String>,
    /// Remaining options, verbatim
    pub options: IndexMap<String, serde_yaml_ng::Value>,
}

/// Validated, normalized intent. Immutable after parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub identity: Identity,
    pub flavor: Flavor,
    pub features: IndexMap<String, FeatureValue>,
    pub integrations: IndexMap<String, Integration>,
    pub variables: IndexMap<String, serde_yaml_ng::Value>,
    pub env: EnvHint,
    pub domain: Option<String>,
}

impl Intent {
    /// Enabled integrations in intent order.
    pub fn enabled_integrations(&self) -> impl Iterator<Item = (&String, &Integration)> {
        self.integrations.iter().filter(|(_, i)| i.enabled)
    }

    /// Enabled features in intent order.
    pub fn enabled_features(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.features.iter().filter(|(_, f)| f.is_enabled())
    }

    /// Convert back to the wire document.
    pub fn to_document(&self) -> IntentDocument {
        let features = self
            .features
            .iter()
            .map(|(name, value)| {
                let v = match value {
                    FeatureValue::Toggle(on) => serde_yaml_ng::Value::Bool(*on),
                    FeatureValue::Options(opts) => mapping_from(opts),
                };
                (name.clone(), v)
            })
            .collect();

        let integrations = self
            .integrations
            .iter()
            .map(|(name, integ)| {
                let mut m = serde_yaml_ng::Mapping::new();
                m.insert("enabled".into(), serde_yaml_ng::Value::Bool(integ.enabled));
                if let Some(ref kind) = integ.kind {
                    m.insert("type".into(), kind.as_str().into());
                }
                if let Some(ref version) = integ.version {
                    m.insert("version".into(), version.as_str().into());
                }
                for (k, v) in &integ.options {
                    m.insert(k.as_str().into(), v.clone());
                }
                (name.clone(), serde_yaml_ng::Value::Mapping(m))
            })
            .collect();

        IntentDocument {
            app: Some(AppSection {
                name: Some(self.identity.name.as_str().into()),
                runtime: Some(self.flavor.as_str().to_string()),
                kind: None,
                version: None,
            }),
            features,
            integrations,
            variables: self.variables.clone(),
            env: self.env.token().map(serde_yaml_ng::Value::from),
            domain: self.domain.as_deref().map(serde_yaml_ng::Value::from),
        }
    }

    /// Canonical YAML form. Parsing it yields an equal `Intent`.
    pub fn to_canonical_yaml(&self) -> Result<String, String> {
        serde_yaml_ng::to_string(&self.to_document())
            .map_err(|e| format!("intent serialize error: {}", e))
    }
}

fn mapping_from(opts: &IndexMap<String, serde_yaml_ng::Value>) -> serde_yaml_ng::Value {
    let mut m = serde_yaml_ng::Mapping::new();
    for (k, v) in opts {
        m.insert(k.as_str().into(), v.clone());
    }
    serde_yaml_ng::Value::Mapping(m)
}

// ============================================================================
// Catalog entries
// ============================================================================

/// Anything carrying an id and a tag set.
pub trait Tagged {
    fn id(&self) -> &str;
    fn tags(&self) -> &[String];

    /// Case-insensitive membership test for one lowercase tag.
    fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t.trim().eq_ignore_ascii_case(tag))
    }
}

/// A tool function ("tula") catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A template ("shablon") catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_version() -> String {
    "latest".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

impl Tagged for FunctionEntry {
    fn id(&self) -> &str {
        &self.id
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl Tagged for TemplateEntry {
    fn id(&self) -> &str {
        &self.id
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Chosen catalog entries, in catalog file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub functions: Vec<FunctionEntry>,
    pub templates: Vec<TemplateEntry>,
}

impl Selection {
    /// True when some selected entry carries `tag`.
    pub fn backs(&self, tag: &str) -> bool {
        let tag = tag.trim().to_ascii_lowercase();
        self.functions.iter().any(|f| f.has_tag(&tag))
            || self.templates.iter().any(|t| t.has_tag(&tag))
    }
}

// ============================================================================
// Provision plan
// ============================================================================

/// The canonical, normalized plan. All emission is a pure function of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionPlan {
    pub app_id: String,
    pub env: DeployTarget,
    pub dependencies: Dependencies,
    pub storage: Storage,
    pub net: Net,
    pub health: HealthContract,
    pub meta: PlanMeta,

    /// Operator variables from the intent, verbatim
    #[serde(default)]
    pub variables: IndexMap<String, serde_yaml_ng::Value>,
}

impl ProvisionPlan {
    /// Canonical YAML: fixed key order, block sequences, UTF-8.
    pub fn to_canonical_yaml(&self) -> Result<String, String> {
        serde_yaml_ng::to_string(self).map_err(|e| format!("plan serialize error: {}", e))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml_ng::from_str(yaml).map_err(|e| format!("plan parse error: {}", e))
    }
}

/// Deployment target literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployTarget {
    #[default]
    #[serde(rename = "prod infra/docker/compose")]
    ProdCompose,
    #[serde(rename = "dev infra/docker/compose")]
    DevCompose,
    #[serde(rename = "prod infra/aws/ecs")]
    ProdEcs,
}

impl DeployTarget {
    pub fn from_hint(hint: EnvHint) -> Self {
        match hint {
            EnvHint::Unspecified => Self::ProdCompose,
            EnvHint::Dev => Self::DevCompose,
            EnvHint::Prod => Self::ProdEcs,
        }
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProdCompose => write!(f, "prod infra/docker/compose"),
            Self::DevCompose => write!(f, "dev infra/docker/compose"),
            Self::ProdEcs => write!(f, "prod infra/aws/ecs"),
        }
    }
}

/// `dependencies` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub datastore: Datastore,
    #[serde(default)]
    pub api_layer: Vec<ApiService>,
    #[serde(default)]
    pub tula_spec: Vec<FunctionSpec>,
    #[serde(default)]
    pub shablon_spec: Vec<TemplateSpec>,
}

/// Managed datastore; serializes as `{}` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastore {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl Datastore {
    pub fn managed(engine: &str, version: &str) -> Self {
        Self {
            engine: Some(format!("{}:{}", engine, version)),
            tier: Some("managed".to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.engine.is_none()
    }
}

/// How a dependency is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expose {
    Internal,
    External,
}

impl fmt::Display for Expose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::External => write!(f, "external"),
        }
    }
}

/// `api_layer` entry: a service outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiService {
    pub service: String,
    pub version: String,
    pub expose: Expose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<String>>,
}

/// `tula_spec` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub service: String,
    pub version: String,
    pub expose: Expose,
    pub description: String,
    pub tags: Vec<String>,
}

/// `shablon_spec` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub service: String,
    pub version: String,
    pub expose: Expose,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
}

/// `storage` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    pub files: FileStorage,
}

/// File storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageKind {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "aws-s3")]
    AwsS3,
}

/// `storage.files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStorage {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub mount: String,
}

impl FileStorage {
    pub fn local() -> Self {
        Self {
            kind: StorageKind::Local,
            bucket: None,
            mount: "/app/FILES".to_string(),
        }
    }

    pub fn object_store(app_id: &str) -> Self {
        Self {
            kind: StorageKind::AwsS3,
            bucket: Some(format!("{}-files", app_id)),
            mount: "/uploads".to_string(),
        }
    }
}

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    Email,
    Sms,
    Telegram,
}

impl Channel {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "web" => Some(Self::Web),
            "email" => Some(Self::Email),
            "sms" => Some(Self::Sms),
            "telegram" => Some(Self::Telegram),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Email => write!(f, "email"),
            Self::Sms => write!(f, "sms"),
            Self::Telegram => write!(f, "telegram"),
        }
    }
}

/// `net` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Net {
    pub ingress: String,
    pub domain: String,
    pub channels: Vec<Channel>,
}

/// `health` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthContract {
    pub endpoint: String,
    pub timeout: String,
}

impl Default for HealthContract {
    fn default() -> Self {
        Self {
            endpoint: "/health".to_string(),
            timeout: "3s".to_string(),
        }
    }
}

/// `meta` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMeta {
    pub provisioner: String,
    pub force_service_discovery: bool,
    pub app_type: Flavor,
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert a serde_yaml_ng::Value to a string for templating.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Collapse internal whitespace runs and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Tests
// ============================================================================
