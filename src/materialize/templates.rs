//! JP-008: Template table and `{{key}}` substitution.
//!
//! One template per emitted file, keyed by output path. Paths are templates
//! too (`FILES/{{app_id}}.html`). Bodies are embedded at compile time.

use crate::core::error::{CompileError, Result};
use crate::core::types::Flavor;
use std::collections::BTreeMap;

/// Values available to templates.
pub type RenderContext = BTreeMap<&'static str, String>;

/// A file the materializer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTemplate {
    /// Output path relative to the deployment directory
    pub path: &'static str,
    pub body: &'static str,
    /// Restrict to one runtime flavor
    pub flavor: Option<Flavor>,
}

impl FileTemplate {
    const fn common(path: &'static str, body: &'static str) -> Self {
        Self {
            path,
            body,
            flavor: None,
        }
    }

    const fn only(flavor: Flavor, path: &'static str, body: &'static str) -> Self {
        Self {
            path,
            body,
            flavor: Some(flavor),
        }
    }

    pub fn applies_to(&self, flavor: Flavor) -> bool {
        self.flavor.is_none_or(|f| f == flavor)
    }
}

const PYTHON_DOCKERFILE: &str = include_str!("../../templates/python/Dockerfile");
const PYTHON_REQUIREMENTS: &str = include_str!("../../templates/python/requirements.txt");
const PYTHON_APP: &str = include_str!("../../templates/python/app.py");
const NODE_DOCKERFILE: &str = include_str!("../../templates/node/Dockerfile");
const NODE_PACKAGE: &str = include_str!("../../templates/node/package.json");
const NODE_SERVER: &str = include_str!("../../templates/node/server.js");
const COMPOSE: &str = include_str!("../../templates/common/docker-compose.yml");
const NGINX: &str = include_str!("../../templates/common/nginx.conf");
const ENV: &str = include_str!("../../templates/common/env");
const PLUGIN_JS: &str = include_str!("../../templates/common/plugin.js");
const MIGRATIONS: &str = include_str!("../../templates/common/migrations.csv");
const LANDING: &str = include_str!("../../templates/common/landing.html");
const README: &str = include_str!("../../templates/common/README.md");

/// Every emitted file, in write order.
pub const TEMPLATES: &[FileTemplate] = &[
    FileTemplate::common("config/provision.yaml", "{{plan_yaml}}"),
    FileTemplate::common("config/.env", ENV),
    FileTemplate::common("config/nginx.conf", NGINX),
    FileTemplate::only(Flavor::Python, "requirements.txt", PYTHON_REQUIREMENTS),
    FileTemplate::only(Flavor::Python, "app.py", PYTHON_APP),
    FileTemplate::only(Flavor::Python, "Dockerfile", PYTHON_DOCKERFILE),
    FileTemplate::only(Flavor::Node, "package.json", NODE_PACKAGE),
    FileTemplate::only(Flavor::Node, "server.js", NODE_SERVER),
    FileTemplate::only(Flavor::Node, "Dockerfile", NODE_DOCKERFILE),
    FileTemplate::common("docker-compose.yml", COMPOSE),
    FileTemplate::common("FILES/plugin.js", PLUGIN_JS),
    FileTemplate::common("FILES/llm_actions.json", "{{llm_actions}}\n"),
    FileTemplate::common("FILES/manifest.json", "{{manifest}}\n"),
    FileTemplate::common("FILES/migrations.csv", MIGRATIONS),
    FileTemplate::common("FILES/{{app_id}}.html", LANDING),
    FileTemplate::common("README.md", README),
];

/// Templates for one flavor, in write order.
pub fn for_flavor(flavor: Flavor) -> impl Iterator<Item = &'static FileTemplate> {
    TEMPLATES.iter().filter(move |t| t.applies_to(flavor))
}

/// Substitute `{{key}}` placeholders from `ctx`.
///
/// Inserted values are never rescanned, so a value containing `{{` is
/// written literally. Unknown keys and unclosed placeholders are errors.
pub fn render(template: &str, ctx: &RenderContext) -> Result<String> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..].find("}}").ok_or_else(|| {
            CompileError::PlanInconsistent(format!("unclosed template at position {}", open))
        })?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let value = ctx.get(key).ok_or_else(|| {
            CompileError::PlanInconsistent(format!("unknown template variable: {}", key))
        })?;

        let value = value.clone();
        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&'static str, &str)]) -> RenderContext {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_jp008_render_basic() {
        let c = ctx(&[("app_id", "demo"), ("port", "8080")]);
        assert_eq!(
            render("{{app_id}} on {{ port }}", &c).unwrap(),
            "demo on 8080"
        );
    }

    #[test]
    fn test_jp008_render_does_not_rescan_values() {
        let c = ctx(&[("secret", "${{secrets.TELEGRAM_TOKEN}}")]);
        assert_eq!(
            render("token: {{secret}}", &c).unwrap(),
            "token: ${{secrets.TELEGRAM_TOKEN}}"
        );
    }

    #[test]
    fn test_jp008_render_unknown_key() {
        let err = render("{{nope}}", &RenderContext::new()).unwrap_err();
        assert_eq!(err.kind(), "PlanInconsistent");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_jp008_render_unclosed() {
        let c = ctx(&[("app_id", "demo")]);
        assert!(render("{{app_id", &c).is_err());
    }

    #[test]
    fn test_jp008_single_braces_untouched() {
        let c = ctx(&[("name", "x")]);
        assert_eq!(
            render("f\"{name}\" {{name}} {\"a\": {\"b\": 1}}", &c).unwrap(),
            "f\"{name}\" x {\"a\": {\"b\": 1}}"
        );
    }

    #[test]
    fn test_jp008_table_per_flavor() {
        let py: Vec<_> = for_flavor(Flavor::Python).map(|t| t.path).collect();
        assert!(py.contains(&"app.py"));
        assert!(!py.contains(&"server.js"));
        let node: Vec<_> = for_flavor(Flavor::Node).map(|t| t.path).collect();
        assert!(node.contains(&"package.json"));
        assert_eq!(node.iter().filter(|p| **p == "Dockerfile").count(), 1);
        assert_eq!(py.len(), node.len());
    }
}
