//! JP-012: Materializer: provision plan to deployment directory.
//!
//! Rendering is pure (`Materializer::render`); only `materialize` touches
//! the filesystem. For a given plan and settings every file is
//! byte-identical across runs and machines.

pub mod flavor;
pub mod network;
pub mod templates;

use crate::core::config::{Backends, CompilerConfig, RuntimeSettings};
use crate::core::diagnostics::{DiagCode, Diagnostic, Diagnostics};
use crate::core::error::{CompileError, Result};
use crate::core::types::*;
use crate::tripwire::hasher;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use templates::RenderContext;

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Relative path with `/` separators
    pub path: String,
    pub contents: String,
}

/// Fingerprint of rendered files; equals `hasher::hash_directory` of the
/// directory they were written to.
pub fn fingerprint(files: &[RenderedFile]) -> String {
    hasher::fingerprint(
        files
            .iter()
            .map(|f| (f.path.as_str(), hasher::hash_string(&f.contents))),
    )
}

#[derive(Debug, Serialize)]
struct ActionDescriptor<'a> {
    name: &'a str,
    description: &'a str,
    version: &'a str,
    endpoint: String,
    method: &'static str,
    backend: &'static str,
}

#[derive(Debug, Serialize)]
struct PluginConfig<'a> {
    app_id: &'a str,
    backends: &'a Backends,
    channels: &'a [Channel],
    functions: Vec<&'a str>,
    templates: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct PluginManifest<'a> {
    app_id: &'a str,
    version: &'static str,
    app_type: Flavor,
    provisioner: &'a str,
    entry: &'static str,
    actions: &'static str,
    landing: String,
    channels: &'a [Channel],
    functions: Vec<&'a str>,
    templates: Vec<&'a str>,
}

/// Writes deployments for one set of backend and runtime settings.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    backends: Backends,
    runtime: RuntimeSettings,
}

impl Materializer {
    pub fn new(backends: Backends, runtime: RuntimeSettings) -> Self {
        Self { backends, runtime }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(config.backends.clone(), config.runtime.clone())
    }

    /// Render every file for `plan` without touching the filesystem.
    pub fn render(&self, plan: &ProvisionPlan) -> Result<Vec<RenderedFile>> {
        check_app_id(&plan.app_id)?;
        let ctx = self.context(plan)?;
        templates::for_flavor(plan.meta.app_type)
            .map(|t| -> Result<RenderedFile> {
                Ok(RenderedFile {
                    path: templates::render(t.path, &ctx)?,
                    contents: templates::render(t.body, &ctx)?,
                })
            })
            .collect()
    }

    /// Write `root/<app_id>/`, replacing any existing directory of that name.
    /// A failure midway leaves the partial directory in place.
    pub fn materialize(&self, plan: &ProvisionPlan, root: &Path) -> Result<PathBuf> {
        let files = self.render(plan)?;
        let dir = root.join(&plan.app_id);
        write_tree(&dir, &files)?;
        tracing::info!(
            app_id = %plan.app_id,
            path = %dir.display(),
            files = files.len(),
            "deployment written"
        );
        Ok(dir)
    }

    fn context(&self, plan: &ProvisionPlan) -> Result<RenderContext> {
        let profile = flavor::profile(plan.meta.app_type);
        let port = self.runtime.port;
        let deps = &plan.dependencies;
        let function_names: Vec<&str> = deps.tula_spec.iter().map(|f| f.service.as_str()).collect();
        let template_names: Vec<&str> =
            deps.shablon_spec.iter().map(|t| t.service.as_str()).collect();
        let channels = plan
            .net
            .channels
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let plan_yaml = plan
            .to_canonical_yaml()
            .map_err(CompileError::PlanInconsistent)?;

        let actions: Vec<ActionDescriptor> = deps
            .tula_spec
            .iter()
            .map(|f| ActionDescriptor {
                name: &f.service,
                description: &f.description,
                version: &f.version,
                endpoint: format!("/api/functions/{}", f.service),
                method: "POST",
                backend: "tula",
            })
            .collect();

        let plugin_config = PluginConfig {
            app_id: &plan.app_id,
            backends: &self.backends,
            channels: &plan.net.channels,
            functions: function_names.clone(),
            templates: template_names.clone(),
        };

        let manifest = PluginManifest {
            app_id: &plan.app_id,
            version: "1.0.0",
            app_type: plan.meta.app_type,
            provisioner: &plan.meta.provisioner,
            entry: "plugin.js",
            actions: "llm_actions.json",
            landing: format!("{}.html", plan.app_id),
            channels: &plan.net.channels,
            functions: function_names,
            templates: template_names,
        };

        let mut ctx = RenderContext::new();
        ctx.insert("app_id", plan.app_id.clone());
        ctx.insert("package_name", plan.app_id.replace('_', "-"));
        ctx.insert("env", plan.env.to_string());
        ctx.insert("provisioner", plan.meta.provisioner.clone());
        ctx.insert("flavor", profile.label.to_string());
        ctx.insert("flavor_env", profile.env_switch.to_string());
        ctx.insert("base_image", profile.base_image.to_string());
        ctx.insert("manifest_file", profile.manifest.to_string());
        ctx.insert("entry_file", profile.entry.to_string());
        ctx.insert("port", port.to_string());
        ctx.insert("core_url", self.backends.core.clone());
        ctx.insert("tula_url", self.backends.tula.clone());
        ctx.insert("shablon_url", self.backends.shablon.clone());
        ctx.insert("log_level", self.runtime.log_level.clone());
        ctx.insert("domain", plan.net.domain.clone());
        ctx.insert("server_name", network::server_name(&plan.net.domain));
        ctx.insert("subnet", network::subnet(&plan.app_id));
        ctx.insert("health_endpoint", plan.health.endpoint.clone());
        ctx.insert("health_timeout", plan.health.timeout.clone());
        ctx.insert("healthcheck", profile.healthcheck(port, &plan.health.endpoint));
        ctx.insert("storage_mount", plan.storage.files.mount.clone());
        ctx.insert("channels", channels.clone());
        ctx.insert("plan_yaml", plan_yaml);
        ctx.insert("env_extra", env_extra(plan));
        ctx.insert("plugin_config", to_json(&plugin_config)?);
        ctx.insert("llm_actions", to_json(&actions)?);
        ctx.insert("manifest", to_json(&manifest)?);
        ctx.insert("app_id_html", html_escape(&plan.app_id));
        ctx.insert("env_html", html_escape(&plan.env.to_string()));
        ctx.insert("domain_html", html_escape(&plan.net.domain));
        ctx.insert("channels_html", html_escape(&channels));
        ctx.insert("summary_rows", summary_rows(plan));
        ctx.insert("datastore_summary", datastore_summary(&deps.datastore));
        ctx.insert("storage_summary", storage_summary(&plan.storage.files));
        ctx.insert(
            "function_list",
            bullet_list(deps.tula_spec.iter().map(|f| (&f.service, &f.version, &f.description))),
        );
        ctx.insert(
            "template_list",
            bullet_list(
                deps.shablon_spec
                    .iter()
                    .map(|t| (&t.service, &t.version, &t.description)),
            ),
        );
        ctx.insert("external_list", external_list(&deps.api_layer));
        Ok(ctx)
    }
}

/// Materialize with default backend and runtime settings.
pub fn materialize(plan: &ProvisionPlan, root: &Path) -> Result<PathBuf> {
    Materializer::default().materialize(plan, root)
}

fn check_app_id(app_id: &str) -> Result<()> {
    let ok = !app_id.is_empty()
        && app_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CompileError::PlanInconsistent(format!(
            "app_id '{}' is not a slug",
            app_id
        )))
    }
}

fn write_tree(dir: &Path, files: &[RenderedFile]) -> Result<()> {
    if dir.is_dir() {
        std::fs::remove_dir_all(dir).map_err(|e| CompileError::write_failed(dir, e))?;
    } else if dir.exists() {
        std::fs::remove_file(dir).map_err(|e| CompileError::write_failed(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| CompileError::write_failed(dir, e))?;

    for file in files {
        let path = dir.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CompileError::write_failed(parent, e))?;
        }
        std::fs::write(&path, &file.contents).map_err(|e| CompileError::write_failed(&path, e))?;
        tracing::debug!(path = %file.path, bytes = file.contents.len(), "wrote file");
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CompileError::PlanInconsistent(format!("JSON serialize error: {}", e)))
}

/// `${{secrets.TELEGRAM_TOKEN}}` → `TELEGRAM_TOKEN`.
fn secret_env_key(placeholder: &str) -> String {
    let inner = placeholder
        .trim()
        .trim_start_matches('$')
        .trim_start_matches("{{")
        .trim_end_matches("}}")
        .trim();
    let inner = inner.strip_prefix("secrets.").unwrap_or(inner);
    inner
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn env_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'));
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

fn env_extra(plan: &ProvisionPlan) -> String {
    let files = &plan.storage.files;
    let mut lines = vec![
        String::new(),
        "# storage".to_string(),
        format!(
            "STORAGE_TYPE={}",
            match files.kind {
                StorageKind::Local => "local",
                StorageKind::AwsS3 => "aws-s3",
            }
        ),
        format!("STORAGE_MOUNT={}", files.mount),
    ];
    if let Some(ref bucket) = files.bucket {
        lines.push(format!("S3_BUCKET={}", bucket));
    }

    if !plan.dependencies.datastore.is_empty() {
        lines.push(String::new());
        lines.push("# datastore".to_string());
        lines.push("DATABASE_URL=".to_string());
    }

    let secret_keys = secret_keys(plan);
    if !secret_keys.is_empty() {
        lines.push(String::new());
        lines.push("# secrets".to_string());
        lines.extend(secret_keys.into_iter().map(|k| format!("{}=", k)));
    }

    let fixed = fixed_env_keys(plan);
    let variables: Vec<_> = plan
        .variables
        .iter()
        .filter(|(key, _)| variable_issue(key, &fixed).is_none())
        .collect();
    if !variables.is_empty() {
        lines.push(String::new());
        lines.push("# operator variables".to_string());
        for (key, value) in variables {
            lines.push(format!("{}={}", key, env_value(&yaml_value_to_string(value))));
        }
    }
    lines.join("\n")
}

fn secret_keys(plan: &ProvisionPlan) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for svc in &plan.dependencies.api_layer {
        for placeholder in svc.secrets.iter().flatten() {
            let key = secret_env_key(placeholder);
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Keys `config/.env` always writes for this plan.
fn fixed_env_keys(plan: &ProvisionPlan) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = [
        flavor::profile(plan.meta.app_type).env_switch,
        "PORT",
        "APP_ID",
        "JALM_CORE_URL",
        "JALM_TULA_URL",
        "JALM_SHABLON_URL",
        "LOG_LEVEL",
        "STORAGE_TYPE",
        "STORAGE_MOUNT",
        "S3_BUCKET",
        "DATABASE_URL",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect();
    keys.extend(secret_keys(plan));
    keys
}

fn variable_issue(key: &str, fixed: &BTreeSet<String>) -> Option<&'static str> {
    let mut chars = key.chars();
    let well_formed = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        Some("not a valid environment variable name")
    } else if fixed.contains(key) {
        Some("collides with a generated key")
    } else {
        None
    }
}

/// Warn about operator variables that `config/.env` leaves out. They stay
/// in `config/provision.yaml` unchanged.
pub fn check_variables(plan: &ProvisionPlan, diags: &mut Diagnostics) {
    let fixed = fixed_env_keys(plan);
    for key in plan.variables.keys() {
        if let Some(issue) = variable_issue(key, &fixed) {
            diags.push(
                Diagnostic::warning(
                    DiagCode::VariableSkipped,
                    format!("variable '{}' left out of config/.env: {}", key, issue),
                )
                .with_field("variable", key.as_str()),
            );
        }
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn summary_rows(plan: &ProvisionPlan) -> String {
    let deps = &plan.dependencies;
    let mut rows: Vec<[String; 4]> = Vec::new();
    if let Some(ref engine) = deps.datastore.engine {
        rows.push([
            engine.clone(),
            "datastore".to_string(),
            deps.datastore.tier.clone().unwrap_or_default(),
            "internal".to_string(),
        ]);
    }
    for s in &deps.api_layer {
        rows.push([s.service.clone(), "service".into(), s.version.clone(), s.expose.to_string()]);
    }
    for f in &deps.tula_spec {
        rows.push([f.service.clone(), "function".into(), f.version.clone(), f.expose.to_string()]);
    }
    for t in &deps.shablon_spec {
        rows.push([t.service.clone(), "template".into(), t.version.clone(), t.expose.to_string()]);
    }
    rows.iter()
        .map(|cells| {
            let tds: String = cells
                .iter()
                .map(|c| format!("<td>{}</td>", html_escape(c)))
                .collect();
            format!("      <tr>{}</tr>\n", tds)
        })
        .collect()
}

fn datastore_summary(ds: &Datastore) -> String {
    match (&ds.engine, &ds.tier) {
        (Some(engine), Some(tier)) => format!("`{}` ({})", engine, tier),
        (Some(engine), None) => format!("`{}`", engine),
        _ => "none".to_string(),
    }
}

fn storage_summary(files: &FileStorage) -> String {
    match (&files.kind, &files.bucket) {
        (StorageKind::AwsS3, Some(bucket)) => {
            format!("aws-s3 bucket `{}` at `{}`", bucket, files.mount)
        }
        (StorageKind::AwsS3, None) => format!("aws-s3 at `{}`", files.mount),
        (StorageKind::Local, _) => format!("local volume at `{}`", files.mount),
    }
}

fn bullet_list<'a>(items: impl Iterator<Item = (&'a String, &'a String, &'a String)>) -> String {
    let lines: Vec<String> = items
        .map(|(name, version, description)| {
            if description.is_empty() {
                format!("- `{}` {}\n", name, version)
            } else {
                format!("- `{}` {}: {}\n", name, version, description)
            }
        })
        .collect();
    if lines.is_empty() {
        "_none_\n".to_string()
    } else {
        lines.concat()
    }
}

fn external_list(services: &[ApiService]) -> String {
    if services.is_empty() {
        return "_none_\n".to_string();
    }
    services
        .iter()
        .map(|s| match s.secrets {
            Some(ref secrets) if !secrets.is_empty() => format!(
                "- `{}` {} (secrets: {})\n",
                s.service,
                s.version,
                secrets
                    .iter()
                    .map(|p| format!("`{}`", secret_env_key(p)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            _ => format!("- `{}` {}\n", s.service, s.version),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PlanningRules;
    use crate::core::diagnostics::Diagnostics;
    use crate::core::{parser, planner};

    fn func(id: &str, tags: &[&str]) -> FunctionEntry {
        FunctionEntry {
            id: id.to_string(),
            version: "1.2.0".to_string(),
            description: format!("{} <fn>", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn plan_from(yaml: &str, selection: Selection) -> ProvisionPlan {
        let intent = parser::parse(yaml.as_bytes()).unwrap();
        planner::plan(
            &intent,
            &selection,
            &PlanningRules::default(),
            &mut Diagnostics::default(),
        )
        .unwrap()
    }

    fn booking_plan() -> ProvisionPlan {
        plan_from(
            r#"
app: {name: Barbershop}
features: {booking_widget: true}
integrations:
  database: {enabled: true, type: postgresql, version: "15"}
  telegram_bot: {enabled: true}
variables:
  ADMIN_CHAT_ID: "42"
  GREETING: Hello there
"#,
            Selection {
                functions: vec![
                    func("slot_validator", &["booking"]),
                    func("notify_system", &["notification"]),
                ],
                templates: vec![],
            },
        )
    }

    fn file<'a>(files: &'a [RenderedFile], path: &str) -> &'a str {
        &files
            .iter()
            .find(|f| f.path == path)
            .unwrap_or_else(|| panic!("missing {}", path))
            .contents
    }

    #[test]
    fn test_jp012_python_file_set() {
        let files = Materializer::default().render(&booking_plan()).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        for expected in [
            "config/provision.yaml",
            "config/.env",
            "config/nginx.conf",
            "requirements.txt",
            "app.py",
            "Dockerfile",
            "docker-compose.yml",
            "FILES/plugin.js",
            "FILES/llm_actions.json",
            "FILES/manifest.json",
            "FILES/migrations.csv",
            "FILES/barbershop.html",
            "README.md",
        ] {
            assert!(paths.contains(&expected), "missing {}", expected);
        }
        assert!(!paths.contains(&"server.js"));
        assert!(file(&files, "Dockerfile").contains("FROM python:3.11-slim"));
        assert!(file(&files, "Dockerfile").contains("EXPOSE 8080"));
    }

    #[test]
    fn test_jp012_node_flavor() {
        let plan = plan_from("app: {name: Node Shop, runtime: node}", Selection::default());
        let files = Materializer::default().render(&plan).unwrap();
        assert!(file(&files, "Dockerfile").contains("FROM node:20-alpine"));
        assert!(file(&files, "package.json").contains("\"name\": \"node-shop\""));
        assert!(file(&files, "config/.env").starts_with("# node_shop"));
        assert!(file(&files, "config/.env").contains("NODE_ENV=production\n"));
        assert!(file(&files, "server.js").contains("\"http://localhost:8001\""));
    }

    #[test]
    fn test_jp012_env_file() {
        let files = Materializer::default().render(&booking_plan()).unwrap();
        let env = file(&files, "config/.env");
        assert!(env.contains("APP_ENV=production\n"));
        assert!(env.contains("PORT=8080\n"));
        assert!(env.contains("APP_ID=barbershop\n"));
        assert!(env.contains("JALM_CORE_URL=http://localhost:8000\n"));
        assert!(env.contains("JALM_TULA_URL=http://localhost:8001\n"));
        assert!(env.contains("JALM_SHABLON_URL=http://localhost:8002\n"));
        assert!(env.contains("LOG_LEVEL=INFO\n"));
        assert!(env.contains("DATABASE_URL=\n"));
        assert!(env.contains("TELEGRAM_TOKEN=\n"));
        assert!(env.contains("ADMIN_CHAT_ID=42\n"));
        assert!(env.contains("GREETING=\"Hello there\"\n"));
        assert!(env.ends_with('\n'));
    }

    #[test]
    fn test_jp012_compose_file() {
        let plan = booking_plan();
        let files = Materializer::default().render(&plan).unwrap();
        let compose = file(&files, "docker-compose.yml");
        assert!(compose.contains("  \"barbershop\":\n"));
        assert!(compose.contains("\"8080:8080\""));
        assert!(compose.contains("barbershop_data:/app/FILES"));
        assert!(compose.contains("barbershop-network:\n    driver: bridge"));
        assert!(compose.contains(&format!("subnet: {}", network::subnet("barbershop"))));
        assert!(compose.contains("http://localhost:8080/health"));
        assert!(compose.contains("timeout: 3s"));
        let parsed: serde_yaml_ng::Value = serde_yaml_ng::from_str(compose).unwrap();
        assert!(parsed["services"]["barbershop"]["healthcheck"]["test"].is_sequence());
    }

    #[test]
    fn test_jp012_unsafe_variables_left_out_of_env() {
        let plan = plan_from(
            r#"
app: {name: Vars}
integrations: {telegram_bot: true}
variables:
  PORT: 9999
  TELEGRAM_TOKEN: leaked
  "BAD KEY": x
  "A=B": y
  "2FA": z
  SLOT_MINUTES: 30
"#,
            Selection::default(),
        );
        let files = Materializer::default().render(&plan).unwrap();
        let env = file(&files, "config/.env");
        assert_eq!(env.matches("PORT=").count(), 1);
        assert!(env.contains("PORT=8080\n"));
        assert!(env.contains("TELEGRAM_TOKEN=\n"));
        assert!(!env.contains("leaked"));
        assert!(!env.contains("BAD KEY"));
        assert!(!env.contains("A=B"));
        assert!(!env.contains("2FA"));
        assert!(env.contains("SLOT_MINUTES=30\n"));
        assert!(file(&files, "config/provision.yaml").contains("BAD KEY"));

        let mut diags = Diagnostics::default();
        check_variables(&plan, &mut diags);
        assert_eq!(diags.len(), 5);
        assert_eq!(diags.warnings(), 5);
        assert!(diags.has_code(DiagCode::VariableSkipped));
    }

    #[test]
    fn test_jp012_compose_service_key_is_string() {
        for (name, app_id) in [("2024", "2024"), ("True", "true"), ("Null", "null")] {
            let plan = plan_from(&format!("app: {{name: \"{}\"}}", name), Selection::default());
            assert_eq!(plan.app_id, app_id);
            let files = Materializer::default().render(&plan).unwrap();
            let parsed: serde_yaml_ng::Value =
                serde_yaml_ng::from_str(file(&files, "docker-compose.yml")).unwrap();
            let services = parsed["services"].as_mapping().unwrap();
            let keys: Vec<_> = services.keys().collect();
            assert_eq!(keys, vec![&serde_yaml_ng::Value::String(app_id.to_string())]);
            assert_eq!(
                parsed["services"][app_id]["container_name"],
                serde_yaml_ng::Value::String(app_id.to_string())
            );
        }
    }

    #[test]
    fn test_jp012_provision_yaml_roundtrips() {
        let plan = booking_plan();
        let files = Materializer::default().render(&plan).unwrap();
        let yaml = file(&files, "config/provision.yaml");
        assert!(yaml.contains("${{secrets.TELEGRAM_TOKEN}}"));
        assert_eq!(ProvisionPlan::from_yaml(yaml).unwrap(), plan);
    }

    #[test]
    fn test_jp012_json_assets_parse() {
        let files = Materializer::default().render(&booking_plan()).unwrap();
        let actions: serde_json::Value =
            serde_json::from_str(file(&files, "FILES/llm_actions.json")).unwrap();
        assert_eq!(actions.as_array().unwrap().len(), 2);
        assert_eq!(actions[0]["name"], "slot_validator");
        assert_eq!(actions[0]["endpoint"], "/api/functions/slot_validator");
        let manifest: serde_json::Value =
            serde_json::from_str(file(&files, "FILES/manifest.json")).unwrap();
        assert_eq!(manifest["app_id"], "barbershop");
        assert_eq!(manifest["landing"], "barbershop.html");
        assert_eq!(manifest["channels"][0], "telegram");
    }

    #[test]
    fn test_jp012_plugin_and_landing() {
        let files = Materializer::default().render(&booking_plan()).unwrap();
        let plugin = file(&files, "FILES/plugin.js");
        assert!(plugin.trim_start().starts_with("/**"));
        assert!(plugin.contains("\"app_id\": \"barbershop\""));
        assert!(plugin.contains("\"slot_validator\""));
        assert!(plugin.contains("http://localhost:8002"));
        let html = file(&files, "FILES/barbershop.html");
        assert!(html.contains("src=\"/FILES/plugin.js\""));
        assert!(html.contains("<td>slot_validator</td><td>function</td>"));
        assert!(html.contains("<title>barbershop</title>"));
    }

    #[test]
    fn test_jp012_nginx_server_name() {
        let files = Materializer::default().render(&booking_plan()).unwrap();
        let nginx = file(&files, "config/nginx.conf");
        assert!(nginx.contains("server_name ~^(?<tenant>[^.]+)\\.run$;"));
        assert!(nginx.contains("server barbershop:8080;"));
    }

    #[test]
    fn test_jp012_object_store_env() {
        let plan = plan_from("app: {name: Docs}\nfeatures: {file_upload: true}", Selection::default());
        let files = Materializer::default().render(&plan).unwrap();
        let env = file(&files, "config/.env");
        assert!(env.contains("STORAGE_TYPE=aws-s3\n"));
        assert!(env.contains("S3_BUCKET=docs-files"));
        assert!(file(&files, "docker-compose.yml").contains("docs_data:/uploads"));
    }

    #[test]
    fn test_jp012_rejects_non_slug_app_id() {
        let mut plan = booking_plan();
        plan.app_id = "../escape".to_string();
        let err = Materializer::default().render(&plan).unwrap_err();
        assert_eq!(err.kind(), "PlanInconsistent");
    }

    #[test]
    fn test_jp012_materialize_overwrites_and_fingerprints() {
        let root = tempfile::tempdir().unwrap();
        let plan = booking_plan();
        let stale = root.path().join("barbershop").join("stale.txt");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        let dir = materialize(&plan, root.path()).unwrap();
        assert_eq!(dir, root.path().join("barbershop"));
        assert!(!stale.exists());
        assert!(dir.join("config").join("provision.yaml").is_file());
        assert!(dir.join("FILES").join("barbershop.html").is_file());

        let files = Materializer::default().render(&plan).unwrap();
        assert_eq!(hasher::hash_directory(&dir).unwrap(), fingerprint(&files));
    }

    #[test]
    fn test_jp012_render_is_deterministic() {
        let m = Materializer::default();
        assert_eq!(m.render(&booking_plan()).unwrap(), m.render(&booking_plan()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_jp012_write_failure_names_path() {
        use std::os::unix::fs::PermissionsExt;
        let root = tempfile::tempdir().unwrap();
        let locked = root.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o500)).unwrap();
        // root ignores permission bits
        if std::fs::write(locked.join("canary"), "x").is_ok() {
            return;
        }
        let err = materialize(&booking_plan(), &locked).unwrap_err();
        assert_eq!(err.kind(), "MaterializationFailed");
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_jp012_secret_env_key() {
        assert_eq!(secret_env_key("${{secrets.TELEGRAM_TOKEN}}"), "TELEGRAM_TOKEN");
        assert_eq!(secret_env_key("stripe-key"), "STRIPE_KEY");
    }
}
