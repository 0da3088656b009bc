//! JP-007: Provision planning from (Intent, Selection) to a canonical plan.
//!
//! Pure: no I/O, no clock, no hashing of process state. The same inputs
//! always yield the same plan, and the plan serializes byte-identically.

use super::config::PlanningRules;
use super::diagnostics::{DiagCode, Diagnostic, Diagnostics};
use super::error::{CompileError, Result};
use super::types::*;
use std::collections::BTreeSet;

const DEFAULT_DOMAIN: &str = "{tenant}.run";
const TELEGRAM_SERVICE: &str = "telegram_bot";
const DEFAULT_ENGINE: &str = "postgresql";

/// Build the provision plan.
///
/// An integration counts as catalog-backed when a selected entry carries its
/// lowercase name as a tag. Every enabled integration's name is part of the
/// selection query, so this is the same as asking the whole catalog.
pub fn plan(
    intent: &Intent,
    selection: &Selection,
    rules: &PlanningRules,
    diags: &mut Diagnostics,
) -> Result<ProvisionPlan> {
    let app_id = intent.identity.slug.clone();
    if app_id.is_empty() {
        return Err(CompileError::PlanInconsistent(
            "intent identity has an empty slug".to_string(),
        ));
    }

    let datastore = plan_datastore(intent, rules);
    let channels = plan_channels(intent, rules);
    let api_layer = plan_api_layer(intent, selection, rules, &channels, diags);
    let tula_spec = selection
        .functions
        .iter()
        .map(function_spec)
        .collect::<Result<Vec<_>>>()?;
    let shablon_spec = selection
        .templates
        .iter()
        .map(template_spec)
        .collect::<Result<Vec<_>>>()?;

    let files = if intent
        .enabled_features()
        .any(|(name, _)| rules.is_file_feature(name))
    {
        FileStorage::object_store(&app_id)
    } else {
        FileStorage::local()
    };

    let domain = intent
        .domain
        .as_deref()
        .map(normalize_ws)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());

    let plan = ProvisionPlan {
        env: DeployTarget::from_hint(intent.env),
        dependencies: Dependencies {
            datastore,
            api_layer,
            tula_spec,
            shablon_spec,
        },
        storage: Storage { files },
        net: Net {
            ingress: "nginx".to_string(),
            domain,
            channels,
        },
        health: HealthContract::default(),
        meta: PlanMeta {
            provisioner: rules.provisioner.clone(),
            force_service_discovery: true,
            app_type: intent.flavor,
        },
        variables: intent.variables.clone(),
        app_id,
    };

    tracing::debug!(
        app_id = %plan.app_id,
        env = %plan.env,
        api_layer = plan.dependencies.api_layer.len(),
        tula_spec = plan.dependencies.tula_spec.len(),
        shablon_spec = plan.dependencies.shablon_spec.len(),
        "plan built"
    );
    Ok(plan)
}

/// True when the integration denotes the datastore, by name or by `type`.
fn is_datastore(name: &str, integ: &Integration, rules: &PlanningRules) -> bool {
    rules.is_datastore(name) || integ.kind.as_deref().is_some_and(|k| rules.is_datastore(k))
}

fn plan_datastore(intent: &Intent, rules: &PlanningRules) -> Datastore {
    let Some((name, integ)) = intent
        .enabled_integrations()
        .find(|(name, integ)| is_datastore(name, integ, rules))
    else {
        return Datastore::default();
    };

    let engine = match integ.kind.as_deref() {
        Some(kind) => kind.to_ascii_lowercase(),
        None if name.eq_ignore_ascii_case("database") => DEFAULT_ENGINE.to_string(),
        None => name.to_ascii_lowercase(),
    };
    let version = integ
        .version
        .as_deref()
        .unwrap_or(&rules.default_datastore_version);
    Datastore::managed(&engine, version)
}

/// Delivery channel an integration feeds, by name or by `type`.
fn channel_of(name: &str, integ: &Integration, rules: &PlanningRules) -> Option<Channel> {
    rules
        .channel_for(name)
        .or_else(|| integ.kind.as_deref().and_then(|k| rules.channel_for(k)))
        .and_then(Channel::from_token)
}

fn plan_channels(intent: &Intent, rules: &PlanningRules) -> Vec<Channel> {
    let derived: BTreeSet<Channel> = intent
        .enabled_integrations()
        .filter_map(|(name, integ)| channel_of(name, integ, rules))
        .collect();
    if derived.is_empty() {
        vec![Channel::Web]
    } else {
        derived.into_iter().collect()
    }
}

fn external_service(name: &str, version: Option<&str>, rules: &PlanningRules) -> ApiService {
    ApiService {
        service: name.to_string(),
        version: version.unwrap_or(&rules.external_version).to_string(),
        expose: Expose::External,
        secrets: rules.secrets_for(name).cloned(),
    }
}

fn plan_api_layer(
    intent: &Intent,
    selection: &Selection,
    rules: &PlanningRules,
    channels: &[Channel],
    diags: &mut Diagnostics,
) -> Vec<ApiService> {
    let mut api_layer: Vec<ApiService> = Vec::new();
    // Integrations feeding the telegram channel all collapse into the bot.
    let mut telegram_version: Option<&str> = None;

    for (name, integ) in intent.enabled_integrations() {
        if is_datastore(name, integ, rules) {
            continue;
        }
        let backed = selection.backs(name);
        if channel_of(name, integ, rules) == Some(Channel::Telegram) {
            telegram_version = telegram_version.or(integ.version.as_deref());
            if !backed {
                diags.push(
                    Diagnostic::info(
                        DiagCode::ExternalIntegration,
                        format!(
                            "integration '{}' has no catalog backing; served by external {}",
                            name, TELEGRAM_SERVICE
                        ),
                    )
                    .with_field("integration", name.as_str()),
                );
            }
            continue;
        }
        if backed || api_layer.iter().any(|s| s.service == *name) {
            continue;
        }
        diags.push(
            Diagnostic::info(
                DiagCode::ExternalIntegration,
                format!("integration '{}' has no catalog backing; marked external", name),
            )
            .with_field("integration", name.as_str()),
        );
        api_layer.push(external_service(name, integ.version.as_deref(), rules));
    }

    if channels.contains(&Channel::Telegram)
        && !api_layer.iter().any(|s| s.service == TELEGRAM_SERVICE)
    {
        api_layer.push(external_service(TELEGRAM_SERVICE, telegram_version, rules));
    }

    api_layer
}

fn spec_tags(tags: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.iter()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

fn function_spec(entry: &FunctionEntry) -> Result<FunctionSpec> {
    if entry.id.trim().is_empty() {
        return Err(CompileError::PlanInconsistent(
            "selected function entry has no id".to_string(),
        ));
    }
    Ok(FunctionSpec {
        service: entry.id.clone(),
        version: entry.version.clone(),
        expose: Expose::Internal,
        description: normalize_ws(&entry.description),
        tags: spec_tags(&entry.tags),
    })
}

fn template_spec(entry: &TemplateEntry) -> Result<TemplateSpec> {
    if entry.id.trim().is_empty() {
        return Err(CompileError::PlanInconsistent(
            "selected template entry has no id".to_string(),
        ));
    }
    Ok(TemplateSpec {
        service: entry.id.clone(),
        version: entry.version.clone(),
        expose: Expose::Internal,
        description: normalize_ws(&entry.description),
        category: normalize_ws(&entry.category),
        tags: spec_tags(&entry.tags),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser;

    fn func(id: &str, tags: &[&str]) -> FunctionEntry {
        FunctionEntry {
            id: id.to_string(),
            version: "1.0.0".to_string(),
            description: format!("  {}   function ", id),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn plan_for(yaml: &str, selection: &Selection) -> (ProvisionPlan, Diagnostics) {
        let intent = parser::parse(yaml.as_bytes()).unwrap();
        let mut diags = Diagnostics::default();
        let p = plan(&intent, selection, &PlanningRules::default(), &mut diags).unwrap();
        (p, diags)
    }

    #[test]
    fn test_jp007_minimal_plan() {
        let (p, diags) = plan_for("app: {name: \"Demo\"}", &Selection::default());
        assert_eq!(p.app_id, "demo");
        assert_eq!(p.env, DeployTarget::ProdCompose);
        assert_eq!(p.net.channels, vec![Channel::Web]);
        assert_eq!(p.net.domain, "{tenant}.run");
        assert!(p.dependencies.datastore.is_empty());
        assert!(p.dependencies.api_layer.is_empty());
        assert_eq!(p.storage.files, FileStorage::local());
        assert_eq!(p.meta.provisioner, "jalm-fullstack");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_jp007_booking_plan() {
        let selection = Selection {
            functions: vec![func("slot_validator", &["booking", "slots"])],
            templates: vec![],
        };
        let (p, diags) = plan_for(
            r#"
app: {name: Barbershop}
features: {booking_widget: true}
integrations:
  database: {enabled: true, type: postgresql, version: "15"}
  telegram_bot: {enabled: true}
"#,
            &selection,
        );
        assert_eq!(p.app_id, "barbershop");
        assert_eq!(
            p.dependencies.datastore,
            Datastore {
                engine: Some("postgresql:15".to_string()),
                tier: Some("managed".to_string()),
            }
        );
        assert_eq!(
            p.dependencies.api_layer,
            vec![ApiService {
                service: "telegram_bot".to_string(),
                version: "1.0.0".to_string(),
                expose: Expose::External,
                secrets: Some(vec!["${{secrets.TELEGRAM_TOKEN}}".to_string()]),
            }]
        );
        assert!(p.net.channels.contains(&Channel::Telegram));
        assert_eq!(p.dependencies.tula_spec[0].description, "slot_validator function");
        assert_eq!(p.dependencies.tula_spec[0].expose, Expose::Internal);
        assert!(diags.has_code(DiagCode::ExternalIntegration));
    }

    #[test]
    fn test_jp007_backed_telegram_still_forced() {
        let selection = Selection {
            functions: vec![func("notify_system", &["telegram_bot"])],
            templates: vec![],
        };
        let (p, diags) = plan_for("app: {name: T}\nintegrations: {telegram_bot: true}", &selection);
        assert_eq!(p.dependencies.api_layer.len(), 1);
        assert_eq!(p.dependencies.api_layer[0].service, "telegram_bot");
        assert!(!diags.has_code(DiagCode::ExternalIntegration));
    }

    #[test]
    fn test_jp007_telegram_integration_served_by_bot() {
        let (p, diags) = plan_for(
            "app: {name: T}\nintegrations: {telegram: {enabled: true, version: \"2.1\"}}",
            &Selection::default(),
        );
        assert_eq!(
            p.dependencies.api_layer,
            vec![ApiService {
                service: "telegram_bot".to_string(),
                version: "2.1".to_string(),
                expose: Expose::External,
                secrets: Some(vec!["${{secrets.TELEGRAM_TOKEN}}".to_string()]),
            }]
        );
        assert!(diags.has_code(DiagCode::ExternalIntegration));

        let (p, _) = plan_for(
            "app: {name: T}\nintegrations: {telegram: true, telegram_bot: true}",
            &Selection::default(),
        );
        let services: Vec<_> = p.dependencies.api_layer.iter().map(|s| s.service.as_str()).collect();
        assert_eq!(services, vec!["telegram_bot"]);
    }

    #[test]
    fn test_jp007_selection_backs_by_tag() {
        let selection = Selection {
            functions: vec![func("notify_system", &["Telegram"])],
            templates: vec![],
        };
        assert!(selection.backs("telegram"));
        assert!(selection.backs(" TELEGRAM "));
        assert!(!selection.backs("stripe"));
    }

    #[test]
    fn test_jp007_datastore_by_name_and_default_version() {
        let (p, _) = plan_for("app: {name: X}\nintegrations: {database: true}", &Selection::default());
        assert_eq!(
            p.dependencies.datastore.engine.as_deref(),
            Some("postgresql:15")
        );
        let (p, _) = plan_for(
            "app: {name: X}\nintegrations: {mongodb: {version: 7}}",
            &Selection::default(),
        );
        assert_eq!(p.dependencies.datastore.engine.as_deref(), Some("mongodb:7"));
        assert!(p.dependencies.api_layer.is_empty());
    }

    #[test]
    fn test_jp007_external_without_secrets() {
        let (p, _) = plan_for(
            "app: {name: X}\nintegrations: {stripe: {version: 2024-06}}",
            &Selection::default(),
        );
        let svc = &p.dependencies.api_layer[0];
        assert_eq!(svc.service, "stripe");
        assert_eq!(svc.version, "2024-06");
        assert!(svc.secrets.is_none());
        let yaml = p.to_canonical_yaml().unwrap();
        assert!(!yaml.contains("secrets"));
    }

    #[test]
    fn test_jp007_channels_ordered_and_env_mapping() {
        let (p, _) = plan_for(
            "app: {name: X}\nenv: prod\nintegrations: {telegram_bot: true, twilio: true, sendgrid: true}",
            &Selection::default(),
        );
        assert_eq!(
            p.net.channels,
            vec![Channel::Email, Channel::Sms, Channel::Telegram]
        );
        assert_eq!(p.env, DeployTarget::ProdEcs);
    }

    #[test]
    fn test_jp007_file_feature_switches_storage() {
        let (p, _) = plan_for(
            "app: {name: Photo Shop}\nfeatures: {file_upload: true}",
            &Selection::default(),
        );
        assert_eq!(p.storage.files, FileStorage::object_store("photo_shop"));
        assert_eq!(p.storage.files.bucket.as_deref(), Some("photo_shop-files"));
    }

    #[test]
    fn test_jp007_missing_id_is_inconsistent() {
        let selection = Selection {
            functions: vec![func("", &["booking"])],
            templates: vec![],
        };
        let intent = parser::parse(b"app: {name: X}").unwrap();
        let mut diags = Diagnostics::default();
        let err = plan(&intent, &selection, &PlanningRules::default(), &mut diags).unwrap_err();
        assert_eq!(err.kind(), "PlanInconsistent");
    }

    #[test]
    fn test_jp007_canonical_yaml_key_order_and_roundtrip() {
        let (p, _) = plan_for(
            "app: {name: X}\nvariables: {ADMIN_CHAT_ID: \"1\"}",
            &Selection::default(),
        );
        let yaml = p.to_canonical_yaml().unwrap();
        let keys: Vec<&str> = yaml
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.starts_with('-') && l.contains(':'))
            .map(|l| l.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(
            keys,
            vec!["app_id", "env", "dependencies", "storage", "net", "health", "meta", "variables"]
        );
        assert_eq!(ProvisionPlan::from_yaml(&yaml).unwrap(), p);
    }

    mod props {
        use super::super::*;
        use crate::core::parser;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn plan_yaml_is_a_function_of_input(
                name in "[A-Za-z][A-Za-z0-9 ]{0,20}",
                integrations in proptest::collection::btree_set("[a-z]{3,8}", 0..5),
            ) {
                prop_assume!(integrations.iter().all(|i| !matches!(i.as_str(), "null" | "true" | "false")));
                let mut doc = format!("app: {{name: \"{}\"}}\nintegrations:\n", name);
                for i in &integrations {
                    doc.push_str(&format!("  {}: true\n", i));
                }
                let intent = parser::parse(doc.as_bytes()).unwrap();
                let rules = PlanningRules::default();
                let a = plan(&intent, &Selection::default(), &rules, &mut Diagnostics::default()).unwrap();
                let b = plan(&intent, &Selection::default(), &rules, &mut Diagnostics::default()).unwrap();
                prop_assert_eq!(a.to_canonical_yaml().unwrap(), b.to_canonical_yaml().unwrap());
                prop_assert!(!a.net.channels.is_empty());
                let externals = a.dependencies.api_layer.iter().filter(|s| s.expose == Expose::External).count();
                prop_assert_eq!(externals, a.dependencies.api_layer.len());
            }
        }
    }
}
