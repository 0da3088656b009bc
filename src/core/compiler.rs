//! JP-013: Compiler façade: intent file to deployment directory.
//!
//! parse → catalog → select → plan → materialize → fingerprint.
//! Any stage error aborts the compile; nothing is rolled back.

use super::catalog::Catalog;
use super::config::CompilerConfig;
use super::diagnostics::{Diagnostic, Diagnostics};
use super::error::{CompileError, Result};
use super::types::{Intent, ProvisionPlan, Selection};
use super::{parser, planner, selector};
use crate::materialize::{self, Materializer};
use crate::tripwire::hasher;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of a successful compile.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub deployment: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
    /// BLAKE3 fingerprint of the written directory
    pub fingerprint: String,
}

/// Everything up to (not including) materialization.
#[derive(Debug, Clone)]
pub struct Planned {
    pub intent: Intent,
    pub selection: Selection,
    pub plan: ProvisionPlan,
    pub diagnostics: Diagnostics,
}

/// The compile pipeline bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Load the configured catalog files.
    pub fn load_catalog(&self) -> (Catalog, Diagnostics) {
        Catalog::load(&self.config.catalog.functions, &self.config.catalog.templates)
    }

    /// Parse, select and plan from intent bytes. No filesystem writes.
    pub fn plan_bytes(&self, bytes: &[u8]) -> Result<Planned> {
        let intent = parser::parse(bytes)?;
        info!(app_id = %intent.identity.slug, flavor = %intent.flavor, "intent parsed");

        let (catalog, mut diagnostics) = self.load_catalog();
        let selection = selector::select(
            &intent,
            &catalog,
            &self.config.selection,
            &mut diagnostics,
        );
        info!(
            functions = selection.functions.len(),
            templates = selection.templates.len(),
            "catalog entries selected"
        );

        let plan = planner::plan(&intent, &selection, &self.config.planning, &mut diagnostics)?;
        materialize::check_variables(&plan, &mut diagnostics);
        info!(app_id = %plan.app_id, env = %plan.env, "plan ready");

        Ok(Planned {
            intent,
            selection,
            plan,
            diagnostics,
        })
    }

    /// Read an intent file and plan it.
    pub fn plan_file(&self, intent_path: &Path) -> Result<Planned> {
        let bytes = std::fs::read(intent_path).map_err(|source| CompileError::IntentUnreadable {
            path: intent_path.to_path_buf(),
            source,
        })?;
        info!(path = %intent_path.display(), bytes = bytes.len(), "intent read");
        self.plan_bytes(&bytes)
    }

    /// Full compile into `deployments_root/<app_id>/`.
    pub fn compile(&self, intent_path: &Path, deployments_root: &Path) -> Result<Compilation> {
        let planned = self.plan_file(intent_path)?;
        let deployment =
            Materializer::from_config(&self.config).materialize(&planned.plan, deployments_root)?;
        let fingerprint = hasher::hash_directory(&deployment)
            .map_err(|e| CompileError::write_failed(&deployment, e))?;
        info!(
            path = %deployment.display(),
            fingerprint = %fingerprint,
            warnings = planned.diagnostics.warnings(),
            "compile complete"
        );
        Ok(Compilation {
            deployment,
            diagnostics: planned.diagnostics.into_vec(),
            fingerprint,
        })
    }
}

/// Compile with the default configuration; returns the deployment path.
pub fn compile(intent_path: &Path, deployments_root: &Path) -> Result<PathBuf> {
    Compiler::default()
        .compile(intent_path, deployments_root)
        .map(|c| c.deployment)
}
