//! Recursive closure repair for one application bundle.

use std::collections::BTreeSet;

use anyhow::{Context, bail};
use camino::{Utf8Path, Utf8PathBuf};
use deployfix_domain::{BundleContext, Classification, NormalizedTarget, classify};
use tracing::{debug, info};

use crate::ports::{BundleFs, ToolPort};

/// What to do when the link inspector cannot read a binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InspectPolicy {
    /// Treat the binary as having no dependencies. Historical behavior: a
    /// binary the inspector cannot read contributes nothing to the closure.
    #[default]
    Lenient,
    /// Fail the fix for that binary.
    Strict,
}

/// Walks the dependency graph of a bundle and repairs it in place.
///
/// One fixer instance covers one run; the visited set it carries is what
/// keeps mutually-referencing components from recursing forever.
pub struct BundleFixer<'a> {
    ctx: &'a BundleContext,
    tools: &'a dyn ToolPort,
    fs: &'a dyn BundleFs,
    inspect_policy: InspectPolicy,
    visited: BTreeSet<Utf8PathBuf>,
}

impl<'a> BundleFixer<'a> {
    pub fn new(ctx: &'a BundleContext, tools: &'a dyn ToolPort, fs: &'a dyn BundleFs) -> Self {
        Self {
            ctx,
            tools,
            fs,
            inspect_policy: InspectPolicy::default(),
            visited: BTreeSet::new(),
        }
    }

    pub fn with_inspect_policy(mut self, policy: InspectPolicy) -> Self {
        self.inspect_policy = policy;
        self
    }

    /// Fix the main executable, then every shared module found under the
    /// bundle root.
    ///
    /// The walk re-encounters components already repaired through recursion;
    /// those visits are no-ops.
    pub fn fix_bundle(&mut self) -> anyhow::Result<()> {
        let exe_path = self.ctx.exe_path().to_path_buf();
        info!("fixing main binary: {exe_path}");
        self.fix_binary(&exe_path)
            .with_context(|| format!("fix main binary {exe_path}"))?;

        info!("fixing all plugins");
        let modules = self
            .fs
            .shared_modules(self.ctx.bundle_root())
            .with_context(|| format!("list shared modules under {}", self.ctx.bundle_root()))?;
        for module in modules {
            info!("fixing plugin {}", module.file_name().unwrap_or(module.as_str()));
            self.fix_binary(&module)
                .with_context(|| format!("fix plugin {module}"))?;
        }
        Ok(())
    }

    /// Repair every managed dependency of one binary, depth-first.
    pub fn fix_binary(&mut self, binary: &Utf8Path) -> anyhow::Result<()> {
        if !self.visited.insert(binary.to_path_buf()) {
            debug!("{binary} already visited, treating as satisfied");
            return Ok(());
        }

        for dep in self.list_dependencies(binary)? {
            self.fix_dependency(binary, &dep)
                .with_context(|| format!("fix dependency {dep} of {binary}"))?;
        }
        Ok(())
    }

    /// The binary's raw link references, minus blank entries and entries
    /// naming the binary itself.
    fn list_dependencies(&self, binary: &Utf8Path) -> anyhow::Result<Vec<String>> {
        let raw = match self.tools.inspect(binary) {
            Ok(deps) => deps,
            Err(err) if self.inspect_policy == InspectPolicy::Lenient => {
                debug!("could not inspect {binary}, treating as dependency-free: {err}");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err).with_context(|| format!("inspect {binary}")),
        };

        // Some libraries list themselves (seen with QtWidgets); dropping the
        // entry here keeps the recursion from looping on it.
        let own_name = binary.file_name();
        Ok(raw
            .into_iter()
            .filter(|dep| own_name.is_none_or(|name| !dep.contains(name)))
            .filter(|dep| !dep.is_empty())
            .collect())
    }

    fn fix_dependency(&mut self, binary: &Utf8Path, dep: &str) -> anyhow::Result<()> {
        let classification = classify(dep);
        if matches!(classification, Classification::Unmanaged) {
            return Ok(());
        }
        let target = self.ctx.normalize(&classification);

        if dep != target.loader_path {
            info!("changing reference '{dep}' in binary {binary}");
            self.tools
                .rewrite_reference(binary, dep, &target.loader_path)
                .with_context(|| format!("rewrite reference in {binary}"))?;
            self.tools
                .rewrite_identity(binary, &target.loader_path)
                .with_context(|| format!("rewrite identity of {binary}"))?;
        } else {
            debug!("reference already canonical for {dep} in {binary}");
        }

        self.ensure_present(&target)?;
        self.fix_binary(&target.abs_path)
    }

    /// Copy the component out of the Qt tree when the bundle lacks it.
    fn ensure_present(&self, target: &NormalizedTarget) -> anyhow::Result<()> {
        if self.fs.exists(&target.abs_path) {
            debug!("{} exists at expected location inside bundle", target.name);
            return Ok(());
        }

        let Some(dir) = target.abs_path.parent() else {
            bail!("target {} has no containing directory", target.abs_path);
        };
        info!("ensuring directory '{dir}' exists");
        self.fs
            .make_directories(dir)
            .with_context(|| format!("create {dir}"))?;

        let source = self.ctx.source_path(&target.name);
        info!("copying missing dependency into bundle: {}", target.name);
        self.fs
            .copy_file(&source, &target.abs_path)
            .with_context(|| format!("copy {} into bundle", target.name))?;

        info!("ensuring 755 permissions on {}", target.abs_path);
        self.fs
            .set_executable(&target.abs_path)
            .with_context(|| format!("set permissions on {}", target.abs_path))
    }
}
