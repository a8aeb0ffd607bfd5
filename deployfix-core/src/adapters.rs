//! Default shell and filesystem port implementations.

use std::os::unix::fs::PermissionsExt;
use std::process::Command;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use tracing::debug;
use walkdir::WalkDir;

use crate::ports::{BundleFs, ToolError, ToolPort};

/// Runs `otool` and `install_name_tool` as child processes.
#[derive(Debug, Clone, Default)]
pub struct ShellToolPort;

impl ShellToolPort {
    fn run(&self, tool: &str, args: &[&str]) -> Result<String, ToolError> {
        debug!("running {tool} {}", args.join(" "));
        let output = Command::new(tool)
            .args(args)
            .output()
            .map_err(|err| ToolError {
                tool: tool.to_string(),
                status: -1,
                stderr: err.to_string(),
            })?;
        debug!("{tool} finished with {}", output.status);
        if !output.status.success() {
            return Err(ToolError {
                tool: tool.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ToolPort for ShellToolPort {
    fn inspect(&self, binary: &Utf8Path) -> Result<Vec<String>, ToolError> {
        let stdout = self.run("otool", &["-L", binary.as_str()])?;
        // The first line names the inspected file; every entry after it reads
        // "\t<reference> (compatibility version ...)".
        Ok(stdout
            .lines()
            .skip(1)
            .map(|line| {
                line.trim()
                    .split(' ')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect())
    }

    fn rewrite_reference(
        &self,
        binary: &Utf8Path,
        old: &str,
        new: &str,
    ) -> Result<(), ToolError> {
        self.run("install_name_tool", &["-change", old, new, binary.as_str()])?;
        Ok(())
    }

    fn rewrite_identity(&self, binary: &Utf8Path, new: &str) -> Result<(), ToolError> {
        self.run("install_name_tool", &["-id", new, binary.as_str()])?;
        Ok(())
    }
}

/// Filesystem-backed [`BundleFs`].
#[derive(Debug, Clone, Default)]
pub struct FsBundleFs;

impl BundleFs for FsBundleFs {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }

    fn make_directories(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create {path}"))
    }

    fn copy_file(&self, src: &Utf8Path, dst: &Utf8Path) -> anyhow::Result<()> {
        fs::copy(src, dst).with_context(|| format!("copy {src} to {dst}"))?;
        Ok(())
    }

    fn set_executable(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("set permissions on {path}"))
    }

    fn shared_modules(&self, root: &Utf8Path) -> anyhow::Result<Vec<Utf8PathBuf>> {
        let mut modules = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walk {root}"))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = Utf8PathBuf::from_path_buf(entry.into_path())
                .map_err(|p| anyhow::anyhow!("non-UTF-8 path in bundle: {}", p.display()))?;
            if path.extension() == Some("dylib") {
                modules.push(path);
            }
        }
        Ok(modules)
    }
}
