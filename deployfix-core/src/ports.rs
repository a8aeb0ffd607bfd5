//! Port traits abstracting all external effects away from the engine.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// An external tool invocation that did not succeed.
///
/// `status` is the process exit status; `-1` means the process could not be
/// started at all.
#[derive(Debug, Error)]
#[error("{tool} exited with status {status}: {stderr}")]
pub struct ToolError {
    pub tool: String,
    pub status: i32,
    pub stderr: String,
}

/// Link-metadata queries and rewrites, normally backed by `otool` and
/// `install_name_tool`.
pub trait ToolPort {
    /// Raw link references of `binary`, one per dependency, in tool order.
    fn inspect(&self, binary: &Utf8Path) -> Result<Vec<String>, ToolError>;

    /// Rewrite the stored reference `old` to `new` inside `binary`.
    fn rewrite_reference(
        &self,
        binary: &Utf8Path,
        old: &str,
        new: &str,
    ) -> Result<(), ToolError>;

    /// Rewrite the self-identity string of `binary` to `new`.
    fn rewrite_identity(&self, binary: &Utf8Path, new: &str) -> Result<(), ToolError>;
}

/// Bundle filesystem operations.
pub trait BundleFs {
    fn exists(&self, path: &Utf8Path) -> bool;

    fn make_directories(&self, path: &Utf8Path) -> anyhow::Result<()>;

    fn copy_file(&self, src: &Utf8Path, dst: &Utf8Path) -> anyhow::Result<()>;

    /// Mode `755`, so the copy can itself be rewritten later.
    fn set_executable(&self, path: &Utf8Path) -> anyhow::Result<()>;

    /// Every shared module (`*.dylib`) under `root`, in a stable order.
    fn shared_modules(&self, root: &Utf8Path) -> anyhow::Result<Vec<Utf8PathBuf>>;
}
