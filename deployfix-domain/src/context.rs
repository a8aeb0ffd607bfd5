//! Bundle geometry: where the executable lives and where each managed
//! dependency belongs.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::classify::Classification;

/// Framework major version assumed when a reference carries no
/// `Versions/<n>/` segment.
pub const DEFAULT_QT_MAJOR_VERSION: u8 = 5;

/// Immutable description of the bundle being repaired, derived once per run.
#[derive(Debug, Clone)]
pub struct BundleContext {
    exe_path: Utf8PathBuf,
    contents_dir: Utf8PathBuf,
    bundle_root: Utf8PathBuf,
    qt_root: Utf8PathBuf,
}

/// The canonical identity of one managed dependency inside one bundle.
///
/// Derived deterministically from a classification; two references that
/// classify the same normalize to the same target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTarget {
    /// Component name, e.g. `QtCore` or `libqcocoa`.
    pub name: String,
    /// Where the component must exist inside the bundle.
    pub abs_path: Utf8PathBuf,
    /// The same location as a loader-relative reference.
    pub loader_path: String,
}

impl BundleContext {
    /// `exe_path` is the main executable, `<bundle>/Contents/MacOS/<app>`;
    /// the bundle root sits three segments above it.
    pub fn new(exe_path: Utf8PathBuf, qt_root: Utf8PathBuf) -> anyhow::Result<Self> {
        let contents_dir = exe_path
            .parent()
            .and_then(Utf8Path::parent)
            .map(Utf8Path::to_path_buf)
            .with_context(|| format!("executable path {exe_path} is too shallow for a bundle"))?;
        let bundle_root = contents_dir
            .parent()
            .map(Utf8Path::to_path_buf)
            .with_context(|| format!("executable path {exe_path} is too shallow for a bundle"))?;
        Ok(Self {
            exe_path,
            contents_dir,
            bundle_root,
            qt_root,
        })
    }

    pub fn exe_path(&self) -> &Utf8Path {
        &self.exe_path
    }

    pub fn bundle_root(&self) -> &Utf8Path {
        &self.bundle_root
    }

    pub fn qt_root(&self) -> &Utf8Path {
        &self.qt_root
    }

    /// Canonical in-bundle location for a managed reference.
    ///
    /// Callers filter `Unmanaged` out before normalizing; reaching it here
    /// is a logic defect, not an environmental condition.
    pub fn normalize(&self, classification: &Classification) -> NormalizedTarget {
        let target = match classification {
            Classification::Library { name, version } => {
                let version = version.unwrap_or(DEFAULT_QT_MAJOR_VERSION);
                let suffix = format!("Frameworks/{name}.framework/Versions/{version}/{name}");
                self.target(name, &suffix)
            }
            Classification::Plugin { kind, name } => {
                let suffix = format!("PlugIns/{kind}/{name}.dylib");
                self.target(name, &suffix)
            }
            Classification::Unmanaged => {
                unreachable!("unmanaged references are never normalized")
            }
        };
        debug!("{} normalizes to {}", target.name, target.abs_path);
        target
    }

    /// Where a missing component is copied from inside the Qt tree.
    pub fn source_path(&self, name: &str) -> Utf8PathBuf {
        self.qt_root
            .join("lib")
            .join(format!("{name}.framework"))
            .join(name)
    }

    fn target(&self, name: &str, suffix: &str) -> NormalizedTarget {
        NormalizedTarget {
            name: name.to_string(),
            abs_path: self.contents_dir.join(suffix),
            loader_path: format!("@executable_path/../{suffix}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use pretty_assertions::assert_eq;

    fn ctx() -> BundleContext {
        BundleContext::new("/App.app/Contents/MacOS/App".into(), "/opt/qt".into())
            .expect("bundle context")
    }

    #[test]
    fn bundle_root_sits_three_segments_above_the_executable() {
        let ctx = ctx();
        assert_eq!(ctx.bundle_root(), "/App.app");
    }

    #[test]
    fn too_shallow_executable_path_is_rejected() {
        let err = BundleContext::new("App".into(), "/opt/qt".into()).unwrap_err();
        assert!(err.to_string().contains("too shallow"));
    }

    #[test]
    fn library_normalizes_into_the_frameworks_tree() {
        let target = ctx().normalize(&Classification::Library {
            name: "QtCore".to_string(),
            version: Some(5),
        });
        assert_eq!(target.name, "QtCore");
        assert_eq!(
            target.abs_path,
            "/App.app/Contents/Frameworks/QtCore.framework/Versions/5/QtCore"
        );
        assert_eq!(
            target.loader_path,
            "@executable_path/../Frameworks/QtCore.framework/Versions/5/QtCore"
        );
    }

    #[test]
    fn unversioned_library_falls_back_to_the_default_major_version() {
        let target = ctx().normalize(&Classification::Library {
            name: "QtGui".to_string(),
            version: None,
        });
        assert_eq!(
            target.abs_path,
            "/App.app/Contents/Frameworks/QtGui.framework/Versions/5/QtGui"
        );
    }

    #[test]
    fn captured_version_is_preserved() {
        let target = ctx().normalize(&Classification::Library {
            name: "QtGui".to_string(),
            version: Some(6),
        });
        assert_eq!(
            target.loader_path,
            "@executable_path/../Frameworks/QtGui.framework/Versions/6/QtGui"
        );
    }

    #[test]
    fn plugin_normalizes_into_the_plugins_tree() {
        let target = ctx().normalize(&Classification::Plugin {
            kind: "platforms".to_string(),
            name: "libqcocoa".to_string(),
        });
        assert_eq!(target.name, "libqcocoa");
        assert_eq!(
            target.abs_path,
            "/App.app/Contents/PlugIns/platforms/libqcocoa.dylib"
        );
        assert_eq!(
            target.loader_path,
            "@executable_path/../PlugIns/platforms/libqcocoa.dylib"
        );
    }

    #[test]
    fn normalization_is_idempotent_through_classification() {
        let ctx = ctx();
        for classification in [
            Classification::Library {
                name: "QtCore".to_string(),
                version: Some(5),
            },
            Classification::Library {
                name: "QtWidgets".to_string(),
                version: None,
            },
            Classification::Plugin {
                kind: "platforms".to_string(),
                name: "libqcocoa".to_string(),
            },
        ] {
            let target = ctx.normalize(&classification);
            let reclassified = classify(&target.loader_path);
            assert_eq!(ctx.normalize(&reclassified), target);
        }
    }

    #[test]
    fn source_path_points_into_the_qt_lib_tree() {
        assert_eq!(
            ctx().source_path("QtCore"),
            "/opt/qt/lib/QtCore.framework/QtCore"
        );
    }
}
