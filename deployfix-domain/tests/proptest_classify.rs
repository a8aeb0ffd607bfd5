//! Property-based tests for reference classification.
//!
//! These tests verify that:
//! - Well-formed framework and plugin references always classify
//! - Classification survives a normalize/re-classify round trip
//! - Arbitrary input never panics the classifier

use deployfix_domain::{BundleContext, Classification, classify};
use proptest::prelude::*;

fn arb_qt_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("Qt[a-zA-Z]{0,12}").unwrap()
}

fn arb_plugin_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,14}").unwrap()
}

fn arb_dirs() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_.-]{1,10}(/[a-zA-Z0-9_.-]{1,10}){0,3}").unwrap()
}

fn arb_prefix() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just("@executable_path")]
}

fn ctx() -> BundleContext {
    BundleContext::new("/App.app/Contents/MacOS/App".into(), "/opt/qt".into())
        .expect("bundle context")
}

proptest! {
    /// Any reference built in the framework shape classifies as that library.
    #[test]
    fn framework_references_classify(
        prefix in arb_prefix(),
        dirs in arb_dirs(),
        name in arb_qt_name(),
        version in prop::option::of(0u8..=9),
    ) {
        let versions = version
            .map(|v| format!("Versions/{v}/"))
            .unwrap_or_default();
        let reference = format!("{prefix}/{dirs}/{name}.framework/{versions}{name}");

        prop_assert_eq!(
            classify(&reference),
            Classification::Library { name, version }
        );
    }

    /// Any reference built in the plugin shape classifies as that plugin.
    #[test]
    fn plugin_references_classify(
        prefix in arb_prefix(),
        dirs in arb_dirs(),
        kind in arb_plugin_name(),
        name in arb_plugin_name(),
    ) {
        let reference = format!("{prefix}/{dirs}/PlugIns/{kind}/{name}.dylib");

        prop_assert_eq!(
            classify(&reference),
            Classification::Plugin { kind, name }
        );
    }

    /// Classifying the loader path of a normalized target reproduces the
    /// same target.
    #[test]
    fn normalization_round_trips(
        name in arb_qt_name(),
        version in prop::option::of(0u8..=9),
    ) {
        let ctx = ctx();
        let target = ctx.normalize(&Classification::Library { name, version });
        let reclassified = classify(&target.loader_path);
        prop_assert_eq!(ctx.normalize(&reclassified), target);
    }

    /// The classifier accepts anything without panicking.
    #[test]
    fn classification_never_panics(reference in any::<String>()) {
        match classify(&reference) {
            Classification::Library { name, .. } => prop_assert!(!name.is_empty()),
            Classification::Plugin { kind, name } => {
                prop_assert!(!kind.is_empty());
                prop_assert!(!name.is_empty());
            }
            Classification::Unmanaged => {}
        }
    }
}
