//! Structured classification of raw link references.
//!
//! `otool -L` reports references verbatim: absolute build-machine paths,
//! `@executable_path`-anchored loader paths, and system libraries all mixed
//! together. Classification decides which of them this tool manages.

use tracing::debug;

/// How a raw link reference relates to the managed Qt tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A Qt framework reference such as
    /// `@executable_path/../Frameworks/QtCore.framework/Versions/5/QtCore`.
    ///
    /// `version` is the digit of the `Versions/<n>/` segment when the
    /// reference carries one.
    Library { name: String, version: Option<u8> },
    /// A Qt plugin module such as
    /// `@executable_path/../PlugIns/platforms/libqcocoa.dylib`.
    Plugin { kind: String, name: String },
    /// Everything else: system libraries and paths this tool does not
    /// manage. Left untouched.
    Unmanaged,
}

const LOADER_PREFIX: &str = "@executable_path";

/// Classify one raw link reference.
///
/// Never fails; input that matches neither shape is `Unmanaged`, which is a
/// common and valid outcome. Library classification takes precedence over
/// plugin classification.
pub fn classify(reference: &str) -> Classification {
    if let Some(library) = classify_library(reference) {
        debug!("{reference} is a library reference: {library:?}");
        return library;
    }
    if let Some(plugin) = classify_plugin(reference) {
        debug!("{reference} is a plugin reference: {plugin:?}");
        return plugin;
    }
    Classification::Unmanaged
}

/// Strips the optional loader prefix. The remainder must be slash-anchored.
fn strip_loader_prefix(reference: &str) -> Option<&str> {
    let rest = reference
        .strip_prefix(LOADER_PREFIX)
        .unwrap_or(reference);
    rest.starts_with('/').then_some(rest)
}

/// `[@executable_path]/<dirs>/<Name>.framework/[Versions/<d>/]<Name>`, with
/// at least one directory segment in front of the framework directory and
/// the trailing component repeating the framework name exactly.
fn classify_library(reference: &str) -> Option<Classification> {
    let rest = strip_loader_prefix(reference)?;
    let segs: Vec<&str> = rest[1..].split('/').collect();
    let last = *segs.last()?;

    if segs.len() >= 3 && framework_name(segs[segs.len() - 2]) == Some(last) {
        return Some(Classification::Library {
            name: last.to_string(),
            version: None,
        });
    }

    if segs.len() >= 5
        && segs[segs.len() - 3] == "Versions"
        && framework_name(segs[segs.len() - 4]) == Some(last)
    {
        let version = single_digit(segs[segs.len() - 2])?;
        return Some(Classification::Library {
            name: last.to_string(),
            version: Some(version),
        });
    }

    None
}

/// `[@executable_path]/<dirs>/<plugins>/<kind>/<name>.dylib`, with at least
/// one directory segment in front of the plugins directory. `<kind>` may
/// span several segments.
fn classify_plugin(reference: &str) -> Option<Classification> {
    let rest = strip_loader_prefix(reference)?;
    let segs: Vec<&str> = rest[1..].split('/').collect();

    // Several plugins directories can appear in one path; the rightmost one
    // with a parseable tail wins.
    for idx in (1..segs.len()).rev() {
        if !is_plugins_segment(segs[idx]) {
            continue;
        }
        if let Some((kind, name)) = split_plugin_tail(&segs[idx + 1..]) {
            return Some(Classification::Plugin { kind, name });
        }
    }
    None
}

/// Extracts `Name` from a `<Name>.framework` segment. `Name` is `Qt`
/// followed by ASCII letters; the byte in front of `framework` is not
/// constrained.
fn framework_name(seg: &str) -> Option<&str> {
    let name = seg.strip_suffix("framework")?;
    let mut chars = name.chars();
    chars.next_back()?;
    let name = chars.as_str();
    let tail = name.strip_prefix("Qt")?;
    tail.chars()
        .all(|c| c.is_ascii_alphabetic())
        .then_some(name)
}

/// Qt installs spell the plugins directory with varying case on the `p`
/// and the `i`.
fn is_plugins_segment(seg: &str) -> bool {
    let b = seg.as_bytes();
    b.len() == 7
        && (b[0] == b'p' || b[0] == b'P')
        && &b[1..4] == b"lug"
        && (b[4] == b'i' || b[4] == b'I')
        && &b[5..7] == b"ns"
}

/// Splits the part after the plugins directory into `(kind, name)`, where
/// the tail reads `<kind>/<name><sep>dylib` and both captures are non-empty.
fn split_plugin_tail(tail: &[&str]) -> Option<(String, String)> {
    let joined = tail.join("/");
    let stem = joined.strip_suffix("dylib")?;
    let mut chars = stem.chars();
    chars.next_back()?;
    let stem = chars.as_str();
    let (kind, name) = stem.rsplit_once('/')?;
    if kind.is_empty() || name.is_empty() {
        return None;
    }
    Some((kind.to_string(), name.to_string()))
}

fn single_digit(seg: &str) -> Option<u8> {
    let mut chars = seg.chars();
    let c = chars.next()?;
    if chars.next().is_some() || !c.is_ascii_digit() {
        return None;
    }
    Some(c as u8 - b'0')
}
