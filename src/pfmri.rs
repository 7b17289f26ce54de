//! Package identifiers (PFMRI): `publisher/name@version`.
//!
//! The engine treats a PFMRI as an opaque, comparable string with two
//! derived forms used as keys elsewhere in the index: the *anarchic* form
//! (publisher elided) used as the canonical key in [`crate::aux::full_fmri_set`]
//! and the fast-path sets, and the *stem* (name only) used to lay out the
//! per-package side-index directory `pkg/<stem>/<version>`.

use std::cmp::Ordering;
use std::fmt;

/// A parsed package identifier of the form `publisher/name@version`.
///
/// Ordering between two `Pfmri`s of the same stem is delegated to
/// [`VersionOrd`]; the indexing engine itself never compares versions
/// directly (spec §1: the version comparator is an external collaborator).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pfmri {
    publisher: Option<String>,
    name: String,
    version: String,
}

impl Pfmri {
    /// Parse `publisher/name@version` or the anarchic `name@version`.
    pub fn parse(s: &str) -> Option<Self> {
        let (rest, version) = s.split_once('@')?;
        if rest.is_empty() || version.is_empty() {
            return None;
        }
        let (publisher, name) = match rest.split_once('/') {
            Some((p, n)) if !p.is_empty() && !n.is_empty() => (Some(p.to_string()), n.to_string()),
            Some(_) => return None,
            None => (None, rest.to_string()),
        };
        Some(Self {
            publisher,
            name,
            version: version.to_string(),
        })
    }

    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `name` only — the key used for `pkg/<stem>/<version>` side files.
    pub fn stem(&self) -> &str {
        &self.name
    }

    /// `name@version` with the publisher elided, the canonical form stored
    /// in `FullFmriSet` and the fast-path add/remove sets.
    pub fn anarchic(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Full `publisher/name@version` form, if a publisher was present.
    pub fn full(&self) -> String {
        match &self.publisher {
            Some(p) => format!("{}/{}@{}", p, self.name, self.version),
            None => self.anarchic(),
        }
    }
}

impl fmt::Display for Pfmri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full())
    }
}

/// External, black-box version ordering (spec §1, §6: "package-version
/// comparator ... used as a black-box ordering").
///
/// The engine depends on this trait only where it must decide whether one
/// PFMRI supersedes another of the same stem; core ingestion and merge
/// never need it because they key purely on token bytes.
pub trait VersionOrd {
    fn compare_versions(&self, a: &str, b: &str) -> Ordering;
}

/// A version ordering that falls back to plain string comparison.
///
/// Not a faithful package-version comparator (no epoch/revision semantics);
/// suitable for tests and for callers that supply their own `VersionOrd`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalVersionOrd;

impl VersionOrd for LexicalVersionOrd {
    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_form() {
        let p = Pfmri::parse("pub/a@1.0").unwrap();
        assert_eq!(p.publisher(), Some("pub"));
        assert_eq!(p.name(), "a");
        assert_eq!(p.version(), "1.0");
        assert_eq!(p.anarchic(), "a@1.0");
        assert_eq!(p.stem(), "a");
        assert_eq!(p.full(), "pub/a@1.0");
    }

    #[test]
    fn parse_anarchic_form() {
        let p = Pfmri::parse("a@1.0").unwrap();
        assert_eq!(p.publisher(), None);
        assert_eq!(p.anarchic(), "a@1.0");
        assert_eq!(p.full(), "a@1.0");
    }

    #[test]
    fn rejects_malformed() {
        assert!(Pfmri::parse("no-at-sign").is_none());
        assert!(Pfmri::parse("pub/@1.0").is_none());
        assert!(Pfmri::parse("pub/name@").is_none());
    }
}
