//! Consumed interfaces: the external collaborators this crate calls into
//! but does not implement (spec.md §1, §6). Kept as traits so tests can
//! supply fakes without touching a real package image.

use crate::error::Result;
use crate::main_dict::{Position, Token};
use crate::pfmri::Pfmri;
use std::collections::HashMap;
use std::path::PathBuf;

/// `(token, action_type, attr_subtype, attr_value)` — the key a manifest's
/// search dict groups position lists under (spec.md §6).
pub type SearchKey = (Token, Vec<u8>, Vec<u8>, Vec<u8>);

/// The package-manifest parser. One call to `search_dict` per added PFMRI
/// (spec.md §4.6 step 3c).
pub trait ManifestSource {
    /// Filesystem location of `pfmri`'s manifest.
    fn manifest_path(&self, pfmri: &Pfmri) -> PathBuf;

    /// The raw manifest contents. Not consumed by the core ingestion path;
    /// exposed because `spec.md` §6 names it as part of the interface.
    fn manifest(&self, pfmri: &Pfmri) -> Result<Vec<u8>>;

    /// Tokenized occurrences for `pfmri`, keyed by
    /// `(token, action_type, attr_subtype, attr_value)`.
    fn search_dict(&self, pfmri: &Pfmri, excludes: &[String]) -> Result<HashMap<SearchKey, Vec<Position>>>;
}

/// Progress reporting, entirely optional (spec.md §6: "may be absent").
pub trait ProgressSink {
    fn set_goal(&mut self, name: &str, count: usize);
    fn add_progress(&mut self);
    fn done(&mut self);
    fn optimize(&mut self);
}

/// Invoked when the client-side fast path crosses
/// `IndexerConfig::max_added_number_packages` (spec.md §4.7): the caller is
/// asked to perform a full rebuild instead of the engine doing so itself.
pub trait RebuildRequest {
    fn rebuild_search_index(&mut self, progress: Option<&mut dyn ProgressSink>) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    #[derive(Default)]
    pub struct FakeManifestSource {
        pub entries: HashMap<String, HashMap<SearchKey, Vec<Position>>>,
    }

    impl FakeManifestSource {
        pub fn with(mut self, pfmri: &str, dict: HashMap<SearchKey, Vec<Position>>) -> Self {
            self.entries.insert(pfmri.to_string(), dict);
            self
        }
    }

    impl ManifestSource for FakeManifestSource {
        fn manifest_path(&self, pfmri: &Pfmri) -> PathBuf {
            PathBuf::from(format!("/manifests/{}", pfmri.full()))
        }

        fn manifest(&self, _pfmri: &Pfmri) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn search_dict(&self, pfmri: &Pfmri, _excludes: &[String]) -> Result<HashMap<SearchKey, Vec<Position>>> {
            Ok(self.entries.get(&pfmri.full()).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    pub struct RecordingProgress {
        pub goal: Option<(String, usize)>,
        pub progress_calls: usize,
        pub done_calls: usize,
        pub optimize_calls: usize,
    }

    impl ProgressSink for RecordingProgress {
        fn set_goal(&mut self, name: &str, count: usize) {
            self.goal = Some((name.to_string(), count));
        }

        fn add_progress(&mut self) {
            self.progress_calls += 1;
        }

        fn done(&mut self) {
            self.done_calls += 1;
        }

        fn optimize(&mut self) {
            self.optimize_calls += 1;
        }
    }

    #[derive(Default)]
    pub struct RecordingRebuildRequest {
        pub calls: usize,
    }

    impl RebuildRequest for RecordingRebuildRequest {
        fn rebuild_search_index(&mut self, _progress: Option<&mut dyn ProgressSink>) -> Result<()> {
            self.calls += 1;
            Ok(())
        }
    }
}
