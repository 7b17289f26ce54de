//! Core indexing engine for a package-manager search subsystem.
//!
//! Ingests package manifests (as `(token, action_type, attr_subtype,
//! attr_value, positions)` tuples, supplied by an external
//! [`manifest_source::ManifestSource`]) and maintains an on-disk inverted
//! index: a sorted main dictionary plus a handful of auxiliary dictionaries
//! and faceted side indices, kept mutually consistent through a
//! versioned directory migration.
//!
//! Three update paths converge on [`updater::IndexUpdater`]:
//! - [`updater::IndexUpdater::rebuild`] — full rebuild from a set of PFMRIs,
//! - [`updater::IndexUpdater::server_update_index`] — incremental add,
//! - [`updater::IndexUpdater::client_update_index`] — deferred client-side
//!   fast path, amortizing per-install cost until a threshold is crossed.
//!
//! The package-manifest parser, query engine, CLI, and version comparator
//! are external collaborators; this crate only defines the trait seams
//! ([`manifest_source`], [`pfmri::VersionOrd`]) they plug into.

pub mod aux;
pub mod byte_store;
pub mod config;
pub mod main_dict;
pub mod manifest_source;
pub mod pfmri;
pub mod side_index;
pub mod sort;
pub mod updater;

mod error;

pub use config::IndexerConfig;
pub use error::{IndexError, Result};
pub use pfmri::{LexicalVersionOrd, Pfmri, VersionOrd};
pub use updater::IndexUpdater;
