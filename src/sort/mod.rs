//! External-sort pipeline: [`SortSpiller`] on the write side,
//! [`RunMerger`] on the read side (spec.md §4.3-§4.4).

pub mod merger;
pub mod spiller;

pub use merger::RunMerger;
pub use spiller::SortSpiller;
