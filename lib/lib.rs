//! obs-fs shared library: the node tree, its FUSE glue and the OBS layout.

/// The OBS directory layout and its remote source.
pub mod catalog;
/// Filesystem abstractions and the cached node tree.
pub mod fs;
