//! Platform Build Fan-out and Artifact Merger
//!
//! # Flow
//!
//! ```text
//! BUILD_TARGETS ──► build_platform() per target (parallel, isolated)
//!                     ├─ merge-reserved ─► RawBinary ──► MergeInputs
//!                     └─ other ─────────► PackagedBundle ──► release assets
//!
//! (all builds complete) ──► MergeInputs::take_pair() ──► fuse() ──► package ──► upload
//! ```

pub mod artifact;
pub mod builder;
pub mod fanout;
pub mod merge;
pub mod package;
pub mod targets;

pub use artifact::{Artifact, ArtifactRecord, MergeInputs};
pub use builder::{CommandBuilder, PlatformBuilder};
pub use fanout::{FanoutOutput, build_platform};
pub use merge::{LipoMerger, Merger, fuse};
pub use package::Packager;
pub use targets::{ArchiveFormat, BUILD_TARGETS, BuildTarget, MERGED_PLATFORM, artifact_file_name};
