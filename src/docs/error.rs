//! Error types for the inherited-documentation pipeline
//!
//! The taxonomy follows the run policy: I/O failures and malformed XML in an
//! input file are fatal and abort the run, while per-member resolution
//! failures (cycles, exhausted chains) are warnings the driver logs before
//! moving on to the next member.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors while loading reflection data files.
#[derive(Error, Debug)]
pub enum ReflectionLoadError {
    /// Reflection file missing or unreadable
    #[error("failed to read reflection file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reflection file is not well-formed XML
    #[error("malformed XML in reflection file {path:?}: {source}")]
    MalformedXml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },
}

/// Fatal errors while loading or re-loading comments files.
#[derive(Error, Debug)]
pub enum CommentsError {
    /// Comments file missing or unreadable
    #[error("failed to read comments file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Comments file is not well-formed XML
    #[error("malformed XML in comments file {path:?}: {source}")]
    MalformedXml {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },
}

/// Per-member resolution failures. `Comments` is the exception: it wraps a
/// fatal cache failure surfacing mid-resolution and must abort the run.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The inheritance chain revisited a member, usually via hand-authored
    /// cref attributes pointing at each other
    #[error("cyclic inheritance chain: {}", chain.join(" -> "))]
    CyclicInheritance { chain: Vec<String> },

    /// The chain was exhausted without finding any documented ancestor
    #[error("no documentation source found for '{member}'")]
    NoSourceFound { member: String },

    /// A member's own fragment could not be re-parsed during merging
    #[error("malformed documentation fragment for '{member}': {source}")]
    MalformedFragment {
        member: String,
        #[source]
        source: quick_xml::Error,
    },

    /// A comments file failed to load while walking the chain (fatal)
    #[error(transparent)]
    Comments(#[from] CommentsError),
}

impl ResolutionError {
    /// Whether the driver must abort the whole run instead of logging a
    /// warning and leaving the member unresolved.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolutionError::Comments(_))
    }
}

/// Top-level error for one pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An input path given on the command line does not exist
    #[error("input path not found: {path:?}: {source}")]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input expansion produced no files at all
    #[error("no {role} files to process")]
    NoInputFiles { role: &'static str },

    #[error(transparent)]
    Reflection(#[from] ReflectionLoadError),

    #[error(transparent)]
    Comments(#[from] CommentsError),

    /// Writing the merged output document failed
    #[error("failed to write merged output {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
