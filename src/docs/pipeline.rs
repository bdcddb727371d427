//! End-to-end resolution run
//!
//! Loads reflection data, indexes comments files, resolves every member
//! fragment that mentions `<inheritdoc/>`, and streams the merged document
//! to the output path one member at a time. Members without a directive
//! are copied through byte-for-byte; members whose resolution fails with a
//! per-member error are logged and copied through unresolved so the output
//! is always a complete document.

use std::path::{Path, PathBuf};
use std::time::Instant;

use quick_xml::escape::escape;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::comments_cache::CommentsCache;
use super::error::{PipelineError, ResolutionError};
use super::merge;
use super::reflection_index::ReflectionIndex;
use super::resolver::ResolveEngine;

/// Outcome counters for one run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    /// Members written to the output
    pub members: usize,
    /// Members whose fragments went through inheritance resolution
    pub resolved: usize,
    /// Members copied through untouched
    pub passthrough: usize,
    /// Members left unresolved after a per-member failure
    pub warnings: usize,
}

/// Resolve all inherited documentation and write the merged document.
pub async fn run(
    reflection: &[PathBuf],
    comments: &[PathBuf],
    output: &Path,
    cache_capacity: Option<usize>,
) -> Result<RunSummary, PipelineError> {
    let started = Instant::now();

    let reflection_files = expand_inputs(reflection, "reflection").await?;
    let comments_files = expand_inputs(comments, "comments").await?;
    log::info!(
        "resolving inherited documentation: {} reflection file(s), {} comments file(s)",
        reflection_files.len(),
        comments_files.len()
    );

    let index = ReflectionIndex::load(&reflection_files).await?;
    let mut cache = CommentsCache::open(&comments_files, cache_capacity).await?;
    let ids: Vec<String> = cache.member_ids().to_vec();

    let mut engine = ResolveEngine::new(&index, &mut cache);
    let mut writer = MergedDocWriter::create(output).await?;
    let mut summary = RunSummary::default();

    for id in &ids {
        let raw = match engine.raw_fragment(id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(ResolutionError::Comments(err)) => return Err(err.into()),
            Err(err) => {
                log::warn!("skipping '{id}': {err}");
                summary.warnings += 1;
                continue;
            }
        };

        if !merge::mentions_inheritdoc(&raw) {
            writer.write_member(id, &raw).await?;
            summary.members += 1;
            summary.passthrough += 1;
            continue;
        }

        match engine.resolve(id).await {
            Ok(resolved) => {
                writer.write_member(id, &resolved).await?;
                summary.members += 1;
                summary.resolved += 1;
            }
            Err(ResolutionError::Comments(err)) => return Err(err.into()),
            Err(err) => {
                log::warn!("{err}; leaving '{id}' unresolved");
                writer.write_member(id, &raw).await?;
                summary.members += 1;
                summary.warnings += 1;
            }
        }
    }

    drop(engine);
    writer.finish().await?;

    let stats = cache.stats();
    log::info!(
        "wrote {} member(s) to {:?} in {:.2?}: {} resolved, {} passthrough, {} warning(s)",
        summary.members,
        output,
        started.elapsed(),
        summary.resolved,
        summary.passthrough,
        summary.warnings
    );
    log::debug!(
        "comments cache: {} load(s), {} eviction(s), {} lookup(s)",
        stats.loads,
        stats.evictions,
        stats.lookups
    );
    Ok(summary)
}

/// Expand command-line inputs: files are taken as-is, directories
/// contribute their `.xml` files in name order.
async fn expand_inputs(
    paths: &[PathBuf],
    role: &'static str,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for path in paths {
        let meta = fs::metadata(path)
            .await
            .map_err(|source| PipelineError::InputNotFound {
                path: path.clone(),
                source,
            })?;
        if meta.is_dir() {
            let mut entries =
                fs::read_dir(path)
                    .await
                    .map_err(|source| PipelineError::InputNotFound {
                        path: path.clone(),
                        source,
                    })?;
            let mut found = Vec::new();
            while let Some(entry) =
                entries
                    .next_entry()
                    .await
                    .map_err(|source| PipelineError::InputNotFound {
                        path: path.clone(),
                        source,
                    })?
            {
                let entry_path = entry.path();
                let is_xml = entry_path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
                if is_xml {
                    found.push(entry_path);
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        return Err(PipelineError::NoInputFiles { role });
    }
    Ok(files)
}

/// Streaming writer for the merged comments document. Fragments land in
/// the file as soon as they resolve; nothing accumulates in memory.
struct MergedDocWriter {
    path: PathBuf,
    inner: BufWriter<File>,
}

impl MergedDocWriter {
    async fn create(path: &Path) -> Result<Self, PipelineError> {
        let file = File::create(path)
            .await
            .map_err(|source| PipelineError::Output {
                path: path.to_path_buf(),
                source,
            })?;
        let mut writer = Self {
            path: path.to_path_buf(),
            inner: BufWriter::new(file),
        };
        writer
            .write_all("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<doc>\n  <members>\n")
            .await?;
        Ok(writer)
    }

    async fn write_member(&mut self, id: &str, fragment: &str) -> Result<(), PipelineError> {
        let id = escape(id);
        if fragment.is_empty() {
            self.write_all(&format!("    <member name=\"{id}\" />\n")).await
        } else {
            self.write_all(&format!("    <member name=\"{id}\">{fragment}</member>\n"))
                .await
        }
    }

    async fn finish(mut self) -> Result<(), PipelineError> {
        self.write_all("  </members>\n</doc>\n").await?;
        let path = self.path.clone();
        self.inner
            .flush()
            .await
            .map_err(|source| PipelineError::Output { path, source })
    }

    async fn write_all(&mut self, text: &str) -> Result<(), PipelineError> {
        self.inner
            .write_all(text.as_bytes())
            .await
            .map_err(|source| PipelineError::Output {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
