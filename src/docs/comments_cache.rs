//! Indexed comments cache
//!
//! XML documentation files can be numerous and large, and the resolver
//! revisits them in an unpredictable order while walking inheritance chains.
//! The cache indexes every file once up front (member id -> file), then
//! keeps at most `capacity` parsed documents in memory, evicting the least
//! recently accessed one and transparently re-parsing a file when an
//! evicted id is needed again. Source documents are never mutated, so
//! eviction loses nothing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::errors::IllFormedError;
use quick_xml::events::Event;
use tokio::fs;

use super::error::CommentsError;

/// One parsed XML documentation file: member id -> the raw inner XML of its
/// `<member>` element, byte-for-byte as it appeared in the file.
#[derive(Debug)]
pub struct CommentsDocument {
    path: PathBuf,
    members: HashMap<String, String>,
    order: Vec<String>,
}

impl CommentsDocument {
    /// Parse `<doc><members><member name="...">` content. Fragments are
    /// captured verbatim so untouched members round-trip unchanged.
    pub fn parse(path: &Path, content: &str) -> Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_str(content);
        let mut members: HashMap<String, String> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        // Elements still open; the reader itself does not reject a
        // truncated document at EOF
        let mut open: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) if e.name().as_ref() == b"member" => {
                    let name = name_attr(&e);
                    let span = reader.read_to_end(e.name())?;
                    if let Some(name) = name {
                        let inner = content[span.start as usize..span.end as usize].to_string();
                        if !members.contains_key(&name) {
                            order.push(name.clone());
                        }
                        members.insert(name, inner);
                    }
                }
                Event::Empty(e) if e.name().as_ref() == b"member" => {
                    if let Some(name) = name_attr(&e) {
                        if !members.contains_key(&name) {
                            order.push(name.clone());
                        }
                        members.insert(name, String::new());
                    }
                }
                Event::Start(e) => {
                    open.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Eof => {
                    if let Some(tag) = open.pop() {
                        return Err(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(
                            tag,
                        )));
                    }
                    break;
                }
                _ => {}
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            members,
            order,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw fragment for a member id, if this document has it.
    pub fn fragment(&self, id: &str) -> Option<&str> {
        self.members.get(id).map(String::as_str)
    }

    /// Member ids in document order.
    pub fn member_ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn name_attr(e: &quick_xml::events::BytesStart) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"name" {
            return std::str::from_utf8(&attr.value).ok().map(str::to_string);
        }
    }
    None
}

/// Counters for the cache's load and eviction behavior, exposed so callers
/// (and tests) can observe how much re-parsing a run actually did.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Documents parsed, including re-parses after eviction
    pub loads: u64,
    /// Documents dropped to stay within capacity
    pub evictions: u64,
    /// Fragment lookups served (hit or miss)
    pub lookups: u64,
}

/// LRU-bounded cache over a fixed set of comments files.
#[derive(Debug)]
pub struct CommentsCache {
    files: Vec<PathBuf>,
    /// Member id -> index into `files`; first definition wins
    index: HashMap<String, usize>,
    /// Global enumeration order: file order, then document order
    order: Vec<String>,
    loaded: HashMap<usize, CommentsDocument>,
    /// Least recently accessed first
    recency: Vec<usize>,
    capacity: usize,
    stats: CacheStats,
}

impl CommentsCache {
    /// Index every file and keep up to `capacity` parsed documents
    /// resident. The default capacity is the number of input files, so
    /// nothing is evicted unless a bound is requested.
    pub async fn open(
        paths: &[PathBuf],
        capacity: Option<usize>,
    ) -> Result<Self, CommentsError> {
        let capacity = capacity.unwrap_or(paths.len()).max(1);
        let mut cache = Self {
            files: paths.to_vec(),
            index: HashMap::new(),
            order: Vec::new(),
            loaded: HashMap::new(),
            recency: Vec::new(),
            capacity,
            stats: CacheStats::default(),
        };

        for file_idx in 0..cache.files.len() {
            let doc = read_and_parse(&cache.files[file_idx]).await?;
            cache.stats.loads += 1;
            for id in doc.member_ids() {
                if cache.index.contains_key(id) {
                    log::debug!(
                        "duplicate member '{}' in {:?} ignored (first definition wins)",
                        id,
                        cache.files[file_idx]
                    );
                } else {
                    cache.index.insert(id.clone(), file_idx);
                    cache.order.push(id.clone());
                }
            }
            cache.store(file_idx, doc);
        }

        log::debug!(
            "comments cache indexed {} members across {} file(s), capacity {}",
            cache.order.len(),
            cache.files.len(),
            cache.capacity
        );
        Ok(cache)
    }

    /// Whether any input file documents this member id. Never loads a file.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All known member ids in enumeration order.
    pub fn member_ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The raw fragment for a member id. Absent ids are a normal condition
    /// (compiler-synthesized members and external references have no
    /// comments) and return `Ok(None)`; only a failed re-load is an error.
    pub async fn lookup(&mut self, id: &str) -> Result<Option<String>, CommentsError> {
        self.stats.lookups += 1;
        let Some(&file_idx) = self.index.get(id) else {
            return Ok(None);
        };
        if self.loaded.contains_key(&file_idx) {
            self.touch(file_idx);
        } else {
            let doc = read_and_parse(&self.files[file_idx]).await?;
            self.stats.loads += 1;
            log::debug!("re-loaded evicted comments document {:?}", doc.path());
            self.store(file_idx, doc);
        }
        Ok(self
            .loaded
            .get(&file_idx)
            .and_then(|d| d.fragment(id))
            .map(str::to_string))
    }

    fn store(&mut self, file_idx: usize, doc: CommentsDocument) {
        while self.loaded.len() >= self.capacity && !self.recency.is_empty() {
            let victim = self.recency.remove(0);
            self.loaded.remove(&victim);
            self.stats.evictions += 1;
            log::debug!("evicted comments document {:?}", self.files[victim]);
        }
        self.loaded.insert(file_idx, doc);
        self.touch(file_idx);
    }

    fn touch(&mut self, file_idx: usize) {
        self.recency.retain(|&i| i != file_idx);
        self.recency.push(file_idx);
    }
}

async fn read_and_parse(path: &Path) -> Result<CommentsDocument, CommentsError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| CommentsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    CommentsDocument::parse(path, &content).map_err(|source| CommentsError::MalformedXml {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "comments_cache_tests.rs"]
mod tests;
