//! Inheritance chain resolution
//!
//! Walks a member's inheritance chain through the reflection index (or an
//! explicit `cref` target) until it reaches a fragment without an
//! `<inheritdoc/>` directive, then merges fragments back down the chain
//! with local content shadowing inherited content at every step.
//!
//! The walk is an explicit stack loop rather than recursion: chains can be
//! long, hand-authored `cref` attributes can form cycles, and every frame
//! needs merging on the way back out. Fully resolved fragments are
//! memoized so a base member documented once is never re-resolved for each
//! of its descendants; failures are not memoized, so every affected member
//! gets its own warning with its own chain.

use std::collections::HashMap;

use super::comments_cache::CommentsCache;
use super::error::ResolutionError;
use super::member_id;
use super::merge::{self, FragmentNode, InheritDirective};
use super::reflection_index::ReflectionIndex;

/// One suspended chain step awaiting inherited content.
struct Frame {
    id: String,
    nodes: Vec<FragmentNode>,
    directive: InheritDirective,
}

/// How a chain walk ended.
enum ChainEnd {
    /// A fully resolved fragment to merge back down the chain
    Source(String),
    /// No documented target remained to walk to
    Exhausted,
    /// The walk revisited a member
    Cycle(Vec<String>),
}

pub struct ResolveEngine<'a> {
    index: &'a ReflectionIndex,
    cache: &'a mut CommentsCache,
    /// Member id -> fully resolved fragment
    memo: HashMap<String, String>,
}

impl<'a> ResolveEngine<'a> {
    pub fn new(index: &'a ReflectionIndex, cache: &'a mut CommentsCache) -> Self {
        Self {
            index,
            cache,
            memo: HashMap::new(),
        }
    }

    /// The raw, unresolved fragment for a member, straight from the cache.
    pub async fn raw_fragment(&mut self, id: &str) -> Result<Option<String>, ResolutionError> {
        Ok(self.cache.lookup(id).await?)
    }

    /// Members with a fully resolved fragment so far.
    pub fn resolved_count(&self) -> usize {
        self.memo.len()
    }

    /// Resolve a member's fragment to its final form, with every
    /// `<inheritdoc/>` replaced by inherited content.
    pub async fn resolve(&mut self, id: &str) -> Result<String, ResolutionError> {
        let mut visited: Vec<String> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut current = id.to_string();

        let end = loop {
            if let Some(text) = self.memo.get(&current) {
                break ChainEnd::Source(text.clone());
            }
            if visited.contains(&current) {
                let mut chain = visited.clone();
                chain.push(current.clone());
                break ChainEnd::Cycle(chain);
            }
            visited.push(current.clone());

            let Some(fragment) = self.cache.lookup(&current).await? else {
                // Undocumented intermediate: keep walking the graph
                match self.next_inherited_target(&current) {
                    Some(next) => {
                        current = next;
                        continue;
                    }
                    None => break ChainEnd::Exhausted,
                }
            };

            if !merge::mentions_inheritdoc(&fragment) {
                self.memo.insert(current.clone(), fragment.clone());
                break ChainEnd::Source(fragment);
            }

            let nodes = split_checked(&current, &fragment)?;
            let Some(directive) = find_checked(&current, &nodes)? else {
                // Mentions the tag in text or CDATA only; nothing to do
                self.memo.insert(current.clone(), fragment.clone());
                break ChainEnd::Source(fragment);
            };

            let next = match &directive.cref {
                Some(cref) => self.resolve_cref_target(cref, &current),
                None => self.next_inherited_target(&current),
            };
            match next {
                Some(next) => {
                    stack.push(Frame {
                        id: current.clone(),
                        nodes,
                        directive,
                    });
                    current = next;
                }
                None => break ChainEnd::Exhausted,
            }
        };

        let mut inherited = match end {
            ChainEnd::Source(text) => text,
            ChainEnd::Exhausted => {
                return Err(ResolutionError::NoSourceFound {
                    member: id.to_string(),
                });
            }
            ChainEnd::Cycle(chain) => {
                return Err(ResolutionError::CyclicInheritance { chain });
            }
        };

        while let Some(frame) = stack.pop() {
            let inherited_nodes = split_checked(&frame.id, &inherited)?;
            let merged = merge::apply(&frame.nodes, &inherited_nodes, &frame.directive);
            self.memo.insert(frame.id, merged.clone());
            inherited = merged;
        }
        Ok(inherited)
    }

    /// The next member up the inheritance graph that actually carries
    /// documentation. Undocumented ancestors are skipped so a chain does
    /// not dead-end on a compiler-synthesized intermediate.
    fn next_inherited_target(&self, id: &str) -> Option<String> {
        let candidates = if member_id::is_type(id) {
            self.index.type_inheritance_sources(id)
        } else {
            self.index.inheritance_sources(id)
        };
        candidates
            .into_iter()
            .find(|c| self.memo.contains_key(c) || self.cache.contains(c))
    }

    /// Turn a `cref` attribute value into a member id. Prefixed crefs are
    /// taken as-is; unprefixed ones are tried with each kind prefix,
    /// qualified by the current member's declaring type and namespace.
    fn resolve_cref_target(&self, cref: &str, current: &str) -> Option<String> {
        let bytes = cref.as_bytes();
        if bytes.len() > 2 && bytes[1] == b':' {
            return Some(cref.to_string());
        }

        let mut scopes: Vec<String> = Vec::new();
        if let Some(declaring) = self.index.declaring_type_of(current) {
            // Sibling members first, then the surrounding namespace
            let type_path = member_id::name_part(&declaring).to_string();
            let namespace = type_path.rfind('.').map(|dot| type_path[..dot].to_string());
            scopes.push(type_path);
            scopes.extend(namespace);
        } else if member_id::is_type(current) {
            let path = member_id::name_part(current);
            if let Some(dot) = path.rfind('.') {
                scopes.push(path[..dot].to_string());
            }
        }

        let mut candidates: Vec<String> = Vec::new();
        for scope in &scopes {
            for kind in ['M', 'P', 'E', 'F', 'T'] {
                candidates.push(format!("{kind}:{scope}.{cref}"));
            }
        }
        for kind in ['M', 'P', 'E', 'F', 'T'] {
            candidates.push(format!("{kind}:{cref}"));
        }

        for candidate in candidates {
            if self.cache.contains(&candidate)
                || self.index.contains_member(&candidate)
                || self.index.contains_type(&candidate)
            {
                return Some(candidate);
            }
        }
        log::warn!("cref '{cref}' on '{current}' matches no known member");
        None
    }
}

fn split_checked(member: &str, fragment: &str) -> Result<Vec<FragmentNode>, ResolutionError> {
    merge::split_nodes(fragment).map_err(|source| ResolutionError::MalformedFragment {
        member: member.to_string(),
        source,
    })
}

fn find_checked(
    member: &str,
    nodes: &[FragmentNode],
) -> Result<Option<InheritDirective>, ResolutionError> {
    merge::find_directive(nodes).map_err(|source| ResolutionError::MalformedFragment {
        member: member.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
