//! Reflection data index
//!
//! Parses the reflection XML files produced by the upstream static-analysis
//! tool (`<reflection><apis><api id="...">` records) into an in-memory table
//! of types and members, and answers the inheritance queries the resolver
//! needs: base type, implemented interfaces, and the ancestor member a given
//! member overrides or implements.
//!
//! The index is built once per run and read-only afterwards.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use quick_xml::Reader;
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use tokio::fs;

use super::error::ReflectionLoadError;
use super::member_id;

/// One type from the reflection data: its base type, implemented interfaces,
/// and declared members keyed by signature.
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub id: String,
    /// Base type id, None at the root of a hierarchy
    pub base_type: Option<String>,
    /// Implemented interface ids in declaration order
    pub interfaces: Vec<String>,
    /// Declared members, signature key -> member id
    pub members: HashMap<String, String>,
}

impl TypeNode {
    fn stub(id: String) -> Self {
        Self {
            id,
            base_type: None,
            interfaces: Vec::new(),
            members: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MemberRecord {
    declaring_type: Option<String>,
    /// Interface members this member explicitly implements, from the
    /// reflection data's `<implements>` member refs
    implements: Vec<String>,
}

/// Raw `<api>` record as it appears in a reflection file, before linking.
/// Member apis may precede their declaring type's api, so files are parsed
/// into these first and the index is built in a second phase.
#[derive(Debug, Clone, Default)]
struct RawApi {
    id: String,
    group: String,
    bases: Vec<String>,
    implements: Vec<String>,
    container_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Bases,
    Implements,
    Containers,
}

/// In-memory index over all reflection input files.
#[derive(Debug, Default)]
pub struct ReflectionIndex {
    types: HashMap<String, TypeNode>,
    members: HashMap<String, MemberRecord>,
}

impl ReflectionIndex {
    /// Load and index every reflection file in sequence. Duplicate api ids
    /// across files are expected (segregated output refers to the same
    /// entity) and resolve last-write-wins without logging.
    pub async fn load(paths: &[PathBuf]) -> Result<Self, ReflectionLoadError> {
        let mut apis = Vec::new();
        for path in paths {
            let content =
                fs::read_to_string(path)
                    .await
                    .map_err(|source| ReflectionLoadError::Io {
                        path: path.clone(),
                        source,
                    })?;
            parse_reflection_content(&content, &mut apis).map_err(|source| {
                ReflectionLoadError::MalformedXml {
                    path: path.clone(),
                    source,
                }
            })?;
        }
        let index = Self::build(apis);
        log::debug!(
            "reflection index built: {} types, {} members",
            index.types.len(),
            index.members.len()
        );
        Ok(index)
    }

    /// Build an index from a single file's content. Used by unit tests and
    /// by `load` via the shared parse pass.
    pub fn from_content(content: &str) -> Result<Self, quick_xml::Error> {
        let mut apis = Vec::new();
        parse_reflection_content(content, &mut apis)?;
        Ok(Self::build(apis))
    }

    fn build(apis: Vec<RawApi>) -> Self {
        let mut types: HashMap<String, TypeNode> = HashMap::new();
        let mut members: HashMap<String, MemberRecord> = HashMap::new();

        for api in &apis {
            if api.group != "type" || api.id.is_empty() {
                continue;
            }
            let node = types
                .entry(api.id.clone())
                .or_insert_with(|| TypeNode::stub(api.id.clone()));
            node.base_type = api.bases.first().cloned();
            node.interfaces = api.implements.clone();
        }

        for api in &apis {
            if api.group != "member" || api.id.is_empty() {
                continue;
            }
            let declaring = api
                .container_type
                .clone()
                .or_else(|| member_id::declaring_type_id(&api.id));
            if let (Some(decl), Some(sig)) = (&declaring, member_id::signature_key(&api.id)) {
                types
                    .entry(decl.clone())
                    .or_insert_with(|| TypeNode::stub(decl.clone()))
                    .members
                    .insert(sig, api.id.clone());
            }
            members.insert(
                api.id.clone(),
                MemberRecord {
                    declaring_type: declaring,
                    implements: api.implements.clone(),
                },
            );
        }

        Self { types, members }
    }

    pub fn contains_type(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    pub fn contains_member(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Base type of the given type id, if the reflection data declares one.
    pub fn base_type_of(&self, id: &str) -> Option<&str> {
        self.types.get(id).and_then(|t| t.base_type.as_deref())
    }

    /// Interfaces the given type implements, in declaration order.
    pub fn interfaces_of(&self, id: &str) -> &[String] {
        match self.types.get(id) {
            Some(t) => &t.interfaces,
            None => &[],
        }
    }

    /// Declaring type of a member, from reflection containers data, falling
    /// back to deriving it from the id string.
    pub fn declaring_type_of(&self, member: &str) -> Option<String> {
        self.members
            .get(member)
            .and_then(|m| m.declaring_type.clone())
            .or_else(|| member_id::declaring_type_id(member))
    }

    /// The nearest ancestor member this member overrides or implements, or
    /// None if no ancestor declares a matching signature.
    pub fn member_override_target(&self, member: &str) -> Option<String> {
        self.inheritance_sources(member).into_iter().next()
    }

    /// All ancestor members with a matching signature, in priority order:
    /// explicit `<implements>` refs first, then the base class chain nearest
    /// first, then interfaces breadth-first in declaration order (the
    /// declaring type's own interfaces before those picked up from base
    /// types). The base chain outranking interfaces is the tie-break rule
    /// when both sides declare the same signature.
    pub fn inheritance_sources(&self, member: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        if let Some(rec) = self.members.get(member) {
            out.extend(rec.implements.iter().cloned());
        }

        let sig = member_id::signature_key(member);
        let declaring = self.declaring_type_of(member);
        if let (Some(sig), Some(declaring)) = (sig, declaring) {
            let mut chain: Vec<String> = Vec::new();
            let mut seen: HashSet<String> = HashSet::new();
            seen.insert(declaring.clone());
            let mut cursor = self.base_type_of(&declaring).map(str::to_string);
            while let Some(base) = cursor {
                if !seen.insert(base.clone()) {
                    break;
                }
                cursor = match self.types.get(&base) {
                    Some(node) => {
                        if let Some(m) = node.members.get(&sig) {
                            out.push(m.clone());
                        }
                        node.base_type.clone()
                    }
                    None => None,
                };
                chain.push(base);
            }

            let mut queue: VecDeque<String> = VecDeque::new();
            queue.extend(self.interfaces_of(&declaring).iter().cloned());
            for t in &chain {
                queue.extend(self.interfaces_of(t).iter().cloned());
            }
            let mut seen_ifaces: HashSet<String> = HashSet::new();
            while let Some(iface) = queue.pop_front() {
                if !seen_ifaces.insert(iface.clone()) {
                    continue;
                }
                if let Some(node) = self.types.get(&iface) {
                    if let Some(m) = node.members.get(&sig) {
                        out.push(m.clone());
                    }
                    queue.extend(node.interfaces.iter().cloned());
                    if let Some(b) = &node.base_type {
                        queue.push_back(b.clone());
                    }
                }
            }
        }

        dedup_excluding(out, member)
    }

    /// Ancestor types a type-level `<inheritdoc/>` may draw from: the base
    /// chain nearest first, then the interface closure.
    pub fn type_inheritance_sources(&self, type_id: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(type_id.to_string());

        let mut chain: Vec<String> = Vec::new();
        let mut cursor = self.base_type_of(type_id).map(str::to_string);
        while let Some(base) = cursor {
            if !seen.insert(base.clone()) {
                break;
            }
            out.push(base.clone());
            cursor = self.base_type_of(&base).map(str::to_string);
            chain.push(base);
        }

        let mut queue: VecDeque<String> = VecDeque::new();
        queue.extend(self.interfaces_of(type_id).iter().cloned());
        for t in &chain {
            queue.extend(self.interfaces_of(t).iter().cloned());
        }
        let mut seen_ifaces: HashSet<String> = HashSet::new();
        while let Some(iface) = queue.pop_front() {
            if !seen_ifaces.insert(iface.clone()) {
                continue;
            }
            out.push(iface.clone());
            if let Some(node) = self.types.get(&iface) {
                queue.extend(node.interfaces.iter().cloned());
                if let Some(b) = &node.base_type {
                    queue.push_back(b.clone());
                }
            }
        }

        dedup_excluding(out, type_id)
    }
}

fn dedup_excluding(list: Vec<String>, skip: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    list.into_iter()
        .filter(|c| c != skip && seen.insert(c.clone()))
        .collect()
}

fn parse_reflection_content(
    content: &str,
    apis: &mut Vec<RawApi>,
) -> Result<(), quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    let mut current: Option<RawApi> = None;
    let mut section = Section::None;
    let mut section_depth = 0usize;
    // Open-element stack; its length is the current depth, and anything
    // left on it at EOF means the document was truncated
    let mut open: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                open.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                open_element(
                    &e,
                    open.len(),
                    false,
                    &mut current,
                    &mut section,
                    &mut section_depth,
                    apis,
                );
            }
            Event::Empty(e) => {
                open_element(
                    &e,
                    open.len() + 1,
                    true,
                    &mut current,
                    &mut section,
                    &mut section_depth,
                    apis,
                );
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"api" => {
                        if let Some(api) = current.take() {
                            if !api.id.is_empty() {
                                apis.push(api);
                            }
                        }
                        section = Section::None;
                    }
                    b"bases" | b"implements" | b"containers" => {
                        if open.len() == section_depth {
                            section = Section::None;
                        }
                    }
                    _ => {}
                }
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
    Ok(())
}

fn open_element(
    e: &BytesStart,
    elem_depth: usize,
    is_empty: bool,
    current: &mut Option<RawApi>,
    section: &mut Section,
    section_depth: &mut usize,
    apis: &mut Vec<RawApi>,
) {
    match e.name().as_ref() {
        b"api" => {
            let mut api = RawApi::default();
            if let Some(id) = attr_value(e, b"id") {
                api.id = id;
            }
            if is_empty {
                // Degenerate but well-formed; record the id with no data
                if !api.id.is_empty() {
                    apis.push(api);
                }
            } else {
                *current = Some(api);
                *section = Section::None;
            }
        }
        b"apidata" => {
            if let (Some(api), Some(group)) = (current.as_mut(), attr_value(e, b"group")) {
                api.group = group;
            }
        }
        b"bases" if !is_empty => {
            *section = Section::Bases;
            *section_depth = elem_depth;
        }
        b"implements" if !is_empty => {
            *section = Section::Implements;
            *section_depth = elem_depth;
        }
        b"containers" if !is_empty => {
            *section = Section::Containers;
            *section_depth = elem_depth;
        }
        name @ (b"type" | b"member") => {
            if *section == Section::None {
                return;
            }
            // Only direct children of the section element are references to
            // record; deeper <type> elements are generic specializations
            if elem_depth != *section_depth + 1 {
                return;
            }
            let Some(api) = current.as_mut() else { return };
            let Some(target) = attr_value(e, b"api") else {
                return;
            };
            match *section {
                Section::Bases => api.bases.push(target),
                Section::Implements => api.implements.push(target),
                Section::Containers => {
                    if name == b"type" {
                        api.container_type = Some(target);
                    }
                }
                Section::None => {}
            }
        }
        _ => {}
    }
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return std::str::from_utf8(&attr.value).ok().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
#[path = "reflection_index_tests.rs"]
mod tests;
