//! Fragment merging for inherited documentation
//!
//! A member's raw XML fragment is split into its top-level nodes, the
//! `<inheritdoc/>` placeholder located, and inherited nodes spliced in at
//! the placeholder position. Locally authored elements always shadow
//! inherited ones with the same identity (tag name, discriminated by a
//! `name` or `cref` attribute where present), so a member that writes its
//! own `<summary>` never has it overwritten by an ancestor's.
//!
//! Everything here works on raw string slices of the original fragment so
//! untouched content keeps its exact bytes, including entities and
//! whitespace.

use std::sync::OnceLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

/// One top-level node of a member fragment.
#[derive(Debug, Clone)]
pub struct FragmentNode {
    /// Element tag name; `None` for text, CDATA and comment nodes
    pub name: Option<String>,
    /// Shadowing identity for elements: the tag name, extended with the
    /// `name` or `cref` attribute value when one is present
    pub key: Option<String>,
    /// The node's exact source text, tags included
    pub raw: String,
}

impl FragmentNode {
    fn is_inheritdoc(&self) -> bool {
        self.name.as_deref() == Some("inheritdoc")
    }

    /// Inner text of an element node, tags stripped.
    pub fn inner(&self) -> &str {
        let Some(open_end) = self.raw.find('>') else {
            return "";
        };
        if self.raw.ends_with("/>") {
            return "";
        }
        match self.raw.rfind("</") {
            Some(close) if close > open_end => &self.raw[open_end + 1..close],
            _ => "",
        }
    }
}

/// Which inherited nodes an `<inheritdoc/>` placeholder pulls in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InheritFilter {
    /// No `select` attribute: every inherited node is a candidate
    WholeMember,
    /// `select="summary"` or `select="summary|remarks"`: only elements
    /// with one of these tag names
    Tags(Vec<String>),
}

/// A parsed `<inheritdoc/>` directive found in a fragment.
#[derive(Debug, Clone)]
pub struct InheritDirective {
    /// Explicit source from `cref="..."`, overriding the inheritance graph
    pub cref: Option<String>,
    pub filter: InheritFilter,
    /// Index into the fragment's top-level nodes: the placeholder itself,
    /// or the container element the placeholder is nested inside
    pub node_index: usize,
    /// Set when the placeholder sits inside a container element such as
    /// `<summary><inheritdoc/></summary>`
    pub nested: bool,
}

/// Cheap pre-check before parsing: does this fragment mention the tag at
/// all? Fragments that don't are passed through untouched.
pub fn mentions_inheritdoc(fragment: &str) -> bool {
    fragment.contains("<inheritdoc")
}

/// Split a member fragment into its top-level nodes, preserving the exact
/// source text of each.
pub fn split_nodes(fragment: &str) -> Result<Vec<FragmentNode>, quick_xml::Error> {
    let wrapped = format!("<member>{fragment}</member>");
    let mut reader = Reader::from_str(&wrapped);
    let mut nodes = Vec::new();

    // Consume the synthetic wrapper's start tag
    match reader.read_event()? {
        Event::Start(_) => {}
        _ => return Ok(nodes),
    }

    loop {
        let node_start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                let name = tag_name(&e);
                let key = element_key(&e);
                reader.read_to_end(e.name())?;
                let node_end = reader.buffer_position() as usize;
                nodes.push(FragmentNode {
                    name: Some(name),
                    key: Some(key),
                    raw: wrapped[node_start..node_end].to_string(),
                });
            }
            Event::Empty(e) => {
                let name = tag_name(&e);
                let key = element_key(&e);
                let node_end = reader.buffer_position() as usize;
                nodes.push(FragmentNode {
                    name: Some(name),
                    key: Some(key),
                    raw: wrapped[node_start..node_end].to_string(),
                });
            }
            // GeneralRef: entity references in top-level text arrive as
            // their own events and belong to the surrounding text node
            Event::Text(_) | Event::CData(_) | Event::Comment(_) | Event::GeneralRef(_) => {
                let node_end = reader.buffer_position() as usize;
                nodes.push(FragmentNode {
                    name: None,
                    key: None,
                    raw: wrapped[node_start..node_end].to_string(),
                });
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(nodes)
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return std::str::from_utf8(&attr.value).ok().map(str::to_string);
        }
    }
    None
}

/// Shadowing key for an element: repeatable tags are discriminated by
/// their `name` attribute (`param`, `typeparam`) or `cref` attribute
/// (`exception`, `permission`), so only the matching instance shadows.
fn element_key(e: &BytesStart) -> String {
    let tag = tag_name(e);
    if let Some(name) = attr_value(e, b"name") {
        return format!("{tag}[name={name}]");
    }
    if let Some(cref) = attr_value(e, b"cref") {
        return format!("{tag}[cref={cref}]");
    }
    tag
}

/// Locate the first `<inheritdoc/>` directive in a fragment, either as a
/// top-level node or nested inside a container element.
pub fn find_directive(
    nodes: &[FragmentNode],
) -> Result<Option<InheritDirective>, quick_xml::Error> {
    for (idx, node) in nodes.iter().enumerate() {
        if node.is_inheritdoc() {
            if let Some((cref, filter)) = directive_attrs(&node.raw)? {
                return Ok(Some(InheritDirective {
                    cref,
                    filter,
                    node_index: idx,
                    nested: false,
                }));
            }
        }
        // The substring probe is only a cheap pre-filter; the tag has to
        // show up as an actual element event, not as CDATA or comment text
        if node.name.is_some() && mentions_inheritdoc(&node.raw) {
            if let Some((cref, filter)) = directive_attrs(&node.raw)? {
                return Ok(Some(InheritDirective {
                    cref,
                    filter,
                    node_index: idx,
                    nested: true,
                }));
            }
        }
    }
    Ok(None)
}

/// Pull `cref` and `select` off the first `<inheritdoc>` element in `raw`,
/// or `None` if no such element occurs.
fn directive_attrs(
    raw: &str,
) -> Result<Option<(Option<String>, InheritFilter)>, quick_xml::Error> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"inheritdoc" => {
                let cref = attr_value(&e, b"cref");
                // `path` is the modern spelling, `select` the legacy one
                let select = attr_value(&e, b"path").or_else(|| attr_value(&e, b"select"));
                let filter = match select {
                    Some(expr) => parse_filter(&expr),
                    None => InheritFilter::WholeMember,
                };
                return Ok(Some((cref, filter)));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn filter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/?[A-Za-z][A-Za-z0-9_:-]*(\|/?[A-Za-z][A-Za-z0-9_:-]*)*$")
            .expect("filter pattern regex should compile")
    })
}

/// Parse a `select`/`path` expression. Only the flat subset is supported:
/// element names, optionally rooted with `/` and alternated with `|`.
/// Anything richer falls back to inheriting the whole member with a
/// warning, which keeps output valid rather than dropping content.
pub fn parse_filter(expr: &str) -> InheritFilter {
    let expr = expr.trim();
    if expr.is_empty() {
        return InheritFilter::WholeMember;
    }
    if filter_pattern().is_match(expr) {
        let tags = expr
            .split('|')
            .map(|part| part.trim_start_matches('/').to_string())
            .collect();
        return InheritFilter::Tags(tags);
    }
    log::warn!("unsupported inheritdoc filter expression '{expr}', inheriting whole member");
    InheritFilter::WholeMember
}

fn filter_allows(filter: &InheritFilter, node: &FragmentNode) -> bool {
    match filter {
        InheritFilter::WholeMember => true,
        // With an explicit tag filter, loose text between elements is
        // dropped along with non-matching elements
        InheritFilter::Tags(tags) => match &node.name {
            Some(name) => tags.iter().any(|t| t == name),
            None => false,
        },
    }
}

/// Merge inherited nodes into a local fragment at its `<inheritdoc/>`
/// placeholder. Returns the merged fragment text.
pub fn apply(
    local: &[FragmentNode],
    inherited: &[FragmentNode],
    directive: &InheritDirective,
) -> String {
    if directive.nested {
        apply_nested(local, inherited, directive)
    } else {
        apply_top_level(local, inherited, directive)
    }
}

/// Top-level placeholder: splice inherited nodes in at its position,
/// skipping any the member already authors locally.
fn apply_top_level(
    local: &[FragmentNode],
    inherited: &[FragmentNode],
    directive: &InheritDirective,
) -> String {
    let local_keys: Vec<&str> = local
        .iter()
        .filter(|n| !n.is_inheritdoc())
        .filter_map(|n| n.key.as_deref())
        .collect();

    let mut out = String::new();
    for (idx, node) in local.iter().enumerate() {
        if idx == directive.node_index {
            for inh in inherited {
                if inh.is_inheritdoc() {
                    // An unresolved placeholder in the source must not leak
                    continue;
                }
                if !filter_allows(&directive.filter, inh) {
                    continue;
                }
                if let Some(key) = inh.key.as_deref() {
                    if local_keys.contains(&key) {
                        continue;
                    }
                }
                out.push_str(&inh.raw);
            }
        } else {
            out.push_str(&node.raw);
        }
    }
    out
}

/// Nested placeholder, e.g. `<summary><inheritdoc/></summary>`: the
/// container keeps its tags and its content becomes the inner text of the
/// ancestor's element with the same identity.
fn apply_nested(
    local: &[FragmentNode],
    inherited: &[FragmentNode],
    directive: &InheritDirective,
) -> String {
    let container = &local[directive.node_index];
    let replacement = container.key.as_deref().and_then(|key| {
        inherited
            .iter()
            .find(|inh| inh.key.as_deref() == Some(key))
            .map(|inh| inh.inner().to_string())
    });

    let mut out = String::new();
    for (idx, node) in local.iter().enumerate() {
        if idx == directive.node_index {
            match &replacement {
                Some(inner) => {
                    let open_end = node.raw.find('>').map(|p| p + 1).unwrap_or(0);
                    let close = node.raw.rfind("</").unwrap_or(node.raw.len());
                    out.push_str(&node.raw[..open_end]);
                    out.push_str(inner);
                    out.push_str(&node.raw[close..]);
                }
                // No matching ancestor element: keep the container as-is
                None => out.push_str(&node.raw),
            }
        } else {
            out.push_str(&node.raw);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(fragment: &str) -> Vec<FragmentNode> {
        split_nodes(fragment).expect("fragment should parse")
    }

    #[test]
    fn test_split_preserves_raw_text() {
        let fragment = "\n  <summary>Draws &amp; refreshes.</summary>\n  <param name=\"depth\">Depth.</param>\n";
        let split = nodes(fragment);

        let raw: String = split.iter().map(|n| n.raw.as_str()).collect();
        assert_eq!(raw, fragment);
        assert_eq!(
            split.iter().filter_map(|n| n.name.as_deref()).collect::<Vec<_>>(),
            vec!["summary", "param"]
        );
    }

    #[test]
    fn test_element_keys_discriminate_by_name_and_cref() {
        let split = nodes(
            r#"<param name="a">A.</param><param name="b">B.</param><exception cref="T:System.IO.IOException">Boom.</exception><summary>S.</summary>"#,
        );
        let keys: Vec<&str> = split.iter().filter_map(|n| n.key.as_deref()).collect();
        assert_eq!(
            keys,
            vec![
                "param[name=a]",
                "param[name=b]",
                "exception[cref=T:System.IO.IOException]",
                "summary",
            ]
        );
    }

    #[test]
    fn test_find_top_level_directive() {
        let split = nodes(r#"<inheritdoc cref="M:Ns.Base.Draw" select="summary|remarks"/>"#);
        let directive = find_directive(&split)
            .expect("fragment should parse")
            .expect("directive present");

        assert_eq!(directive.cref.as_deref(), Some("M:Ns.Base.Draw"));
        assert_eq!(
            directive.filter,
            InheritFilter::Tags(vec!["summary".to_string(), "remarks".to_string()])
        );
        assert!(!directive.nested);
        assert_eq!(directive.node_index, 0);
    }

    #[test]
    fn test_find_nested_directive() {
        let split = nodes("<summary><inheritdoc/></summary><returns>Local.</returns>");
        let directive = find_directive(&split)
            .expect("fragment should parse")
            .expect("directive present");

        assert!(directive.nested);
        assert_eq!(directive.node_index, 0);
        assert_eq!(directive.cref, None);
    }

    #[test]
    fn test_no_directive() {
        let split = nodes("<summary>Nothing to inherit.</summary>");
        assert!(find_directive(&split).expect("fragment should parse").is_none());
    }

    #[test]
    fn test_tag_inside_cdata_is_not_a_directive() {
        let split = nodes("<example><![CDATA[Use <inheritdoc/> to inherit docs.]]></example>");
        assert!(find_directive(&split).expect("fragment should parse").is_none());
    }

    #[test]
    fn test_tag_inside_xml_comment_is_not_a_directive() {
        let split = nodes("<remarks><!-- add <inheritdoc/> here later --></remarks>");
        assert!(find_directive(&split).expect("fragment should parse").is_none());
    }

    #[test]
    fn test_unsupported_filter_falls_back_to_whole_member() {
        assert_eq!(parse_filter("summary"), InheritFilter::Tags(vec!["summary".to_string()]));
        assert_eq!(parse_filter("/summary"), InheritFilter::Tags(vec!["summary".to_string()]));
        assert_eq!(
            parse_filter("param[@name='x']/node()"),
            InheritFilter::WholeMember
        );
        assert_eq!(parse_filter(""), InheritFilter::WholeMember);
    }

    #[test]
    fn test_local_elements_shadow_inherited() {
        let local = nodes("<summary>Mine.</summary><inheritdoc/>");
        let inherited = nodes(
            "<summary>Theirs.</summary><returns>Inherited returns.</returns>",
        );
        let directive = find_directive(&local)
            .expect("fragment should parse")
            .expect("directive present");

        let merged = apply(&local, &inherited, &directive);
        assert_eq!(merged, "<summary>Mine.</summary><returns>Inherited returns.</returns>");
    }

    #[test]
    fn test_named_params_shadow_individually() {
        let local = nodes(r#"<param name="a">Local A.</param><inheritdoc/>"#);
        let inherited =
            nodes(r#"<param name="a">Inherited A.</param><param name="b">Inherited B.</param>"#);
        let directive = find_directive(&local)
            .expect("fragment should parse")
            .expect("directive present");

        let merged = apply(&local, &inherited, &directive);
        assert_eq!(
            merged,
            r#"<param name="a">Local A.</param><param name="b">Inherited B.</param>"#
        );
    }

    #[test]
    fn test_tag_filter_selects_only_named_elements() {
        let local = nodes(r#"<inheritdoc select="summary"/>"#);
        let inherited = nodes("<summary>S.</summary><returns>R.</returns>");
        let directive = find_directive(&local)
            .expect("fragment should parse")
            .expect("directive present");

        assert_eq!(apply(&local, &inherited, &directive), "<summary>S.</summary>");
    }

    #[test]
    fn test_placeholder_position_is_where_content_lands() {
        let local = nodes("<example>First.</example><inheritdoc/><seealso cref=\"T:X\"/>");
        let inherited = nodes("<summary>S.</summary>");
        let directive = find_directive(&local)
            .expect("fragment should parse")
            .expect("directive present");

        assert_eq!(
            apply(&local, &inherited, &directive),
            "<example>First.</example><summary>S.</summary><seealso cref=\"T:X\"/>"
        );
    }

    #[test]
    fn test_nested_directive_pulls_matching_container_content() {
        let local = nodes("<summary>See base: <inheritdoc/></summary>");
        let inherited = nodes("<summary>Base summary.</summary><returns>R.</returns>");
        let directive = find_directive(&local)
            .expect("fragment should parse")
            .expect("directive present");

        assert_eq!(
            apply(&local, &inherited, &directive),
            "<summary>Base summary.</summary>"
        );
    }

    #[test]
    fn test_nested_directive_without_match_keeps_container() {
        let local = nodes("<remarks><inheritdoc/></remarks>");
        let inherited = nodes("<summary>Only a summary.</summary>");
        let directive = find_directive(&local)
            .expect("fragment should parse")
            .expect("directive present");

        assert_eq!(apply(&local, &inherited, &directive), "<remarks><inheritdoc/></remarks>");
    }

    #[test]
    fn test_stale_placeholder_in_source_does_not_leak() {
        let local = nodes("<inheritdoc/>");
        let inherited = nodes("<summary>S.</summary><inheritdoc cref=\"M:Further.Up\"/>");
        let directive = find_directive(&local)
            .expect("fragment should parse")
            .expect("directive present");

        assert_eq!(apply(&local, &inherited, &directive), "<summary>S.</summary>");
    }

    #[test]
    fn test_mentions_inheritdoc() {
        assert!(mentions_inheritdoc("<inheritdoc/>"));
        assert!(mentions_inheritdoc("<summary><inheritdoc cref=\"T:X\"/></summary>"));
        assert!(!mentions_inheritdoc("<summary>plain</summary>"));
    }
}
