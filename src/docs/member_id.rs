//! Documentation-comment member id helpers
//!
//! Ids follow the compiler's documentation-comment format: a kind prefix
//! (`T:` type, `M:` method, `P:` property, `E:` event, `F:` field, `N:`
//! namespace) followed by the fully qualified name, with a parenthesized
//! parameter-type list for methods and indexers. These free functions do
//! string-level classification and decomposition of such ids; they are the
//! join key between reflection data and comments files.

/// Kind prefix letter of a documentation id, if it has one.
pub fn kind(id: &str) -> Option<char> {
    let mut chars = id.chars();
    let first = chars.next()?;
    if chars.next()? == ':' && first.is_ascii_uppercase() {
        Some(first)
    } else {
        None
    }
}

/// Whether the id names a type (`T:` prefix).
pub fn is_type(id: &str) -> bool {
    kind(id) == Some('T')
}

/// Whether the id names a member of a type (method, property, event or field).
pub fn is_member(id: &str) -> bool {
    matches!(kind(id), Some('M' | 'P' | 'E' | 'F'))
}

/// The id without its kind prefix. Ids without a recognized prefix are
/// returned unchanged.
pub fn name_part(id: &str) -> &str {
    if kind(id).is_some() { &id[2..] } else { id }
}

/// Split a prefix-stripped name into its dotted path and the parameter list
/// (including the parentheses). Members without parameters get an empty tail.
fn split_params(name: &str) -> (&str, &str) {
    match name.find('(') {
        Some(pos) => (&name[..pos], &name[pos..]),
        None => (name, ""),
    }
}

/// Derive the declaring type id of a member id from the id string alone,
/// e.g. `M:Ns.Widget.Draw(System.Int32)` -> `T:Ns.Widget`.
///
/// This is the fallback for reflection records that carry no `<containers>`
/// data; dots inside parameter lists are excluded before the split, so
/// method ids with qualified parameter types derive correctly.
pub fn declaring_type_id(id: &str) -> Option<String> {
    if !is_member(id) {
        return None;
    }
    let (path, _params) = split_params(name_part(id));
    let dot = path.rfind('.')?;
    Some(format!("T:{}", &path[..dot]))
}

/// The signature key used to match a member across types: kind letter plus
/// the simple member name and parameter list, without the declaring type
/// path. Two members on different types override/implement each other
/// exactly when their signature keys are equal.
///
/// Explicit interface implementations encode the interface path with `#`
/// (e.g. `Ns#IWidget#Draw`); those compare on the trailing simple name so
/// they match the interface member they implement. `#ctor`/`#cctor` keep
/// their leading `#`.
pub fn signature_key(id: &str) -> Option<String> {
    let k = kind(id)?;
    if k == 'T' || k == 'N' {
        return None;
    }
    let (path, params) = split_params(name_part(id));
    let name = match path.rfind('.') {
        Some(dot) => &path[dot + 1..],
        None => path,
    };
    let name = match name.rfind('#') {
        Some(0) | None => name,
        Some(hash) => &name[hash + 1..],
    };
    Some(format!("{k}:{name}{params}"))
}
