//! Inherited documentation resolution
//!
//! Resolves `<inheritdoc/>` directives in compiler-generated XML
//! documentation files. Reflection data supplies the inheritance graph
//! (base types, interfaces, member overrides), the comments cache serves
//! raw member fragments, the resolver walks chains and merges fragments
//! with local content winning, and the pipeline streams the merged
//! document to disk.

pub mod comments_cache;
pub mod error;
pub mod member_id;
pub mod merge;
pub mod pipeline;
pub mod reflection_index;
pub mod resolver;
