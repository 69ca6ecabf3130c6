use std::sync::LazyLock;

use serde_json::Value;

use super::graph::{key_id, GraphStore, Path};

/// `__typename` carried by the post that the page was rendered for.
pub const ROOT_TYPENAME: &str = "ResponseRootPost";

static MARKER_PATH: LazyLock<Path> =
    LazyLock::new(|| Path::parse("responseRootPost.__typename").unwrap());

#[derive(Debug, Clone, Copy)]
pub struct RootRecord<'a> {
    /// Graph key, e.g. `Post:d5564a551783`.
    pub key: &'a str,
    /// Post id, the last `:` component of the key.
    pub id: &'a str,
    pub fragment: &'a Value,
}

/// First fragment (in graph order) tagged as the root post. Pages normally
/// carry exactly one; a missing root is not an error.
pub fn locate_root<'a>(store: &GraphStore<'a>) -> Option<RootRecord<'a>> {
    store
        .iter()
        .find(|(_, fragment)| {
            MARKER_PATH.lookup(fragment).and_then(Value::as_str) == Some(ROOT_TYPENAME)
        })
        .map(|(key, fragment)| RootRecord {
            key,
            id: key_id(key),
            fragment,
        })
}
