use std::collections::HashSet;
use std::sync::LazyLock;

use serde_json::Value;

use super::graph::{key_id, ref_key, GraphStore, Path};
use super::root::RootRecord;

/// The post body as served to readers without a metering wall.
static CONTENT_PATH: LazyLock<Path> = LazyLock::new(|| {
    Path::parse(r#"['content({"postMeteringOptions":null})']"#).unwrap()
});
static PARAGRAPH_REFS_PATH: LazyLock<Path> =
    LazyLock::new(|| Path::parse("bodyModel.paragraphs").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphKind {
    /// `H1`..`H4` and anything else starting with `H`.
    Heading,
    /// `P`, `OLI`, `ULI`.
    Text,
    Image,
    Other,
}

impl ParagraphKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            t if t.starts_with('H') => ParagraphKind::Heading,
            "P" | "OLI" | "ULI" => ParagraphKind::Text,
            "IMG" => ParagraphKind::Image,
            _ => ParagraphKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph<'a> {
    pub key: &'a str,
    pub tag: Option<&'a str>,
    pub text: Option<&'a str>,
    /// Media id for `IMG` paragraphs; `None` when `metadata.__ref` is missing
    /// or points outside the graph.
    pub image_id: Option<&'a str>,
}

impl<'a> Paragraph<'a> {
    pub fn from_fragment(store: &GraphStore<'a>, key: &'a str, fragment: &'a Value) -> Self {
        Paragraph {
            key,
            tag: fragment.get("type").and_then(Value::as_str),
            text: fragment.get("text").and_then(Value::as_str),
            image_id: fragment.get("metadata").and_then(|pointer| {
                let media_key = ref_key(pointer)?;
                let media = store.deref(pointer)?;
                Some(media.get("id").and_then(Value::as_str).unwrap_or(key_id(media_key)))
            }),
        }
    }

    pub fn kind(&self) -> ParagraphKind {
        self.tag.map_or(ParagraphKind::Other, ParagraphKind::from_tag)
    }
}

/// Paragraph keys listed by the root post, in the order the post lists them.
pub fn paragraph_refs<'a>(store: &GraphStore<'a>, root: &RootRecord<'a>) -> Vec<&'a str> {
    let Some(content) = store.lookup(root.key, &CONTENT_PATH) else {
        return Vec::new();
    };
    PARAGRAPH_REFS_PATH
        .lookup(content)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(ref_key).collect())
        .unwrap_or_default()
}

/// Resolve the root's paragraph references against the graph.
///
/// Paragraphs come back in graph order, not in the order the post lists them,
/// and a key referenced twice is emitted once. Section reconstruction relies
/// on this ordering, so keep it stable.
pub fn resolve_paragraphs<'a>(store: &GraphStore<'a>, root: &RootRecord<'a>) -> Vec<Paragraph<'a>> {
    let wanted: HashSet<&str> = paragraph_refs(store, root).into_iter().collect();
    if wanted.is_empty() {
        return Vec::new();
    }
    store
        .iter()
        .filter(|(key, _)| wanted.contains(key))
        .map(|(key, fragment)| Paragraph::from_fragment(store, key, fragment))
        .collect()
}
