use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use serde_json::{Map, Value};
use thiserror::Error;

/// Field holding another fragment's key: `{"__ref": "ImageMetadata:1*abc.png"}`.
pub const REF_FIELD: &str = "__ref";

/// The flat page graph: opaque key → fragment object, in document order.
pub type Fragments = Map<String, Value>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path expression")]
    Empty,
    #[error("empty key segment at offset {0}")]
    EmptySegment(usize),
    #[error("unterminated bracket segment starting at offset {0}")]
    Unterminated(usize),
    #[error("invalid array index `{0}`")]
    InvalidIndex(String),
    #[error("unexpected `{ch}` at offset {offset}")]
    Unexpected { ch: char, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed lookup path.
///
/// Three segment forms are accepted:
/// - `name` / `.name` for plain object keys,
/// - `[3]` for array indexes,
/// - `['literal key']` (or double quotes) for keys containing `.`, `[`, quotes
///   or anything else; `\` escapes the next character inside the quotes.
///
/// ```text
/// ['content({"postMeteringOptions":null})'].bodyModel.paragraphs[0].__ref
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    Start,
    AfterDot,
    AfterSegment,
}

impl Path {
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        if expr.is_empty() {
            return Err(PathError::Empty);
        }

        let mut chars = expr.char_indices().peekable();
        let mut segments = Vec::new();
        let mut state = State::Start;

        while let Some(&(offset, ch)) = chars.peek() {
            match ch {
                '[' => {
                    if state == State::AfterDot {
                        return Err(PathError::EmptySegment(offset));
                    }
                    chars.next();
                    segments.push(parse_bracket(&mut chars, offset)?);
                    state = State::AfterSegment;
                }
                '.' => {
                    if state != State::AfterSegment {
                        return Err(PathError::EmptySegment(offset));
                    }
                    chars.next();
                    state = State::AfterDot;
                }
                _ => {
                    if state == State::AfterSegment {
                        return Err(PathError::Unexpected { ch, offset });
                    }
                    segments.push(Segment::Key(parse_plain_key(&mut chars)?));
                    state = State::AfterSegment;
                }
            }
        }

        if state == State::AfterDot {
            return Err(PathError::EmptySegment(expr.len()));
        }
        Ok(Path { segments })
    }

    /// Walk `value` along the path. Missing keys, out-of-range indexes, type
    /// mismatches and JSON `null` all come back as `None`.
    pub fn lookup<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Key(key) => current.as_object()?.get(key),
                Segment::Index(i) => current.as_array()?.get(*i),
            })
            .filter(|v| !v.is_null())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if is_plain_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                Segment::Key(key) => {
                    let escaped = key.replace('\\', "\\\\").replace('\'', "\\'");
                    write!(f, "['{}']", escaped)?;
                }
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['.', '[', ']', '\'', '"', '\\'])
}

fn parse_plain_key(chars: &mut Peekable<CharIndices<'_>>) -> Result<String, PathError> {
    let mut key = String::new();
    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            '.' | '[' => break,
            ']' => return Err(PathError::Unexpected { ch, offset }),
            _ => {
                key.push(ch);
                chars.next();
            }
        }
    }
    Ok(key)
}

/// Parse what follows an opening `[` up to and including the closing `]`.
fn parse_bracket(
    chars: &mut Peekable<CharIndices<'_>>,
    open: usize,
) -> Result<Segment, PathError> {
    match chars.peek().copied() {
        Some((_, quote @ ('\'' | '"'))) => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    None => return Err(PathError::Unterminated(open)),
                    Some((_, '\\')) => match chars.next() {
                        Some((_, escaped)) => key.push(escaped),
                        None => return Err(PathError::Unterminated(open)),
                    },
                    Some((_, c)) if c == quote => break,
                    Some((_, c)) => key.push(c),
                }
            }
            match chars.next() {
                Some((_, ']')) => Ok(Segment::Key(key)),
                Some((offset, ch)) => Err(PathError::Unexpected { ch, offset }),
                None => Err(PathError::Unterminated(open)),
            }
        }
        _ => {
            let mut raw = String::new();
            loop {
                match chars.next() {
                    None => return Err(PathError::Unterminated(open)),
                    Some((_, ']')) => break,
                    Some((_, c)) => raw.push(c),
                }
            }
            raw.parse::<usize>()
                .map(Segment::Index)
                .map_err(|_| PathError::InvalidIndex(raw))
        }
    }
}

/// Read-only view over one page graph, alive for a single parse call.
#[derive(Debug, Clone, Copy)]
pub struct GraphStore<'a> {
    fragments: &'a Fragments,
}

impl<'a> GraphStore<'a> {
    pub fn new(fragments: &'a Fragments) -> Self {
        GraphStore { fragments }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fragments.get(key)
    }

    /// Fragments in graph order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.fragments.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `path` evaluated inside the fragment stored under `key`.
    pub fn lookup(&self, key: &str, path: &Path) -> Option<&'a Value> {
        path.lookup(self.get(key)?)
    }

    /// Follow a `{"__ref": key}` pointer. Dangling keys resolve to `None`.
    pub fn deref(&self, pointer: &Value) -> Option<&'a Value> {
        self.get(ref_key(pointer)?)
    }
}

pub fn ref_key(pointer: &Value) -> Option<&str> {
    pointer.get(REF_FIELD)?.as_str()
}

/// `"ImageMetadata:1*abc.png"` → `"1*abc.png"`; keys without `:` pass through.
pub fn key_id(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(value: Value) -> Fragments {
        match value {
            Value::Object(map) => map,
            _ => panic!("test graph must be an object"),
        }
    }

    fn keys(keys: &[&str]) -> Path {
        Path {
            segments: keys.iter().map(|k| Segment::Key(k.to_string())).collect(),
        }
    }

    #[test]
    fn dotted_path() {
        let path = Path::parse("previewContent.subtitle").unwrap();
        assert_eq!(path, keys(&["previewContent", "subtitle"]));
    }

    #[test]
    fn quoted_literal_key() {
        let path = Path::parse(r#"['content({"postMeteringOptions":null})'].bodyModel"#).unwrap();
        assert_eq!(
            path,
            keys(&[r#"content({"postMeteringOptions":null})"#, "bodyModel"])
        );
    }

    #[test]
    fn literal_key_with_dots_and_escapes() {
        let path = Path::parse(r#"a["x.y\"z"]['it\'s']"#).unwrap();
        assert_eq!(path, keys(&["a", "x.y\"z", "it's"]));
    }

    #[test]
    fn index_segment() {
        let path = Path::parse("bodyModel.paragraphs[2].__ref").unwrap();
        assert_eq!(
            path.segments,
            [
                Segment::Key("bodyModel".into()),
                Segment::Key("paragraphs".into()),
                Segment::Index(2),
                Segment::Key("__ref".into()),
            ]
        );
    }

    #[test]
    fn malformed_paths() {
        assert_eq!(Path::parse(""), Err(PathError::Empty));
        assert_eq!(Path::parse("a..b"), Err(PathError::EmptySegment(2)));
        assert_eq!(Path::parse(".a"), Err(PathError::EmptySegment(0)));
        assert_eq!(Path::parse("a."), Err(PathError::EmptySegment(2)));
        assert_eq!(Path::parse("a.[0]"), Err(PathError::EmptySegment(2)));
        assert_eq!(Path::parse("a['b"), Err(PathError::Unterminated(1)));
        assert_eq!(Path::parse("a[1"), Err(PathError::Unterminated(1)));
        assert_eq!(
            Path::parse("a[x]"),
            Err(PathError::InvalidIndex("x".into()))
        );
        assert_eq!(
            Path::parse("a[0]b"),
            Err(PathError::Unexpected { ch: 'b', offset: 4 })
        );
        assert_eq!(
            Path::parse("a]"),
            Err(PathError::Unexpected { ch: ']', offset: 1 })
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        let expr = r#"['content({"postMeteringOptions":null})'].bodyModel.paragraphs[1]"#;
        let path: Path = expr.parse().unwrap();
        assert_eq!(path.to_string(), expr);
        assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
    }

    #[test]
    fn lookup_nested_values() {
        let value = json!({
            "content({\"postMeteringOptions\":null})": {
                "bodyModel": { "paragraphs": [{ "__ref": "Paragraph:a" }] }
            },
            "subtitle": null
        });
        let path =
            Path::parse(r#"['content({"postMeteringOptions":null})'].bodyModel.paragraphs[0].__ref"#)
                .unwrap();
        assert_eq!(path.lookup(&value), Some(&json!("Paragraph:a")));
    }

    #[test]
    fn lookup_missing_or_null_is_absent() {
        let value = json!({ "a": { "b": null }, "list": [1] });
        assert_eq!(Path::parse("a.b").unwrap().lookup(&value), None);
        assert_eq!(Path::parse("a.c").unwrap().lookup(&value), None);
        assert_eq!(Path::parse("list[3]").unwrap().lookup(&value), None);
        assert_eq!(Path::parse("list.x").unwrap().lookup(&value), None);
        assert_eq!(Path::parse("a[0]").unwrap().lookup(&value), None);
    }

    #[test]
    fn store_deref_follows_pointers() {
        let fragments = graph(json!({
            "Post:1": { "image": { "__ref": "ImageMetadata:x.png" }, "broken": { "__ref": "Nope:1" } },
            "ImageMetadata:x.png": { "id": "x.png" }
        }));
        let store = GraphStore::new(&fragments);
        let post = store.get("Post:1").unwrap();

        let image = store.deref(&post["image"]).unwrap();
        assert_eq!(image["id"], "x.png");
        assert!(store.deref(&post["broken"]).is_none());
        assert!(store.deref(&json!({ "id": 1 })).is_none());
    }

    #[test]
    fn store_lookup_and_order() {
        let fragments = graph(json!({
            "z": { "n": 1 },
            "a": { "n": 2 },
            "m": { "n": 3 }
        }));
        let store = GraphStore::new(&fragments);
        let keys: Vec<&str> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["z", "a", "m"]);
        assert_eq!(store.lookup("a", &Path::parse("n").unwrap()), Some(&json!(2)));
        assert_eq!(store.lookup("missing", &Path::parse("n").unwrap()), None);
    }

    #[test]
    fn key_id_takes_last_component() {
        assert_eq!(key_id("ImageMetadata:1*abc.png"), "1*abc.png");
        assert_eq!(key_id("Post:a:b"), "b");
        assert_eq!(key_id("plain"), "plain");
    }
}
