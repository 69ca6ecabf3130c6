use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::parser::graph::Fragments;

/// Key present in the Apollo state blob that Medium inlines into post pages.
const STATE_MARKER: &str = "ROOT_QUERY";

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap());

/// Body of the first inline `<script>` mentioning `ROOT_QUERY`.
fn find_state_script(html: &str) -> Option<&str> {
    SCRIPT_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|body| body.contains(STATE_MARKER))
}

/// Pull the page graph out of `window.__APOLLO_STATE__ = {...}`.
///
/// A page without the state script yields an empty graph; a script whose
/// payload is not a JSON object is an error.
pub fn extract_article_json(html: &str) -> Result<Fragments> {
    let Some(script) = find_state_script(html) else {
        debug!("No {} script in page", STATE_MARKER);
        return Ok(Fragments::new());
    };

    let (_, payload) = script
        .split_once("= ")
        .context("State script has no `= ` assignment")?;
    let payload = payload.trim().trim_end_matches(';').trim_end();

    serde_json::from_str(payload).context("Failed to decode embedded page state")
}

/// Accept either a saved page or the bare graph JSON.
pub fn load_graph(text: &str) -> Result<Fragments> {
    if text.trim_start().starts_with('{') {
        serde_json::from_str(text).context("Failed to decode page graph JSON")
    } else {
        extract_article_json(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_page() {
        let html = std::fs::read_to_string("tests/fixtures/article.html").unwrap();
        let graph = extract_article_json(&html).unwrap();
        assert!(graph.contains_key("ROOT_QUERY"));
        assert!(graph.contains_key("Post:d5564a551783"));
        assert_eq!(graph.keys().next().map(String::as_str), Some("ROOT_QUERY"));
    }

    #[test]
    fn page_and_bare_graph_agree() {
        let html = std::fs::read_to_string("tests/fixtures/article.html").unwrap();
        let json = std::fs::read_to_string("tests/fixtures/article.json").unwrap();
        assert_eq!(load_graph(&html).unwrap(), load_graph(&json).unwrap());
    }

    #[test]
    fn page_without_state_is_empty() {
        let html = std::fs::read_to_string("tests/fixtures/no_state.html").unwrap();
        assert!(extract_article_json(&html).unwrap().is_empty());
        assert!(extract_article_json("").unwrap().is_empty());
    }

    #[test]
    fn first_matching_script_wins() {
        let html = r#"<script type="text/javascript">var x = 1;</script>
            <SCRIPT>
              window.__APOLLO_STATE__ = {"ROOT_QUERY": {"n": 1}};
            </SCRIPT>
            <script>window.other = {"ROOT_QUERY": {"n": 2}}</script>"#;
        let graph = extract_article_json(html).unwrap();
        assert_eq!(graph["ROOT_QUERY"]["n"], 1);
    }

    #[test]
    fn malformed_state_is_an_error() {
        let html = r#"<script>window.__APOLLO_STATE__ = {"ROOT_QUERY": </script>"#;
        assert!(extract_article_json(html).is_err());

        let html = r#"<script>window.__APOLLO_STATE__ = ["ROOT_QUERY"]</script>"#;
        assert!(extract_article_json(html).is_err());

        let html = r#"<script>ROOT_QUERY</script>"#;
        assert!(extract_article_json(html).is_err());
    }

    #[test]
    fn bare_graph_must_be_an_object() {
        assert!(load_graph("{ not json").is_err());
        assert!(load_graph("{}").unwrap().is_empty());
    }
}
