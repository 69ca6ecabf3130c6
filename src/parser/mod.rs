pub mod details;
pub mod graph;
pub mod paragraphs;
pub mod root;
pub mod sections;

use serde::Serialize;
use url::Url;

use details::Details;
use graph::{Fragments, GraphStore};
use sections::Section;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub id: String,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub publish_date: Option<String>,
    pub engagement_count: Option<i64>,
    pub sections: Vec<Section>,
}

/// Root post → paragraphs → sections, plus scalar details off the root.
/// `None` when the graph holds no root post.
pub fn parse_article(fragments: &Fragments, image_base: &Url) -> Option<Article> {
    let store = GraphStore::new(fragments);
    let root = root::locate_root(&store)?;

    let paragraphs = paragraphs::resolve_paragraphs(&store, &root);
    let sections = if paragraphs.is_empty() {
        Vec::new()
    } else {
        sections::build_sections(&paragraphs, image_base)
    };

    let Details {
        title,
        subtitle,
        publish_date,
        engagement_count,
    } = details::extract_details(root.fragment);

    Some(Article {
        id: root.id.to_string(),
        title,
        subtitle,
        publish_date,
        engagement_count,
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn base() -> Url {
        Url::parse(sections::DEFAULT_IMAGE_BASE_URL).unwrap()
    }

    fn fixture() -> Fragments {
        let text = std::fs::read_to_string("tests/fixtures/article.json").unwrap();
        serde_json::from_str(&text).unwrap()
    }

    fn fragments(value: Value) -> Fragments {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn fixture_article() {
        let article = parse_article(&fixture(), &base()).unwrap();
        assert_eq!(article.id, "d5564a551783");
        assert_eq!(
            article.title.as_deref(),
            Some("An Illustrated Guide to Graph Neural Networks")
        );
        assert_eq!(
            article.subtitle.as_deref(),
            Some("A breakdown of the inner workings of GNNs")
        );
        assert_eq!(article.publish_date.as_deref(), Some("2020-03-20T09:18:08.530Z"));
        assert_eq!(article.engagement_count, Some(3120));

        let topics: Vec<Option<&str>> =
            article.sections.iter().map(|s| s.topic.as_deref()).collect();
        assert_eq!(
            topics,
            [Some("Graphs"), Some("Message Passing"), Some("Wrapping up")]
        );

        let graphs = &article.sections[0];
        assert_eq!(graphs.header_kind.as_deref(), Some("H3"));
        assert_eq!(graphs.body_lines.len(), 3);
        assert_eq!(
            graphs.image_urls,
            ["https://miro.medium.com/v2/resize:fit:1400/1*graph-example.png"]
        );
        assert_eq!(graphs.image_captions, ["A simple graph"]);

        // The paragraph listed last by the post sits before "Wrapping up" in
        // the graph, so it lands in the "Message Passing" section.
        let passing = &article.sections[1];
        assert_eq!(
            passing.body_lines.last().map(String::as_str),
            Some("Listed last, stored earlier.")
        );
        // One image with a dangling media pointer is dropped.
        assert_eq!(passing.image_urls.len(), 1);
        assert_eq!(passing.image_captions.len(), 1);

        let wrap = &article.sections[2];
        assert_eq!(wrap.body_lines, ["Thanks for reading."]);
    }

    #[test]
    fn no_root_is_none() {
        let graph = fragments(json!({
            "ROOT_QUERY": { "__typename": "Query" },
            "Paragraph:a": { "type": "P", "text": "orphan" }
        }));
        assert!(parse_article(&graph, &base()).is_none());
        assert!(parse_article(&Fragments::new(), &base()).is_none());
    }

    #[test]
    fn root_without_content_has_details_and_no_sections() {
        let graph = fragments(json!({
            "Post:abc": {
                "title": "Draft",
                "clapCount": 0,
                "responseRootPost": { "__typename": "ResponseRootPost" }
            }
        }));
        let article = parse_article(&graph, &base()).unwrap();
        assert_eq!(article.id, "abc");
        assert_eq!(article.title.as_deref(), Some("Draft"));
        assert_eq!(article.engagement_count, Some(0));
        assert_eq!(article.publish_date, None);
        assert!(article.sections.is_empty());
    }

    #[test]
    fn parsing_twice_is_identical() {
        let graph = fixture();
        assert_eq!(parse_article(&graph, &base()), parse_article(&graph, &base()));
    }

    #[test]
    fn serializes_to_json() {
        let article = parse_article(&fixture(), &base()).unwrap();
        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(value["id"], "d5564a551783");
        assert_eq!(value["sections"][0]["topic"], "Graphs");
        assert!(value["sections"][0]["body_lines"].is_array());
    }
}
