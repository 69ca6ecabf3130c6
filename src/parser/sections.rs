use serde::Serialize;
use tracing::debug;
use url::Url;

use super::paragraphs::{Paragraph, ParagraphKind};

/// Base that image ids are joined onto.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://miro.medium.com/v2/resize:fit:1400/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Section {
    pub topic: Option<String>,
    pub header_kind: Option<String>,
    pub body_lines: Vec<String>,
    pub image_urls: Vec<String>,
    /// One entry per `image_urls` entry, empty when the image has no caption.
    pub image_captions: Vec<String>,
}

impl Section {
    fn opened_by(heading: &Paragraph<'_>) -> Self {
        Section {
            topic: heading.text.map(str::to_string),
            header_kind: heading.tag.map(str::to_string),
            ..Section::default()
        }
    }

    /// True once a heading with text has opened this section.
    fn is_headed(&self) -> bool {
        self.topic.is_some() && self.header_kind.is_some()
    }
}

/// Fold a paragraph sequence into sections split at headings.
///
/// A section is only flushed at a heading if a titled heading opened it, so
/// content ahead of the first heading survives only when no heading follows.
/// The open section is always emitted at the end, even when nothing was
/// added to it.
pub fn build_sections(paragraphs: &[Paragraph<'_>], image_base: &Url) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::default();

    for para in paragraphs {
        match para.kind() {
            ParagraphKind::Heading => {
                let next = Section::opened_by(para);
                let finished = std::mem::replace(&mut current, next);
                if finished.is_headed() {
                    sections.push(finished);
                }
            }
            ParagraphKind::Image => {
                let Some(url) = para.image_id.and_then(|id| image_url(image_base, id)) else {
                    debug!("Skipping image paragraph {} without usable media", para.key);
                    continue;
                };
                current.image_urls.push(url);
                current
                    .image_captions
                    .push(para.text.unwrap_or_default().to_string());
            }
            ParagraphKind::Text => {
                current
                    .body_lines
                    .push(para.text.unwrap_or_default().to_string());
            }
            ParagraphKind::Other => {}
        }
    }

    sections.push(current);
    sections
}

fn image_url(base: &Url, image_id: &str) -> Option<String> {
    base.join(image_id).ok().map(String::from)
}
