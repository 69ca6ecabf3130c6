use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde_json::Value;

use super::graph::Path;

static SUBTITLE_PATH: LazyLock<Path> =
    LazyLock::new(|| Path::parse("previewContent.subtitle").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Details {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// RFC 3339 in UTC, e.g. `2020-09-13T12:26:40.123Z`.
    pub publish_date: Option<String>,
    /// Clap count.
    pub engagement_count: Option<i64>,
}

/// Scalar metadata read straight off the root post. Fields that are missing
/// or of an unexpected JSON type come back as `None`.
pub fn extract_details(post: &Value) -> Details {
    Details {
        title: post.get("title").and_then(Value::as_str).map(str::to_string),
        subtitle: SUBTITLE_PATH
            .lookup(post)
            .and_then(Value::as_str)
            .map(str::to_string),
        publish_date: post
            .get("firstPublishedAt")
            .and_then(epoch_millis)
            .and_then(format_timestamp_ms),
        engagement_count: post.get("clapCount").and_then(Value::as_i64),
    }
}

fn epoch_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f as i64)
    })
}

/// Milliseconds since the Unix epoch → RFC 3339 UTC. Out-of-range values give `None`.
pub fn format_timestamp_ms(ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
