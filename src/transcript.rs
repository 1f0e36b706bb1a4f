//! Narration transcripts split into timed segments.
//!
//! A transcript is Markdown whose segments start with a heading of the form
//!
//! ```text
//! ### Timestamp: **00:00:01,000** ~ **00:00:04,500**
//! ```
//!
//! (comma or dot before the milliseconds). The segment text is everything
//! after the heading line up to the next heading. A transcript without any
//! heading is one untimed segment holding the whole file.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

use crate::corpus::CorpusItem;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^###\s*Timestamp:\s*\*\*(\d{2}:\d{2}:\d{2}[,.]\d{1,6})\*\*\s*~\s*\*\*(\d{2}:\d{2}:\d{2}[,.]\d{1,6})\*\*.*$",
    )
    .expect("valid heading pattern")
});

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimestampError {
    #[error("expected hh:mm:ss[,mmm], got '{0}'")]
    Format(String),
    #[error("invalid {field} in timestamp '{input}'")]
    Field { field: &'static str, input: String },
}

/// One timed stretch of narration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// 1-based position in the transcript.
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Parse `hh:mm:ss,mmm` or `hh:mm:ss.mmm` into seconds.
///
/// The fractional part is padded or truncated to three digits, so `,5`
/// is 500 ms and `,12345` is 123 ms.
pub fn parse_timestamp(input: &str) -> std::result::Result<f64, TimestampError> {
    let normalized = input.trim().replacen(',', ".", 1);
    let parts: Vec<&str> = normalized.split(':').collect();
    let &[h, m, rest] = parts.as_slice() else {
        return Err(TimestampError::Format(input.to_string()));
    };

    let field = |name: &'static str, s: &str| {
        s.parse::<u32>().map_err(|_| TimestampError::Field {
            field: name,
            input: input.to_string(),
        })
    };

    let hours = field("hours", h)?;
    let minutes = field("minutes", m)?;
    let (secs, frac) = rest.split_once('.').unwrap_or((rest, ""));
    let seconds = field("seconds", secs)?;

    let millis = if frac.is_empty() {
        0
    } else {
        let mut digits: String = frac.chars().take(3).collect();
        while digits.len() < 3 {
            digits.push('0');
        }
        field("milliseconds", digits.as_str())?
    };

    Ok(f64::from(hours * 3600 + minutes * 60 + seconds) + f64::from(millis) / 1000.0)
}

/// Split transcript text into segments.
///
/// Headings with an unparseable time are skipped with a warning; their text
/// is dropped along with them.
pub fn parse_transcript(content: &str) -> Vec<Segment> {
    let headings: Vec<_> = HEADING.captures_iter(content).collect();

    if headings.is_empty() {
        return vec![Segment {
            index: 1,
            start: 0.0,
            end: 0.0,
            text: content.trim().to_string(),
        }];
    }

    let mut segments = Vec::with_capacity(headings.len());
    for (i, caps) in headings.iter().enumerate() {
        let (Some(whole), Some(start), Some(end)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let body_end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(content.len());

        let times = parse_timestamp(start.as_str())
            .and_then(|s| parse_timestamp(end.as_str()).map(|e| (s, e)));
        let (start, end) = match times {
            Ok(t) => t,
            Err(e) => {
                warn!(heading = whole.as_str(), error = %e, "skipping transcript segment");
                continue;
            }
        };

        segments.push(Segment {
            index: segments.len() + 1,
            start,
            end,
            text: content[whole.end()..body_end].trim().to_string(),
        });
    }

    segments
}

pub fn load_transcript(path: &Path) -> Result<Vec<Segment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    Ok(parse_transcript(&content))
}

/// Bucket corpus items by transcript segment.
///
/// An item goes to the first segment whose range holds its frame time.
/// Items without a frame time, or outside every range, go to the last
/// segment. `groups[i]` belongs to `segments[i]`; with no segments at all
/// there is a single bucket holding everything.
pub fn group_by_segment<'a>(items: &'a [CorpusItem], segments: &[Segment]) -> Vec<Vec<&'a CorpusItem>> {
    let mut groups: Vec<Vec<&CorpusItem>> = vec![Vec::new(); segments.len().max(1)];
    let last = groups.len() - 1;

    for item in items {
        let slot = item
            .timestamp
            .and_then(|t| segments.iter().position(|s| s.contains(t)))
            .unwrap_or(last);
        groups[slot].push(item);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = "\
# Episode 3

### Timestamp: **00:00:01,000** ~ **00:00:04,500**
The developer announces the release.

### Timestamp: **00:00:04.500** ~ **00:00:09.25**
They explain why it was built. It lowers the barrier.
";

    #[test]
    fn test_parse_timestamp_separators_and_padding() {
        assert_eq!(parse_timestamp("00:00:01,000"), Ok(1.0));
        assert_eq!(parse_timestamp("00:01:02.5"), Ok(62.5));
        let truncated = parse_timestamp("01:00:00,123456").unwrap();
        assert!((truncated - 3600.123).abs() < 1e-9);
        assert_eq!(parse_timestamp("00:00:07"), Ok(7.0));
        assert!(matches!(parse_timestamp("00:07"), Err(TimestampError::Format(_))));
        assert!(matches!(
            parse_timestamp("aa:00:07,000"),
            Err(TimestampError::Field { field: "hours", .. })
        ));
    }

    #[test]
    fn test_parse_transcript_segments() {
        let segments = parse_transcript(SAMPLE);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].index, 1);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[0].end, 4.5);
        assert_eq!(segments[0].text, "The developer announces the release.");
        assert_eq!(segments[1].start, 4.5);
        assert_eq!(segments[1].end, 9.25);
        assert_eq!(
            segments[1].text,
            "They explain why it was built. It lowers the barrier."
        );
    }

    #[test]
    fn test_no_headings_is_one_untimed_segment() {
        let segments = parse_transcript("  just some narration.  \n");
        assert_eq!(
            segments,
            vec![Segment {
                index: 1,
                start: 0.0,
                end: 0.0,
                text: "just some narration.".to_string(),
            }]
        );
    }

    fn item(name: &str, ts: Option<f64>) -> CorpusItem {
        CorpusItem {
            path: PathBuf::from(name),
            relative: name.to_string(),
            timestamp: ts,
        }
    }

    fn names(group: &[&CorpusItem]) -> Vec<String> {
        group.iter().map(|i| i.relative.clone()).collect()
    }

    #[test]
    fn test_group_by_segment() {
        let items = vec![
            item("frame_00_00_00_500.png", Some(0.5)),
            item("frame_00_00_02_000.png", Some(2.0)),
            item("frame_00_00_04_500.png", Some(4.5)),
            item("frame_00_00_08_000.png", Some(8.0)),
            item("frame_00_01_00_000.png", Some(60.0)),
            item("cover.png", None),
        ];
        let segments = parse_transcript(SAMPLE);
        let groups = group_by_segment(&items, &segments);
        assert_eq!(groups.len(), 2);

        // 4.5 is inside both ranges; the first segment wins.
        assert_eq!(
            names(&groups[0]),
            vec!["frame_00_00_02_000.png", "frame_00_00_04_500.png"]
        );
        // Untimed frames and frames outside every range land in the last segment.
        assert_eq!(
            names(&groups[1]),
            vec![
                "frame_00_00_00_500.png",
                "frame_00_00_08_000.png",
                "frame_00_01_00_000.png",
                "cover.png"
            ]
        );
    }

    #[test]
    fn test_group_without_segments_is_one_bucket() {
        let items = vec![item("a.png", None), item("frame_00_00_01_000.png", Some(1.0))];
        let groups = group_by_segment(&items, &[]);
        assert_eq!(groups.len(), 1);
        assert_eq!(names(&groups[0]), vec!["a.png", "frame_00_00_01_000.png"]);
    }
}
