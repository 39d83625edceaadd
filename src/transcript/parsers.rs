use serde::Deserialize;

use crate::PipelineError;

/// Flatten an SRT-style payload to plain text.
///
/// Blocks are separated by blank lines; in each block the index and timing lines
/// are dropped and the remaining lines joined with spaces. Blocks are joined with
/// spaces as well, so a trailing blank line yields a trailing space.
pub fn parse_srt(payload: &str) -> String {
    let normalized = payload.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(|block| block.split('\n').skip(2).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct CaptionPayload {
    events: Vec<CaptionEvent>,
}

#[derive(Debug, Deserialize)]
struct CaptionEvent {
    #[serde(default)]
    segs: Option<Vec<CaptionSegment>>,
}

#[derive(Debug, Deserialize)]
struct CaptionSegment {
    #[serde(default)]
    utf8: Option<String>,
}

/// Flatten a json3 caption payload (`events[].segs[].utf8`) to plain text.
///
/// Only the first newline of the concatenated text is replaced by a space;
/// later newlines are kept.
pub fn parse_captions(payload: &str) -> Result<String, PipelineError> {
    let parsed: CaptionPayload =
        serde_json::from_str(payload).map_err(|e| PipelineError::CaptionParse(e.to_string()))?;

    let text: String = parsed
        .events
        .iter()
        .filter_map(|event| event.segs.as_ref())
        .flatten()
        .filter_map(|seg| seg.utf8.as_deref())
        .collect();

    Ok(text.replacen('\n', " ", 1))
}
