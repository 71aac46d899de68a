//! Validation of the identification model's structured output.

use std::collections::HashSet;

use podthumb_gemini::GenerationPayload;
use podthumb_models::{FrameCandidate, NormalizedBox, Speaker, SpeakerManifest, Stage};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Turns raw identification text into a [`SpeakerManifest`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    /// Reject blocked payloads before looking at any text.
    pub fn validate_payload(&self, payload: &GenerationPayload) -> PipelineResult<SpeakerManifest> {
        match payload {
            GenerationPayload::Blocked { reason } => {
                Err(PipelineError::blocked(Stage::Identify, reason.clone()))
            }
            GenerationPayload::Content { .. } => {
                self.validate_text(&payload.text().unwrap_or_default())
            }
        }
    }

    pub fn validate_text(&self, raw: &str) -> PipelineResult<SpeakerManifest> {
        let body = strip_code_fence(raw);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| PipelineError::parse(format!("response is not JSON: {}", e), raw))?;

        let object = value
            .as_object()
            .ok_or_else(|| PipelineError::schema("top level is not an object", raw))?;
        let entries = match object.get("speakers") {
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(PipelineError::schema("'speakers' is not a list", raw)),
            None => return Err(PipelineError::schema("missing 'speakers' key", raw)),
        };

        let mut seen = HashSet::new();
        let mut speakers = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let Some(fields) = entry.as_object() else {
                return Err(PipelineError::schema(
                    format!("speaker #{} is not an object", index + 1),
                    raw,
                ));
            };
            let mut fields = fields.clone();
            let frames = fields.remove("frames");

            let mut speaker: Speaker = serde_json::from_value(Value::Object(fields)).map_err(|e| {
                PipelineError::schema(format!("speaker #{}: {}", index + 1, e), raw)
            })?;
            speaker.frames = match frames {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => decode_frames(&items, index + 1),
                Some(_) => {
                    return Err(PipelineError::schema(
                        format!("speaker #{}: 'frames' is not a list", index + 1),
                        raw,
                    ))
                }
            };

            let base = slug(&speaker.id).unwrap_or_else(|| format!("speaker_{}", index + 1));
            speaker.id = unique_id(base, &mut seen);
            speakers.push(speaker);
        }

        debug!(speakers = speakers.len(), "Validated identification response");
        Ok(SpeakerManifest::new(speakers))
    }
}

/// Decode frame proposals one by one. An unusable entry is dropped with a
/// warning; the extraction stage pads the speaker back up to its count.
fn decode_frames(items: &[Value], speaker: usize) -> Vec<FrameCandidate> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match decode_frame(item) {
            Ok(candidate) => Some(candidate),
            Err(reason) => {
                warn!(speaker, frame = index + 1, reason = %reason, "Dropping unusable frame proposal");
                None
            }
        })
        .collect()
}

fn decode_frame(item: &Value) -> Result<FrameCandidate, String> {
    let fields = item.as_object().ok_or("frame is not an object")?;
    let timestamp_s = fields
        .get("timestamp_s")
        .and_then(number)
        .ok_or("missing or non-numeric timestamp_s")?;

    // Missing corners fall back to the frame edges.
    let bbox = match fields.get("bbox") {
        Some(Value::Object(corners)) => NormalizedBox::new(
            corner(corners, "x1", 0.0),
            corner(corners, "y1", 0.0),
            corner(corners, "x2", 1.0),
            corner(corners, "y2", 1.0),
        ),
        _ => NormalizedBox::default(),
    };
    Ok(FrameCandidate::new(timestamp_s, bbox))
}

fn corner(corners: &Map<String, Value>, key: &str, default: f64) -> f64 {
    corners.get(key).and_then(number).unwrap_or(default)
}

/// Finite number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|v: &f64| v.is_finite())
}

/// Strip surrounding whitespace and an optional markdown code fence with
/// its language tag.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Anything before the first newline is the language tag.
    match rest.split_once('\n') {
        Some((tag, body)) if !tag.trim().contains('{') => body.trim(),
        _ => rest.trim(),
    }
}

/// Ids become file names, so keep them to a safe character set.
fn slug(id: &str) -> Option<String> {
    let cleaned: String = id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn unique_id(base: String, seen: &mut HashSet<String>) -> String {
    if seen.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
