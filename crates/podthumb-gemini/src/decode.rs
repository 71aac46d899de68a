//! Classification of `generateContent` responses.
//!
//! Every response is decoded exactly once into a [`GenerationPayload`], so
//! callers match on a variant instead of probing optional fields.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use podthumb_media::EncodedImage;

use crate::error::{GeminiError, GeminiResult};
use crate::types::GenerateContentResponse;

/// Finish reasons that mean the candidate was withheld by a safety filter.
pub const BLOCK_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
];

/// Response metadata kept for "no artifacts" diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDiagnostics {
    pub response_id: Option<String>,
    pub model_version: Option<String>,
    pub candidate_count: usize,
    pub finish_reasons: Vec<String>,
}

impl fmt::Display for ResponseDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "response_id={} model_version={} candidates={} finish_reasons=[{}]",
            self.response_id.as_deref().unwrap_or("-"),
            self.model_version.as_deref().unwrap_or("-"),
            self.candidate_count,
            self.finish_reasons.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationPayload {
    Blocked {
        reason: String,
    },
    Content {
        texts: Vec<String>,
        images: Vec<EncodedImage>,
        diagnostics: ResponseDiagnostics,
    },
}

impl GenerationPayload {
    /// Concatenated non-thought text, `None` when blank or blocked.
    pub fn text(&self) -> Option<String> {
        match self {
            GenerationPayload::Content { texts, .. } => {
                let joined = texts.concat();
                (!joined.trim().is_empty()).then_some(joined)
            }
            GenerationPayload::Blocked { .. } => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, GenerationPayload::Blocked { .. })
    }

    pub fn diagnostics(&self) -> Option<&ResponseDiagnostics> {
        match self {
            GenerationPayload::Content { diagnostics, .. } => Some(diagnostics),
            GenerationPayload::Blocked { .. } => None,
        }
    }
}

/// Decode a raw response into a [`GenerationPayload`].
///
/// A response is `Blocked` when prompt feedback carries a block reason, or
/// when every candidate finished with a safety-class reason and none of them
/// carries any content.
pub fn decode_response(response: GenerateContentResponse) -> GeminiResult<GenerationPayload> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
    {
        return Ok(GenerationPayload::Blocked { reason });
    }

    let finish_reasons: Vec<String> = response
        .candidates
        .iter()
        .filter_map(|c| c.finish_reason.clone())
        .collect();

    let mut texts = Vec::new();
    let mut images = Vec::new();
    for candidate in &response.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in content.parts.iter().filter(|p| !p.is_thought()) {
            if let Some(text) = &part.text {
                texts.push(text.clone());
            }
            if let Some(blob) = &part.inline_data {
                let bytes = STANDARD.decode(blob.data.as_bytes()).map_err(|e| {
                    GeminiError::invalid_response(format!("inline data is not base64: {}", e))
                })?;
                images.push(EncodedImage::new(blob.mime_type.clone(), bytes));
            }
        }
    }

    let all_blocked = !response.candidates.is_empty()
        && response.candidates.iter().all(|c| {
            c.finish_reason
                .as_deref()
                .is_some_and(|r| BLOCK_FINISH_REASONS.contains(&r))
        });
    if all_blocked && texts.is_empty() && images.is_empty() {
        return Ok(GenerationPayload::Blocked {
            reason: finish_reasons.join(", "),
        });
    }

    Ok(GenerationPayload::Content {
        texts,
        images,
        diagnostics: ResponseDiagnostics {
            response_id: response.response_id,
            model_version: response.model_version,
            candidate_count: response.candidates.len(),
            finish_reasons,
        },
    })
}
