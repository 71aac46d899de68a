//! Instructions sent to the remote models.

use std::fmt;
use std::str::FromStr;

/// Identification instruction asking for `per_speaker` timestamps and face boxes.
pub fn identify_prompt(per_speaker: usize) -> String {
    format!(
        r#"You are picking video frames that will become clean headshots for a podcast thumbnail.
The input is one edited podcast episode.

1) Find every distinct person who speaks on camera.
2) For each speaker pick {n} timestamps in seconds, ascending, that make good waist-up stills:
   frontal or three-quarter face, sharp, well lit, little motion blur, head shoulders and
   upper torso visible, no occlusions, overlays or cut-off faces.
3) Give each speaker a short visual note (for example "beard, glasses, dark hoodie").
4) Mark the role when obvious: host, guest or unknown. Usually only one host.
5) Give a grouping confidence between 0 and 1.
6) For every timestamp return a tight face bounding box in normalized [0,1] frame
   coordinates with x1 < x2 and y1 < y2.
7) Return metadata only, never images.

Reply with JSON only, in exactly this shape:
{{
  "speakers": [
    {{
      "id": "speaker_1",
      "role": "host|guest|unknown",
      "note": "short visual description",
      "confidence": 0.9,
      "frames": [
        {{"timestamp_s": 12.3, "bbox": {{"x1": 0.25, "y1": 0.18, "x2": 0.65, "y2": 0.92}}}}
      ]
    }}
  ]
}}

If two groups look like the same person, merge them and keep the best {n} frames overall."#,
        n = per_speaker
    )
}

pub const HEADSHOT_PROMPT: &str = "Studio headshot of the same person shown in the reference photos. \
Shoulders up, centered, looking into the camera with a relaxed, confident expression. \
Soft key and fill light, natural skin tones, sharp detail. \
Plain light-gray gradient background with no text, logos or watermarks; remove clutter.";

const THUMBNAIL_PROMPT: &str = "Design a YouTube thumbnail. The people must stay recognizable from their reference images. \
Put them side by side, shoulders up, facing the camera with a slight inward tilt and a warm expression; \
remove headphones, earbuds and hats. Faces are large and fill the left and right thirds. \
Render the exact title text given below and highlight one or two key words with a red box and white text, \
legible on a phone screen. No stickers, watermarks or logos.";

/// Visual layout for composed thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Template {
    #[default]
    DiaryCeo,
    CleanTwoUp,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::DiaryCeo => "diary_ceo",
            Template::CleanTwoUp => "clean_two_up",
        }
    }

    fn style(&self) -> &'static str {
        match self {
            Template::DiaryCeo => {
                "Close framing cropped at the chest, dark backdrop with a soft vignette, \
bold white title centered at the top. No badges."
            }
            Template::CleanTwoUp => {
                "Two-up interview layout on a neutral gradient, evenly lit faces, \
bold high-contrast sans-serif title."
            }
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "diary_ceo" => Ok(Template::DiaryCeo),
            "clean_two_up" => Ok(Template::CleanTwoUp),
            other => Err(format!(
                "unknown template '{}' (expected diary_ceo or clean_two_up)",
                other
            )),
        }
    }
}

/// Composition instruction embedding the literal title.
pub fn thumbnail_prompt(title: &str, template: Template) -> String {
    format!(
        "{} {} Title text to render: \"{}\". Keep both people clear and unoccluded.",
        THUMBNAIL_PROMPT,
        template.style(),
        title
    )
}
