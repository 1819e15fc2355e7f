//! Conversation normalization
//!
//! Converts wire-format messages into the shape the generation backend
//! consumes: text parts stay strings, image parts are base64-decoded and
//! converted to 3-channel RGB buffers. Part order within a message and
//! message order within the conversation are preserved exactly.

use eyre::Result;
use image::RgbImage;

use crate::types::{ChatMessage, ContentPart, MessageContent};

/// One content part after normalization.
pub enum NormalizedPart {
    Text(String),
    Image(RgbImage),
}

/// A message ready for the generation call.
pub struct NormalizedMessage {
    pub role: String,
    pub parts: Vec<NormalizedPart>,
}

impl NormalizedMessage {
    /// Flatten the text parts into a single string, in order.
    /// Image parts contribute nothing here; they travel separately.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                NormalizedPart::Text(t) => Some(t.as_str()),
                NormalizedPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Normalize a conversation. Any image decode failure fails the whole
/// request; there is no partial success.
pub fn normalize_messages(messages: &[ChatMessage]) -> Result<Vec<NormalizedMessage>> {
    messages
        .iter()
        .map(|msg| {
            let parts = match &msg.content {
                MessageContent::Text(text) => vec![NormalizedPart::Text(text.clone())],
                MessageContent::Parts(parts) => parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => Ok(NormalizedPart::Text(text.clone())),
                        ContentPart::ImageUrl { image_url } => {
                            decode_image_data_url(&image_url.url).map(NormalizedPart::Image)
                        }
                    })
                    .collect::<Result<Vec<_>>>()?,
            };
            Ok(NormalizedMessage {
                role: msg.role.clone(),
                parts,
            })
        })
        .collect()
}

/// Decode a `data:image/...;base64,<payload>` string into an RGB buffer.
///
/// The payload is everything after the first comma; the prefix is not
/// otherwise inspected.
pub fn decode_image_data_url(url: &str) -> Result<RgbImage> {
    let (_, payload) = url
        .split_once(',')
        .ok_or_else(|| eyre::eyre!("image url is not a data URL (missing ',' separator)"))?;

    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload)
        .map_err(|e| eyre::eyre!("invalid base64 image payload: {}", e))?;

    let img = image::load_from_memory(&bytes)
        .map_err(|e| eyre::eyre!("failed to decode image: {}", e))?;

    Ok(img.to_rgb8())
}
