//! Self-contained clip audio as a base64 data URI (`data:<mime>;base64,<payload>`).

use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";
const FALLBACK_MIME: &str = "application/octet-stream";

/// Encoded clip audio. Immutable once built.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AudioData(String);

/// Raw bytes recovered from an [`AudioData`] value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedAudio {
    /// Media type from the data URI header.
    pub mime: String,
    /// Original file bytes.
    pub bytes: Vec<u8>,
}

/// Reasons a conversion to or from the data URI form can fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioDataError {
    /// The source file had no bytes.
    Empty,
    /// The value does not start with `data:` or has no `,` separator.
    NotDataUri,
    /// The data URI is not base64-encoded.
    NotBase64,
    /// The payload is not valid base64.
    InvalidBase64(String),
}

impl fmt::Display for AudioDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioDataError::Empty => f.write_str("audio file is empty"),
            AudioDataError::NotDataUri => f.write_str("audio data is not a data URI"),
            AudioDataError::NotBase64 => f.write_str("audio data URI is not base64 encoded"),
            AudioDataError::InvalidBase64(reason) => {
                write!(f, "audio data payload is not valid base64: {reason}")
            }
        }
    }
}

impl std::error::Error for AudioDataError {}

impl AudioData {
    /// Encode raw file bytes, deriving the media type from `file_name`.
    pub fn encode(file_name: &str, bytes: &[u8]) -> Result<Self, AudioDataError> {
        if bytes.is_empty() {
            return Err(AudioDataError::Empty);
        }
        let mime = mime_for_file_name(file_name);
        let payload = general_purpose::STANDARD.encode(bytes);
        Ok(Self(format!("{DATA_PREFIX}{mime}{BASE64_MARKER},{payload}")))
    }

    /// Wrap an already-encoded data URI without validating it.
    pub fn from_data_uri(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Media type declared in the header, if the value looks like a data URI.
    pub fn mime(&self) -> Option<&str> {
        let (header, _) = split_data_uri(&self.0)?;
        let mime = header.split(';').next().unwrap_or("").trim();
        if mime.is_empty() { None } else { Some(mime) }
    }

    /// Decode back into the original bytes.
    pub fn decode(&self) -> Result<DecodedAudio, AudioDataError> {
        let (header, payload) = split_data_uri(&self.0).ok_or(AudioDataError::NotDataUri)?;
        let mut params = header.split(';');
        let mime = params.next().unwrap_or("").trim();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(AudioDataError::NotBase64);
        }
        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| AudioDataError::InvalidBase64(e.to_string()))?;
        let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
        Ok(DecodedAudio {
            mime: mime.to_ascii_lowercase(),
            bytes,
        })
    }
}

impl fmt::Debug for AudioData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioData")
            .field("mime", &self.mime())
            .field("len", &self.0.len())
            .finish()
    }
}

impl DecodedAudio {
    /// Container extension to hint the decoder probe with.
    pub fn extension_hint(&self) -> Option<&'static str> {
        extension_for_mime(&self.mime)
    }
}

fn split_data_uri(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix(DATA_PREFIX)?;
    rest.split_once(',')
}

/// Media type for a file name, by extension. Unknown extensions map to
/// `application/octet-stream`.
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return FALLBACK_MIME,
    };
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "webm" => "audio/webm",
        _ => FALLBACK_MIME,
    }
}

/// Container extension for a media type, including the browser aliases seen in
/// older snapshots (`audio/x-wav`, `audio/mp3`, ...).
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.trim().to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some("wav"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        "audio/aac" | "audio/x-aac" => Some("aac"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}
