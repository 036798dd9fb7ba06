//! Image attachments supplied alongside a user message

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use super::turn::Part;

/// A decoded image attachment ready to become an image part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub mime_type: String,
    /// Base64 payload without any `data:` prefix
    pub data: String,
}

impl ImageAttachment {
    /// Wrap an already-encoded base64 payload after checking it decodes
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> crate::Result<Self> {
        let mime_type = mime_type.into();
        let data = data.into();

        if !mime_type.starts_with("image/") {
            return Err(crate::Error::Validation(format!(
                "unsupported attachment type: {}",
                mime_type
            )));
        }
        BASE64_STANDARD
            .decode(data.as_bytes())
            .map_err(|e| crate::Error::Validation(format!("invalid base64 payload: {}", e)))?;

        Ok(Self { mime_type, data })
    }

    /// Encode raw image bytes
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> crate::Result<Self> {
        if bytes.is_empty() {
            return Err(crate::Error::Validation("image is empty".to_string()));
        }
        Self::new(mime_type, BASE64_STANDARD.encode(bytes))
    }

    /// Parse a `data:<mime>;base64,<payload>` URL as produced by a file picker
    pub fn from_data_url(url: &str) -> crate::Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| crate::Error::Validation("not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| crate::Error::Validation("data URL has no payload".to_string()))?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            crate::Error::Validation("data URL is not base64 encoded".to_string())
        })?;

        Self::new(mime_type, payload)
    }

    pub fn into_part(self) -> Part {
        Part::Image {
            mime_type: self.mime_type,
            data: self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_data_url() {
        let attachment = ImageAttachment::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.data, "aGVsbG8=");
    }

    #[test]
    fn test_from_data_url_rejects_plain_text() {
        assert!(ImageAttachment::from_data_url("data:text/plain,hello").is_err());
        assert!(ImageAttachment::from_data_url("https://example.com/a.png").is_err());
    }

    #[test]
    fn test_from_bytes_round_trips() {
        let attachment = ImageAttachment::from_bytes("image/jpeg", &[0xff, 0xd8, 0xff]).unwrap();
        assert_eq!(attachment.data, "/9j/");
        match attachment.into_part() {
            Part::Image { mime_type, data } => {
                assert_eq!(mime_type, "image/jpeg");
                assert_eq!(data, "/9j/");
            }
            other => panic!("expected image part, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid_payload() {
        assert!(ImageAttachment::new("image/png", "not base64!!").is_err());
        assert!(ImageAttachment::from_bytes("image/png", &[]).is_err());
    }
}
