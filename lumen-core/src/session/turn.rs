//! Turn data structures

use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of turn content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text
    Text { content: String },
    /// Inline image; `data` is the base64 payload exactly as received
    Image { mime_type: String, data: String },
}

impl Part {
    /// Create a text part
    pub fn text(content: impl Into<String>) -> Self {
        Part::Text {
            content: content.into(),
        }
    }

    /// Create an image part from an already base64-encoded payload
    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::Image {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { content } => Some(content),
            Part::Image { .. } => None,
        }
    }
}

/// One message in a conversation.
///
/// The part sequence is never empty; both construction and
/// deserialization reject an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTurn")]
pub struct Turn {
    role: Role,
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct RawTurn {
    role: Role,
    parts: Vec<Part>,
}

impl TryFrom<RawTurn> for Turn {
    type Error = crate::Error;

    fn try_from(raw: RawTurn) -> crate::Result<Self> {
        Turn::new(raw.role, raw.parts)
    }
}

impl Turn {
    /// Create a turn, rejecting an empty part sequence
    pub fn new(role: Role, parts: Vec<Part>) -> crate::Result<Self> {
        if parts.is_empty() {
            return Err(crate::Error::Validation(format!(
                "{} turn must contain at least one part",
                role
            )));
        }
        Ok(Self { role, parts })
    }

    /// Create a user turn holding a single text part
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(content)],
        }
    }

    /// Create an assistant turn holding a single text part
    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::text(content)],
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Concatenated text content, images skipped
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Whether any turn in the sequence was authored by the user
pub fn has_user_turn(turns: &[Turn]) -> bool {
    turns.iter().any(Turn::is_user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_rejects_empty_parts() {
        let err = Turn::new(Role::User, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("at least one part"));
    }

    #[test]
    fn test_turn_serialization_shape() {
        let turn = Turn::new(
            Role::User,
            vec![Part::text("look"), Part::image("image/png", "aGVsbG8=")],
        )
        .unwrap();

        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["parts"][0]["type"], "text");
        assert_eq!(value["parts"][0]["content"], "look");
        assert_eq!(value["parts"][1]["type"], "image");
        assert_eq!(value["parts"][1]["mime_type"], "image/png");
        assert_eq!(value["parts"][1]["data"], "aGVsbG8=");
    }

    #[test]
    fn test_deserialize_rejects_empty_parts() {
        let result = serde_json::from_str::<Turn>(r#"{"role":"assistant","parts":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_text_skips_images() {
        let turn = Turn::new(
            Role::User,
            vec![
                Part::text("first"),
                Part::image("image/jpeg", "AAAA"),
                Part::text("second"),
            ],
        )
        .unwrap();
        assert_eq!(turn.text(), "first\nsecond");
    }

    #[test]
    fn test_has_user_turn() {
        assert!(!has_user_turn(&[]));
        assert!(!has_user_turn(&[Turn::assistant_text("Hi!")]));
        assert!(has_user_turn(&[
            Turn::assistant_text("Hi!"),
            Turn::user_text("hello"),
        ]));
    }
}
