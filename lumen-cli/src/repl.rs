//! Interactive chat input parsing and turn rendering

use anyhow::{bail, Context, Result};
use lumen_core::session::{ImageAttachment, Part, Turn};
use lumen_core::utils::expand_tilde;
use std::path::{Path, PathBuf};

/// One line typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Message {
        text: String,
        image: Option<PathBuf>,
    },
    Reset,
    Quit,
    Empty,
}

/// Parse a chat prompt line.
///
/// `/image <path> [caption]` attaches an image, `/reset` and `/quit` are
/// commands, anything else is sent as text.
pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    match line {
        "/quit" | "/exit" => return Input::Quit,
        "/reset" => return Input::Reset,
        _ => {}
    }

    if let Some(rest) = line.strip_prefix("/image ") {
        let rest = rest.trim_start();
        if !rest.is_empty() {
            let (path, caption) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            return Input::Message {
                text: caption.trim().to_string(),
                image: Some(PathBuf::from(path)),
            };
        }
    }

    Input::Message {
        text: line.to_string(),
        image: None,
    }
}

/// Mime type for a supported image file extension
pub fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => return None,
    };
    Some(mime)
}

/// Read an image file, or decode a `data:` URL, into an attachment
pub async fn load_image(path: &Path) -> Result<ImageAttachment> {
    if let Some(url) = path.to_str().filter(|p| p.starts_with("data:")) {
        return Ok(ImageAttachment::from_data_url(url)?);
    }
    let path = &expand_tilde(&path.to_string_lossy());
    let Some(mime) = guess_mime(path) else {
        bail!("Unsupported image type: {}", path.display());
    };
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(ImageAttachment::from_bytes(mime, &bytes)?)
}

/// Plain-text body of a turn; images are shown as placeholders
pub fn describe_parts(turn: &Turn) -> String {
    turn.parts()
        .iter()
        .map(|part| match part {
            Part::Text { content } => content.clone(),
            Part::Image { mime_type, .. } => format!("[image: {}]", mime_type),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
