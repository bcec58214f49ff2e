use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

use crate::error::{Error, Result};

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

const GOOGLE_CDN_HOST: &str = "googleusercontent";
const GOOGLE_AVATAR_SIZE: &str = "=s400-c";

pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:image/")
}

/// Values older logins stored in place of a missing image.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == "undefined" || v == "null"
}

/// Sniffs the image type from its magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

/// Validates raw upload bytes and wraps them into a `data:` URL.
pub fn encode_data_url(bytes: &[u8]) -> Result<String> {
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(Error::BadRequest("Image size should be less than 5MB".to_string()));
    }
    let mime = sniff_mime(bytes)
        .ok_or_else(|| Error::BadRequest("Please select an image file".to_string()))?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

pub fn decode_data_url(value: &str) -> Result<Vec<u8>> {
    let (_, payload) = value
        .split_once(";base64,")
        .ok_or_else(|| Error::BadRequest("Not a base64 data URL".to_string()))?;
    Ok(STANDARD.decode(payload.trim())?)
}

/// Asks the Google CDN for a 400px crop instead of the default thumbnail.
pub fn upscale_google_avatar(url: &str) -> String {
    if !url.contains(GOOGLE_CDN_HOST) {
        return url.to_string();
    }
    let Some(pos) = url.rfind("=s") else {
        return url.to_string();
    };
    let tail = &url[pos + 2..];
    let digits = tail.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || !tail[digits..].starts_with("-c") {
        return url.to_string();
    }
    format!("{}{}{}", &url[..pos], GOOGLE_AVATAR_SIZE, &tail[digits + 2..])
}

/// Turns a stored avatar value into something a client can load directly.
///
/// Data URLs pass through untouched, server-relative paths are resolved
/// against `base`, and placeholders yield `None`.
pub fn resolve_avatar_url(value: &str, base: &Url) -> Option<String> {
    if is_placeholder(value) {
        return None;
    }
    let value = value.trim();
    if is_data_url(value) {
        return Some(value.to_string());
    }
    if value.starts_with('/') {
        return base.join(value.trim_start_matches('/')).ok().map(|u| u.to_string());
    }
    Some(upscale_google_avatar(value))
}
