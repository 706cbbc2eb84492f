//! Recording URL normalization

/// Extension the provider uses for uncompressed recordings.
const LOSSLESS_EXT: &str = ".wav";
/// Compressed encoding served by the provider for the same recording.
const COMPRESSED_EXT: &str = ".mp3";

/// Point a recording URL at its MP3 rendition.
///
/// URLs whose last path segment has no extension, or ends in `.wav`, get
/// `.mp3` instead. Anything else is returned unchanged.
pub fn normalize_audio_url(url: &str) -> String {
    let segment_start = url.rfind('/').map(|i| i + 1).unwrap_or(0);
    let ext = match url[segment_start..].rfind('.') {
        Some(dot) => &url[segment_start + dot..],
        None => "",
    };
    if ext.is_empty() || ext == LOSSLESS_EXT {
        format!("{}{}", &url[..url.len() - ext.len()], COMPRESSED_EXT)
    } else {
        url.to_string()
    }
}
