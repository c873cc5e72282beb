//! Runtime route matching for audio requests

use once_cell::sync::Lazy;
use regex::Regex;

/// Audio file extensions served cache-first from the "audios" cache.
/// Case-sensitive suffix match, anchored at the end of the path.
static AUDIO_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(?:mp3|ogg|webm|m4a)$").expect("audio route pattern is valid"));

/// Whether a request path should go through the audio cache-first route
pub fn is_audio_path(path: &str) -> bool {
    AUDIO_ROUTE.is_match(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_extensions_match() {
        assert!(is_audio_path("/assets/song.mp3"));
        assert!(is_audio_path("/a/b/c/sound.ogg"));
        assert!(is_audio_path("/clip.webm"));
        assert!(is_audio_path("/voice.m4a"));
    }

    #[test]
    fn test_other_extensions_do_not_match() {
        assert!(!is_audio_path("/data.json"));
        assert!(!is_audio_path("/cover.png"));
        assert!(!is_audio_path("/index.html"));
        assert!(!is_audio_path("/no-extension"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert!(!is_audio_path("/assets/song.MP3"));
        assert!(!is_audio_path("/assets/song.Ogg"));
    }

    #[test]
    fn test_extension_must_be_at_end() {
        assert!(!is_audio_path("/song.mp3.json"));
        assert!(!is_audio_path("/mp3/listing"));
    }
}
