// FormatSelector - picks the audio candidate to deliver
//
// Preference:
// - webm/opus first (smallest file for the same quality)
// - then highest audio bitrate
// - ties keep the order the strategy listed them in

use std::cmp::Reverse;

use super::errors::DownloadError;
use super::models::AudioCandidate;

pub struct FormatSelector;

impl FormatSelector {
    /// Choose exactly one candidate, or fail when there is nothing to choose from
    pub fn select(candidates: &[AudioCandidate]) -> Result<&AudioCandidate, DownloadError> {
        // min_by_key returns the first of equal elements
        candidates
            .iter()
            .min_by_key(|c| (!c.is_webm_opus(), Reverse(c.bitrate_kbps.unwrap_or(0))))
            .ok_or(DownloadError::NoAudioCandidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::errors::ErrorKind;
    use crate::downloader::models::{Container, SourceLocator};

    fn make_audio(container: Container, codec: &str, bitrate: Option<u32>, id: &str) -> AudioCandidate {
        AudioCandidate {
            container,
            codec: Some(codec.to_string()),
            bitrate_kbps: bitrate,
            source_locator: SourceLocator::LocalFile {
                format_id: id.to_string(),
            },
        }
    }

    #[test]
    fn test_opus_preferred_over_higher_bitrate_aac() {
        let candidates = vec![
            make_audio(Container::Webm, "opus", Some(128), "a"),
            make_audio(Container::Mp4, "mp4a", Some(160), "b"),
            make_audio(Container::Webm, "opus", Some(96), "c"),
        ];
        let best = FormatSelector::select(&candidates).unwrap();
        assert_eq!(best, &candidates[0]);
    }

    #[test]
    fn test_highest_bitrate_without_opus() {
        let candidates = vec![
            make_audio(Container::Mp4, "mp4a", Some(48), "a"),
            make_audio(Container::Mp4, "mp4a", Some(128), "b"),
            make_audio(Container::Webm, "vorbis", None, "c"),
        ];
        let best = FormatSelector::select(&candidates).unwrap();
        assert_eq!(best, &candidates[1]);
    }

    #[test]
    fn test_tie_keeps_first() {
        let candidates = vec![
            make_audio(Container::Webm, "opus", Some(160), "first"),
            make_audio(Container::Webm, "opus", Some(160), "second"),
        ];
        let best = FormatSelector::select(&candidates).unwrap();
        assert_eq!(
            best.source_locator,
            SourceLocator::LocalFile { format_id: "first".to_string() }
        );
    }

    #[test]
    fn test_empty_is_no_audio() {
        let err = FormatSelector::select(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAudioFormat);
    }
}
