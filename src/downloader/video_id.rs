// Video ID resolution from the shapes users paste

use regex::Regex;
use url::Url;

use super::errors::DownloadError;
use super::models::VideoId;

lazy_static::lazy_static! {
    static ref ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

/// Parse a short link, a watch link or a bare ID into a `VideoId`
pub fn parse(input: &str) -> Result<VideoId, DownloadError> {
    let trimmed = input.trim();
    // Playlist and tracking parameters follow the first '&'
    let head = trimmed.split('&').next().unwrap_or_default();

    let candidate = if let Some((_, rest)) = head.split_once("youtu.be/") {
        rest.split(['/', '?', '&']).next().map(str::to_string)
    } else if head.contains("youtube.com/watch") {
        from_watch_url(head)
    } else if ID_RE.is_match(head) {
        Some(head.to_string())
    } else {
        None
    };

    match candidate {
        Some(id) if ID_RE.is_match(&id) => Ok(VideoId::new_unchecked(id)),
        _ => Err(DownloadError::InvalidUrl(input.to_string())),
    }
}

fn from_watch_url(value: &str) -> Option<String> {
    let with_scheme = if value.starts_with("http://") || value.starts_with("https://") {
        value.to_string()
    } else {
        format!("https://{}", value)
    };
    let url = Url::parse(&with_scheme).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn test_all_shapes_resolve_to_same_id() {
        let inputs = [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=share123",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s&feature=share",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabcdef",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
            "  dQw4w9WgXcQ  ",
        ];
        for input in inputs {
            assert_eq!(parse(input).unwrap().as_str(), ID, "input: {}", input);
        }
    }

    #[test]
    fn test_short_link_ignores_list_parameter() {
        let id = parse("https://youtu.be/abc12345678&list=XYZ").unwrap();
        assert_eq!(id.as_str(), "abc12345678");
    }

    #[test]
    fn test_watch_link_where_v_is_not_first() {
        // Only what precedes the first '&' is considered
        assert!(parse("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").is_err());
        assert_eq!(
            parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap().watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_malformed_inputs() {
        for input in [
            "",
            "not a url",
            "https://vimeo.com/123456",
            "https://youtu.be/",
            "https://youtu.be/short",
            "dQw4w9WgXc",
            "dQw4w9WgXcQQ",
            "https://www.youtube.com/watch?x=1",
        ] {
            assert!(
                matches!(parse(input), Err(DownloadError::InvalidUrl(_))),
                "input: {}",
                input
            );
        }
    }
}
