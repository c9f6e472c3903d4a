// Error classification - maps upstream error text to an ErrorKind
//
// Every strategy adapter calls `classify` exactly once on the raw text it got
// back (library error, yt-dlp stderr, playability reason). Callers above the
// adapters only look at the resulting kind.

use crate::downloader::errors::ErrorKind;

/// Analyze an upstream error message and return its kind
pub fn classify(error: &str) -> ErrorKind {
    let lower = error.to_lowercase();

    // Checked in order of specificity

    if lower.contains("signaturecipher")
        || lower.contains("signature cipher")
        || lower.contains("decipher")
    {
        return ErrorKind::CipherUnsupported;
    }

    if lower.contains("youtube premium")
        || lower.contains("premium")
        || lower.contains("members only")
        || lower.contains("members-only")
        || lower.contains("join this channel")
        || lower.contains("requires payment")
        || lower.contains("requires purchase")
        || lower.contains("rental")
    {
        return ErrorKind::PremiumOnly;
    }

    if lower.contains("age-restricted")
        || lower.contains("age restricted")
        || lower.contains("confirm your age")
        || lower.contains("inappropriate for some users")
        || lower.contains("available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restrict")
        || lower.contains("geo-restrict")
    {
        return ErrorKind::AgeOrRegionRestricted;
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("video unavailable")
        || lower.contains("video is unavailable")
        || lower.contains("no longer available")
        || lower.contains("has been removed")
        || lower.contains("copyright")
        || lower.contains("account associated with this video has been terminated")
        || lower.contains("no video id found")
    {
        return ErrorKind::VideoUnavailable;
    }

    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit") {
        return ErrorKind::UpstreamRateLimited;
    }

    if lower.contains("not a bot")
        || lower.contains("bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
        || lower.contains("403")
        || lower.contains("forbidden")
    {
        return ErrorKind::BotDetected;
    }

    if lower.contains("no such file")
        || lower.contains("command not found")
        || lower.contains("failed to start")
    {
        return ErrorKind::ToolUnavailable;
    }

    ErrorKind::InternalError
}

/// Classify a `playabilityStatus` block from the player response
pub fn classify_playability(status: &str, reason: &str) -> ErrorKind {
    match status {
        "LOGIN_REQUIRED" => {
            let kind = classify(reason);
            match kind {
                // "Sign in to confirm you're not a bot"
                ErrorKind::BotDetected | ErrorKind::VideoUnavailable => kind,
                _ => ErrorKind::AgeOrRegionRestricted,
            }
        }
        "AGE_CHECK_REQUIRED" | "AGE_VERIFICATION_REQUIRED" | "CONTENT_CHECK_REQUIRED" => {
            ErrorKind::AgeOrRegionRestricted
        }
        "ERROR" => ErrorKind::VideoUnavailable,
        "UNPLAYABLE" => match classify(reason) {
            ErrorKind::InternalError => ErrorKind::AgeOrRegionRestricted,
            kind => kind,
        },
        _ => classify(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_detection() {
        let error = "ERROR: [youtube] abc12345678: Private video. Sign in if you've been granted access";
        assert_eq!(classify(error), ErrorKind::VideoUnavailable);
    }

    #[test]
    fn test_copyright_detection() {
        let error = "This video is no longer available due to a copyright claim by WMG";
        assert_eq!(classify(error), ErrorKind::VideoUnavailable);
    }

    #[test]
    fn test_premium_detection() {
        let error = "This video is only available to Music Premium members";
        assert_eq!(classify(error), ErrorKind::PremiumOnly);
    }

    #[test]
    fn test_age_detection() {
        assert_eq!(
            classify("Sign in to confirm your age. This video may be inappropriate for some users."),
            ErrorKind::AgeOrRegionRestricted
        );
        assert_eq!(
            classify("The uploader has not made this video available in your country"),
            ErrorKind::AgeOrRegionRestricted
        );
        assert_eq!(
            classify("ERROR: [youtube] abc12345678: Video not available in your country"),
            ErrorKind::AgeOrRegionRestricted
        );
    }

    #[test]
    fn test_bot_and_rate_limit_detection() {
        assert_eq!(
            classify("Sign in to confirm you're not a bot"),
            ErrorKind::BotDetected
        );
        assert_eq!(classify("Status code: 403"), ErrorKind::BotDetected);
        assert_eq!(classify("HTTP Error 429: Too Many Requests"), ErrorKind::UpstreamRateLimited);
    }

    #[test]
    fn test_unknown_falls_through() {
        assert_eq!(classify("something odd happened"), ErrorKind::InternalError);
        assert_eq!(classify(""), ErrorKind::InternalError);
    }

    #[test]
    fn test_playability_statuses() {
        assert_eq!(
            classify_playability("LOGIN_REQUIRED", "Sign in to confirm your age"),
            ErrorKind::AgeOrRegionRestricted
        );
        assert_eq!(
            classify_playability("LOGIN_REQUIRED", "Sign in to confirm you’re not a bot"),
            ErrorKind::BotDetected
        );
        assert_eq!(
            classify_playability("ERROR", "Video unavailable"),
            ErrorKind::VideoUnavailable
        );
        assert_eq!(
            classify_playability("UNPLAYABLE", "The uploader has not made this video available"),
            ErrorKind::AgeOrRegionRestricted
        );
    }
}
