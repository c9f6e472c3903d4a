// Browser-mimicking request headers
//
// Every outbound call to YouTube asks a HeaderProvider for a fresh set of
// headers. The random provider rotates User-Agents and synthesizes consent /
// visitor cookies; tests plug in a fixed provider.

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36 Edg/117.0.2045.60",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "es-ES,es;q=0.8,en-US;q=0.5,en;q=0.3";

pub const YOUTUBE_ORIGIN: &str = "https://www.youtube.com";
pub const YOUTUBE_REFERER: &str = "https://www.youtube.com/";

/// One set of headers for one outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserHeaders {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub referer: String,
    /// `Cookie` header value, if any
    pub cookies: Option<String>,
}

impl BrowserHeaders {
    /// Convert to a reqwest header map, skipping values that are not valid header text
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        let pairs = [
            (USER_AGENT, Some(self.user_agent.as_str())),
            (ACCEPT, Some(self.accept.as_str())),
            (ACCEPT_LANGUAGE, Some(self.accept_language.as_str())),
            (REFERER, Some(self.referer.as_str())),
            (COOKIE, self.cookies.as_deref()),
        ];
        for (name, value) in pairs {
            if let Some(Ok(v)) = value.map(HeaderValue::from_str) {
                map.insert(name, v);
            }
        }
        map
    }
}

/// Capability that produces headers for outbound requests
pub trait HeaderProvider: Send + Sync {
    fn headers(&self) -> BrowserHeaders;
}

/// Rotating User-Agent with synthetic YouTube cookies
#[derive(Debug, Default, Clone)]
pub struct RandomHeaderProvider;

impl RandomHeaderProvider {
    pub fn new() -> Self {
        Self
    }

    fn synthetic_cookies<R: Rng>(rng: &mut R) -> String {
        let visitor: String = (0..11).map(|_| rng.sample(Alphanumeric) as char).collect();
        let consent = rng.gen_range(100..999);
        format!(
            "CONSENT=YES+cb.20231231-07-p0.es+FX+{}; VISITOR_INFO1_LIVE={}; PREF=hl=es&tz=Europe.Madrid",
            consent, visitor
        )
    }
}

impl HeaderProvider for RandomHeaderProvider {
    fn headers(&self) -> BrowserHeaders {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(USER_AGENTS[0])
            .to_string();

        BrowserHeaders {
            user_agent,
            accept: ACCEPT_HTML.to_string(),
            accept_language: ACCEPT_LANGUAGES.to_string(),
            referer: YOUTUBE_REFERER.to_string(),
            cookies: Some(Self::synthetic_cookies(&mut rng)),
        }
    }
}

/// Always returns the same headers
#[derive(Debug, Clone)]
pub struct FixedHeaderProvider(pub BrowserHeaders);

impl Default for FixedHeaderProvider {
    fn default() -> Self {
        Self(BrowserHeaders {
            user_agent: USER_AGENTS[0].to_string(),
            accept: ACCEPT_HTML.to_string(),
            accept_language: ACCEPT_LANGUAGES.to_string(),
            referer: YOUTUBE_REFERER.to_string(),
            cookies: None,
        })
    }
}

impl HeaderProvider for FixedHeaderProvider {
    fn headers(&self) -> BrowserHeaders {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_headers_use_known_agents() {
        let provider = RandomHeaderProvider::new();
        for _ in 0..20 {
            let h = provider.headers();
            assert!(USER_AGENTS.contains(&h.user_agent.as_str()));
            let cookies = h.cookies.unwrap();
            assert!(cookies.starts_with("CONSENT=YES+"));
            assert!(cookies.contains("VISITOR_INFO1_LIVE="));
        }
    }

    #[test]
    fn test_header_map_contains_all_fields() {
        let map = RandomHeaderProvider::new().headers().to_header_map();
        for name in [USER_AGENT, ACCEPT, ACCEPT_LANGUAGE, REFERER, COOKIE] {
            assert!(map.contains_key(&name), "missing {}", name);
        }
    }

    #[test]
    fn test_fixed_provider_is_deterministic() {
        let provider = FixedHeaderProvider::default();
        assert_eq!(provider.headers(), provider.headers());
        assert!(!provider.headers().to_header_map().contains_key(COOKIE));
    }
}
