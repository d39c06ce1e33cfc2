//! Rotating browser identities for outgoing requests.
//!
//! Every attempt draws a fresh profile so consecutive requests do not share a
//! fingerprint. Client hints are only sent for Chromium-family agents; a
//! Firefox or Safari agent announcing `sec-ch-ua` would contradict itself.

use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, DNT, HeaderMap,
    HeaderName, HeaderValue, REFERER, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use url::Url;

/// Browser engine family, which decides the client-hint headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl BrowserFamily {
    fn sec_ch_ua(self) -> Option<&'static str> {
        match self {
            BrowserFamily::Chrome => Some(
                "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
            ),
            BrowserFamily::Edge => Some(
                "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Microsoft Edge\";v=\"120\"",
            ),
            BrowserFamily::Firefox | BrowserFamily::Safari => None,
        }
    }
}

/// One plausible desktop browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: &'static str,
    pub family: BrowserFamily,
    /// Value for `sec-ch-ua-platform`, already quoted.
    pub platform: &'static str,
}

pub static DEFAULT_PROFILES: [BrowserProfile; 6] = [
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        family: BrowserFamily::Chrome,
        platform: "\"Windows\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        family: BrowserFamily::Chrome,
        platform: "\"macOS\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        family: BrowserFamily::Firefox,
        platform: "\"Windows\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        family: BrowserFamily::Safari,
        platform: "\"macOS\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        family: BrowserFamily::Chrome,
        platform: "\"Linux\"",
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        family: BrowserFamily::Edge,
        platform: "\"Windows\"",
    },
];

const COMMON_HEADERS: [(HeaderName, &str); 6] = [
    (
        ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    (ACCEPT_LANGUAGE, "en-US,en;q=0.9"),
    (ACCEPT_ENCODING, "gzip, deflate, br"),
    (CONNECTION, "keep-alive"),
    (UPGRADE_INSECURE_REQUESTS, "1"),
    (CACHE_CONTROL, "max-age=0"),
];

const FETCH_METADATA: [(&str, &str); 4] = [
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
];

/// The set of profiles to draw from, plus the retailer whose pages get a
/// same-site `Referer`.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    profiles: Vec<BrowserProfile>,
    referer_domain: String,
    referer: String,
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self {
            profiles: DEFAULT_PROFILES.to_vec(),
            referer_domain: "amazon.com".into(),
            referer: "https://www.amazon.com/".into(),
        }
    }
}

impl IdentityPool {
    /// Pool over custom profiles. Falls back to the defaults when empty.
    pub fn with_profiles(mut self, profiles: Vec<BrowserProfile>) -> Self {
        if !profiles.is_empty() {
            self.profiles = profiles;
        }
        self
    }

    /// Send `referer` to `domain` and its subdomains.
    pub fn with_referer(mut self, domain: impl Into<String>, referer: impl Into<String>) -> Self {
        self.referer_domain = domain.into();
        self.referer = referer.into();
        self
    }

    pub fn profiles(&self) -> &[BrowserProfile] {
        &self.profiles
    }

    fn referer_for(&self, url: &str) -> Option<&str> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let domain = self.referer_domain.as_str();
        let matches = host == domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'));
        matches.then_some(self.referer.as_str())
    }
}

/// Build the header set for one request to `url`.
pub fn draw_identity<R: Rng + ?Sized>(pool: &IdentityPool, rng: &mut R, url: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in COMMON_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    for (name, value) in FETCH_METADATA {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }

    let profile = pool
        .profiles
        .choose(rng)
        .unwrap_or(&DEFAULT_PROFILES[0]);
    headers.insert(USER_AGENT, HeaderValue::from_static(profile.user_agent));

    if let Some(brands) = profile.family.sec_ch_ua() {
        headers.insert(
            HeaderName::from_static("sec-ch-ua"),
            HeaderValue::from_static(brands),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-mobile"),
            HeaderValue::from_static("?0"),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-platform"),
            HeaderValue::from_static(profile.platform),
        );
    }

    if rng.gen_bool(0.5) {
        headers.insert(DNT, HeaderValue::from_static("1"));
    }

    if let Some(referer) = pool.referer_for(url) {
        match HeaderValue::from_str(referer) {
            Ok(value) => {
                headers.insert(REFERER, value);
            }
            Err(e) => tracing::warn!(%referer, error = %e, "Skipping invalid Referer"),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const AMAZON: &str = "https://www.amazon.com/dp/B0TEST";

    fn draws(url: &str, n: u64) -> Vec<HeaderMap> {
        let pool = IdentityPool::default();
        let mut rng = StdRng::seed_from_u64(n);
        (0..n).map(|_| draw_identity(&pool, &mut rng, url)).collect()
    }

    #[test]
    fn always_sends_common_headers() {
        for headers in draws(AMAZON, 20) {
            assert!(headers.contains_key(USER_AGENT));
            assert_eq!(headers[ACCEPT_LANGUAGE], "en-US,en;q=0.9");
            assert_eq!(headers["sec-fetch-mode"], "navigate");
            assert_eq!(headers[CACHE_CONTROL], "max-age=0");
        }
    }

    #[test]
    fn client_hints_only_for_chromium() {
        for headers in draws(AMAZON, 50) {
            let ua = headers[USER_AGENT].to_str().unwrap();
            let chromium = ua.contains("Chrome/");
            assert_eq!(headers.contains_key("sec-ch-ua"), chromium, "{ua}");
        }
    }

    #[test]
    fn user_agents_rotate() {
        let seen: std::collections::HashSet<_> = draws(AMAZON, 60)
            .iter()
            .map(|h| h[USER_AGENT].clone())
            .collect();
        assert!(seen.len() > 1);
    }

    #[test]
    fn dnt_is_a_coin_flip() {
        let with_dnt = draws(AMAZON, 100)
            .iter()
            .filter(|h| h.contains_key(DNT))
            .count();
        assert!(with_dnt > 0 && with_dnt < 100);
    }

    #[test]
    fn referer_for_retailer_hosts_only() {
        let pool = IdentityPool::default();
        assert_eq!(pool.referer_for(AMAZON), Some("https://www.amazon.com/"));
        assert_eq!(
            pool.referer_for("https://amazon.com/dp/B0"),
            Some("https://www.amazon.com/")
        );
        assert_eq!(pool.referer_for("https://notamazon.com/dp/B0"), None);
        assert_eq!(pool.referer_for("https://example.com/?r=amazon.com"), None);
        assert_eq!(pool.referer_for("not a url"), None);
    }

    #[test]
    fn custom_referer_pair() {
        let pool = IdentityPool::default().with_referer("example.co.uk", "https://www.example.co.uk/");
        let mut rng = StdRng::seed_from_u64(1);
        let headers = draw_identity(&pool, &mut rng, "https://shop.example.co.uk/item");
        assert_eq!(headers[REFERER], "https://www.example.co.uk/");

        let headers = draw_identity(&pool, &mut rng, AMAZON);
        assert!(!headers.contains_key(REFERER));
    }

    #[test]
    fn empty_profile_list_keeps_defaults() {
        let pool = IdentityPool::default().with_profiles(Vec::new());
        assert_eq!(pool.profiles().len(), DEFAULT_PROFILES.len());
    }
}
