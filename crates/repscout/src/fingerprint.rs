//! Randomized, internally consistent client-identity headers.
//!
//! Each attempt draws one browser profile plus an accept-language and a
//! cache-control variant. Client-hint headers (`Sec-CH-UA*`) are only ever
//! emitted for Chromium-family profiles; Firefox and Safari never send them,
//! and an empty or mismatched client hint is itself a detectable signature.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Browser family behind a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BrowserFamily {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl BrowserFamily {
    /// Whether this family sends `Sec-CH-UA*` client hints.
    pub fn sends_client_hints(self) -> bool {
        matches!(self, Self::Chrome | Self::Edge)
    }
}

/// `Sec-CH-UA`, `Sec-CH-UA-Mobile` and `Sec-CH-UA-Platform` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientHints {
    pub brands: &'static str,
    pub mobile: &'static str,
    pub platform: &'static str,
}

struct BrowserProfile {
    family: BrowserFamily,
    user_agent: &'static str,
    hints: Option<ClientHints>,
}

const CHROME_120_BRANDS: &str = r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#;

static PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        family: BrowserFamily::Chrome,
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        hints: Some(ClientHints {
            brands: CHROME_120_BRANDS,
            mobile: "?0",
            platform: r#""Windows""#,
        }),
    },
    BrowserProfile {
        family: BrowserFamily::Chrome,
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        hints: Some(ClientHints {
            brands: r#""Not A(Brand";v="99", "Google Chrome";v="121", "Chromium";v="121""#,
            mobile: "?0",
            platform: r#""Windows""#,
        }),
    },
    BrowserProfile {
        family: BrowserFamily::Chrome,
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        hints: Some(ClientHints {
            brands: CHROME_120_BRANDS,
            mobile: "?0",
            platform: r#""macOS""#,
        }),
    },
    BrowserProfile {
        family: BrowserFamily::Chrome,
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        hints: Some(ClientHints {
            brands: CHROME_120_BRANDS,
            mobile: "?0",
            platform: r#""Linux""#,
        }),
    },
    BrowserProfile {
        family: BrowserFamily::Edge,
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        hints: Some(ClientHints {
            brands: r#""Not_A Brand";v="8", "Chromium";v="120", "Microsoft Edge";v="120""#,
            mobile: "?0",
            platform: r#""Windows""#,
        }),
    },
    BrowserProfile {
        family: BrowserFamily::Firefox,
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        hints: None,
    },
    BrowserProfile {
        family: BrowserFamily::Firefox,
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
        hints: None,
    },
    BrowserProfile {
        family: BrowserFamily::Safari,
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        hints: None,
    },
];

static ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-US,en;q=0.9,es;q=0.8",
    "en-GB,en;q=0.9,en-US;q=0.8",
    "en-US,en;q=0.9,fr;q=0.8",
    "en,en-US;q=0.9",
];

static CACHE_CONTROLS: &[&str] = &["max-age=0", "no-cache"];

const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// One attempt's client identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerprintProfile {
    pub family: BrowserFamily,
    pub user_agent: &'static str,
    pub client_hints: Option<ClientHints>,
    pub accept_language: &'static str,
    pub cache_control: &'static str,
}

impl FingerprintProfile {
    /// Full request header set, in the order a browser would send them.
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        let mut headers = vec![
            ("User-Agent", self.user_agent),
            ("Accept", ACCEPT),
            ("Accept-Language", self.accept_language),
            ("Cache-Control", self.cache_control),
            ("Upgrade-Insecure-Requests", "1"),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
        ];
        if let Some(hints) = &self.client_hints {
            headers.push(("Sec-CH-UA", hints.brands));
            headers.push(("Sec-CH-UA-Mobile", hints.mobile));
            headers.push(("Sec-CH-UA-Platform", hints.platform));
        }
        headers
    }
}

/// Draws fingerprint profiles.
#[derive(Debug, Clone, Default)]
pub struct FingerprintGenerator;

impl FingerprintGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> FingerprintProfile {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> FingerprintProfile {
        let profile = &PROFILES[rng.gen_range(0..PROFILES.len())];
        let hints = if profile.family.sends_client_hints() {
            profile.hints.clone()
        } else {
            None
        };
        FingerprintProfile {
            family: profile.family,
            user_agent: profile.user_agent,
            client_hints: hints,
            accept_language: ACCEPT_LANGUAGES.choose(rng).copied().unwrap_or("en-US,en;q=0.9"),
            cache_control: CACHE_CONTROLS.choose(rng).copied().unwrap_or("max-age=0"),
        }
    }

    /// Number of distinct browser profiles available.
    pub fn profile_count(&self) -> usize {
        PROFILES.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_client_hints_match_family() {
        let gen = FingerprintGenerator::new();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let fp = gen.generate_with(&mut rng);
            let names: Vec<&str> = fp.headers().iter().map(|(k, _)| *k).collect();
            let has_hints = names.iter().any(|n| n.starts_with("Sec-CH-UA"));
            assert_eq!(has_hints, fp.family.sends_client_hints(), "{fp:?}");
            for (_, v) in fp.headers() {
                assert!(!v.is_empty());
            }
        }
    }

    #[test]
    fn test_profile_table_is_consistent() {
        for p in PROFILES {
            assert_eq!(p.hints.is_some(), p.family.sends_client_hints(), "{}", p.user_agent);
            match p.family {
                BrowserFamily::Firefox => assert!(p.user_agent.contains("Firefox")),
                BrowserFamily::Safari => assert!(!p.user_agent.contains("Chrome")),
                BrowserFamily::Edge => assert!(p.user_agent.contains("Edg/")),
                BrowserFamily::Chrome => assert!(p.user_agent.contains("Chrome/")),
            }
        }
    }

    #[test]
    fn test_generation_varies() {
        let gen = FingerprintGenerator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let agents: std::collections::HashSet<_> =
            (0..200).map(|_| gen.generate_with(&mut rng).user_agent).collect();
        assert!(agents.len() > 3);
        assert_eq!(gen.profile_count(), 8);
    }
}
