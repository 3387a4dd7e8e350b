//! User-agent pool with matching client hints.

use rand::seq::IndexedRandom;

/// A user agent and the client-hint headers that browser would send alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: &'static str,
    /// `sec-ch-ua`; `None` for browsers without client hints.
    pub sec_ch_ua: Option<&'static str>,
    pub platform: Option<&'static str>,
    pub mobile: bool,
}

pub const BROWSER_PROFILES: &[BrowserProfile] = &[
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: Some(r#""Google Chrome";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        platform: Some(r#""Windows""#),
        mobile: false,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
        sec_ch_ua: Some(r#""Not A(Brand";v="8", "Chromium";v="132", "Google Chrome";v="132""#),
        platform: Some(r#""macOS""#),
        mobile: false,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        sec_ch_ua: Some(r#""Microsoft Edge";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        platform: Some(r#""Windows""#),
        mobile: false,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: Some(r#""Google Chrome";v="131", "Chromium";v="131", "Not_A Brand";v="24""#),
        platform: Some(r#""Linux""#),
        mobile: false,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        sec_ch_ua: None,
        platform: None,
        mobile: false,
    },
    BrowserProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
        sec_ch_ua: None,
        platform: None,
        mobile: false,
    },
];

/// Pick a profile uniformly at random.
pub fn random_profile() -> &'static BrowserProfile {
    BROWSER_PROFILES
        .choose(&mut rand::rng())
        .unwrap_or(&BROWSER_PROFILES[0])
}
