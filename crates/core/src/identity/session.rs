use uuid::Uuid;

use crate::config::{redact_proxy_url, UpstreamConfig};
use crate::upstream::{Headers, QueryKind, TransportSession};

use super::profile::{random_profile, BrowserProfile};

/// The browser persona one worker presents to the upstream.
#[derive(Debug, Clone)]
pub struct SearchIdentity {
    pub profile: &'static BrowserProfile,
    pub traveller_context: Uuid,
    pub view_id: Uuid,
    pub proxy: Option<String>,
}

impl SearchIdentity {
    /// Random user agent, fresh tokens.
    pub fn generate(proxy: Option<String>) -> Self {
        Self {
            profile: random_profile(),
            traveller_context: Uuid::new_v4(),
            view_id: Uuid::new_v4(),
            proxy,
        }
    }

    /// Proxy endpoint safe for logs.
    pub fn proxy_label(&self) -> String {
        self.proxy
            .as_deref()
            .map(redact_proxy_url)
            .unwrap_or_else(|| "direct".to_string())
    }

    /// Headers for page loads during warmup.
    pub fn page_headers(&self, upstream: &UpstreamConfig) -> Headers {
        let mut headers = vec![
            (
                "accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("accept-language".to_string(), upstream.accept_language.clone()),
        ];
        self.push_browser_headers(&mut headers);
        headers
    }

    /// Headers for an API query of the given kind.
    pub fn api_headers(&self, upstream: &UpstreamConfig, kind: QueryKind) -> Headers {
        let mut headers = vec![
            ("accept".to_string(), "application/json".to_string()),
            ("accept-language".to_string(), upstream.accept_language.clone()),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        self.push_browser_headers(&mut headers);

        if kind.is_explore() {
            headers.push((
                "x-radar-combined-explore-generic-results".to_string(),
                "1".to_string(),
            ));
            headers.push((
                "x-radar-combined-explore-unfocused-locations-use-real-data".to_string(),
                "1".to_string(),
            ));
        }

        headers.extend([
            (
                "x-skyscanner-channelid".to_string(),
                upstream.channel_id.clone(),
            ),
            ("x-skyscanner-currency".to_string(), upstream.currency.clone()),
            ("x-skyscanner-locale".to_string(), upstream.locale.clone()),
            ("x-skyscanner-market".to_string(), upstream.market.clone()),
            (
                "x-skyscanner-traveller-context".to_string(),
                format!("{};1", self.traveller_context),
            ),
            ("x-skyscanner-viewid".to_string(), self.view_id.to_string()),
        ]);
        headers
    }

    fn push_browser_headers(&self, headers: &mut Headers) {
        headers.push(("user-agent".to_string(), self.profile.user_agent.to_string()));
        if let (Some(ua), Some(platform)) = (self.profile.sec_ch_ua, self.profile.platform) {
            headers.push(("sec-ch-ua".to_string(), ua.to_string()));
            headers.push((
                "sec-ch-ua-mobile".to_string(),
                if self.profile.mobile { "?1" } else { "?0" }.to_string(),
            ));
            headers.push(("sec-ch-ua-platform".to_string(), platform.to_string()));
        }
    }
}

/// An identity bound to a live HTTP session and its blocked flag.
///
/// Owned by exactly one worker; never shared.
pub struct SessionState {
    pub identity: SearchIdentity,
    pub(crate) session: Box<dyn TransportSession>,
    pub(crate) blocked: bool,
}

impl SessionState {
    pub fn new(identity: SearchIdentity, session: Box<dyn TransportSession>) -> Self {
        Self {
            identity,
            session,
            blocked: false,
        }
    }

    /// Whether the last API call ended with a denied response.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("proxy", &self.identity.proxy_label())
            .field("view_id", &self.identity.view_id)
            .field("blocked", &self.blocked)
            .finish()
    }
}
