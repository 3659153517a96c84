use url::{Host, Url};

/// Origin reported for `srcdoc` frames and opaque origins.
pub const NULL_ORIGIN: &str = "null";

/// Allow-list applied to `event.origin` before a message is looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    expected: String,
    allow_null: bool,
    allow_localhost: bool,
}

impl OriginPolicy {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            allow_null: true,
            allow_localhost: false,
        }
    }

    pub fn with_null(mut self, allow: bool) -> Self {
        self.allow_null = allow;
        self
    }

    pub fn with_localhost(mut self, allow: bool) -> Self {
        self.allow_localhost = allow;
        self
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn accepts(&self, origin: &str) -> bool {
        if origin == self.expected {
            return true;
        }
        if origin == NULL_ORIGIN {
            return self.allow_null;
        }
        self.allow_localhost && is_localhost_origin(origin)
    }
}

/// True for `http(s)` origins on `localhost`, `*.localhost` or a loopback
/// address.
pub fn is_localhost_origin(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost" || domain.ends_with(".localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

/// Serialized origin of a URL, or `None` for opaque origins.
pub fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Origin the relay treats as its host: the referrer's origin when present,
/// otherwise the relay's own scheme and hostname on `fallback_port`.
pub fn resolve_host_origin(referrer: Option<&str>, location: &Url, fallback_port: Option<u16>) -> String {
    if let Some(origin) = referrer
        .map(str::trim)
        .filter(|referrer| !referrer.is_empty())
        .and_then(origin_of)
    {
        return origin;
    }

    let mut guess = location.clone();
    if let Some(port) = fallback_port {
        if guess.set_port(Some(port)).is_err() {
            tracing::warn!(location = %location, port = port, "cannot apply fallback host port");
        }
    }
    guess.origin().ascii_serialization()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_expected_null_and_localhost_variants() {
        let policy = OriginPolicy::new("https://chat.example.com").with_localhost(true);
        assert!(policy.accepts("https://chat.example.com"));
        assert!(policy.accepts("null"));
        assert!(policy.accepts("http://localhost:5173"));
        assert!(policy.accepts("http://127.0.0.1:8000"));
        assert!(policy.accepts("http://[::1]:3000"));
        assert!(!policy.accepts("https://evil.example.com"));
        assert!(!policy.accepts("https://localhost.evil.com"));
        assert!(!policy.accepts("https://chat.example.com.evil.com"));
    }

    #[test]
    fn localhost_can_be_disabled() {
        let policy = OriginPolicy::new("https://chat.example.com")
            .with_localhost(false)
            .with_null(false);
        assert!(!policy.accepts("http://localhost:5173"));
        assert!(!policy.accepts("null"));
        assert!(policy.accepts("https://chat.example.com"));
    }

    #[test]
    fn host_origin_prefers_referrer() {
        let location = Url::parse("https://sandbox.example.com/relay.html").expect("url");
        assert_eq!(
            resolve_host_origin(Some("https://chat.example.com/c/42"), &location, Some(8080)),
            "https://chat.example.com"
        );
    }

    #[test]
    fn host_origin_falls_back_to_sibling_port() {
        let location = Url::parse("http://localhost:8081/sandbox").expect("url");
        assert_eq!(
            resolve_host_origin(None, &location, Some(8080)),
            "http://localhost:8080"
        );
        assert_eq!(
            resolve_host_origin(Some(""), &location, None),
            "http://localhost:8081"
        );
    }
}
