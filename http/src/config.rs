/// Configuration for an HTTP-indexed mount.
#[derive(Debug, Clone)]
pub struct HttpIndexConfig {
    /// Where the JSON listing is fetched from at construction time.
    pub listing_url: String,
    /// Base prepended to backend-relative paths for `GET`/`HEAD` requests.
    /// Normalized to end in `/` when non-empty.
    pub prefix_url: String,
}

impl HttpIndexConfig {
    pub fn new(listing_url: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            prefix_url: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix_url: impl Into<String>) -> Self {
        let mut prefix = prefix_url.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.prefix_url = prefix;
        self
    }

    /// Body/size URL for a backend-relative path; the leading `/` is
    /// stripped before concatenation.
    pub(crate) fn object_url(&self, rel: &str) -> String {
        format!("{}{}", self.prefix_url, rel.trim_start_matches('/'))
    }
}
