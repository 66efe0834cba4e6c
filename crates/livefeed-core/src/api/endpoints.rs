/// Default backend base URL
pub const DEFAULT_API_BASE_URL: &str = "https://live-feed-socials-926fb17c8f89.herokuapp.com/api";

/// Backend route table, rooted at a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn route(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub fn login(&self) -> String {
        self.route("login")
    }

    pub fn signup(&self) -> String {
        self.route("signup")
    }

    pub fn refresh(&self) -> String {
        self.route("refresh")
    }

    pub fn logout(&self) -> String {
        self.route("logout")
    }

    pub fn profile(&self) -> String {
        self.route("profile")
    }

    pub fn users(&self) -> String {
        self.route("users")
    }

    pub fn social_link(&self) -> String {
        self.route("twitter/store-token")
    }

    pub fn social_feed(&self) -> String {
        self.route("twitter/tweets")
    }

    pub fn social_post(&self) -> String {
        self.route("twitter/tweet")
    }

    pub fn social_like(&self) -> String {
        self.route("twitter/like")
    }

    pub fn social_unlike(&self) -> String {
        self.route("twitter/unlike")
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let endpoints = Endpoints::new("http://localhost:5000/api/");
        assert_eq!(endpoints.login(), "http://localhost:5000/api/login");
        assert_eq!(endpoints.social_like(), "http://localhost:5000/api/twitter/like");
    }
}
