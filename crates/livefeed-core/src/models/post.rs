//! Feed models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed item, either local or proxied from the linked social network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub username: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_social: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// A tweet as returned by the backend's social proxy.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SocialTweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub conversation_id: Option<String>,
}

impl SocialTweet {
    pub fn into_post(self) -> Post {
        Post {
            username: self.author_id.unwrap_or_else(|| "Unknown".to_string()),
            content: self.text,
            timestamp: self.created_at.unwrap_or_else(Utc::now),
            image: None,
            is_social: true,
            social_id: Some(self.id.clone()),
            conversation_id: self.conversation_id,
            id: self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SocialFeedResponse {
    #[serde(default)]
    pub tweets: Vec<SocialTweet>,
}

/// Tokens from a completed social-network authorization, handed to the
/// backend so it can call the social API on the user's behalf.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialAccountLink {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until `access_token` expires
    pub expires_in: i64,
    #[serde(rename = "twitterUserId")]
    pub social_user_id: String,
}

impl std::fmt::Debug for SocialAccountLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialAccountLink")
            .field("expires_in", &self.expires_in)
            .field("social_user_id", &self.social_user_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tweet_conversion_defaults() {
        let json = r#"{"tweets":[
            {"id":"1","text":"hello","author_id":"u1","created_at":"2025-03-01T12:00:00Z","conversation_id":"c1"},
            {"id":"2","text":"anon"}
        ]}"#;
        let feed: SocialFeedResponse = serde_json::from_str(json).unwrap();
        let posts: Vec<Post> = feed.tweets.into_iter().map(SocialTweet::into_post).collect();

        assert_eq!(posts[0].username, "u1");
        assert_eq!(posts[0].conversation_id.as_deref(), Some("c1"));
        assert_eq!(posts[0].social_id.as_deref(), Some("1"));
        assert!(posts[0].is_social);
        assert_eq!(posts[1].username, "Unknown");
    }

    #[test]
    fn test_link_wire_names() {
        let link = SocialAccountLink {
            access_token: "a".to_string(),
            refresh_token: String::new(),
            expires_in: 7200,
            social_user_id: "tw-1".to_string(),
        };
        let value = serde_json::to_value(&link).unwrap();
        assert_eq!(value["twitterUserId"], "tw-1");
        assert_eq!(value["expiresIn"], 7200);
        assert!(!format!("{:?}", link).contains("\"a\""));
    }
}
