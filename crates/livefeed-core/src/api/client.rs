//! Typed backend operations.
//!
//! Every call goes through the authenticated gateway, so each one gets token
//! attachment and the one-shot refresh-and-retry for free.

use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use tracing::{debug, info};

use super::endpoints::Endpoints;
use super::error::ApiError;
use super::transport::{ApiResponse, PendingRequest, TransportError};
use crate::auth::{AuthError, CredentialField, CredentialStore, Gateway};
use crate::models::post::{SocialFeedResponse, SocialTweet};
use crate::models::{Post, SocialAccountLink, User};

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Debug, Deserialize)]
struct UsersEnvelope {
    users: Vec<User>,
}

/// Authenticated API client. Clone is cheap.
#[derive(Clone)]
pub struct ApiClient {
    gateway: Gateway,
    endpoints: Endpoints,
    store: CredentialStore,
}

impl ApiClient {
    pub fn new(gateway: Gateway, endpoints: Endpoints, store: CredentialStore) -> Self {
        Self {
            gateway,
            endpoints,
            store,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Check if response is successful, returning an error built from the
    /// body if not.
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(&response))
        }
    }

    fn parse<T: DeserializeOwned>(response: &ApiResponse, what: &str) -> Result<T, ApiError> {
        response
            .json()
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    async fn send(&self, request: PendingRequest) -> Result<ApiResponse, ApiError> {
        let response = self.gateway.authenticated_request(request).await?;
        Self::check_response(response)
    }

    // ===== Account =====

    /// Update the logged-in user's profile and return the stored record
    pub async fn update_profile(&self, user: &User) -> Result<User, ApiError> {
        let request = PendingRequest::put(self.endpoints.profile()).with_json(user)?;
        let response = self.send(request).await?;
        let envelope: UserEnvelope = Self::parse(&response, "profile response")?;
        info!(email = %envelope.user.email, "Profile updated");
        Ok(envelope.user)
    }

    /// Delete the account identified by `email`
    pub async fn delete_profile(&self, email: &str) -> Result<(), ApiError> {
        let request =
            PendingRequest::delete(self.endpoints.profile()).with_json(&json!({ "email": email }))?;
        self.send(request).await?;
        Ok(())
    }

    /// Invalidate the session on the server
    pub async fn logout_remote(&self) -> Result<(), ApiError> {
        self.send(PendingRequest::post(self.endpoints.logout())).await?;
        Ok(())
    }

    /// Fetch every registered user
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let response = self.send(PendingRequest::get(self.endpoints.users())).await?;
        let envelope: UsersEnvelope = Self::parse(&response, "users response")?;
        debug!(count = envelope.users.len(), "Users fetched");
        Ok(envelope.users)
    }

    // ===== Social feed =====

    /// Hand a completed social authorization to the backend and remember the
    /// linked account id. The backend keys the social tokens by session id,
    /// so a session id must be stored.
    pub async fn link_social_account(&self, link: &SocialAccountLink) -> Result<(), ApiError> {
        if self.store.get(CredentialField::SessionId).await.map_err(AuthError::from)?.is_none() {
            return Err(ApiError::Auth(AuthError::MissingCredentials));
        }

        let request = PendingRequest::post(self.endpoints.social_link()).with_json(link)?;
        self.send(request).await?;

        self.store
            .set(CredentialField::SocialUserId, &link.social_user_id)
            .await
            .map_err(AuthError::from)?;
        info!(social_user_id = %link.social_user_id, "Social account linked");
        Ok(())
    }

    /// The id of the linked social account, if any
    pub async fn linked_social_user_id(&self) -> Result<Option<String>, ApiError> {
        Ok(self
            .store
            .get(CredentialField::SocialUserId)
            .await
            .map_err(AuthError::from)?)
    }

    async fn fetch_tweets(&self, request: PendingRequest) -> Result<Vec<Post>, ApiError> {
        let response = self.send(request).await?;
        let feed: SocialFeedResponse = Self::parse(&response, "feed response")?;
        Ok(feed.tweets.into_iter().map(SocialTweet::into_post).collect())
    }

    /// Fetch the linked account's timeline
    pub async fn fetch_feed(&self) -> Result<Vec<Post>, ApiError> {
        let posts = self
            .fetch_tweets(PendingRequest::get(self.endpoints.social_feed()))
            .await?;
        debug!(count = posts.len(), "Feed fetched");
        Ok(posts)
    }

    /// Fetch replies in one conversation
    pub async fn fetch_replies(&self, conversation_id: &str) -> Result<Vec<Post>, ApiError> {
        let url = Url::parse_with_params(
            &self.endpoints.social_feed(),
            &[("conversationId", conversation_id)],
        )
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        self.fetch_tweets(PendingRequest::get(url.as_str())).await
    }

    /// Reply to a post
    pub async fn post_comment(&self, post_id: &str, text: &str) -> Result<(), ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::Validation("Comment cannot be empty".to_string()));
        }
        let body = json!({ "text": text, "reply": { "in_reply_to_tweet_id": post_id } });
        let request = PendingRequest::post(self.endpoints.social_post()).with_json(&body)?;
        self.send(request).await?;
        Ok(())
    }

    pub async fn like_post(&self, post_id: &str) -> Result<(), ApiError> {
        let request = PendingRequest::post(self.endpoints.social_like())
            .with_json(&json!({ "tweetId": post_id }))?;
        self.send(request).await?;
        Ok(())
    }

    pub async fn unlike_post(&self, post_id: &str) -> Result<(), ApiError> {
        let request = PendingRequest::post(self.endpoints.social_unlike())
            .with_json(&json!({ "tweetId": post_id }))?;
        self.send(request).await?;
        Ok(())
    }
}
