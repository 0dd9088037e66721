//! One-shot HTTP collaborators for playthrough setup and maintenance.
//!
//! These are plain request/response calls outside the persistent session:
//! token and conversation creation feed [`crate::SessionIdentity`] and
//! [`ConversationRef`] construction; the rest are maintenance operations on
//! an existing playthrough.

use serde::{Deserialize, Serialize};
use url::Url;

use storyweave_protocol::{CharacterMood, ConversationRef, Emotion, Memory, MessageEvent};

use crate::error::ApiError;

/// Default HTTP endpoint of the play API.
pub const DEFAULT_API_URL: &str = "https://play.storyweave.io";

/// Story version selector for token creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoryVersion {
    /// Latest published version.
    #[default]
    Published,
    /// Draft version; requires an API key.
    Draft,
    /// A specific published version.
    Pinned(i32),
}

impl StoryVersion {
    /// Wire encoding: published versions omit the field, the draft is `-1`.
    fn as_field(self) -> Option<i32> {
        match self {
            Self::Published => None,
            Self::Draft => Some(-1),
            Self::Pinned(version) => Some(version),
        }
    }
}

/// Parameters for [`PlayApi::create_playthrough_token`].
#[derive(Debug, Clone)]
pub struct CreateTokenParams {
    pub story_id: i64,
    pub version: StoryVersion,
    pub api_key: Option<String>,
}

impl CreateTokenParams {
    pub fn published(story_id: i64) -> Self {
        Self {
            story_id,
            version: StoryVersion::Published,
            api_key: None,
        }
    }

    pub fn pinned(story_id: i64, version: i32) -> Self {
        Self {
            story_id,
            version: StoryVersion::Pinned(version),
            api_key: None,
        }
    }

    pub fn draft(story_id: i64, api_key: impl Into<String>) -> Self {
        Self {
            story_id,
            version: StoryVersion::Draft,
            api_key: Some(api_key.into()),
        }
    }
}

/// A freshly minted playthrough token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub token: String,
    pub playthrough_uuid: String,
}

/// Character moods and saved memories of a playthrough.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaythroughInfo {
    #[serde(default)]
    pub emotions: Vec<CharacterMood>,
    #[serde(default)]
    pub memories: Vec<Memory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    conversation_uuid: ConversationRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageHistoryResponse {
    #[serde(default)]
    messages: Vec<MessageEvent>,
}

/// HTTP client for the play API. Cheap to clone; all methods take the
/// playthrough token explicitly, matching the call contracts of the
/// collaborating service.
#[derive(Debug, Clone)]
pub struct PlayApi {
    http: reqwest::Client,
    base_url: Url,
}

impl Default for PlayApi {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_API_URL).expect("default api url is valid"))
    }
}

impl PlayApi {
    /// `base_url` should be the API origin, without a path.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> Url {
        self.base_url.join(path).expect("endpoint path is valid")
    }

    /// Create a playthrough and the token that authenticates it.
    pub async fn create_playthrough_token(
        &self,
        params: &CreateTokenParams,
    ) -> Result<TokenGrant, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            story_id: i64,
            #[serde(skip_serializing_if = "Option::is_none")]
            version: Option<i32>,
        }

        let api_key = match params.version {
            StoryVersion::Draft => Some(
                params
                    .api_key
                    .as_deref()
                    .ok_or(ApiError::MissingApiKey)?
                    .to_string(),
            ),
            _ => None,
        };

        tracing::debug!(
            story_id = params.story_id,
            version = ?params.version,
            "requesting playthrough token"
        );
        let mut request = self.http.post(self.endpoint("/play/token")).json(&Body {
            story_id: params.story_id,
            version: params.version.as_field(),
        });
        if let Some(key) = api_key {
            request = request.header("Authorization", format!("API-Key {key}"));
        }

        decode(request.send().await?).await
    }

    /// Open a new conversation (narrative thread) in a playthrough.
    pub async fn create_conversation(&self, token: &str) -> Result<ConversationRef, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/play/conversation"))
            .bearer_auth(token)
            .send()
            .await?;
        let body: ConversationResponse = decode(response).await?;
        Ok(body.conversation_uuid)
    }

    /// Fetch past messages of a conversation, optionally from a minimum
    /// event id onward.
    pub async fn get_message_history(
        &self,
        token: &str,
        conversation: &ConversationRef,
        min_event_id: Option<i64>,
    ) -> Result<Vec<MessageEvent>, ApiError> {
        let mut url = self.endpoint("/play/message-history");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("conversationUuid", conversation.as_str());
            if let Some(min) = min_event_id {
                query.append_pair("minEventId", &min.to_string());
            }
        }
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let body: MessageHistoryResponse = decode(response).await?;
        Ok(body.messages)
    }

    /// Character moods and saved memories of the playthrough.
    pub async fn get_playthrough_info(&self, token: &str) -> Result<PlaythroughInfo, ApiError> {
        let response = self
            .http
            .get(self.endpoint("/play/playthrough-info"))
            .bearer_auth(token)
            .send()
            .await?;
        decode(response).await
    }

    /// Set a single story memory.
    pub async fn set_memory(
        &self,
        token: &str,
        recall_value: &str,
        save_value: &str,
    ) -> Result<(), ApiError> {
        self.set_memories(token, &[Memory::new(recall_value, save_value)])
            .await
    }

    /// Set several story memories in one call.
    pub async fn set_memories(&self, token: &str, memories: &[Memory]) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct Body<'a> {
            memories: &'a [Memory],
        }

        tracing::debug!(count = memories.len(), "setting memories");
        let response = self
            .http
            .post(self.endpoint("/play/set-memory"))
            .bearer_auth(token)
            .json(&Body { memories })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Adjust a character's mood by the given modifier.
    pub async fn set_mood(
        &self,
        token: &str,
        character_name: &str,
        modifier: Emotion,
    ) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            character_name: &'a str,
            modifier: Emotion,
        }

        let response = self
            .http
            .post(self.endpoint("/play/set-mood"))
            .bearer_auth(token)
            .json(&Body {
                character_name,
                modifier,
            })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Fork the playthrough onto the latest published story version,
    /// returning the token of the fork.
    pub async fn fork_playthrough_token(&self, token: &str) -> Result<TokenGrant, ApiError> {
        let response = self
            .http
            .post(self.endpoint("/play/fork-playthrough"))
            .bearer_auth(token)
            .send()
            .await?;
        decode(response).await
    }

    /// Rewind the playthrough to a previously seen event id.
    pub async fn reset_playthrough(&self, token: &str, event_id: i64) -> Result<(), ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            event_id: String,
        }

        let response = self
            .http
            .post(self.endpoint("/play/reset-playthrough"))
            .bearer_auth(token)
            .json(&Body {
                event_id: event_id.to_string(),
            })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = status.as_u16(), "play api error: {body}");
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = check(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(ApiError::Decode)
}
