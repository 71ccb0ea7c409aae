use std::env;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use floodgate_core::{InboxMessage, ModerationActions, Submission};
use floodgate_utils::time::now_unix_secs;

use crate::model::{
    Listing, MessageData, Moderator, SubmissionData, Thing, TokenResponse, UserList, WikiPageData,
};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Refresh the bearer token this many seconds before it actually expires.
const TOKEN_EXPIRY_MARGIN: u64 = 60;

/// Prefix a bare post ID with the link-kind tag unless it already carries one.
pub fn fullname(post_id: &str) -> String {
    if post_id.starts_with("t3_") {
        post_id.to_owned()
    } else {
        format!("t3_{post_id}")
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
}

#[derive(Debug, Clone)]
struct BearerToken {
    access_token: String,
    expires_at: u64,
}

/// Script-app Reddit client. One password-grant token is fetched lazily and
/// re-fetched once its expiry (minus a margin) has passed; there is no
/// refresh-token flow and no transport-level retry.
#[derive(Debug)]
pub struct RedditClient {
    http: reqwest::Client,
    credentials: Credentials,
    subreddit: String,
    token: Mutex<Option<BearerToken>>,
}

impl RedditClient {
    pub fn from_env() -> anyhow::Result<Self> {
        let client_id = required_env("REDDIT_CLIENT_ID")?;
        let client_secret = required_env("REDDIT_CLIENT_SECRET")?;
        let username = required_env("REDDIT_USERNAME")?;
        let password = required_env("REDDIT_PASSWORD")?;
        let subreddit = required_env("REDDIT_SUBREDDIT")?;

        let user_agent = env::var("REDDIT_USER_AGENT")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| {
                format!("floodgate/{} (by /u/{})", env!("CARGO_PKG_VERSION"), username)
            });

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            http,
            credentials: Credentials {
                client_id,
                client_secret,
                username,
                password,
            },
            subreddit,
            token: Mutex::new(None),
        })
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    /// The account the daemon acts as; must appear in the moderator roster.
    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Newest submissions, oldest first, optionally only those newer than
    /// the `before` fullname watermark.
    pub async fn newest_submissions(
        &self,
        before: Option<&str>,
        limit: u32,
    ) -> anyhow::Result<Vec<Submission>> {
        let token = self.ensure_token().await?;

        let mut request = self
            .http
            .get(format!("{API_BASE}/r/{}/new", self.subreddit))
            .bearer_auth(&token)
            .query(&[("limit", limit.to_string())]);
        if let Some(before) = before {
            request = request.query(&[("before", before)]);
        }

        let listing: Listing<SubmissionData> = request
            .send()
            .await
            .context("submission listing request failed")?
            .error_for_status()
            .context("submission listing rejected")?
            .json()
            .await
            .context("failed to decode submission listing")?;

        // The listing is newest-first; the loop wants arrival order.
        let mut submissions: Vec<Submission> = listing
            .data
            .children
            .into_iter()
            .filter_map(|child| {
                let author = child.data.author?;
                Some(Submission {
                    id: child.data.id,
                    author,
                    created_utc: child.data.created_utc as u64,
                })
            })
            .collect();
        submissions.reverse();

        Ok(submissions)
    }

    /// Unread private messages, oldest first.
    pub async fn unread_messages(&self) -> anyhow::Result<Vec<InboxMessage>> {
        let token = self.ensure_token().await?;

        let listing: Listing<MessageData> = self
            .http
            .get(format!("{API_BASE}/message/unread"))
            .bearer_auth(&token)
            .send()
            .await
            .context("unread listing request failed")?
            .error_for_status()
            .context("unread listing rejected")?
            .json()
            .await
            .context("failed to decode unread listing")?;

        let mut messages: Vec<InboxMessage> = listing
            .data
            .children
            .into_iter()
            .filter_map(|child| {
                let sender = child.data.author?;
                Some(InboxMessage {
                    id: child.data.name,
                    sender,
                    subject: child.data.subject,
                    body: child.data.body,
                })
            })
            .collect();
        messages.reverse();

        Ok(messages)
    }

    pub async fn mark_read(&self, message_id: &str) -> anyhow::Result<()> {
        let token = self.ensure_token().await?;

        self.http
            .post(format!("{API_BASE}/api/read_message"))
            .bearer_auth(&token)
            .form(&[("id", message_id)])
            .send()
            .await
            .context("mark-read request failed")?
            .error_for_status()
            .context("mark-read rejected")?;

        Ok(())
    }

    pub async fn reply(&self, message_id: &str, text: &str) -> anyhow::Result<()> {
        let token = self.ensure_token().await?;

        self.http
            .post(format!("{API_BASE}/api/comment"))
            .bearer_auth(&token)
            .form(&[("thing_id", message_id), ("text", text)])
            .send()
            .await
            .context("reply request failed")?
            .error_for_status()
            .context("reply rejected")?;

        Ok(())
    }

    /// Raw markdown body of a subreddit wiki page (the policy document).
    pub async fn wiki_page(&self, page: &str) -> anyhow::Result<String> {
        let token = self.ensure_token().await?;

        let wiki: Thing<WikiPageData> = self
            .http
            .get(format!("{API_BASE}/r/{}/wiki/{page}", self.subreddit))
            .bearer_auth(&token)
            .send()
            .await
            .context("wiki page request failed")?
            .error_for_status()
            .context("wiki page rejected")?
            .json()
            .await
            .context("failed to decode wiki page")?;

        Ok(wiki.data.content_md)
    }

    pub async fn moderators(&self) -> anyhow::Result<Vec<Moderator>> {
        let token = self.ensure_token().await?;

        let roster: UserList = self
            .http
            .get(format!("{API_BASE}/r/{}/about/moderators", self.subreddit))
            .bearer_auth(&token)
            .send()
            .await
            .context("moderator roster request failed")?
            .error_for_status()
            .context("moderator roster rejected")?
            .json()
            .await
            .context("failed to decode moderator roster")?;

        Ok(roster.data.children)
    }

    async fn ensure_token(&self) -> anyhow::Result<String> {
        let mut slot = self.token.lock().await;

        if let Some(token) = slot.as_ref() {
            if now_unix_secs() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("fetching a fresh access token");
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", &self.credentials.username),
                ("password", &self.credentials.password),
            ])
            .send()
            .await
            .context("token request failed")?
            .error_for_status()
            .context("token request rejected")?
            .json()
            .await
            .context("failed to decode token response")?;

        let token = BearerToken {
            access_token: response.access_token,
            expires_at: now_unix_secs() + response.expires_in,
        };
        let access_token = token.access_token.clone();
        *slot = Some(token);

        Ok(access_token)
    }
}

#[async_trait]
impl ModerationActions for RedditClient {
    async fn remove_post(&self, post_id: &str, note: &str) -> anyhow::Result<()> {
        let token = self.ensure_token().await?;
        let id = fullname(post_id);

        self.http
            .post(format!("{API_BASE}/api/remove"))
            .bearer_auth(&token)
            .form(&[("id", id.as_str()), ("spam", "false"), ("mod_note", note)])
            .send()
            .await
            .with_context(|| format!("remove request failed for {id}"))?
            .error_for_status()
            .with_context(|| format!("remove rejected for {id}"))?;

        Ok(())
    }

    async fn report_post(&self, post_id: &str, reason: &str) -> anyhow::Result<()> {
        let token = self.ensure_token().await?;
        let id = fullname(post_id);

        self.http
            .post(format!("{API_BASE}/api/report"))
            .bearer_auth(&token)
            .form(&[("thing_id", id.as_str()), ("reason", reason)])
            .send()
            .await
            .with_context(|| format!("report request failed for {id}"))?
            .error_for_status()
            .with_context(|| format!("report rejected for {id}"))?;

        Ok(())
    }

    async fn send_modmail(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        let token = self.ensure_token().await?;
        let to = format!("/r/{}", self.subreddit);

        self.http
            .post(format!("{API_BASE}/api/compose"))
            .bearer_auth(&token)
            .form(&[("to", to.as_str()), ("subject", subject), ("text", body)])
            .send()
            .await
            .context("modmail request failed")?
            .error_for_status()
            .context("modmail rejected")?;

        Ok(())
    }
}

fn required_env(key: &str) -> anyhow::Result<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .with_context(|| format!("{key} must be set"))
}
