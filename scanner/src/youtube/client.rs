use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};

use crate::{
    comment::RawComment,
    error::{AppError, AppResult},
    pipeline::{CommentSource, SourcePage},
    HttpClient,
};

use super::types::{CommentSnippet, CommentThreadListResponse, VideoListResponse, VideoMeta};

/// commentThreads.list refuses anything above this.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct YoutubeClient {
    http_client: HttpClient,
    api_base: String,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(http_client: HttpClient, api_base: &str, api_key: &str) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn list_comment_threads(
        &self,
        video_id: &str,
        page_token: Option<&str>,
        max_results: usize,
    ) -> AppResult<CommentThreadListResponse> {
        let max_results = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("videoId", video_id),
            ("maxResults", max_results.as_str()),
            ("order", "relevance"),
            ("textFormat", "html"),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let resp = self
            .http_client
            .get(format!("{}/commentThreads", self.api_base))
            .query(&query)
            .send()
            .await
            .map_err(AppError::source)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("commentThreads.list failed with HTTP {}: {}", status, body);
            return Err(AppError::SourceUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        resp.json::<CommentThreadListResponse>()
            .await
            .map_err(AppError::source)
    }

    /// Metadata only decorates the report, so any failure is logged and swallowed.
    pub async fn get_video_meta(&self, video_id: &str) -> Option<VideoMeta> {
        let resp = self
            .http_client
            .get(format!("{}/videos", self.api_base))
            .query(&[
                ("part", "snippet,statistics"),
                ("id", video_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await;

        let resp = match resp {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!("videos.list for {} returned HTTP {}", video_id, resp.status());
                return None;
            }
            Err(e) => {
                tracing::warn!("videos.list for {} failed: {}", video_id, e);
                return None;
            }
        };

        match resp.json::<VideoListResponse>().await {
            Ok(list) => list.items.into_iter().next().map(VideoMeta::from),
            Err(e) => {
                tracing::warn!("Could not parse videos.list response: {}", e);
                None
            }
        }
    }

    pub fn comment_source(&self, video_id: &str) -> VideoCommentSource {
        VideoCommentSource {
            client: self.clone(),
            video_id: video_id.to_string(),
        }
    }
}

/// Top-level comments of one video, ordered by relevance.
#[derive(Clone)]
pub struct VideoCommentSource {
    client: YoutubeClient,
    video_id: String,
}

#[async_trait]
impl CommentSource for VideoCommentSource {
    async fn next_page(&self, cursor: Option<&str>, page_size: usize) -> AppResult<SourcePage> {
        let resp = self
            .client
            .list_comment_threads(&self.video_id, cursor, page_size)
            .await?;

        let items = resp
            .items
            .into_iter()
            .map(|thread| raw_comment(thread.snippet.top_level_comment.snippet))
            .collect();

        Ok(SourcePage {
            items,
            next_cursor: resp.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

fn raw_comment(snippet: CommentSnippet) -> RawComment {
    RawComment {
        published_date: parse_published_date(&snippet.published_at),
        author: snippet.author_display_name,
        text: snippet.text_display,
        like_count: snippet.like_count,
    }
}

/// `publishedAt` is RFC 3339; fall back to its leading `YYYY-MM-DD`.
fn parse_published_date(published_at: &str) -> NaiveDate {
    DateTime::parse_from_rfc3339(published_at)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            published_at
                .get(..10)
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        })
        .unwrap_or_else(|| {
            tracing::warn!("Unparseable publishedAt '{}'", published_at);
            NaiveDate::default()
        })
}
