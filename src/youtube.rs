use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use image::DynamicImage;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::SearchError;

/// A single search hit, as shown on a result card.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSummary {
  pub id: String,
  pub title: String,
  pub channel_name: String,
  pub thumbnail_url: Option<String>,
  pub published_at: Option<DateTime<Utc>>,
}

/// Parameters for one page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchRequest {
  pub query: String,
  /// Continuation token from the previous page; `None` for the first page.
  pub page_token: Option<String>,
  pub max_results: u32,
  pub region_code: String,
  pub relevance_language: String,
}

/// One page of results plus the cursor for the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
  pub items: Vec<VideoSummary>,
  /// `None` means there are no further pages.
  pub next_page_token: Option<String>,
}

/// Anything that can turn a query into pages of videos.
pub trait VideoSearchProvider: Send + Sync + 'static {
  fn search(&self, request: &SearchRequest) -> impl Future<Output = Result<SearchPage, SearchError>> + Send;
}

// --- YouTube Data API v3 wire types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
  #[serde(default)]
  items: Vec<SearchItem>,
  next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
  id: ItemId,
  snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
  video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
  #[serde(default)]
  title: String,
  #[serde(default)]
  channel_title: String,
  published_at: Option<DateTime<Utc>>,
  #[serde(default)]
  thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
  medium: Option<Thumbnail>,
  high: Option<Thumbnail>,
  #[serde(rename = "default")]
  fallback: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
  url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
  message: String,
}

/// The API returns titles HTML-escaped (`&amp;`, `&#39;`, ...).
fn unescape_html(s: &str) -> String {
  if !s.contains('&') {
    return s.to_string();
  }
  s.replace("&quot;", "\"")
    .replace("&#39;", "'")
    .replace("&apos;", "'")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&amp;", "&")
}

impl SearchItem {
  /// Channel and playlist hits carry no `videoId` and are dropped.
  fn into_summary(self) -> Option<VideoSummary> {
    let id = self.id.video_id.filter(|id| !id.is_empty())?;
    let snippet = self.snippet;
    let (title, channel_name, published_at, thumbnail_url) = match snippet {
      Some(s) => {
        let thumbs = s.thumbnails;
        let url = thumbs.medium.or(thumbs.high).or(thumbs.fallback).map(|t| t.url);
        (unescape_html(&s.title), unescape_html(&s.channel_title), s.published_at, url)
      }
      None => (id.clone(), String::new(), None, None),
    };
    Some(VideoSummary { id, title, channel_name, thumbnail_url, published_at })
  }
}

fn parse_search_page(body: SearchListResponse) -> SearchPage {
  SearchPage {
    items: body.items.into_iter().filter_map(SearchItem::into_summary).collect(),
    next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
  }
}

// --- Client ---

/// Search provider backed by the YouTube Data API `search.list` endpoint.
pub struct YouTubeClient {
  http: Client,
  endpoint: String,
  api_key: Option<String>,
}

impl YouTubeClient {
  pub fn new(settings: &Settings) -> Result<Self> {
    let http = Client::builder()
      .connect_timeout(settings.connect_timeout)
      .timeout(settings.request_timeout)
      .build()
      .context("Failed to build HTTP client")?;
    Ok(Self { http, endpoint: settings.search_endpoint.clone(), api_key: settings.api_key.clone() })
  }

  /// Shared HTTP client, reused for thumbnail downloads.
  pub fn http_client(&self) -> Client {
    self.http.clone()
  }

  fn request_url(&self, api_key: &str, request: &SearchRequest) -> Result<Url, SearchError> {
    let mut params: Vec<(&str, String)> = vec![
      ("part", "snippet".to_string()),
      ("type", "video".to_string()),
      ("q", request.query.clone()),
      ("maxResults", request.max_results.to_string()),
      ("regionCode", request.region_code.clone()),
      ("relevanceLanguage", request.relevance_language.clone()),
      ("key", api_key.to_string()),
    ];
    if let Some(token) = &request.page_token {
      params.push(("pageToken", token.clone()));
    }
    Url::parse_with_params(&self.endpoint, &params)
      .map_err(|e| SearchError::Network(format!("invalid search endpoint '{}': {}", self.endpoint, e)))
  }
}

impl VideoSearchProvider for YouTubeClient {
  async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchError> {
    let Some(api_key) = self.api_key.as_deref() else {
      return Err(SearchError::MissingApiKey);
    };
    // The URL carries the key, so only the query is logged.
    let url = self.request_url(api_key, request)?;
    debug!(query = %request.query, page_token = ?request.page_token, "youtube: search request");

    let response = self.http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
      warn!(status = status.as_u16(), message = %message, "youtube: search rejected");
      return Err(SearchError::Status { status: status.as_u16(), message });
    }

    let body: SearchListResponse = response.json().await.map_err(|e| SearchError::Decode(e.to_string()))?;
    let page = parse_search_page(body);
    info!(
      query = %request.query,
      items = page.items.len(),
      has_more = page.next_page_token.is_some(),
      "youtube: search page received"
    );
    Ok(page)
  }
}

/// Candidate thumbnail URLs for a video, best first.
fn thumbnail_urls(video: &VideoSummary) -> Vec<String> {
  let mut urls = Vec::with_capacity(3);
  if let Some(url) = &video.thumbnail_url {
    urls.push(url.clone());
  }
  urls.push(format!("https://img.youtube.com/vi/{}/mqdefault.jpg", video.id));
  urls.push(format!("https://img.youtube.com/vi/{}/0.jpg", video.id));
  urls
}

pub async fn fetch_thumbnail(client: &Client, video: &VideoSummary) -> Result<DynamicImage> {
  for url in thumbnail_urls(video) {
    if let Ok(response) = client.get(&url).send().await
      && response.status().is_success()
    {
      let image_bytes = response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?;
      let image = image::load_from_memory(&image_bytes)
        .with_context(|| format!("Failed to decode image from memory (URL: {})", url))?;
      return Ok(image);
    }
  }
  Err(anyhow!("Failed to fetch any thumbnail for video ID: {}", video.id))
}
