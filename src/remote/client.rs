//! HTTP client for the remote document store

use async_trait::async_trait;
use serde_json::{json, Value};

use super::RemoteStore;
use crate::error::{Result, SyncError};
use crate::types::{Block, RemotePage};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";

/// HTTP implementation of [`RemoteStore`]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Create a client against the default API endpoint
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client against a custom endpoint
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
        context: &str,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.token));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        match status.as_u16() {
            401 | 403 => Err(SyncError::Auth(format!(
                "{}: API returned {}",
                context, status
            ))),
            404 => Err(SyncError::NotFound(context.to_string())),
            429 => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1);
                Err(SyncError::RateLimited(retry_after))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(SyncError::Remote(format!(
                    "{}: API error {}: {}",
                    context, status, text
                )))
            }
        }
    }

    /// List all block children of a page, following pagination cursors
    async fn list_children(&self, id: &str) -> Result<Vec<Value>> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let path = match &cursor {
                Some(c) => format!("/v1/blocks/{}/children?start_cursor={}", id, c),
                None => format!("/v1/blocks/{}/children", id),
            };
            let data = self
                .request(reqwest::Method::GET, &path, None, id)
                .await?;

            if let Some(page) = data["results"].as_array() {
                results.extend(page.iter().cloned());
            }

            match data["next_cursor"].as_str() {
                Some(next) if data["has_more"].as_bool().unwrap_or(false) => {
                    cursor = Some(next.to_string());
                }
                _ => break,
            }
        }

        Ok(results)
    }
}

#[async_trait]
impl RemoteStore for ApiClient {
    async fn get_page(&self, id: &str) -> Result<RemotePage> {
        let page = self
            .request(
                reqwest::Method::GET,
                &format!("/v1/pages/{}", id),
                None,
                id,
            )
            .await?;
        let children = self.list_children(id).await?;

        Ok(RemotePage {
            id: id.to_string(),
            title: parse_title(&page),
            children: children.iter().map(parse_block).collect(),
        })
    }

    async fn replace_children(&self, id: &str, blocks: &[Block]) -> Result<()> {
        // Two-step replace: the API has no atomic swap, so a failure between
        // the deletes and the append leaves the page with fewer blocks than
        // either the old or the new state.
        let existing = self.list_children(id).await?;
        for child in &existing {
            if let Some(child_id) = child["id"].as_str() {
                self.request(
                    reqwest::Method::DELETE,
                    &format!("/v1/blocks/{}", child_id),
                    None,
                    child_id,
                )
                .await?;
            }
        }

        let children: Vec<Value> = blocks.iter().filter_map(block_to_json).collect();
        if !children.is_empty() {
            self.request(
                reqwest::Method::PATCH,
                &format!("/v1/blocks/{}/children", id),
                Some(json!({ "children": children })),
                id,
            )
            .await?;
        }

        Ok(())
    }
}

/// Extract the page title from its `title`-type property
fn parse_title(page: &Value) -> String {
    let properties = &page["properties"];
    let title_prop = if properties["title"].is_object() {
        Some(&properties["title"])
    } else {
        // Databases name the title property arbitrarily; find it by type
        properties
            .as_object()
            .and_then(|props| props.values().find(|p| p["type"] == "title"))
    };

    title_prop
        .and_then(|p| p["title"][0]["plain_text"].as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

fn parse_rich_text(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|spans| {
            spans
                .iter()
                .filter_map(|s| s["plain_text"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a wire block object into a [`Block`]
pub(crate) fn parse_block(value: &Value) -> Block {
    let block_type = value["type"].as_str().unwrap_or_default();
    let payload = &value[block_type];

    match block_type {
        "paragraph" => Block::Paragraph {
            rich_text: parse_rich_text(&payload["rich_text"]),
        },
        "heading_1" | "heading_2" | "heading_3" => Block::Heading {
            level: block_type.as_bytes()[8] - b'0',
            rich_text: parse_rich_text(&payload["rich_text"]),
        },
        "bulleted_list_item" => Block::BulletedListItem {
            rich_text: parse_rich_text(&payload["rich_text"]),
        },
        "numbered_list_item" => Block::NumberedListItem {
            rich_text: parse_rich_text(&payload["rich_text"]),
        },
        "code" => Block::Code {
            language: payload["language"].as_str().unwrap_or_default().to_string(),
            rich_text: parse_rich_text(&payload["rich_text"]),
        },
        "image" => Block::Image {
            caption: parse_rich_text(&payload["caption"]),
            url: payload["file"]["url"]
                .as_str()
                .or_else(|| payload["external"]["url"].as_str())
                .unwrap_or_default()
                .to_string(),
        },
        "child_page" => Block::ChildPage {
            id: value["id"].as_str().unwrap_or_default().to_string(),
            title: payload["title"].as_str().unwrap_or_default().to_string(),
        },
        _ => Block::Unsupported { raw: value.clone() },
    }
}

fn rich_text_to_json(spans: &[String]) -> Value {
    Value::Array(
        spans
            .iter()
            .map(|s| json!({ "type": "text", "text": { "content": s } }))
            .collect(),
    )
}

/// Serialize a [`Block`] into its wire form. Child-page references and
/// unsupported blocks are not writable and yield `None`.
pub(crate) fn block_to_json(block: &Block) -> Option<Value> {
    match block {
        Block::Paragraph { rich_text } => Some(json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": { "rich_text": rich_text_to_json(rich_text) },
        })),
        Block::Heading { level, rich_text } => {
            let kind = format!("heading_{}", (*level).clamp(1, 3));
            let mut obj = serde_json::Map::new();
            obj.insert("object".to_string(), json!("block"));
            obj.insert("type".to_string(), json!(kind));
            obj.insert(
                kind,
                json!({ "rich_text": rich_text_to_json(rich_text) }),
            );
            Some(Value::Object(obj))
        }
        Block::BulletedListItem { rich_text } => Some(json!({
            "object": "block",
            "type": "bulleted_list_item",
            "bulleted_list_item": { "rich_text": rich_text_to_json(rich_text) },
        })),
        Block::NumberedListItem { rich_text } => Some(json!({
            "object": "block",
            "type": "numbered_list_item",
            "numbered_list_item": { "rich_text": rich_text_to_json(rich_text) },
        })),
        Block::Code {
            language,
            rich_text,
        } => Some(json!({
            "object": "block",
            "type": "code",
            "code": {
                "language": language,
                "rich_text": rich_text_to_json(rich_text),
            },
        })),
        Block::Image { caption, url } => Some(json!({
            "object": "block",
            "type": "image",
            "image": {
                "caption": rich_text_to_json(caption),
                "external": { "url": url },
            },
        })),
        Block::ChildPage { .. } | Block::Unsupported { .. } => None,
    }
}
