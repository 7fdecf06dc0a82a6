use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// One timestamped summary returned by `/sections`.
///
/// The backend reports failures in-band as `[{"error": "..."}]`, so every
/// field besides `error` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Section {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualResult {
    pub timestamp: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

// `/visual-search` answers `{}` when no frame matched.
#[derive(Debug, Deserialize)]
struct RawVisualResult {
    timestamp: Option<f64>,
    description: Option<String>,
    score: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SectionsRequest<'a> {
    video_url: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Serialize)]
struct QuestionRequest<'a> {
    video_url: &'a str,
    question: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Serialize)]
struct VisualSearchRequest<'a> {
    video_url: &'a str,
    query: &'a str,
    api_key: &'a str,
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_sections(&self, video_url: &str, api_key: &str) -> Result<Vec<Section>> {
        info!(video_url, "requesting sections");
        let body = self
            .post("/sections", &SectionsRequest { video_url, api_key })
            .await?;
        parse_sections(&body)
    }

    /// Returns the raw answer body; callers run it through the annotator.
    pub async fn ask_question(
        &self,
        video_url: &str,
        question: &str,
        api_key: &str,
    ) -> Result<String> {
        info!(video_url, "asking question");
        self.post(
            "/question",
            &QuestionRequest {
                video_url,
                question,
                api_key,
            },
        )
        .await
    }

    pub async fn visual_search(
        &self,
        video_url: &str,
        query: &str,
        api_key: &str,
    ) -> Result<Option<VisualResult>> {
        info!(video_url, query, "running visual search");
        let body = self
            .post(
                "/visual-search",
                &VisualSearchRequest {
                    video_url,
                    query,
                    api_key,
                },
            )
            .await?;
        parse_visual_result(&body)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<String> {
        let endpoint = format!("{}{path}", self.base_url);

        let resp = self.client.post(&endpoint).json(payload).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!(%endpoint, status = status.as_u16(), bytes = body.len(), "backend response");

        if !status.is_success() {
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

pub fn parse_sections(body: &str) -> Result<Vec<Section>> {
    Ok(serde_json::from_str(body)?)
}

pub fn parse_visual_result(body: &str) -> Result<Option<VisualResult>> {
    if body.trim().is_empty() || body.trim() == "null" {
        return Ok(None);
    }
    let raw: RawVisualResult = serde_json::from_str(body)?;
    Ok(match (raw.timestamp, raw.description) {
        (Some(timestamp), Some(description)) => Some(VisualResult {
            timestamp,
            description,
            score: raw.score,
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, Duration::from_secs(5)).expect("client")
    }

    #[test]
    fn sections_parse_with_link_and_error_rows() {
        let sections = parse_sections(
            r#"[{"start":"00:00","end":"01:18","summary":"Intro","link":"https://x&t=0s"},{"error":"quota"}]"#,
        )
        .expect("valid json");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].summary, "Intro");
        assert!(!sections[0].is_error());
        assert_eq!(sections[1].error.as_deref(), Some("quota"));
        assert!(sections[1].is_error());
    }

    #[test]
    fn empty_visual_result_is_none() {
        assert_eq!(parse_visual_result("{}").expect("valid"), None);
        assert_eq!(parse_visual_result("null").expect("valid"), None);

        let result = parse_visual_result(r#"{"timestamp":45,"description":"a red car"}"#)
            .expect("valid")
            .expect("some result");
        assert_eq!(result.timestamp, 45.0);
        assert_eq!(result.score, None);
    }

    #[tokio::test]
    async fn posts_contract_bodies() {
        let router = Router::new()
            .route(
                "/sections",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["video_url"], "https://www.youtube.com/watch?v=abc");
                    assert_eq!(body["api_key"], "secret");
                    Json(json!([{"start": "00:00", "end": "00:30", "summary": "Hello"}]))
                }),
            )
            .route(
                "/question",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["question"], "what happens?");
                    assert_eq!(body["api_key"], "secret");
                    Json(json!("At 00:30 things happen"))
                }),
            )
            .route(
                "/visual-search",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["query"], "a dog");
                    Json(json!({"timestamp": 30, "description": "dog", "score": 0.8}))
                }),
            );
        let base = spawn_backend(router).await;
        let backend = client(&base);
        let url = "https://www.youtube.com/watch?v=abc";

        let sections = backend.fetch_sections(url, "secret").await.expect("sections");
        assert_eq!(sections[0].summary, "Hello");

        let answer = backend
            .ask_question(url, "what happens?", "secret")
            .await
            .expect("answer");
        assert_eq!(answer, r#""At 00:30 things happen""#);

        let visual = backend
            .visual_search(url, "a dog", "secret")
            .await
            .expect("visual")
            .expect("match");
        assert_eq!(visual.description, "dog");
        assert_eq!(visual.score, Some(0.8));
    }

    #[tokio::test]
    async fn non_success_status_is_backend_error() {
        let router = Router::new().route(
            "/sections",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_backend(router).await;

        let err = client(&base)
            .fetch_sections("https://www.youtube.com/watch?v=abc", "k")
            .await
            .expect_err("should fail");
        assert!(matches!(err, Error::Backend { status: 500, ref body } if body == "boom"));
    }

    #[tokio::test]
    async fn trailing_slash_is_trimmed() {
        assert_eq!(client("http://localhost:8000/").base_url(), "http://localhost:8000");
    }
}
