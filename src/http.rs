//! Outbound HTTP seam. Adapters and the media store only ever talk to
//! [`HttpClient`], so tests can swap in canned responses.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::HttpError;

pub const DEFAULT_USER_AGENT: &str = "feed-importer/0.1";

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, opts: &RequestOptions) -> Result<HttpResponse, HttpError>;
}

/// Production client backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, opts: &RequestOptions) -> Result<HttpResponse, HttpError> {
        let mut req = self.client.get(url).timeout(opts.timeout);
        for (name, value) in &opts.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                HttpError::Timeout(opts.timeout)
            } else {
                HttpError::Transport(e.to_string())
            }
        };

        let resp = req.send().await.map_err(map_err)?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await.map_err(map_err)?.to_vec();

        tracing::debug!(target: "http", url, status, bytes = body.len(), "GET");

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
