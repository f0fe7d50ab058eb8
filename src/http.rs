//! `reqwest`-backed [`Retriever`].

use async_trait::async_trait;
use std::time::Duration;

use crate::traits::{RetrievalError, RetrievalResponse, Retriever};

pub struct HttpRetriever {
    client: reqwest::Client,
}

impl HttpRetriever {
    pub fn new() -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| RetrievalError::Connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<RetrievalResponse, RetrievalError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RetrievalError::Timeout(e.to_string())
            } else {
                RetrievalError::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                RetrievalError::Timeout(e.to_string())
            } else {
                RetrievalError::Body(e.to_string())
            }
        })?;

        Ok(RetrievalResponse {
            status,
            body: body.to_vec(),
        })
    }
}
