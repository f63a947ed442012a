use std::time::Duration;

use async_trait::async_trait;

use crate::api::{Reply, Transport};
use crate::error::FanoutResult;

/// reqwest-backed transport talking JSON to the backend with a bearer token.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>, timeout: Duration) -> FanoutResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            access_token: access_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        self.base_url.clone() + path
    }

    async fn read(response: reqwest::Response) -> FanoutResult<Reply> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Reply { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> FanoutResult<Reply> {
        let response = self.client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> FanoutResult<Reply> {
        let response = self.client
            .post(self.url(path))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }
}
