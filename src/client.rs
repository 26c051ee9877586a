//! Blocking client for the daemon's HTTP API, used by the CLI tools.

use anyhow::bail;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::documents::Document;
use crate::semantic::{BatchIndexResponse, IndexResponse, SearchQuery, SearchResult, Stats};

pub struct ApiClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum WebResponse<T> {
    Error { error: String },
    Data(T),
}

fn parse_response<T>(text: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let web_response = serde_json::from_str::<WebResponse<T>>(text).map_err(|err| {
        log::error!("{err}. tried to parse: {text:?}");
        err
    })?;

    match web_response {
        WebResponse::Data(data) => Ok(data),
        WebResponse::Error { error } => bail!(error),
    }
}

fn handle_response<T>(response: reqwest::blocking::Response) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let text = response.text()?;
    parse_response(&text)
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::blocking::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.strip_suffix('/').unwrap_or(base_url).to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        log::debug!("{}{}", self.base_url, path);
        format!("{}{}", self.base_url, path)
    }

    pub fn index(&self, document: &Document) -> anyhow::Result<IndexResponse> {
        let resp = self.client.post(self.url("/index")).json(document).send()?;
        handle_response(resp)
    }

    pub fn index_batch(&self, documents: &[Document]) -> anyhow::Result<BatchIndexResponse> {
        let resp = self
            .client
            .post(self.url("/index/batch"))
            .json(documents)
            .send()?;
        handle_response(resp)
    }

    pub fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<SearchResult>> {
        let resp = self.client.post(self.url("/search")).json(query).send()?;
        handle_response(resp)
    }

    pub fn stats(&self) -> anyhow::Result<Stats> {
        let resp = self.client.get(self.url("/stats")).send()?;
        handle_response(resp)
    }
}
