//! Thin HTTP wrapper over the Sanity data API: query, mutate, listen,
//! and asset upload. Higher layers never build URLs or touch `reqwest`
//! directly.

use std::pin::Pin;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use audiofast_core::events::{ListenEvent, MutationEvent};
use audiofast_core::mutation::{MutationResponse, Transaction};
use audiofast_groq::BuiltQuery;

use crate::config::SanityConfig;
use crate::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SanityClient {
    http: reqwest::Client,
    config: SanityConfig,
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    document: AssetDocument,
}

#[derive(Debug, Deserialize)]
struct AssetDocument {
    #[serde(rename = "_id")]
    id: String,
}

impl SanityClient {
    pub fn new(config: SanityConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SanityConfig {
        &self.config
    }

    fn data_url(&self, endpoint: &str) -> String {
        format!(
            "{}/data/{}/{}",
            self.config.base_url(),
            endpoint,
            self.config.dataset
        )
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Run a GROQ query with bound parameters and decode `result`.
    pub async fn query<T: DeserializeOwned>(
        &self,
        groq: &str,
        params: &Map<String, Value>,
    ) -> Result<T, ClientError> {
        let body = serde_json::json!({ "query": groq, "params": params });
        let response = self
            .auth(self.http.post(self.data_url("query")))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::from_response(status.as_u16(), &text));
        }
        let envelope: QueryResponse<T> = serde_json::from_str(&text)?;
        Ok(envelope.result)
    }

    pub async fn query_built<T: DeserializeOwned>(
        &self,
        built: BuiltQuery,
    ) -> Result<T, ClientError> {
        self.query(&built.groq, &built.params).await
    }

    /// Commit a transaction atomically. `visibility=sync` so subsequent
    /// queries observe the result; `returnIds` for per-document results.
    pub async fn mutate(&self, tx: Transaction) -> Result<MutationResponse, ClientError> {
        if !self.config.can_write() {
            return Err(ClientError::MissingToken);
        }
        let url = format!("{}?returnIds=true&visibility=sync", self.data_url("mutate"));
        let body = serde_json::json!({ "mutations": tx.into_mutations() });
        let response = self.auth(self.http.post(url)).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::from_response(status.as_u16(), &text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Open a listen subscription for the given query. The returned
    /// stream yields typed events until the server closes the channel.
    pub async fn listen(
        &self,
        groq: &str,
        params: &Map<String, Value>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<ListenEvent, ClientError>> + Send>>, ClientError>
    {
        let mut request = self
            .http
            .get(self.data_url("listen"))
            .query(&[("query", groq), ("includeResult", "false")]);
        for (name, value) in params {
            request = request.query(&[(format!("${name}"), serde_json::to_string(value)?)]);
        }

        let response = self.auth(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(ClientError::from_response(status.as_u16(), &text));
        }

        let events = response.bytes_stream().eventsource().filter_map(|item| async move {
            match item {
                Ok(event) => match event.event.as_str() {
                    "welcome" => Some(Ok(ListenEvent::Welcome)),
                    "reconnect" => Some(Ok(ListenEvent::Reconnect)),
                    "disconnect" => Some(Ok(ListenEvent::Disconnect)),
                    "mutation" => Some(
                        serde_json::from_str::<MutationEvent>(&event.data)
                            .map(ListenEvent::Mutation)
                            .map_err(ClientError::Decode),
                    ),
                    // Keep-alives and unknown event types are skipped.
                    _ => None,
                },
                Err(e) => Some(Err(ClientError::Listen(e.to_string()))),
            }
        });

        Ok(Box::pin(events))
    }

    /// Upload an image asset; returns the asset document ID.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, ClientError> {
        self.upload_asset("images", bytes, filename, content_type)
            .await
    }

    /// Upload a file asset (PDFs and other binaries).
    pub async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, ClientError> {
        self.upload_asset("files", bytes, filename, content_type)
            .await
    }

    async fn upload_asset(
        &self,
        kind: &str,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, ClientError> {
        if !self.config.can_write() {
            return Err(ClientError::MissingToken);
        }
        let url = format!(
            "{}/assets/{}/{}",
            self.config.base_url(),
            kind,
            self.config.dataset
        );
        let response = self
            .auth(self.http.post(url))
            .query(&[("filename", filename)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::from_response(status.as_u16(), &text));
        }
        let envelope: AssetResponse = serde_json::from_str(&text)?;
        Ok(envelope.document.id)
    }
}
