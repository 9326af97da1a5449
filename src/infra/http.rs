//! reqwest clients for verifier backends and content gateways

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::domain::{
    LatestVerified, RemoteCompilerConfig, SignRequest, SignResponse, SourceUpload,
    SubmissionManifest, VerifyResponse,
};
use crate::telemetry::trace_headers;

use super::traits::{ContentFetcher, FetchedContent, VerifierBackend};
use super::{PortalError, Result};

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PortalError::Configuration(format!("http client: {e}")))
}

fn endpoint(backend: &str, path: &str) -> String {
    format!("{}/{}", backend.trim_end_matches('/'), path)
}

/// Verifier backend over HTTP.
#[derive(Clone)]
pub struct HttpVerifierBackend {
    client: Client,
}

impl HttpVerifierBackend {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn source_form(manifest: &SubmissionManifest, files: &[SourceUpload]) -> Result<Form> {
        let mut form = Form::new();
        for file in files {
            let name = file.field_name();
            form = form.part(
                name.clone(),
                Part::bytes(file.content.clone()).file_name(name),
            );
        }

        let json = serde_json::to_vec(manifest)?;
        let manifest_part = Part::bytes(json)
            .file_name("blob")
            .mime_str("application/json")?;
        Ok(form.part("json", manifest_part))
    }
}

#[async_trait]
impl VerifierBackend for HttpVerifierBackend {
    async fn submit_source(
        &self,
        backend: &str,
        manifest: &SubmissionManifest,
        files: &[SourceUpload],
    ) -> Result<VerifyResponse> {
        let url = endpoint(backend, "source");
        debug!(url = %url, files = files.len(), "Submitting sources");

        let response = self
            .client
            .post(&url)
            .headers(trace_headers())
            .multipart(Self::source_form(manifest, files)?)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::CompileServer {
                backend: backend.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<VerifyResponse>().await?)
    }

    async fn sign(&self, backend: &str, message_cell: &[u8]) -> Result<Vec<u8>> {
        let url = endpoint(backend, "sign");
        let request = SignRequest {
            message_cell: message_cell.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .headers(trace_headers())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::SignServer {
                backend: backend.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<SignResponse>().await?.msg_cell)
    }

    async fn latest_verified(&self, backend: &str) -> Result<Vec<LatestVerified>> {
        let url = endpoint(backend, "latestVerified");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Transport(format!(
                "latestVerified from {backend} returned {status}: {body}"
            )));
        }

        Ok(response.json::<Vec<LatestVerified>>().await?)
    }
}

/// Plain GET fetcher for content gateway mirrors.
#[derive(Clone)]
pub struct HttpContentFetcher {
    client: Client,
}

impl HttpContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn get(&self, url: &str) -> Result<FetchedContent> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(FetchedContent { status, body })
    }
}

/// Download the list of supported compiler versions.
pub async fn fetch_remote_config(client: &Client, url: &str) -> Result<RemoteCompilerConfig> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PortalError::Transport(format!(
            "remote config {url} returned {status}"
        )));
    }
    Ok(response.json::<RemoteCompilerConfig>().await?)
}
