use anyhow::{Context, Result, bail};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde_json::json;

use crate::api::auth::Signer;
use crate::workflow::intake::{Catalog, CatalogResponse, RegisteredMedia};

/// Adstream A5 media API.
pub struct AdstreamClient {
    http: Client,
    base_url: String,
    signer: Signer,
    subtype: String,
}

impl AdstreamClient {
    pub fn new(http: Client, base_url: &str, signer: Signer, subtype: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            subtype: subtype.into(),
        }
    }

    fn media_url(&self, folder_id: &str) -> String {
        format!("{}/folders/{}/media", self.base_url, folder_id)
    }
}

impl Catalog for AdstreamClient {
    fn register(&self, folder_id: &str, file_name: &str) -> Result<Vec<RegisteredMedia>> {
        let url = self.media_url(folder_id);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.signer.authorization()?)
            .json(&json!({ "filename": file_name }))
            .send()
            .with_context(|| format!("register request to {} failed", url))?;

        let status = response.status();
        let text = response.text()?;
        info!("MEDIA REGISTER RESPONSE ({}): {}", status, text);
        if !status.is_success() {
            bail!("register returned {}: {}", status, text);
        }
        serde_json::from_str(&text)
            .with_context(|| format!("unexpected register response: {}", text))
    }

    fn upload(&self, upload_target: &str, bytes: Vec<u8>) -> Result<u16> {
        // Pre-signed target: no Authorization header
        let response = self
            .http
            .put(upload_target)
            .body(bytes)
            .send()
            .context("media upload request failed")?;
        debug!("MEDIA UPLOAD HEADERS: {:?}", response.headers());
        Ok(response.status().as_u16())
    }

    fn finalize(
        &self,
        folder_id: &str,
        resource_id: &str,
        file_name: &str,
    ) -> Result<CatalogResponse> {
        let url = format!("{}/{}", self.media_url(folder_id), resource_id);
        let body = json!({
            "meta": { "common": { "name": file_name } },
            "subtype": self.subtype,
        });
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.signer.authorization()?)
            .query(&[("fileId", resource_id), ("folderId", folder_id)])
            .json(&body)
            .send()
            .with_context(|| format!("media complete request to {} failed", url))?;

        let status = response.status().as_u16();
        let text = response.text()?;
        info!("MEDIA COMPLETE RESPONSE ({}): {}", status, text);
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Ok(CatalogResponse { status, body })
    }
}
