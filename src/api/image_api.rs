use crate::error::GalleryError;
use crate::types::images::{GenerationRequest, GenerationResponse};
use tracing::{error, info};
use url::Url;

/// Stateless image provider endpoints.
pub struct ImageApi;

impl ImageApi {
    /// POST a generation request. Non-2xx responses surface the provider's
    /// status and body unchanged; there is no retry.
    pub async fn generate(
        client: &reqwest::Client,
        endpoint: &Url,
        api_key: impl AsRef<str>,
        body: &GenerationRequest,
    ) -> Result<GenerationResponse, GalleryError> {
        let resp = client
            .post(endpoint.clone())
            .bearer_auth(api_key.as_ref())
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, "image provider rejected generation request");
            return Err(GalleryError::Upstream { status, body });
        }

        let parsed: GenerationResponse = resp.json().await?;
        info!(
            model = %body.model,
            requested = body.n,
            returned = parsed.data.len(),
            "image provider returned generation results"
        );
        Ok(parsed)
    }

    /// GET a remote image and return its body.
    pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, GalleryError> {
        let resp = client.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}
