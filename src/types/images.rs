use serde::{Deserialize, Serialize};

/// Body of a generation request sent to the image provider.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// Provider response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub data: Vec<GeneratedItem>,
}

/// One generated image. Either field may be absent or empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedItem {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}
