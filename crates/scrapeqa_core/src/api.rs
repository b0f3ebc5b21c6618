//! Request and response bodies exchanged with the retrieval backend.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub urls: Vec<String>,
    /// Ask the backend to render pages in a headless browser before extraction.
    #[serde(rename = "use_playwright")]
    pub use_enhanced_rendering: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScrapeResponse {
    /// Present when the backend allocated (or confirmed) a session for us.
    #[serde(
        default,
        rename = "user_id",
        alias = "session_id",
        alias = "sessionId",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default, alias = "sourceDocuments")]
    pub source_documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UrlList {
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveUrlRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RemoveUrlResponse {
    #[serde(default)]
    pub message: String,
}
