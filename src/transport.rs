//! Remote blob transport: a single versioned JSON document in a shared
//! store, addressed by document id.
//!
//! The transport knows nothing about snapshots or merging; it reads and
//! replaces one document whose content is the reserved envelope
//! `{ "record": { "encrypted": bool, "data": ... } }`.

use serde::{Deserialize, Serialize};

/// Wire form of the remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    pub record: EnvelopeBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeBody {
    pub encrypted: bool,
    pub data: serde_json::Value,
}

impl DocumentEnvelope {
    /// Envelope around an opaque encrypted payload.
    pub fn sealed(opaque: String) -> Self {
        Self {
            record: EnvelopeBody {
                encrypted: true,
                data: serde_json::Value::String(opaque),
            },
        }
    }

    /// Envelope around a plaintext payload.
    pub fn plain(data: serde_json::Value) -> Self {
        Self {
            record: EnvelopeBody {
                encrypted: false,
                data,
            },
        }
    }
}

/// Errors that can occur talking to the remote store.
#[derive(Debug)]
pub enum TransportError {
    /// Connection or protocol failure.
    Http(String),
    /// The server answered with an unexpected status.
    Status(u16),
    /// The response body could not be decoded.
    Decode(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Http(e) => write!(f, "HTTP error: {}", e),
            TransportError::Status(code) => write!(f, "Server returned status {}", code),
            TransportError::Decode(e) => write!(f, "Failed to decode response: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

/// Remote transport collaborator consumed by the engine.
#[allow(async_fn_in_trait)]
pub trait RemoteTransport {
    /// Creates a new document and returns its id.
    async fn create(&self, doc: &DocumentEnvelope) -> Result<String, TransportError>;
    /// Reads a document; `Ok(None)` when it does not exist.
    async fn read(&self, id: &str) -> Result<Option<DocumentEnvelope>, TransportError>;
    /// Replaces the document's content wholesale.
    async fn replace(&self, id: &str, doc: &DocumentEnvelope) -> Result<(), TransportError>;
}

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

/// HTTP implementation: POST to create, GET to read, PATCH to replace,
/// against `<base>/documents[/<id>]` with optional bearer auth.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(&base_url.into()),
            api_key,
        }
    }

    fn documents_url(&self) -> String {
        format!("{}/documents", self.base_url)
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/documents/{}", self.base_url, urlencoding::encode(id))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

impl RemoteTransport for HttpTransport {
    async fn create(&self, doc: &DocumentEnvelope) -> Result<String, TransportError> {
        let response = self
            .authorize(self.client.post(self.documents_url()))
            .json(doc)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(created.id)
    }

    async fn read(&self, id: &str) -> Result<Option<DocumentEnvelope>, TransportError> {
        let response = self
            .authorize(self.client.get(self.document_url(id)))
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        let doc: DocumentEnvelope = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(Some(doc))
    }

    async fn replace(&self, id: &str, doc: &DocumentEnvelope) -> Result<(), TransportError> {
        let response = self
            .authorize(self.client.patch(self.document_url(id)))
            .json(doc)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Normalizes a configured base URL: scheme defaulted to https, trailing
/// slashes trimmed.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
