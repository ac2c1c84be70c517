//! HTTP client for the document generation service.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::Config;
use crate::profile::{DocumentType, GenerateRequest, ProfileForm};
use crate::stream::{self, Fragment, TransportError, TransportErrorKind};

/// Standard User-Agent header for penman API requests.
pub const USER_AGENT: &str = concat!("penman/", env!("CARGO_PKG_VERSION"));

/// Envelope returned by the non-streaming endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Client for the generation service.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
}

impl GenerationClient {
    /// Creates a client for `base_url` (endpoints are appended verbatim).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client from the loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.resolve_base_url()?;
        Self::new(base_url, config.api.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Streams a generated document, invoking `on_fragment` once per fragment.
    ///
    /// Never fails: an empty request, a non-success status, a missing body or
    /// any network failure is delivered as one terminal fragment whose
    /// `error` holds a readable message.
    pub async fn generate_stream<F>(&self, request: &GenerateRequest, mut on_fragment: F)
    where
        F: FnMut(Fragment),
    {
        if request.is_empty() {
            let error = TransportError::new(
                TransportErrorKind::EmptyRequest,
                "Request body is empty; fill in the profile first",
            );
            on_fragment(Fragment::failure(error.message));
            return;
        }

        match self.open_stream(request).await {
            Ok(response) => stream::consume(response.bytes_stream(), on_fragment).await,
            Err(error) => {
                warn!(kind = %error.kind, error = %error, "generation request failed");
                on_fragment(Fragment::failure(error.message));
            }
        }
    }

    async fn open_stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}/generate/stream", self.base_url);
        debug!(%url, document_type = %request.document_type, "opening generation stream");

        let response = self
            .http
            .post(&url)
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &body));
        }
        if status == StatusCode::NO_CONTENT {
            return Err(TransportError::new(
                TransportErrorKind::MissingBody,
                "Unable to read the response stream",
            ));
        }

        Ok(response)
    }

    /// Lists the document types the service supports.
    ///
    /// # Errors
    /// Returns a [`TransportError`] on network failure or non-success status.
    pub async fn document_types(&self) -> Result<ApiResponse, TransportError> {
        self.request(Method::GET, "/document-types", None).await
    }

    /// Asks the service to validate a profile.
    ///
    /// # Errors
    /// Returns a [`TransportError`] on network failure or non-success status.
    pub async fn validate(&self, form: &ProfileForm) -> Result<ApiResponse, TransportError> {
        let body = serde_json::to_value(form).map_err(|e| {
            TransportError::new(TransportErrorKind::Parse, format!("encode profile: {e}"))
        })?;
        self.request(Method::POST, "/validate", Some(body)).await
    }

    /// Stores a generated document server-side.
    ///
    /// # Errors
    /// Returns a [`TransportError`] on network failure or non-success status.
    pub async fn save_document(
        &self,
        content: &str,
        form: &ProfileForm,
        document_type: DocumentType,
    ) -> Result<ApiResponse, TransportError> {
        let body = json!({
            "content": content,
            "formData": form,
            "documentType": document_type,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.request(Method::POST, "/documents", Some(body)).await
    }

    /// Lists documents previously saved for a user.
    ///
    /// # Errors
    /// Returns a [`TransportError`] on network failure or non-success status.
    pub async fn user_documents(&self, user_id: &str) -> Result<ApiResponse, TransportError> {
        self.request(Method::GET, &format!("/documents/user/{user_id}"), None)
            .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T, TransportError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, %url, "api request");

        let mut builder = self.http.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = TransportError::http_status(status.as_u16(), &body);
            warn!(%url, error = %error, "api request failed");
            return Err(error);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::{Session, Status};

    fn sample_request() -> GenerateRequest {
        let form = ProfileForm {
            target_university: "ETH Zurich".to_string(),
            career_goals: "Research".to_string(),
            ..ProfileForm::default()
        };
        GenerateRequest::from_profile(&form, DocumentType::PersonalStatement, None)
    }

    fn sse_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(body.to_string())
    }

    async fn run(client: &GenerationClient, request: &GenerateRequest) -> Session {
        let mut session = Session::new();
        let id = session.start();
        client
            .generate_stream(request, |fragment| {
                session.apply(id, fragment);
            })
            .await;
        session
    }

    #[tokio::test]
    async fn test_generate_stream_accumulates_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate/stream"))
            .and(body_partial_json(
                serde_json::json!({"document_type": "personal_statement"}),
            ))
            .respond_with(sse_response(
                "data: {\"content\":\"Hello \"}\n\ndata: {\"content\":\"world\"}\n\ndata: [DONE]\n\n",
            ))
            .mount(&server)
            .await;

        let client = GenerationClient::new(format!("{}/api", server.uri()), None).unwrap();
        let session = run(&client, &sample_request()).await;

        assert_eq!(session.buffer(), "Hello world");
        assert_eq!(session.status(), Status::Completed);
    }

    #[tokio::test]
    async fn test_generate_stream_http_error_is_terminal_fragment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate/stream"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = GenerationClient::new(server.uri(), None).unwrap();
        let mut fragments = Vec::new();
        client
            .generate_stream(&sample_request(), |f| fragments.push(f))
            .await;

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].is_terminal());
        assert_eq!(fragments[0].error_message(), Some("HTTP error! status: 500"));
    }

    #[tokio::test]
    async fn test_generate_stream_no_content_is_missing_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate/stream"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = GenerationClient::new(server.uri(), None).unwrap();
        let mut fragments = Vec::new();
        client
            .generate_stream(&sample_request(), |f| fragments.push(f))
            .await;

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].is_terminal());
        assert_eq!(
            fragments[0].error_message(),
            Some("Unable to read the response stream")
        );
    }

    #[tokio::test]
    async fn test_generate_stream_empty_body_completes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate/stream"))
            .respond_with(sse_response(""))
            .mount(&server)
            .await;

        let client = GenerationClient::new(server.uri(), None).unwrap();
        let mut fragments = Vec::new();
        client
            .generate_stream(&sample_request(), |f| fragments.push(f))
            .await;

        assert_eq!(fragments, vec![Fragment::done()]);

        let session = run(&client, &sample_request()).await;
        assert_eq!(session.status(), Status::Completed);
        assert_eq!(session.buffer(), "");
    }

    #[tokio::test]
    async fn test_generate_stream_connection_failure_is_terminal_fragment() {
        // Nothing listens on port 9 locally.
        let client = GenerationClient::new("http://127.0.0.1:9", None).unwrap();
        let session = run(&client, &sample_request()).await;

        assert_eq!(session.status(), Status::Error);
        assert!(session.last_error().is_some());
        assert_eq!(session.buffer(), "");
    }

    #[tokio::test]
    async fn test_generate_stream_rejects_empty_request() {
        let client = GenerationClient::new("http://127.0.0.1:9", None).unwrap();
        let request = GenerateRequest::from_profile(
            &ProfileForm::default(),
            DocumentType::PersonalStatement,
            None,
        );
        let mut fragments = Vec::new();
        client.generate_stream(&request, |f| fragments.push(f)).await;

        assert_eq!(fragments.len(), 1);
        assert!(
            fragments[0]
                .error_message()
                .is_some_and(|msg| msg.contains("empty"))
        );
    }

    #[tokio::test]
    async fn test_document_types_returns_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/document-types"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": ["personal_statement", "cover_letter"]
            })))
            .mount(&server)
            .await;

        let client = GenerationClient::new(server.uri(), None).unwrap();
        let response = client.document_types().await.unwrap();

        assert!(response.success);
        assert_eq!(response.data.unwrap()[1], "cover_letter");
    }

    #[tokio::test]
    async fn test_save_document_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents"))
            .and(body_partial_json(serde_json::json!({
                "content": "<p>Hi</p>",
                "documentType": "cover_letter"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "saved"
            })))
            .mount(&server)
            .await;

        let client = GenerationClient::new(server.uri(), None).unwrap();
        let response = client
            .save_document("<p>Hi</p>", &ProfileForm::default(), DocumentType::CoverLetter)
            .await
            .unwrap();

        assert_eq!(response.message.as_deref(), Some("saved"));
    }

    #[tokio::test]
    async fn test_user_documents_surfaces_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/user/u1"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"error": "no such user"})),
            )
            .mount(&server)
            .await;

        let client = GenerationClient::new(server.uri(), None).unwrap();
        let err = client.user_documents("u1").await.unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::HttpStatus);
        assert!(err.message.contains("no such user"));
    }
}
