use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use quiz_core::model::SessionId;

use super::{
    ScoreResult, ScoringService, SessionStarter, StartRequest, StartedSession, SubmitRequest,
};
use crate::config::ApiConfig;
use crate::error::ApiError;

/// `reqwest` client for the remote quiz service.
#[derive(Clone, Debug)]
pub struct HttpQuizApi {
    client: Client,
    config: ApiConfig,
}

impl HttpQuizApi {
    /// Build a client honoring the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the underlying client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.config.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl SessionStarter for HttpQuizApi {
    #[instrument(skip(self, request), fields(kind = ?request.kind))]
    async fn start(&self, request: &StartRequest) -> Result<StartedSession, ApiError> {
        let url = self.endpoint(&["sessions"])?;
        let response = self
            .authorize(self.client.post(url))
            .json(request)
            .send()
            .await?;
        let started: StartedSession = decode(response).await?;
        tracing::info!(
            session_id = %started.session_id,
            questions = started.questions.len(),
            "session started"
        );
        Ok(started)
    }
}

#[async_trait]
impl ScoringService for HttpQuizApi {
    #[instrument(
        skip(self, request),
        fields(session_id = %session_id, answers = request.answers.len())
    )]
    async fn submit(
        &self,
        session_id: &SessionId,
        request: &SubmitRequest,
    ) -> Result<ScoreResult, ApiError> {
        let url = self.endpoint(&["sessions", session_id.as_str(), "submit"])?;
        let response = self
            .authorize(self.client.post(url))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        let body = response.bytes().await?;
        return serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .or_else(|| Some(text.trim().to_owned()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned()
        });

    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_segments_and_escapes_ids() {
        let api = HttpQuizApi::new(ApiConfig::new("http://localhost:9000/api/").unwrap()).unwrap();
        let url = api.endpoint(&["sessions", "a b/c", "submit"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/sessions/a%20b%2Fc/submit");

        let api = HttpQuizApi::new(ApiConfig::new("http://localhost:9000").unwrap()).unwrap();
        let url = api.endpoint(&["sessions"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/sessions");
    }
}
