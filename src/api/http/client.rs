use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, Response};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    api::{
        ApiResult, SessionApi,
        models::{
            AnswerRequest, ChallengeEntity, ChallengeRequest, ErrorBody, JoinRequest,
            SessionEntity,
        },
    },
    state::session::{Challenge, ChallengeDraft, Session, TeamColor},
};

use super::{
    config::HttpApiConfig,
    error::{HttpApiError, HttpResult},
};

/// [`SessionApi`] implementation speaking JSON over HTTP to the game server.
#[derive(Clone)]
pub struct HttpSessionApi {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl HttpSessionApi {
    /// Build the HTTP client. No request is sent until the first call.
    pub fn new(config: HttpApiConfig) -> HttpResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| HttpApiError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            token: config.token.map(Arc::from),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> HttpResult<Response> {
        debug!(%method, path, "sending session API request");
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| HttpApiError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| status.to_string());
        Err(HttpApiError::RequestStatus {
            path: path.to_string(),
            status,
            message,
        })
    }

    async fn fetch<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> HttpResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| HttpApiError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> HttpResult<()> {
        self.send(method, path, body).await.map(|_| ())
    }
}

/// Placeholder body type for requests without a payload.
const NO_BODY: Option<&()> = None;

impl SessionApi for HttpSessionApi {
    fn create_session(&self) -> BoxFuture<'static, ApiResult<Session>> {
        let api = self.clone();
        Box::pin(async move {
            let entity: SessionEntity = api.fetch(Method::POST, "sessions", NO_BODY).await?;
            Ok(entity.into())
        })
    }

    fn join_session(&self, session_id: &str, team: TeamColor) -> BoxFuture<'static, ApiResult<()>> {
        let api = self.clone();
        let path = format!("sessions/{session_id}/join");
        Box::pin(async move {
            let body = JoinRequest { team: team.into() };
            api.execute(Method::POST, &path, Some(&body)).await?;
            Ok(())
        })
    }

    fn leave_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let api = self.clone();
        let path = format!("sessions/{session_id}/leave");
        Box::pin(async move {
            api.execute(Method::POST, &path, NO_BODY).await?;
            Ok(())
        })
    }

    fn get_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<Session>> {
        let api = self.clone();
        let path = format!("sessions/{session_id}");
        Box::pin(async move {
            let entity: SessionEntity = api.fetch(Method::GET, &path, NO_BODY).await?;
            Ok(entity.into())
        })
    }

    fn start_session(&self, session_id: &str) -> BoxFuture<'static, ApiResult<()>> {
        let api = self.clone();
        let path = format!("sessions/{session_id}/start");
        Box::pin(async move {
            api.execute(Method::POST, &path, NO_BODY).await?;
            Ok(())
        })
    }

    fn list_challenges(&self, session_id: &str) -> BoxFuture<'static, ApiResult<Vec<Challenge>>> {
        let api = self.clone();
        let path = format!("sessions/{session_id}/challenges");
        Box::pin(async move {
            let entities: Vec<ChallengeEntity> = api.fetch(Method::GET, &path, NO_BODY).await?;
            Ok(entities.into_iter().map(Into::into).collect())
        })
    }

    fn send_challenge(
        &self,
        session_id: &str,
        draft: ChallengeDraft,
    ) -> BoxFuture<'static, ApiResult<Challenge>> {
        let api = self.clone();
        let path = format!("sessions/{session_id}/challenges");
        Box::pin(async move {
            let body = ChallengeRequest {
                target_words: draft.target_words,
                forbidden_words: draft.forbidden_words,
            };
            let entity: ChallengeEntity = api.fetch(Method::POST, &path, Some(&body)).await?;
            Ok(entity.into())
        })
    }

    fn answer_challenge(
        &self,
        session_id: &str,
        challenge_id: &str,
        answer: &str,
        is_correct: bool,
    ) -> BoxFuture<'static, ApiResult<()>> {
        let api = self.clone();
        let path = format!("sessions/{session_id}/challenges/{challenge_id}/answer");
        let body = AnswerRequest {
            answer: answer.to_string(),
            is_correct,
        };
        Box::pin(async move {
            api.execute(Method::POST, &path, Some(&body)).await?;
            Ok(())
        })
    }
}
