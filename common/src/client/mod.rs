//! Async access to a paste service.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::instrument;
use url::Url;

use crate::error::{BaseUrlError, ServiceError};
use crate::{CreatePaste, CreatedPaste, ErrorBody, PasteView, PASTES_PATH};

pub use session::{Event, Session};
pub use submit::submit;

mod session;
mod submit;

/// The two calls the client makes. `fetch` consumes a view on success.
#[async_trait(?Send)]
pub trait PasteService {
    async fn create(&self, request: &CreatePaste) -> Result<CreatedPaste, ServiceError>;
    async fn fetch(&self, id: &str) -> Result<PasteView, ServiceError>;
}

/// [`PasteService`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpService {
    client: Client,
    api: Url,
}

impl HttpService {
    /// # Errors
    ///
    /// Fails if the API URL cannot carry a path.
    pub fn new(api: Url) -> Result<Self, BaseUrlError> {
        if api.cannot_be_a_base() {
            return Err(BaseUrlError(api));
        }

        Ok(Self {
            client: Client::new(),
            api,
        })
    }

    fn endpoint(&self, id: Option<&str>) -> Url {
        let mut url = self.api.clone();
        // Checked for in the constructor
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(PASTES_PATH).extend(id);
        }
        url
    }
}

#[async_trait(?Send)]
impl PasteService for HttpService {
    #[instrument(skip(self, request), fields(api = %self.api), err)]
    async fn create(&self, request: &CreatePaste) -> Result<CreatedPaste, ServiceError> {
        let res = self
            .client
            .post(self.endpoint(None))
            .json(request)
            .send()
            .await
            .map_err(network)?;

        let status = res.status();
        let body = res.text().await.map_err(network)?;

        if !status.is_success() {
            return Err(from_response(status, &body));
        }

        // Anything unparseable is reported as a missing identifier upstream.
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    #[instrument(skip(self), fields(api = %self.api), err)]
    async fn fetch(&self, id: &str) -> Result<PasteView, ServiceError> {
        let res = self
            .client
            .get(self.endpoint(Some(id)))
            .send()
            .await
            .map_err(network)?;

        let status = res.status();
        let body = res.text().await.map_err(network)?;

        if status == StatusCode::NOT_FOUND {
            let ErrorBody { message, .. } = serde_json::from_str(&body).unwrap_or_default();
            return Err(ServiceError::NotFound { message });
        }

        if !status.is_success() {
            return Err(from_response(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[allow(clippy::needless_pass_by_value)]
fn network(e: reqwest::Error) -> ServiceError {
    ServiceError::Network(e.to_string())
}

fn from_response(status: StatusCode, body: &str) -> ServiceError {
    let ErrorBody { error, message, .. } = serde_json::from_str(body).unwrap_or_default();
    ServiceError::Status {
        status: status.as_u16(),
        error,
        message,
        body: body.to_owned(),
    }
}
