use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use folio_shared::errors::ErrorBody;

use crate::models::{
    ContactForm, ContactReceipt, NewProjectForm, Notification, PortfolioProject,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error body (`{"error": ...}`).
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },

    #[error("missing access token")]
    MissingToken,
}

/// Thin HTTP client over the folio endpoints. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
}

// Wire envelopes, matching the server response shapes.

#[derive(Deserialize)]
struct NotificationList {
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
struct NotificationEnvelope {
    notification: Notification,
}

#[derive(Deserialize)]
struct ProjectList {
    projects: Vec<PortfolioProject>,
}

#[derive(Deserialize)]
struct ProjectEnvelope {
    project: PortfolioProject,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            token: None,
        }
    }

    /// Attach the session access token used for authenticated calls.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    fn bearer(&self) -> Result<&str, ClientError> {
        self.token.as_deref().ok_or(ClientError::MissingToken)
    }

    /// POST /contact -- unauthenticated.
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<ContactReceipt, ClientError> {
        let resp = self.http.post(self.url("/contact")).json(form).send().await?;
        decode(resp).await
    }

    /// GET /notifications -- the caller's notifications, newest first.
    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let resp = self
            .http
            .get(self.url("/notifications"))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Ok(decode::<NotificationList>(resp).await?.notifications)
    }

    /// POST /notifications -- create a notification for the caller.
    pub async fn create_notification(
        &self,
        title: &str,
        message: &str,
        kind: &str,
    ) -> Result<Notification, ClientError> {
        let resp = self
            .http
            .post(self.url("/notifications"))
            .bearer_auth(self.bearer()?)
            .json(&serde_json::json!({
                "title": title,
                "message": message,
                "type": kind,
            }))
            .send()
            .await?;
        Ok(decode::<NotificationEnvelope>(resp).await?.notification)
    }

    /// PATCH /notifications -- toggle the read flag on an owned row.
    pub async fn mark_read(&self, id: Uuid, read: bool) -> Result<Notification, ClientError> {
        let resp = self
            .http
            .patch(self.url("/notifications"))
            .bearer_auth(self.bearer()?)
            .json(&serde_json::json!({ "id": id, "read": read }))
            .send()
            .await?;
        Ok(decode::<NotificationEnvelope>(resp).await?.notification)
    }

    /// GET /portfolio-projects -- public listing, no token needed.
    pub async fn fetch_projects(&self) -> Result<Vec<PortfolioProject>, ClientError> {
        let resp = self.http.get(self.url("/portfolio-projects")).send().await?;
        Ok(decode::<ProjectList>(resp).await?.projects)
    }

    /// POST /portfolio-projects -- create a project owned by the caller.
    pub async fn create_project(
        &self,
        form: &NewProjectForm,
    ) -> Result<PortfolioProject, ClientError> {
        let resp = self
            .http
            .post(self.url("/portfolio-projects"))
            .bearer_auth(self.bearer()?)
            .json(form)
            .send()
            .await?;
        Ok(decode::<ProjectEnvelope>(resp).await?.project)
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.json::<T>().await?)
}
