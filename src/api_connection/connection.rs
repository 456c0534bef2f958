use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::endpoints::{
    item_path, Editable, LoginRequest, LoginResponse, PlanRequest, PlanResponse, Preferences,
    RegisterRequest, RegisterResponse, Resource, User, UserUpdate, CURRENT_USER_PATH, LOGIN_PATH,
    PLAN_PATH, PREFERENCES_PATH, REGISTER_PATH, USERS_PATH,
};
use crate::session::Session;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const LOGIN_HINT: &str =
    "You are not logged in or your session has expired. Run `meal_planner login` first.";

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("login rejected: {0}")]
    InvalidCredentials(String),
    #[error("invalid API url '{0}'")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {message}")]
    ApiError {
        status: StatusCode,
        error_body: String,
        message: ServerMessage,
    },
}

impl ApiConnectionError {
    fn from_response(status: StatusCode, error_body: String) -> Self {
        let message = ServerMessage::from_body(&error_body);
        ApiConnectionError::ApiError {
            status,
            error_body,
            message,
        }
    }

    /// True when the caller has to log in (again) before retrying.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            ApiConnectionError::NotAuthenticated => true,
            ApiConnectionError::ApiError { status, .. } => *status == StatusCode::UNAUTHORIZED,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiConnectionError::ApiError { status, .. } => Some(*status),
            ApiConnectionError::NetworkError(err) => err.status(),
            _ => None,
        }
    }

    /// Per-field messages reported by the server, if it reported any.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            ApiConnectionError::ApiError {
                message: ServerMessage::Fields(fields),
                ..
            } => Some(fields),
            _ => None,
        }
    }

    /// Text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            ApiConnectionError::NotAuthenticated => LOGIN_HINT.to_string(),
            ApiConnectionError::ApiError { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                LOGIN_HINT.to_string()
            }
            ApiConnectionError::ApiError { message, .. } => message.to_string(),
            ApiConnectionError::InvalidCredentials(reason) => reason.clone(),
            ApiConnectionError::InvalidUrl(url) => format!("The API url '{}' is not valid.", url),
            ApiConnectionError::NetworkError(_) => {
                "Could not reach the meal planning server. Please try again.".to_string()
            }
            ApiConnectionError::SerializationError(_) => {
                "The server sent a response that could not be understood.".to_string()
            }
        }
    }
}

/// Error body of a failed request, reduced to what can be shown next to a form.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Fields(BTreeMap<String, Vec<String>>),
    Flat(String),
}

impl ServerMessage {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Self::from_object(&map).unwrap_or_else(|| Self::flat(body)),
            Ok(Value::String(text)) => ServerMessage::Flat(text),
            Ok(Value::Array(items)) => {
                let texts = message_list(&Value::Array(items));
                if texts.is_empty() {
                    Self::flat(body)
                } else {
                    ServerMessage::Flat(texts.join(", "))
                }
            }
            _ => Self::flat(body),
        }
    }

    fn flat(body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            ServerMessage::Flat("the server returned an empty error response".to_string())
        } else {
            ServerMessage::Flat(body.to_string())
        }
    }

    fn from_object(map: &serde_json::Map<String, Value>) -> Option<Self> {
        for key in ["error", "detail", "message"] {
            match map.get(key) {
                Some(Value::String(text)) => return Some(ServerMessage::Flat(text.clone())),
                Some(Value::Object(inner)) => return Self::from_object(inner),
                _ => {}
            }
        }

        if let Some(general) = map.get("non_field_errors") {
            let texts = message_list(general);
            if !texts.is_empty() && map.len() == 1 {
                return Some(ServerMessage::Flat(texts.join(", ")));
            }
        }

        let fields: BTreeMap<String, Vec<String>> = map
            .iter()
            .map(|(field, value)| (field.clone(), message_list(value)))
            .filter(|(_, texts)| !texts.is_empty())
            .collect();

        if fields.is_empty() {
            None
        } else {
            Some(ServerMessage::Fields(fields))
        }
    }
}

fn message_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Flat(text) => f.write_str(text),
            ServerMessage::Fields(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(field, texts)| format!("{}: {}", field, texts.join(", ")))
                    .collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}

/// HTTP client for the meal planning API. The session it carries is the only
/// token source for authenticated calls.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: Option<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Option<Session>) -> Result<Self, ApiConnectionError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT, session)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        session: Option<Session>,
    ) -> Result<Self, ApiConnectionError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Exchanges credentials for tokens and keeps the resulting session.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<&Session, ApiConnectionError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let builder = self.http.post(self.url(LOGIN_PATH)?).json(&request);
        let response: LoginResponse = match self.send_json(builder, Method::POST, LOGIN_PATH).await {
            Err(ApiConnectionError::ApiError {
                status, message, ..
            }) if status == StatusCode::UNAUTHORIZED => {
                return Err(ApiConnectionError::InvalidCredentials(message.to_string()));
            }
            other => other?,
        };

        debug!(username = %response.user.username, "logged in");
        Ok(&*self.session.insert(Session::from(response)))
    }

    /// Drops the session. Nothing is sent to the server.
    pub fn logout(&mut self) -> Option<Session> {
        self.session.take()
    }

    pub async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, ApiConnectionError> {
        let builder = self.http.post(self.url(REGISTER_PATH)?).json(request);
        self.send_json(builder, Method::POST, REGISTER_PATH).await
    }

    pub async fn current_user(&self) -> Result<User, ApiConnectionError> {
        self.get_json(CURRENT_USER_PATH).await
    }

    pub async fn update_user(
        &self,
        user_id: i64,
        update: &UserUpdate,
    ) -> Result<User, ApiConnectionError> {
        let path = item_path(USERS_PATH, &user_id.to_string());
        let builder = self.authorized(Method::PUT, &path)?.json(update);
        self.send_json(builder, Method::PUT, &path).await
    }

    pub async fn preferences(&self) -> Result<Preferences, ApiConnectionError> {
        self.get_json(PREFERENCES_PATH).await
    }

    pub async fn update_preferences(
        &self,
        preferences: &Preferences,
    ) -> Result<Preferences, ApiConnectionError> {
        let builder = self
            .authorized(Method::PUT, PREFERENCES_PATH)?
            .json(preferences);
        self.send_json(builder, Method::PUT, PREFERENCES_PATH).await
    }

    pub async fn generate_plan(
        &self,
        request: &PlanRequest,
    ) -> Result<PlanResponse, ApiConnectionError> {
        let builder = self.authorized(Method::POST, PLAN_PATH)?.json(request);
        self.send_json(builder, Method::POST, PLAN_PATH).await
    }

    pub async fn list<R: Resource>(&self) -> Result<R::Listing, ApiConnectionError> {
        self.get_json(R::COLLECTION).await
    }

    pub async fn fetch<R: Resource>(&self, id: &str) -> Result<R::Record, ApiConnectionError> {
        self.get_json(&item_path(R::COLLECTION, id)).await
    }

    /// Any body the server echoes back is ignored; callers reload the list.
    pub async fn create<R: Resource>(
        &self,
        payload: &R::Payload,
    ) -> Result<(), ApiConnectionError> {
        let builder = self.authorized(Method::POST, R::COLLECTION)?.json(payload);
        self.send_empty(builder, Method::POST, R::COLLECTION).await
    }

    pub async fn update<R: Editable>(
        &self,
        id: &str,
        payload: &R::Payload,
    ) -> Result<(), ApiConnectionError> {
        let path = item_path(R::COLLECTION, id);
        let builder = self.authorized(Method::PUT, &path)?.json(payload);
        self.send_empty(builder, Method::PUT, &path).await
    }

    pub async fn delete<R: Resource>(&self, id: &str) -> Result<(), ApiConnectionError> {
        let path = item_path(R::COLLECTION, id);
        let builder = self.authorized(Method::DELETE, &path)?;
        self.send_empty(builder, Method::DELETE, &path).await
    }

    fn url(&self, path: &str) -> Result<Url, ApiConnectionError> {
        self.base_url
            .join(path)
            .map_err(|_| ApiConnectionError::InvalidUrl(format!("{}{}", self.base_url, path)))
    }

    // Fails before anything goes on the wire when there is no session.
    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiConnectionError> {
        let session = self
            .session
            .as_ref()
            .ok_or(ApiConnectionError::NotAuthenticated)?;
        Ok(self
            .http
            .request(method, self.url(path)?)
            .bearer_auth(&session.access_token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiConnectionError> {
        let builder = self.authorized(Method::GET, path)?;
        self.send_json(builder, Method::GET, path).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<T, ApiConnectionError> {
        let body = self.send(builder, method, path).await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(path, error = %e, "unexpected response body");
            ApiConnectionError::SerializationError(e)
        })
    }

    async fn send_empty(
        &self,
        builder: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<(), ApiConnectionError> {
        self.send(builder, method, path).await.map(|_| ())
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<String, ApiConnectionError> {
        debug!(%method, path, "sending request");
        let response = builder.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "request failed");
            ApiConnectionError::NetworkError(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(%method, path, status = status.as_u16(), "request succeeded");
            Ok(response.text().await?)
        } else {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            warn!(%method, path, status = status.as_u16(), "server rejected request");
            Err(ApiConnectionError::from_response(status, error_body))
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ApiConnectionError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&with_slash).map_err(|_| ApiConnectionError::InvalidUrl(raw.to_string()))
}
