//! Authorized request gateway.
//!
//! Every call to the platform API goes through [`Gateway`]. It reads the
//! bearer token from the shared [`Session`] at call time, classifies the
//! response, and ends the session when the server rejects the token.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::GatewayError;
use crate::auth::Session;

// ============================================================================
// Constants
// ============================================================================

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const PROFILE_PATH: &str = "/auth/profile";

/// Multipart field name the attachment endpoint reads the file from
const UPLOAD_FIELD: &str = "file";

/// How a request is authorized.
#[derive(Debug, Clone, Copy)]
enum Credential<'a> {
    /// Whatever token the session holds when the request is built.
    Session,
    /// A token that is being validated and may not be committed yet.
    Bearer(&'a str),
    /// No token, and a 401 never ends the session.
    Public,
}

enum Payload {
    Empty,
    Json(Value),
    Form(Form),
}

/// Client for the platform API.
/// Clone is cheap - reqwest::Client and Session are both Arc-backed.
#[derive(Clone)]
pub struct Gateway {
    client: Client,
    base_url: String,
    session: Session,
}

impl Gateway {
    pub fn new(base_url: &str, timeout: Duration, session: Session) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("learnhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue an authorized request and return the parsed JSON body.
    ///
    /// An empty success body is returned as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let payload = match body {
            Some(body) => Payload::Json(body.clone()),
            None => Payload::Empty,
        };
        self.send(method, path, payload, Credential::Session).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self
            .send(Method::GET, path, Payload::Empty, Credential::Session)
            .await?;
        decode(path, value)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let value = self
            .send(Method::POST, path, encode(body)?, Credential::Session)
            .await?;
        decode(path, value)
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let value = self
            .send(Method::PUT, path, encode(body)?, Credential::Session)
            .await?;
        decode(path, value)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self
            .send(Method::DELETE, path, Payload::Empty, Credential::Session)
            .await?;
        decode(path, value)
    }

    /// Upload a file as `multipart/form-data`.
    ///
    /// Authorization and failure classification are the same as for JSON
    /// requests.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Result<T, GatewayError> {
        let mut part = Part::bytes(bytes).file_name(file_name.to_string());
        if let Some(mime) = mime {
            part = part.mime_str(mime).map_err(|e| {
                GatewayError::InvalidRequest(format!("Bad content type {}: {}", mime, e))
            })?;
        }
        let form = Form::new().part(UPLOAD_FIELD, part);

        let value = self
            .send(Method::POST, path, Payload::Form(form), Credential::Session)
            .await?;
        decode(path, value)
    }

    /// POST without credentials, for the login and registration endpoints.
    pub(crate) async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let value = self
            .send(Method::POST, path, encode(body)?, Credential::Public)
            .await?;
        decode(path, value)
    }

    /// GET with an explicit token, used while a token is being validated.
    pub(crate) async fn get_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, GatewayError> {
        let value = self
            .send(Method::GET, path, Payload::Empty, Credential::Bearer(token))
            .await?;
        decode(path, value)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, GatewayError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                GatewayError::InvalidRequest(
                    "Token contains characters not allowed in a header".to_string(),
                )
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
        credential: Credential<'_>,
    ) -> Result<Value, GatewayError> {
        // Read the token once so the request and any 401 handling agree on it
        let token = match credential {
            Credential::Session => self.session.token(),
            Credential::Bearer(token) => Some(token.to_string()),
            Credential::Public => None,
        };

        let url = self.url(path);
        let mut builder: RequestBuilder = self
            .client
            .request(method.clone(), &url)
            .headers(Self::auth_headers(token.as_deref())?);
        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(&body),
            Payload::Form(form) => builder.multipart(form),
        };

        debug!(%method, path, authorized = token.is_some(), "API request");
        let response = builder.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "API request could not be sent");
            GatewayError::Network(e)
        })?;

        self.check_response(response, &method, path, token.as_deref())
            .await
    }

    /// Turn a response into a JSON body or a classified error, ending the
    /// session first when the presented token was rejected.
    async fn check_response(
        &self,
        response: Response,
        method: &Method,
        path: &str,
        presented: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let status = response.status();
        let body = response.text().await?;
        trace!(%method, path, status = %status, "API response");

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| {
                GatewayError::InvalidResponse(format!("{} returned malformed JSON: {}", path, e))
            });
        }

        let error = GatewayError::from_status(status, &body);
        if error.is_authentication() {
            if let Some(token) = presented {
                if self.session.end_if_token(token) {
                    warn!(%method, path, "Token rejected, session ended");
                } else {
                    debug!(%method, path, "Token rejected after session already changed");
                }
            }
        } else {
            debug!(%method, path, status = %status, error = %error, "API request failed");
        }
        Err(error)
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Payload, GatewayError> {
    serde_json::to_value(body)
        .map(Payload::Json)
        .map_err(|e| GatewayError::InvalidRequest(format!("Failed to encode request body: {}", e)))
}

pub(super) fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| {
        GatewayError::InvalidResponse(format!("Unexpected response shape from {}: {}", path, e))
    })
}
