use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use etude_types::api::{AuthResponse, ChangePasswordData, LoginCredentials, RegisterData, UpdateProfileData};
use etude_types::models::User;

use crate::config::ClientConfig;
use crate::credentials::CredentialProvider;
use crate::error::{ClientError, ClientResult};

/// Client for the authentication routes of the API.
///
/// No retries, caching or timeouts are layered on top of reqwest: one call is
/// one request, and every failure comes back to the caller as-is.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url,
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let body = LoginCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.request(Method::POST, "/auth/login").json(&body).send().await?;
        handle_json(response).await
    }

    pub async fn register(&self, data: &RegisterData) -> ClientResult<AuthResponse> {
        let response = self.request(Method::POST, "/auth/register").json(data).send().await?;
        handle_json(response).await
    }

    pub async fn get_current_user(&self) -> ClientResult<User> {
        let response = self.request(Method::GET, "/auth/me").send().await?;
        handle_json(response).await
    }

    pub async fn update_profile(&self, data: &UpdateProfileData) -> ClientResult<User> {
        let response = self.request(Method::PUT, "/auth/profile").json(data).send().await?;
        handle_json(response).await
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> ClientResult<()> {
        let body = ChangePasswordData {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        let response = self
            .request(Method::PUT, "/auth/change-password")
            .json(&body)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// Single entry point for building requests, so the bearer token is
    /// attached to every call without exception.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let builder = self.client.request(method, url);
        match self.credentials.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    Err(ClientError::Api { status, body })
}

async fn handle_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let response = check_status(response).await?;
    Ok(response.json().await?)
}
