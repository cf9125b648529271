//! Account endpoints.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{Access, ApiClient, ApiError};
use crate::session::{Authenticator, Credentials};
use crate::types::{AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, User};

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

impl Authenticator for ApiClient {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let envelope: UserEnvelope = self
            .send_json(Method::POST, "/auth/register", Access::Public, request)
            .await?;
        Ok(envelope.user)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let request = LoginRequest {
            email: credentials.email.as_str(),
            password: credentials.password.expose_secret(),
        };
        self.send_json(Method::POST, "/auth/login", Access::Public, &request)
            .await
    }

    async fn logout(&self, token: &SecretString) -> Result<(), ApiError> {
        // Sent with the token being revoked, which may differ from the current one.
        let url = self.inner.config.endpoint("/auth/logout")?;
        let request = self
            .inner
            .client
            .post(url)
            .bearer_auth(token.expose_secret());
        let epoch = self.inner.session.epoch();
        self.execute(super::Prepared {
            request,
            access: Access::Public,
            epoch,
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn profile(&self) -> Result<User, ApiError> {
        let envelope: UserEnvelope = self.get("/auth/profile", Access::Authenticated, &[]).await?;
        Ok(envelope.user)
    }

    #[instrument(skip(self, request))]
    async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User, ApiError> {
        let envelope: UserEnvelope = self
            .send_json(Method::PUT, "/auth/profile", Access::Authenticated, request)
            .await?;
        Ok(envelope.user)
    }
}
