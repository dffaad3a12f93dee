use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::{IdentityError, IdentityGateway, IdentityResult, NewAccount, Session};
use crate::models::{Identity, Role};

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Client for a GoTrue-compatible auth API (the `/auth/v1` surface of Supabase).
pub struct GoTrueGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Metadata,
    #[serde(default)]
    last_sign_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    access_token: String,
    user: UserBody,
}

/// Sign-up answers with a session when confirmation is off and a bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(SessionBody),
    User(UserBody),
}

impl From<UserBody> for Identity {
    fn from(user: UserBody) -> Self {
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
            role: Role::from_metadata(user.user_metadata.role.as_deref()),
            full_name: user.user_metadata.full_name.unwrap_or_default(),
            last_sign_in_at: user.last_sign_in_at,
        }
    }
}

impl GoTrueGateway {
    pub fn new(base_url: &str, api_key: String) -> IdentityResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    fn request(&self, builder: RequestBuilder, bearer: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder, bearer: &str) -> IdentityResult<Response> {
        let response = self.request(builder, bearer).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        debug!(%status, %message, "Identity gateway refused request");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(IdentityError::Unauthenticated(message))
            }
            _ => Err(IdentityError::Rejected(message)),
        }
    }
}

/// GoTrue reports errors under several keys depending on the endpoint.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("identity gateway returned {status}"))
}

#[async_trait]
impl IdentityGateway for GoTrueGateway {
    async fn sign_up(&self, account: NewAccount) -> IdentityResult<Identity> {
        let builder = self.client.post(format!("{}/signup", self.base_url)).json(&json!({
            "email": account.email,
            "password": account.password,
            "data": {
                "full_name": account.full_name,
                "role": account.role.as_str(),
            },
        }));

        // Unauthenticated answers here mean bad input, not a bad session.
        let response = self
            .send(builder, &self.api_key)
            .await
            .map_err(|err| match err {
                IdentityError::Unauthenticated(message) => IdentityError::Rejected(message),
                other => other,
            })?;

        let user = match response.json::<SignUpBody>().await? {
            SignUpBody::Session(session) => session.user,
            SignUpBody::User(user) => user,
        };
        Ok(user.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> IdentityResult<Session> {
        let builder = self
            .client
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let response = self
            .send(builder, &self.api_key)
            .await
            .map_err(|err| match err {
                IdentityError::Unauthenticated(message) => IdentityError::Rejected(message),
                other => other,
            })?;

        let session: SessionBody = response.json().await?;
        Ok(Session {
            access_token: session.access_token,
            identity: session.user.into(),
        })
    }

    async fn sign_out(&self, access_token: &str) -> IdentityResult<()> {
        let builder = self.client.post(format!("{}/logout", self.base_url));
        self.send(builder, access_token).await?;
        Ok(())
    }

    async fn user(&self, access_token: &str) -> IdentityResult<Identity> {
        let builder = self.client.get(format!("{}/user", self.base_url));
        let user: UserBody = self.send(builder, access_token).await?.json().await?;
        Ok(user.into())
    }

    async fn confirm_email(&self, user_id: Uuid) -> IdentityResult<()> {
        let builder = self
            .client
            .put(format!("{}/admin/users/{user_id}", self.base_url))
            .json(&json!({ "email_confirm": true }));
        self.send(builder, &self.api_key).await?;
        Ok(())
    }
}
