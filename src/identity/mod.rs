//! Authentication and role metadata, delegated to an external identity gateway.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Identity, Role};

mod gotrue;
mod memory;

pub use gotrue::GoTrueGateway;
pub use memory::MemoryGateway;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Rejected(String),

    #[error("identity gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub identity: Identity,
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn sign_up(&self, account: NewAccount) -> IdentityResult<Identity>;

    async fn sign_in(&self, email: &str, password: &str) -> IdentityResult<Session>;

    async fn sign_out(&self, access_token: &str) -> IdentityResult<()>;

    /// Resolves a bearer credential to the identity it was issued for.
    async fn user(&self, access_token: &str) -> IdentityResult<Identity>;

    /// Administrative email confirmation. Gateways without admin rights may refuse.
    async fn confirm_email(&self, user_id: Uuid) -> IdentityResult<()>;
}
