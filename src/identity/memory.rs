use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{IdentityError, IdentityGateway, IdentityResult, NewAccount, Session};
use crate::models::Identity;

struct Account {
    identity: Identity,
    password: String,
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, Uuid>,
}

/// Development gateway keeping accounts and sessions in process. Accounts are
/// usable immediately; there is no confirmation step.
#[derive(Default)]
pub struct MemoryGateway {
    directory: RwLock<Directory>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityGateway for MemoryGateway {
    async fn sign_up(&self, account: NewAccount) -> IdentityResult<Identity> {
        let mut directory = self.directory.write().await;
        let email = account.email.to_lowercase();
        if directory.accounts.contains_key(&email) {
            return Err(IdentityError::Rejected("User already registered".to_string()));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.clone(),
            role: account.role,
            full_name: account.full_name,
            last_sign_in_at: None,
        };
        directory.accounts.insert(
            email,
            Account {
                identity: identity.clone(),
                password: account.password,
            },
        );

        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> IdentityResult<Session> {
        let mut directory = self.directory.write().await;
        let account = directory
            .accounts
            .get_mut(&email.to_lowercase())
            .filter(|account| account.password == password)
            .ok_or_else(|| IdentityError::Rejected("Invalid login credentials".to_string()))?;

        account.identity.last_sign_in_at = Some(Utc::now());
        let identity = account.identity.clone();
        let access_token = Uuid::new_v4().simple().to_string();
        directory.sessions.insert(access_token.clone(), identity.id);

        Ok(Session {
            access_token,
            identity,
        })
    }

    async fn sign_out(&self, access_token: &str) -> IdentityResult<()> {
        self.directory.write().await.sessions.remove(access_token);
        Ok(())
    }

    async fn user(&self, access_token: &str) -> IdentityResult<Identity> {
        let directory = self.directory.read().await;
        directory
            .sessions
            .get(access_token)
            .and_then(|user_id| {
                directory
                    .accounts
                    .values()
                    .find(|account| account.identity.id == *user_id)
            })
            .map(|account| account.identity.clone())
            .ok_or_else(|| IdentityError::Unauthenticated("invalid or expired token".to_string()))
    }

    async fn confirm_email(&self, _user_id: Uuid) -> IdentityResult<()> {
        Ok(())
    }
}
