use lettre::Address;
use rand::Rng;
use tracing::info;

use crate::models::cafeteria::Cafeteria;
use crate::models::user::{Preferences, UserRecord};
use crate::services::record_store::{RecordStore, StoreError};

const TOKEN_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("no account for '{0}'")]
    NotFound(String),
    #[error("invalid token")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn gen_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Registration and token-checked preference edits over the user store.
#[derive(Clone)]
pub struct AccountService {
    users: RecordStore,
}

impl AccountService {
    pub fn new(users: RecordStore) -> Self {
        Self { users }
    }

    pub fn users(&self) -> &RecordStore {
        &self.users
    }

    /// Existing record for `email`, if its login key matches.
    fn authorize(&self, email: &str, key: &str) -> Result<UserRecord, AccountError> {
        if !self.users.contains(email) {
            return Err(AccountError::NotFound(email.to_string()));
        }
        let user = UserRecord::new(self.users.get(email)?);
        match user.key() {
            Ok(stored) if !stored.is_empty() && stored == key => Ok(user),
            Ok(_) | Err(StoreError::UnsetAttribute(_)) => Err(AccountError::Unauthorized),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the account if needed and return its login key. Registering
    /// again keeps the existing key and preferences.
    pub fn register(&self, email: &str) -> Result<String, AccountError> {
        let raw = email.trim();
        let address: Address = raw
            .parse()
            .map_err(|_| AccountError::InvalidEmail(raw.to_string()))?;
        let email = address.to_string();
        if email.contains('/') {
            return Err(AccountError::InvalidEmail(email));
        }

        let user = UserRecord::new(
            self.users
                .get(&email)
                .map_err(|_| AccountError::InvalidEmail(email.clone()))?,
        );
        if let Ok(key) = user.key() {
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let key = gen_token();
        user.set_key(&key)?;
        user.set_del_key("")?;
        user.set_cafeterias(&Cafeteria::ALL)?;
        user.set_queries(&[])?;
        info!("Registered new account {}", email);
        Ok(key)
    }

    pub fn login(&self, email: &str, key: &str) -> Result<Preferences, AccountError> {
        Ok(self.authorize(email, key)?.preferences()?)
    }

    /// Replace the saved queries and cafeterias. Blank queries are dropped.
    pub fn update_preferences(
        &self,
        email: &str,
        key: &str,
        queries: &[String],
        cafeterias: &[Cafeteria],
    ) -> Result<Preferences, AccountError> {
        let user = self.authorize(email, key)?;
        let queries: Vec<String> = queries
            .iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        user.set_queries(&queries)?;
        user.set_cafeterias(cafeterias)?;
        Ok(user.preferences()?)
    }

    /// Issue a fresh deletion token.
    pub fn request_deletion(&self, email: &str, key: &str) -> Result<String, AccountError> {
        let user = self.authorize(email, key)?;
        let del_key = gen_token();
        user.set_del_key(&del_key)?;
        Ok(del_key)
    }

    pub fn confirm_deletion(&self, email: &str, del_key: &str) -> Result<(), AccountError> {
        if !self.users.contains(email) {
            return Err(AccountError::NotFound(email.to_string()));
        }
        let user = UserRecord::new(self.users.get(email)?);
        let stored = match user.del_key() {
            Ok(stored) => stored,
            Err(StoreError::UnsetAttribute(_)) => String::new(),
            Err(e) => return Err(e.into()),
        };
        if stored.is_empty() || stored != del_key {
            return Err(AccountError::Unauthorized);
        }
        drop(user);
        match self.users.delete(email) {
            Ok(()) => {
                info!("Deleted account {}", email);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(AccountError::NotFound(email.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
