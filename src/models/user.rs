use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::cafeteria::Cafeteria;
use crate::services::record_store::{Record, StoreError};

const KEY: &str = "key";
const DEL_KEY: &str = "del_key";
const CAFETERIAS: &str = "cafeterias";
const QUERIES: &str = "queries";

/// Typed view over a user's stored record (keyed by email address).
///
/// Every getter fails with `StoreError::UnsetAttribute` when the field was never
/// written, so an unregistered user is distinguishable from one with no queries.
#[derive(Debug, Clone)]
pub struct UserRecord {
    record: Arc<Record>,
}

impl UserRecord {
    pub fn new(record: Arc<Record>) -> Self {
        Self { record }
    }

    pub fn email(&self) -> &str {
        self.record.key()
    }

    /// Login token.
    pub fn key(&self) -> Result<String, StoreError> {
        self.record.get_as(KEY)
    }

    pub fn set_key(&self, key: &str) -> Result<(), StoreError> {
        self.record.set(KEY, key)
    }

    /// Deletion token; empty until a deletion link was requested.
    pub fn del_key(&self) -> Result<String, StoreError> {
        self.record.get_as(DEL_KEY)
    }

    pub fn set_del_key(&self, del_key: &str) -> Result<(), StoreError> {
        self.record.set(DEL_KEY, del_key)
    }

    pub fn cafeterias(&self) -> Result<Vec<Cafeteria>, StoreError> {
        self.record.get_as(CAFETERIAS)
    }

    pub fn set_cafeterias(&self, cafeterias: &[Cafeteria]) -> Result<(), StoreError> {
        self.record.set(CAFETERIAS, cafeterias)
    }

    pub fn queries(&self) -> Result<Vec<String>, StoreError> {
        self.record.get_as(QUERIES)
    }

    pub fn set_queries(&self, queries: &[String]) -> Result<(), StoreError> {
        self.record.set(QUERIES, queries)
    }

    pub fn preferences(&self) -> Result<Preferences, StoreError> {
        Ok(Preferences {
            queries: self.queries()?,
            cafeterias: self.cafeterias()?,
        })
    }
}

/// Saved search preferences, as edited by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub queries: Vec<String>,
    pub cafeterias: Vec<Cafeteria>,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub email: String,
    pub preferences: Preferences,
}
