//! Database initialization and the credential/URL store
//!
//! This module handles the setup of the embedded redb database and exposes
//! [`Store`], the persistence service handed to the handlers through the
//! application state.

use std::sync::Arc;

use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ShortUrl, User};

/// Users keyed by their generated id
///
/// Key: user id (UUID v4)
/// Value: JSON-serialized [`User`]
pub const TABLE_USERS: TableDefinition<&str, &str> = TableDefinition::new("users_v1");

/// Uniqueness index over usernames
///
/// Key: username
/// Value: user id
pub const TABLE_USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames_v1");

/// Short URLs keyed by slug
///
/// Key: short URL id (e.g. "aB3xY9")
/// Value: JSON-serialized [`ShortUrl`]
pub const TABLE_URLS: TableDefinition<&str, &str> = TableDefinition::new("urls_v1");

/// Index table for listing the URLs of one owner
///
/// Key: composite key in format "{owner_id}:{created_micros:020}:{url_id}"
/// Value: JSON-serialized [`ShortUrl`]
///
/// The zero-padded timestamp keeps entries of one owner in creation order.
pub const TABLE_OWNER_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("owner_index_v1");

/// Length of generated short URL ids
pub const URL_ID_LEN: usize = 6;

const MAX_ID_ATTEMPTS: usize = 8;

/// Failures raised by the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username is already registered")]
    UsernameTaken,

    #[error("could not allocate a free short URL id")]
    IdSpaceExhausted,

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("corrupt record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Initializes the embedded database and creates required tables
///
/// # Example
///
/// ```no_run
/// # use short_url::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, StoreError> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_USERS)?;
        write_txn.open_table(TABLE_USERNAMES)?;
        write_txn.open_table(TABLE_URLS)?;
        write_txn.open_table(TABLE_OWNER_INDEX)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Generates a random alphanumeric short URL id
pub fn generate_url_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(URL_ID_LEN)
        .map(char::from)
        .collect()
}

/// Whether `id` has the shape of a generated short URL id
pub fn is_valid_url_id(id: &str) -> bool {
    id.len() == URL_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Persistence service for users and short URLs
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Opens (or creates) the database at `db_path`
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        Ok(Self::new(init_db(db_path)?))
    }

    pub fn find_user_by_name(&self, username: &str) -> Result<Option<User>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(TABLE_USERNAMES)?;

        let Some(user_id) = names.get(username)? else {
            return Ok(None);
        };

        let users = read_txn.open_table(TABLE_USERS)?;
        let user = match users.get(user_id.value())? {
            Some(value) => Some(serde_json::from_str::<User>(value.value())?),
            None => None,
        };
        Ok(user)
    }

    pub fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(TABLE_USERNAMES)?;
        let exists = names.get(username)?.is_some();
        Ok(exists)
    }

    /// Creates a user with a fresh id
    ///
    /// The username check and both inserts happen in one write transaction,
    /// so a duplicate name never leaves a partial row behind.
    pub fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        let user_json = serde_json::to_string(&user)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut names = write_txn.open_table(TABLE_USERNAMES)?;
            if names.get(username)?.is_some() {
                return Err(StoreError::UsernameTaken);
            }
            names.insert(username, user.id.as_str())?;

            let mut users = write_txn.open_table(TABLE_USERS)?;
            users.insert(user.id.as_str(), user_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(user)
    }

    pub fn find_url_by_id(&self, id: &str) -> Result<Option<ShortUrl>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_URLS)?;

        let record = match table.get(id)? {
            Some(value) => Some(serde_json::from_str::<ShortUrl>(value.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Stores a new short URL under a freshly generated id
    pub fn insert_url(&self, url: &str, owner_id: &str) -> Result<ShortUrl, StoreError> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut urls = write_txn.open_table(TABLE_URLS)?;

            let mut free_id = None;
            for _ in 0..MAX_ID_ATTEMPTS {
                let candidate = generate_url_id();
                if urls.get(candidate.as_str())?.is_none() {
                    free_id = Some(candidate);
                    break;
                }
            }
            let id = free_id.ok_or(StoreError::IdSpaceExhausted)?;

            let record = ShortUrl {
                id,
                url: url.to_string(),
                owner_id: owner_id.to_string(),
                created_at: Utc::now(),
            };
            let record_json = serde_json::to_string(&record)?;
            urls.insert(record.id.as_str(), record_json.as_str())?;

            let index_key = format!(
                "{}:{:020}:{}",
                owner_id,
                record.created_at.timestamp_micros(),
                record.id
            );
            let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
            index.insert(index_key.as_str(), record_json.as_str())?;

            record
        };
        write_txn.commit()?;

        Ok(record)
    }

    /// All URLs of `owner_id`, oldest first
    pub fn list_urls_by_owner(&self, owner_id: &str) -> Result<Vec<ShortUrl>, StoreError> {
        self.list_urls_by_owner_page(owner_id, 0, usize::MAX)
    }

    /// One page of the URLs of `owner_id`, oldest first
    pub fn list_urls_by_owner_page(
        &self,
        owner_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ShortUrl>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_OWNER_INDEX)?;

        // '{' sorts right after ':' so this bounds every key of the owner
        let start_key = format!("{}:", owner_id);
        let end_key = format!("{}:{{", owner_id);

        let mut urls = Vec::new();
        for entry in table
            .range(start_key.as_str()..end_key.as_str())?
            .skip(offset)
            .take(limit)
        {
            let (_, value) = entry?;
            urls.push(serde_json::from_str::<ShortUrl>(value.value())?);
        }
        Ok(urls)
    }
}
