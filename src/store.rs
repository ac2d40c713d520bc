//! Task & user persistence over redb.
//!
//! One write transaction per mutation, postcard-encoded values, uuid-byte
//! keys. Listing and range queries decode the user's rows and sort in memory
//! — fine at personal-planner scale. Concurrent updates of the same task are
//! last-writer-wins.

use crate::task::{Category, Task};
use chrono::NaiveDate;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const TASKS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tasks");
const USERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("users");
const USERNAME_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("username_index");

// ── Users ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

// ── Listing filters ────────────────────────────────────────────

/// Filters for find_by_user / count_by_user. count ignores limit/offset.
#[derive(Debug, Clone, Copy)]
pub struct TaskFilter {
    pub limit: usize,
    pub offset: usize,
    pub completed: Option<bool>,
    pub category: Option<Category>,
}

impl Default for TaskFilter {
    fn default() -> Self {
        TaskFilter {
            limit: 50,
            offset: 0,
            completed: None,
            category: None,
        }
    }
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        if let Some(completed) = self.completed {
            if task.completed != completed {
                return false;
            }
        }
        if let Some(category) = self.category {
            if task.category != category {
                return false;
            }
        }
        true
    }
}

// ── The store ──────────────────────────────────────────────────

/// Thin handle to the redb file. Cloneable (Arc inside).
#[derive(Clone)]
pub struct TaskStore {
    db: Arc<Database>,
}

impl TaskStore {
    /// Open (or create) the database at the given path and make sure all
    /// tables exist.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(TASKS)?;
            let _ = txn.open_table(USERS)?;
            let _ = txn.open_table(USERNAME_INDEX)?;
        }
        txn.commit()?;

        Ok(TaskStore { db: Arc::new(db) })
    }

    // ── Task operations ────────────────────────────────────────

    /// Persist a freshly created task.
    pub fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut tasks = txn.open_table(TASKS)?;
            let bytes = encode(task)?;
            tasks.insert(task.id.as_bytes().as_slice(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let txn = self.db.begin_read()?;
        let tasks = txn.open_table(TASKS)?;
        match tasks.get(id.as_bytes().as_slice())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// Overwrite an existing task. Missing rows abort the transaction and
    /// surface as StoreError::Missing.
    pub fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        let existed = {
            let mut tasks = txn.open_table(TASKS)?;
            let bytes = encode(task)?;
            let existed = tasks
                .insert(task.id.as_bytes().as_slice(), bytes.as_slice())?
                .is_some();
            existed
        };
        if !existed {
            txn.abort()?;
            return Err(StoreError::Missing);
        }
        txn.commit()?;
        Ok(())
    }

    /// Delete by id. Returns whether a row was actually removed.
    pub fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut tasks = txn.open_table(TASKS)?;
            let removed = tasks.remove(id.as_bytes().as_slice())?.is_some();
            removed
        };
        txn.commit()?;
        Ok(removed)
    }

    /// A user's tasks, newest planning day first (then newest created first),
    /// filtered and paginated.
    pub fn find_by_user(&self, user_id: Uuid, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.user_tasks(user_id, filter)?;
        tasks.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(tasks
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    /// How many of a user's tasks match the filter (pagination total).
    pub fn count_by_user(&self, user_id: Uuid, filter: &TaskFilter) -> Result<usize, StoreError> {
        Ok(self.user_tasks(user_id, filter)?.len())
    }

    /// A user's tasks with `date` in [start, end] inclusive, ordered by date
    /// ascending, then due_time ascending with missing due times last.
    pub fn find_by_date_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.user_tasks(user_id, &TaskFilter::default())?;
        tasks.retain(|task| task.date >= start && task.date <= end);
        tasks.sort_by_key(|task| (task.date, task.due_time.is_none(), task.due_time));
        Ok(tasks)
    }

    /// Decode every task owned by the user that passes the filter's
    /// completed/category predicates. Unsorted, unpaginated.
    fn user_tasks(&self, user_id: Uuid, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let txn = self.db.begin_read()?;
        let tasks_table = txn.open_table(TASKS)?;

        let mut tasks = Vec::new();
        for entry in tasks_table.iter()? {
            let (_, value) = entry?;
            let task: Task = decode(value.value())?;
            if task.user_id == user_id && filter.matches(&task) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    // ── User operations ────────────────────────────────────────

    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut users = txn.open_table(USERS)?;
            let mut index = txn.open_table(USERNAME_INDEX)?;
            let bytes = encode(user)?;
            let id_bytes = user.id.as_bytes();
            users.insert(id_bytes.as_slice(), bytes.as_slice())?;
            index.insert(user.username.as_str(), id_bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let txn = self.db.begin_read()?;
        let users = txn.open_table(USERS)?;
        match users.get(id.as_bytes().as_slice())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let id = {
            let txn = self.db.begin_read()?;
            let index = txn.open_table(USERNAME_INDEX)?;
            match index.get(username)? {
                Some(data) => {
                    let bytes: [u8; 16] = data
                        .value()
                        .try_into()
                        .map_err(|_| StoreError::Decode("bad uuid in username index".into()))?;
                    Uuid::from_bytes(bytes)
                }
                None => return Ok(None),
            }
        };
        self.get_user(id)
    }

    /// Seed a default admin account if no users exist. Returns true if one
    /// was created.
    pub fn ensure_default_user(&self) -> Result<bool, StoreError> {
        {
            let txn = self.db.begin_read()?;
            let users = txn.open_table(USERS)?;
            if users.iter()?.next().is_some() {
                return Ok(false);
            }
        }

        use argon2::{
            password_hash::{rand_core::OsRng, SaltString},
            Argon2, PasswordHasher,
        };

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(b"admin", &salt)
            .map_err(|e| StoreError::Encode(e.to_string()))?
            .to_string();

        self.create_user(&User {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            password_hash,
        })?;
        Ok(true)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug)]
pub enum StoreError {
    Redb(String),
    Decode(String),
    Encode(String),
    /// update_task hit a row that isn't there.
    Missing,
}

// redb 2.x has many error types. Blanket them all into StoreError::Redb.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for StoreError {
            fn from(e: $t) -> Self { StoreError::Redb(e.to_string()) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Redb(e) => write!(f, "redb: {e}"),
            StoreError::Decode(e) => write!(f, "decode: {e}"),
            StoreError::Encode(e) => write!(f, "encode: {e}"),
            StoreError::Missing => write!(f, "row not found"),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
