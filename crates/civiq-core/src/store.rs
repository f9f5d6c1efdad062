//! Record stores for issues, comments and users
//!
//! Two backends behind one async trait: an in-memory store for tests and
//! ephemeral runs, and a JSONL store with one file per table. No SQLite,
//! no daemon - just files.
//!
//! Stores apply exact-match predicates and nothing else. Ordering and
//! result windows belong to the engine.

use crate::{Category, Comment, Error, Issue, Result, Status, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

const ISSUES_FILE: &str = "issues.jsonl";
const COMMENTS_FILE: &str = "comments.jsonl";
const USERS_FILE: &str = "users.jsonl";

/// Exact-match predicates for issue listings
///
/// Absent fields match everything. State and district compare as given;
/// callers normalize case if they want to.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub state: Option<String>,
    pub district: Option<String>,
    pub category: Option<Category>,
    pub status: Option<Status>,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(state) = &self.state
            && issue.state != *state
        {
            return false;
        }
        if let Some(district) = &self.district
            && issue.district != *district
        {
            return false;
        }
        if let Some(category) = self.category
            && issue.category != category
        {
            return false;
        }
        if let Some(status) = self.status
            && issue.status != status
        {
            return false;
        }
        true
    }
}

/// Listing request: predicates plus a result window
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    pub filter: IssueFilter,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Storage backend for all record tables
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new issue. Fails with AlreadyExists on a duplicate id.
    async fn insert_issue(&self, issue: Issue) -> Result<()>;

    /// Replace an existing issue. Fails with NotFound if the id is unknown.
    async fn update_issue(&self, issue: Issue) -> Result<()>;

    /// Fetch an issue by id.
    async fn get_issue(&self, id: &str) -> Result<Option<Issue>>;

    /// Remove an issue. Returns whether a record existed.
    async fn delete_issue(&self, id: &str) -> Result<bool>;

    /// All issues matching the filter, in no particular order.
    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>>;

    /// Insert a new comment. Fails with AlreadyExists on a duplicate id.
    async fn insert_comment(&self, comment: Comment) -> Result<()>;

    /// All comments for an issue, in no particular order.
    async fn comments_for_issue(&self, issue_id: &str) -> Result<Vec<Comment>>;

    /// Remove every comment of an issue. Returns how many were removed.
    async fn delete_comments_for_issue(&self, issue_id: &str) -> Result<usize>;

    /// Insert a new user. Fails with AlreadyExists on a duplicate id or
    /// username.
    async fn insert_user(&self, user: User) -> Result<()>;

    /// Fetch a user by id.
    async fn get_user(&self, id: &str) -> Result<Option<User>>;
}

/// The record tables both backends share
#[derive(Debug, Default)]
struct Tables {
    issues: HashMap<String, Issue>,
    comments: HashMap<String, Comment>,
    users: HashMap<String, User>,
}

impl Tables {
    fn insert_issue(&mut self, issue: Issue) -> Result<()> {
        if self.issues.contains_key(&issue.id) {
            return Err(Error::AlreadyExists(issue.id));
        }
        self.issues.insert(issue.id.clone(), issue);
        Ok(())
    }

    fn update_issue(&mut self, issue: Issue) -> Result<()> {
        if !self.issues.contains_key(&issue.id) {
            return Err(Error::NotFound(issue.id));
        }
        self.issues.insert(issue.id.clone(), issue);
        Ok(())
    }

    fn delete_issue(&mut self, id: &str) -> bool {
        self.issues.remove(id).is_some()
    }

    fn list_issues(&self, filter: &IssueFilter) -> Vec<Issue> {
        self.issues
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect()
    }

    fn insert_comment(&mut self, comment: Comment) -> Result<()> {
        if self.comments.contains_key(&comment.id) {
            return Err(Error::AlreadyExists(comment.id));
        }
        self.comments.insert(comment.id.clone(), comment);
        Ok(())
    }

    fn comments_for_issue(&self, issue_id: &str) -> Vec<Comment> {
        self.comments
            .values()
            .filter(|c| c.issue_id == issue_id)
            .cloned()
            .collect()
    }

    fn delete_comments_for_issue(&mut self, issue_id: &str) -> usize {
        let ids: Vec<String> = self
            .comments
            .values()
            .filter(|c| c.issue_id == issue_id)
            .map(|c| c.id.clone())
            .collect();
        for id in &ids {
            self.comments.remove(id);
        }
        ids.len()
    }

    fn insert_user(&mut self, user: User) -> Result<()> {
        if self.users.contains_key(&user.id) {
            return Err(Error::AlreadyExists(user.id));
        }
        if self.users.values().any(|u| u.username == user.username) {
            return Err(Error::AlreadyExists(user.username));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }
}

fn poisoned() -> Error {
    Error::Storage("record store lock poisoned".to_string())
}

/// In-memory store
///
/// Backs tests and ephemeral runs. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }
}

#[async_trait]
impl RecordStore for MemStore {
    async fn insert_issue(&self, issue: Issue) -> Result<()> {
        self.write()?.insert_issue(issue)
    }

    async fn update_issue(&self, issue: Issue) -> Result<()> {
        self.write()?.update_issue(issue)
    }

    async fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        Ok(self.read()?.issues.get(id).cloned())
    }

    async fn delete_issue(&self, id: &str) -> Result<bool> {
        Ok(self.write()?.delete_issue(id))
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        Ok(self.read()?.list_issues(filter))
    }

    async fn insert_comment(&self, comment: Comment) -> Result<()> {
        self.write()?.insert_comment(comment)
    }

    async fn comments_for_issue(&self, issue_id: &str) -> Result<Vec<Comment>> {
        Ok(self.read()?.comments_for_issue(issue_id))
    }

    async fn delete_comments_for_issue(&self, issue_id: &str) -> Result<usize> {
        Ok(self.write()?.delete_comments_for_issue(issue_id))
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        self.write()?.insert_user(user)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }
}

/// JSONL store with one file per table
///
/// Every table loads fully at open. Mutations rewrite the affected file
/// through a buffered writer while the table lock is held, so writers
/// never interleave.
#[derive(Debug)]
pub struct JsonlStore {
    data_dir: PathBuf,
    tables: RwLock<Tables>,
}

impl JsonlStore {
    /// Open (or create) a store rooted at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let mut tables = Tables::default();
        load_table(&data_dir.join(ISSUES_FILE), |issue: Issue| {
            tables.issues.insert(issue.id.clone(), issue);
        })?;
        load_table(&data_dir.join(COMMENTS_FILE), |comment: Comment| {
            tables.comments.insert(comment.id.clone(), comment);
        })?;
        load_table(&data_dir.join(USERS_FILE), |user: User| {
            tables.users.insert(user.id.clone(), user);
        })?;

        Ok(Self {
            data_dir,
            tables: RwLock::new(tables),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }

    fn save_issues(&self, tables: &Tables) -> Result<()> {
        let mut rows: Vec<&Issue> = tables.issues.values().collect();
        // Creation order so the file reads like a log.
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        save_table(&self.data_dir.join(ISSUES_FILE), rows)
    }

    fn save_comments(&self, tables: &Tables) -> Result<()> {
        let mut rows: Vec<&Comment> = tables.comments.values().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        save_table(&self.data_dir.join(COMMENTS_FILE), rows)
    }

    fn save_users(&self, tables: &Tables) -> Result<()> {
        let mut rows: Vec<&User> = tables.users.values().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        save_table(&self.data_dir.join(USERS_FILE), rows)
    }
}

#[async_trait]
impl RecordStore for JsonlStore {
    async fn insert_issue(&self, issue: Issue) -> Result<()> {
        let mut tables = self.write()?;
        tables.insert_issue(issue)?;
        self.save_issues(&tables)
    }

    async fn update_issue(&self, issue: Issue) -> Result<()> {
        let mut tables = self.write()?;
        tables.update_issue(issue)?;
        self.save_issues(&tables)
    }

    async fn get_issue(&self, id: &str) -> Result<Option<Issue>> {
        Ok(self.read()?.issues.get(id).cloned())
    }

    async fn delete_issue(&self, id: &str) -> Result<bool> {
        let mut tables = self.write()?;
        let existed = tables.delete_issue(id);
        if existed {
            self.save_issues(&tables)?;
        }
        Ok(existed)
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        Ok(self.read()?.list_issues(filter))
    }

    async fn insert_comment(&self, comment: Comment) -> Result<()> {
        let mut tables = self.write()?;
        tables.insert_comment(comment)?;
        self.save_comments(&tables)
    }

    async fn comments_for_issue(&self, issue_id: &str) -> Result<Vec<Comment>> {
        Ok(self.read()?.comments_for_issue(issue_id))
    }

    async fn delete_comments_for_issue(&self, issue_id: &str) -> Result<usize> {
        let mut tables = self.write()?;
        let removed = tables.delete_comments_for_issue(issue_id);
        if removed > 0 {
            self.save_comments(&tables)?;
        }
        Ok(removed)
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        let mut tables = self.write()?;
        tables.insert_user(user)?;
        self.save_users(&tables)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }
}

/// Open the record store selected by the storage config.
pub fn open_store(config: &crate::config::StorageConfig) -> Result<Arc<dyn RecordStore>> {
    use crate::config::StorageBackend;

    Ok(match config.backend {
        StorageBackend::Jsonl => Arc::new(JsonlStore::open(&config.data_dir)?),
        StorageBackend::Memory => Arc::new(MemStore::new()),
    })
}

fn load_table<T, F>(path: &Path, mut insert: F) -> Result<()>
where
    T: serde::de::DeserializeOwned,
    F: FnMut(T),
{
    if !path.exists() {
        return Ok(());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        insert(serde_json::from_str(&line)?);
    }

    Ok(())
}

fn save_table<'a, T, I>(path: &Path, rows: I) -> Result<()>
where
    T: serde::Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
