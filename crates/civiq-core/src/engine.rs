//! Issue lifecycle engine
//!
//! Owns every mutation of the record tables: validation, id assignment,
//! partial updates, deletion with comment cascade, ordered listings,
//! statistics and the merge of AI suggestions. The engine is cheap to
//! clone and shared between request handlers and background tasks.

use crate::id::{self, COMMENT_PREFIX, ISSUE_PREFIX};
use crate::store::{IssueFilter, IssueQuery, RecordStore};
use crate::{
    Classification, Classifier, Comment, Error, Issue, NewComment, NewIssue, Result, UpdateIssue,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How often id generation is retried on a collision
const ID_RETRIES: usize = 3;

/// Aggregate issue counts, recomputed on demand
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
}

/// Issue lifecycle engine
///
/// The classifier is optional; without one, issues simply keep their AI
/// fields unset.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn RecordStore>,
    classifier: Option<Arc<dyn Classifier>>,
}

impl Engine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Create an issue.
    ///
    /// Validates before anything is written, forces status to `new`, sets
    /// both timestamps to one instant and schedules background
    /// categorization. The returned record is exactly what a caller would
    /// read back immediately: AI fields still unset.
    pub async fn create_issue(&self, input: NewIssue) -> Result<Issue> {
        let (category, priority) = input.validate()?;

        let mut attempts = 0;
        let issue = loop {
            let issue = Issue::new(
                id::generate_id(ISSUE_PREFIX),
                input.clone(),
                category,
                priority,
            );
            match self.store.insert_issue(issue.clone()).await {
                Ok(()) => break issue,
                Err(Error::AlreadyExists(_)) if attempts < ID_RETRIES => attempts += 1,
                Err(e) => return Err(e),
            }
        };

        self.spawn_classification(&issue);
        Ok(issue)
    }

    /// Fetch an issue by id.
    pub async fn get_issue(&self, id: &str) -> Result<Issue> {
        self.store
            .get_issue(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Apply a partial update and return the merged record.
    ///
    /// An unknown id fails with NotFound before anything changes; the
    /// update itself validates before the first field is touched.
    pub async fn update_issue(&self, id: &str, updates: UpdateIssue) -> Result<Issue> {
        let mut issue = self.get_issue(id).await?;
        issue.apply_update(updates)?;
        self.store.update_issue(issue.clone()).await?;
        Ok(issue)
    }

    /// Hard-delete an issue and everything attached to it.
    ///
    /// Returns whether the issue existed.
    pub async fn delete_issue(&self, id: &str) -> Result<bool> {
        let existed = self.store.delete_issue(id).await?;
        if existed {
            let removed = self.store.delete_comments_for_issue(id).await?;
            if removed > 0 {
                tracing::debug!(issue = %id, removed, "removed comments of deleted issue");
            }
        }
        Ok(existed)
    }

    /// Filtered listing, newest first.
    ///
    /// Ties on `created_at` break by id, so pagination windows are stable
    /// across calls.
    pub async fn list_issues(&self, query: IssueQuery) -> Result<Vec<Issue>> {
        let mut issues = self.store.list_issues(&query.filter).await?;
        issues.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let offset = query.offset.unwrap_or(0);
        if offset >= issues.len() {
            return Ok(Vec::new());
        }
        issues.drain(..offset);
        if let Some(limit) = query.limit {
            issues.truncate(limit);
        }
        Ok(issues)
    }

    /// Recompute aggregate counts from the records as they are now.
    ///
    /// Only observed vocabulary values appear as keys.
    pub async fn issue_stats(&self) -> Result<IssueStats> {
        let issues = self.store.list_issues(&IssueFilter::default()).await?;

        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_priority: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &issues {
            *by_status.entry(issue.status.to_string()).or_insert(0) += 1;
            *by_category.entry(issue.category.to_string()).or_insert(0) += 1;
            *by_priority.entry(issue.priority.to_string()).or_insert(0) += 1;
        }

        Ok(IssueStats {
            total: issues.len(),
            by_status,
            by_category,
            by_priority,
        })
    }

    /// Post a comment on an existing issue.
    pub async fn add_comment(&self, issue_id: &str, input: NewComment) -> Result<Comment> {
        input.validate()?;
        if self.store.get_issue(issue_id).await?.is_none() {
            return Err(Error::Validation(format!("no such issue: {issue_id}")));
        }

        let mut attempts = 0;
        let comment = loop {
            let comment = Comment::new(
                id::generate_id(COMMENT_PREFIX),
                issue_id.to_string(),
                input.clone(),
            );
            match self.store.insert_comment(comment.clone()).await {
                Ok(()) => break comment,
                Err(Error::AlreadyExists(_)) if attempts < ID_RETRIES => attempts += 1,
                Err(e) => return Err(e),
            }
        };
        Ok(comment)
    }

    /// Comments for an issue, oldest first. Empty for an unknown issue.
    pub async fn list_comments(&self, issue_id: &str) -> Result<Vec<Comment>> {
        let mut comments = self.store.comments_for_issue(issue_id).await?;
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments)
    }

    /// Record an AI suggestion, if the issue still wants one.
    ///
    /// Applies only when the issue still exists and its `ai_category` is
    /// unset, so repeated or stale completions can never clobber an
    /// earlier suggestion. Returns whether the suggestion was applied.
    pub async fn apply_classification(&self, id: &str, result: Classification) -> Result<bool> {
        let Some(mut issue) = self.store.get_issue(id).await? else {
            return Ok(false);
        };
        if issue.ai_category.is_some() {
            return Ok(false);
        }

        issue.ai_category = Some(result.category);
        issue.ai_confidence = Some(result.confidence);
        issue.updated_at = Utc::now();
        self.store.update_issue(issue).await?;
        Ok(true)
    }

    fn spawn_classification(&self, issue: &Issue) {
        if self.classifier.is_none() {
            return;
        }
        let engine = self.clone();
        let id = issue.id.clone();
        let title = issue.title.clone();
        let description = issue.description.clone();
        tokio::spawn(async move {
            engine.classify_and_apply(&id, &title, &description).await;
        });
    }

    /// One classification round for an issue. Failures are logged and
    /// swallowed; the issue keeps unset AI fields.
    async fn classify_and_apply(&self, id: &str, title: &str, description: &str) {
        let Some(classifier) = &self.classifier else {
            return;
        };
        match classifier.categorize(title, description).await {
            Ok(result) => {
                if let Err(err) = self.apply_classification(id, result).await {
                    tracing::warn!(issue = %id, error = %err, "could not record classification");
                }
            }
            Err(err) => {
                tracing::warn!(
                    issue = %id,
                    error = %err,
                    "classification failed, leaving suggestion unset"
                );
            }
        }
    }
}
