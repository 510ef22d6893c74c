use std::collections::HashSet;
use std::sync::Arc;

use taskbox_core::MAX_ATTACHMENTS;
use taskbox_store::{ObjectStore, StoreError};
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("a task cannot have more than {MAX_ATTACHMENTS} attachments")]
    TooManyAttachments,

    #[error("duplicate attachment name: {0}")]
    DuplicateName(String),
}

/// The outcome of diffing an existing attachment set against the desired one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Names present before that the client no longer wants.
    pub to_delete: Vec<String>,
    /// The record's attachment list after the update: kept names in their
    /// original order, then the newly uploaded ones.
    pub final_names: Vec<String>,
}

impl ReconcilePlan {
    /// Pure delta computation, no side effects. Cardinality and duplicate
    /// violations are caught here, before any object is touched, so a
    /// rejected update leaves the object store exactly as it was.
    ///
    /// Names in `keep` that are not in `existing` are ignored: the record
    /// must never reference an object that was not uploaded through us.
    pub fn compute(
        existing: &[String],
        keep: &[String],
        newly_uploaded: &[String],
    ) -> Result<Self, ReconcileError> {
        let keep_set: HashSet<&str> = keep.iter().map(String::as_str).collect();

        let mut kept = Vec::new();
        let mut to_delete = Vec::new();
        for name in existing {
            if keep_set.contains(name.as_str()) {
                kept.push(name.clone());
            } else {
                to_delete.push(name.clone());
            }
        }

        let mut final_names = kept;
        final_names.extend(newly_uploaded.iter().cloned());

        if final_names.len() > MAX_ATTACHMENTS {
            return Err(ReconcileError::TooManyAttachments);
        }
        let mut seen = HashSet::new();
        for name in &final_names {
            if !seen.insert(name.as_str()) {
                return Err(ReconcileError::DuplicateName(name.clone()));
            }
        }

        Ok(Self {
            to_delete,
            final_names,
        })
    }
}

/// Delete every object in `names` concurrently and wait for the whole phase
/// to settle. The caller must not persist its record unless this returns
/// `Ok`: a partial failure leaves already-deleted objects gone, and writing
/// the record anyway would reference them.
pub(crate) async fn delete_all(
    objects: &Arc<dyn ObjectStore>,
    names: &[String],
) -> Result<(), StoreError> {
    let mut set = JoinSet::new();
    for name in names {
        let objects = Arc::clone(objects);
        let name = name.clone();
        set.spawn(async move {
            objects
                .delete(&name)
                .await
                .map_err(|e| StoreError::Internal(format!("delete {name}: {e}")))
        });
    }

    let mut first_failure = None;
    while let Some(joined) = set.join_next().await {
        let result = joined
            .unwrap_or_else(|e| Err(StoreError::Internal(format!("delete task panicked: {e}"))));
        if let Err(e) = result {
            first_failure.get_or_insert(e);
        }
    }
    match first_failure {
        None => Ok(()),
        Some(e) => Err(e),
    }
}
