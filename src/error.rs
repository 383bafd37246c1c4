use crate::model::ElementKey;

/// Inconsistencies in thread data or derived state. These are reported through
/// `tracing` and degraded around; they never reach the caller as errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("{key} appears more than once")]
    DuplicateId { key: ElementKey },
    #[error("post {post} has unknown parent {parent}")]
    UnknownParentPost { post: String, parent: String },
    #[error("post {post} is a second thread root")]
    ExtraRoot { post: String },
    #[error("post {post} is not reachable from the thread root")]
    UnreachablePost { post: String },
    #[error("comment {comment} replies to unknown post {post}")]
    UnknownCommentPost { comment: String, post: String },
    #[error("comment {comment} references unknown comment {parent}")]
    UnknownParentComment { comment: String, parent: String },
    #[error("comment {comment} continues chain link {parent} which already has a successor")]
    DuplicateChainLink { comment: String, parent: String },
    #[error("comment {comment} is not reachable from any reply root")]
    UnreachableComment { comment: String },
    #[error("collapse group {group} boundary {boundary} is not a top-level sibling")]
    StaleGroupBoundary { group: String, boundary: String },
    #[error("element {key} is not part of the active sequence")]
    UnknownElement { key: ElementKey },
}

pub(crate) fn report(err: IntegrityError) {
    tracing::warn!(error = %err, "thread_integrity_degraded");
}
