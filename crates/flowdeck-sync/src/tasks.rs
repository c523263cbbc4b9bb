//! Task-count aggregation.

use flowdeck_api::{ApiClient, ApiError, SortOrder, TaskListQuery};
use flowdeck_core::{TaskBucket, TaskCounts};

const COUNT_FETCH_LIMIT: u32 = 1000;

/// Load the four-bucket counts for a session.
///
/// Prefers one aggregate by-session fetch bucketed client-side; when that
/// fails, falls back to four per-status queries where an individual failure
/// counts as zero rather than failing the whole load.
pub async fn load_task_counts(
    client: &ApiClient,
    session_id: &str,
) -> Result<TaskCounts, ApiError> {
    let aggregate = TaskListQuery {
        session_id: None,
        status: None,
        limit: Some(COUNT_FETCH_LIMIT),
        order: SortOrder::Desc,
    };
    match client.tasks_list_by_session(session_id, &aggregate).await {
        Ok(tasks) => Ok(TaskCounts::tally(&tasks)),
        Err(err) => {
            if matches!(err, ApiError::MissingField { .. }) {
                return Err(err);
            }
            tracing::debug!(session = session_id, error = %err, "aggregate count fetch failed, falling back to per-status");
            let query_for = |bucket: TaskBucket| TaskListQuery {
                session_id: None,
                status: Some(bucket.query_label().to_string()),
                limit: Some(COUNT_FETCH_LIMIT),
                order: SortOrder::Desc,
            };
            let queued_query = query_for(TaskBucket::Queued);
            let in_progress_query = query_for(TaskBucket::InProgress);
            let done_query = query_for(TaskBucket::Done);
            let stuck_query = query_for(TaskBucket::Stuck);
            let (queued, in_progress, done, stuck) = tokio::join!(
                client.tasks_list_by_session(session_id, &queued_query),
                client.tasks_list_by_session(session_id, &in_progress_query),
                client.tasks_list_by_session(session_id, &done_query),
                client.tasks_list_by_session(session_id, &stuck_query),
            );
            let len_or_zero = |result: Result<Vec<_>, ApiError>, bucket: TaskBucket| {
                result.map(|tasks| tasks.len()).unwrap_or_else(|err| {
                    tracing::debug!(bucket = bucket.as_str(), error = %err, "per-status count fetch failed");
                    0
                })
            };
            Ok(TaskCounts {
                queued: len_or_zero(queued, TaskBucket::Queued),
                in_progress: len_or_zero(in_progress, TaskBucket::InProgress),
                done: len_or_zero(done, TaskBucket::Done),
                stuck: len_or_zero(stuck, TaskBucket::Stuck),
            })
        }
    }
}
