pub mod client;
pub mod envelope;
pub mod error;

pub use client::{
    AgentDraft, ApiClient, ApiConfig, CredMeta, ExecuteRequest, GitConfigUpdate, GitDelete,
    GitWrite, LatestExec, ProducerStartOptions, SessionListQuery, SortOrder, StopRequest,
    TaskDraft, TaskListQuery, ToolExecOptions, CLI_TOOLS_WORKFLOW,
};
pub use error::ApiError;
