//! Client-side state synchronization over the gateway API: auth state,
//! latest-wins resource fetching, polling discipline, ephemeral-session
//! reconciliation, and optimistic mutation plumbing.

pub mod auth;
pub mod collapse;
pub mod fetch;
pub mod poll;
pub mod producer;
pub mod sessions;
pub mod tasks;

pub use auth::{AuthState, Identity};
pub use collapse::{CollapseController, CollapseUpdate};
pub use fetch::{FetchUpdate, ResourceFetcher};
pub use poll::{spawn_poller, Latest, PollTargets, PollTick};
pub use producer::{ProducerControls, ProducerUpdate};
pub use sessions::{
    generate_session_id, load_session_agent_config, setup_new_session, EphemeralSessions,
    NewSessionInput, NewSessionOutcome, SessionAgentConfig,
};
pub use tasks::load_task_counts;
