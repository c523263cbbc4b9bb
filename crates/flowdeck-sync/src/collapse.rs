//! Optimistic collapse/expand state for a transcript group, persisted
//! server-side through the collapse-state endpoint.

use flowdeck_api::{ApiClient, ApiError};
use flowdeck_core::optimistic::{OptimisticToggle, ToggleEffect};
use serde_json::Value;
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct CollapseUpdate {
    pub group: String,
    pub result: Result<Value, ApiError>,
}

#[derive(Debug)]
pub struct CollapseController {
    session_id: String,
    group: String,
    response_id: Option<String>,
    toggle: OptimisticToggle,
}

impl CollapseController {
    pub fn new(
        session_id: impl Into<String>,
        group: impl Into<String>,
        response_id: Option<String>,
        server_expanded: bool,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            group: group.into(),
            response_id,
            toggle: OptimisticToggle::new(server_expanded),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// The expanded state the UI should render.
    pub fn expanded(&self) -> bool {
        self.toggle.resolved()
    }

    pub fn notice_active(&self, now: Instant) -> bool {
        self.toggle.notice_active(now)
    }

    /// User clicked the chevron: flip immediately, debounce the send.
    pub fn on_user_toggle(&mut self, now: Instant) {
        self.toggle.toggle(now);
    }

    /// Fresh server snapshot for this group.
    pub fn on_server(&mut self, expanded: bool) {
        self.toggle.on_server(expanded);
    }

    /// Drive timers; when the debounce window closes on a value that still
    /// needs sending, spawn the mutation and report back over `tx`.
    pub fn poll<E, W>(&mut self, now: Instant, client: &ApiClient, tx: mpsc::Sender<E>, wrap: W)
    where
        E: Send + 'static,
        W: FnOnce(CollapseUpdate) -> E + Send + 'static,
    {
        if let ToggleEffect::Send(target) = self.toggle.poll(now) {
            let client = client.clone();
            let session_id = self.session_id.clone();
            let group = self.group.clone();
            let response_id = self.response_id.clone();
            tokio::spawn(async move {
                let result = client
                    .collapse_state_set(&session_id, &group, target, response_id.as_deref())
                    .await;
                let _ = tx
                    .send(wrap(CollapseUpdate {
                        group: group.clone(),
                        result,
                    }))
                    .await;
            });
        }
    }

    /// Fold the send result back in. Returns true when the failure was a
    /// 400/401 rejection and the optimistic value was rolled back.
    pub fn apply(&mut self, update: CollapseUpdate, now: Instant) -> bool {
        match update.result {
            Ok(_) => {
                self.toggle.on_send_ok();
                false
            }
            Err(err) => {
                let rolled_back = self.toggle.on_send_err(err.http_status(), now);
                if !rolled_back {
                    // Transient failure: keep the override, the next poll
                    // corrects it if the server disagrees.
                    tracing::debug!(group = %self.group, error = %err, "collapse send failed");
                }
                rolled_back
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn controller() -> CollapseController {
        CollapseController::new("sess-1", "plan", None, false)
    }

    #[tokio::test]
    async fn rejection_rolls_back_and_raises_notice() {
        let start = Instant::now();
        let mut ctl = controller();
        ctl.on_user_toggle(start);
        assert!(ctl.expanded());

        let rolled_back = ctl.apply(
            CollapseUpdate {
                group: "plan".to_string(),
                result: Err(ApiError::Status {
                    status: 401,
                    message: "expired".to_string(),
                    body: json!({}),
                }),
            },
            start + Duration::from_millis(300),
        );
        // Not in flight yet (debounce window still open): nothing to revert.
        assert!(!rolled_back);

        // Close the window against an unreachable client to enter InFlight.
        let client = ApiClient::new(flowdeck_api::ApiConfig::new("http://127.0.0.1:1/api"));
        let (tx, _rx) = mpsc::channel::<CollapseUpdate>(1);
        ctl.poll(start + Duration::from_millis(250), &client, tx.clone(), |u| u);
        let rolled_back = ctl.apply(
            CollapseUpdate {
                group: "plan".to_string(),
                result: Err(ApiError::Status {
                    status: 401,
                    message: "expired".to_string(),
                    body: json!({}),
                }),
            },
            start + Duration::from_millis(400),
        );
        assert!(rolled_back);
        assert!(!ctl.expanded());
        assert!(ctl.notice_active(start + Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn transient_failure_keeps_the_override() {
        let start = Instant::now();
        let mut ctl = controller();
        ctl.on_user_toggle(start);
        let client = ApiClient::new(flowdeck_api::ApiConfig::new("http://127.0.0.1:1/api"));
        let (tx, _rx) = mpsc::channel::<CollapseUpdate>(1);
        ctl.poll(start + Duration::from_millis(250), &client, tx.clone(), |u| u);

        let rolled_back = ctl.apply(
            CollapseUpdate {
                group: "plan".to_string(),
                result: Err(ApiError::Status {
                    status: 502,
                    message: "bad gateway".to_string(),
                    body: json!({}),
                }),
            },
            start + Duration::from_millis(400),
        );
        assert!(!rolled_back);
        assert!(ctl.expanded());
    }

    #[tokio::test]
    async fn server_catchup_clears_the_override() {
        let start = Instant::now();
        let mut ctl = controller();
        ctl.on_user_toggle(start);
        let client = ApiClient::new(flowdeck_api::ApiConfig::new("http://127.0.0.1:1/api"));
        let (tx, _rx) = mpsc::channel::<CollapseUpdate>(1);
        ctl.poll(start + Duration::from_millis(250), &client, tx.clone(), |u| u);
        ctl.apply(
            CollapseUpdate {
                group: "plan".to_string(),
                result: Ok(json!({"ok": true})),
            },
            start + Duration::from_millis(300),
        );
        assert!(ctl.expanded());
        ctl.on_server(true);
        assert!(ctl.expanded());
    }
}
