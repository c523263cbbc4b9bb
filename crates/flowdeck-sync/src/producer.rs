//! Producer start/stop controls with in-flight flags.

use flowdeck_api::{ApiClient, ApiError, ProducerStartOptions};
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum ProducerUpdate {
    Started(Result<Value, ApiError>),
    Stopped(Result<Value, ApiError>),
}

#[derive(Debug, Default)]
pub struct ProducerControls {
    starting: bool,
    stopping: bool,
    error: Option<String>,
    last_response: Option<Value>,
}

impl ProducerControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting(&self) -> bool {
        self.starting
    }

    pub fn stopping(&self) -> bool {
        self.stopping
    }

    pub fn busy(&self) -> bool {
        self.starting || self.stopping
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn reset_error(&mut self) {
        self.error = None;
    }

    pub fn last_response(&self) -> Option<&Value> {
        self.last_response.as_ref()
    }

    pub fn begin_start<E, W>(
        &mut self,
        client: ApiClient,
        options: ProducerStartOptions,
        tx: mpsc::Sender<E>,
        wrap: W,
    ) where
        E: Send + 'static,
        W: FnOnce(ProducerUpdate) -> E + Send + 'static,
    {
        if self.busy() {
            return;
        }
        self.starting = true;
        self.error = None;
        tokio::spawn(async move {
            let result = client.producer_start(&options).await;
            let _ = tx.send(wrap(ProducerUpdate::Started(result))).await;
        });
    }

    pub fn begin_stop<E, W>(&mut self, client: ApiClient, tx: mpsc::Sender<E>, wrap: W)
    where
        E: Send + 'static,
        W: FnOnce(ProducerUpdate) -> E + Send + 'static,
    {
        if self.busy() {
            return;
        }
        self.stopping = true;
        self.error = None;
        tokio::spawn(async move {
            let result = client.producer_stop().await;
            let _ = tx.send(wrap(ProducerUpdate::Stopped(result))).await;
        });
    }

    pub fn apply(&mut self, update: ProducerUpdate) {
        let result = match update {
            ProducerUpdate::Started(result) => {
                self.starting = false;
                result
            }
            ProducerUpdate::Stopped(result) => {
                self.stopping = false;
                result
            }
        };
        match result {
            Ok(response) => self.last_response = Some(response),
            Err(err) => self.error = Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_clears_flags_and_records_outcome() {
        let mut controls = ProducerControls::new();
        controls.starting = true;
        controls.apply(ProducerUpdate::Started(Ok(json!({"ok": true}))));
        assert!(!controls.busy());
        assert!(controls.error().is_none());
        assert_eq!(controls.last_response().unwrap()["ok"], true);

        controls.stopping = true;
        controls.apply(ProducerUpdate::Stopped(Err(ApiError::Status {
            status: 500,
            message: "down".to_string(),
            body: json!({}),
        })));
        assert!(!controls.busy());
        assert!(controls.error().unwrap().contains("down"));
        controls.reset_error();
        assert!(controls.error().is_none());
    }
}
