//! Local persisted client state. Nothing here is server-authoritative:
//! reads tolerate absence, writes are last-writer-wins with no locking.
//!
//! Three facts live here: the selected project id (a process-scoped
//! override backed by a durable cross-run default), a per-user shortlist of
//! project ids, and the generated consumer identifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const STATE_FILE: &str = "state.toml";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    consumer_id: Option<String>,
    #[serde(default)]
    shortlists: BTreeMap<String, Vec<String>>,
}

#[derive(Debug)]
pub struct ClientStore {
    path: PathBuf,
    state: StoreState,
    // Process-lifetime selection; falls back to the durable value.
    session_project: Option<String>,
}

impl ClientStore {
    /// Open the store at `path`. A missing or unreadable file reads as
    /// "everything unset", never as an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = fs::read_to_string(&path)
            .ok()
            .map(|contents| toml::from_str(&contents).unwrap_or_default())
            .unwrap_or_default();
        Self {
            path,
            state,
            session_project: None,
        }
    }

    pub fn open_default() -> Self {
        Self::open(default_state_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current selection: the in-process override when set, else the durable
    /// cross-run default.
    pub fn selected_project(&self) -> Option<String> {
        self.session_project
            .clone()
            .or_else(|| self.state.project_id.clone())
    }

    /// Update the selection. An empty/None id clears only the process
    /// override; the last non-empty selection always becomes the durable
    /// default for future runs.
    pub fn set_selected_project(&mut self, id: Option<&str>) -> io::Result<()> {
        match id.map(str::trim).filter(|v| !v.is_empty()) {
            Some(id) => {
                self.session_project = Some(id.to_string());
                self.state.project_id = Some(id.to_string());
                self.save()
            }
            None => {
                self.session_project = None;
                Ok(())
            }
        }
    }

    /// The stable anonymous consumer id, generated on first use.
    pub fn consumer_id(&mut self) -> io::Result<String> {
        if let Some(id) = &self.state.consumer_id {
            return Ok(id.clone());
        }
        let id = Uuid::new_v4().to_string();
        self.state.consumer_id = Some(id.clone());
        self.save()?;
        Ok(id)
    }

    pub fn shortlist(&self, user_id: &str) -> Vec<String> {
        self.state
            .shortlists
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Put `project_id` at the front of the user's shortlist, de-duplicated.
    pub fn remember_project(&mut self, user_id: &str, project_id: &str) -> io::Result<()> {
        if user_id.is_empty() || project_id.is_empty() {
            return Ok(());
        }
        let list = self.state.shortlists.entry(user_id.to_string()).or_default();
        list.retain(|p| p != project_id);
        list.insert(0, project_id.to_string());
        self.save()
    }

    pub fn forget_project(&mut self, user_id: &str, project_id: &str) -> io::Result<()> {
        if let Some(list) = self.state.shortlists.get_mut(user_id) {
            list.retain(|p| p != project_id);
        }
        self.save()
    }

    fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(&self.state)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(&self.path, contents)
    }
}

fn default_state_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowdeck")
        .join(STATE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> ClientStore {
        ClientStore::open(dir.path().join(STATE_FILE))
    }

    #[test]
    fn missing_file_reads_as_unset() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert_eq!(store.selected_project(), None);
        assert!(store.shortlist("u1").is_empty());
    }

    #[test]
    fn garbage_file_reads_as_unset() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(STATE_FILE);
        fs::write(&path, "not valid toml [[[").expect("write");
        let store = ClientStore::open(path);
        assert_eq!(store.selected_project(), None);
    }

    #[test]
    fn selection_survives_reopen_via_durable_default() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.set_selected_project(Some("proj-1")).expect("set");
        drop(store);

        let store = store_in(&dir);
        assert_eq!(store.selected_project(), Some("proj-1".to_string()));
    }

    #[test]
    fn clearing_selection_keeps_the_durable_default() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.set_selected_project(Some("proj-1")).expect("set");
        store.set_selected_project(None).expect("clear");
        // The override is gone but the cross-run default remains.
        assert_eq!(store.selected_project(), Some("proj-1".to_string()));
    }

    #[test]
    fn consumer_id_is_generated_once() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        let first = store.consumer_id().expect("generate");
        assert_eq!(store.consumer_id().expect("reuse"), first);
        drop(store);

        let mut store = store_in(&dir);
        assert_eq!(store.consumer_id().expect("reload"), first);
    }

    #[test]
    fn shortlist_deduplicates_and_fronts_latest() {
        let dir = tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.remember_project("u1", "a").expect("add");
        store.remember_project("u1", "b").expect("add");
        store.remember_project("u1", "a").expect("re-add");
        assert_eq!(store.shortlist("u1"), ["a", "b"]);
        store.forget_project("u1", "b").expect("remove");
        assert_eq!(store.shortlist("u1"), ["a"]);
        // Other users are unaffected.
        assert!(store.shortlist("u2").is_empty());
    }
}
