use crate::Session;
use std::collections::HashSet;

/// Merge ephemeral and server sessions into the single rendered list.
///
/// De-dupes by id with the server copy winning on conflict; ephemeral-only
/// entries keep their relative order and go in front so a just-created
/// session appears immediately. Server entries are never reordered.
/// Idempotent for fixed inputs.
///
/// Known gap carried over from the original behavior: if the server confirms
/// a session under a *different* canonical id than the client-generated one,
/// the ephemeral entry is never retired and stays as a duplicate.
pub fn merge_sessions(server: &[Session], ephemeral: &[Session]) -> Vec<Session> {
    if server.is_empty() && ephemeral.is_empty() {
        return Vec::new();
    }

    let server_ids: HashSet<&str> = server.iter().map(|s| s.id.as_str()).collect();
    let mut merged: Vec<Session> = ephemeral
        .iter()
        .filter(|s| !s.id.is_empty() && !server_ids.contains(s.id.as_str()))
        .cloned()
        .collect();
    merged.extend(server.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(id: &str) -> Session {
        Session::ephemeral(id, "2024-01-01T00:00:00.000Z")
    }

    fn titled(id: &str, title: &str) -> Session {
        let mut sess = s(id);
        sess.title = title.to_string();
        sess
    }

    #[test]
    fn empty_inputs_merge_to_empty() {
        assert!(merge_sessions(&[], &[]).is_empty());
    }

    #[test]
    fn server_list_passes_through_unchanged() {
        let server = vec![s("a"), s("b")];
        assert_eq!(merge_sessions(&server, &[]), server);
    }

    #[test]
    fn ephemeral_only_entries_go_first() {
        let server = vec![s("a"), s("b")];
        let ephemeral = vec![s("x"), s("y")];
        let merged = merge_sessions(&server, &ephemeral);
        let ids: Vec<&str> = merged.iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, ["x", "y", "a", "b"]);
    }

    #[test]
    fn server_wins_on_id_conflict() {
        let server = vec![titled("a", "server a"), titled("b", "server b")];
        let ephemeral = vec![titled("a", "ephemeral a"), titled("c", "ephemeral c")];
        let merged = merge_sessions(&server, &ephemeral);
        let ids: Vec<&str> = merged.iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        let a = merged.iter().find(|x| x.id == "a").expect("a present");
        assert_eq!(a.title, "server a");
    }

    #[test]
    fn repeated_application_is_stable() {
        let server = vec![s("a")];
        let ephemeral = vec![s("x"), s("a")];
        let once = merge_sessions(&server, &ephemeral);
        let twice = merge_sessions(&server, &ephemeral);
        assert_eq!(once, twice);
    }
}
