//! Parsing for remote directory listings produced by `ls -1aF` through the
//! generic tool-execution endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FsEntryKind {
    Dir,
    File,
    Symlink,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsEntry {
    pub name: String,
    pub path: String,
    pub kind: FsEntryKind,
    pub executable: bool,
}

/// Parse `ls -1aF` output into entries, classifying by the `-F` suffix.
/// Hidden (dot-prefixed) entries are excluded; stray ANSI color codes are
/// stripped first.
pub fn parse_ls_classified(output: &str, parent_path: &str) -> Vec<FsEntry> {
    let mut out = Vec::new();
    for raw in output.lines() {
        let line = strip_ansi(raw);
        if line.is_empty() {
            continue;
        }
        let (kind, executable, name) = classify_suffix(&line);
        if name.is_empty() || name.starts_with('.') {
            continue;
        }
        out.push(FsEntry {
            path: join_path(parent_path, name),
            name: name.to_string(),
            kind,
            executable,
        });
    }
    out
}

fn classify_suffix(line: &str) -> (FsEntryKind, bool, &str) {
    match line.as_bytes().last() {
        Some(b'/') => (FsEntryKind::Dir, false, &line[..line.len() - 1]),
        Some(b'@') => (FsEntryKind::Symlink, false, &line[..line.len() - 1]),
        Some(b'*') => (FsEntryKind::File, true, &line[..line.len() - 1]),
        Some(b'=') | Some(b'|') => (FsEntryKind::Other, false, &line[..line.len() - 1]),
        _ => (FsEntryKind::File, false, line),
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() || base == "." {
        return format!("./{name}");
    }
    if base.ends_with('/') {
        return format!("{base}{name}");
    }
    format!("{base}/{name}")
}

/// Drop `ESC [ ... m` color sequences.
fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_suffixes() {
        let entries = parse_ls_classified("src/\nREADME.md\nrun.sh*\nlink@\nsock=\n", "repo");
        let kinds: Vec<(&str, FsEntryKind, bool)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.kind, e.executable))
            .collect();
        assert_eq!(
            kinds,
            [
                ("src", FsEntryKind::Dir, false),
                ("README.md", FsEntryKind::File, false),
                ("run.sh", FsEntryKind::File, true),
                ("link", FsEntryKind::Symlink, false),
                ("sock", FsEntryKind::Other, false),
            ]
        );
        assert_eq!(entries[0].path, "repo/src");
    }

    #[test]
    fn hidden_entries_are_excluded() {
        let entries = parse_ls_classified("./\n../\n.git/\nvisible\n", ".");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "./visible");
    }

    #[test]
    fn strips_ansi_color_codes() {
        let entries = parse_ls_classified("\u{1b}[34msrc/\u{1b}[0m\n", "");
        assert_eq!(entries[0].name, "src");
        assert_eq!(entries[0].kind, FsEntryKind::Dir);
        assert_eq!(entries[0].path, "./src");
    }

    #[test]
    fn empty_output_parses_to_nothing() {
        assert!(parse_ls_classified("", "x").is_empty());
    }
}
