//! Path metadata snapshots

use serde::{Deserialize, Serialize};

/// Whether a path is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Immutable metadata snapshot of a path
///
/// `size` is only meaningful for files. `children` is present only on the
/// directory returned by `Resource::stat` and holds one level of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Last path component (`/` for the root)
    pub name: String,

    pub kind: EntryKind,

    /// Size in bytes
    pub size: u64,

    /// Last modification time, seconds since the epoch; 0 when unknown
    pub time: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Stat>>,
}

impl Stat {
    /// Create a file entry
    pub fn file(name: impl Into<String>, size: u64, time: i64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            time,
            children: None,
        }
    }

    /// Create a directory entry without children
    pub fn directory(name: impl Into<String>, time: i64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            time,
            children: None,
        }
    }

    /// Attach one level of children
    ///
    /// Grandchildren are dropped so that the listing stays non-recursive.
    pub fn with_children(mut self, children: Vec<Stat>) -> Self {
        let children = children
            .into_iter()
            .map(|mut child| {
                child.children = None;
                child
            })
            .collect();
        self.children = Some(children);
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Human-readable size
    pub fn size_human(&self) -> String {
        humansize::format_size(self.size, humansize::BINARY)
    }

    /// Modification time as a timestamp, if representable
    pub fn modified(&self) -> Option<jiff::Timestamp> {
        jiff::Timestamp::from_second(self.time).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_file() {
        let stat = Stat::file("a.txt", 1024, 1_700_000_000);
        assert!(stat.is_file());
        assert!(!stat.is_dir());
        assert_eq!(stat.size_human(), "1 KiB");
        assert_eq!(stat.modified().unwrap().as_second(), 1_700_000_000);
    }

    #[test]
    fn test_children_are_one_level() {
        let nested = Stat::directory("inner", 0).with_children(vec![Stat::file("x", 1, 0)]);
        let outer = Stat::directory("outer", 0).with_children(vec![nested, Stat::file("y", 2, 0)]);

        let children = outer.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert!(children[0].is_dir());
        assert!(children[0].children.is_none());
        assert!(children[1].is_file());
    }

    #[test]
    fn test_serialize_skips_missing_children() {
        let json = serde_json::to_value(Stat::file("a", 3, 0)).unwrap();
        assert_eq!(json["kind"], "file");
        assert!(json.get("children").is_none());
    }
}
