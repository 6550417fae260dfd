use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{VfsError, VfsResult};

/// Normalized, slash-separated logical path inside a mount.
///
/// Segments are never empty and never `.` or `..`; the root has no
/// segments and displays as `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VfsPath {
    elements: Vec<String>,
}

impl VfsPath {
    /// The mount root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses and normalizes a logical path.
    ///
    /// Empty and `.` segments are dropped and `..` removes the previous
    /// segment. Leading slashes are optional.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Forbidden` if `..` would climb above the root.
    pub fn parse(raw: &str) -> VfsResult<Self> {
        Self::root().join(raw)
    }

    /// Resolves `relative` against this path.
    ///
    /// `relative` may contain several segments (`a/b/c`).
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Forbidden` if `..` would climb above the root.
    pub fn join(&self, relative: &str) -> VfsResult<Self> {
        let mut elements = self.elements.clone();
        for segment in relative.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    if elements.pop().is_none() {
                        return Err(VfsError::Forbidden(format!(
                            "Path '{relative}' resolves above the mount root"
                        )));
                    }
                },
                name => elements.push(name.to_owned()),
            }
        }
        Ok(Self { elements })
    }

    /// Appends every segment of `tail`.
    #[must_use]
    pub fn append(&self, tail: &Self) -> Self {
        let mut elements = self.elements.clone();
        elements.extend(tail.elements.iter().cloned());
        Self { elements }
    }

    /// Returns true for the mount root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Last segment, or the empty string for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.elements.last().map_or("", String::as_str)
    }

    /// Parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.elements.split_last()?;
        Some(Self {
            elements: head.to_vec(),
        })
    }

    /// Path segments from the root down.
    #[must_use]
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true for the root, which has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Path made of the segments starting at index `from`.
    #[must_use]
    pub fn sub_path(&self, from: usize) -> Self {
        Self {
            elements: self.elements.get(from..).unwrap_or_default().to_vec(),
        }
    }

    /// True if `self` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        self.elements.len() > ancestor.elements.len() && self.elements.starts_with(&ancestor.elements)
    }

    /// Rewrites the `from` prefix of this path to `to`.
    ///
    /// Returns `None` if `self` is neither `from` nor below it.
    #[must_use]
    pub fn rebase(&self, from: &Self, to: &Self) -> Option<Self> {
        let rest = self.elements.strip_prefix(from.elements.as_slice())?;
        let mut elements = to.elements.clone();
        elements.extend(rest.iter().cloned());
        Some(Self { elements })
    }

    /// Slash-joined segments below `base`, without a leading slash.
    #[must_use]
    pub fn relative_to(&self, base: &Self) -> Option<String> {
        let rest = self.elements.strip_prefix(base.elements.as_slice())?;
        Some(rest.join("/"))
    }

    /// Physical location of this path under `root`.
    #[must_use]
    pub fn to_io_path(&self, root: &Path) -> PathBuf {
        let mut io = root.to_path_buf();
        io.extend(&self.elements);
        io
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return f.write_str("/");
        }
        for element in &self.elements {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for VfsPath {
    type Error = VfsError;

    fn try_from(value: String) -> VfsResult<Self> {
        Self::parse(&value)
    }
}

impl From<VfsPath> for String {
    fn from(value: VfsPath) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let p = VfsPath::parse("//a/./b//c/").unwrap();
        assert_eq!(p.to_string(), "/a/b/c");
        assert_eq!(p.len(), 3);
        assert_eq!(p.name(), "c");
    }

    #[test]
    fn test_root_display() {
        let root = VfsPath::parse("").unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.name(), "");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_dotdot_pops() {
        let p = VfsPath::parse("/a/b/../c").unwrap();
        assert_eq!(p.to_string(), "/a/c");
    }

    #[test]
    fn test_traversal_above_root_forbidden() {
        let res = VfsPath::parse("/a/../../etc");
        assert!(matches!(res, Err(VfsError::Forbidden(_))));
    }

    #[test]
    fn test_descendant_and_rebase() {
        let a = VfsPath::parse("/a").unwrap();
        let abc = VfsPath::parse("/a/b/c").unwrap();
        assert!(abc.is_descendant_of(&a));
        assert!(!a.is_descendant_of(&a));
        assert!(!VfsPath::parse("/ab").unwrap().is_descendant_of(&a));

        let z = VfsPath::parse("/z").unwrap();
        assert_eq!(abc.rebase(&a, &z).unwrap().to_string(), "/z/b/c");
        assert_eq!(abc.relative_to(&a).unwrap(), "b/c");
        assert!(z.rebase(&a, &abc).is_none());
    }

    #[test]
    fn test_sub_path_and_io_path() {
        let p = VfsPath::parse("/x/y/z").unwrap();
        assert_eq!(p.sub_path(1).to_string(), "/y/z");
        assert_eq!(
            VfsPath::parse("/a").unwrap().append(&p.sub_path(2)).to_string(),
            "/a/z"
        );
        assert!(p.sub_path(5).is_root());
        assert_eq!(
            p.to_io_path(Path::new("/srv/ws")),
            PathBuf::from("/srv/ws/x/y/z")
        );
    }
}
