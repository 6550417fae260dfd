//! Access control lists, their persisted form and the pluggable policy
//! that decides whether an operation is permitted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::path_lock::PathLockFactory;
use crate::serial::{RecordReader, RecordWriter};
use crate::sidecar::{self, SidecarKind, SidecarLayout};
use crate::{VfsError, VfsPath, VfsResult};

/// A basic permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read content, properties and listings.
    Read,
    /// Modify content, properties or the tree.
    Write,
    /// Modify the access control list.
    UpdateAcl,
    /// Implies every other permission.
    All,
}

impl Permission {
    /// Persisted spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::UpdateAcl => "update_acl",
            Self::All => "all",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = VfsError;

    fn from_str(s: &str) -> VfsResult<Self> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "update_acl" => Ok(Self::UpdateAcl),
            "all" => Ok(Self::All),
            other => Err(VfsError::server(format!("Unknown permission '{other}'"))),
        }
    }
}

/// Whether a principal names a single user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrincipalKind {
    /// A single user.
    User,
    /// A named group of users.
    Group,
}

impl PrincipalKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Group => "GROUP",
        }
    }

    fn parse(s: &str) -> VfsResult<Self> {
        match s {
            "USER" => Ok(Self::User),
            "GROUP" => Ok(Self::Group),
            other => Err(VfsError::server(format!("Unknown principal kind '{other}'"))),
        }
    }
}

/// Subject of an ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal {
    /// User or group name.
    pub name: String,
    /// User or group.
    pub kind: PrincipalKind,
}

impl Principal {
    /// A user principal.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PrincipalKind::User,
        }
    }

    /// A group principal.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PrincipalKind::Group,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PrincipalKind::User => write!(f, "user:{}", self.name),
            PrincipalKind::Group => write!(f, "group:{}", self.name),
        }
    }
}

/// Principal → permissions. Entries never have an empty permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    entries: BTreeMap<Principal, BTreeSet<Permission>>,
}

impl AccessControlList {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in list granting everything to the `user` and `temp_user`
    /// groups.
    #[must_use]
    pub fn default_acl() -> Self {
        let mut acl = Self::new();
        acl.update(
            [
                (Principal::group("user"), BTreeSet::from([Permission::All])),
                (Principal::group("temp_user"), BTreeSet::from([Permission::All])),
            ],
            false,
        );
        acl
    }

    /// Snapshot of all entries.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<Principal, BTreeSet<Permission>> {
        self.entries.clone()
    }

    /// Permissions of `principal`, empty if it has no entry.
    #[must_use]
    pub fn permissions(&self, principal: &Principal) -> BTreeSet<Permission> {
        self.entries.get(principal).cloned().unwrap_or_default()
    }

    /// True if the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `principal` holds `permission` directly or through `All`.
    #[must_use]
    pub fn grants(&self, principal: &Principal, permission: Permission) -> bool {
        self.entries
            .get(principal)
            .is_some_and(|set| set.contains(&Permission::All) || set.contains(&permission))
    }

    /// Merges `changes` into the list, or replaces it when `override_all`.
    ///
    /// Merging replaces the permission set of each named principal; an
    /// empty set removes the principal.
    pub fn update(
        &mut self,
        changes: impl IntoIterator<Item = (Principal, BTreeSet<Permission>)>,
        override_all: bool,
    ) {
        if override_all {
            self.entries.clear();
        }
        for (principal, permissions) in changes {
            if permissions.is_empty() {
                self.entries.remove(&principal);
            } else {
                self.entries.insert(principal, permissions);
            }
        }
    }

    pub(crate) fn encode(&self) -> VfsResult<Vec<u8>> {
        let mut w = RecordWriter::new();
        w.put_count(self.entries.len())?;
        for (principal, permissions) in &self.entries {
            w.put_str(&principal.name)?;
            w.put_str(principal.kind.as_str())?;
            w.put_count(permissions.len())?;
            for permission in permissions {
                w.put_str(permission.as_str())?;
            }
        }
        Ok(w.finish())
    }

    pub(crate) fn decode(bytes: &[u8]) -> VfsResult<Self> {
        let mut r = RecordReader::new(bytes);
        let mut acl = Self::new();
        for _ in 0..r.count()? {
            let name = r.str()?;
            let kind = PrincipalKind::parse(&r.str()?)?;
            let count = r.count()?;
            let permissions = (0..count)
                .map(|_| r.str()?.parse())
                .collect::<VfsResult<BTreeSet<Permission>>>()?;
            acl.update([(Principal { name, kind }, permissions)], false);
        }
        Ok(acl)
    }
}

/// Persists access control lists as side-car records.
#[derive(Debug)]
pub struct AclStore {
    layout: SidecarLayout,
    locks: Arc<PathLockFactory>,
    default_acl: AccessControlList,
}

impl AclStore {
    /// Creates a store that falls back to [`AccessControlList::default_acl`].
    #[must_use]
    pub fn new(layout: SidecarLayout, locks: Arc<PathLockFactory>) -> Self {
        Self {
            layout,
            locks,
            default_acl: AccessControlList::default_acl(),
        }
    }

    /// Persisted list of `path`, `None` if it has none.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` for unreadable records.
    pub fn persisted(&self, path: &VfsPath) -> VfsResult<Option<AccessControlList>> {
        let record = self.record(path);
        let _guard = self.locks.read(&record)?;
        sidecar::read_record(&record)?
            .map(|bytes| AccessControlList::decode(&bytes))
            .transpose()
    }

    /// List reported for `path`: its own, or the built-in default.
    ///
    /// # Errors
    ///
    /// See [`Self::persisted`].
    pub fn acl_for(&self, path: &VfsPath) -> VfsResult<AccessControlList> {
        Ok(self
            .persisted(path)?
            .unwrap_or_else(|| self.default_acl.clone()))
    }

    /// List governing `path`: the nearest persisted list on the way up
    /// to the root, or the built-in default.
    ///
    /// # Errors
    ///
    /// See [`Self::persisted`].
    pub fn effective_acl(&self, path: &VfsPath) -> VfsResult<AccessControlList> {
        let mut current = Some(path.clone());
        while let Some(p) = current {
            if let Some(acl) = self.persisted(&p)? {
                return Ok(acl);
            }
            current = p.parent();
        }
        Ok(self.default_acl.clone())
    }

    /// Persists `acl` for `path`; an empty list deletes the record.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` on I/O failure.
    pub fn write(&self, path: &VfsPath, acl: &AccessControlList) -> VfsResult<()> {
        let record = self.record(path);
        let _guard = self.locks.write(&record)?;
        if acl.is_empty() {
            sidecar::remove_record(&record)
        } else {
            sidecar::write_record(&record, &acl.encode()?)
        }
    }

    /// Copies the record of `from` to `to`, if any.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` on I/O failure.
    pub fn copy(&self, from: &VfsPath, to: &VfsPath) -> VfsResult<()> {
        let source = self.record(from);
        let target = self.record(to);
        let _guards = self.locks.read_write(&source, &target)?;
        sidecar::copy_record(&source, &target).map(|_| ())
    }

    /// Deletes the record of `path`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the record cannot be removed.
    pub fn remove(&self, path: &VfsPath) -> VfsResult<()> {
        let record = self.record(path);
        let _guard = self.locks.write(&record)?;
        sidecar::remove_record(&record)
    }

    /// Physical location of the record of `path`.
    #[must_use]
    pub fn record(&self, path: &VfsPath) -> PathBuf {
        self.layout.record_path(SidecarKind::Acl, path)
    }
}

/// Decides whether an operation on a path is permitted.
pub trait AccessPolicy: Send + Sync + fmt::Debug {
    /// Returns true if `permission` is granted on `path`.
    ///
    /// # Errors
    ///
    /// Implementations may surface ACL read failures.
    fn is_permitted(&self, path: &VfsPath, permission: Permission, acls: &AclStore) -> VfsResult<bool>;
}

/// Permits everything. Persisted lists are still stored and reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn is_permitted(&self, _: &VfsPath, _: Permission, _: &AclStore) -> VfsResult<bool> {
        Ok(true)
    }
}

/// Enforces the effective list against one user and its groups.
#[derive(Debug, Clone)]
pub struct PrincipalPolicy {
    principals: Vec<Principal>,
}

impl PrincipalPolicy {
    /// Policy for `user` belonging to `groups`.
    pub fn new(user: impl Into<String>, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut principals = vec![Principal::user(user)];
        principals.extend(groups.into_iter().map(Principal::group));
        Self { principals }
    }
}

impl AccessPolicy for PrincipalPolicy {
    fn is_permitted(&self, path: &VfsPath, permission: Permission, acls: &AclStore) -> VfsResult<bool> {
        let acl = acls.effective_acl(path)?;
        Ok(self.principals.iter().any(|p| acl.grants(p, permission)))
    }
}
