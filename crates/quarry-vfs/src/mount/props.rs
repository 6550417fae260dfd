//! Properties and access control lists.

use std::collections::BTreeSet;
use std::sync::Arc;

use quarry_events::VfsEvent;

use super::MountPoint;
use crate::acl::{AccessControlList, Permission, Principal};
use crate::handle::VirtualFile;
use crate::metadata::Metadata;
use crate::VfsResult;

impl MountPoint {
    /// All properties of `item`.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the record cannot be read.
    pub fn properties(&self, item: &VirtualFile) -> VfsResult<Arc<Metadata>> {
        self.metadata.get(item.path())
    }

    /// First value of property `name`.
    ///
    /// # Errors
    ///
    /// See [`Self::properties`].
    pub fn property_value(&self, item: &VirtualFile, name: &str) -> VfsResult<Option<String>> {
        self.metadata.value(item.path(), name)
    }

    /// All values of property `name`.
    ///
    /// # Errors
    ///
    /// See [`Self::properties`].
    pub fn property_values(&self, item: &VirtualFile, name: &str) -> VfsResult<Vec<String>> {
        self.metadata.values(item.path(), name)
    }

    /// Merges `changes` into the properties of `item`. A property mapped
    /// to no values is removed.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` if writing is not permitted or the file is
    ///   locked and `lock_token` does not match
    /// - `VfsError::Server` on I/O failure
    pub fn update_properties(
        &self,
        item: &VirtualFile,
        changes: &Metadata,
        lock_token: Option<&str>,
    ) -> VfsResult<Arc<Metadata>> {
        self.ensure_permitted(item, Permission::Write, "update properties of")?;
        self.ensure_unlocked(item, lock_token, "update properties of file")?;

        let updated = self.metadata.update(item.path(), changes)?;
        self.touch(item);
        self.publish(|metadata| VfsEvent::PropertiesUpdated {
            metadata,
            path: item.path().to_string(),
            is_folder: item.is_folder(),
        });
        Ok(updated)
    }

    /// Sets (or with `None` removes) a single-valued property.
    ///
    /// # Errors
    ///
    /// See [`Self::update_properties`].
    pub fn set_property(
        &self,
        item: &VirtualFile,
        name: &str,
        value: Option<&str>,
        lock_token: Option<&str>,
    ) -> VfsResult<Arc<Metadata>> {
        let mut changes = Metadata::new();
        changes.insert(
            name.to_owned(),
            value.map(|v| vec![v.to_owned()]).unwrap_or_default(),
        );
        self.update_properties(item, &changes, lock_token)
    }

    /// Access control list of `item`: the persisted one, or the default.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::Server` if the record cannot be read.
    pub fn acl(&self, item: &VirtualFile) -> VfsResult<AccessControlList> {
        self.acls.acl_for(item.path())
    }

    /// Merges `changes` into the ACL of `item`, or replaces it when
    /// `override_all` is set.
    ///
    /// # Errors
    ///
    /// - `VfsError::Forbidden` if updating the ACL is not permitted or
    ///   the file is locked and `lock_token` does not match
    /// - `VfsError::Server` on I/O failure
    pub fn update_acl(
        &self,
        item: &VirtualFile,
        changes: impl IntoIterator<Item = (Principal, BTreeSet<Permission>)>,
        override_all: bool,
        lock_token: Option<&str>,
    ) -> VfsResult<AccessControlList> {
        self.ensure_permitted(item, Permission::UpdateAcl, "update ACL of")?;
        self.ensure_unlocked(item, lock_token, "update ACL of file")?;

        let mut acl = self.acls.acl_for(item.path())?;
        acl.update(changes, override_all);
        self.acls.write(item.path(), &acl)?;
        self.publish(|metadata| VfsEvent::AclUpdated {
            metadata,
            path: item.path().to_string(),
            is_folder: item.is_folder(),
        });
        Ok(acl)
    }
}
