//! Field-level change tracking for photos.
//!
//! A `PhotoChanges` records what was edited on a single photo since it was
//! last loaded or committed. The store uses it to issue only the statements
//! needed for the fields that actually changed. `PhotosChanges` is the
//! aggregate published to observers after a batch commit.

use std::collections::BTreeSet;
use std::ops::BitOrAssign;

use super::tag::TagId;
use super::version::VersionId;

/// Per-photo diff accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoChanges {
    pub description_changed: bool,
    pub default_version_id_changed: bool,
    pub time_changed: bool,
    pub uri_changed: bool,
    pub rating_changed: bool,
    pub roll_id_changed: bool,
    pub md5_sum_changed: bool,
    pub tags_added: BTreeSet<TagId>,
    pub tags_removed: BTreeSet<TagId>,
    pub versions_added: BTreeSet<VersionId>,
    pub versions_removed: BTreeSet<VersionId>,
    pub versions_modified: BTreeSet<VersionId>,
}

impl PhotoChanges {
    /// True when any column of the `photos` row needs rewriting.
    pub fn data_changed(&self) -> bool {
        self.description_changed
            || self.default_version_id_changed
            || self.time_changed
            || self.uri_changed
            || self.rating_changed
            || self.roll_id_changed
            || self.md5_sum_changed
    }

    pub fn tags_changed(&self) -> bool {
        !self.tags_added.is_empty() || !self.tags_removed.is_empty()
    }

    pub fn versions_changed(&self) -> bool {
        !self.versions_added.is_empty()
            || !self.versions_removed.is_empty()
            || !self.versions_modified.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.data_changed() && !self.tags_changed() && !self.versions_changed()
    }

    pub fn add_tag(&mut self, tag: TagId) {
        if !self.tags_removed.remove(&tag) {
            self.tags_added.insert(tag);
        }
    }

    pub fn remove_tag(&mut self, tag: TagId) {
        if !self.tags_added.remove(&tag) {
            self.tags_removed.insert(tag);
        }
    }

    pub fn add_version(&mut self, version_id: VersionId) {
        if self.versions_removed.remove(&version_id) {
            // Re-added under the same id: the row still exists, rewrite it.
            self.versions_modified.insert(version_id);
        } else {
            self.versions_added.insert(version_id);
        }
    }

    pub fn remove_version(&mut self, version_id: VersionId) {
        self.versions_modified.remove(&version_id);
        if !self.versions_added.remove(&version_id) {
            self.versions_removed.insert(version_id);
        }
    }

    pub fn change_version(&mut self, version_id: VersionId) {
        // A version added in this change set is inserted with its final values.
        if !self.versions_added.contains(&version_id) {
            self.versions_modified.insert(version_id);
        }
    }
}

/// Aggregate of the kinds of edits across a batch of photos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotosChanges {
    pub description_changed: bool,
    pub default_version_id_changed: bool,
    pub time_changed: bool,
    pub uri_changed: bool,
    pub rating_changed: bool,
    pub roll_id_changed: bool,
    pub md5_sum_changed: bool,
    pub tags_changed: bool,
    pub versions_changed: bool,
}

impl PhotosChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl BitOrAssign<&PhotoChanges> for PhotosChanges {
    fn bitor_assign(&mut self, rhs: &PhotoChanges) {
        self.description_changed |= rhs.description_changed;
        self.default_version_id_changed |= rhs.default_version_id_changed;
        self.time_changed |= rhs.time_changed;
        self.uri_changed |= rhs.uri_changed;
        self.rating_changed |= rhs.rating_changed;
        self.roll_id_changed |= rhs.roll_id_changed;
        self.md5_sum_changed |= rhs.md5_sum_changed;
        self.tags_changed |= rhs.tags_changed();
        self.versions_changed |= rhs.versions_changed();
    }
}

impl BitOrAssign for PhotosChanges {
    fn bitor_assign(&mut self, rhs: PhotosChanges) {
        self.description_changed |= rhs.description_changed;
        self.default_version_id_changed |= rhs.default_version_id_changed;
        self.time_changed |= rhs.time_changed;
        self.uri_changed |= rhs.uri_changed;
        self.rating_changed |= rhs.rating_changed;
        self.roll_id_changed |= rhs.roll_id_changed;
        self.md5_sum_changed |= rhs.md5_sum_changed;
        self.tags_changed |= rhs.tags_changed;
        self.versions_changed |= rhs.versions_changed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_add_cancels_pending_removal() {
        let mut changes = PhotoChanges::default();
        changes.remove_tag(7);
        assert!(changes.tags_removed.contains(&7));

        changes.add_tag(7);
        assert!(changes.tags_removed.is_empty());
        assert!(changes.tags_added.is_empty());
        assert!(changes.is_clean());
    }

    #[test]
    fn test_removing_added_version_drops_it() {
        let mut changes = PhotoChanges::default();
        changes.add_version(2);
        changes.change_version(2);
        assert!(changes.versions_modified.is_empty());

        changes.remove_version(2);
        assert!(changes.versions_added.is_empty());
        assert!(changes.versions_removed.is_empty());
    }

    #[test]
    fn test_modified_then_removed_version() {
        let mut changes = PhotoChanges::default();
        changes.change_version(3);
        changes.remove_version(3);
        assert!(changes.versions_modified.is_empty());
        assert_eq!(changes.versions_removed.iter().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_aggregate() {
        let mut a = PhotoChanges::default();
        a.rating_changed = true;
        let mut b = PhotoChanges::default();
        b.add_tag(1);

        let mut all = PhotosChanges::default();
        assert!(all.is_empty());
        all |= &a;
        all |= &b;
        assert!(all.rating_changed);
        assert!(all.tags_changed);
        assert!(!all.versions_changed);
        assert!(!all.time_changed);
    }
}
