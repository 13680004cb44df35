//! The photo entity and its mutation bookkeeping.
//!
//! Every mutating operation records what it touched into the photo's
//! `PhotoChanges`, created lazily on the first edit. The store reads that
//! record on commit and clears it afterwards.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

use super::changes::PhotoChanges;
use super::tag::{TagId, TagTree};
use super::version::{PhotoVersion, VersionId, ORIGINAL_VERSION_ID};

pub type PhotoId = i64;

/// Live, identity-mapped photo handle shared by the store and every view.
pub type SharedPhoto = Rc<RefCell<Photo>>;

pub const MAX_RATING: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhotoError {
    #[error("photo has no version {0}")]
    UnknownVersion(VersionId),
    #[error("a version named {0:?} already exists")]
    VersionNameExists(String),
    #[error("the original version cannot be {0}")]
    OriginalVersion(&'static str),
    #[error("version {0} is protected")]
    ProtectedVersion(VersionId),
}

#[derive(Debug, Clone)]
pub struct Photo {
    id: PhotoId,
    time: DateTime<Utc>,
    description: String,
    roll_id: i64,
    default_version_id: VersionId,
    rating: u32,
    tags: Vec<TagId>,
    versions: BTreeMap<VersionId, PhotoVersion>,
    highest_version_id: VersionId,
    all_versions_loaded: bool,
    changes: Option<PhotoChanges>,
}

impl Photo {
    /// A bare photo as read from a `photos` row; versions and tags are
    /// hydrated separately. Times are kept to whole seconds.
    pub fn new(id: PhotoId, time: DateTime<Utc>) -> Self {
        Self {
            id,
            time: time.trunc_subsecs(0),
            description: String::new(),
            roll_id: 0,
            default_version_id: ORIGINAL_VERSION_ID,
            rating: 0,
            tags: Vec::new(),
            versions: BTreeMap::new(),
            highest_version_id: 0,
            all_versions_loaded: false,
            changes: None,
        }
    }

    pub fn into_shared(self) -> SharedPhoto {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> PhotoId {
        self.id
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn roll_id(&self) -> i64 {
        self.roll_id
    }

    pub fn rating(&self) -> u32 {
        self.rating
    }

    pub fn default_version_id(&self) -> VersionId {
        self.default_version_id
    }

    pub fn tags(&self) -> &[TagId] {
        &self.tags
    }

    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }

    pub fn changes(&self) -> Option<&PhotoChanges> {
        self.changes.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.changes.as_ref().is_some_and(|c| !c.is_clean())
    }

    pub(crate) fn clear_changes(&mut self) {
        self.changes = None;
    }

    fn changes_mut(&mut self) -> &mut PhotoChanges {
        self.changes.get_or_insert_with(PhotoChanges::default)
    }

    pub fn all_versions_loaded(&self) -> bool {
        self.all_versions_loaded
    }

    /// Mark hydration complete. A default version that did not survive
    /// loading falls back to the original.
    pub(crate) fn set_all_versions_loaded(&mut self) {
        if self.default_version_id != ORIGINAL_VERSION_ID
            && !self.versions.contains_key(&self.default_version_id)
        {
            self.default_version_id = ORIGINAL_VERSION_ID;
        }
        self.all_versions_loaded = true;
    }

    // ------------------------------------------------------------------
    // Scalar properties
    // ------------------------------------------------------------------

    /// Stored to the second; sub-second parts are dropped.
    pub fn set_time(&mut self, time: DateTime<Utc>) {
        let time = time.trunc_subsecs(0);
        if self.time == time {
            return;
        }
        self.time = time;
        self.changes_mut().time_changed = true;
    }

    pub fn set_description(&mut self, description: &str) {
        if self.description == description {
            return;
        }
        self.description = description.to_string();
        self.changes_mut().description_changed = true;
    }

    pub fn set_roll_id(&mut self, roll_id: i64) {
        if self.roll_id == roll_id {
            return;
        }
        self.roll_id = roll_id;
        self.changes_mut().roll_id_changed = true;
    }

    /// Ratings above `MAX_RATING` are ignored.
    pub fn set_rating(&mut self, rating: u32) {
        if self.rating == rating || rating > MAX_RATING {
            return;
        }
        self.rating = rating;
        self.changes_mut().rating_changed = true;
    }

    pub fn set_default_version_id(&mut self, version_id: VersionId) -> Result<(), PhotoError> {
        if !self.versions.contains_key(&version_id) {
            return Err(PhotoError::UnknownVersion(version_id));
        }
        if self.default_version_id != version_id {
            self.default_version_id = version_id;
            self.changes_mut().default_version_id_changed = true;
        }
        Ok(())
    }

    // Loading-time setters: no change tracking.

    pub(crate) fn load_description(&mut self, description: String) {
        self.description = description;
    }

    pub(crate) fn load_roll_id(&mut self, roll_id: i64) {
        self.roll_id = roll_id;
    }

    pub(crate) fn load_rating(&mut self, rating: u32) {
        self.rating = rating;
    }

    pub(crate) fn load_default_version_id(&mut self, version_id: VersionId) {
        self.default_version_id = version_id;
    }

    // ------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------

    pub fn versions(&self) -> impl Iterator<Item = &PhotoVersion> {
        self.versions.values()
    }

    pub fn version_ids(&self) -> Vec<VersionId> {
        self.versions.keys().copied().collect()
    }

    pub fn version(&self, version_id: VersionId) -> Option<&PhotoVersion> {
        self.versions.get(&version_id)
    }

    pub fn default_version(&self) -> Option<&PhotoVersion> {
        self.versions.get(&self.default_version_id)
    }

    pub fn version_uri(&self, version_id: VersionId) -> Option<String> {
        self.versions.get(&version_id).map(PhotoVersion::uri)
    }

    /// Display name, taken from the original file.
    pub fn name(&self) -> Option<&str> {
        self.versions.get(&ORIGINAL_VERSION_ID).map(|v| v.filename.as_str())
    }

    pub fn version_name_exists(&self, name: &str) -> bool {
        self.versions.values().any(|v| v.name == name)
    }

    /// Insert a version with a known id. No name check; the id is recorded
    /// as added.
    pub fn add_version_unsafely(&mut self, version: PhotoVersion) {
        let version_id = version.version_id;
        self.highest_version_id = self.highest_version_id.max(version_id);
        self.versions.insert(version_id, version);
        self.changes_mut().add_version(version_id);
    }

    /// Attach a version read back from the store.
    pub(crate) fn hydrate_version(&mut self, version: PhotoVersion) {
        self.highest_version_id = self.highest_version_id.max(version.version_id);
        self.versions.insert(version.version_id, version);
    }

    pub fn add_version(
        &mut self,
        base_uri: &str,
        filename: &str,
        name: &str,
        is_protected: bool,
    ) -> Result<VersionId, PhotoError> {
        if self.version_name_exists(name) {
            return Err(PhotoError::VersionNameExists(name.to_string()));
        }
        let version_id = self.highest_version_id + 1;
        self.add_version_unsafely(PhotoVersion::new(version_id, base_uri, filename, None, name, is_protected));
        Ok(version_id)
    }

    /// Adopt another photo's version as a new version of this photo.
    ///
    /// The name is derived from the filename suffix relative to this photo's
    /// original, falling back to "Reparented", "Reparented (1)", ...
    pub fn create_reparented_version(&mut self, version: &PhotoVersion, is_protected: bool) -> VersionId {
        let stem = |filename: &str| -> String {
            match filename.rfind('.') {
                Some(pos) if pos > 0 => filename[..pos].to_string(),
                _ => filename.to_string(),
            }
        };
        let filename_stem = stem(&version.filename);
        let parent_stem = self.name().map(stem).unwrap_or_default();

        let mut name = String::new();
        if !parent_stem.is_empty() && filename_stem.starts_with(&parent_stem) {
            name = filename_stem[parent_stem.len()..]
                .replace(['(', ')'], "")
                .replace('_', " ")
                .trim()
                .to_string();
        }
        if name.is_empty() || self.version_name_exists(&name) {
            name = "Reparented".to_string();
            let mut num = 1;
            while self.version_name_exists(&name) {
                name = format!("Reparented ({})", num);
                num += 1;
            }
        }

        let version_id = self.highest_version_id + 1;
        self.add_version_unsafely(PhotoVersion::new(
            version_id,
            &version.base_uri,
            &version.filename,
            version.import_md5.clone(),
            &name,
            is_protected,
        ));
        version_id
    }

    pub fn rename_version(&mut self, version_id: VersionId, new_name: &str) -> Result<(), PhotoError> {
        if version_id == ORIGINAL_VERSION_ID {
            return Err(PhotoError::OriginalVersion("renamed"));
        }
        if self.version_name_exists(new_name) {
            return Err(PhotoError::VersionNameExists(new_name.to_string()));
        }
        let version = self
            .versions
            .get_mut(&version_id)
            .ok_or(PhotoError::UnknownVersion(version_id))?;
        version.name = new_name.to_string();
        self.changes_mut().change_version(version_id);
        Ok(())
    }

    /// Point a version at a different file. Protected versions are immutable.
    pub fn set_version_uri(&mut self, version_id: VersionId, base_uri: &str, filename: &str) -> Result<(), PhotoError> {
        let version = self
            .versions
            .get_mut(&version_id)
            .ok_or(PhotoError::UnknownVersion(version_id))?;
        if version.is_protected {
            return Err(PhotoError::ProtectedVersion(version_id));
        }
        let replacement = PhotoVersion::new(
            version_id,
            base_uri,
            filename,
            version.import_md5.clone(),
            &version.name,
            false,
        );
        *version = replacement;

        let changes = self.changes_mut();
        changes.change_version(version_id);
        if version_id == ORIGINAL_VERSION_ID {
            changes.uri_changed = true;
        }
        Ok(())
    }

    pub fn set_version_import_md5(&mut self, version_id: VersionId, md5: &str) -> Result<(), PhotoError> {
        let version = self
            .versions
            .get_mut(&version_id)
            .ok_or(PhotoError::UnknownVersion(version_id))?;
        version.import_md5 = Some(md5.to_string()).filter(|h| !h.is_empty());
        let changes = self.changes_mut();
        changes.change_version(version_id);
        changes.md5_sum_changed = true;
        Ok(())
    }

    /// Drop a version. The default moves to the highest remaining version.
    pub fn remove_version(&mut self, version_id: VersionId, remove_original: bool) -> Result<(), PhotoError> {
        if version_id == ORIGINAL_VERSION_ID && !remove_original {
            return Err(PhotoError::OriginalVersion("removed"));
        }
        if self.versions.remove(&version_id).is_none() {
            return Err(PhotoError::UnknownVersion(version_id));
        }
        self.changes_mut().remove_version(version_id);

        if let Some(highest) = self.versions.keys().next_back().copied() {
            if self.default_version_id != highest {
                self.default_version_id = highest;
                self.changes_mut().default_version_id_changed = true;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    /// Add without checking for duplicates.
    pub fn add_tag_unsafely(&mut self, tag: TagId) {
        self.tags.push(tag);
        self.changes_mut().add_tag(tag);
    }

    pub(crate) fn hydrate_tag(&mut self, tag: TagId) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn add_tag(&mut self, tag: TagId) {
        if !self.tags.contains(&tag) {
            self.add_tag_unsafely(tag);
        }
    }

    pub fn add_tags(&mut self, tags: &[TagId]) {
        for tag in tags {
            self.add_tag(*tag);
        }
    }

    pub fn remove_tag(&mut self, tag: TagId) {
        let Some(pos) = self.tags.iter().position(|t| *t == tag) else {
            return;
        };
        self.tags.remove(pos);
        self.changes_mut().remove_tag(tag);
    }

    pub fn remove_tags(&mut self, tags: &[TagId]) {
        for tag in tags {
            self.remove_tag(*tag);
        }
    }

    /// Remove tags, and for categories every tag beneath them.
    pub fn remove_category(&mut self, tags: &[TagId], tree: &TagTree) {
        for tag in tags {
            if tree.get(*tag).is_some_and(|t| t.is_category) {
                self.remove_tags(&tree.descendants(*tag));
            }
            self.remove_tag(*tag);
        }
    }

    pub fn copy_attributes_from(&mut self, other: &Photo) {
        self.set_time(other.time);
        self.set_description(&other.description);
        self.set_rating(other.rating);
        let tags = other.tags.clone();
        self.add_tags(&tags);
    }
}
