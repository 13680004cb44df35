//! Entity model: photos, versions, tags and change tracking. No I/O.

pub mod changes;
pub mod photo;
pub mod tag;
pub mod version;

use chrono::{DateTime, Utc};

pub use changes::{PhotoChanges, PhotosChanges};
pub use photo::{Photo, PhotoError, PhotoId, SharedPhoto, MAX_RATING};
pub use tag::{Tag, TagError, TagId, TagTree, ROOT_CATEGORY_ID};
pub use version::{split_uri, PhotoVersion, VersionId, ORIGINAL_VERSION_ID};

/// A file about to be imported.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub uri: String,
    pub import_md5: Option<String>,
    pub name: String,
}

impl NewVersion {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            import_md5: None,
            name: "Original".to_string(),
        }
    }

    pub fn with_md5(mut self, md5: &str) -> Self {
        self.import_md5 = Some(md5.to_string());
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

/// An import candidate: one or more files that become one photo.
///
/// The first version is the original; the last one becomes the default.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub time: DateTime<Utc>,
    pub description: String,
    pub versions: Vec<NewVersion>,
}

impl NewPhoto {
    pub fn new(uri: &str, time: DateTime<Utc>) -> Self {
        Self {
            time,
            description: String::new(),
            versions: vec![NewVersion::new(uri)],
        }
    }

    pub fn with_version(mut self, version: NewVersion) -> Self {
        self.versions.push(version);
        self
    }
}
