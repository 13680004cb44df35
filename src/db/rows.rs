//! Typed row decoding. Every column read by name happens here.

use chrono::{DateTime, Utc};
use rusqlite::{Row, RowIndex};

use crate::model::{Photo, PhotoId, PhotoVersion, Tag, TagId, VersionId, MAX_RATING};

/// A unix-seconds column as a UTC time. Values chrono cannot represent
/// fail the row.
pub(crate) fn time_column<I: RowIndex + Copy>(row: &Row<'_>, idx: I) -> rusqlite::Result<DateTime<Utc>> {
    let seconds: i64 = row.get(idx)?;
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| rusqlite::Error::IntegralValueOutOfRange(idx.idx(row.as_ref()).unwrap_or_default(), seconds))
}

/// Scalar columns of a `photos` row, or of a table materialized from one.
#[derive(Debug, Clone)]
pub(crate) struct PhotoRow {
    pub id: PhotoId,
    pub time: DateTime<Utc>,
    pub description: String,
    pub roll_id: i64,
    pub default_version_id: VersionId,
    pub rating: u32,
}

impl PhotoRow {
    pub const COLUMNS: &'static str = "id, time, description, roll_id, default_version_id, rating";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let rating: Option<i64> = row.get("rating")?;
        Ok(Self {
            id: row.get("id")?,
            time: time_column(row, "time")?,
            description: row.get::<_, Option<String>>("description")?.unwrap_or_default(),
            roll_id: row.get::<_, Option<i64>>("roll_id")?.unwrap_or(0),
            default_version_id: row.get("default_version_id")?,
            rating: rating.map_or(0, |r| r.clamp(0, MAX_RATING as i64) as u32),
        })
    }

    pub fn into_photo(self) -> Photo {
        let mut photo = Photo::new(self.id, self.time);
        photo.load_description(self.description);
        photo.load_roll_id(self.roll_id);
        photo.load_rating(self.rating);
        photo.load_default_version_id(self.default_version_id);
        photo
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VersionRow {
    pub photo_id: PhotoId,
    pub version: PhotoVersion,
}

impl VersionRow {
    pub const COLUMNS: &'static str = "photo_id, version_id, name, base_uri, filename, import_md5, protected";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let name: Option<String> = row.get("name")?;
        let base_uri: String = row.get("base_uri")?;
        let filename: String = row.get("filename")?;
        let protected: Option<bool> = row.get("protected")?;
        Ok(Self {
            photo_id: row.get("photo_id")?,
            version: PhotoVersion::new(
                row.get("version_id")?,
                &base_uri,
                &filename,
                row.get("import_md5")?,
                name.as_deref().unwrap_or_default(),
                protected.unwrap_or(false),
            ),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TagRow {
    pub tag: Tag,
}

impl TagRow {
    pub const COLUMNS: &'static str = "id, name, category_id, is_category, sort_priority, icon";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: TagId = row.get("id")?;
        let name: String = row.get("name")?;
        let category: Option<TagId> = row.get("category_id")?;
        let is_category: Option<bool> = row.get("is_category")?;
        let mut tag = Tag::new(id, &name, category.unwrap_or(0), is_category.unwrap_or(false));
        tag.sort_priority = row.get::<_, Option<i32>>("sort_priority")?.unwrap_or(0);
        tag.icon = row.get("icon")?;
        Ok(Self { tag })
    }
}
