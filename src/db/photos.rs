//! Photo persistence: import, identity-mapped loading, diff-based commit,
//! removal, duplicate detection and materialized-table helpers.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Params, Transaction};
use tracing::{debug, warn};

use super::cache::PhotoCache;
use super::events::{PhotoStoreObserver, StoreEvent};
use super::rows::{PhotoRow, VersionRow};
use super::{placeholders, Database};
use crate::hashing::{md5_file, uri_to_path};
use crate::model::{
    split_uri, NewPhoto, Photo, PhotoId, PhotoVersion, PhotosChanges, SharedPhoto, TagId, VersionId,
    ORIGINAL_VERSION_ID,
};
use crate::query::{build_query, materialize, where_sql, Condition, ConditionWrapper, HiddenTag, Term};
use crate::session::Session;

/// Upper bound on ids bound into a single `IN (...)` list.
const IN_LIST_CHUNK: usize = 500;

/// Photos per calendar month, keyed by year. Years between the first and
/// last populated year are present even when empty.
pub type MonthHistogram = BTreeMap<i32, [u32; 12]>;

pub struct PhotoStore {
    db: Rc<Database>,
    session: Rc<Session>,
    cache: Rc<PhotoCache>,
    strict_transactions: bool,
    observers: RefCell<Vec<Weak<dyn PhotoStoreObserver>>>,
}

impl PhotoStore {
    pub fn new(db: Rc<Database>, session: Rc<Session>, cache: Rc<PhotoCache>) -> Self {
        Self {
            db,
            session,
            cache,
            strict_transactions: false,
            observers: RefCell::new(Vec::new()),
        }
    }

    /// Make a failed transaction start an error instead of falling back to
    /// unguarded statements.
    pub fn with_strict_transactions(mut self, strict: bool) -> Self {
        self.strict_transactions = strict;
        self
    }

    pub fn database(&self) -> &Rc<Database> {
        &self.db
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    pub fn cache(&self) -> &Rc<PhotoCache> {
        &self.cache
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn subscribe(&self, observer: Weak<dyn PhotoStoreObserver>) {
        self.observers.borrow_mut().push(observer);
    }

    fn emit(&self, event: StoreEvent) {
        // Collect first: observers may call back into the store.
        let live: Vec<Rc<dyn PhotoStoreObserver>> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in live {
            observer.on_store_event(&event);
        }
    }

    // ========================================================================
    // Import
    // ========================================================================

    /// Import a photo. Versions get ids 1, 2, ... in order; the last one is
    /// the default. With `default_version_only` only the last version is
    /// imported, under the original id.
    pub fn create_from(&self, item: &NewPhoto, default_version_only: bool, roll_id: i64) -> Result<SharedPhoto> {
        let versions = if default_version_only {
            &item.versions[item.versions.len().saturating_sub(1)..]
        } else {
            &item.versions[..]
        };
        let Some(original) = versions.first() else {
            bail!("photo to import has no versions");
        };
        let (base_uri, filename) = split_uri(&original.uri);
        let default_version_id = versions.len() as VersionId;

        let tx = self.begin()?;
        self.db.execute(
            "INSERT INTO photos (time, base_uri, filename, description, roll_id, default_version_id, rating)
             VALUES (?, ?, ?, ?, ?, ?, 0)",
            params![
                item.time.timestamp(),
                base_uri,
                filename,
                item.description,
                roll_id,
                default_version_id
            ],
        )?;
        let id = self.db.last_insert_rowid();

        let mut photo = Photo::new(id, item.time);
        photo.load_description(item.description.clone());
        photo.load_roll_id(roll_id);
        for (index, new_version) in versions.iter().enumerate() {
            let (base_uri, filename) = split_uri(&new_version.uri);
            let version = PhotoVersion::new(
                index as VersionId + ORIGINAL_VERSION_ID,
                &base_uri,
                &filename,
                new_version.import_md5.clone(),
                &new_version.name,
                true,
            );
            self.insert_version(id, &version)?;
            photo.hydrate_version(version);
        }
        photo.load_default_version_id(default_version_id);
        photo.set_all_versions_loaded();
        commit_if(tx)?;

        let photo = photo.into_shared();
        self.cache.insert(&photo);
        debug!(photo_id = id, versions = versions.len(), "imported photo");
        self.emit(StoreEvent::Added(vec![id]));
        Ok(photo)
    }

    fn insert_version(&self, photo_id: PhotoId, version: &PhotoVersion) -> Result<()> {
        self.db.execute(
            "INSERT OR IGNORE INTO photo_versions (photo_id, version_id, name, base_uri, filename, import_md5, protected)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                photo_id,
                version.version_id,
                version.name,
                version.base_uri,
                version.filename,
                version.import_md5,
                version.is_protected
            ],
        )?;
        Ok(())
    }

    /// Whether `item` looks already imported. Checked in order: exact uri of
    /// any stored version, import hash, then for libraries holding unhashed
    /// originals a filename plus timestamp match.
    pub fn has_duplicate(&self, item: &NewPhoto) -> Result<bool> {
        let Some(default_version) = item.versions.last() else {
            return Ok(false);
        };
        let (base_uri, filename) = split_uri(&default_version.uri);

        let by_uri: i64 = self
            .db
            .query_row(
                "SELECT COUNT(*) FROM photo_versions WHERE base_uri = ? AND filename = ?",
                params![base_uri, filename],
                |row| row.get(0),
            )?
            .unwrap_or(0);
        if by_uri > 0 {
            return Ok(true);
        }

        if let Some(hash) = default_version.import_md5.as_deref().filter(|h| !h.is_empty()) {
            let by_hash: i64 = self
                .db
                .query_row(
                    "SELECT COUNT(*) FROM photo_versions WHERE import_md5 = ?",
                    [hash],
                    |row| row.get(0),
                )?
                .unwrap_or(0);
            if by_hash > 0 {
                return Ok(true);
            }
        }

        let unhashed: i64 = self
            .db
            .query_row(
                "SELECT COUNT(*) FROM photo_versions WHERE version_id = 1 AND (import_md5 = '' OR import_md5 IS NULL)",
                [],
                |row| row.get(0),
            )?
            .unwrap_or(0);
        if unhashed > 0 {
            let mut stmt = self.db.prepare(
                "SELECT photos.id, photos.time FROM photos
                 LEFT JOIN photo_versions AS pv ON pv.photo_id = photos.id
                 WHERE pv.filename = ?",
            )?;
            let candidates = stmt
                .query_map([&filename], |row| Ok((row.get::<_, PhotoId>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let time = item.time.timestamp();
            if let Some((id, _)) = candidates.iter().find(|(_, t)| *t == time) {
                debug!(photo_id = id, filename = %filename, "duplicate by filename and time");
                return Ok(true);
            }
        }

        Ok(false)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// The live photo for `id`, loading and hydrating it on a cache miss.
    pub fn get(&self, id: PhotoId) -> Result<Option<SharedPhoto>> {
        if let Some(photo) = self.cache.get(id) {
            return Ok(Some(photo));
        }
        let row = self.db.query_row(
            &format!("SELECT {} FROM photos WHERE id = ?", PhotoRow::COLUMNS),
            [id],
            PhotoRow::from_row,
        )?;
        match row {
            Some(row) => Ok(Some(self.adopt(vec![row])?.remove(0))),
            None => Ok(None),
        }
    }

    /// Photo whose original, or any version, lives at `uri`.
    pub fn get_by_uri(&self, uri: &str) -> Result<Option<SharedPhoto>> {
        let (base_uri, filename) = split_uri(uri);
        let id: Option<PhotoId> = self.db.query_row(
            "SELECT photos.id FROM photos
             LEFT JOIN photo_versions ON photos.id = photo_versions.photo_id
             WHERE (photos.base_uri = ?1 AND photos.filename = ?2)
                OR (photo_versions.base_uri = ?1 AND photo_versions.filename = ?2)
             LIMIT 1",
            params![base_uri, filename],
            |row| row.get(0),
        )?;
        match id {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    pub fn query(&self, conditions: &[Condition]) -> Result<Vec<SharedPhoto>> {
        let sql = build_query(conditions, self.session.hidden_tag());
        self.query_sql(&sql, [])
    }

    /// A file uri matches that photo; a directory uri (ending in `/`)
    /// matches the photos directly inside it.
    pub fn query_by_uri(&self, uri: &str) -> Result<Vec<SharedPhoto>> {
        if uri.ends_with('/') {
            self.query_sql(
                &format!("SELECT {} FROM photos WHERE base_uri = ? ORDER BY time", PhotoRow::COLUMNS),
                [uri],
            )
        } else {
            let (base_uri, filename) = split_uri(uri);
            self.query_sql(
                &format!("SELECT {} FROM photos WHERE base_uri = ? AND filename = ?", PhotoRow::COLUMNS),
                params![base_uri, filename],
            )
        }
    }

    /// Every photo carrying any of `tags`, hidden ones included.
    pub fn query_tagged(&self, tags: &[TagId]) -> Result<Vec<SharedPhoto>> {
        let Some(term) = Term::any_of(tags) else {
            return Ok(Vec::new());
        };
        let clause = term.sql_condition(&self.session.tags(), self.session.hidden_tag());
        let conditions = [
            Condition::Wrapper(ConditionWrapper(clause)),
            Condition::HiddenTag(HiddenTag::show(self.session.hidden_tag())),
        ];
        self.query(&conditions)
    }

    /// Run a query returning `photos` columns and map rows to live photos.
    pub fn query_sql<P: Params>(&self, sql: &str, params: P) -> Result<Vec<SharedPhoto>> {
        let start = Instant::now();
        let rows = {
            let mut stmt = self.db.prepare(sql)?;
            let rows = stmt
                .query_map(params, PhotoRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        let photos = self.adopt(rows)?;
        debug!(rows = photos.len(), elapsed = ?start.elapsed(), "photo query");
        Ok(photos)
    }

    /// Reuse cached photos for `rows`, construct the rest and hydrate them
    /// in batch.
    fn adopt(&self, rows: Vec<PhotoRow>) -> Result<Vec<SharedPhoto>> {
        let photos: Vec<SharedPhoto> = rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                self.cache.get_or_insert_with(id, move || row.into_photo()).0
            })
            .collect();
        self.hydrate(&photos)?;
        Ok(photos)
    }

    /// Load tags and versions for photos not yet fully loaded, one
    /// `IN (...)` query per table.
    fn hydrate(&self, photos: &[SharedPhoto]) -> Result<()> {
        let pending: HashMap<PhotoId, &SharedPhoto> = photos
            .iter()
            .filter(|p| !p.borrow().all_versions_loaded())
            .map(|p| (p.borrow().id(), p))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        let ids: Vec<PhotoId> = pending.keys().copied().collect();

        for chunk in ids.chunks(IN_LIST_CHUNK) {
            let mut stmt = self.db.prepare(&format!(
                "SELECT photo_id, tag_id FROM photo_tags WHERE photo_id IN ({})",
                placeholders(chunk.len())
            ))?;
            let memberships = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, PhotoId>(0)?, row.get::<_, TagId>(1)?))
            })?;
            for membership in memberships {
                let (photo_id, tag_id) = membership?;
                if let Some(photo) = pending.get(&photo_id) {
                    photo.borrow_mut().hydrate_tag(tag_id);
                }
            }

            let mut stmt = self.db.prepare(&format!(
                "SELECT {} FROM photo_versions WHERE photo_id IN ({})",
                VersionRow::COLUMNS,
                placeholders(chunk.len())
            ))?;
            let versions = stmt.query_map(params_from_iter(chunk.iter()), VersionRow::from_row)?;
            for version in versions {
                let version = version?;
                if let Some(photo) = pending.get(&version.photo_id) {
                    photo.borrow_mut().hydrate_version(version.version);
                }
            }
        }

        for photo in pending.values() {
            let mut photo = photo.borrow_mut();
            photo.set_all_versions_loaded();
            photo.clear_changes();
        }
        Ok(())
    }

    pub fn total_photos(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?
            .unwrap_or(0);
        Ok(count as usize)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    fn begin(&self) -> Result<Option<Transaction<'_>>> {
        match self.db.transaction() {
            Ok(tx) => Ok(Some(tx)),
            Err(e) if self.strict_transactions => Err(e.context("transaction required but unavailable")),
            Err(e) => {
                warn!(error = %e, "transaction unavailable, writing without one");
                Ok(None)
            }
        }
    }

    pub fn commit_one(&self, photo: &SharedPhoto) -> Result<()> {
        self.commit(std::slice::from_ref(photo))
    }

    /// Persist pending edits. Only fields flagged in each photo's changes are
    /// written. Several photos are written in one transaction when one can
    /// be started. Changes are cleared only after everything is written.
    pub fn commit(&self, photos: &[SharedPhoto]) -> Result<()> {
        let start = Instant::now();
        let tx = if photos.len() > 1 { self.begin()? } else { None };

        let mut committed = Vec::new();
        let mut aggregate = PhotosChanges::default();
        for shared in photos {
            let photo = shared.borrow();
            let Some(changes) = photo.changes().filter(|c| !c.is_clean()) else {
                continue;
            };
            self.update(&photo)?;
            aggregate |= changes;
            committed.push(shared.clone());
        }
        commit_if(tx)?;

        let ids: Vec<PhotoId> = committed
            .iter()
            .map(|p| {
                let mut photo = p.borrow_mut();
                photo.clear_changes();
                photo.id()
            })
            .collect();
        debug!(photos = ids.len(), elapsed = ?start.elapsed(), "commit");
        if !ids.is_empty() {
            self.emit(StoreEvent::Changed { ids, changes: aggregate });
        }
        Ok(())
    }

    fn update(&self, photo: &Photo) -> Result<()> {
        let Some(changes) = photo.changes() else {
            return Ok(());
        };
        let id = photo.id();

        if changes.data_changed() {
            let located = photo
                .version(ORIGINAL_VERSION_ID)
                .or_else(|| photo.default_version())
                .map(|v| (v.base_uri.clone(), v.filename.clone()))
                .unwrap_or_default();
            self.db.execute(
                "UPDATE photos SET description = ?, default_version_id = ?, time = ?,
                        base_uri = ?, filename = ?, rating = ?, roll_id = ?
                 WHERE id = ?",
                params![
                    photo.description(),
                    photo.default_version_id(),
                    photo.time().timestamp(),
                    located.0,
                    located.1,
                    photo.rating(),
                    photo.roll_id(),
                    id
                ],
            )?;
        }

        for tag in &changes.tags_removed {
            self.db.execute(
                "DELETE FROM photo_tags WHERE photo_id = ? AND tag_id = ?",
                params![id, tag],
            )?;
        }
        for tag in &changes.tags_added {
            self.db.execute(
                "INSERT OR IGNORE INTO photo_tags (photo_id, tag_id) VALUES (?, ?)",
                params![id, tag],
            )?;
        }

        for version_id in &changes.versions_removed {
            self.db.execute(
                "DELETE FROM photo_versions WHERE photo_id = ? AND version_id = ?",
                params![id, version_id],
            )?;
        }
        for version_id in &changes.versions_added {
            if let Some(version) = photo.version(*version_id) {
                self.insert_version(id, version)?;
            }
        }
        for version_id in &changes.versions_modified {
            if let Some(version) = photo.version(*version_id) {
                self.db.execute(
                    "UPDATE photo_versions SET name = ?, base_uri = ?, filename = ?, import_md5 = ?, protected = ?
                     WHERE photo_id = ? AND version_id = ?",
                    params![
                        version.name,
                        version.base_uri,
                        version.filename,
                        version.import_md5,
                        version.is_protected,
                        id,
                        version_id
                    ],
                )?;
            }
        }
        Ok(())
    }

    /// Delete photos with their versions and tag memberships.
    pub fn remove(&self, photos: &[SharedPhoto]) -> Result<()> {
        let ids: Vec<PhotoId> = photos.iter().map(|p| p.borrow().id()).collect();
        if ids.is_empty() {
            return Ok(());
        }

        let tx = self.begin()?;
        for chunk in ids.chunks(IN_LIST_CHUNK) {
            let list = placeholders(chunk.len());
            self.db.execute(
                &format!("DELETE FROM photos WHERE id IN ({})", list),
                params_from_iter(chunk.iter()),
            )?;
            self.db.execute(
                &format!("DELETE FROM photo_tags WHERE photo_id IN ({})", list),
                params_from_iter(chunk.iter()),
            )?;
            self.db.execute(
                &format!("DELETE FROM photo_versions WHERE photo_id IN ({})", list),
                params_from_iter(chunk.iter()),
            )?;
        }
        commit_if(tx)?;

        for id in &ids {
            self.cache.remove(*id);
        }
        debug!(photos = ids.len(), "removed photos");
        self.emit(StoreEvent::Removed(ids));
        Ok(())
    }

    /// Hash every version that has no import hash yet, then commit.
    pub fn calculate_md5_sum(&self, photo: &SharedPhoto) -> Result<()> {
        {
            let mut photo = photo.borrow_mut();
            let missing: Vec<(VersionId, String)> = photo
                .versions()
                .filter(|v| v.import_md5.is_none())
                .map(|v| (v.version_id, v.uri()))
                .collect();
            for (version_id, uri) in missing {
                let hash = md5_file(&uri_to_path(&uri)?)?;
                photo.set_version_import_md5(version_id, &hash)?;
            }
        }
        self.commit_one(photo)
    }

    // ========================================================================
    // Materialized tables
    // ========================================================================

    pub fn query_to_temp(&self, table_name: &str, conditions: &[Condition]) -> Result<()> {
        let sql = build_query(conditions, self.session.hidden_tag());
        materialize(&self.db, table_name, &sql)
    }

    /// Rows `[offset, offset + limit)` of a materialized table.
    pub fn query_from_temp(&self, table_name: &str, offset: usize, limit: usize) -> Result<Vec<SharedPhoto>> {
        self.query_sql(
            &format!(
                "SELECT {} FROM {} ORDER BY ROWID LIMIT ? OFFSET ?",
                PhotoRow::COLUMNS,
                table_name
            ),
            params![limit as i64, offset as i64],
        )
    }

    pub fn count(&self, table_name: &str) -> Result<usize> {
        let count: i64 = self
            .db
            .query_row(&format!("SELECT COUNT(*) FROM {}", table_name), [], |row| row.get(0))?
            .unwrap_or(0);
        Ok(count as usize)
    }

    /// Position of `id` in a materialized table.
    pub fn index_of(&self, table_name: &str, id: PhotoId) -> Result<Option<usize>> {
        let rowid: Option<i64> = self.db.query_row(
            &format!("SELECT ROWID FROM {} WHERE id = ?", table_name),
            [id],
            |row| row.get(0),
        )?;
        Ok(rowid.map(rowid_to_index))
    }

    /// Positions of `ids` in a materialized table. Ids not present are
    /// left out.
    pub fn indices_of(&self, table_name: &str, ids: &[PhotoId]) -> Result<HashMap<PhotoId, usize>> {
        let mut found = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(IN_LIST_CHUNK) {
            let mut stmt = self.db.prepare(&format!(
                "SELECT id, ROWID FROM {} WHERE id IN ({})",
                table_name,
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, PhotoId>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (id, rowid) = row?;
                found.insert(id, rowid_to_index(rowid));
            }
        }
        Ok(found)
    }

    /// Position of the first row at or after `time` in the table's order:
    /// the earliest row not before it when ascending, the latest row not
    /// after it when descending.
    pub fn index_of_time(&self, table_name: &str, time: DateTime<Utc>, ascending: bool) -> Result<Option<usize>> {
        let sql = format!(
            "SELECT ROWID FROM {} WHERE time {} ? ORDER BY time {} LIMIT 1",
            table_name,
            if ascending { ">=" } else { "<=" },
            if ascending { "ASC" } else { "DESC" }
        );
        let rowid: Option<i64> = self.db.query_row(&sql, [time.timestamp()], |row| row.get(0))?;
        Ok(rowid.map(rowid_to_index))
    }

    pub fn photos_per_month(&self, conditions: &[Condition]) -> Result<MonthHistogram> {
        let start = Instant::now();
        self.db.execute("DROP TABLE IF EXISTS population", [])?;
        self.db.execute(
            &format!(
                "CREATE TEMPORARY TABLE population AS
                 SELECT strftime('%Y%m', datetime(time, 'unixepoch')) AS month FROM photos{}",
                where_sql(conditions, self.session.hidden_tag())
            ),
            [],
        )?;

        let mut stmt = self
            .db
            .prepare("SELECT COUNT(*) AS count, month FROM population GROUP BY month")?;
        let buckets = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut histogram = MonthHistogram::new();
        for (count, month) in buckets {
            let Some((year, month)) = month.as_deref().and_then(parse_year_month) else {
                warn!(?month, "skipping unparsable month bucket");
                continue;
            };
            histogram.entry(year).or_insert([0; 12])[month - 1] = count as u32;
        }

        let years = histogram.keys().next().copied().zip(histogram.keys().next_back().copied());
        if let Some((min_year, max_year)) = years {
            for year in min_year..=max_year {
                histogram.entry(year).or_insert([0; 12]);
            }
        }
        debug!(years = histogram.len(), elapsed = ?start.elapsed(), "photos per month");
        Ok(histogram)
    }
}

fn commit_if(tx: Option<Transaction<'_>>) -> Result<()> {
    if let Some(tx) = tx {
        tx.commit()?;
    }
    Ok(())
}

fn rowid_to_index(rowid: i64) -> usize {
    (rowid - 1).max(0) as usize
}

/// `"YYYYMM"` into year and 1-based month.
fn parse_year_month(yyyymm: &str) -> Option<(i32, usize)> {
    if yyyymm.len() != 6 {
        return None;
    }
    let year = yyyymm[..4].parse().ok()?;
    let month: usize = yyyymm[4..].parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}
