//! Tag persistence. The loaded hierarchy lives in the session's `TagTree`;
//! every write validates against a copy of the tree, hits the database,
//! then publishes the updated tree.

use std::rc::Rc;

use anyhow::Result;
use rusqlite::params;
use tracing::{debug, info, warn};

use super::rows::TagRow;
use super::Database;
use crate::model::{Tag, TagError, TagId, TagTree, ROOT_CATEGORY_ID};
use crate::session::Session;

pub const HIDDEN_TAG_META: &str = "hidden_tag_id";

pub struct TagStore {
    db: Rc<Database>,
    session: Rc<Session>,
}

impl TagStore {
    pub fn new(db: Rc<Database>, session: Rc<Session>) -> Self {
        Self { db, session }
    }

    /// Load the hierarchy, creating the default tags on an empty library.
    pub fn open(db: Rc<Database>, session: Rc<Session>) -> Result<Self> {
        let store = Self::new(db, session);
        if store.is_empty()? {
            store.create_default_tags()?;
        } else {
            store.load_all()?;
        }
        Ok(store)
    }

    fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?
            .unwrap_or(0);
        Ok(count == 0 && self.db.meta(HIDDEN_TAG_META)?.is_none())
    }

    fn create_default_tags(&self) -> Result<()> {
        let favorites = self.insert_tag(ROOT_CATEGORY_ID, "Favorites", true, -10, None)?;
        let hidden = self.insert_tag(ROOT_CATEGORY_ID, "Hidden", false, -9, Some("emblem-readonly"))?;
        self.insert_tag(ROOT_CATEGORY_ID, "People", true, -8, None)?;
        self.insert_tag(ROOT_CATEGORY_ID, "Places", true, -8, None)?;
        self.insert_tag(ROOT_CATEGORY_ID, "Events", true, -7, None)?;

        self.db.set_meta(HIDDEN_TAG_META, &hidden.to_string())?;
        self.session.set_hidden_tag(Some(hidden));
        info!(favorites, hidden, "created default tags");
        Ok(())
    }

    /// Rebuild the session's tree from the database: rows, then parent
    /// links, then popularity. Restores the hidden tag id.
    pub fn load_all(&self) -> Result<()> {
        let mut tree = TagTree::new();

        let rows = {
            let mut stmt = self.db.prepare(&format!("SELECT {} FROM tags", TagRow::COLUMNS))?;
            let rows = stmt
                .query_map([], TagRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        let links: Vec<(TagId, TagId)> = rows.iter().map(|r| (r.tag.id, r.tag.category)).collect();
        for row in rows {
            tree.insert_detached(row.tag);
        }
        for (id, category) in links {
            if let Err(e) = tree.attach(id, category) {
                warn!(tag_id = id, category, error = %e, "reattaching tag to root");
                tree.attach(id, ROOT_CATEGORY_ID)?;
            }
        }

        let popularity = {
            let mut stmt = self
                .db
                .prepare("SELECT tag_id, COUNT(*) FROM photo_tags GROUP BY tag_id")?;
            let counts = stmt
                .query_map([], |row| Ok((row.get::<_, TagId>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            counts
        };
        for (id, count) in popularity {
            if let Some(tag) = tree.get_mut(id) {
                tag.popularity = count as u32;
            }
        }

        let hidden = self
            .db
            .meta(HIDDEN_TAG_META)?
            .and_then(|v| v.parse::<TagId>().ok())
            .filter(|id| tree.get(*id).is_some());
        debug!(tags = tree.len(), ?hidden, "loaded tags");
        self.session.replace_tags(tree);
        self.session.set_hidden_tag(hidden);
        Ok(())
    }

    fn insert_tag(
        &self,
        category: TagId,
        name: &str,
        is_category: bool,
        sort_priority: i32,
        icon: Option<&str>,
    ) -> Result<TagId> {
        let mut tree = self.session.tags().clone();
        if tree.get_by_name(name).is_some() {
            return Err(TagError::NameExists(name.to_string()).into());
        }
        match tree.get(category) {
            None => return Err(TagError::UnknownTag(category).into()),
            Some(parent) if !parent.is_category => return Err(TagError::NotACategory(category).into()),
            Some(_) => {}
        }

        self.db.execute(
            "INSERT INTO tags (name, category_id, is_category, sort_priority, icon) VALUES (?, ?, ?, ?, ?)",
            params![name, category, is_category, sort_priority, icon],
        )?;
        let id = self.db.last_insert_rowid();

        let mut tag = Tag::new(id, name, category, is_category);
        tag.sort_priority = sort_priority;
        tag.icon = icon.map(str::to_string);
        tree.insert(tag)?;
        self.session.replace_tags(tree);
        Ok(id)
    }

    pub fn create_tag(&self, category: TagId, name: &str) -> Result<TagId> {
        self.insert_tag(category, name, false, 0, None)
    }

    pub fn create_category(&self, parent: TagId, name: &str) -> Result<TagId> {
        self.insert_tag(parent, name, true, 0, None)
    }

    pub fn get(&self, id: TagId) -> Option<Tag> {
        self.session.tags().get(id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Tag> {
        self.session.tags().get_by_name(name).cloned()
    }

    /// Tags whose name starts with `prefix`, case-insensitively, most
    /// popular first.
    pub fn get_by_name_start(&self, prefix: &str) -> Vec<Tag> {
        let prefix = prefix.to_lowercase();
        let mut tags: Vec<Tag> = self
            .session
            .tags()
            .iter()
            .filter(|t| t.name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        tags.sort_by(|a, b| b.popularity.cmp(&a.popularity).then_with(|| a.name.cmp(&b.name)));
        tags
    }

    pub fn hidden(&self) -> Option<TagId> {
        self.session.hidden_tag()
    }

    /// Persist name, parent, kind, priority and icon of `tag`.
    pub fn commit(&self, tag: &Tag) -> Result<()> {
        let mut tree = self.session.tags().clone();
        if tree.get_by_name(&tag.name).is_some_and(|t| t.id != tag.id) {
            return Err(TagError::NameExists(tag.name.clone()).into());
        }
        let current = tree.get_mut(tag.id).ok_or(TagError::UnknownTag(tag.id))?;
        if current.is_category && !tag.is_category && !current.children().is_empty() {
            return Err(TagError::CategoryNotEmpty(tag.id).into());
        }
        current.name = tag.name.clone();
        current.is_category = tag.is_category;
        current.sort_priority = tag.sort_priority;
        current.icon = tag.icon.clone();
        tree.attach(tag.id, tag.category)?;

        self.db.execute(
            "UPDATE tags SET name = ?, category_id = ?, is_category = ?, sort_priority = ?, icon = ? WHERE id = ?",
            params![tag.name, tag.category, tag.is_category, tag.sort_priority, tag.icon, tag.id],
        )?;
        self.session.replace_tags(tree);
        Ok(())
    }

    /// Delete a tag and its memberships. Categories must be empty.
    pub fn remove(&self, id: TagId) -> Result<()> {
        let mut tree = self.session.tags().clone();
        tree.remove(id)?;

        self.db.execute("DELETE FROM tags WHERE id = ?", [id])?;
        self.db.execute("DELETE FROM photo_tags WHERE tag_id = ?", [id])?;
        if self.session.hidden_tag() == Some(id) {
            self.db.delete_meta(HIDDEN_TAG_META)?;
            self.session.set_hidden_tag(None);
        }
        self.session.replace_tags(tree);
        debug!(tag_id = id, "removed tag");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (Rc<Database>, TagStore) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let db = Rc::new(db);
        let store = TagStore::open(db.clone(), Rc::new(Session::new())).unwrap();
        (db, store)
    }

    #[test]
    fn test_default_tags() {
        let (_, store) = open();
        let hidden = store.get_by_name("hidden").unwrap();
        assert_eq!(store.hidden(), Some(hidden.id));
        assert!(!hidden.is_category);
        assert!(store.get_by_name("People").unwrap().is_category);

        let session = store.session.clone();
        let tree = session.tags();
        let names: Vec<&str> = tree
            .root()
            .children()
            .iter()
            .map(|id| tree.get(*id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["Favorites", "Hidden", "People", "Places", "Events"]);
    }

    #[test]
    fn test_reload_restores_tree_and_hidden_tag() {
        let (db, store) = open();
        let people = store.get_by_name("People").unwrap().id;
        let alice = store.create_tag(people, "Alice").unwrap();
        db.execute("INSERT INTO photo_tags (photo_id, tag_id) VALUES (1, ?), (2, ?)", [alice, alice])
            .unwrap();

        let session = Rc::new(Session::new());
        let reloaded = TagStore::open(db, session.clone()).unwrap();
        assert_eq!(session.hidden_tag(), store.hidden());
        let tag = reloaded.get(alice).unwrap();
        assert_eq!(tag.category, people);
        assert_eq!(tag.popularity, 2);
        assert_eq!(session.tags().descendants(people), vec![alice]);
    }

    #[test]
    fn test_name_prefix_by_popularity() {
        let (db, store) = open();
        let paris = store.create_tag(ROOT_CATEGORY_ID, "Paris").unwrap();
        store.create_tag(ROOT_CATEGORY_ID, "Party").unwrap();
        db.execute("INSERT INTO photo_tags (photo_id, tag_id) VALUES (1, ?)", [paris]).unwrap();
        store.load_all().unwrap();

        let names: Vec<String> = store.get_by_name_start("pa").into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Paris", "Party"]);
        assert!(store.get_by_name_start("zz").is_empty());
    }

    #[test]
    fn test_create_rejects_duplicates_and_non_categories() {
        let (_, store) = open();
        let err = store.create_tag(ROOT_CATEGORY_ID, "people").unwrap_err();
        assert_eq!(err.downcast_ref::<TagError>(), Some(&TagError::NameExists("people".into())));

        let hidden = store.hidden().unwrap();
        let err = store.create_tag(hidden, "Secret").unwrap_err();
        assert_eq!(err.downcast_ref::<TagError>(), Some(&TagError::NotACategory(hidden)));
    }

    #[test]
    fn test_commit_moves_and_renames() {
        let (db, store) = open();
        let places = store.get_by_name("Places").unwrap().id;
        let events = store.get_by_name("Events").unwrap().id;
        let trip = store.create_tag(places, "Trip").unwrap();

        let mut tag = store.get(trip).unwrap();
        tag.name = "Holiday".into();
        tag.category = events;
        store.commit(&tag).unwrap();

        assert_eq!(store.session.tags().descendants(places), Vec::<TagId>::new());
        assert_eq!(store.session.tags().descendants(events), vec![trip]);
        let name: String = db
            .query_row("SELECT name FROM tags WHERE id = ?", [trip], |row| row.get(0))
            .unwrap()
            .unwrap();
        assert_eq!(name, "Holiday");
    }

    #[test]
    fn test_remove() {
        let (db, store) = open();
        let people = store.get_by_name("People").unwrap().id;
        let bob = store.create_tag(people, "Bob").unwrap();
        db.execute("INSERT INTO photo_tags (photo_id, tag_id) VALUES (1, ?)", [bob]).unwrap();

        let err = store.remove(people).unwrap_err();
        assert_eq!(err.downcast_ref::<TagError>(), Some(&TagError::CategoryNotEmpty(people)));

        store.remove(bob).unwrap();
        store.remove(people).unwrap();
        assert!(store.get(people).is_none());
        let memberships: i64 = db
            .query_row("SELECT COUNT(*) FROM photo_tags", [], |row| row.get(0))
            .unwrap()
            .unwrap();
        assert_eq!(memberships, 0);

        let hidden = store.hidden().unwrap();
        store.remove(hidden).unwrap();
        assert_eq!(store.hidden(), None);
        assert_eq!(db.meta(HIDDEN_TAG_META).unwrap(), None);
    }
}
