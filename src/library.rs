//! A photo library: one database, its session and the stores sharing them.

use std::rc::Rc;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::db::{Database, PhotoCache, PhotoStore, RollStore, TagStore};
use crate::model::TagId;
use crate::session::Session;
use crate::view::PagedView;

pub struct Library {
    db: Rc<Database>,
    session: Rc<Session>,
    photos: Rc<PhotoStore>,
    tags: TagStore,
    rolls: RollStore,
    view_ascending: bool,
}

impl Library {
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.db_path)?;
        Self::from_database(db, config)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory()?, &Config::default())
    }

    fn from_database(db: Database, config: &Config) -> Result<Self> {
        db.initialize()?;
        let db = Rc::new(db);
        let session = Rc::new(Session::new());
        let tags = TagStore::open(db.clone(), session.clone())?;
        let photos = PhotoStore::new(db.clone(), session.clone(), Rc::new(PhotoCache::new()))
            .with_strict_transactions(config.store.strict_transactions);
        let rolls = RollStore::new(db.clone());

        info!(
            tags = session.tags().len(),
            hidden_tag = ?session.hidden_tag(),
            "library opened"
        );
        Ok(Self {
            db,
            session,
            photos: Rc::new(photos),
            tags,
            rolls,
            view_ascending: config.view.time_order_ascending,
        })
    }

    pub fn database(&self) -> &Rc<Database> {
        &self.db
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    pub fn photos(&self) -> &Rc<PhotoStore> {
        &self.photos
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn rolls(&self) -> &RollStore {
        &self.rolls
    }

    /// A materialized view over every visible photo in the configured time
    /// order.
    pub fn new_view(&self) -> Result<Rc<PagedView>> {
        PagedView::new(self.photos.clone(), self.view_ascending)
    }

    /// Strip `tags` from every photo carrying them and delete the tags.
    /// Categories go with everything beneath them.
    pub fn remove_tags(&self, tags: &[TagId]) -> Result<()> {
        let photos = self.photos.query_tagged(tags)?;
        {
            let tree = self.session.tags();
            for photo in &photos {
                photo.borrow_mut().remove_category(tags, &tree);
            }
        }
        self.photos.commit(&photos)?;

        for &tag in tags {
            // children before their category
            let mut doomed = self.session.tags().descendants(tag);
            doomed.reverse();
            doomed.push(tag);
            for id in doomed {
                if self.tags.get(id).is_some() {
                    self.tags.remove(id)?;
                }
            }
        }
        debug!(tags = tags.len(), photos = photos.len(), "removed tags");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewPhoto, ROOT_CATEGORY_ID};
    use chrono::DateTime;

    #[test]
    fn test_open_in_memory_creates_default_tags() {
        let library = Library::open_in_memory().unwrap();
        let hidden = library.tags().get_by_name("Hidden").unwrap();
        assert_eq!(library.session().hidden_tag(), Some(hidden.id));
        assert_eq!(library.new_view().unwrap().count().unwrap(), 0);
    }

    #[test]
    fn test_open_on_disk_persists_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db_path = dir.path().join("library.db");
        config.view.time_order_ascending = true;

        let hidden = {
            let library = Library::open(&config).unwrap();
            library.tags().create_tag(ROOT_CATEGORY_ID, "Cats").unwrap();
            library.session().hidden_tag()
        };

        let library = Library::open(&config).unwrap();
        assert_eq!(library.session().hidden_tag(), hidden);
        assert!(library.tags().get_by_name("cats").is_some());
        assert!(library.new_view().unwrap().time_order_ascending());
    }

    #[test]
    fn test_remove_tags_strips_categories_recursively() {
        let library = Library::open_in_memory().unwrap();
        let trips = library.tags().create_category(ROOT_CATEGORY_ID, "Trips").unwrap();
        let paris = library.tags().create_tag(trips, "Paris").unwrap();
        let cats = library.tags().create_tag(ROOT_CATEGORY_ID, "Cats").unwrap();

        let time = DateTime::from_timestamp(1, 0).unwrap();
        let a = library
            .photos()
            .create_from(&NewPhoto::new("file:///p/a.jpg", time), false, 0)
            .unwrap();
        let b = library
            .photos()
            .create_from(&NewPhoto::new("file:///p/b.jpg", time), false, 0)
            .unwrap();
        a.borrow_mut().add_tags(&[paris, cats]);
        b.borrow_mut().add_tag(cats);
        library.photos().commit(&[a.clone(), b.clone()]).unwrap();

        library.remove_tags(&[trips]).unwrap();

        assert_eq!(a.borrow().tags(), &[cats]);
        assert_eq!(b.borrow().tags(), &[cats]);
        assert!(library.tags().get(trips).is_none());
        assert!(library.tags().get(paris).is_none());
        let memberships: i64 = library
            .database()
            .query_row("SELECT COUNT(*) FROM photo_tags WHERE tag_id = ?", [paris], |row| row.get(0))
            .unwrap()
            .unwrap();
        assert_eq!(memberships, 0);
    }
}
