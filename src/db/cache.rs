//! Identity map: at most one live `Photo` per id.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::model::{Photo, PhotoId, SharedPhoto};

/// Weakly held photos shared by the store and every view built on it.
///
/// A photo stays mapped while anyone (a view's block cache, a caller)
/// holds a strong handle. Edits made through one handle are visible
/// through all of them.
#[derive(Debug, Default)]
pub struct PhotoCache {
    photos: RefCell<HashMap<PhotoId, Weak<RefCell<Photo>>>>,
}

impl PhotoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PhotoId) -> Option<SharedPhoto> {
        let mut photos = self.photos.borrow_mut();
        match photos.get(&id).map(Weak::upgrade) {
            Some(Some(photo)) => Some(photo),
            Some(None) => {
                photos.remove(&id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, photo: &SharedPhoto) {
        let id = photo.borrow().id();
        self.photos.borrow_mut().insert(id, Rc::downgrade(photo));
    }

    /// The live photo for `id`, or `load()` registered as the new one.
    /// The flag is `true` when `load` ran.
    pub fn get_or_insert_with(&self, id: PhotoId, load: impl FnOnce() -> Photo) -> (SharedPhoto, bool) {
        if let Some(photo) = self.get(id) {
            return (photo, false);
        }
        let photo = load().into_shared();
        self.insert(&photo);
        (photo, true)
    }

    pub fn remove(&self, id: PhotoId) {
        self.photos.borrow_mut().remove(&id);
    }

    /// Number of photos still alive.
    pub fn len(&self) -> usize {
        self.photos
            .borrow()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn photo(id: PhotoId) -> Photo {
        Photo::new(id, DateTime::from_timestamp(0, 0).unwrap())
    }

    #[test]
    fn test_same_instance_while_alive() {
        let cache = PhotoCache::new();
        let (a, fresh) = cache.get_or_insert_with(1, || photo(1));
        assert!(fresh);
        let (b, fresh) = cache.get_or_insert_with(1, || photo(1));
        assert!(!fresh);
        assert!(Rc::ptr_eq(&a, &b));

        a.borrow_mut().set_rating(3);
        assert_eq!(b.borrow().rating(), 3);
    }

    #[test]
    fn test_dropped_photos_are_forgotten() {
        let cache = PhotoCache::new();
        let (a, _) = cache.get_or_insert_with(1, || photo(1));
        assert_eq!(cache.len(), 1);
        drop(a);
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }
}
