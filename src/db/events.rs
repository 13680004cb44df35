use crate::model::{PhotoId, PhotosChanges};

/// Notification published by the photo store after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(Vec<PhotoId>),
    Removed(Vec<PhotoId>),
    Changed {
        ids: Vec<PhotoId>,
        changes: PhotosChanges,
    },
}

/// Receives store events synchronously on the calling thread.
pub trait PhotoStoreObserver {
    fn on_store_event(&self, event: &StoreEvent);
}
