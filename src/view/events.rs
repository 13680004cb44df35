use crate::model::PhotosChanges;

/// Published by a paged view to its listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    /// The view was rematerialized. Every index or photo handed out before
    /// is void.
    Reloaded,
    /// Photos at these positions changed in place.
    ItemsChanged {
        indices: Vec<usize>,
        changes: PhotosChanges,
    },
}
