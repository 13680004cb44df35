//! Library-wide state shared by stores, compiler callers and views.

use std::cell::{Cell, Ref, RefCell, RefMut};

use crate::model::{TagId, TagTree};

/// Owns the tag hierarchy, the hidden tag id and the temp-table counter.
///
/// One session per open library. Everything that needs these pieces holds
/// an `Rc<Session>` handed to it at construction.
#[derive(Debug, Default)]
pub struct Session {
    tags: RefCell<TagTree>,
    hidden_tag: Cell<Option<TagId>>,
    table_counter: Cell<u32>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> Ref<'_, TagTree> {
        self.tags.borrow()
    }

    pub fn tags_mut(&self) -> RefMut<'_, TagTree> {
        self.tags.borrow_mut()
    }

    pub fn replace_tags(&self, tree: TagTree) {
        *self.tags.borrow_mut() = tree;
    }

    pub fn hidden_tag(&self) -> Option<TagId> {
        self.hidden_tag.get()
    }

    pub fn set_hidden_tag(&self, tag: Option<TagId>) {
        self.hidden_tag.set(tag);
    }

    /// Fresh name for a view's materialized table.
    pub fn next_table_name(&self) -> String {
        let n = self.table_counter.get();
        self.table_counter.set(n + 1);
        format!("query_view_{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_are_unique() {
        let session = Session::new();
        assert_eq!(session.next_table_name(), "query_view_0");
        assert_eq!(session.next_table_name(), "query_view_1");
    }
}
