//! Tags and categories, held in an id-keyed arena.
//!
//! A category is a tag that owns an ordered list of child tags. The parent
//! link is a plain id into the same arena, so the tree carries no reference
//! cycles. Id 0 is the implicit root category.

use std::collections::HashMap;

use thiserror::Error;

pub type TagId = i64;

pub const ROOT_CATEGORY_ID: TagId = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("unknown tag {0}")]
    UnknownTag(TagId),
    #[error("tag {0} is not a category")]
    NotACategory(TagId),
    #[error("category {0} still has child tags")]
    CategoryNotEmpty(TagId),
    #[error("a tag named {0:?} already exists")]
    NameExists(String),
    #[error("moving tag {0} under {1} would create a cycle")]
    Cycle(TagId, TagId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// Parent category id, `ROOT_CATEGORY_ID` for top-level tags.
    pub category: TagId,
    pub is_category: bool,
    pub sort_priority: i32,
    pub icon: Option<String>,
    /// Number of photos carrying this tag when last loaded.
    pub popularity: u32,
    children: Vec<TagId>,
}

impl Tag {
    pub fn new(id: TagId, name: &str, category: TagId, is_category: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            category,
            is_category,
            sort_priority: 0,
            icon: None,
            popularity: 0,
            children: Vec::new(),
        }
    }

    pub fn children(&self) -> &[TagId] {
        &self.children
    }
}

#[derive(Debug, Clone)]
pub struct TagTree {
    tags: HashMap<TagId, Tag>,
}

impl Default for TagTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTree {
    pub fn new() -> Self {
        let mut tags = HashMap::new();
        tags.insert(ROOT_CATEGORY_ID, Tag::new(ROOT_CATEGORY_ID, "(None)", ROOT_CATEGORY_ID, true));
        Self { tags }
    }

    pub fn root(&self) -> &Tag {
        &self.tags[&ROOT_CATEGORY_ID]
    }

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    pub fn get_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.tags.get_mut(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Tag> {
        self.tags
            .values()
            .find(|t| t.id != ROOT_CATEGORY_ID && t.name.eq_ignore_ascii_case(name))
    }

    /// Every non-root tag, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values().filter(|t| t.id != ROOT_CATEGORY_ID)
    }

    pub fn len(&self) -> usize {
        self.tags.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a tag that is not yet attached to any category.
    ///
    /// Used while loading, before parents are known. `attach` links it.
    pub fn insert_detached(&mut self, mut tag: Tag) {
        tag.children.clear();
        self.tags.insert(tag.id, tag);
    }

    /// Insert a tag and attach it under its `category`.
    pub fn insert(&mut self, tag: Tag) -> Result<(), TagError> {
        let id = tag.id;
        let category = tag.category;
        if !self.tags.contains_key(&category) {
            return Err(TagError::UnknownTag(category));
        }
        if self.get_by_name(&tag.name).is_some_and(|t| t.id != id) {
            return Err(TagError::NameExists(tag.name));
        }
        self.insert_detached(tag);
        self.attach(id, category)
    }

    /// Link `id` under `category`, detaching it from any previous parent.
    pub fn attach(&mut self, id: TagId, category: TagId) -> Result<(), TagError> {
        if !self.tags.contains_key(&id) {
            return Err(TagError::UnknownTag(id));
        }
        match self.tags.get(&category) {
            None => return Err(TagError::UnknownTag(category)),
            Some(parent) if !parent.is_category => return Err(TagError::NotACategory(category)),
            Some(_) => {}
        }
        if id == category || self.is_ancestor_of(id, category) {
            return Err(TagError::Cycle(id, category));
        }

        self.detach(id);
        if let Some(tag) = self.tags.get_mut(&id) {
            tag.category = category;
        }
        let mut children = match self.tags.get_mut(&category) {
            Some(parent) => std::mem::take(&mut parent.children),
            None => return Err(TagError::UnknownTag(category)),
        };
        children.push(id);
        children.sort_by(|a, b| {
            let (ta, tb) = (&self.tags[a], &self.tags[b]);
            ta.sort_priority
                .cmp(&tb.sort_priority)
                .then_with(|| ta.name.to_lowercase().cmp(&tb.name.to_lowercase()))
        });
        if let Some(parent) = self.tags.get_mut(&category) {
            parent.children = children;
        }
        Ok(())
    }

    fn detach(&mut self, id: TagId) {
        let Some(current) = self.tags.get(&id).map(|t| t.category) else {
            return;
        };
        if let Some(parent) = self.tags.get_mut(&current) {
            parent.children.retain(|c| *c != id);
        }
    }

    /// Remove a tag. Categories must be empty first.
    pub fn remove(&mut self, id: TagId) -> Result<Tag, TagError> {
        let tag = self.tags.get(&id).ok_or(TagError::UnknownTag(id))?;
        if id == ROOT_CATEGORY_ID || !tag.children.is_empty() {
            return Err(TagError::CategoryNotEmpty(id));
        }
        self.detach(id);
        self.tags.remove(&id).ok_or(TagError::UnknownTag(id))
    }

    /// All tags beneath `id`, depth first, not including `id` itself.
    pub fn descendants(&self, id: TagId) -> Vec<TagId> {
        let mut out = Vec::new();
        self.add_descendants_to(id, &mut out);
        out
    }

    fn add_descendants_to(&self, id: TagId, out: &mut Vec<TagId>) {
        if let Some(tag) = self.tags.get(&id) {
            for child in &tag.children {
                out.push(*child);
                self.add_descendants_to(*child, out);
            }
        }
    }

    /// True when `ancestor` appears on the parent chain of `id`.
    pub fn is_ancestor_of(&self, ancestor: TagId, id: TagId) -> bool {
        let mut current = id;
        // bounded walk, a corrupt parent chain may loop
        for _ in 0..self.tags.len() {
            if current == ROOT_CATEGORY_ID {
                return false;
            }
            match self.tags.get(&current) {
                Some(tag) if tag.category == ancestor => return true,
                Some(tag) => current = tag.category,
                None => return false,
            }
        }
        false
    }
}
