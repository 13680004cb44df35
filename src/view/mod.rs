//! Paged view: a live cursor over one materialized query result.
//!
//! A view owns a private temporary table holding the ids matching its term
//! and conditions in display order. Reads are served from 100-row blocks
//! fetched on demand. Store writes are mapped back onto view positions and
//! republished as partial invalidations; membership and order only change
//! through `request_reload`.

pub mod block_cache;
pub mod events;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

pub use block_cache::{BlockCache, BLOCK_SIZE};
pub use events::CollectionEvent;

use crate::db::photos::MonthHistogram;
use crate::db::{PhotoStore, PhotoStoreObserver, StoreEvent};
use crate::model::{PhotoId, PhotosChanges, SharedPhoto};
use crate::query::{
    Condition, ConditionKind, ConditionSet, ConditionWrapper, DateRange, HiddenTag, OrderByTime,
    RatingRange, RollSet, Term, Untagged,
};

type Listener = Rc<dyn Fn(&CollectionEvent)>;

struct ViewState {
    term: Option<Term>,
    untagged: bool,
    conditions: ConditionSet,
    count: Option<usize>,
    blocks: BlockCache,
    /// Positions known for the current materialization only.
    reverse_lookup: HashMap<PhotoId, usize>,
}

pub struct PagedView {
    store: Rc<PhotoStore>,
    table_name: String,
    state: RefCell<ViewState>,
    listeners: RefCell<Vec<Listener>>,
}

impl PagedView {
    /// Create a view ordered by time and materialize it. The view
    /// subscribes to `store` for as long as it is alive.
    pub fn new(store: Rc<PhotoStore>, ascending: bool) -> Result<Rc<Self>> {
        let table_name = store.session().next_table_name();
        let mut conditions = ConditionSet::new();
        conditions.set(OrderByTime { ascending });

        let view = Rc::new(Self {
            store,
            table_name,
            state: RefCell::new(ViewState {
                term: None,
                untagged: false,
                conditions,
                count: None,
                blocks: BlockCache::new(),
                reverse_lookup: HashMap::new(),
            }),
            listeners: RefCell::new(Vec::new()),
        });

        let weak = Rc::downgrade(&view);
        let observer: Weak<dyn PhotoStoreObserver> = weak;
        view.store.subscribe(observer);
        view.request_reload()?;
        Ok(view)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn store(&self) -> &Rc<PhotoStore> {
        &self.store
    }

    pub fn connect(&self, listener: impl Fn(&CollectionEvent) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn notify(&self, event: &CollectionEvent) {
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(event);
        }
    }

    // ========================================================================
    // Materialization
    // ========================================================================

    /// The full condition list the view compiles: the untagged condition or
    /// the rendered term, followed by every registered condition.
    fn compiled_conditions(&self) -> Vec<Condition> {
        let state = self.state.borrow();
        let session = self.store.session();
        let mut conditions = Vec::with_capacity(state.conditions.len() + 2);

        if state.untagged {
            conditions.push(Untagged.into());
        } else if let Some(term) = &state.term {
            let hidden = session.hidden_tag();
            conditions.push(ConditionWrapper(term.sql_condition(&session.tags(), hidden)).into());
            // A term asking for the hidden tag must not be re-filtered by
            // the whole-query default.
            if let Some(hidden) = hidden {
                if term.references_tag(hidden) && !state.conditions.contains(ConditionKind::HiddenTag) {
                    conditions.push(HiddenTag::show(Some(hidden)).into());
                }
            }
        }

        conditions.extend(state.conditions.iter().cloned());
        conditions
    }

    /// Rematerialize the view and drop every cached position and block.
    /// Listeners receive `CollectionEvent::Reloaded`.
    pub fn request_reload(&self) -> Result<()> {
        let start = Instant::now();
        let conditions = self.compiled_conditions();
        self.store.query_to_temp(&self.table_name, &conditions)?;
        {
            let mut state = self.state.borrow_mut();
            state.count = None;
            state.blocks.clear();
            state.reverse_lookup.clear();
        }
        debug!(table = %self.table_name, elapsed = ?start.elapsed(), "reloaded view");
        self.notify(&CollectionEvent::Reloaded);
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn count(&self) -> Result<usize> {
        if let Some(count) = self.state.borrow().count {
            return Ok(count);
        }
        let count = self.store.count(&self.table_name)?;
        self.state.borrow_mut().count = Some(count);
        Ok(count)
    }

    /// Photo at `index`, fetching its block when not resident. `None` past
    /// the end.
    pub fn get(&self, index: usize) -> Result<Option<SharedPhoto>> {
        if let Some(photo) = self.try_get(index) {
            return Ok(Some(photo));
        }
        if index >= self.count()? {
            return Ok(None);
        }
        let offset = BlockCache::block_offset(index);
        let block = self.store.query_from_temp(&self.table_name, offset, BLOCK_SIZE)?;
        let photo = block.get(index - offset).cloned();
        self.state.borrow_mut().blocks.insert_block(offset, block);
        Ok(photo)
    }

    /// Like `get`, but never touches the database.
    pub fn try_get(&self, index: usize) -> Option<SharedPhoto> {
        self.state.borrow().blocks.get(index)
    }

    pub fn index_of(&self, id: PhotoId) -> Result<Option<usize>> {
        if let Some(&index) = self.state.borrow().reverse_lookup.get(&id) {
            return Ok(Some(index));
        }
        self.store.index_of(&self.table_name, id)
    }

    pub fn contains(&self, id: PhotoId) -> Result<bool> {
        Ok(self.index_of(id)?.is_some())
    }

    /// Positions of the given photos, sorted. Ids with a known position are
    /// resolved from memory; the rest take one batched lookup.
    pub fn indices_of(&self, ids: &[PhotoId]) -> Result<Vec<usize>> {
        let start = Instant::now();
        let mut indices = Vec::with_capacity(ids.len());
        let mut to_search = Vec::new();
        {
            let state = self.state.borrow();
            for id in ids {
                match state.reverse_lookup.get(id) {
                    Some(&index) => indices.push(index),
                    None => to_search.push(*id),
                }
            }
        }

        let memo_hits = indices.len();
        if !to_search.is_empty() {
            let found = self.store.indices_of(&self.table_name, &to_search)?;
            let mut state = self.state.borrow_mut();
            for (id, index) in found {
                state.reverse_lookup.insert(id, index);
                indices.push(index);
            }
        }

        indices.sort_unstable();
        indices.dedup();
        debug!(ids = ids.len(), memo_hits, elapsed = ?start.elapsed(), "indices of");
        Ok(indices)
    }

    pub fn time_order_ascending(&self) -> bool {
        match self.state.borrow().conditions.get(ConditionKind::OrderByTime) {
            Some(Condition::OrderByTime(order)) => order.ascending,
            _ => false,
        }
    }

    /// Position of the first photo at `date` in display order: the first
    /// not earlier when ascending, the first not later when descending.
    /// Past the last photo this is `count`; `None` only for an empty view.
    ///
    /// Binary search over resident blocks; the first probe that would fault
    /// falls back to a single indexed query instead.
    pub fn lookup_item(&self, date: DateTime<Utc>) -> Result<Option<usize>> {
        let count = self.count()?;
        if count == 0 {
            return Ok(None);
        }
        let start = Instant::now();
        let ascending = self.time_order_ascending();

        let (mut low, mut high) = (0usize, count);
        while low < high {
            let mid = low + (high - low) / 2;
            let Some(photo) = self.try_get(mid) else {
                let found = self.store.index_of_time(&self.table_name, date, ascending)?;
                debug!(elapsed = ?start.elapsed(), "date lookup fell back to sql");
                return Ok(Some(found.unwrap_or(count)));
            };
            let time = photo.borrow().time();
            let before = if ascending { time < date } else { time > date };
            if before {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        debug!(elapsed = ?start.elapsed(), "date lookup");
        Ok(Some(low))
    }

    pub fn photos_per_month(&self) -> Result<MonthHistogram> {
        self.store.photos_per_month(&self.compiled_conditions())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Persist the photos at `indices`, remembering their positions.
    pub fn commit(&self, indices: &[usize]) -> Result<()> {
        let mut photos = Vec::with_capacity(indices.len());
        for &index in indices {
            let Some(photo) = self.get(index)? else {
                bail!("index {} out of range for view {}", index, self.table_name);
            };
            photos.push(photo);
        }
        {
            let mut state = self.state.borrow_mut();
            for (photo, &index) in photos.iter().zip(indices) {
                state.reverse_lookup.insert(photo.borrow().id(), index);
            }
        }
        self.store.commit(&photos)
    }

    /// Tell listeners the photos at `indices` changed in place.
    pub fn mark_changed(&self, indices: Vec<usize>, changes: PhotosChanges) {
        self.notify(&CollectionEvent::ItemsChanged { indices, changes });
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    pub fn term(&self) -> Option<Term> {
        self.state.borrow().term.clone()
    }

    /// Replace the tag term. Leaves untagged mode.
    pub fn set_term(&self, term: Option<Term>) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            if state.term == term && !state.untagged {
                return Ok(());
            }
            state.term = term;
            state.untagged = false;
        }
        self.request_reload()
    }

    pub fn is_untagged(&self) -> bool {
        self.state.borrow().untagged
    }

    /// In untagged mode the term is ignored and only photos without any tag
    /// match. Entering it drops the tag term and hidden-tag conditions.
    pub fn set_untagged(&self, untagged: bool) -> Result<()> {
        {
            let mut state = self.state.borrow_mut();
            if state.untagged == untagged {
                return Ok(());
            }
            state.untagged = untagged;
            if untagged {
                state.conditions.remove(ConditionKind::Wrapper);
                state.conditions.remove(ConditionKind::HiddenTag);
            }
        }
        self.request_reload()
    }

    pub fn condition(&self, kind: ConditionKind) -> Option<Condition> {
        self.state.borrow().conditions.get(kind).cloned()
    }

    fn update_condition(&self, kind: ConditionKind, condition: Option<Condition>) -> Result<()> {
        let changed = {
            let mut state = self.state.borrow_mut();
            match condition {
                Some(condition) => state.conditions.set(condition),
                None => state.conditions.remove(kind),
            }
        };
        if changed {
            self.request_reload()?;
        }
        Ok(())
    }

    pub fn set_range(&self, range: Option<DateRange>) -> Result<()> {
        self.update_condition(ConditionKind::DateRange, range.map(Condition::from))
    }

    pub fn set_roll_set(&self, rolls: Option<RollSet>) -> Result<()> {
        self.update_condition(ConditionKind::RollSet, rolls.map(Condition::from))
    }

    pub fn set_rating_range(&self, range: Option<RatingRange>) -> Result<()> {
        self.update_condition(ConditionKind::RatingRange, range.map(Condition::from))
    }

    pub fn set_hidden_tag(&self, hidden: Option<HiddenTag>) -> Result<()> {
        self.update_condition(ConditionKind::HiddenTag, hidden.map(Condition::from))
    }

    /// Register an extra term rendered now against the current tag tree.
    /// Photos it selects are shown even when hidden.
    pub fn set_tag_term(&self, term: Option<&Term>) -> Result<()> {
        let session = self.store.session();
        let changed = {
            let mut state = self.state.borrow_mut();
            match term {
                Some(term) => {
                    let sql = term.sql_condition(&session.tags(), session.hidden_tag());
                    let changed = state.conditions.set(ConditionWrapper(sql));
                    if changed {
                        state.untagged = false;
                        state.conditions.set(HiddenTag::show(session.hidden_tag()));
                    }
                    changed
                }
                None => {
                    let changed = state.conditions.remove(ConditionKind::Wrapper);
                    if changed {
                        state.conditions.remove(ConditionKind::HiddenTag);
                    }
                    changed
                }
            }
        };
        if changed {
            self.request_reload()?;
        }
        Ok(())
    }

    pub fn set_order_by_time(&self, order: OrderByTime) -> Result<()> {
        self.update_condition(ConditionKind::OrderByTime, Some(order.into()))
    }

    pub fn set_time_order_ascending(&self, ascending: bool) -> Result<()> {
        if ascending == self.time_order_ascending() {
            return Ok(());
        }
        self.set_order_by_time(OrderByTime { ascending })
    }
}

impl PhotoStoreObserver for PagedView {
    fn on_store_event(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Changed { ids, changes } => match self.indices_of(ids) {
                Ok(indices) if !indices.is_empty() => self.mark_changed(indices, *changes),
                Ok(_) => {}
                Err(e) => warn!(table = %self.table_name, error = %e, "failed to map changed photos"),
            },
            StoreEvent::Added(ids) | StoreEvent::Removed(ids) => {
                debug!(table = %self.table_name, photos = ids.len(), "membership changed, stale until reload");
            }
        }
    }
}

impl Drop for PagedView {
    fn drop(&mut self) {
        let sql = format!("DROP TABLE IF EXISTS {}", self.table_name);
        if let Err(e) = self.store.database().execute(&sql, []) {
            debug!(table = %self.table_name, error = %e, "failed to drop view table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, PhotoCache, QueryStats};
    use crate::model::NewPhoto;
    use crate::session::Session;

    fn store() -> Rc<PhotoStore> {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        Rc::new(PhotoStore::new(
            Rc::new(db),
            Rc::new(Session::new()),
            Rc::new(PhotoCache::new()),
        ))
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn import(store: &PhotoStore, seconds: i64) -> SharedPhoto {
        let uri = format!("file:///p/{}.jpg", seconds);
        store.create_from(&NewPhoto::new(&uri, at(seconds)), false, 0).unwrap()
    }

    fn times(view: &PagedView) -> Vec<i64> {
        (0..view.count().unwrap())
            .map(|i| view.get(i).unwrap().unwrap().borrow().time().timestamp())
            .collect()
    }

    fn record(view: &PagedView) -> Rc<RefCell<Vec<CollectionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        view.connect(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    fn reloads(events: &RefCell<Vec<CollectionEvent>>) -> usize {
        events
            .borrow()
            .iter()
            .filter(|e| **e == CollectionEvent::Reloaded)
            .count()
    }

    /// Indices of the single description change recorded.
    fn changed_indices(events: &RefCell<Vec<CollectionEvent>>) -> Vec<usize> {
        match events.borrow().as_slice() {
            [CollectionEvent::ItemsChanged { indices, changes }] => {
                assert!(changes.description_changed);
                indices.clone()
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_orders_by_time_and_looks_up_dates() {
        let store = store();
        for seconds in [10, 30, 20] {
            import(&store, seconds);
        }
        let view = PagedView::new(store.clone(), false).unwrap();

        // nothing resident yet, answered by sql
        assert_eq!(view.lookup_item(at(20)).unwrap(), Some(1));
        assert_eq!(times(&view), vec![30, 20, 10]);

        store.database().reset_stats();
        assert_eq!(view.lookup_item(at(20)).unwrap(), Some(1));
        assert_eq!(view.lookup_item(at(25)).unwrap(), Some(1));
        assert_eq!(view.lookup_item(at(40)).unwrap(), Some(0));
        assert_eq!(view.lookup_item(at(5)).unwrap(), Some(3));
        assert_eq!(store.database().stats().queries, 0);

        view.set_time_order_ascending(true).unwrap();
        assert_eq!(view.lookup_item(at(20)).unwrap(), Some(1));
        assert_eq!(view.lookup_item(at(25)).unwrap(), Some(2));
        assert_eq!(times(&view), vec![10, 20, 30]);
        assert_eq!(view.lookup_item(at(25)).unwrap(), Some(2));
    }

    #[test]
    fn test_lookup_in_empty_view() {
        let view = PagedView::new(store(), false).unwrap();
        assert_eq!(view.count().unwrap(), 0);
        assert_eq!(view.lookup_item(at(20)).unwrap(), None);
        assert!(view.get(0).unwrap().is_none());
    }

    #[test]
    fn test_reload_is_idempotent() {
        let store = store();
        for seconds in [5, 1, 3, 4, 2] {
            import(&store, seconds);
        }
        let view = PagedView::new(store, true).unwrap();
        let first = times(&view);
        view.request_reload().unwrap();
        assert_eq!(view.count().unwrap(), 5);
        assert_eq!(times(&view), first);
    }

    #[test]
    fn test_pages_in_blocks() {
        let store = store();
        for seconds in 1..=120 {
            import(&store, seconds);
        }
        let view = PagedView::new(store, true).unwrap();

        assert!(view.try_get(110).is_none());
        assert_eq!(view.get(110).unwrap().unwrap().borrow().time().timestamp(), 111);
        assert_eq!(view.state.borrow().blocks.len(), 1);
        assert!(view.try_get(5).is_none());
        assert_eq!(view.get(5).unwrap().unwrap().borrow().time().timestamp(), 6);
        assert_eq!(view.state.borrow().blocks.len(), 2);
        assert!(view.get(120).unwrap().is_none());
    }

    #[test]
    fn test_commit_records_reverse_lookup() {
        let store = store();
        for seconds in 1..=7 {
            import(&store, seconds);
        }
        let view = PagedView::new(store.clone(), false).unwrap();
        let events = record(&view);

        let photo = view.get(5).unwrap().unwrap();
        let id = photo.borrow().id();
        photo.borrow_mut().set_rating(4);
        view.commit(&[5]).unwrap();

        store.database().reset_stats();
        assert_eq!(view.index_of(id).unwrap(), Some(5));
        assert_eq!(view.indices_of(&[id]).unwrap(), vec![5]);
        assert_eq!(store.database().stats(), QueryStats::default());

        match events.borrow().as_slice() {
            [CollectionEvent::ItemsChanged { indices, changes }] => {
                assert_eq!(indices, &vec![5]);
                assert!(changes.rating_changed);
                assert!(!changes.tags_changed);
            }
            other => panic!("unexpected events {:?}", other),
        }

        view.request_reload().unwrap();
        store.database().reset_stats();
        assert_eq!(view.index_of(id).unwrap(), Some(5));
        assert_eq!(store.database().stats().queries, 1);
    }

    #[test]
    fn test_commit_out_of_range() {
        let store = store();
        import(&store, 1);
        let view = PagedView::new(store, false).unwrap();
        assert!(view.commit(&[3]).is_err());
    }

    #[test]
    fn test_changes_reach_every_view() {
        let store = store();
        for seconds in [10, 20, 30] {
            import(&store, seconds);
        }
        let newest_first = PagedView::new(store.clone(), false).unwrap();
        let oldest_first = PagedView::new(store.clone(), true).unwrap();
        let a = record(&newest_first);
        let b = record(&oldest_first);

        let photo = newest_first.get(0).unwrap().unwrap();
        photo.borrow_mut().set_description("sunset");
        newest_first.commit(&[0]).unwrap();

        assert_eq!(changed_indices(&a), vec![0]);
        assert_eq!(changed_indices(&b), vec![2]);
        // same instance through both views
        assert_eq!(oldest_first.get(2).unwrap().unwrap().borrow().description(), "sunset");
    }

    #[test]
    fn test_hidden_tag_policy() {
        let store = store();
        store.session().set_hidden_tag(Some(50));
        let hidden = import(&store, 1);
        let visible = import(&store, 2);
        hidden.borrow_mut().add_tag(50);
        store.commit_one(&hidden).unwrap();
        let hidden_id = hidden.borrow().id();
        let visible_id = visible.borrow().id();

        let view = PagedView::new(store, false).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(view.contains(visible_id).unwrap());

        view.set_term(Some(Term::literal(50))).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(view.contains(hidden_id).unwrap());

        view.set_term(Some(Term::all_of(&[50]).unwrap())).unwrap();
        assert_eq!(view.count().unwrap(), 1);

        view.set_term(None).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(!view.contains(hidden_id).unwrap());

        view.set_hidden_tag(Some(HiddenTag::only(Some(50)))).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(view.contains(hidden_id).unwrap());

        view.set_hidden_tag(Some(HiddenTag::show(Some(50)))).unwrap();
        assert_eq!(view.count().unwrap(), 2);
    }

    #[test]
    fn test_tag_term_shows_hidden() {
        let store = store();
        store.session().set_hidden_tag(Some(50));
        let photo = import(&store, 1);
        import(&store, 2);
        photo.borrow_mut().add_tags(&[7, 50]);
        store.commit_one(&photo).unwrap();

        let view = PagedView::new(store, false).unwrap();
        assert_eq!(view.count().unwrap(), 1);

        view.set_tag_term(Some(&Term::literal(7))).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(view.contains(photo.borrow().id()).unwrap());
        assert!(view.condition(ConditionKind::HiddenTag).is_some());

        view.set_tag_term(None).unwrap();
        assert!(view.condition(ConditionKind::HiddenTag).is_none());
        assert!(!view.contains(photo.borrow().id()).unwrap());
    }

    #[test]
    fn test_untagged_mode() {
        let store = store();
        let tagged = import(&store, 1);
        let bare = import(&store, 2);
        tagged.borrow_mut().add_tag(7);
        store.commit_one(&tagged).unwrap();

        let view = PagedView::new(store, false).unwrap();
        view.set_term(Some(Term::literal(7))).unwrap();
        view.set_untagged(true).unwrap();
        assert!(view.is_untagged());
        assert_eq!(view.count().unwrap(), 1);
        assert!(view.contains(bare.borrow().id()).unwrap());

        view.set_untagged(false).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(view.contains(tagged.borrow().id()).unwrap());
    }

    #[test]
    fn test_setters_reload_only_on_change() {
        let store = store();
        import(&store, 1);
        let view = PagedView::new(store, false).unwrap();
        let events = record(&view);

        view.set_rating_range(Some(RatingRange::at_least(3))).unwrap();
        view.set_rating_range(Some(RatingRange::at_least(3))).unwrap();
        assert_eq!(reloads(&events), 1);
        assert_eq!(view.count().unwrap(), 0);

        view.set_time_order_ascending(false).unwrap();
        view.set_untagged(false).unwrap();
        view.set_term(None).unwrap();
        assert_eq!(reloads(&events), 1);

        view.set_time_order_ascending(true).unwrap();
        assert!(view.time_order_ascending());
        view.set_rating_range(None).unwrap();
        view.set_rating_range(None).unwrap();
        assert_eq!(reloads(&events), 3);
        assert_eq!(view.count().unwrap(), 1);
    }

    #[test]
    fn test_range_and_rolls() {
        let store = store();
        let early = store
            .create_from(&NewPhoto::new("file:///p/a.jpg", at(100)), false, 1)
            .unwrap();
        store
            .create_from(&NewPhoto::new("file:///p/b.jpg", at(200)), false, 2)
            .unwrap();

        let view = PagedView::new(store, false).unwrap();
        view.set_range(Some(DateRange::new(at(50), at(150)))).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(view.contains(early.borrow().id()).unwrap());

        view.set_range(None).unwrap();
        view.set_roll_set(Some(RollSet::new(&[2]))).unwrap();
        assert_eq!(view.count().unwrap(), 1);
        assert!(!view.contains(early.borrow().id()).unwrap());
    }

    #[test]
    fn test_photos_per_month_uses_view_conditions() {
        let store = store();
        // 2001-03-15 and 2003-07-01
        import(&store, 984_614_400);
        let late = import(&store, 1_057_017_600);
        late.borrow_mut().set_rating(5);
        store.commit_one(&late).unwrap();

        let view = PagedView::new(store, false).unwrap();
        assert_eq!(view.photos_per_month().unwrap().len(), 3);
        view.set_rating_range(Some(RatingRange::at_least(4))).unwrap();
        let histogram = view.photos_per_month().unwrap();
        assert_eq!(histogram.keys().copied().collect::<Vec<_>>(), vec![2003]);
        assert_eq!(histogram[&2003][6], 1);
    }

    #[test]
    fn test_drop_removes_table() {
        let store = store();
        let view = PagedView::new(store.clone(), false).unwrap();
        let table = view.table_name().to_string();
        drop(view);

        let remaining: i64 = store
            .database()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_temp_master WHERE name = ?",
                [&table],
                |row| row.get(0),
            )
            .unwrap()
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
