//! Boolean tag expressions.
//!
//! A `Term` is either a tag literal (optionally negated) or an `And`/`Or`
//! over child terms. Negation is structural: inverting an `And` yields an
//! `Or` over the (optionally inverted) children, and vice versa.
//!
//! Composite nodes below the root never stay empty. Removing the last
//! child of a nested composite removes the composite too.

use thiserror::Error;

use crate::model::{TagId, TagTree};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TermError {
    #[error("a literal cannot hold subterms")]
    NotComposite,
    #[error("no term at path {0:?}")]
    BadPath(Vec<usize>),
    #[error("cannot attach an empty and/or term")]
    EmptyComposite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Literal { tag: TagId, negated: bool },
    And(Vec<Term>),
    Or(Vec<Term>),
}

/// Result of `Term::tag_required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRequirement {
    pub required: bool,
    /// Number of literal groups the tag was found in.
    pub num_terms: usize,
    /// Size of the smallest group holding the tag.
    pub grouped_with: usize,
}

const NO_GROUP: usize = 100;

impl Term {
    pub fn literal(tag: TagId) -> Self {
        Term::Literal { tag, negated: false }
    }

    pub fn negated(tag: TagId) -> Self {
        Term::Literal { tag, negated: true }
    }

    /// `Or` over one literal per tag, or `None` for no tags.
    pub fn any_of(tags: &[TagId]) -> Option<Self> {
        if tags.is_empty() {
            return None;
        }
        Some(Term::Or(tags.iter().map(|t| Term::literal(*t)).collect()))
    }

    pub fn all_of(tags: &[TagId]) -> Option<Self> {
        if tags.is_empty() {
            return None;
        }
        Some(Term::And(tags.iter().map(|t| Term::literal(*t)).collect()))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    pub fn tag(&self) -> Option<TagId> {
        match self {
            Term::Literal { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    pub fn subterms(&self) -> &[Term] {
        match self {
            Term::Literal { .. } => &[],
            Term::And(children) | Term::Or(children) => children,
        }
    }

    fn subterms_mut(&mut self) -> Option<&mut Vec<Term>> {
        match self {
            Term::Literal { .. } => None,
            Term::And(children) | Term::Or(children) => Some(children),
        }
    }

    pub fn count(&self) -> usize {
        self.subterms().len()
    }

    pub fn has_multiple(&self) -> bool {
        self.count() > 1
    }

    pub fn last(&self) -> Option<&Term> {
        self.subterms().last()
    }

    pub fn get(&self, path: &[usize]) -> Option<&Term> {
        let mut node = self;
        for index in path {
            node = node.subterms().get(*index)?;
        }
        Some(node)
    }

    /// Append `term` as the last child. Terms holding an empty `And`/`Or`
    /// anywhere are rejected.
    pub fn add(&mut self, term: Term) -> Result<(), TermError> {
        let children = self.subterms_mut().ok_or(TermError::NotComposite)?;
        check_attachable(&term)?;
        children.push(term);
        Ok(())
    }

    /// Insert `term` right after the child at `index`, or last when `index`
    /// is past the end.
    pub fn insert_after(&mut self, index: usize, term: Term) -> Result<(), TermError> {
        let children = self.subterms_mut().ok_or(TermError::NotComposite)?;
        check_attachable(&term)?;
        let at = (index + 1).min(children.len());
        children.insert(at, term);
        Ok(())
    }

    /// Remove the node at `path` (child indices from this node) and return it.
    ///
    /// Nested composites emptied by the removal are pruned on the way up.
    /// The node this is called on is never removed, even when empty.
    pub fn remove_at(&mut self, path: &[usize]) -> Result<Term, TermError> {
        remove_in(self, path).ok_or_else(|| TermError::BadPath(path.to_vec()))
    }

    /// Drop every literal for `tag`, pruning emptied composites.
    /// Returns how many literals were removed.
    pub fn remove_tag(&mut self, tag: TagId) -> usize {
        let Some(children) = self.subterms_mut() else {
            return 0;
        };
        let before = children.len();
        children.retain(|c| c.tag() != Some(tag));
        let mut removed = before - children.len();
        for child in children.iter_mut() {
            removed += child.remove_tag(tag);
        }
        children.retain(|c| c.is_literal() || c.count() > 0);
        removed
    }

    /// Literals for `tag`. Non-recursive search looks at this node and its
    /// direct children only.
    pub fn find_by_tag(&self, tag: TagId, recursive: bool) -> Vec<&Term> {
        let mut results = Vec::new();
        if self.tag() == Some(tag) {
            results.push(self);
        }
        for child in self.subterms() {
            if recursive {
                results.extend(child.find_by_tag(tag, true));
            } else if child.tag() == Some(tag) {
                results.push(child);
            }
        }
        results
    }

    pub fn references_tag(&self, tag: TagId) -> bool {
        !self.find_by_tag(tag, true).is_empty()
    }

    /// Composite nodes that directly hold at least one literal, deepest first.
    pub fn literal_parents(&self) -> Vec<&Term> {
        let mut results = Vec::new();
        let mut holds_literal = false;
        for child in self.subterms() {
            if child.is_literal() {
                holds_literal = true;
            }
            results.extend(child.literal_parents());
        }
        if holds_literal {
            results.push(self);
        }
        results
    }

    /// True when some literal group contains `tag` and nothing else.
    pub fn tag_included(&self, tag: TagId) -> bool {
        self.literal_parents().iter().any(|group| {
            let mut has_tag = false;
            let mut only_tag = true;
            for literal in group.subterms().iter().filter_map(Term::tag) {
                if literal == tag {
                    has_tag = true;
                } else {
                    only_tag = false;
                }
            }
            has_tag && only_tag
        })
    }

    /// True when every literal group holding more than one term contains
    /// `tag`. Groups with a single term count as "included", not required.
    pub fn tag_required(&self, tag: TagId) -> TagRequirement {
        let parents = self.literal_parents();
        let mut requirement = TagRequirement {
            required: false,
            num_terms: 0,
            grouped_with: NO_GROUP,
        };
        if parents.is_empty() {
            return requirement;
        }

        let mut min_grouped_with = NO_GROUP;
        for group in parents {
            let mut group_has_tag = false;
            if group.has_multiple() && group.subterms().iter().any(|t| t.tag() == Some(tag)) {
                requirement.num_terms += 1;
                requirement.grouped_with = group.count();
                group_has_tag = true;
            }
            min_grouped_with = min_grouped_with.min(requirement.grouped_with);
            if !group_has_tag {
                return requirement;
            }
        }

        requirement.required = true;
        requirement.grouped_with = min_grouped_with;
        requirement
    }

    /// Structural negation. With `recurse` the children are inverted too,
    /// otherwise they move across unchanged.
    pub fn invert(self, recurse: bool) -> Term {
        let flip = |children: Vec<Term>| -> Vec<Term> {
            if recurse {
                children.into_iter().map(|c| c.invert(true)).collect()
            } else {
                children
            }
        };
        match self {
            Term::Literal { tag, negated } => Term::Literal { tag, negated: !negated },
            Term::And(children) => Term::Or(flip(children)),
            Term::Or(children) => Term::And(flip(children)),
        }
    }

    /// Render as a WHERE fragment over `photos`.
    ///
    /// A category literal matches the category and every tag beneath it.
    /// Each `And` node excludes photos carrying `hidden_tag` unless the
    /// hidden tag appears as a literal somewhere under that node. An empty
    /// composite renders as an empty string.
    pub fn sql_condition(&self, tags: &TagTree, hidden_tag: Option<TagId>) -> String {
        match self {
            Term::Literal { tag, negated } => {
                let mut ids = vec![tag.to_string()];
                if tags.get(*tag).is_some_and(|t| t.is_category) {
                    ids.extend(tags.descendants(*tag).iter().map(|id| id.to_string()));
                }
                format!(
                    "id {}IN (SELECT photo_id FROM photo_tags WHERE tag_id IN ({}))",
                    if *negated { "NOT " } else { "" },
                    ids.join(", ")
                )
            }
            Term::Or(_) => self.joined_children(" OR ", tags, hidden_tag),
            Term::And(_) => {
                let inner = self.joined_children(" AND ", tags, hidden_tag);
                if inner.is_empty() {
                    return inner;
                }
                match hidden_tag {
                    Some(hidden) if !self.references_tag(hidden) => format!(
                        "({} AND id NOT IN (SELECT photo_id FROM photo_tags WHERE tag_id = {}))",
                        inner, hidden
                    ),
                    _ => format!("({})", inner),
                }
            }
        }
    }

    fn joined_children(&self, operator: &str, tags: &TagTree, hidden_tag: Option<TagId>) -> String {
        let parts: Vec<String> = self
            .subterms()
            .iter()
            .map(|t| t.sql_condition(tags, hidden_tag))
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            return String::new();
        }
        format!("({})", parts.join(operator))
    }
}

fn remove_in(node: &mut Term, path: &[usize]) -> Option<Term> {
    let (&first, rest) = path.split_first()?;
    let children = node.subterms_mut()?;
    if rest.is_empty() {
        return (first < children.len()).then(|| children.remove(first));
    }
    let child = children.get_mut(first)?;
    let removed = remove_in(child, rest)?;
    if !child.is_literal() && child.count() == 0 {
        children.remove(first);
    }
    Some(removed)
}

fn check_attachable(term: &Term) -> Result<(), TermError> {
    match term {
        Term::Literal { .. } => Ok(()),
        Term::And(children) | Term::Or(children) if children.is_empty() => Err(TermError::EmptyComposite),
        Term::And(children) | Term::Or(children) => children.iter().try_for_each(check_attachable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Tag, ROOT_CATEGORY_ID};
    use rusqlite::Connection;

    const HIDDEN: TagId = 9;

    fn tree() -> TagTree {
        let mut tree = TagTree::new();
        tree.insert(Tag::new(1, "People", ROOT_CATEGORY_ID, true)).unwrap();
        tree.insert(Tag::new(2, "Alice", 1, false)).unwrap();
        tree.insert(Tag::new(3, "Bob", 1, false)).unwrap();
        tree.insert(Tag::new(4, "Beach", ROOT_CATEGORY_ID, false)).unwrap();
        tree.insert(Tag::new(HIDDEN, "Hidden", ROOT_CATEGORY_ID, false)).unwrap();
        tree
    }

    /// Ids of photos 1..=8 matching `where_clause`. Photo n carries the tags
    /// whose bit is set in n, drawn from [2, 4, HIDDEN].
    fn matching(where_clause: &str) -> Vec<i64> {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE photos (id INTEGER PRIMARY KEY);
             CREATE TABLE photo_tags (photo_id INTEGER, tag_id INTEGER);",
        )
        .unwrap();
        for id in 1..=8i64 {
            conn.execute("INSERT INTO photos (id) VALUES (?)", [id]).unwrap();
            for (bit, tag) in [2i64, 4, HIDDEN].iter().enumerate() {
                if id & (1 << bit) != 0 {
                    conn.execute("INSERT INTO photo_tags VALUES (?, ?)", [id, *tag]).unwrap();
                }
            }
        }
        let sql = format!("SELECT id FROM photos WHERE {} ORDER BY id", where_clause);
        let mut stmt = conn.prepare(&sql).unwrap();
        let ids = stmt.query_map([], |row| row.get(0)).unwrap();
        ids.map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_literal_sql_expands_categories() {
        let tree = tree();
        assert_eq!(
            Term::literal(1).sql_condition(&tree, None),
            "id IN (SELECT photo_id FROM photo_tags WHERE tag_id IN (1, 2, 3))"
        );
        assert_eq!(
            Term::negated(4).sql_condition(&tree, None),
            "id NOT IN (SELECT photo_id FROM photo_tags WHERE tag_id IN (4))"
        );
    }

    #[test]
    fn test_and_excludes_hidden_unless_referenced() {
        let tree = tree();
        let plain = Term::And(vec![Term::literal(2), Term::literal(4)]);
        let sql = plain.sql_condition(&tree, Some(HIDDEN));
        assert!(sql.contains("tag_id = 9"));
        assert_eq!(matching(&sql), vec![3]);

        let with_hidden = Term::And(vec![Term::literal(2), Term::literal(HIDDEN)]);
        let sql = with_hidden.sql_condition(&tree, Some(HIDDEN));
        assert!(!sql.contains("tag_id = 9"));
        assert_eq!(matching(&sql), vec![5, 7]);
    }

    #[test]
    fn test_hidden_rule_is_local_to_each_and() {
        let tree = tree();
        let term = Term::Or(vec![
            Term::And(vec![Term::literal(HIDDEN)]),
            Term::And(vec![Term::literal(4)]),
        ]);
        let sql = term.sql_condition(&tree, Some(HIDDEN));
        assert_eq!(sql.matches("tag_id = 9").count(), 1);
        // hidden photos via the first group, unhidden beach photos via the second
        assert_eq!(matching(&sql), vec![2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_or_has_no_hidden_exclusion() {
        let tree = tree();
        let sql = Term::any_of(&[2, 4]).unwrap().sql_condition(&tree, Some(HIDDEN));
        assert!(!sql.contains("tag_id = 9"));
    }

    #[test]
    fn test_double_inversion_preserves_truth() {
        let tree = tree();
        let terms = [
            Term::And(vec![Term::literal(2), Term::negated(4)]),
            Term::Or(vec![Term::literal(2), Term::And(vec![Term::literal(4), Term::negated(HIDDEN)])]),
        ];
        for term in terms {
            for recurse in [true, false] {
                let twice = term.clone().invert(recurse).invert(recurse);
                assert_eq!(
                    matching(&twice.sql_condition(&tree, Some(HIDDEN))),
                    matching(&term.sql_condition(&tree, Some(HIDDEN)))
                );
            }
        }
    }

    #[test]
    fn test_recursive_inversion_negates() {
        let tree = tree();
        let term = Term::Or(vec![Term::literal(2), Term::literal(4)]);
        let inverted = term.clone().invert(true);
        assert_eq!(inverted, Term::And(vec![Term::negated(2), Term::negated(4)]));

        let all: Vec<i64> = (1..=8).collect();
        let mut union = matching(&term.sql_condition(&tree, None));
        union.extend(matching(&inverted.sql_condition(&tree, None)));
        union.sort();
        assert_eq!(union, all);
    }

    #[test]
    fn test_remove_prunes_empty_composites() {
        let mut term = Term::And(vec![Term::literal(2), Term::Or(vec![Term::literal(4)])]);
        let removed = term.remove_at(&[1, 0]).unwrap();
        assert_eq!(removed, Term::literal(4));
        assert_eq!(term, Term::And(vec![Term::literal(2)]));

        term.remove_at(&[0]).unwrap();
        assert_eq!(term, Term::And(vec![]));
        assert_eq!(term.remove_at(&[0]), Err(TermError::BadPath(vec![0])));
        assert_eq!(term.sql_condition(&tree(), Some(HIDDEN)), "");
    }

    #[test]
    fn test_remove_tag() {
        let mut term = Term::Or(vec![
            Term::literal(2),
            Term::And(vec![Term::literal(2)]),
            Term::And(vec![Term::literal(4), Term::negated(2)]),
        ]);
        assert_eq!(term.remove_tag(2), 3);
        assert_eq!(term, Term::Or(vec![Term::And(vec![Term::literal(4)])]));
    }

    #[test]
    fn test_add_to_literal_fails() {
        let mut term = Term::literal(2);
        assert_eq!(term.add(Term::literal(4)), Err(TermError::NotComposite));
    }

    #[test]
    fn test_add_rejects_empty_composites() {
        let mut term = Term::And(vec![Term::literal(2)]);
        assert_eq!(term.add(Term::Or(vec![])), Err(TermError::EmptyComposite));
        assert_eq!(
            term.add(Term::Or(vec![Term::literal(3), Term::And(vec![])])),
            Err(TermError::EmptyComposite)
        );
        assert_eq!(term.insert_after(0, Term::And(vec![])), Err(TermError::EmptyComposite));
        assert_eq!(term, Term::And(vec![Term::literal(2)]));

        term.add(Term::Or(vec![Term::literal(3)])).unwrap();
        assert_eq!(term.count(), 2);
    }

    #[test]
    fn test_insert_after() {
        let mut term = Term::Or(vec![Term::literal(1), Term::literal(3)]);
        term.insert_after(0, Term::literal(2)).unwrap();
        term.insert_after(7, Term::literal(4)).unwrap();
        assert_eq!(
            term,
            Term::Or(vec![Term::literal(1), Term::literal(2), Term::literal(3), Term::literal(4)])
        );
        assert_eq!(
            Term::negated(5).insert_after(0, Term::literal(6)),
            Err(TermError::NotComposite)
        );
    }

    #[test]
    fn test_find_by_tag() {
        let term = Term::And(vec![Term::literal(2), Term::Or(vec![Term::literal(2), Term::literal(4)])]);
        assert_eq!(term.find_by_tag(2, true).len(), 2);
        assert_eq!(term.find_by_tag(2, false).len(), 1);
        assert!(term.find_by_tag(3, true).is_empty());
    }

    #[test]
    fn test_tag_included_and_required() {
        let term = Term::And(vec![Term::literal(2), Term::Or(vec![Term::literal(2), Term::literal(4)])]);
        // the root group holds the literal 2 and a composite, which is not a tag
        assert!(term.tag_included(2));
        assert!(!term.tag_included(4));
        assert_eq!(
            term.tag_required(2),
            TagRequirement { required: true, num_terms: 2, grouped_with: 2 }
        );
        assert!(!term.tag_required(4).required);

        let single = Term::And(vec![Term::literal(4)]);
        assert!(single.tag_included(4));
        assert!(!single.tag_required(4).required);
        assert_eq!(Term::literal(4).literal_parents().len(), 0);
    }

    #[test]
    fn test_literal_parents_post_order() {
        let inner = Term::Or(vec![Term::literal(4)]);
        let term = Term::And(vec![inner.clone(), Term::literal(2)]);
        let parents = term.literal_parents();
        assert_eq!(parents, vec![&inner, &term]);
    }
}
