use domain::store::{CommentFilter, Ordering, ParentFilter, StoreTx};
use domain::{Comment, CommentId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct ThreadArena {
    nodes: HashMap<CommentId, Comment>,
    children: HashMap<CommentId, Vec<CommentId>>,
}

impl ThreadArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_comments(comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut arena = Self::new();
        for comment in comments {
            arena.insert(comment);
        }
        arena
    }

    pub fn insert(&mut self, comment: Comment) {
        if self.nodes.contains_key(&comment.id) {
            return;
        }
        if let Some(parent) = &comment.parent_id {
            self.children
                .entry(parent.clone())
                .or_default()
                .push(comment.id.clone());
        }
        self.nodes.insert(comment.id.clone(), comment);
    }

    pub fn get(&self, id: &CommentId) -> Option<&Comment> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.nodes.values().filter_map(|c| c.by_email.as_deref())
    }

    /// Direct replies, oldest first.
    pub fn children_of(&self, id: &CommentId) -> Vec<&Comment> {
        let mut replies: Vec<&Comment> = self
            .children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        replies
    }

    /// Whether a live comment matching `approved` sits below `id`. Only
    /// paths whose every node matches `approved` are followed, since a
    /// reply hidden by the filter hides its whole subtree.
    pub fn has_visible_descendant(&self, id: &CommentId, approved: Option<bool>) -> bool {
        let mut stack = vec![id];
        let mut seen: HashSet<&CommentId> = HashSet::new();
        seen.insert(id);

        while let Some(current) = stack.pop() {
            for child_id in self.children.get(current).into_iter().flatten() {
                if !seen.insert(child_id) {
                    continue;
                }
                let Some(child) = self.nodes.get(child_id) else {
                    continue;
                };
                if approved.is_some_and(|want| child.approved != want) {
                    continue;
                }
                if !child.is_deleted() {
                    return true;
                }
                stack.push(child_id);
            }
        }
        false
    }
}

/// Outcome of a level-by-level descendant walk.
#[derive(Debug, Default)]
pub struct Descendants {
    pub comments: Vec<Comment>,
    /// Set when a level beyond `max_depth` still had replies.
    pub overflowed: bool,
}

/// Loads every descendant of `roots`, one query per depth level.
///
/// Ids already seen are skipped so `parent_id` cycles terminate. The walk
/// stops after `max_depth` levels and reports whether anything was left.
pub async fn load_descendants(
    tx: &mut dyn StoreTx,
    roots: &[CommentId],
    max_depth: usize,
) -> anyhow::Result<Descendants> {
    let mut seen: HashSet<CommentId> = roots.iter().cloned().collect();
    let mut frontier: Vec<CommentId> = roots.to_vec();
    let mut out = Descendants::default();
    let mut depth = 0;

    while !frontier.is_empty() {
        let filter = CommentFilter {
            parent: ParentFilter::ChildOfAny(frontier),
            ..Default::default()
        };
        let level: Vec<Comment> = tx
            .find_comments(&filter, None, Ordering::OldestFirst)
            .await?
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect();

        if level.is_empty() {
            break;
        }
        depth += 1;
        if depth > max_depth {
            out.overflowed = true;
            break;
        }

        frontier = level.iter().map(|c| c.id.clone()).collect();
        out.comments.extend(level);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use domain::ProjectId;

    fn node(id: &str, parent: Option<&str>, deleted: bool, minute: i64) -> Comment {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Comment {
            id: id.into(),
            page_id: "page".into(),
            project_id: ProjectId::new_unchecked("proj".into()),
            page_slug: "slug".into(),
            parent_id: parent.map(CommentId::from),
            content: id.into(),
            by_email: None,
            by_nickname: None,
            moderator_id: None,
            approved: true,
            created_at: base + Duration::minutes(minute),
            deleted_at: deleted.then(|| base),
            notify_confirmed_at: None,
        }
    }

    #[test]
    fn test_active_descendant_at_depth() {
        let arena = ThreadArena::from_comments(vec![
            node("r", None, true, 0),
            node("a", Some("r"), true, 1),
            node("b", Some("a"), true, 2),
            node("c", Some("b"), false, 3),
        ]);
        assert!(arena.has_visible_descendant(&"r".into(), None));
        assert!(arena.has_visible_descendant(&"b".into(), None));
        assert!(!arena.has_visible_descendant(&"c".into(), None));
    }

    #[test]
    fn test_only_deleted_descendants() {
        let arena = ThreadArena::from_comments(vec![
            node("r", None, true, 0),
            node("a", Some("r"), true, 1),
            node("b", Some("r"), true, 2),
        ]);
        assert!(!arena.has_visible_descendant(&"r".into(), None));
    }

    #[test]
    fn test_pending_descendant_not_visible_to_approved_filter() {
        let mut pending = node("c", Some("b"), false, 2);
        pending.approved = false;
        let arena = ThreadArena::from_comments(vec![
            node("r", None, false, 0),
            node("b", Some("r"), true, 1),
            pending,
        ]);
        assert!(!arena.has_visible_descendant(&"b".into(), Some(true)));
        assert!(arena.has_visible_descendant(&"b".into(), None));
        assert!(arena.has_visible_descendant(&"b".into(), Some(false)));
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let arena = ThreadArena::from_comments(vec![
            node("a", Some("b"), true, 0),
            node("b", Some("a"), true, 1),
        ]);
        assert!(!arena.has_visible_descendant(&"a".into(), None));
    }

    #[test]
    fn test_children_sorted_oldest_first() {
        let arena = ThreadArena::from_comments(vec![
            node("r", None, false, 0),
            node("late", Some("r"), false, 9),
            node("early", Some("r"), false, 1),
        ]);
        let ids: Vec<&str> = arena
            .children_of(&"r".into())
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }
}
