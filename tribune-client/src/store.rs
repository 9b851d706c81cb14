use std::collections::{HashMap, HashSet};

use crate::api::{
    Comment, CommentId, CommentPage, EngagementAction, EngagementUpdate, FeedEvent, SortBy, User,
};

/// Asked of the caller when an event cannot be reconciled locally and the
/// server must be consulted again.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reload {
    /// Re-fetch the currently displayed page of root comments
    RootPage,
    /// Re-fetch the reply set of this parent
    Replies(CommentId),
}

/// Single source of truth for the comments currently on screen.
///
/// Three input streams meet here: initial/paged loads from the server,
/// local optimistic mutations (see `mutation.rs`), and push events from the
/// feed. `apply_event` is written so that applying the echo of our own
/// optimistic mutation is a no-op, while the same event still updates every
/// other viewer's store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommentStore {
    /// The authenticated viewer; engagement flags are relative to them
    pub viewer: Option<User>,

    /// Root comments for the current page and sort, in display order
    pub comments: Vec<Comment>,

    /// Loaded reply sets by parent id. Absent key: not loaded yet.
    /// Empty vec: loaded, zero replies.
    pub replies: HashMap<CommentId, Vec<Comment>>,

    /// Parents whose replies are currently unfolded in the UI
    pub expanded: HashSet<CommentId>,

    /// Reply ids already counted into their parent's `reply_count`, by an
    /// optimistic insert or by a feed event. Duplicate deliveries are
    /// recognized here even when the reply set itself is not loaded.
    pub seen_replies: HashSet<CommentId>,

    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
    pub sort: SortBy,
}

impl CommentStore {
    pub fn new(viewer: Option<User>, limit: u32) -> CommentStore {
        CommentStore {
            viewer,
            comments: Vec::new(),
            replies: HashMap::new(),
            expanded: HashSet::new(),
            seen_replies: HashSet::new(),
            page: 1,
            limit,
            total: 0,
            pages: 1,
            sort: SortBy::default(),
        }
    }

    /// Replace the root list with a freshly fetched page. Reply sets and
    /// expansion state of parents that are no longer on screen are dropped;
    /// replies are refetched when such a parent comes back and is unfolded.
    pub fn set_page(&mut self, page: CommentPage) {
        self.comments = page.comments;
        self.page = page.pagination.page;
        self.limit = page.pagination.limit;
        self.total = page.pagination.total;
        self.pages = page.pagination.pages;
        let comments = &self.comments;
        self.replies
            .retain(|parent, _| comments.iter().any(|c| c.id == *parent));
        self.expanded
            .retain(|parent| comments.iter().any(|c| c.id == *parent));
    }

    pub fn set_replies(&mut self, parent: CommentId, replies: Vec<Comment>) {
        self.replies.insert(parent, replies);
    }

    /// Returns true if the page must be reloaded from the server. Changing
    /// the sort mode always resets to page 1; already-loaded data is never
    /// re-sorted client-side.
    #[must_use]
    pub fn set_sort(&mut self, sort: SortBy) -> bool {
        if self.sort == sort {
            return false;
        }
        self.sort = sort;
        self.page = 1;
        true
    }

    #[must_use]
    pub fn set_page_number(&mut self, page: u32) -> bool {
        if self.page == page {
            return false;
        }
        self.page = page;
        true
    }

    /// Fold or unfold the replies under `parent`. Returns true when the
    /// caller needs to fetch the reply set from the server.
    #[must_use]
    pub fn toggle_expanded(&mut self, parent: CommentId) -> bool {
        if self.expanded.remove(&parent) {
            false
        } else {
            self.expanded.insert(parent);
            !self.replies.contains_key(&parent)
        }
    }

    pub fn is_expanded(&self, parent: CommentId) -> bool {
        self.expanded.contains(&parent)
    }

    pub fn replies_of(&self, parent: CommentId) -> Option<&[Comment]> {
        self.replies.get(&parent).map(|r| &r[..])
    }

    /// Look a comment up by id wherever it is held, root list or any
    /// loaded reply set.
    pub fn find_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        if let Some(c) = self.comments.iter_mut().find(|c| c.id == id) {
            return Some(c);
        }
        self.replies
            .values_mut()
            .flat_map(|r| r.iter_mut())
            .find(|c| c.id == id)
    }

    pub fn find(&self, id: CommentId) -> Option<&Comment> {
        if let Some(c) = self.comments.iter().find(|c| c.id == id) {
            return Some(c);
        }
        self.replies
            .values()
            .flat_map(|r| r.iter())
            .find(|c| c.id == id)
    }

    fn is_viewer(&self, user: &User) -> bool {
        self.viewer.as_ref().map(|v| v.id) == Some(user.id)
    }

    /// Merge one push event into the store. Never fails: an event that does
    /// not apply to anything currently held is ignored, so one bad event
    /// cannot stall the ones behind it.
    pub fn apply_event(&mut self, event: FeedEvent) -> Option<Reload> {
        match event {
            FeedEvent::Created(c) => self.apply_created(c),
            FeedEvent::ReplyCreated { parent_id, reply } => {
                self.apply_reply_created(parent_id, reply)
            }
            FeedEvent::Updated(c) => {
                self.apply_updated(c);
                None
            }
            FeedEvent::Deleted { id } => {
                self.apply_deleted(id);
                None
            }
            FeedEvent::LikeUpdated(u) => {
                self.apply_engagement(u, true);
                None
            }
            FeedEvent::DislikeUpdated(u) => {
                self.apply_engagement(u, false);
                None
            }
        }
    }

    fn apply_created(&mut self, c: Comment) -> Option<Reload> {
        if self.sort != SortBy::Newest || self.page != 1 {
            // The comment may or may not belong to the current page; only
            // the server can place it correctly.
            return Some(Reload::RootPage);
        }
        if self.comments.iter().any(|held| held.id == c.id) {
            // Echo of our own optimistic insert
            return None;
        }
        self.comments.insert(0, c);
        self.total += 1;
        None
    }

    fn apply_reply_created(&mut self, parent_id: CommentId, reply: Comment) -> Option<Reload> {
        let already_held = self
            .replies
            .get(&parent_id)
            .map_or(false, |r| r.iter().any(|held| held.id == reply.id));
        // reply_count is server-maintained; a reply we already counted,
        // optimistically or from an earlier delivery, is not counted again
        let counted = !self.seen_replies.insert(reply.id) || already_held;
        if !counted {
            if let Some(parent) = self.find_mut(parent_id) {
                parent.reply_count += 1;
            }
        }
        match self.replies.get_mut(&parent_id) {
            Some(r) => {
                if !already_held {
                    r.push(reply);
                }
                None
            }
            // Unfolded but the initial fetch has not landed yet: ask for a
            // (re)load instead of starting a partial set from one event
            None if self.expanded.contains(&parent_id) => Some(Reload::Replies(parent_id)),
            None => None,
        }
    }

    fn apply_updated(&mut self, c: Comment) {
        let Some(held) = self.find_mut(c.id) else {
            // Not on screen; it will be fetched fresh when paged to
            return;
        };
        // Last server write wins, but never let a stale broadcast clobber a
        // newer edit we already hold.
        if c.updated_at < held.updated_at {
            tracing::debug!(id = ?c.id, "ignoring stale update event");
            return;
        }
        held.content = c.content;
        held.updated_at = c.updated_at;
        held.reply_count = c.reply_count;
        // Engagement counts flow through the engagement events and the
        // viewer-relative flags are meaningless in a broadcast, so neither
        // is taken from here.
    }

    fn apply_deleted(&mut self, id: CommentId) {
        let before = self.comments.len();
        self.comments.retain(|c| c.id != id);
        if self.comments.len() != before {
            self.total = self.total.saturating_sub(1);
        }
        let mut removed_under = None;
        for (parent, replies) in self.replies.iter_mut() {
            let before = replies.len();
            replies.retain(|c| c.id != id);
            if replies.len() != before {
                removed_under = Some(*parent);
                break;
            }
        }
        if let Some(parent) = removed_under {
            if let Some(parent) = self.find_mut(parent) {
                parent.reply_count = parent.reply_count.saturating_sub(1);
            }
        }
        self.replies.remove(&id);
        self.expanded.remove(&id);
        self.seen_replies.remove(&id);
    }

    fn apply_engagement(&mut self, u: EngagementUpdate, is_like: bool) {
        let by_viewer = self.is_viewer(&u.action_by);
        let Some(held) = self.find_mut(u.comment_id) else {
            return;
        };
        // Counts are the server's authoritative tally, never derived
        // locally; re-applying the same event is therefore idempotent.
        held.like_count = u.like_count;
        held.dislike_count = u.dislike_count;
        if by_viewer {
            match (is_like, u.action) {
                (true, EngagementAction::Liked) => {
                    held.has_liked = true;
                    held.has_disliked = false;
                }
                (true, EngagementAction::Unliked) => held.has_liked = false,
                (false, EngagementAction::Disliked) => {
                    held.has_disliked = true;
                    held.has_liked = false;
                }
                (false, EngagementAction::Undisliked) => held.has_disliked = false,
                (_, action) => {
                    tracing::warn!(?action, is_like, "engagement action does not match channel")
                }
            }
        }
        // Someone else's action never touches the viewer's own flags
    }
}
