use chrono::Utc;

use crate::api::{Comment, CommentId, SortBy, Time};
use crate::CommentStore;

/// Exact pre-mutation state of a comment's engagement fields, restored
/// verbatim when the remote call fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EngagementSnapshot {
    pub like_count: u64,
    pub dislike_count: u64,
    pub has_liked: bool,
    pub has_disliked: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EditSnapshot {
    pub content: String,
    pub updated_at: Time,
}

/// Speculative local transitions, applied synchronously before the remote
/// call is issued. Each returns the snapshot to roll back to on failure.
/// The push-channel echo of a successful call re-applies the same state
/// on top of these, which `CommentStore::apply_event` makes a no-op.
impl CommentStore {
    pub fn snapshot_engagement(&self, id: CommentId) -> Option<EngagementSnapshot> {
        self.find(id).map(|c| EngagementSnapshot {
            like_count: c.like_count,
            dislike_count: c.dislike_count,
            has_liked: c.has_liked,
            has_disliked: c.has_disliked,
        })
    }

    /// Toggle semantics: liking an already-liked comment unlikes it, and
    /// liking a disliked comment clears the dislike in the same transition.
    pub fn apply_like(&mut self, id: CommentId) -> Option<EngagementSnapshot> {
        let snapshot = self.snapshot_engagement(id)?;
        let c = self.find_mut(id)?;
        if c.has_liked {
            c.has_liked = false;
            c.like_count = c.like_count.saturating_sub(1);
        } else {
            c.has_liked = true;
            c.like_count += 1;
            if c.has_disliked {
                c.has_disliked = false;
                c.dislike_count = c.dislike_count.saturating_sub(1);
            }
        }
        Some(snapshot)
    }

    pub fn apply_dislike(&mut self, id: CommentId) -> Option<EngagementSnapshot> {
        let snapshot = self.snapshot_engagement(id)?;
        let c = self.find_mut(id)?;
        if c.has_disliked {
            c.has_disliked = false;
            c.dislike_count = c.dislike_count.saturating_sub(1);
        } else {
            c.has_disliked = true;
            c.dislike_count += 1;
            if c.has_liked {
                c.has_liked = false;
                c.like_count = c.like_count.saturating_sub(1);
            }
        }
        Some(snapshot)
    }

    pub fn rollback_engagement(&mut self, id: CommentId, snapshot: EngagementSnapshot) {
        if let Some(c) = self.find_mut(id) {
            c.like_count = snapshot.like_count;
            c.dislike_count = snapshot.dislike_count;
            c.has_liked = snapshot.has_liked;
            c.has_disliked = snapshot.has_disliked;
        }
    }

    pub fn apply_edit(&mut self, id: CommentId, content: &str) -> Option<EditSnapshot> {
        let c = self.find_mut(id)?;
        let snapshot = EditSnapshot {
            content: std::mem::replace(&mut c.content, content.to_string()),
            updated_at: c.updated_at,
        };
        c.updated_at = Utc::now();
        Some(snapshot)
    }

    pub fn rollback_edit(&mut self, id: CommentId, snapshot: EditSnapshot) {
        if let Some(c) = self.find_mut(id) {
            c.content = snapshot.content;
            c.updated_at = snapshot.updated_at;
        }
    }

    /// Optimistic insert of a comment the viewer just posted. Only shown
    /// immediately on the view that would contain it; on any other
    /// page/sort the comment will appear when next paged to.
    pub fn insert_own_root(&mut self, c: Comment) {
        self.total += 1;
        if self.sort == SortBy::Newest && self.page == 1 {
            self.comments.insert(0, c);
        }
    }

    pub fn insert_own_reply(&mut self, parent_id: CommentId, reply: Comment) {
        if !self.seen_replies.insert(reply.id) {
            // The feed echo outran the posting call and has already
            // inserted and counted this reply
            return;
        }
        if let Some(parent) = self.find_mut(parent_id) {
            parent.reply_count += 1;
        }
        if let Some(replies) = self.replies.get_mut(&parent_id) {
            replies.push(reply);
        }
    }

    pub fn rollback_insert_root(&mut self, id: CommentId) {
        self.comments.retain(|c| c.id != id);
        self.total = self.total.saturating_sub(1);
    }

    pub fn rollback_insert_reply(&mut self, parent_id: CommentId, id: CommentId) {
        self.seen_replies.remove(&id);
        if let Some(replies) = self.replies.get_mut(&parent_id) {
            replies.retain(|c| c.id != id);
        }
        if let Some(parent) = self.find_mut(parent_id) {
            parent.reply_count = parent.reply_count.saturating_sub(1);
        }
    }

    /// Local half of a confirmed delete. Same transition as the `Deleted`
    /// echo, so whichever of the two lands first wins and the other is a
    /// no-op.
    pub fn remove_comment(&mut self, id: CommentId) {
        let _ = self.apply_event(crate::api::FeedEvent::Deleted { id });
    }
}

#[cfg(test)]
mod tests {
    use crate::api::{Comment, FeedEvent};
    use crate::testutil::{store_with, user};

    #[test]
    fn flags_stay_mutually_exclusive_under_any_toggle_sequence() {
        let viewer = user("ada");
        let comment = Comment::new_root(user("brin"), String::from("hello"));
        let id = comment.id;
        let mut store = store_with(&viewer, vec![comment]);

        // An adversarial click sequence; the invariant must hold after
        // every single transition
        for (i, like) in [true, true, false, false, true, false, true, true, false]
            .into_iter()
            .enumerate()
        {
            if like {
                store.apply_like(id).unwrap();
            } else {
                store.apply_dislike(id).unwrap();
            }
            let c = store.find(id).unwrap();
            assert!(
                !(c.has_liked && c.has_disliked),
                "both flags set after step {i}"
            );
        }
    }

    #[test]
    fn like_then_rollback_restores_the_exact_snapshot() {
        let viewer = user("ada");
        let mut comment = Comment::new_root(user("brin"), String::from("hello"));
        comment.like_count = 7;
        comment.dislike_count = 2;
        comment.has_disliked = true;
        let id = comment.id;
        let mut store = store_with(&viewer, vec![comment]);

        let snapshot = store.apply_like(id).unwrap();
        let c = store.find(id).unwrap();
        assert_eq!(
            (c.like_count, c.dislike_count, c.has_liked, c.has_disliked),
            (8, 1, true, false)
        );

        // Remote call failed: back to exactly the pre-click values
        store.rollback_engagement(id, snapshot);
        let c = store.find(id).unwrap();
        assert_eq!(
            (c.like_count, c.dislike_count, c.has_liked, c.has_disliked),
            (7, 2, false, true)
        );
    }

    #[test]
    fn second_like_is_an_unlike() {
        let viewer = user("ada");
        let comment = Comment::new_root(user("brin"), String::from("hello"));
        let id = comment.id;
        let mut store = store_with(&viewer, vec![comment]);

        store.apply_like(id).unwrap();
        store.apply_like(id).unwrap();
        let c = store.find(id).unwrap();
        assert_eq!((c.like_count, c.has_liked), (0, false));
    }

    #[test]
    fn edit_and_rollback() {
        let viewer = user("ada");
        let comment = Comment::new_root(viewer.clone(), String::from("first draft"));
        let id = comment.id;
        let created_at = comment.updated_at;
        let mut store = store_with(&viewer, vec![comment]);

        let snapshot = store.apply_edit(id, "second draft").unwrap();
        let c = store.find(id).unwrap();
        assert_eq!(c.content, "second draft");
        assert!(c.updated_at >= created_at);

        store.rollback_edit(id, snapshot);
        let c = store.find(id).unwrap();
        assert_eq!(c.content, "first draft");
        assert_eq!(c.updated_at, created_at);
    }

    #[test]
    fn own_root_insert_and_rollback() {
        let viewer = user("ada");
        let mut store = store_with(&viewer, vec![]);

        let comment = Comment::new_root(viewer.clone(), String::from("mine"));
        store.insert_own_root(comment.clone());
        assert_eq!(store.comments.len(), 1);
        assert_eq!(store.total, 1);

        store.rollback_insert_root(comment.id);
        assert!(store.comments.is_empty());
        assert_eq!(store.total, 0);
    }

    #[test]
    fn own_reply_insert_and_rollback() {
        let viewer = user("ada");
        let parent = Comment::new_root(user("brin"), String::from("parent"));
        let mut store = store_with(&viewer, vec![parent.clone()]);
        store.set_replies(parent.id, vec![]);

        let reply = Comment::new_reply(viewer.clone(), String::from("mine"), parent.id);
        store.insert_own_reply(parent.id, reply.clone());
        assert_eq!(store.find(parent.id).unwrap().reply_count, 1);
        assert_eq!(store.replies_of(parent.id).unwrap().len(), 1);

        store.rollback_insert_reply(parent.id, reply.id);
        assert_eq!(store.find(parent.id).unwrap().reply_count, 0);
        assert!(store.replies_of(parent.id).unwrap().is_empty());
    }

    #[test]
    fn reply_echo_landing_first_preempts_the_confirmed_insert() {
        let viewer = user("ada");
        let parent = Comment::new_root(user("brin"), String::from("parent"));
        let mut store = store_with(&viewer, vec![parent.clone()]);
        store.set_replies(parent.id, vec![]);

        // The feed delivers the echo before the posting call returns
        let reply = Comment::new_reply(viewer.clone(), String::from("mine"), parent.id);
        store.apply_event(FeedEvent::ReplyCreated {
            parent_id: parent.id,
            reply: reply.clone(),
        });
        store.insert_own_reply(parent.id, reply);
        assert_eq!(store.find(parent.id).unwrap().reply_count, 1);
        assert_eq!(store.replies_of(parent.id).unwrap().len(), 1);
    }

    #[test]
    fn mutating_an_unknown_comment_does_nothing() {
        let viewer = user("ada");
        let mut store = store_with(&viewer, vec![]);
        let ghost = Comment::new_root(user("brin"), String::from("gone"));

        assert_eq!(store.apply_like(ghost.id), None);
        assert_eq!(store.apply_dislike(ghost.id), None);
        assert_eq!(store.apply_edit(ghost.id, "edit"), None);
        assert_eq!(store.snapshot_engagement(ghost.id), None);
    }
}
