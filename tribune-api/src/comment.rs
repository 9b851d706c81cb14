use chrono::Utc;
use uuid::Uuid;

use crate::{Time, User, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

/// A comment as rendered for one viewer.
///
/// Identity fields (`id`, `author`, `parent_id`, `created_at`) never change
/// after creation. `has_liked`/`has_disliked` are relative to the viewer the
/// server rendered this comment for, and at most one of them is true.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub author: User,
    pub parent_id: Option<CommentId>,

    pub like_count: u64,
    pub dislike_count: u64,
    /// Count of direct children, maintained by the server
    pub reply_count: u64,
    pub has_liked: bool,
    pub has_disliked: bool,

    pub created_at: Time,
    pub updated_at: Time,
}

impl Comment {
    pub fn new_root(author: User, content: String) -> Comment {
        Comment::new(author, content, None)
    }

    pub fn new_reply(author: User, content: String, parent: CommentId) -> Comment {
        Comment::new(author, content, Some(parent))
    }

    fn new(author: User, content: String, parent_id: Option<CommentId>) -> Comment {
        let now = Utc::now();
        Comment {
            id: CommentId(Uuid::new_v4()),
            content,
            author,
            parent_id,
            like_count: 0,
            dislike_count: 0,
            reply_count: 0,
            has_liked: false,
            has_disliked: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EditComment {
    pub content: String,
}
