mod mutation;
pub use mutation::{EditSnapshot, EngagementSnapshot};

mod store;
pub use store::{CommentStore, Reload};

mod transport;
pub use transport::{
    ApiClient, ApiError, Backend, HttpRequest, HttpResponse, TransportError,
};

pub mod api {
    pub use tribune_api::*;
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::api::{Comment, CommentPage, Pagination, SortBy, User, UserId, Uuid};
    use crate::CommentStore;

    pub fn user(name: &str) -> User {
        User {
            id: UserId(Uuid::new_v4()),
            username: name.to_string(),
        }
    }

    pub fn page(comments: Vec<Comment>, page: u32, total: u64) -> CommentPage {
        CommentPage {
            comments,
            pagination: Pagination {
                page,
                limit: 10,
                total,
                pages: (((total + 9) / 10) as u32).max(1),
            },
        }
    }

    /// A store for `viewer`, on page 1 sorted by newest, holding `comments`
    pub fn store_with(viewer: &User, comments: Vec<Comment>) -> CommentStore {
        let total = comments.len() as u64;
        let mut store = CommentStore::new(Some(viewer.clone()), 10);
        assert_eq!(store.sort, SortBy::Newest);
        store.set_page(page(comments, 1, total));
        store
    }
}
