use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use chrono::Utc;
use http::StatusCode;
use tokio::sync::mpsc;

use tribune_client::{
    api::{
        self, AccessToken, ApiResponse, Comment, CommentId, CommentPage, EditComment,
        EngagementAction, EngagementUpdate, Error, FeedEvent, LoginRequest, NewComment,
        Pagination, RefreshRequest, RefreshResponse, RegisterRequest, Session, SortBy, User,
        UserId, Uuid,
    },
    Backend, HttpRequest, HttpResponse, TransportError,
};

// Fast hashes, these passwords only ever live inside one test process
const BCRYPT_TEST_COST: u32 = 4;

#[derive(Debug)]
struct DbUser {
    user: User,
    email: String,
    pass_hash: String,
    access_tokens: HashSet<AccessToken>,
    refresh_tokens: HashSet<api::RefreshToken>,
}

/// Server-side truth for one comment; the viewer-relative fields of the
/// wire `Comment` are rendered per request from the engagement sets.
#[derive(Debug)]
struct DbComment {
    id: CommentId,
    content: String,
    author: User,
    parent_id: Option<CommentId>,
    liked_by: HashSet<UserId>,
    disliked_by: HashSet<UserId>,
    created_at: api::Time,
    updated_at: api::Time,
    /// Insertion order, breaks timestamp ties when sorting
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<UserId, DbUser>,
    comments: BTreeMap<CommentId, DbComment>,
    next_seq: u64,
    feeds: Vec<mpsc::UnboundedSender<FeedEvent>>,
}

/// In-memory stand-in for the whole API: the complete HTTP surface routed
/// through the client's `Backend` trait, plus feed broadcast. Cloning
/// shares the underlying state, so a test can keep a handle while an
/// `ApiClient` owns another.
#[derive(Clone, Default)]
pub struct MockServer(Rc<RefCell<State>>);

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    /// Every broadcast from now on is also delivered to the returned
    /// receiver, like one more connected websocket client
    pub fn subscribe_feed(&self) -> mpsc::UnboundedReceiver<FeedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.borrow_mut().feeds.push(tx);
        rx
    }

    /// Test hook: make an access token invalid, as if it had expired
    pub fn expire_access_token(&self, token: AccessToken) {
        for user in self.0.borrow_mut().users.values_mut() {
            user.access_tokens.remove(&token);
        }
    }

    pub fn comment_count(&self) -> usize {
        self.0.borrow().comments.len()
    }

    fn broadcast(&self, event: FeedEvent) {
        self.0
            .borrow_mut()
            .feeds
            .retain(|f| f.send(event.clone()).is_ok());
    }

    fn dispatch(&self, req: &HttpRequest) -> Result<serde_json::Value, Error> {
        let (path, query) = match req.path.split_once('?') {
            Some((path, query)) => (path, query),
            None => (&req.path[..], ""),
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (req.method.as_str(), &segments[..]) {
            ("POST", ["auth", "register"]) => self.register(body(req)?),
            ("POST", ["auth", "login"]) => self.login(body(req)?),
            ("POST", ["auth", "refresh"]) => self.refresh(body(req)?),
            ("POST", ["auth", "logout"]) => self.logout(req.bearer),
            ("GET", ["comments"]) => self.list_comments(req.bearer, query),
            ("POST", ["comments"]) => self.create_comment(req.bearer, body(req)?),
            ("POST", ["comments", id, "reply"]) => {
                self.reply(req.bearer, comment_id(id)?, body(req)?)
            }
            ("GET", ["comments", id, "replies"]) => {
                self.list_replies(req.bearer, comment_id(id)?, query)
            }
            ("PUT", ["comments", id]) => {
                self.update_comment(req.bearer, comment_id(id)?, body(req)?)
            }
            ("DELETE", ["comments", id]) => self.delete_comment(req.bearer, comment_id(id)?),
            ("POST", ["comments", id, "like"]) => self.engage(req.bearer, comment_id(id)?, true),
            ("POST", ["comments", id, "dislike"]) => self.engage(req.bearer, comment_id(id)?, false),
            _ => Err(Error::Unknown(format!("no route for {} {path}", req.method))),
        }
    }

    // Auth handlers

    fn register(&self, req: RegisterRequest) -> Result<serde_json::Value, Error> {
        req.validate()?;
        let mut state = self.0.borrow_mut();
        if state.users.values().any(|u| u.user.username == req.username) {
            return Err(Error::NameAlreadyUsed(req.username));
        }
        if state.users.values().any(|u| u.email == req.email) {
            return Err(Error::EmailAlreadyUsed(req.email));
        }
        let user = User {
            id: UserId(Uuid::new_v4()),
            username: req.username,
        };
        let pass_hash = bcrypt::hash(&req.password, BCRYPT_TEST_COST)
            .map_err(|e| Error::Unknown(format!("hashing password: {e}")))?;
        let mut db_user = DbUser {
            user: user.clone(),
            email: req.email,
            pass_hash,
            access_tokens: HashSet::new(),
            refresh_tokens: HashSet::new(),
        };
        let session = new_session(&mut db_user);
        state.users.insert(user.id, db_user);
        Ok(envelope(session))
    }

    fn login(&self, req: LoginRequest) -> Result<serde_json::Value, Error> {
        let mut state = self.0.borrow_mut();
        let user = state
            .users
            .values_mut()
            .find(|u| u.email == req.email)
            .ok_or(Error::InvalidCredentials)?;
        if !bcrypt::verify(&req.password, &user.pass_hash).unwrap_or(false) {
            return Err(Error::InvalidCredentials);
        }
        Ok(envelope(new_session(user)))
    }

    fn refresh(&self, req: RefreshRequest) -> Result<serde_json::Value, Error> {
        let mut state = self.0.borrow_mut();
        let user = state
            .users
            .values_mut()
            .find(|u| u.refresh_tokens.contains(&req.refresh_token))
            .ok_or(Error::InvalidCredentials)?;
        let access_token = AccessToken(Uuid::new_v4());
        user.access_tokens.insert(access_token);
        Ok(envelope(RefreshResponse { access_token }))
    }

    fn logout(&self, bearer: Option<AccessToken>) -> Result<serde_json::Value, Error> {
        let mut state = self.0.borrow_mut();
        let token = bearer.ok_or(Error::InvalidCredentials)?;
        let user = state
            .users
            .values_mut()
            .find(|u| u.access_tokens.contains(&token))
            .ok_or(Error::InvalidCredentials)?;
        user.access_tokens.remove(&token);
        user.refresh_tokens.clear();
        Ok(empty_envelope())
    }

    fn authenticate(&self, bearer: Option<AccessToken>) -> Result<User, Error> {
        let token = bearer.ok_or(Error::InvalidCredentials)?;
        let state = self.0.borrow();
        state
            .users
            .values()
            .find(|u| u.access_tokens.contains(&token))
            .map(|u| u.user.clone())
            .ok_or(Error::InvalidCredentials)
    }

    // Comment handlers

    fn list_comments(
        &self,
        bearer: Option<AccessToken>,
        query: &str,
    ) -> Result<serde_json::Value, Error> {
        let viewer = self.authenticate(bearer)?;
        let (page, limit, sort) = paging(query);
        let state = self.0.borrow();
        let roots: Vec<&DbComment> = state
            .comments
            .values()
            .filter(|c| c.parent_id.is_none())
            .collect();
        Ok(envelope(render_page(&state, roots, &viewer, page, limit, sort)))
    }

    fn list_replies(
        &self,
        bearer: Option<AccessToken>,
        parent: CommentId,
        query: &str,
    ) -> Result<serde_json::Value, Error> {
        let viewer = self.authenticate(bearer)?;
        let (page, limit, sort) = paging(query);
        let state = self.0.borrow();
        if !state.comments.contains_key(&parent) {
            return Err(Error::NotFound(parent));
        }
        let replies: Vec<&DbComment> = state
            .comments
            .values()
            .filter(|c| c.parent_id == Some(parent))
            .collect();
        Ok(envelope(render_page(
            &state, replies, &viewer, page, limit, sort,
        )))
    }

    fn create_comment(
        &self,
        bearer: Option<AccessToken>,
        req: NewComment,
    ) -> Result<serde_json::Value, Error> {
        let author = self.authenticate(bearer)?;
        api::validate_content(&req.content)?;
        let comment = self.insert(author, req.content, None);
        self.broadcast(FeedEvent::Created(comment.clone()));
        Ok(envelope(comment))
    }

    fn reply(
        &self,
        bearer: Option<AccessToken>,
        parent: CommentId,
        req: NewComment,
    ) -> Result<serde_json::Value, Error> {
        let author = self.authenticate(bearer)?;
        api::validate_content(&req.content)?;
        {
            let state = self.0.borrow();
            let parent_comment = state.comments.get(&parent).ok_or(Error::NotFound(parent))?;
            // One level of threading only: replying to a reply hangs the
            // new comment under the same root
            if parent_comment.parent_id.is_some() {
                return Err(Error::PermissionDenied);
            }
        }
        let comment = self.insert(author, req.content, Some(parent));
        self.broadcast(FeedEvent::ReplyCreated {
            parent_id: parent,
            reply: comment.clone(),
        });
        Ok(envelope(comment))
    }

    fn insert(&self, author: User, content: String, parent_id: Option<CommentId>) -> Comment {
        let mut state = self.0.borrow_mut();
        let now = Utc::now();
        state.next_seq += 1;
        let db_comment = DbComment {
            id: CommentId(Uuid::new_v4()),
            content,
            author,
            parent_id,
            liked_by: HashSet::new(),
            disliked_by: HashSet::new(),
            created_at: now,
            updated_at: now,
            seq: state.next_seq,
        };
        let rendered = render(&state, &db_comment, None);
        state.comments.insert(db_comment.id, db_comment);
        rendered
    }

    fn update_comment(
        &self,
        bearer: Option<AccessToken>,
        id: CommentId,
        req: EditComment,
    ) -> Result<serde_json::Value, Error> {
        let viewer = self.authenticate(bearer)?;
        api::validate_content(&req.content)?;
        let rendered = {
            let mut state = self.0.borrow_mut();
            {
                let comment = state.comments.get_mut(&id).ok_or(Error::NotFound(id))?;
                if comment.author.id != viewer.id {
                    return Err(Error::PermissionDenied);
                }
                comment.content = req.content;
                comment.updated_at = Utc::now();
            }
            render(&state, &state.comments[&id], None)
        };
        self.broadcast(FeedEvent::Updated(rendered.clone()));
        Ok(envelope(rendered))
    }

    fn delete_comment(
        &self,
        bearer: Option<AccessToken>,
        id: CommentId,
    ) -> Result<serde_json::Value, Error> {
        let viewer = self.authenticate(bearer)?;
        {
            let mut state = self.0.borrow_mut();
            let comment = state.comments.get(&id).ok_or(Error::NotFound(id))?;
            if comment.author.id != viewer.id {
                return Err(Error::PermissionDenied);
            }
            // Replies go down with their root
            state
                .comments
                .retain(|_, c| c.id != id && c.parent_id != Some(id));
        }
        self.broadcast(FeedEvent::Deleted { id });
        Ok(empty_envelope())
    }

    fn engage(
        &self,
        bearer: Option<AccessToken>,
        id: CommentId,
        is_like: bool,
    ) -> Result<serde_json::Value, Error> {
        let viewer = self.authenticate(bearer)?;
        let update = {
            let mut state = self.0.borrow_mut();
            let comment = state.comments.get_mut(&id).ok_or(Error::NotFound(id))?;
            let action = if is_like {
                if comment.liked_by.remove(&viewer.id) {
                    EngagementAction::Unliked
                } else {
                    comment.liked_by.insert(viewer.id);
                    comment.disliked_by.remove(&viewer.id);
                    EngagementAction::Liked
                }
            } else {
                if comment.disliked_by.remove(&viewer.id) {
                    EngagementAction::Undisliked
                } else {
                    comment.disliked_by.insert(viewer.id);
                    comment.liked_by.remove(&viewer.id);
                    EngagementAction::Disliked
                }
            };
            EngagementUpdate {
                comment_id: id,
                like_count: comment.liked_by.len() as u64,
                dislike_count: comment.disliked_by.len() as u64,
                action,
                action_by: viewer,
            }
        };
        let event = if is_like {
            FeedEvent::LikeUpdated(update.clone())
        } else {
            FeedEvent::DislikeUpdated(update.clone())
        };
        self.broadcast(event);
        Ok(envelope(serde_json::json!({
            "like_count": update.like_count,
            "dislike_count": update.dislike_count,
            "has_liked": matches!(update.action, EngagementAction::Liked),
            "has_disliked": matches!(update.action, EngagementAction::Disliked),
        })))
    }
}

#[async_trait(?Send)]
impl Backend for MockServer {
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        Ok(match self.dispatch(&req) {
            Ok(body) => HttpResponse {
                status: StatusCode::OK,
                body: serde_json::to_vec(&body)
                    .map_err(|e| TransportError::Network(e.to_string()))?,
            },
            Err(e) => HttpResponse {
                status: e.status_code(),
                body: e.contents(),
            },
        })
    }
}

fn body<T: for<'de> serde::Deserialize<'de>>(req: &HttpRequest) -> Result<T, Error> {
    let body = req
        .body
        .clone()
        .ok_or_else(|| Error::Unknown(String::from("missing request body")))?;
    serde_json::from_value(body).map_err(|e| Error::Unknown(format!("malformed body: {e}")))
}

fn comment_id(segment: &str) -> Result<CommentId, Error> {
    segment
        .parse::<Uuid>()
        .map(CommentId)
        .map_err(|e| Error::Unknown(format!("malformed comment id: {e}")))
}

fn paging(query: &str) -> (u32, u32, SortBy) {
    let mut page = 1;
    let mut limit = 10;
    let mut sort = SortBy::default();
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("page", v)) => page = v.parse().unwrap_or(1),
            Some(("limit", v)) => limit = v.parse().unwrap_or(10),
            Some(("sortBy", v)) => {
                sort = serde_json::from_value(serde_json::Value::String(v.to_string()))
                    .unwrap_or_default()
            }
            _ => (),
        }
    }
    (page.max(1), limit.max(1), sort)
}

fn new_session(user: &mut DbUser) -> Session {
    let access_token = AccessToken(Uuid::new_v4());
    let refresh_token = api::RefreshToken(Uuid::new_v4());
    user.access_tokens.insert(access_token);
    user.refresh_tokens.insert(refresh_token);
    Session {
        user: user.user.clone(),
        access_token,
        refresh_token,
    }
}

/// Render a stored comment for one viewer; `None` renders the neutral view
/// used in broadcasts, where the viewer-relative flags are always false.
fn render(state: &State, c: &DbComment, viewer: Option<&UserId>) -> Comment {
    Comment {
        id: c.id,
        content: c.content.clone(),
        author: c.author.clone(),
        parent_id: c.parent_id,
        like_count: c.liked_by.len() as u64,
        dislike_count: c.disliked_by.len() as u64,
        reply_count: state
            .comments
            .values()
            .filter(|other| other.parent_id == Some(c.id))
            .count() as u64,
        has_liked: viewer.map_or(false, |v| c.liked_by.contains(v)),
        has_disliked: viewer.map_or(false, |v| c.disliked_by.contains(v)),
        created_at: c.created_at,
        updated_at: c.updated_at,
    }
}

fn render_page(
    state: &State,
    mut comments: Vec<&DbComment>,
    viewer: &User,
    page: u32,
    limit: u32,
    sort: SortBy,
) -> CommentPage {
    match sort {
        SortBy::Newest => comments.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq))),
        SortBy::Oldest => comments.sort_by(|a, b| (a.created_at, a.seq).cmp(&(b.created_at, b.seq))),
        SortBy::MostLiked => comments.sort_by(|a, b| {
            (b.liked_by.len(), b.created_at, b.seq).cmp(&(a.liked_by.len(), a.created_at, a.seq))
        }),
        SortBy::MostDisliked => comments.sort_by(|a, b| {
            (b.disliked_by.len(), b.created_at, b.seq).cmp(&(a.disliked_by.len(), a.created_at, a.seq))
        }),
    }
    let total = comments.len() as u64;
    let pages = (((total + limit as u64 - 1) / limit as u64) as u32).max(1);
    let start = ((page - 1) * limit) as usize;
    let comments = comments
        .into_iter()
        .skip(start)
        .take(limit as usize)
        .map(|c| render(state, c, Some(&viewer.id)))
        .collect();
    CommentPage {
        comments,
        pagination: Pagination {
            page,
            limit,
            total,
            pages,
        },
    }
}

fn envelope<T: serde::Serialize>(data: T) -> serde_json::Value {
    serde_json::to_value(ApiResponse::ok(data)).expect("serializing response envelope")
}

fn empty_envelope() -> serde_json::Value {
    serde_json::to_value(ApiResponse::<serde_json::Value> {
        success: true,
        data: None,
        message: None,
    })
    .expect("serializing response envelope")
}
