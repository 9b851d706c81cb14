use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use gloo_storage::{LocalStorage, Storage};
use tribune_client::{
    api::{
        Comment, CommentId, CommentPage, FeedEvent, LoginRequest, RegisterRequest, Session, SortBy,
    },
    ApiClient, ApiError, CommentStore, EditSnapshot, EngagementSnapshot, Reload,
};
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::{
    api::{self, ReqwestBackend},
    ui,
};

const KEY_SESSION: &str = "session";
const API_BASE: &str = "/api";
const PAGE_SIZE: u32 = 10;
const REPLY_PAGE_SIZE: u32 = 50;

pub enum AppMsg {
    SwitchToLogin,
    SwitchToRegister,
    SubmitLogin(LoginRequest),
    SubmitRegister(RegisterRequest),
    LoggedIn(Session),
    AuthFailed(String),
    Logout,
    SessionEnded,

    FeedConnected,
    FeedDisconnected,
    FeedEvent(FeedEvent),

    LoadPage(u32),
    PageLoaded(CommentPage),
    SetSort(SortBy),
    ToggleReplies(CommentId),
    RepliesLoaded(CommentId, CommentPage),

    SubmitRoot(String),
    RootPosted(Comment),
    SubmitReply(CommentId, String),
    ReplyPosted(CommentId, Comment),
    SubmitEdit(CommentId, String),
    CommentUpdated(Comment),
    EditRolledBack(CommentId, EditSnapshot, String),
    Delete(CommentId),
    CommentDeleted(CommentId),
    Like(CommentId),
    Dislike(CommentId),
    EngagementRolledBack(CommentId, EngagementSnapshot, String),

    RequestFailed(String),
    DismissError,
    MutationDone,
}

#[derive(Clone, PartialEq)]
pub enum ConnState {
    Disconnected,
    /// The feed socket is up but the page has not been reloaded yet;
    /// incoming events are buffered until it is, so they are never applied
    /// to pre-disconnect state.
    FeedConnected(VecDeque<FeedEvent>),
    Connected,
}

enum View {
    Login { error: Option<String> },
    Register { error: Option<String> },
    Comments,
}

pub struct App {
    client: Rc<ApiClient<ReqwestBackend>>,
    store: CommentStore,
    view: View,
    connection_state: ConnState,
    feed_canceller: Option<oneshot::Receiver<()>>,
    last_error: Option<String>,
}

impl App {
    /// Switch to the logged-in view: remember the session, key the store to
    /// the viewer, start the event feed, and load the first page
    fn enter(&mut self, ctx: &Context<Self>, session: Session) {
        self.client.set_session(session.clone());
        self.store = CommentStore::new(Some(session.user), PAGE_SIZE);
        self.view = View::Comments;
        let (cancel, canceller) = oneshot::channel();
        spawn_local(api::start_event_feed(
            self.client.clone(),
            ctx.link().clone(),
            cancel,
        ));
        self.feed_canceller = Some(canceller);
        self.load_page(ctx, 1);
    }

    fn leave(&mut self, error: Option<String>) {
        // Dropping the canceller tears the feed loop down
        self.feed_canceller.take();
        LocalStorage::delete(KEY_SESSION);
        self.store = CommentStore::new(None, PAGE_SIZE);
        self.connection_state = ConnState::Disconnected;
        self.last_error = None;
        self.view = View::Login { error };
    }

    fn load_page(&self, ctx: &Context<Self>, page: u32) {
        let client = self.client.clone();
        let limit = self.store.limit;
        let sort = self.store.sort;
        ctx.link().send_future(async move {
            match client.list_comments(page, limit, sort).await {
                Ok(page) => AppMsg::PageLoaded(page),
                Err(e) => fail(e),
            }
        });
    }

    fn load_replies(&self, ctx: &Context<Self>, parent: CommentId) {
        let client = self.client.clone();
        ctx.link().send_future(async move {
            match client
                .list_replies(parent, 1, REPLY_PAGE_SIZE, SortBy::Oldest)
                .await
            {
                Ok(page) => AppMsg::RepliesLoaded(parent, page),
                Err(e) => fail(e),
            }
        });
    }

    fn apply_feed_event(&mut self, ctx: &Context<Self>, event: FeedEvent) {
        match self.store.apply_event(event) {
            Some(Reload::RootPage) => self.load_page(ctx, self.store.page),
            Some(Reload::Replies(parent)) => self.load_replies(ctx, parent),
            None => (),
        }
    }

    fn view_auth(&self, ctx: &Context<Self>) -> Html {
        match &self.view {
            View::Login { error } => html! {
                <div class="container">
                    <ui::Login
                        error={ error.clone() }
                        on_submit={ ctx.link().callback(AppMsg::SubmitLogin) }
                        on_register={ ctx.link().callback(|()| AppMsg::SwitchToRegister) }
                    />
                </div>
            },
            View::Register { error } => html! {
                <div class="container">
                    <ui::Register
                        error={ error.clone() }
                        on_submit={ ctx.link().callback(AppMsg::SubmitRegister) }
                        on_login={ ctx.link().callback(|()| AppMsg::SwitchToLogin) }
                    />
                </div>
            },
            View::Comments => unreachable!("view_auth called on the comments view"),
        }
    }

    fn view_comments(&self, ctx: &Context<Self>) -> Html {
        let s = &self.store;
        let viewer_name = s
            .viewer
            .as_ref()
            .map(|u| u.username.clone())
            .unwrap_or_default();
        let error_banner = self.last_error.as_ref().map(|e| {
            html! {
                <div class="alert alert-warning d-flex justify-content-between" role="alert">
                    <div>{ e }</div>
                    <button
                        type="button"
                        class="btn-close"
                        aria-label="Dismiss"
                        onclick={ ctx.link().callback(|_| AppMsg::DismissError) }
                    ></button>
                </div>
            }
        });
        let on_sort_change = ctx.link().callback(|e: web_sys::Event| {
            let select: web_sys::HtmlSelectElement = e.target_unchecked_into();
            AppMsg::SetSort(sort_from_query(&select.value()))
        });
        let (page, pages) = (s.page, s.pages);
        html! {
            <>
                <ui::OfflineBanner connection_state={ self.connection_state.clone() } />
                <div class="container py-4">
                    <div class="d-flex justify-content-between align-items-center mb-4">
                        <h1>{ "Comments" }</h1>
                        <div>
                            <span class="me-2">{ viewer_name }</span>
                            <button
                                type="button"
                                class="btn btn-outline-secondary"
                                onclick={ ctx.link().callback(|_| AppMsg::Logout) }
                            >
                                { "Log out" }
                            </button>
                        </div>
                    </div>
                    { for error_banner }
                    <ui::CommentForm
                        placeholder="Write a comment..."
                        button="Post"
                        on_submit={ ctx.link().callback(AppMsg::SubmitRoot) }
                    />
                    <div class="d-flex justify-content-between align-items-center my-3">
                        <div>{ format!("{} comments", s.total) }</div>
                        <select class="form-select w-auto" onchange={ on_sort_change }>
                            { for [SortBy::Newest, SortBy::Oldest, SortBy::MostLiked, SortBy::MostDisliked]
                                .into_iter()
                                .map(|sort| html! {
                                    <option value={ sort.as_query() } selected={ s.sort == sort }>
                                        { sort_label(sort) }
                                    </option>
                                }) }
                        </select>
                    </div>
                    <ui::CommentList
                        comments={ s.comments.clone() }
                        viewer={ s.viewer.as_ref().map(|u| u.id) }
                        replies={ s.replies.clone() }
                        expanded={ s.expanded.clone() }
                        on_like={ ctx.link().callback(AppMsg::Like) }
                        on_dislike={ ctx.link().callback(AppMsg::Dislike) }
                        on_toggle_replies={ ctx.link().callback(AppMsg::ToggleReplies) }
                        on_reply={ ctx.link().callback(|(id, text)| AppMsg::SubmitReply(id, text)) }
                        on_edit={ ctx.link().callback(|(id, text)| AppMsg::SubmitEdit(id, text)) }
                        on_delete={ ctx.link().callback(AppMsg::Delete) }
                    />
                    <nav class="d-flex justify-content-center align-items-center mt-3">
                        <button
                            type="button"
                            class="btn btn-outline-secondary"
                            disabled={ page <= 1 }
                            onclick={ ctx.link().callback(move |_| AppMsg::LoadPage(page - 1)) }
                        >
                            { "Previous" }
                        </button>
                        <span class="mx-3">{ format!("page {page} of {pages}") }</span>
                        <button
                            type="button"
                            class="btn btn-outline-secondary"
                            disabled={ page >= pages }
                            onclick={ ctx.link().callback(move |_| AppMsg::LoadPage(page + 1)) }
                        >
                            { "Next" }
                        </button>
                    </nav>
                </div>
            </>
        }
    }
}

impl Component for App {
    type Message = AppMsg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let client = Rc::new(ApiClient::new(ReqwestBackend::new(String::from(API_BASE))));
        {
            let link = ctx.link().clone();
            client.on_session_expired(move || link.send_message(AppMsg::SessionEnded));
        }
        client.on_session_refreshed(|session| {
            if let Err(e) = LocalStorage::set(KEY_SESSION, &session) {
                tracing::error!(error = %e, "failed persisting refreshed session");
            }
        });

        let mut app = App {
            client,
            store: CommentStore::new(None, PAGE_SIZE),
            view: View::Login { error: None },
            connection_state: ConnState::Disconnected,
            feed_canceller: None,
            last_error: None,
        };
        if let Ok(session) = LocalStorage::get::<Session>(KEY_SESSION) {
            app.enter(ctx, session);
        }
        app
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            AppMsg::SwitchToLogin => self.view = View::Login { error: None },
            AppMsg::SwitchToRegister => self.view = View::Register { error: None },
            AppMsg::SubmitLogin(req) => {
                let client = self.client.clone();
                ctx.link().send_future(async move {
                    match client.login(req).await {
                        Ok(session) => AppMsg::LoggedIn(session),
                        Err(e) => AppMsg::AuthFailed(e.to_string()),
                    }
                });
            }
            AppMsg::SubmitRegister(req) => {
                let client = self.client.clone();
                ctx.link().send_future(async move {
                    match client.register(req).await {
                        Ok(session) => AppMsg::LoggedIn(session),
                        Err(e) => AppMsg::AuthFailed(e.to_string()),
                    }
                });
            }
            AppMsg::LoggedIn(session) => {
                if let Err(e) = LocalStorage::set(KEY_SESSION, &session) {
                    tracing::error!(error = %e, "failed persisting session");
                }
                self.enter(ctx, session);
            }
            AppMsg::AuthFailed(message) => match &mut self.view {
                View::Login { error } | View::Register { error } => *error = Some(message),
                View::Comments => (),
            },
            AppMsg::Logout => {
                let client = self.client.clone();
                spawn_local(async move { client.logout().await });
                self.leave(None);
            }
            AppMsg::SessionEnded => {
                self.leave(Some(String::from(
                    "Your session has expired, please log in again.",
                )));
            }

            AppMsg::FeedConnected => {
                self.connection_state = ConnState::FeedConnected(VecDeque::new());
                // Counts may have drifted while offline, refetch everything
                // currently displayed
                self.load_page(ctx, self.store.page);
                for parent in self.store.replies.keys().copied().collect::<Vec<_>>() {
                    self.load_replies(ctx, parent);
                }
            }
            AppMsg::FeedDisconnected => self.connection_state = ConnState::Disconnected,
            AppMsg::FeedEvent(event) => match &mut self.connection_state {
                ConnState::FeedConnected(buffered) => buffered.push_back(event),
                _ => self.apply_feed_event(ctx, event),
            },

            AppMsg::LoadPage(page) => {
                if page >= 1 && page <= self.store.pages && self.store.set_page_number(page) {
                    self.load_page(ctx, page);
                }
            }
            AppMsg::PageLoaded(page) => {
                self.store.set_page(page);
                match std::mem::replace(&mut self.connection_state, ConnState::Connected) {
                    ConnState::FeedConnected(buffered) => {
                        for event in buffered {
                            self.apply_feed_event(ctx, event);
                        }
                    }
                    ConnState::Connected => (),
                    // A plain page load does not make the feed connected
                    ConnState::Disconnected => {
                        self.connection_state = ConnState::Disconnected;
                    }
                }
            }
            AppMsg::SetSort(sort) => {
                if self.store.set_sort(sort) {
                    self.load_page(ctx, 1);
                }
            }
            AppMsg::ToggleReplies(parent) => {
                if self.store.toggle_expanded(parent) {
                    self.load_replies(ctx, parent);
                }
            }
            AppMsg::RepliesLoaded(parent, page) => {
                self.store.set_replies(parent, page.comments);
            }

            AppMsg::SubmitRoot(content) => {
                let client = self.client.clone();
                ctx.link().send_future(async move {
                    match client.create_comment(content).await {
                        Ok(comment) => AppMsg::RootPosted(comment),
                        Err(e) => fail(e),
                    }
                });
            }
            AppMsg::RootPosted(comment) => self.store.insert_own_root(comment),
            AppMsg::SubmitReply(parent, content) => {
                let client = self.client.clone();
                ctx.link().send_future(async move {
                    match client.reply_to_comment(parent, content).await {
                        Ok(reply) => AppMsg::ReplyPosted(parent, reply),
                        Err(e) => fail(e),
                    }
                });
            }
            AppMsg::ReplyPosted(parent, reply) => self.store.insert_own_reply(parent, reply),
            AppMsg::SubmitEdit(id, content) => {
                if let Some(snapshot) = self.store.apply_edit(id, &content) {
                    let client = self.client.clone();
                    ctx.link().send_future(async move {
                        match client.update_comment(id, content).await {
                            Ok(comment) => AppMsg::CommentUpdated(comment),
                            Err(e) => AppMsg::EditRolledBack(id, snapshot, e.to_string()),
                        }
                    });
                }
            }
            AppMsg::CommentUpdated(comment) => {
                self.apply_feed_event(ctx, FeedEvent::Updated(comment));
            }
            AppMsg::EditRolledBack(id, snapshot, error) => {
                tracing::warn!(error = %error, "edit rejected, restoring previous content");
                self.store.rollback_edit(id, snapshot);
                self.last_error = Some(error);
            }
            AppMsg::Delete(id) => {
                let client = self.client.clone();
                ctx.link().send_future(async move {
                    match client.delete_comment(id).await {
                        Ok(()) => AppMsg::CommentDeleted(id),
                        Err(e) => fail(e),
                    }
                });
            }
            AppMsg::CommentDeleted(id) => self.store.remove_comment(id),
            AppMsg::Like(id) => {
                if let Some(snapshot) = self.store.apply_like(id) {
                    let client = self.client.clone();
                    ctx.link().send_future(async move {
                        match client.like_comment(id).await {
                            Ok(()) => AppMsg::MutationDone,
                            Err(e) => AppMsg::EngagementRolledBack(id, snapshot, e.to_string()),
                        }
                    });
                }
            }
            AppMsg::Dislike(id) => {
                if let Some(snapshot) = self.store.apply_dislike(id) {
                    let client = self.client.clone();
                    ctx.link().send_future(async move {
                        match client.dislike_comment(id).await {
                            Ok(()) => AppMsg::MutationDone,
                            Err(e) => AppMsg::EngagementRolledBack(id, snapshot, e.to_string()),
                        }
                    });
                }
            }
            AppMsg::EngagementRolledBack(id, snapshot, error) => {
                tracing::warn!(error = %error, "engagement rejected, restoring counts");
                self.store.rollback_engagement(id, snapshot);
                self.last_error = Some(error);
            }

            AppMsg::RequestFailed(error) => {
                tracing::error!(error = %error, "request failed");
                self.last_error = Some(error);
            }
            AppMsg::DismissError => self.last_error = None,
            AppMsg::MutationDone => return false,
        }
        true
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        match self.view {
            View::Login { .. } | View::Register { .. } => self.view_auth(ctx),
            View::Comments => self.view_comments(ctx),
        }
    }
}

/// The session hook already handles expiry; everything else lands in the
/// error banner
fn fail(e: ApiError) -> AppMsg {
    match e {
        ApiError::SessionExpired => AppMsg::MutationDone,
        e => AppMsg::RequestFailed(e.to_string()),
    }
}

fn sort_from_query(v: &str) -> SortBy {
    match v {
        "oldest" => SortBy::Oldest,
        "most_liked" => SortBy::MostLiked,
        "most_disliked" => SortBy::MostDisliked,
        _ => SortBy::Newest,
    }
}

fn sort_label(sort: SortBy) -> &'static str {
    match sort {
        SortBy::Newest => "Newest first",
        SortBy::Oldest => "Oldest first",
        SortBy::MostLiked => "Most liked",
        SortBy::MostDisliked => "Most disliked",
    }
}
