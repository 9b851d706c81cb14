use std::cell::RefCell;

use async_trait::async_trait;
use futures::channel::oneshot;
use http::{Method, StatusCode};

use crate::api::{
    self, AccessToken, ApiResponse, Comment, CommentId, CommentPage, EditComment, LoginRequest,
    NewComment, RefreshRequest, RefreshResponse, RegisterRequest, Session, SortBy,
};

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<AccessToken>,
    pub body: Option<serde_json::Value>,
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The backend's fixed timeout elapsed; treated like any other failure
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Api(#[from] api::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Credential refresh failed, or a replayed call got a second 401.
    /// The session has already been cleared when this is returned.
    #[error("session has ended, please log in again")]
    SessionExpired,

    #[error("could not decode server response: {0}")]
    BadResponse(String),
}

/// The request/response channel the client runs over. The web frontend
/// backs this with reqwest; tests back it with the in-memory mock server.
#[async_trait(?Send)]
pub trait Backend {
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError>;
}

struct ClientState {
    session: Option<Session>,
    /// True while a refresh call is in flight; concurrent 401 handlers
    /// queue behind it instead of issuing their own refresh.
    refreshing: bool,
    waiters: Vec<oneshot::Sender<Result<AccessToken, ApiError>>>,
}

/// Bearer-authenticated API client with transparent refresh-on-401.
///
/// Single-threaded by design: the store and this client are only ever
/// touched from the UI thread, so interior mutability via `RefCell` is the
/// whole synchronization story. The only suspension points are the
/// backend's `execute` and awaiting a shared in-flight refresh.
pub struct ApiClient<B> {
    backend: B,
    state: RefCell<ClientState>,
    on_session_expired: RefCell<Option<Box<dyn Fn()>>>,
    on_session_refreshed: RefCell<Option<Box<dyn Fn(Session)>>>,
}

impl<B: Backend> ApiClient<B> {
    pub fn new(backend: B) -> ApiClient<B> {
        ApiClient {
            backend,
            state: RefCell::new(ClientState {
                session: None,
                refreshing: false,
                waiters: Vec::new(),
            }),
            on_session_expired: RefCell::new(None),
            on_session_refreshed: RefCell::new(None),
        }
    }

    pub fn set_session(&self, session: Session) {
        self.state.borrow_mut().session = Some(session);
    }

    pub fn clear_session(&self) {
        self.state.borrow_mut().session = None;
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    /// Called once the session is terminally over (refresh failure or a
    /// second 401 on replay), after credentials have been cleared. The web
    /// layer uses it to drop persisted storage and show the login screen.
    pub fn on_session_expired(&self, hook: impl Fn() + 'static) {
        *self.on_session_expired.borrow_mut() = Some(Box::new(hook));
    }

    /// Called with the updated session after a successful refresh, so the
    /// persisted copy of the credentials can be kept current
    pub fn on_session_refreshed(&self, hook: impl Fn(Session) + 'static) {
        *self.on_session_refreshed.borrow_mut() = Some(Box::new(hook));
    }

    fn access_token(&self) -> Option<AccessToken> {
        self.state.borrow().session.as_ref().map(|s| s.access_token)
    }

    fn end_session(&self) {
        self.clear_session();
        if let Some(hook) = &*self.on_session_expired.borrow() {
            hook();
        }
    }

    /// One API call: attach the current access token, execute, and on a 401
    /// refresh the token and replay exactly once. A 401 without a session is
    /// surfaced as-is, and so is a 401 from the auth endpoints themselves:
    /// there it is the call's own verdict (bad login, revoked logout), not a
    /// sign that the access token went stale.
    async fn raw_request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse, ApiError> {
        let resp = self
            .backend
            .execute(HttpRequest {
                method: method.clone(),
                path: path.to_string(),
                bearer: self.access_token(),
                body: body.clone(),
            })
            .await?;
        if resp.status != StatusCode::UNAUTHORIZED
            || path.starts_with("/auth/")
            || self.session().is_none()
        {
            return Ok(resp);
        }
        let token = self.refreshed_token().await?;
        let resp = self
            .backend
            .execute(HttpRequest {
                method,
                path: path.to_string(),
                bearer: Some(token),
                body,
            })
            .await?;
        if resp.status == StatusCode::UNAUTHORIZED {
            // Freshly refreshed and still rejected: terminal
            self.end_session();
            return Err(ApiError::SessionExpired);
        }
        Ok(resp)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        decode(self.raw_request(method, path, body).await?)
    }

    /// For endpoints whose success envelope carries no data
    async fn request_empty(&self, method: Method, path: &str) -> Result<(), ApiError> {
        let resp = self.raw_request(method, path, None).await?;
        if resp.status.is_success() {
            let env: ApiResponse<serde_json::Value> = serde_json::from_slice(&resp.body)
                .map_err(|e| ApiError::BadResponse(e.to_string()))?;
            match env.success {
                true => Ok(()),
                false => Err(ApiError::Api(api::Error::Unknown(
                    env.message.unwrap_or_default(),
                ))),
            }
        } else {
            Err(decode_failure(resp))
        }
    }

    /// Obtain a fresh access token, coalescing concurrent attempts into a
    /// single refresh call whose outcome is shared by every waiter.
    async fn refreshed_token(&self) -> Result<AccessToken, ApiError> {
        let refresh_token = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                // The guard must not be held across the await below
                drop(guard);
                return rx.await.unwrap_or(Err(ApiError::SessionExpired));
            }
            match &state.session {
                None => return Err(ApiError::SessionExpired),
                Some(session) => {
                    state.refreshing = true;
                    session.refresh_token
                }
            }
        };

        // The refresh call authenticates with the persisted refresh token,
        // not the expired access token.
        let resp = self
            .backend
            .execute(HttpRequest {
                method: Method::POST,
                path: String::from("/auth/refresh"),
                bearer: None,
                body: serde_json::to_value(RefreshRequest { refresh_token }).ok(),
            })
            .await;
        let result = match resp {
            Ok(resp) => decode::<RefreshResponse>(resp).map(|r| r.access_token),
            Err(e) => Err(e.into()),
        };

        let (waiters, refreshed) = {
            let mut state = self.state.borrow_mut();
            state.refreshing = false;
            let refreshed = match &result {
                Ok(token) => {
                    if let Some(session) = state.session.as_mut() {
                        session.access_token = *token;
                    }
                    state.session.clone()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "credential refresh failed, ending session");
                    None
                }
            };
            (std::mem::take(&mut state.waiters), refreshed)
        };
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        match refreshed {
            Some(session) => {
                if let Some(hook) = &*self.on_session_refreshed.borrow() {
                    hook(session);
                }
            }
            None => {
                if result.is_err() {
                    self.end_session();
                }
            }
        }
        result
    }

    // Auth surface

    pub async fn register(&self, req: RegisterRequest) -> Result<Session, ApiError> {
        req.validate()?;
        self.request(Method::POST, "/auth/register", to_body(&req))
            .await
    }

    pub async fn login(&self, req: LoginRequest) -> Result<Session, ApiError> {
        self.request(Method::POST, "/auth/login", to_body(&req))
            .await
    }

    /// Best-effort: a failed logout still clears the local session
    pub async fn logout(&self) {
        if let Err(e) = self.request_empty(Method::POST, "/auth/logout").await {
            tracing::error!(error = %e, "failed to log out on the server");
        }
        self.clear_session();
    }

    // Comment surface

    pub async fn list_comments(
        &self,
        page: u32,
        limit: u32,
        sort: SortBy,
    ) -> Result<CommentPage, ApiError> {
        self.request(
            Method::GET,
            &format!("/comments?page={page}&limit={limit}&sortBy={}", sort.as_query()),
            None,
        )
        .await
    }

    pub async fn list_replies(
        &self,
        parent: CommentId,
        page: u32,
        limit: u32,
        sort: SortBy,
    ) -> Result<CommentPage, ApiError> {
        self.request(
            Method::GET,
            &format!(
                "/comments/{}/replies?page={page}&limit={limit}&sortBy={}",
                parent.0,
                sort.as_query()
            ),
            None,
        )
        .await
    }

    pub async fn create_comment(&self, content: String) -> Result<Comment, ApiError> {
        api::validate_content(&content)?;
        self.request(Method::POST, "/comments", to_body(&NewComment { content }))
            .await
    }

    pub async fn reply_to_comment(
        &self,
        parent: CommentId,
        content: String,
    ) -> Result<Comment, ApiError> {
        api::validate_content(&content)?;
        self.request(
            Method::POST,
            &format!("/comments/{}/reply", parent.0),
            to_body(&NewComment { content }),
        )
        .await
    }

    pub async fn update_comment(
        &self,
        id: CommentId,
        content: String,
    ) -> Result<Comment, ApiError> {
        api::validate_content(&content)?;
        self.request(
            Method::PUT,
            &format!("/comments/{}", id.0),
            to_body(&EditComment { content }),
        )
        .await
    }

    pub async fn delete_comment(&self, id: CommentId) -> Result<(), ApiError> {
        self.request_empty(Method::DELETE, &format!("/comments/{}", id.0))
            .await
    }

    pub async fn like_comment(&self, id: CommentId) -> Result<(), ApiError> {
        self.request_empty(Method::POST, &format!("/comments/{}/like", id.0))
            .await
    }

    pub async fn dislike_comment(&self, id: CommentId) -> Result<(), ApiError> {
        self.request_empty(Method::POST, &format!("/comments/{}/dislike", id.0))
            .await
    }
}

fn to_body<T: serde::Serialize>(body: &T) -> Option<serde_json::Value> {
    serde_json::to_value(body).ok()
}

fn decode<T>(resp: HttpResponse) -> Result<T, ApiError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    if resp.status.is_success() {
        serde_json::from_slice::<ApiResponse<T>>(&resp.body)
            .map_err(|e| ApiError::BadResponse(e.to_string()))?
            .into_result()
            .map_err(ApiError::Api)
    } else {
        Err(decode_failure(resp))
    }
}

fn decode_failure(resp: HttpResponse) -> ApiError {
    match api::Error::parse(&resp.body) {
        Ok(e) => ApiError::Api(e),
        Err(_) => ApiError::BadResponse(format!("http status {}", resp.status)),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::api::{RefreshToken, User, UserId, Uuid};

    /// Accepts exactly one access token at a time; `/auth/refresh` rotates
    /// it. Yields once per refresh so concurrent callers interleave the way
    /// they would against a real network.
    struct TestBackend {
        valid_token: Cell<AccessToken>,
        refresh_calls: Cell<u32>,
        fail_refresh: Cell<bool>,
        reject_everything: Cell<bool>,
    }

    impl TestBackend {
        fn new(valid_token: AccessToken) -> TestBackend {
            TestBackend {
                valid_token: Cell::new(valid_token),
                refresh_calls: Cell::new(0),
                fail_refresh: Cell::new(false),
                reject_everything: Cell::new(false),
            }
        }

        fn unauthorized() -> HttpResponse {
            let e = api::Error::InvalidCredentials;
            HttpResponse {
                status: e.status_code(),
                body: e.contents(),
            }
        }

        fn envelope<T: serde::Serialize>(data: T) -> HttpResponse {
            HttpResponse {
                status: StatusCode::OK,
                body: serde_json::to_vec(&ApiResponse::ok(data)).unwrap(),
            }
        }
    }

    #[async_trait(?Send)]
    impl Backend for TestBackend {
        async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
            if req.path == "/auth/refresh" {
                self.refresh_calls.set(self.refresh_calls.get() + 1);
                tokio::task::yield_now().await;
                if self.fail_refresh.get() {
                    return Ok(Self::unauthorized());
                }
                let new_token = AccessToken(Uuid::new_v4());
                self.valid_token.set(new_token);
                return Ok(Self::envelope(RefreshResponse {
                    access_token: new_token,
                }));
            }
            if req.path == "/auth/login" {
                // Stands in for a wrong-password attempt
                return Ok(Self::unauthorized());
            }
            if self.reject_everything.get() || req.bearer != Some(self.valid_token.get()) {
                return Ok(Self::unauthorized());
            }
            Ok(Self::envelope(json!({ "pong": true })))
        }
    }

    fn session_with(token: AccessToken) -> Session {
        Session {
            user: User {
                id: UserId(Uuid::new_v4()),
                username: String::from("ada"),
            },
            access_token: token,
            refresh_token: RefreshToken(Uuid::new_v4()),
        }
    }

    fn expired_client() -> ApiClient<TestBackend> {
        // The session's access token is not the one the backend accepts
        let client = ApiClient::new(TestBackend::new(AccessToken(Uuid::new_v4())));
        client.set_session(session_with(AccessToken(Uuid::new_v4())));
        client
    }

    async fn ping(client: &ApiClient<TestBackend>) -> Result<serde_json::Value, ApiError> {
        client.request(Method::GET, "/ping", None).await
    }

    #[tokio::test]
    async fn concurrent_401s_coalesce_into_one_refresh() {
        let client = expired_client();
        let (a, b) = futures::join!(ping(&client), ping(&client));
        assert!(a.is_ok(), "first call failed: {a:?}");
        assert!(b.is_ok(), "second call failed: {b:?}");
        assert_eq!(client.backend.refresh_calls.get(), 1);
        // Stored credential was rotated to the refreshed one
        assert_eq!(
            client.session().unwrap().access_token,
            client.backend.valid_token.get()
        );
    }

    #[tokio::test]
    async fn refresh_failure_rejects_all_waiters_and_ends_the_session() {
        let client = expired_client();
        client.backend.fail_refresh.set(true);
        let expired_signal = Rc::new(Cell::new(0));
        {
            let expired_signal = expired_signal.clone();
            client.on_session_expired(move || expired_signal.set(expired_signal.get() + 1));
        }

        let (a, b) = futures::join!(ping(&client), ping(&client));
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(client.backend.refresh_calls.get(), 1);
        assert_eq!(client.session(), None);
        assert_eq!(expired_signal.get(), 1);
    }

    #[tokio::test]
    async fn second_401_after_replay_is_terminal() {
        let client = expired_client();
        client.backend.reject_everything.set(true);

        let res = ping(&client).await;
        assert_eq!(res, Err(ApiError::SessionExpired));
        // Refreshed once, replayed once, gave up
        assert_eq!(client.backend.refresh_calls.get(), 1);
        assert_eq!(client.session(), None);
    }

    #[tokio::test]
    async fn a_401_without_a_session_is_not_refreshed() {
        let client = ApiClient::new(TestBackend::new(AccessToken(Uuid::new_v4())));
        let res = ping(&client).await;
        assert_eq!(res, Err(ApiError::Api(api::Error::InvalidCredentials)));
        assert_eq!(client.backend.refresh_calls.get(), 0);
    }

    #[tokio::test]
    async fn a_rejected_login_keeps_the_session_and_is_not_refreshed() {
        // Logged in as one user, typing the wrong password for another:
        // the 401 belongs to the login attempt, not to our credentials
        let token = AccessToken(Uuid::new_v4());
        let client = ApiClient::new(TestBackend::new(token));
        client.set_session(session_with(token));

        let res = client
            .login(LoginRequest {
                email: String::from("ada@example.org"),
                password: String::from("not-it"),
            })
            .await;
        assert_eq!(res, Err(ApiError::Api(api::Error::InvalidCredentials)));
        assert_eq!(client.backend.refresh_calls.get(), 0);
        assert!(client.session().is_some());
    }

    #[tokio::test]
    async fn successful_refresh_reports_the_new_session() {
        let client = expired_client();
        let refreshed: Rc<RefCell<Option<Session>>> = Rc::new(RefCell::new(None));
        {
            let refreshed = refreshed.clone();
            client.on_session_refreshed(move |s| *refreshed.borrow_mut() = Some(s));
        }

        ping(&client).await.unwrap();
        let reported = refreshed.borrow().clone().unwrap();
        assert_eq!(reported.access_token, client.backend.valid_token.get());
    }
}
