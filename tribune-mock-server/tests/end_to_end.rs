use tokio::sync::mpsc::UnboundedReceiver;

use tribune_client::{
    api::{Error, FeedEvent, LoginRequest, RegisterRequest, Session, SortBy},
    ApiClient, ApiError, CommentStore,
};
use tribune_mock_server::MockServer;

fn register_req(name: &str) -> RegisterRequest {
    RegisterRequest {
        username: name.to_string(),
        email: format!("{name}@example.org"),
        password: format!("hunter2-{name}"),
    }
}

async fn client_for(server: &MockServer, name: &str) -> (ApiClient<MockServer>, Session) {
    let client = ApiClient::new(server.clone());
    let session = client.register(register_req(name)).await.unwrap();
    client.set_session(session.clone());
    (client, session)
}

fn drain(rx: &mut UnboundedReceiver<FeedEvent>) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn register_login_logout() {
    let server = MockServer::new();
    let (client, session) = client_for(&server, "ada").await;
    assert_eq!(session.user.username, "ada");

    // Both unique fields are enforced
    let again = client.register(register_req("ada")).await;
    assert_eq!(
        again,
        Err(ApiError::Api(Error::NameAlreadyUsed(String::from("ada"))))
    );
    let mut req = register_req("ada2");
    req.email = String::from("ada@example.org");
    assert!(matches!(
        client.register(req).await,
        Err(ApiError::Api(Error::EmailAlreadyUsed(_)))
    ));

    let wrong = client
        .login(LoginRequest {
            email: String::from("ada@example.org"),
            password: String::from("not-it"),
        })
        .await;
    assert_eq!(wrong, Err(ApiError::Api(Error::InvalidCredentials)));

    let fresh = client
        .login(LoginRequest {
            email: String::from("ada@example.org"),
            password: String::from("hunter2-ada"),
        })
        .await
        .unwrap();
    assert_eq!(fresh.user.id, session.user.id);

    client.logout().await;
    assert_eq!(client.session(), None);
}

#[tokio::test]
async fn expired_token_is_refreshed_transparently() {
    let server = MockServer::new();
    let (client, session) = client_for(&server, "ada").await;

    server.expire_access_token(session.access_token);
    let page = client.list_comments(1, 10, SortBy::Newest).await.unwrap();
    assert!(page.comments.is_empty());

    // The stored credential was rotated by the refresh
    let rotated = client.session().unwrap();
    assert_ne!(rotated.access_token, session.access_token);
    assert_eq!(rotated.refresh_token, session.refresh_token);
}

#[tokio::test]
async fn revoked_refresh_token_ends_the_session() {
    let server = MockServer::new();
    let (client, session) = client_for(&server, "ada").await;

    // Logging out elsewhere revokes both credentials
    let other = ApiClient::new(server.clone());
    other.set_session(session.clone());
    other.logout().await;

    server.expire_access_token(session.access_token);
    let res = client.list_comments(1, 10, SortBy::Newest).await;
    assert_eq!(res, Err(ApiError::Api(Error::InvalidCredentials)));
    assert_eq!(client.session(), None);
}

#[tokio::test]
async fn crud_pagination_and_sorting() {
    let server = MockServer::new();
    let (client, _) = client_for(&server, "ada").await;

    for i in 0..15 {
        client.create_comment(format!("comment {i}")).await.unwrap();
    }

    let page1 = client.list_comments(1, 10, SortBy::Newest).await.unwrap();
    assert_eq!(page1.comments.len(), 10);
    assert_eq!(page1.pagination.total, 15);
    assert_eq!(page1.pagination.pages, 2);
    assert_eq!(page1.comments[0].content, "comment 14");

    let page2 = client.list_comments(2, 10, SortBy::Newest).await.unwrap();
    assert_eq!(page2.comments.len(), 5);
    assert_eq!(page2.comments[4].content, "comment 0");

    let oldest = client.list_comments(1, 10, SortBy::Oldest).await.unwrap();
    assert_eq!(oldest.comments[0].content, "comment 0");

    let target = page2.comments[4].clone();
    let edited = client
        .update_comment(target.id, String::from("rewritten"))
        .await
        .unwrap();
    assert_eq!(edited.content, "rewritten");
    assert!(edited.updated_at >= target.updated_at);

    client.delete_comment(target.id).await.unwrap();
    assert_eq!(server.comment_count(), 14);
    assert_eq!(
        client.delete_comment(target.id).await,
        Err(ApiError::Api(Error::NotFound(target.id)))
    );
}

#[tokio::test]
async fn replies_are_threaded_one_level_deep() {
    let server = MockServer::new();
    let (ada, _) = client_for(&server, "ada").await;
    let (brin, _) = client_for(&server, "brin").await;

    let root = ada.create_comment(String::from("root")).await.unwrap();
    let reply = brin
        .reply_to_comment(root.id, String::from("first reply"))
        .await
        .unwrap();
    assert_eq!(reply.parent_id, Some(root.id));

    // No nesting below replies
    assert!(matches!(
        ada.reply_to_comment(reply.id, String::from("nested")).await,
        Err(ApiError::Api(Error::PermissionDenied))
    ));

    let listed = ada
        .list_replies(root.id, 1, 10, SortBy::Oldest)
        .await
        .unwrap();
    assert_eq!(listed.comments.len(), 1);
    assert_eq!(listed.comments[0].id, reply.id);

    let roots = ada.list_comments(1, 10, SortBy::Newest).await.unwrap();
    assert_eq!(roots.comments[0].reply_count, 1);

    // Deleting the root takes the reply down with it
    ada.delete_comment(root.id).await.unwrap();
    assert_eq!(server.comment_count(), 0);
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
    let server = MockServer::new();
    let (ada, _) = client_for(&server, "ada").await;
    let (brin, _) = client_for(&server, "brin").await;

    let comment = ada.create_comment(String::from("mine")).await.unwrap();
    assert_eq!(
        brin.update_comment(comment.id, String::from("hijacked"))
            .await,
        Err(ApiError::Api(Error::PermissionDenied))
    );
    assert_eq!(
        brin.delete_comment(comment.id).await,
        Err(ApiError::Api(Error::PermissionDenied))
    );
}

#[tokio::test]
async fn engagement_toggles_and_is_viewer_relative() {
    let server = MockServer::new();
    let (ada, _) = client_for(&server, "ada").await;
    let (brin, _) = client_for(&server, "brin").await;

    let comment = ada.create_comment(String::from("take")).await.unwrap();
    brin.like_comment(comment.id).await.unwrap();
    ada.like_comment(comment.id).await.unwrap();

    let seen_by_ada = ada.list_comments(1, 10, SortBy::Newest).await.unwrap();
    let c = &seen_by_ada.comments[0];
    assert_eq!(c.like_count, 2);
    assert!(c.has_liked);

    // A second like from the same viewer is an unlike
    ada.like_comment(comment.id).await.unwrap();
    let c = ada.list_comments(1, 10, SortBy::Newest).await.unwrap().comments[0].clone();
    assert_eq!((c.like_count, c.has_liked), (1, false));

    // A dislike from brin replaces their like in one step
    brin.dislike_comment(comment.id).await.unwrap();
    let c = brin
        .list_comments(1, 10, SortBy::Newest)
        .await
        .unwrap()
        .comments[0]
        .clone();
    assert_eq!(
        (c.like_count, c.dislike_count, c.has_liked, c.has_disliked),
        (0, 1, false, true)
    );
}

#[tokio::test]
async fn most_liked_sort_uses_the_tallies() {
    let server = MockServer::new();
    let (ada, _) = client_for(&server, "ada").await;
    let (brin, _) = client_for(&server, "brin").await;

    let first = ada.create_comment(String::from("first")).await.unwrap();
    let second = ada.create_comment(String::from("second")).await.unwrap();
    ada.like_comment(second.id).await.unwrap();
    brin.like_comment(second.id).await.unwrap();
    brin.like_comment(first.id).await.unwrap();

    let page = ada.list_comments(1, 10, SortBy::MostLiked).await.unwrap();
    assert_eq!(page.comments[0].id, second.id);
    assert_eq!(page.comments[0].like_count, 2);
    assert_eq!(page.comments[1].id, first.id);
}

#[tokio::test]
async fn feed_echoes_reconcile_against_optimistic_state() {
    let server = MockServer::new();
    let (ada, ada_session) = client_for(&server, "ada").await;
    let (brin, _) = client_for(&server, "brin").await;
    let mut feed = server.subscribe_feed();

    let mut store = CommentStore::new(Some(ada_session.user.clone()), 10);

    // Ada posts optimistically, then her own echo arrives
    let posted = ada.create_comment(String::from("hello")).await.unwrap();
    store.insert_own_root(posted.clone());
    for event in drain(&mut feed) {
        assert_eq!(store.apply_event(event), None);
    }
    assert_eq!(store.comments.len(), 1);
    assert_eq!(store.total, 1);

    // Brin's like arrives over the feed; counts move, ada's flags do not
    brin.like_comment(posted.id).await.unwrap();
    for event in drain(&mut feed) {
        store.apply_event(event);
    }
    let c = store.find(posted.id).unwrap();
    assert_eq!((c.like_count, c.has_liked), (1, false));

    // Ada likes too: optimistic flag first, echo confirms without drift
    ada.like_comment(posted.id).await.unwrap();
    store.apply_like(posted.id).unwrap();
    for event in drain(&mut feed) {
        store.apply_event(event);
    }
    let c = store.find(posted.id).unwrap();
    assert_eq!((c.like_count, c.has_liked), (2, true));

    // Brin replies; ada's store learns of it without holding the reply set
    brin.reply_to_comment(posted.id, String::from("hi back"))
        .await
        .unwrap();
    for event in drain(&mut feed) {
        store.apply_event(event);
    }
    assert_eq!(store.find(posted.id).unwrap().reply_count, 1);

    // Brin deletes the reply server-side, then ada's root
    let replies = brin
        .list_replies(posted.id, 1, 10, SortBy::Oldest)
        .await
        .unwrap();
    brin.delete_comment(replies.comments[0].id).await.unwrap();
    ada.delete_comment(posted.id).await.unwrap();
    store.remove_comment(posted.id);
    for event in drain(&mut feed) {
        store.apply_event(event);
    }
    assert!(store.comments.is_empty());
    assert_eq!(store.total, 0);
}
