use crate::{Comment, CommentId, User};

/// One server-originated event on the push channel.
///
/// On the wire every event is `{"event": "<name>", "data": {...}}`; the
/// names match what the server broadcasts to every connected client,
/// including the client whose action caused the broadcast (its "echo").
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "event", content = "data")]
pub enum FeedEvent {
    #[serde(rename = "comment:created")]
    Created(Comment),
    #[serde(rename = "comment:reply_created")]
    ReplyCreated {
        parent_id: CommentId,
        reply: Comment,
    },
    #[serde(rename = "comment:updated")]
    Updated(Comment),
    #[serde(rename = "comment:deleted")]
    Deleted { id: CommentId },
    #[serde(rename = "comment:like_updated")]
    LikeUpdated(EngagementUpdate),
    #[serde(rename = "comment:dislike_updated")]
    DislikeUpdated(EngagementUpdate),
}

/// Authoritative new tally for one comment, plus who acted.
///
/// `action_by` lets each receiving client tell "my action confirmed" from
/// "someone else's action": only the acting viewer may touch their own
/// `has_liked`/`has_disliked` flags.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EngagementUpdate {
    pub comment_id: CommentId,
    pub like_count: u64,
    pub dislike_count: u64,
    pub action: EngagementAction,
    pub action_by: User,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementAction {
    Liked,
    Unliked,
    Disliked,
    Undisliked,
}

/// Messages flowing client -> server or server -> client as raw text
/// frames, outside the JSON event envelope.
pub const WS_PING: &str = "ping";
pub const WS_PONG: &str = "pong";
pub const WS_AUTH_OK: &str = "ok";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Time, UserId, Uuid};

    fn viewer() -> User {
        User {
            id: UserId(Uuid::new_v4()),
            username: String::from("ada"),
        }
    }

    #[test]
    fn event_envelope_shape() {
        let update = FeedEvent::LikeUpdated(EngagementUpdate {
            comment_id: CommentId(Uuid::new_v4()),
            like_count: 4,
            dislike_count: 0,
            action: EngagementAction::Liked,
            action_by: viewer(),
        });
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&update).unwrap()).unwrap();
        assert_eq!(json["event"], "comment:like_updated");
        assert_eq!(json["data"]["like_count"], 4);
        assert_eq!(json["data"]["action"], "liked");
    }

    #[test]
    fn event_round_trip() {
        let parent = CommentId(Uuid::new_v4());
        for evt in [
            FeedEvent::ReplyCreated {
                parent_id: parent,
                reply: Comment::new_reply(viewer(), String::from("hello"), parent),
            },
            FeedEvent::Deleted { id: parent },
        ] {
            let json = serde_json::to_string(&evt).unwrap();
            assert_eq!(serde_json::from_str::<FeedEvent>(&json).unwrap(), evt);
        }

        // Timestamps survive the trip too
        let c = Comment::new_root(viewer(), String::from("root"));
        let created_at: Time = c.created_at;
        let json = serde_json::to_string(&FeedEvent::Created(c)).unwrap();
        match serde_json::from_str::<FeedEvent>(&json).unwrap() {
            FeedEvent::Created(c) => assert_eq!(c.created_at, created_at),
            other => panic!("decoded unexpected event {other:?}"),
        }
    }
}
