use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod auth;
pub use auth::{
    AccessToken, LoginRequest, RefreshRequest, RefreshResponse, RefreshToken, RegisterRequest,
    Session,
};

mod comment;
pub use comment::{Comment, CommentId, EditComment, NewComment};

mod error;
pub use error::Error;

mod event;
pub use event::{EngagementAction, EngagementUpdate, FeedEvent, WS_AUTH_OK, WS_PING, WS_PONG};

mod page;
pub use page::{CommentPage, Pagination, SortBy};

mod user;
pub use user::{User, UserId};

pub const MAX_CONTENT_LEN: usize = 10_000;

/// Shared by all handlers that accept user-submitted comment text
pub fn validate_content(s: &str) -> Result<(), Error> {
    if s.trim().is_empty() {
        return Err(Error::EmptyContent);
    }
    if s.len() > MAX_CONTENT_LEN {
        return Err(Error::ContentTooLong(s.len()));
    }
    if s.contains('\0') {
        return Err(Error::NullByteInString(s.to_string()));
    }
    Ok(())
}

pub fn validate_username(s: &str) -> Result<(), Error> {
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidName(s.to_string()));
    }
    Ok(())
}

/// Deliberately loose, the server is the real judge of deliverability
pub fn validate_email(s: &str) -> Result<(), Error> {
    let mut parts = s.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(Error::InvalidEmail(s.to_string())),
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> ApiResponse<T> {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn into_result(self) -> Result<T, Error> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(Error::Unknown(String::from(
                "successful response carried no data",
            ))),
            (false, _) => Err(Error::Unknown(self.message.unwrap_or_default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_validation() {
        assert_eq!(validate_content("hello"), Ok(()));
        assert_eq!(validate_content(""), Err(Error::EmptyContent));
        assert_eq!(validate_content("   \n "), Err(Error::EmptyContent));
        assert!(matches!(
            validate_content("a\0b"),
            Err(Error::NullByteInString(_))
        ));
        let long = "x".repeat(MAX_CONTENT_LEN + 1);
        assert_eq!(
            validate_content(&long),
            Err(Error::ContentTooLong(MAX_CONTENT_LEN + 1))
        );
    }

    #[test]
    fn email_validation() {
        assert_eq!(validate_email("user@example.org"), Ok(()));
        assert!(validate_email("userexample.org").is_err());
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("a@b.c@d.e").is_err());
    }

    #[test]
    fn username_validation() {
        assert_eq!(validate_username("jo_anne-42"), Ok(()));
        assert!(validate_username("").is_err());
        assert!(validate_username("with space").is_err());
    }
}
