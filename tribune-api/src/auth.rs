use uuid::Uuid;

use crate::{Error, User, STUB_UUID};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_username(&self.username)?;
        crate::validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(Error::InvalidCredentials);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Short-lived credential attached as a bearer token to every API call
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AccessToken(pub Uuid);

impl AccessToken {
    pub fn stub() -> AccessToken {
        AccessToken(STUB_UUID)
    }
}

/// Long-lived credential, used only against `/auth/refresh`
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RefreshToken(pub Uuid);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Session {
    pub user: User,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RefreshRequest {
    pub refresh_token: RefreshToken,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RefreshResponse {
    pub access_token: AccessToken,
}
