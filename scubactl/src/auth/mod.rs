//! Authentication: password hashing, JWT issuance/verification, and the
//! [`CurrentUser`](crate::api::models::users::CurrentUser) request extractor.

pub mod current_user;
pub mod password;
pub mod session;

use crate::{api::models::users::CurrentUser, errors::Error};

/// Gate an admin-only handler.
pub fn require_admin(user: &CurrentUser) -> Result<(), Error> {
    if user.is_admin { Ok(()) } else { Err(Error::Forbidden) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    #[test]
    fn test_require_admin() {
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            is_admin: true,
        };
        assert!(require_admin(&admin).is_ok());

        let user = CurrentUser {
            id: Uuid::new_v4(),
            username: "user".to_string(),
            email: "user@example.com".to_string(),
            is_admin: false,
        };
        let err = require_admin(&user).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
