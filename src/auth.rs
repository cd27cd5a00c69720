//! API-key authentication as done by WakaTime clients.
//!
//! Clients send `Authorization: Basic <base64(api key)>`; some send
//! `Bearer` instead, or the key without base64.

use crate::db::UserRepository;
use crate::error::IngestError;
use crate::model::User;

/// `{user}` path value standing for the authenticated caller.
pub const CURRENT_USER: &str = "current";

pub async fn authenticate<U>(users: &U, authorization: Option<&str>) -> Result<User, IngestError>
where
    U: UserRepository + ?Sized,
{
    let token = authorization
        .and_then(bearer_token)
        .ok_or(IngestError::Unauthorized)?;

    for key in candidate_keys(token) {
        match users.find_by_api_key(&key).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %format!("{:#}", e), "failed to look up api key");
                return Err(IngestError::UserLookup(e));
            }
        }
    }

    Err(IngestError::Unauthorized)
}

/// Callers may only post heartbeats for themselves.
pub fn check_effective_user(user: &User, requested: Option<&str>) -> Result<(), IngestError> {
    match requested {
        None | Some(CURRENT_USER) => Ok(()),
        Some(id) if id == user.id => Ok(()),
        Some(_) => Err(IngestError::Unauthorized),
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("basic") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token)
    } else {
        None
    }
}

fn candidate_keys(token: &str) -> Vec<String> {
    let decoded = base64::decode(token)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match decoded {
        Some(key) if key != token => vec![key, token.to_string()],
        _ => vec![token.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDb;

    fn db() -> MemoryDb {
        let db = MemoryDb::new();
        db.add_user(User {
            id: "alice".into(),
            api_key: "4f8a2c1e-0b1d-4d2a-9f7e-3c5b6a7d8e9f".into(),
            has_data: false,
        });
        db
    }

    #[tokio::test]
    async fn basic_base64_key_is_accepted() {
        let header = format!("Basic {}", base64::encode("4f8a2c1e-0b1d-4d2a-9f7e-3c5b6a7d8e9f"));
        let user = authenticate(&db(), Some(&header)).await.unwrap();
        assert_eq!(user.id, "alice");
    }

    #[tokio::test]
    async fn raw_bearer_key_is_accepted() {
        let user = authenticate(&db(), Some("Bearer 4f8a2c1e-0b1d-4d2a-9f7e-3c5b6a7d8e9f"))
            .await
            .unwrap();
        assert_eq!(user.id, "alice");
    }

    #[tokio::test]
    async fn unknown_or_missing_keys_are_rejected() {
        let header = format!("Basic {}", base64::encode("nope"));
        assert!(matches!(
            authenticate(&db(), Some(&header)).await,
            Err(IngestError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&db(), None).await,
            Err(IngestError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&db(), Some("Digest abc")).await,
            Err(IngestError::Unauthorized)
        ));
    }

    #[test]
    fn effective_user_must_be_caller() {
        let user = User {
            id: "alice".into(),
            api_key: "k".into(),
            has_data: true,
        };

        assert!(check_effective_user(&user, None).is_ok());
        assert!(check_effective_user(&user, Some("current")).is_ok());
        assert!(check_effective_user(&user, Some("alice")).is_ok());
        assert!(matches!(
            check_effective_user(&user, Some("bob")),
            Err(IngestError::Unauthorized)
        ));
    }
}
