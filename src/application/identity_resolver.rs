//! Identity resolution: api key to tenant, request body to user triple.
//!
//! Tenant authentication runs in middleware via [`authenticate`];
//! user/session resolution runs per handler via [`resolve_user`]. Ids the
//! client did not supply are minted here and echoed back so the client can
//! persist them; a `global_uid` is only ever accepted, never synthesized
//! on this path.

use crate::domain::foundation::{DomainError, GlobalUid, SessionId, UserId};
use crate::domain::tenant::Business;
use crate::ports::BusinessStore;

/// The resolved (user, session, global) triple for one request.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub global_uid: Option<GlobalUid>,
    /// True when the user id was minted on this request.
    pub minted_user: bool,
}

/// Resolves an api key and request origin to a tenant.
///
/// Unknown or inactive keys are `Unauthorized`; an origin outside the
/// tenant's allow-list is `Forbidden`. Requests without an Origin header
/// (server-to-server) pass the origin check.
pub async fn authenticate(
    businesses: &dyn BusinessStore,
    api_key: Option<&str>,
    origin: Option<&str>,
) -> Result<Business, DomainError> {
    let api_key = api_key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| DomainError::unauthorized("missing X-API-Key header"))?;

    let business = businesses
        .find_by_api_key(api_key)
        .await?
        .ok_or_else(|| DomainError::unauthorized("invalid or inactive API key"))?;

    if let Some(origin) = origin {
        if !business.admits_origin(origin) {
            return Err(
                DomainError::forbidden(format!("origin '{origin}' is not allowed"))
                    .with_detail("business_id", business.business_id.to_string()),
            );
        }
    }

    Ok(business)
}

/// Resolves the user triple from optional client-supplied identifiers.
pub fn resolve_user(
    user_id: Option<String>,
    session_id: Option<String>,
    global_uid: Option<String>,
) -> Result<ResolvedUser, DomainError> {
    let minted_user = user_id.as_deref().map(str::is_empty).unwrap_or(true);
    let user_id = match user_id.filter(|id| !id.is_empty()) {
        Some(id) => UserId::new(id)?,
        None => UserId::mint(),
    };
    let session_id = match session_id.filter(|id| !id.is_empty()) {
        Some(id) => SessionId::new(id)?,
        None => SessionId::mint(),
    };
    let global_uid = global_uid
        .filter(|id| !id.is_empty())
        .map(GlobalUid::new)
        .transpose()?;

    Ok(ResolvedUser {
        user_id,
        session_id,
        global_uid,
        minted_user,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBusinessStore;
    use crate::domain::tenant::BusinessTier;

    async fn store_with_business() -> (InMemoryBusinessStore, Business) {
        let store = InMemoryBusinessStore::new();
        let business =
            Business::register("Shoes", "shoes.test", vec![], BusinessTier::Free);
        store.insert(&business).await.unwrap();
        (store, business)
    }

    #[tokio::test]
    async fn valid_key_and_origin_authenticate() {
        let (store, business) = store_with_business().await;

        let resolved = authenticate(&store, Some(&business.api_key), Some("https://shoes.test"))
            .await
            .unwrap();
        assert_eq!(resolved.business_id, business.business_id);
    }

    #[tokio::test]
    async fn missing_key_is_unauthorized() {
        let (store, _) = store_with_business().await;
        let err = authenticate(&store, None, None).await.unwrap_err();
        assert_eq!(
            err.code,
            crate::domain::foundation::ErrorCode::Unauthorized
        );
    }

    #[tokio::test]
    async fn unknown_key_is_unauthorized() {
        let (store, _) = store_with_business().await;
        let err = authenticate(&store, Some("pk_live_bogus"), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.code,
            crate::domain::foundation::ErrorCode::Unauthorized
        );
    }

    #[tokio::test]
    async fn foreign_origin_is_forbidden() {
        let (store, business) = store_with_business().await;
        let err = authenticate(&store, Some(&business.api_key), Some("https://evil.test"))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::domain::foundation::ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn absent_origin_passes_the_origin_check() {
        let (store, business) = store_with_business().await;
        assert!(authenticate(&store, Some(&business.api_key), None)
            .await
            .is_ok());
    }

    #[test]
    fn absent_ids_are_minted() {
        let resolved = resolve_user(None, None, None).unwrap();
        assert!(resolved.minted_user);
        assert!(resolved.user_id.as_str().starts_with("user_"));
        assert!(resolved.session_id.as_str().starts_with("session_"));
        assert!(resolved.global_uid.is_none());
    }

    #[test]
    fn supplied_ids_pass_through() {
        let resolved = resolve_user(
            Some("user_abc".into()),
            Some("session_xyz".into()),
            Some("guid_123".into()),
        )
        .unwrap();

        assert!(!resolved.minted_user);
        assert_eq!(resolved.user_id.as_str(), "user_abc");
        assert_eq!(resolved.session_id.as_str(), "session_xyz");
        assert_eq!(resolved.global_uid.unwrap().as_str(), "guid_123");
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let resolved = resolve_user(Some(String::new()), Some(String::new()), Some(String::new()))
            .unwrap();
        assert!(resolved.minted_user);
        assert!(resolved.global_uid.is_none());
    }
}
