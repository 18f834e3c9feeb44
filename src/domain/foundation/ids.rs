//! Strongly-typed identifier value objects.
//!
//! Identifiers arriving from clients are opaque strings; identifiers minted
//! server-side use a short hex form so they stay cookie- and URL-friendly.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{DomainError, ErrorCode};

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Tenant identifier assigned at business registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessId(String);

impl BusinessId {
    /// Creates a BusinessId from an existing value, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::new(
                ErrorCode::Validation,
                "business_id cannot be empty",
            ));
        }
        Ok(Self(id))
    }

    /// Mints a fresh BusinessId.
    pub fn mint() -> Self {
        Self(format!("biz_{}", short_hex()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// End-user identifier, scoped to one tenant. Usually persisted client-side
/// in a first-party cookie; minted here on first contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a UserId from an existing value, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::new(
                ErrorCode::Validation,
                "user_id cannot be empty",
            ));
        }
        Ok(Self(id))
    }

    /// Mints a fresh opaque UserId.
    pub fn mint() -> Self {
        Self(format!("user_{}", short_hex()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Browsing-session identifier. Valid for the duration of one visit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a SessionId from an existing value, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::new(
                ErrorCode::Validation,
                "session_id cannot be empty",
            ));
        }
        Ok(Self(id))
    }

    /// Mints a fresh opaque SessionId.
    pub fn mint() -> Self {
        Self(format!("session_{}", short_hex()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a markup fragment chosen by the site author
/// (e.g. "hero", "pricing-block"). Never minted server-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Creates a ComponentId, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::new(
                ErrorCode::Validation,
                "component_id cannot be empty",
            ));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cross-site user identifier. Only ever accepted from the client's sync
/// flow or minted by the link endpoint; optimize and event paths never
/// synthesize one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalUid(String);

impl GlobalUid {
    /// Creates a GlobalUid, rejecting empty input.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::new(
                ErrorCode::Validation,
                "global_uid cannot be empty",
            ));
        }
        Ok(Self(id))
    }

    /// Mints a fresh GlobalUid (link endpoint only).
    pub fn mint() -> Self {
        Self(format!("guid_{}", short_hex()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GlobalUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
