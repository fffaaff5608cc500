use crate::store::Collection;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),

    #[error("collection {collection} could not be decoded: {source}")]
    Decode {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    #[error("collection {collection} could not be encoded: {source}")]
    Encode {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
}

/// Login failures. Each variant is a distinct, user-visible reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("unknown username")]
    UnknownUser,

    #[error("school subscription is inactive")]
    SubscriptionInactive,

    #[error("account is not attached to a school")]
    NoSchool,

    #[error("account is not linked to a student")]
    NoRelatedStudent,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("role {role} is not allowed to {action}")]
    Forbidden { role: String, action: &'static str },

    #[error("{entity} {id} is outside the caller's scope")]
    OutOfScope { entity: &'static str, id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Required(&'static str),

    #[error("username {0} is already taken")]
    UsernameTaken(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

/// Anything a service-level operation can report back to its caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ServiceError {
    /// Stable IPC error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Store(_) => "db_write_failed",
            ServiceError::Access(AccessError::Forbidden { .. }) => "forbidden",
            ServiceError::Access(AccessError::OutOfScope { .. }) => "not_found",
            ServiceError::Validation(ValidationError::NotFound { .. }) => "not_found",
            ServiceError::Validation(ValidationError::UsernameTaken(_)) => "conflict",
            ServiceError::Validation(ValidationError::Required(_)) => "bad_params",
        }
    }
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UnknownUser => "unknown_user",
            AuthError::SubscriptionInactive => "subscription_inactive",
            AuthError::NoSchool => "no_school",
            AuthError::NoRelatedStudent => "no_related_student",
        }
    }
}
