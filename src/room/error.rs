use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("participants exceeds maximum allowed ({max})")]
    LimitExceeded { max: usize },
    #[error("room name already taken")]
    Conflict,
    #[error("could not allocate a unique room token after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("room not found")]
    NotFound,
    #[error("invalid token")]
    Unauthorized,
    #[error("token expired")]
    Expired,
    #[error("internal server error")]
    StoreUnavailable,
}

impl RoomError {
    /// Stable, machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            RoomError::Unauthenticated => "unauthenticated",
            RoomError::InvalidArgument(_) => "invalid_argument",
            RoomError::LimitExceeded { .. } => "limit_exceeded",
            RoomError::Conflict => "conflict",
            RoomError::Exhausted { .. } => "exhausted",
            RoomError::NotFound => "not_found",
            RoomError::Unauthorized => "unauthorized",
            RoomError::Expired => "expired",
            RoomError::StoreUnavailable => "store_unavailable",
        }
    }
}
