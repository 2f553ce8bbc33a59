use thiserror::Error;

/// Errors raised by the economy engine and its storage layer.
///
/// Domain variants are expected outcomes of player actions and are surfaced to
/// clients verbatim. Storage and invariant variants indicate a server fault.
#[derive(Debug, Error)]
pub enum GameError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, content files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Content JSON failed to parse.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Game content failed to parse or references unknown ids.
    #[error("content error: {0}")]
    Content(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Returned when fetching a record or definition that is not present.
    #[error("{0} not found")]
    NotFound(String),

    /// Request was well-formed JSON but semantically unusable.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Not enough cash")]
    InsufficientFunds,

    #[error("Not enough money in gang bank")]
    InsufficientBankFunds,

    #[error("Item not owned")]
    NotOwned,

    #[error("Already owned")]
    AlreadyOwned,

    #[error("Unequip the item first")]
    ItemEquipped,

    /// Action attempted before its cooldown elapsed.
    #[error("Cooldown: {remaining_secs}s")]
    OnCooldown { remaining_secs: u64 },

    #[error("Ad cooldown: {remaining_secs}s")]
    AdCooldown { remaining_secs: u64 },

    #[error("Already claimed")]
    AlreadyClaimed,

    #[error("Not completed yet")]
    NotCompleted,

    #[error("No talent points")]
    NoPoints,

    #[error("Max level reached")]
    MaxLevelReached,

    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Price too low (minimum {min})")]
    PriceTooLow { min: f64 },

    /// Listing was sold or cancelled by a concurrent request.
    #[error("Listing no longer available")]
    ListingGone,

    #[error("Not in a gang")]
    NotInGang,

    #[error("Already in a gang")]
    AlreadyInGang,

    #[error("Gang is full")]
    GangFull,

    /// Caller lacks the gang role the action requires.
    #[error("{0}")]
    NotLeader(String),

    #[error("Need at least {required} participants")]
    NotEnoughParticipants { required: usize },

    #[error("Invalid referral code")]
    InvalidReferral,

    #[error("Payment not verified: {0}")]
    PaymentUnverified(String),

    #[error("Requires level {required}")]
    LevelRequired { required: u32 },

    #[error("VIP not active")]
    VipRequired,

    /// Telegram init_data did not validate for the claimed player.
    #[error("Invalid initData")]
    Unauthorized,

    /// A consistency rule was broken (negative balance, lock order). Indicates a bug.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl GameError {
    /// True for variants that describe a server fault rather than a player mistake.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            GameError::Sled(_)
                | GameError::Bincode(_)
                | GameError::Io(_)
                | GameError::Json(_)
                | GameError::Content(_)
                | GameError::SchemaMismatch { .. }
                | GameError::InvariantViolation(_)
        )
    }
}

pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_message_reports_remaining_seconds() {
        let err = GameError::OnCooldown { remaining_secs: 42 };
        assert_eq!(err.to_string(), "Cooldown: 42s");
        assert!(!err.is_internal());
    }

    #[test]
    fn invariant_violation_is_internal() {
        assert!(GameError::InvariantViolation("cash < 0".into()).is_internal());
        assert!(!GameError::ListingGone.is_internal());
    }
}
