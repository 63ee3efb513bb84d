//! Engine error taxonomy.
//!
//! Every failure a resolver can raise falls into one of three classes:
//! validation problems (bad request shape, wrong ability element), resource
//! problems (dead actor, not enough AP), and missing lookups. All of them
//! are raised before any adjustment is recorded, so a failed call never
//! leaves partial state behind.

use crate::dice::DiceError;
use thiserror::Error;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or contradictory request; never retried.
    Validation,
    /// The actor lacks a resource (AP, being alive) to act.
    Resource,
    /// A referenced player, monster, ability, or item does not exist.
    NotFound,
}

/// Errors raised by combat resolution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{0} is not a valid monster")]
    UnknownMonster(String),

    #[error("@{0} doesn't have a battle avatar")]
    UnknownPlayer(String),

    #[error("no ability named {0}")]
    UnknownAbility(String),

    #[error("no item with id {0}")]
    UnknownItem(String),

    #[error("no job with id {0}")]
    UnknownJob(String),

    #[error("{0} doesn't have ability {1}")]
    AbilityNotKnown(String, String),

    #[error("@{actor} doesn't have {item} to use")]
    ItemNotHeld { actor: String, item: String },

    #[error("{0} is not consumable")]
    NotConsumable(String),

    #[error("{ability} is not {expected} ability")]
    WrongElement {
        ability: String,
        expected: &'static str,
    },

    #[error("{0} cannot target just one opponent")]
    AreaMismatch(String),

    #[error("{0} cannot target all opponents, you must specify a target")]
    TargetRequired(String),

    #[error("@{0} is dead and cannot perform any actions")]
    DeadActor(String),

    #[error("@{0} is already dead")]
    TargetDead(String),

    #[error("@{actor} needs {needed} AP to use {ability}")]
    InsufficientAp {
        actor: String,
        needed: i64,
        ability: String,
    },

    #[error("all adventurers are busy with monsters right now")]
    EncounterLimit,

    #[error("bad buff string on ability {0}")]
    BadBuffSpec(String),

    #[error("bad cleansing string on ability {0}")]
    BadCleanseSpec(String),

    #[error(transparent)]
    Dice(#[from] DiceError),
}

impl EngineError {
    /// Classify this error per the engine's failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownMonster(_)
            | EngineError::UnknownPlayer(_)
            | EngineError::UnknownAbility(_)
            | EngineError::UnknownItem(_)
            | EngineError::UnknownJob(_) => ErrorKind::NotFound,

            EngineError::DeadActor(_)
            | EngineError::TargetDead(_)
            | EngineError::InsufficientAp { .. } => ErrorKind::Resource,

            EngineError::AbilityNotKnown(_, _)
            | EngineError::ItemNotHeld { .. }
            | EngineError::NotConsumable(_)
            | EngineError::WrongElement { .. }
            | EngineError::AreaMismatch(_)
            | EngineError::TargetRequired(_)
            | EngineError::EncounterLimit
            | EngineError::BadBuffSpec(_)
            | EngineError::BadCleanseSpec(_)
            | EngineError::Dice(_) => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            EngineError::UnknownPlayer("ghost".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            EngineError::DeadActor("alice".into()).kind(),
            ErrorKind::Resource
        );
        assert_eq!(
            EngineError::AreaMismatch("FIRESTORM".into()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_messages_read_like_chat() {
        let err = EngineError::InsufficientAp {
            actor: "alice".into(),
            needed: 4,
            ability: "Fireball".into(),
        };
        assert_eq!(err.to_string(), "@alice needs 4 AP to use Fireball");
    }
}
