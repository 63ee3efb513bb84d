//! The relay/transport collaborator contract.
//!
//! Inbound, the relay delivers pre-validated [`ActionMessage`]s to the
//! session; outbound, the session emits one [`SessionUpdate`] snapshot per
//! processed action and one per scheduler tick. Message authenticity is the
//! transport's responsibility.

use async_trait::async_trait;
use dungeon_core::buffs::{Buff, DotEffect};
use dungeon_core::state::{Monster, Player, SessionState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// An inbound action from a player or operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionMessage {
    PlayerJoin {
        actor: String,
    },
    PlayerLeave {
        actor: String,
    },
    /// `targets[0]` names the monster definition; `argument` optionally
    /// renames the spawned instance.
    SpawnMonster {
        actor: String,
        #[serde(default)]
        targets: Vec<String>,
        #[serde(default)]
        argument: Option<String>,
    },
    Attack {
        actor: String,
        #[serde(default)]
        targets: Vec<String>,
    },
    /// `argument` is an ability id, or `#ITEM` for a consumable.
    Use {
        actor: String,
        #[serde(default)]
        targets: Vec<String>,
        argument: String,
    },
    /// Venture out: may turn up an item or a monster. `argument` names a
    /// dungeon to explore.
    Explore {
        actor: String,
        #[serde(default)]
        argument: Option<String>,
    },
}

impl ActionMessage {
    /// The acting party, for cooldowns and error attribution.
    pub fn actor(&self) -> &str {
        match self {
            ActionMessage::PlayerJoin { actor }
            | ActionMessage::PlayerLeave { actor }
            | ActionMessage::SpawnMonster { actor, .. }
            | ActionMessage::Attack { actor, .. }
            | ActionMessage::Use { actor, .. }
            | ActionMessage::Explore { actor, .. } => actor,
        }
    }
}

/// Who a state update is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    All,
    Player(String),
}

/// A consolidated view of session state for redistribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub players: HashMap<String, Player>,
    pub monsters: HashMap<String, Monster>,
    pub buffs: HashMap<String, Vec<Buff>>,
    pub dots: HashMap<String, Vec<DotEffect>>,
    /// Transcript entries accumulated since the previous snapshot.
    pub messages: Vec<String>,
    pub cooldowns: HashMap<String, u32>,
}

impl StateSnapshot {
    /// Capture the current state, attaching the given transcript slice.
    pub fn capture(state: &SessionState, messages: Vec<String>) -> Self {
        let mut buffs = HashMap::new();
        let mut dots = HashMap::new();
        for (name, player) in &state.players {
            if !player.buffs.is_empty() {
                buffs.insert(name.clone(), player.buffs.clone());
            }
            if !player.dots.is_empty() {
                dots.insert(name.clone(), player.dots.clone());
            }
        }
        for (key, monster) in &state.encounters {
            if !monster.buffs.is_empty() {
                buffs.insert(format!("~{key}"), monster.buffs.clone());
            }
            if !monster.dots.is_empty() {
                dots.insert(format!("~{key}"), monster.dots.clone());
            }
        }

        Self {
            players: state.players.clone(),
            monsters: state.encounters.clone(),
            buffs,
            dots,
            messages,
            cooldowns: state.cooldowns.clone(),
        }
    }
}

/// One outbound update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub channel: String,
    pub audience: Audience,
    pub snapshot: StateSnapshot,
}

/// Errors from the transport collaborator. Delivery failures are logged by
/// the session and never halt its next tick.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("relay send failed: {0}")]
    Send(String),
}

/// Fan-out for session updates.
#[async_trait]
pub trait UpdateRelay: Send + Sync {
    async fn deliver(&self, update: SessionUpdate) -> Result<(), RelayError>;
}
