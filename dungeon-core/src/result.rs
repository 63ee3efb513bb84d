//! Combat command results.
//!
//! Resolvers never touch shared state; they describe what happened as an
//! ordered list of adjustments plus human-readable messages, and the
//! applicator commits the description. Triggered procs nest as child
//! results, applied depth-first after their parent.

use crate::buffs::{Buff, DotEffect};
use crate::catalog::Stat;
use serde::{Deserialize, Serialize};

/// How an adjustment changes its target collection or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustOp {
    /// Add a numeric delta to a field.
    Adjust,
    /// Append a value to an ordered collection.
    Add,
    /// Filter a collection, dropping entries matching an id.
    Remove,
}

/// What an adjustment targets on its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustKey {
    Stat(Stat),
    Items,
    Buffs,
    Dots,
    /// Threat credit on a monster's aggro table.
    Aggro,
    /// The subject's entry in the encounter table (monster death).
    Encounter,
    /// The session's claimed-exclusive-drop set.
    Claims,
}

/// The payload of an adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustValue {
    Amount(i64),
    Buff(Buff),
    Dot(DotEffect),
    /// An item id being granted.
    Item(String),
    /// An id naming what to remove or claim.
    Id(String),
    /// Threat credited to an attacker.
    AggroCredit { attacker: String, amount: i64 },
}

/// One intended state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Combatant key the change applies to (player name or `~SPAWNKEY`).
    pub subject: String,
    pub op: AdjustOp,
    pub key: AdjustKey,
    pub value: AdjustValue,
}

/// Outcome flags for a resolved action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultFlags {
    pub hit: bool,
    pub crit: bool,
    pub dead: bool,
}

/// The immutable output of one resolver call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandResult {
    /// Ability or action identifier.
    pub action: String,
    pub actor: String,
    pub target: String,
    pub flags: ResultFlags,
    pub adjustments: Vec<Adjustment>,
    pub messages: Vec<String>,
    /// Results of secondary abilities fired by this one.
    pub triggered: Vec<CommandResult>,
}

impl CommandResult {
    pub fn new(
        action: impl Into<String>,
        actor: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            actor: actor.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_adjust(mut self, subject: impl Into<String>, key: AdjustKey, amount: i64) -> Self {
        self.adjustments.push(Adjustment {
            subject: subject.into(),
            op: AdjustOp::Adjust,
            key,
            value: AdjustValue::Amount(amount),
        });
        self
    }

    pub fn with_add(
        mut self,
        subject: impl Into<String>,
        key: AdjustKey,
        value: AdjustValue,
    ) -> Self {
        self.adjustments.push(Adjustment {
            subject: subject.into(),
            op: AdjustOp::Add,
            key,
            value,
        });
        self
    }

    pub fn with_remove(
        mut self,
        subject: impl Into<String>,
        key: AdjustKey,
        id: impl Into<String>,
    ) -> Self {
        self.adjustments.push(Adjustment {
            subject: subject.into(),
            op: AdjustOp::Remove,
            key,
            value: AdjustValue::Id(id.into()),
        });
        self
    }

    pub fn with_aggro(
        mut self,
        subject: impl Into<String>,
        attacker: impl Into<String>,
        amount: i64,
    ) -> Self {
        self.adjustments.push(Adjustment {
            subject: subject.into(),
            op: AdjustOp::Adjust,
            key: AdjustKey::Aggro,
            value: AdjustValue::AggroCredit {
                attacker: attacker.into(),
                amount,
            },
        });
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn with_triggered(mut self, result: CommandResult) -> Self {
        self.triggered.push(result);
        self
    }

    pub fn with_hit(mut self, hit: bool) -> Self {
        self.flags.hit = hit;
        self
    }

    pub fn with_crit(mut self, crit: bool) -> Self {
        self.flags.crit = crit;
        self
    }

    pub fn with_dead(mut self, dead: bool) -> Self {
        self.flags.dead = dead;
        self
    }
}
