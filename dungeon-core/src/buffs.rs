//! Timed stat modifiers and damage-over-time effects.
//!
//! Buffs and DOTs live on the combatant that carries them and age once per
//! scheduler tick. [`aggregate`] folds a combatant's active buffs into a
//! single delta per stat; every resolver consults that fold rather than the
//! buff list itself.

use crate::catalog::{AbilityDef, Stat};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// One stat delta inside a buff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatChange {
    pub stat: Stat,
    pub amount: i64,
}

/// An active timed stat modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buff {
    /// Id of the ability that applied this buff; re-application refreshes
    /// duration instead of stacking.
    pub id: String,
    pub name: String,
    /// Ticks remaining; removed at zero.
    pub duration: u32,
    pub changes: Vec<StatChange>,
}

/// An active damage-over-time effect. References its ability by id only;
/// the formula and proc parameters are read from the catalog at fire time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DotEffect {
    pub ability_id: String,
    pub name: String,
    /// Ticks until the next proc.
    pub tick_counter: u32,
    /// Procs left; removed at zero or when the carrier is defeated.
    pub cycles_remaining: u32,
}

impl DotEffect {
    /// Build a fresh effect from its ability.
    pub fn from_ability(ability: &AbilityDef) -> Self {
        Self {
            ability_id: ability.id.clone(),
            name: ability.name.clone(),
            tick_counter: ability.proc_time,
            cycles_remaining: ability.max_procs,
        }
    }
}

/// The folded stat deltas of a combatant's active buffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuffTotals {
    pub str: i64,
    pub dex: i64,
    pub int: i64,
    pub hit: i64,
    pub ac: i64,
}

impl BuffTotals {
    pub fn get(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Str => self.str,
            Stat::Dex => self.dex,
            Stat::Int => self.int,
            Stat::Hit => self.hit,
            Stat::Ac => self.ac,
            Stat::Hp | Stat::Ap => 0,
        }
    }
}

/// Fold every change across all active buffs into one delta map.
pub fn aggregate(buffs: &[Buff]) -> BuffTotals {
    let mut totals = BuffTotals::default();
    for buff in buffs {
        for change in &buff.changes {
            match change.stat {
                Stat::Str => totals.str += change.amount,
                Stat::Dex => totals.dex += change.amount,
                Stat::Int => totals.int += change.amount,
                Stat::Hit => totals.hit += change.amount,
                Stat::Ac => totals.ac += change.amount,
                Stat::Hp | Stat::Ap => {}
            }
        }
    }
    totals
}

/// A parsed token of a buffing ability's effect string, before percentage
/// amounts are resolved against the target's current stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuffToken {
    pub stat: Stat,
    pub amount: i64,
    pub percent: bool,
}

/// Parse a buff-effect string such as `"STR+2;DEX-1;AC+10%"`.
pub fn parse_buff_tokens(spec: &str, ability_id: &str) -> Result<Vec<BuffToken>, EngineError> {
    let bad = || EngineError::BadBuffSpec(ability_id.to_string());
    let mut tokens = Vec::new();

    for raw in spec.split(';') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (body, percent) = match raw.strip_suffix('%') {
            Some(body) => (body, true),
            None => (raw, false),
        };

        let split_at = body
            .find(|c: char| c == '+' || c == '-')
            .ok_or_else(bad)?;
        let stat = Stat::parse(&body[..split_at]).ok_or_else(bad)?;
        let mut amount_str = &body[split_at..];
        if let Some(rest) = amount_str.strip_prefix('+') {
            amount_str = rest;
        }
        let amount: i64 = amount_str.parse().map_err(|_| bad())?;

        tokens.push(BuffToken {
            stat,
            amount,
            percent,
        });
    }

    if tokens.is_empty() {
        return Err(bad());
    }
    Ok(tokens)
}

/// Parse a cleansing ability's effect string, a `;`-separated list of
/// `-EFFECTID` tokens naming the buffs and DOTs to strip.
pub fn parse_cleanse_tokens(spec: &str, ability_id: &str) -> Result<Vec<String>, EngineError> {
    let bad = || EngineError::BadCleanseSpec(ability_id.to_string());
    let mut effects = Vec::new();

    for raw in spec.split(';') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let id = raw.strip_prefix('-').ok_or_else(bad)?;
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(bad());
        }
        effects.push(id.to_uppercase());
    }

    if effects.is_empty() {
        return Err(bad());
    }
    Ok(effects)
}
