//! Result application.
//!
//! Walks a [`CommandResult`] and commits its adjustments against session
//! state, then flushes its messages onto the transcript, then recurses into
//! triggered results. Callers rely on the ordering (adjustments before
//! transcript flush, parent before child) for deterministic replay. Uses an
//! explicit worklist rather than recursion.

use crate::catalog::Stat;
use crate::result::{AdjustKey, AdjustOp, AdjustValue, Adjustment, CommandResult};
use crate::state::{Monster, Player, SessionState, MONSTER_SIGIL};

/// Apply a result tree to session state, depth-first.
pub fn apply(state: &mut SessionState, result: &CommandResult) {
    let mut stack: Vec<&CommandResult> = vec![result];
    while let Some(node) = stack.pop() {
        for adjustment in &node.adjustments {
            apply_adjustment(state, adjustment);
        }
        for message in &node.messages {
            state.say(message.clone());
        }
        for child in node.triggered.iter().rev() {
            stack.push(child);
        }
    }
}

/// Apply every result in order.
pub fn apply_all(state: &mut SessionState, results: &[CommandResult]) {
    for result in results {
        apply(state, result);
    }
}

fn monster_key(subject: &str) -> Option<String> {
    subject
        .strip_prefix(MONSTER_SIGIL)
        .map(|rest| rest.to_uppercase())
}

fn apply_adjustment(state: &mut SessionState, adjustment: &Adjustment) {
    match (adjustment.key, adjustment.op) {
        (AdjustKey::Encounter, AdjustOp::Remove) => {
            if let AdjustValue::Id(spawn_key) = &adjustment.value {
                // Idempotent: a monster dies at most once even when several
                // damage sources drop it in the same tick.
                state.encounters.remove(&spawn_key.to_uppercase());
            }
        }
        (AdjustKey::Claims, AdjustOp::Add) => {
            if let AdjustValue::Id(item_id) = &adjustment.value {
                state.claimed_exclusives.insert(item_id.clone());
            }
        }
        (AdjustKey::Aggro, AdjustOp::Adjust) => {
            if let AdjustValue::AggroCredit { attacker, amount } = &adjustment.value {
                if let Some(monster) = lookup_monster(state, &adjustment.subject) {
                    if monster.hp > 0 {
                        monster.aggro.add(attacker, *amount);
                    }
                }
            }
        }
        (AdjustKey::Stat(stat), AdjustOp::Adjust) => {
            if let AdjustValue::Amount(amount) = adjustment.value {
                apply_stat(state, &adjustment.subject, stat, amount);
            }
        }
        (AdjustKey::Items, AdjustOp::Add) => {
            if let AdjustValue::Item(item_id) = &adjustment.value {
                if let Some(player) = state.players.get_mut(&adjustment.subject) {
                    player.inventory.push(item_id.clone());
                }
            }
        }
        (AdjustKey::Buffs, AdjustOp::Add) => {
            if let AdjustValue::Buff(buff) = &adjustment.value {
                if let Some(buffs) = collection(state, &adjustment.subject, |p| &mut p.buffs, |m| {
                    &mut m.buffs
                }) {
                    match buffs.iter_mut().find(|existing| existing.id == buff.id) {
                        // Re-application refreshes duration, never stacks.
                        Some(existing) => existing.duration = buff.duration,
                        None => buffs.push(buff.clone()),
                    }
                }
            }
        }
        (AdjustKey::Buffs, AdjustOp::Remove) => {
            if let AdjustValue::Id(id) = &adjustment.value {
                if let Some(buffs) = collection(state, &adjustment.subject, |p| &mut p.buffs, |m| {
                    &mut m.buffs
                }) {
                    buffs.retain(|buff| buff.id != *id);
                }
            }
        }
        (AdjustKey::Dots, AdjustOp::Add) => {
            if let AdjustValue::Dot(dot) = &adjustment.value {
                if let Some(dots) = collection(state, &adjustment.subject, |p| &mut p.dots, |m| {
                    &mut m.dots
                }) {
                    match dots
                        .iter_mut()
                        .find(|existing| existing.ability_id == dot.ability_id)
                    {
                        // An existing effect gets its cycles reset instead
                        // of a duplicate entry.
                        Some(existing) => existing.cycles_remaining = dot.cycles_remaining,
                        None => dots.push(dot.clone()),
                    }
                }
            }
        }
        (AdjustKey::Dots, AdjustOp::Remove) => {
            if let AdjustValue::Id(id) = &adjustment.value {
                if let Some(dots) = collection(state, &adjustment.subject, |p| &mut p.dots, |m| {
                    &mut m.dots
                }) {
                    dots.retain(|dot| dot.ability_id != *id);
                }
            }
        }
        _ => {
            tracing::warn!(?adjustment, "unsupported adjustment shape ignored");
        }
    }
}

fn lookup_monster<'a>(state: &'a mut SessionState, subject: &str) -> Option<&'a mut Monster> {
    let key = monster_key(subject)?;
    state.encounters.get_mut(&key)
}

fn collection<'a, T>(
    state: &'a mut SessionState,
    subject: &str,
    from_player: impl FnOnce(&'a mut Player) -> &'a mut Vec<T>,
    from_monster: impl FnOnce(&'a mut Monster) -> &'a mut Vec<T>,
) -> Option<&'a mut Vec<T>> {
    if let Some(key) = monster_key(subject) {
        state.encounters.get_mut(&key).map(from_monster)
    } else {
        state.players.get_mut(subject).map(from_player)
    }
}

fn apply_stat(state: &mut SessionState, subject: &str, stat: Stat, amount: i64) {
    if let Some(key) = monster_key(subject) {
        let Some(monster) = state.encounters.get_mut(&key) else {
            return;
        };
        match stat {
            Stat::Hp => {
                monster.hp = (monster.hp + amount).min(monster.max_hp);
            }
            // AP adjustments against monsters are recorded but never
            // functionally consumed.
            Stat::Ap => {}
            Stat::Str => monster.stats.str += amount,
            Stat::Dex => monster.stats.dex += amount,
            Stat::Int => monster.stats.int += amount,
            Stat::Hit => monster.stats.hit += amount,
            Stat::Ac => monster.ac += amount,
        }
    } else {
        let Some(player) = state.players.get_mut(subject) else {
            return;
        };
        match stat {
            Stat::Hp => {
                player.hp = (player.hp + amount).min(player.max_hp);
            }
            Stat::Ap => player.ap += amount,
            Stat::Str => player.stats.str += amount,
            Stat::Dex => player.stats.dex += amount,
            Stat::Int => player.stats.int += amount,
            Stat::Hit => player.stats.hit += amount,
            Stat::Ac => player.total_ac += amount,
        }
    }
}
