//! The per-session tick.
//!
//! Each fixed period the session heartbeat runs one tick: player cooldowns
//! count down, buffs and damage-over-time effects age (DOT damage flows
//! through the same adjustment pathway as attacks), and any monster whose
//! action cooldown has elapsed picks a target and acts through the regular
//! dispatch pipeline. A session with no encounters and no pending timers is
//! simply a cheap no-op tick.

use crate::applicator::{apply, apply_all};
use crate::buffs::{aggregate, DotEffect};
use crate::catalog::{Area, Catalog, Element, TargetClass};
use crate::dispatcher;
use crate::random::RandomSource;
use crate::state::{action_cooldown, SessionState, MONSTER_SIGIL};

/// Counts of what one tick did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub expired_cooldowns: usize,
    pub expired_buffs: usize,
    pub dot_procs: usize,
    pub monster_actions: usize,
}

/// Advance one session by one tick.
pub fn run_tick(
    state: &mut SessionState,
    catalog: &Catalog,
    rng: &mut dyn RandomSource,
) -> TickSummary {
    let mut summary = TickSummary::default();
    tick_cooldowns(state, &mut summary);
    age_buffs(state, &mut summary);
    age_dots(state, catalog, rng, &mut summary);
    run_monsters(state, catalog, rng, &mut summary);
    summary
}

fn tick_cooldowns(state: &mut SessionState, summary: &mut TickSummary) {
    let mut expired: Vec<String> = Vec::new();
    for (name, remaining) in state.cooldowns.iter_mut() {
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            expired.push(name.clone());
        }
    }
    expired.sort();
    for name in expired {
        state.cooldowns.remove(&name);
        state.say(format!("{name} can act again."));
        summary.expired_cooldowns += 1;
    }
}

/// Combatant keys in processing order: players (sorted), then monsters in
/// spawn order.
fn combatant_keys(state: &SessionState) -> Vec<String> {
    let mut keys: Vec<String> = state.players.keys().cloned().collect();
    keys.sort();
    let mut monster_keys: Vec<(u64, String)> = state
        .encounters
        .values()
        .map(|monster| (monster.serial, format!("{MONSTER_SIGIL}{}", monster.spawn_key)))
        .collect();
    monster_keys.sort();
    keys.extend(monster_keys.into_iter().map(|(_, key)| key));
    keys
}

fn age_buffs(state: &mut SessionState, summary: &mut TickSummary) {
    let mut messages: Vec<String> = Vec::new();

    for key in combatant_keys(state) {
        let (owner, buffs) = if let Some(spawn_key) = key.strip_prefix(MONSTER_SIGIL) {
            match state.encounters.get_mut(spawn_key) {
                Some(monster) => (monster.name.clone(), &mut monster.buffs),
                None => continue,
            }
        } else {
            match state.players.get_mut(&key) {
                Some(player) => (player.name.clone(), &mut player.buffs),
                None => continue,
            }
        };

        for buff in buffs.iter_mut() {
            buff.duration = buff.duration.saturating_sub(1);
            if buff.duration == 0 {
                messages.push(format!("{owner}'s {} buff has worn off.", buff.name));
            }
        }
        let before = buffs.len();
        buffs.retain(|buff| buff.duration > 0);
        summary.expired_buffs += before - buffs.len();
    }

    for message in messages {
        state.say(message);
    }
}

fn dots_mut<'a>(state: &'a mut SessionState, key: &str) -> Option<&'a mut Vec<DotEffect>> {
    if let Some(spawn_key) = key.strip_prefix(MONSTER_SIGIL) {
        state.encounters.get_mut(spawn_key).map(|m| &mut m.dots)
    } else {
        state.players.get_mut(key).map(|p| &mut p.dots)
    }
}

fn age_dots(
    state: &mut SessionState,
    catalog: &Catalog,
    rng: &mut dyn RandomSource,
    summary: &mut TickSummary,
) {
    for key in combatant_keys(state) {
        // Count down and note which effects fire this tick.
        let fired: Vec<String> = match dots_mut(state, &key) {
            Some(dots) => {
                let mut fired = Vec::new();
                for dot in dots.iter_mut() {
                    dot.tick_counter = dot.tick_counter.saturating_sub(1);
                    if dot.tick_counter == 0 {
                        fired.push(dot.ability_id.clone());
                    }
                }
                fired
            }
            None => continue,
        };

        for ability_id in fired {
            let Ok(ability) = catalog.ability(&ability_id) else {
                tracing::warn!(dot = %ability_id, "dot references unknown ability, dropping");
                if let Some(dots) = dots_mut(state, &key) {
                    dots.retain(|dot| dot.ability_id != ability_id);
                }
                continue;
            };
            let proc_time = ability.proc_time;

            let carrier_name = match state.resolve_target(&key) {
                Ok(view) if !view.is_dead() => view.name,
                // Dead or vanished carriers shed the effect without a proc.
                _ => {
                    if let Some(dots) = dots_mut(state, &key) {
                        dots.retain(|dot| dot.ability_id != ability_id);
                    }
                    continue;
                }
            };

            let died = match crate::resolver::dot_tick(state, &key, ability, rng) {
                Ok(result) => {
                    let died = result.flags.dead;
                    apply(state, &result);
                    summary.dot_procs += 1;
                    died
                }
                Err(error) => {
                    tracing::warn!(carrier = %key, dot = %ability_id, %error, "dot proc failed");
                    true
                }
            };

            let mut worn_off = false;
            if let Some(dots) = dots_mut(state, &key) {
                if let Some(dot) = dots.iter_mut().find(|dot| dot.ability_id == ability_id) {
                    dot.tick_counter = proc_time;
                    dot.cycles_remaining = if died {
                        0
                    } else {
                        dot.cycles_remaining.saturating_sub(1)
                    };
                    worn_off = !died && dot.cycles_remaining == 0;
                }
                dots.retain(|dot| dot.cycles_remaining > 0);
            }
            if worn_off {
                state.say(format!(
                    "{carrier_name}'s {} status has worn off.",
                    ability.name
                ));
            }
        }
    }
}

fn run_monsters(
    state: &mut SessionState,
    catalog: &Catalog,
    rng: &mut dyn RandomSource,
    summary: &mut TickSummary,
) {
    for spawn_key in state.live_monster_keys() {
        // Re-check: an earlier monster's area ability may have removed it.
        let Some(monster) = state.encounters.get(&spawn_key) else {
            continue;
        };

        if monster.tick > 0 {
            if let Some(monster) = state.encounters.get_mut(&spawn_key) {
                monster.tick -= 1;
            }
            continue;
        }

        let monster_name = monster.name.clone();
        let actions = monster.actions.clone();
        let dex_total = monster.stats.dex + aggregate(&monster.buffs).dex;

        // Highest live-player aggro wins, ties to the earlier attacker.
        let mut target: Option<String> = None;
        let mut best = i64::MIN;
        for (attacker, threat) in monster.aggro.entries() {
            let alive = state
                .players
                .get(attacker)
                .map(|player| player.hp > 0)
                .unwrap_or(false);
            if alive && *threat > best {
                best = *threat;
                target = Some(attacker.clone());
            }
        }

        if let Some(monster) = state.encounters.get_mut(&spawn_key) {
            monster.tick = action_cooldown(dex_total);
        }

        if target.is_none() {
            let live = state.live_player_names();
            if !live.is_empty() {
                target = Some(live[rng.pick(live.len())].clone());
            }
        }
        // No eligible target: sit out this tick (the cooldown was rearmed).
        let Some(target) = target else {
            continue;
        };

        let monster_key = format!("{MONSTER_SIGIL}{spawn_key}");
        let total_chance: i64 = actions.iter().map(|action| action.chance).sum();
        let mut chosen: Option<String> = None;
        if total_chance > 0 {
            let roll = rng.die(100);
            let mut lower = 0;
            for action in &actions {
                let upper = lower + action.chance;
                if roll > lower && roll <= upper {
                    chosen = Some(action.ability_id.clone());
                    break;
                }
                lower = upper;
            }
        }

        let outcome = match chosen.as_deref().and_then(|id| catalog.ability(id).ok()) {
            Some(ability) => {
                let invocation = crate::catalog::AbilityInvocation::new(ability);
                match (ability.area, ability.target) {
                    (Area::One, TargetClass::Enemy) => {
                        state.say(format!("{monster_name} uses {}", ability.name));
                        dispatcher::use_ability(
                            state,
                            catalog,
                            &monster_key,
                            Some(&target),
                            &invocation,
                            rng,
                        )
                    }
                    (Area::One, TargetClass::Friendly) => {
                        if ability.element == Element::Healing {
                            // Patch up the ally lowest on HP, self included.
                            let ally = state
                                .encounters
                                .values()
                                .filter(|other| other.hp > 0)
                                .min_by_key(|other| (other.hp, other.serial))
                                .map(|other| format!("{MONSTER_SIGIL}{}", other.spawn_key));
                            match ally {
                                Some(ally) => {
                                    state.say(format!("{monster_name} uses {}", ability.name));
                                    dispatcher::use_ability(
                                        state,
                                        catalog,
                                        &monster_key,
                                        Some(&ally),
                                        &invocation,
                                        rng,
                                    )
                                }
                                None => Ok(Vec::new()),
                            }
                        } else {
                            // No AI for friendly one-target cleanses/buffs.
                            Ok(Vec::new())
                        }
                    }
                    (Area::All, _) => {
                        state.say(format!("{monster_name} uses {}", ability.name));
                        dispatcher::use_ability(state, catalog, &monster_key, None, &invocation, rng)
                    }
                }
            }
            None => dispatcher::attack(state, catalog, &monster_key, &target, rng),
        };

        match outcome {
            Ok(results) => {
                if !results.is_empty() {
                    apply_all(state, &results);
                    summary.monster_actions += 1;
                }
            }
            Err(error) => {
                tracing::warn!(monster = %spawn_key, %error, "monster action failed");
            }
        }
    }
}
