//! Action resolvers.
//!
//! Four mutually exclusive algorithms over one attacker/defender pair:
//! damage, heal, buff-apply, and cleanse. Each validates its preconditions
//! up front, then builds a [`CommandResult`] describing messages and
//! intended adjustments; nothing here mutates session state. The damage
//! pathway also powers DOT ticks and recursively fires on-hit triggers.

use crate::buffs::{aggregate, parse_buff_tokens, parse_cleanse_tokens, Buff, DotEffect, StatChange};
use crate::catalog::{AbilityDef, AbilityInvocation, Catalog, Element, Stat};
use crate::error::EngineError;
use crate::loot::distribute_loot;
use crate::random::RandomSource;
use crate::result::{AdjustKey, AdjustValue, CommandResult};
use crate::state::{CombatantView, SessionState};

/// Upper bound on trigger chains; catalog-defined procs stay shallow, this
/// makes the worst case explicit.
pub const MAX_TRIGGER_DEPTH: u8 = 3;

/// Call-site context for the damage pathway.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveContext {
    /// Triggered sub-actions always hit and never crit.
    pub is_trigger: bool,
    /// Trigger recursion depth.
    pub depth: u8,
    /// Damage already dealt to the defender earlier in this result tree,
    /// not yet committed to state. Keeps nested death checks honest.
    pub defender_hp_offset: i64,
}

impl ResolveContext {
    fn for_trigger(&self, extra_offset: i64) -> Self {
        Self {
            is_trigger: true,
            depth: self.depth + 1,
            defender_hp_offset: self.defender_hp_offset + extra_offset,
        }
    }
}

/// Sum the HP damage a result tree deals to `subject`.
fn damage_dealt_to(result: &CommandResult, subject: &str) -> i64 {
    let mut total = 0;
    for adjustment in &result.adjustments {
        if adjustment.subject == subject
            && adjustment.key == AdjustKey::Stat(Stat::Hp)
            && adjustment.op == crate::result::AdjustOp::Adjust
        {
            if let AdjustValue::Amount(amount) = adjustment.value {
                if amount < 0 {
                    total += -amount;
                }
            }
        }
    }
    for child in &result.triggered {
        total += damage_dealt_to(child, subject);
    }
    total
}

fn check_actor(
    attacker: &CombatantView,
    invocation: &AbilityInvocation<'_>,
) -> Result<(), EngineError> {
    if attacker.is_dead() {
        return Err(EngineError::DeadActor(attacker.name.clone()));
    }
    if !attacker.is_monster && attacker.ap.max(0) < invocation.ap_cost {
        return Err(EngineError::InsufficientAp {
            actor: attacker.name.clone(),
            needed: invocation.ap_cost,
            ability: invocation.ability.name.clone(),
        });
    }
    Ok(())
}

/// Append monster-death bookkeeping to a result: removal from the encounter
/// table, loot rolls for every aggro contributor, exclusive claims.
fn append_monster_death(
    mut result: CommandResult,
    state: &SessionState,
    defender: &CombatantView,
    killer_key: Option<&str>,
    rng: &mut dyn RandomSource,
) -> CommandResult {
    let spawn_key = defender.key.trim_start_matches('~').to_string();
    result = result.with_remove(&defender.key, AdjustKey::Encounter, &spawn_key);

    let Some(monster) = state.encounters.get(&spawn_key) else {
        return result;
    };

    let mut contributors = monster.aggro.contributors();
    if let Some(killer) = killer_key {
        if !contributors.iter().any(|name| name == killer) {
            contributors.push(killer.to_string());
        }
    }

    for drop in distribute_loot(&monster.drops, &contributors, &state.claimed_exclusives, rng) {
        if drop.exclusive {
            result = result.with_add(
                &defender.key,
                AdjustKey::Claims,
                AdjustValue::Id(drop.item_id.clone()),
            );
        }
        result = result.with_add(
            drop.attacker,
            AdjustKey::Items,
            AdjustValue::Item(drop.item_id),
        );
    }

    result
}

/// Resolve a damaging ability against one defender.
pub fn hurt(
    state: &SessionState,
    catalog: &Catalog,
    attacker_key: &str,
    defender_key: &str,
    invocation: &AbilityInvocation<'_>,
    ctx: ResolveContext,
    rng: &mut dyn RandomSource,
) -> Result<CommandResult, EngineError> {
    let ability = invocation.ability;

    if matches!(ability.element, Element::Healing | Element::Buffing) {
        return Err(EngineError::WrongElement {
            ability: ability.name.clone(),
            expected: "an attack",
        });
    }

    let attacker = state.resolve_target(attacker_key)?;
    check_actor(&attacker, invocation)?;

    let defender = state.resolve_target(defender_key)?;
    let effective_hp = defender.hp - ctx.defender_hp_offset;
    if effective_hp <= 0 {
        return Err(EngineError::TargetDead(defender.name.clone()));
    }

    let attacker_buffs = aggregate(&attacker.buffs);
    let defender_buffs = aggregate(&defender.buffs);

    // Each resistance point shaves 5% off incoming damage of this element;
    // negative resistance amplifies. The multiplier floors at zero rather
    // than inverting into healing.
    let resistance = defender.resistances.value(ability.element);
    let factor = (((100 - resistance * 5) as f64) / 100.0).max(0.0);

    let attack_roll = rng.die(20);
    let modified_attack_roll = attack_roll
        + attacker.stat(ability.to_hit_stat)
        + ability.mods.get(ability.to_hit_stat)
        + attacker_buffs.get(ability.to_hit_stat);
    let damage_roll = ability.dmg.resolve(defender.stat(ability.dmg_stat), rng);
    let mut modified_damage = (((damage_roll + attacker.stats.str + ability.mods.str
        + attacker_buffs.str)
        .max(1)) as f64
        * factor)
        .ceil() as i64;
    if ability.ignore_damage_mods {
        modified_damage = damage_roll;
    }

    let defender_ac = defender.total_ac + defender_buffs.ac;
    tracing::debug!(
        attack_roll,
        modified_attack_roll,
        defender_ac,
        damage_roll,
        modified_damage,
        ability = %ability.id,
        "attack resolution"
    );

    let mut hit = true;
    let mut crit = false;
    if attack_roll == 20 && !ctx.is_trigger {
        crit = true;
        modified_damage *= 2;
    } else if attack_roll == 1 {
        hit = false;
    } else if modified_attack_roll >= defender_ac || ctx.is_trigger {
        // Normal hit.
    } else {
        // Glancing hit at half damage, rounded up.
        modified_damage = (modified_damage as f64 * 0.5).ceil() as i64;
    }

    let dead = hit && ability.dmg_stat == Stat::Hp && modified_damage >= effective_hp;

    let mut result = CommandResult::new(&ability.id, &attacker.key, &defender.key)
        .with_adjust(&attacker.key, AdjustKey::Stat(Stat::Ap), -invocation.ap_cost);

    if hit {
        result = result.with_adjust(
            &defender.key,
            AdjustKey::Stat(ability.dmg_stat),
            -modified_damage,
        );

        if defender.is_monster {
            result = result.with_aggro(&defender.key, &attacker.key, modified_damage);
        }

        if ability.proc_time > 0 && !dead {
            result = result.with_add(
                &defender.key,
                AdjustKey::Dots,
                AdjustValue::Dot(DotEffect::from_ability(ability)),
            );
        }

        let source = if ability.name == "attack" {
            attacker.name.clone()
        } else {
            ability.name.clone()
        };
        let quality = if crit { " critical" } else { "" };
        result = result.with_message(format!(
            "{source} dealt {modified_damage} {}{quality} damage to {}.",
            ability.dmg_stat, defender.name
        ));

        if factor > 1.0 {
            result = result.with_message(format!(
                "{} is weak to {}",
                defender.name, ability.element
            ));
        } else if factor < 1.0 {
            result = result.with_message(format!(
                "{} is resistant to {}",
                defender.name, ability.element
            ));
        }
    } else {
        result = result.with_message(format!(
            "{} attacked {} and missed.",
            attacker.name, defender.name
        ));
    }

    if dead {
        if defender.is_monster {
            result = append_monster_death(result, state, &defender, Some(&attacker.key), rng);
        }
        result = result.with_message(format!(
            "{} was slain by {}.",
            defender.name, attacker.name
        ));
    }

    // Secondary abilities proc after a surviving hit.
    if hit && !dead && ctx.depth < MAX_TRIGGER_DEPTH {
        let mut offset = ctx.defender_hp_offset + modified_damage;
        for trigger in &ability.triggers {
            let trigger_roll = rng.die(20);
            if trigger_roll > trigger.chance {
                continue;
            }
            let trigger_ability = match catalog.ability(&trigger.ability_id) {
                Ok(found) => found,
                Err(error) => {
                    tracing::warn!(trigger = %trigger.ability_id, %error, "unknown trigger ability");
                    continue;
                }
            };

            let sub_invocation = AbilityInvocation::free(trigger_ability);
            let outcome = match trigger_ability.element {
                Element::Healing => {
                    heal(state, &attacker.key, &attacker.key, &sub_invocation, rng)
                }
                Element::Buffing => buff_apply(state, &attacker.key, &attacker.key, &sub_invocation),
                _ => hurt(
                    state,
                    catalog,
                    &attacker.key,
                    &defender.key,
                    &sub_invocation,
                    ctx.for_trigger(offset - ctx.defender_hp_offset),
                    rng,
                ),
            };

            match outcome {
                Ok(sub_result) => {
                    offset += damage_dealt_to(&sub_result, &defender.key);
                    result = result
                        .with_message(format!(
                            "{}'s {} activated!",
                            attacker.name, trigger_ability.name
                        ))
                        .with_triggered(sub_result);
                }
                Err(error) => {
                    tracing::warn!(trigger = %trigger.ability_id, %error, "trigger fizzled");
                }
            }
        }
    }

    let battle_line = if hit {
        let end_status = if dead {
            "[DEAD]".to_string()
        } else if ability.dmg_stat == Stat::Hp {
            format!("[{}/{}HP]", effective_hp - modified_damage, defender.max_hp)
        } else {
            format!("[{} lost {}{}]", defender.name, modified_damage, ability.dmg_stat)
        };
        format!(
            "[BATTLE]: {} ==> {} -{}{}  {end_status}",
            attacker.name, defender.name, modified_damage, ability.dmg_stat
        )
    } else {
        format!("[BATTLE]: {} ==> {} MISS", attacker.name, defender.name)
    };

    Ok(result
        .with_message(battle_line)
        .with_hit(hit)
        .with_crit(crit)
        .with_dead(dead))
}

/// Resolve a healing ability on one defender.
pub fn heal(
    state: &SessionState,
    attacker_key: &str,
    defender_key: &str,
    invocation: &AbilityInvocation<'_>,
    rng: &mut dyn RandomSource,
) -> Result<CommandResult, EngineError> {
    let ability = invocation.ability;

    if ability.element != Element::Healing {
        return Err(EngineError::WrongElement {
            ability: ability.name.clone(),
            expected: "a healing",
        });
    }

    let attacker = state.resolve_target(attacker_key)?;
    check_actor(&attacker, invocation)?;
    let defender = state.resolve_target(defender_key)?;

    let mut amount = ability
        .dmg
        .resolve(defender.stat(ability.dmg_stat), rng)
        .max(1);
    if ability.dmg_stat == Stat::Hp {
        // Never heal past the defender's maximum.
        amount = amount.min((defender.max_hp - defender.hp).max(0));
    }

    Ok(CommandResult::new(&ability.id, &attacker.key, &defender.key)
        .with_adjust(&attacker.key, AdjustKey::Stat(Stat::Ap), -invocation.ap_cost)
        .with_adjust(&defender.key, AdjustKey::Stat(ability.dmg_stat), amount)
        .with_message(format!(
            "{} healed {} for {amount} {}",
            ability.name, defender.name, ability.dmg_stat
        )))
}

/// Resolve a buffing ability on one defender. Percentage changes resolve
/// against the defender's current stat at application time; re-applying a
/// buff refreshes its duration instead of stacking a duplicate.
pub fn buff_apply(
    state: &SessionState,
    attacker_key: &str,
    defender_key: &str,
    invocation: &AbilityInvocation<'_>,
) -> Result<CommandResult, EngineError> {
    let ability = invocation.ability;

    if ability.element != Element::Buffing {
        return Err(EngineError::WrongElement {
            ability: ability.name.clone(),
            expected: "a buffing",
        });
    }

    let attacker = state.resolve_target(attacker_key)?;
    check_actor(&attacker, invocation)?;
    let defender = state.resolve_target(defender_key)?;

    let changes: Vec<StatChange> = parse_buff_tokens(&ability.buffs, &ability.id)?
        .into_iter()
        .map(|token| {
            let amount = if token.percent {
                (defender.stat(token.stat) as f64 * token.amount as f64 / 100.0).ceil() as i64
            } else {
                token.amount
            };
            StatChange {
                stat: token.stat,
                amount,
            }
        })
        .collect();

    let mut result = CommandResult::new(&ability.id, &attacker.key, &defender.key).with_add(
        &defender.key,
        AdjustKey::Buffs,
        AdjustValue::Buff(Buff {
            id: ability.id.clone(),
            name: ability.name.clone(),
            duration: ability.buff_duration,
            changes,
        }),
    );

    if !attacker.is_monster {
        result = result.with_adjust(&attacker.key, AdjustKey::Stat(Stat::Ap), -invocation.ap_cost);
    }

    Ok(result.with_message(format!(
        "{} is affected by {}",
        defender.name, ability.name
    )))
}

/// Resolve a cleansing ability on one defender, stripping the named effects
/// from both its buff and DOT lists.
pub fn cleanse(
    state: &SessionState,
    attacker_key: &str,
    defender_key: &str,
    invocation: &AbilityInvocation<'_>,
) -> Result<CommandResult, EngineError> {
    let ability = invocation.ability;

    if ability.element != Element::Cleansing {
        return Err(EngineError::WrongElement {
            ability: ability.name.clone(),
            expected: "a cleansing",
        });
    }

    let attacker = state.resolve_target(attacker_key)?;
    check_actor(&attacker, invocation)?;
    let defender = state.resolve_target(defender_key)?;

    let mut result = CommandResult::new(&ability.id, &attacker.key, &defender.key);
    for effect in parse_cleanse_tokens(&ability.buffs, &ability.id)? {
        result = result
            .with_message(format!("{} is cured of {effect}", defender.name))
            .with_remove(&defender.key, AdjustKey::Buffs, &effect)
            .with_remove(&defender.key, AdjustKey::Dots, &effect);
    }

    if !attacker.is_monster {
        result = result.with_adjust(&attacker.key, AdjustKey::Stat(Stat::Ap), -invocation.ap_cost);
    }

    Ok(result)
}

/// Resolve one damage-over-time proc against its carrier.
///
/// DOT ticks bypass to-hit and crit entirely; they reuse the damage
/// pathway's adjustment mechanism and death handling.
pub fn dot_tick(
    state: &SessionState,
    carrier_key: &str,
    ability: &AbilityDef,
    rng: &mut dyn RandomSource,
) -> Result<CommandResult, EngineError> {
    let carrier = state.resolve_target(carrier_key)?;
    if carrier.is_dead() {
        return Err(EngineError::TargetDead(carrier.name.clone()));
    }

    let damage = ability.dmg.resolve(carrier.stat(ability.dmg_stat), rng);
    let dead = ability.dmg_stat == Stat::Hp && damage >= carrier.hp;

    let mut result = CommandResult::new(&ability.id, &ability.id, &carrier.key)
        .with_adjust(&carrier.key, AdjustKey::Stat(ability.dmg_stat), -damage)
        .with_message(format!(
            "{} took {damage} damage from {}{}",
            carrier.name,
            ability.name,
            if dead { " and died." } else { "." }
        ));

    if dead && carrier.is_monster {
        result = append_monster_death(result, state, &carrier, None, rng);
    }

    Ok(result.with_hit(true).with_dead(dead))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AbilityInvocation;
    use crate::testing::{sample_catalog, sample_player, ScriptedRandom};

    fn battle_state() -> (SessionState, Catalog) {
        let catalog = sample_catalog();
        let mut state = SessionState::new(0);
        state
            .players
            .insert("alice".to_string(), sample_player("alice"));
        state
            .spawn_monster(catalog.monster("RAT").unwrap(), None)
            .unwrap();
        (state, catalog)
    }

    #[test]
    fn test_hurt_rejects_support_elements() {
        let (state, catalog) = battle_state();
        let heal_ability = catalog.ability("HEAL").unwrap();
        let error = hurt(
            &state,
            &catalog,
            "alice",
            "~M1",
            &AbilityInvocation::new(heal_ability),
            ResolveContext::default(),
            &mut ScriptedRandom::empty(),
        )
        .unwrap_err();
        assert!(matches!(error, EngineError::WrongElement { .. }));
    }

    #[test]
    fn test_hurt_insufficient_ap() {
        let (mut state, catalog) = battle_state();
        state.players.get_mut("alice").unwrap().ap = 1;
        let fireball = catalog.ability("FIREBALL").unwrap();
        let error = hurt(
            &state,
            &catalog,
            "alice",
            "~M1",
            &AbilityInvocation::new(fireball),
            ResolveContext::default(),
            &mut ScriptedRandom::empty(),
        )
        .unwrap_err();
        assert!(matches!(error, EngineError::InsufficientAp { .. }));
    }

    #[test]
    fn test_hurt_normal_hit_records_damage_and_aggro() {
        let (state, catalog) = battle_state();
        let slash = catalog.ability("SLASH").unwrap();
        // Attack roll 10 (beats AC 2), damage roll 4; +2 STR = 6.
        let mut rng = ScriptedRandom::dies([10, 4]);
        let result = hurt(
            &state,
            &catalog,
            "alice",
            "~M1",
            &AbilityInvocation::new(slash),
            ResolveContext::default(),
            &mut rng,
        )
        .unwrap();

        assert!(result.flags.hit);
        assert!(!result.flags.crit);
        assert!(!result.flags.dead);
        // AP cost, HP damage, aggro credit.
        assert_eq!(result.adjustments.len(), 3);
        assert_eq!(
            result.adjustments[1].value,
            AdjustValue::Amount(-6),
        );
        assert!(result
            .messages
            .iter()
            .any(|m| m == "Slash dealt 6 HP damage to Giant Rat."));
    }

    #[test]
    fn test_hurt_natural_one_misses() {
        let (state, catalog) = battle_state();
        let slash = catalog.ability("SLASH").unwrap();
        let mut rng = ScriptedRandom::dies([1, 4]);
        let result = hurt(
            &state,
            &catalog,
            "alice",
            "~M1",
            &AbilityInvocation::new(slash),
            ResolveContext::default(),
            &mut rng,
        )
        .unwrap();

        assert!(!result.flags.hit);
        // Only the AP cost is recorded on a miss.
        assert_eq!(result.adjustments.len(), 1);
        assert!(result
            .messages
            .iter()
            .any(|m| m == "alice attacked Giant Rat and missed."));
    }

    #[test]
    fn test_hurt_glancing_hit_halves_rounded_up() {
        let (mut state, catalog) = battle_state();
        state.encounters.get_mut("M1").unwrap().ac = 30;
        let slash = catalog.ability("SLASH").unwrap();
        // Attack roll 10 + HIT 1 = 11 < 30: glancing. Damage 3 + 2 STR = 5,
        // halved and rounded up to 3.
        let mut rng = ScriptedRandom::dies([10, 3]);
        let result = hurt(
            &state,
            &catalog,
            "alice",
            "~M1",
            &AbilityInvocation::new(slash),
            ResolveContext::default(),
            &mut rng,
        )
        .unwrap();

        assert!(result.flags.hit);
        assert_eq!(result.adjustments[1].value, AdjustValue::Amount(-3));
    }

    #[test]
    fn test_heal_clamps_to_deficit() {
        let (mut state, _catalog) = battle_state();
        state.players.get_mut("alice").unwrap().hp = 18;
        let catalog = sample_catalog();
        let heal_ability = catalog.ability("HEAL").unwrap();
        let mut rng = ScriptedRandom::dies([4, 4]);
        let result = heal(
            &state,
            "alice",
            "alice",
            &AbilityInvocation::new(heal_ability),
            &mut rng,
        )
        .unwrap();

        assert_eq!(result.adjustments[1].value, AdjustValue::Amount(2));
    }

    #[test]
    fn test_buff_percent_resolves_against_target_stat() {
        let (state, catalog) = battle_state();
        let mut ability = catalog.ability("WAR_CRY").unwrap().clone();
        ability.buffs = "STR+50%".to_string();
        let result = buff_apply(
            &state,
            "alice",
            "alice",
            &AbilityInvocation::new(&ability),
        )
        .unwrap();

        match &result.adjustments[0].value {
            AdjustValue::Buff(buff) => {
                // 50% of STR 2, rounded up.
                assert_eq!(buff.changes[0].amount, 1);
            }
            other => panic!("expected buff value, got {other:?}"),
        }
    }

    #[test]
    fn test_cleanse_strips_buffs_and_dots() {
        let (state, catalog) = battle_state();
        let cure = catalog.ability("CURE").unwrap();
        let result = cleanse(&state, "alice", "alice", &AbilityInvocation::new(cure)).unwrap();

        let removals: Vec<_> = result
            .adjustments
            .iter()
            .filter(|adjustment| adjustment.op == crate::result::AdjustOp::Remove)
            .collect();
        assert_eq!(removals.len(), 2);
        assert!(result
            .messages
            .iter()
            .any(|m| m == "alice is cured of BURN"));
    }

    #[test]
    fn test_dot_tick_damages_without_to_hit() {
        let (state, catalog) = battle_state();
        let burn = catalog.ability("BURN").unwrap();
        // Only the damage die is consumed: no attack roll.
        let mut rng = ScriptedRandom::dies([3]);
        let result = dot_tick(&state, "~M1", burn, &mut rng).unwrap();

        assert!(result.flags.hit);
        assert_eq!(result.adjustments[0].value, AdjustValue::Amount(-3));
        assert!(result
            .messages
            .iter()
            .any(|m| m == "Giant Rat took 3 damage from Burn."));
    }
}
