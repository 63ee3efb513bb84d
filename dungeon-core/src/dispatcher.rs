//! Ability dispatch.
//!
//! Expands one ability invocation into resolver calls: figures out the
//! effective target set from the ability's area and target class, routes
//! each target to the right resolver by element, and collects the results.
//! Targets in an area dispatch resolve independently; one failing never
//! rolls back or blocks the others.

use crate::catalog::{AbilityDef, AbilityInvocation, Area, Catalog, Element, TargetClass};
use crate::error::EngineError;
use crate::random::RandomSource;
use crate::resolver::{self, ResolveContext};
use crate::result::CommandResult;
use crate::state::{SessionState, MONSTER_SIGIL};

fn resolve_one(
    state: &SessionState,
    catalog: &Catalog,
    attacker_key: &str,
    target_key: &str,
    invocation: &AbilityInvocation<'_>,
    rng: &mut dyn RandomSource,
) -> Result<CommandResult, EngineError> {
    match invocation.ability.element {
        Element::Healing => resolver::heal(state, attacker_key, target_key, invocation, rng),
        Element::Buffing => resolver::buff_apply(state, attacker_key, target_key, invocation),
        Element::Cleansing => resolver::cleanse(state, attacker_key, target_key, invocation),
        _ => resolver::hurt(
            state,
            catalog,
            attacker_key,
            target_key,
            invocation,
            ResolveContext::default(),
            rng,
        ),
    }
}

/// Dispatch an ability invocation, resolving its effective target set.
pub fn use_ability(
    state: &SessionState,
    catalog: &Catalog,
    attacker_key: &str,
    defender_key: Option<&str>,
    invocation: &AbilityInvocation<'_>,
    rng: &mut dyn RandomSource,
) -> Result<Vec<CommandResult>, EngineError> {
    let ability = invocation.ability;
    let attacker = state.resolve_target(attacker_key)?;

    let targets: Vec<String> = match (defender_key, ability.area, ability.target) {
        (Some(_), Area::All, _) => {
            return Err(EngineError::AreaMismatch(ability.name.clone()));
        }
        (Some(defender), Area::One, _) => vec![defender.to_string()],
        (None, Area::One, TargetClass::Friendly) => vec![attacker.key.clone()],
        (None, Area::One, TargetClass::Enemy) => {
            return Err(EngineError::TargetRequired(ability.name.clone()));
        }
        (None, Area::All, class) => {
            let wants_monsters = (class == TargetClass::Enemy) != attacker.is_monster;
            if wants_monsters {
                state
                    .live_monster_keys()
                    .into_iter()
                    .map(|key| format!("{MONSTER_SIGIL}{key}"))
                    .collect()
            } else {
                state.live_player_names()
            }
        }
    };

    let mut results = Vec::new();
    for target in &targets {
        match resolve_one(state, catalog, &attacker.key, target, invocation, rng) {
            Ok(result) => results.push(result),
            Err(error) if ability.area == Area::One => return Err(error),
            Err(error) => {
                tracing::warn!(target = %target, ability = %ability.id, %error, "area target skipped");
            }
        }
    }

    Ok(results)
}

/// Resolve a basic attack with the attacker's equipped weapon (or bare
/// hands). Costs 1 AP and carries the weapon's triggers.
pub fn attack(
    state: &SessionState,
    catalog: &Catalog,
    attacker_key: &str,
    defender_key: &str,
    rng: &mut dyn RandomSource,
) -> Result<Vec<CommandResult>, EngineError> {
    let attacker = state.resolve_target(attacker_key)?;
    let weapon = attacker.weapon;

    let ability = AbilityDef {
        id: "ATTACK".to_string(),
        name: "attack".to_string(),
        element: Element::None,
        target: TargetClass::Enemy,
        area: Area::One,
        ap: 1,
        dmg: weapon.dmg,
        dmg_stat: weapon.dmg_stat,
        to_hit_stat: weapon.to_hit_stat,
        triggers: weapon.triggers,
        ..Default::default()
    };
    let invocation = AbilityInvocation::new(&ability);

    let result = resolver::hurt(
        state,
        catalog,
        attacker_key,
        defender_key,
        &invocation,
        ResolveContext::default(),
        rng,
    )?;
    Ok(vec![result])
}
