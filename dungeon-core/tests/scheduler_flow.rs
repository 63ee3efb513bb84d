//! End-to-end rounds through the scheduler: player action, monster
//! retaliation along aggro, DOT lifecycles, and weighted AI action
//! selection, with scripted dice throughout.

use dungeon_core::applicator::apply_all;
use dungeon_core::catalog::AbilityInvocation;
use dungeon_core::dispatcher;
use dungeon_core::scheduler::run_tick;
use dungeon_core::state::SessionState;
use dungeon_core::testing::{sample_catalog, sample_player, ScriptedRandom};
use dungeon_core::Catalog;

fn battle_state() -> (SessionState, Catalog) {
    let catalog = sample_catalog();
    let mut state = SessionState::new(0);
    state
        .players
        .insert("alice".to_string(), sample_player("alice"));
    (state, catalog)
}

#[test]
fn full_round_attack_then_retaliation() {
    let (mut state, catalog) = battle_state();
    state
        .spawn_monster(catalog.monster("RAT").unwrap(), None)
        .unwrap();

    // Alice slashes: attack roll 10, damage die 4 (+2 STR = 6).
    let slash = catalog.ability("SLASH").unwrap();
    let mut rng = ScriptedRandom::dies([10, 4]);
    let results = dispatcher::use_ability(
        &state,
        &catalog,
        "alice",
        Some("~M1"),
        &AbilityInvocation::new(slash),
        &mut rng,
    )
    .unwrap();
    apply_all(&mut state, &results);

    assert_eq!(state.encounters["M1"].hp, 4);
    assert_eq!(state.encounters["M1"].aggro.value("alice"), 6);
    assert_eq!(state.players["alice"].ap, 9);

    // Fast-forward the rat's cooldown; on its tick it strikes back at its
    // only aggro holder.
    state.encounters.get_mut("M1").unwrap().tick = 0;
    let mut rng = ScriptedRandom::dies([12, 3]);
    let summary = run_tick(&mut state, &catalog, &mut rng);

    assert_eq!(summary.monster_actions, 1);
    // 3 damage + 1 STR.
    assert_eq!(state.players["alice"].hp, 16);
    assert!(state
        .transcript
        .iter()
        .any(|m| m.contains("Giant Rat ==> alice")));
}

#[test]
fn dot_lifecycle_from_ability_to_expiry() {
    let (mut state, catalog) = battle_state();
    state
        .spawn_monster(catalog.monster("RAT").unwrap(), None)
        .unwrap();
    // Park the rat so only the DOT acts.
    state.encounters.get_mut("M1").unwrap().tick = 99;

    // Burn hits and plants its DOT (proc_time 2, max_procs 2).
    let burn = catalog.ability("BURN").unwrap();
    let mut rng = ScriptedRandom::dies([10, 2]);
    let results = dispatcher::use_ability(
        &state,
        &catalog,
        "alice",
        Some("~M1"),
        &AbilityInvocation::new(burn),
        &mut rng,
    )
    .unwrap();
    apply_all(&mut state, &results);

    let hp_after_hit = state.encounters["M1"].hp;
    assert_eq!(state.encounters["M1"].dots.len(), 1);

    // Tick 1: counter 2 -> 1, no proc.
    run_tick(&mut state, &catalog, &mut ScriptedRandom::empty());
    assert_eq!(state.encounters["M1"].hp, hp_after_hit);

    // Tick 2: proc fires for 2, cycle 1 left.
    let mut rng = ScriptedRandom::dies([2]);
    run_tick(&mut state, &catalog, &mut rng);
    assert_eq!(state.encounters["M1"].hp, hp_after_hit - 2);
    assert_eq!(state.encounters["M1"].dots[0].cycles_remaining, 1);

    // Ticks 3-4: final proc, effect removed on the tick it expires.
    run_tick(&mut state, &catalog, &mut ScriptedRandom::empty());
    let mut rng = ScriptedRandom::dies([1]);
    run_tick(&mut state, &catalog, &mut rng);

    assert!(state.encounters["M1"].dots.is_empty());
    assert_eq!(
        state
            .transcript
            .iter()
            .filter(|m| m.contains("Burn status has worn off"))
            .count(),
        1
    );
}

#[test]
fn weighted_action_roll_selects_ability_or_basic_attack() {
    let (mut state, catalog) = battle_state();
    state
        .spawn_monster(catalog.monster("GOBLIN_KING").unwrap(), None)
        .unwrap();
    {
        let monster = state.encounters.get_mut("B1").unwrap();
        monster.tick = 0;
        monster.aggro.add("alice", 9);
    }

    // d100 roll 10 lands inside Fireball's 30-point range; the spell then
    // rolls to-hit 12 and 2d6 damage (3 + 4 + 3 STR = 10).
    let mut rng = ScriptedRandom::dies([10, 12, 3, 4]);
    run_tick(&mut state, &catalog, &mut rng);

    assert!(state
        .transcript
        .iter()
        .any(|m| m == "Goblin King uses Fireball"));
    assert_eq!(state.players["alice"].hp, 10);

    // Next action: d100 roll 50 falls past the table, so the king swings
    // its 1d8 hand weapon instead.
    state.encounters.get_mut("B1").unwrap().tick = 0;
    let mut rng = ScriptedRandom::dies([50, 10, 4]);
    run_tick(&mut state, &catalog, &mut rng);

    assert!(state
        .transcript
        .iter()
        .any(|m| m.contains("Goblin King ==> alice")));
    // 4 + 3 STR = 7 more damage.
    assert_eq!(state.players["alice"].hp, 3);
}

#[test]
fn monster_heals_its_lowest_hp_ally() {
    let (mut state, catalog) = battle_state();
    let mut healer_def = catalog.monster("GOBLIN_KING").unwrap().clone();
    healer_def.actions = vec![dungeon_core::catalog::MonsterActionDef {
        ability_id: "HEAL".to_string(),
        chance: 100,
    }];
    let mut catalog = catalog;
    catalog
        .monsters
        .insert("GOBLIN_SHAMAN".to_string(), {
            let mut def = healer_def.clone();
            def.id = "GOBLIN_SHAMAN".into();
            def.name = "Goblin Shaman".into();
            def
        });

    state
        .spawn_monster(catalog.monster("RAT").unwrap(), None)
        .unwrap();
    state
        .spawn_monster(catalog.monster("GOBLIN_SHAMAN").unwrap(), None)
        .unwrap();
    {
        let rat = state.encounters.get_mut("M1").unwrap();
        rat.tick = 99;
        rat.hp = 3; // wounded: the heal should land here
    }
    {
        let shaman = state.encounters.get_mut("B1").unwrap();
        shaman.tick = 0;
        shaman.aggro.add("alice", 1);
    }

    // d100 roll 40 picks HEAL; healing dice 2d4 = 3 + 2.
    let mut rng = ScriptedRandom::dies([40, 3, 2]);
    run_tick(&mut state, &catalog, &mut rng);

    assert!(state
        .transcript
        .iter()
        .any(|m| m == "Goblin Shaman uses Heal"));
    assert_eq!(state.encounters["M1"].hp, 8);
}

#[test]
fn idle_session_tick_is_a_no_op() {
    let (mut state, catalog) = battle_state();
    let summary = run_tick(&mut state, &catalog, &mut ScriptedRandom::empty());
    assert_eq!(summary, dungeon_core::TickSummary::default());
    assert!(state.transcript.is_empty());
}
