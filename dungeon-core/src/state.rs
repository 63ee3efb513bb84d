//! Per-session combat state.
//!
//! One [`SessionState`] is owned by exactly one session task; every mutation
//! goes through the result applicator so a transcript of adjustments can
//! rebuild the same state. Cross-references (aggro, DOT sources) are plain
//! key lookups into the session-owned tables, never embedded references.

use crate::buffs::{Buff, DotEffect};
use crate::catalog::{
    Catalog, CoreStats, DropDef, ItemType, MonsterActionDef, MonsterDef, MonsterKind, Resistances,
    Stat, WeaponProfile,
};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Prefix marking a target key as a monster spawn key.
pub const MONSTER_SIGIL: char = '~';

// ============================================================================
// Players
// ============================================================================

/// The raw persisted shape of a character, as returned by the persistence
/// collaborator before expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterRecord {
    pub name: String,
    pub hp: i64,
    pub ap: i64,
    pub job_id: String,
    /// Equipped item ids by slot name (`hand`, `armor`, ...).
    pub equipment: HashMap<String, String>,
    pub inventory: Vec<String>,
}

impl Default for CharacterRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            hp: 1,
            ap: 0,
            job_id: String::new(),
            equipment: HashMap::new(),
            inventory: Vec::new(),
        }
    }
}

/// A player combatant with derived totals baked in at join time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub hp: i64,
    pub max_hp: i64,
    pub ap: i64,
    pub stats: CoreStats,
    pub total_ac: i64,
    pub resistances: Resistances,
    pub weapon: WeaponProfile,
    pub abilities: BTreeSet<String>,
    pub inventory: Vec<String>,
    pub buffs: Vec<Buff>,
    pub dots: Vec<DotEffect>,
}

impl Player {
    /// Expand a persisted record into a full combatant: job base stats,
    /// equipment stat and resistance mods, granted abilities, weapon slot.
    pub fn from_record(record: &CharacterRecord, catalog: &Catalog) -> Result<Self, EngineError> {
        let job = catalog.job(&record.job_id)?;

        let mut stats = job.stats;
        let mut max_hp = job.hp;
        let mut total_ac = 0;
        let mut resistances = Resistances::default();
        let mut weapon = WeaponProfile::bare_hands();
        let mut abilities: BTreeSet<String> = job.abilities.iter().cloned().collect();

        for item_id in record.equipment.values() {
            let item = catalog.item(item_id)?;
            if item.item_type == ItemType::Armor {
                total_ac += item.ac;
            }
            total_ac += item.mods.ac;
            max_hp += item.mods.hp;
            stats.str += item.mods.str;
            stats.dex += item.mods.dex;
            stats.int += item.mods.int;
            stats.hit += item.mods.hit;
            for (element, value) in &item.resistances.0 {
                resistances.add(*element, *value);
            }
            for ability_id in &item.abilities {
                abilities.insert(ability_id.clone());
            }
            if let Some(profile) = &item.weapon {
                weapon = profile.clone();
            }
        }

        let max_hp = max_hp.max(1);

        Ok(Self {
            name: record.name.clone(),
            hp: record.hp.min(max_hp),
            max_hp,
            ap: record.ap,
            stats,
            total_ac,
            resistances,
            weapon,
            abilities,
            inventory: record.inventory.clone(),
            buffs: Vec::new(),
            dots: Vec::new(),
        })
    }
}

// ============================================================================
// Monsters
// ============================================================================

/// Accumulated threat per attacker, in the order attackers first appear.
/// Ties on the top entry go to the earlier attacker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggroTable {
    entries: Vec<(String, i64)>,
}

impl AggroTable {
    pub fn add(&mut self, attacker: &str, amount: i64) {
        match self.entries.iter_mut().find(|(name, _)| name == attacker) {
            Some((_, total)) => *total += amount,
            None => self.entries.push((attacker.to_string(), amount)),
        }
    }

    /// The attacker with the highest accumulated threat.
    pub fn top(&self) -> Option<&str> {
        let mut best: Option<(&str, i64)> = None;
        for (name, total) in &self.entries {
            match best {
                Some((_, best_total)) if *total <= best_total => {}
                _ => best = Some((name.as_str(), *total)),
            }
        }
        best.map(|(name, _)| name)
    }

    /// Threat entries in first-contact order.
    pub fn entries(&self) -> &[(String, i64)] {
        &self.entries
    }

    /// Every attacker that holds threat.
    pub fn contributors(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn value(&self, attacker: &str) -> i64 {
        self.entries
            .iter()
            .find(|(name, _)| name == attacker)
            .map(|(_, total)| *total)
            .unwrap_or(0)
    }
}

/// A live monster instance in a session's encounter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    /// Catalog id this instance was spawned from.
    pub id: String,
    pub name: String,
    pub spawn_key: String,
    pub kind: MonsterKind,
    pub hp: i64,
    pub max_hp: i64,
    pub stats: CoreStats,
    pub ac: i64,
    pub resistances: Resistances,
    pub weapon: WeaponProfile,
    pub actions: Vec<MonsterActionDef>,
    pub drops: Vec<DropDef>,
    pub aggro: AggroTable,
    /// Ticks until this monster acts again.
    pub tick: u32,
    pub buffs: Vec<Buff>,
    pub dots: Vec<DotEffect>,
    /// Monotonic spawn ordinal; drives deterministic iteration.
    pub serial: u64,
}

// ============================================================================
// Target views
// ============================================================================

/// A normalized read-only view of a combatant, with derived totals.
/// The applicator writes changes back through the view's `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatantView {
    /// Canonical lookup key: the player name, or `~SPAWNKEY` for monsters.
    pub key: String,
    pub name: String,
    pub is_monster: bool,
    pub hp: i64,
    pub max_hp: i64,
    pub ap: i64,
    pub stats: CoreStats,
    pub total_ac: i64,
    pub resistances: Resistances,
    pub weapon: WeaponProfile,
    pub buffs: Vec<Buff>,
    pub dots: Vec<DotEffect>,
}

impl CombatantView {
    pub fn stat(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Ap => self.ap,
            Stat::Ac => self.total_ac,
            other => self.stats.get(other),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }
}

// ============================================================================
// Session state
// ============================================================================

/// All mutable combat state for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub players: HashMap<String, Player>,
    /// Live monsters by spawn key; entries are removed on death.
    pub encounters: HashMap<String, Monster>,
    /// Remaining action cooldown per player.
    pub cooldowns: HashMap<String, u32>,
    /// Item ids already claimed from exclusive drops this session.
    pub claimed_exclusives: BTreeSet<String>,
    /// Ordered message log; the slice since the last broadcast is what
    /// downstream relays display.
    pub transcript: Vec<String>,
    /// Spawn cap; zero means unlimited.
    pub max_encounters: usize,
    next_serial: u64,
}

impl SessionState {
    pub fn new(max_encounters: usize) -> Self {
        Self {
            max_encounters,
            ..Default::default()
        }
    }

    /// Append a message to the session transcript.
    pub fn say(&mut self, message: impl Into<String>) {
        self.transcript.push(message.into());
    }

    /// Resolve a symbolic target key into a combatant view. Keys starting
    /// with the monster sigil are encounter lookups (case-normalized);
    /// anything else is a player name.
    pub fn resolve_target(&self, key: &str) -> Result<CombatantView, EngineError> {
        if let Some(rest) = key.strip_prefix(MONSTER_SIGIL) {
            let spawn_key = rest.to_uppercase();
            let monster = self
                .encounters
                .get(&spawn_key)
                .ok_or_else(|| EngineError::UnknownMonster(spawn_key.clone()))?;
            Ok(CombatantView {
                key: format!("{MONSTER_SIGIL}{spawn_key}"),
                name: monster.name.clone(),
                is_monster: true,
                hp: monster.hp,
                max_hp: monster.max_hp,
                ap: 0,
                stats: monster.stats,
                total_ac: monster.ac,
                resistances: monster.resistances.clone(),
                weapon: monster.weapon.clone(),
                buffs: monster.buffs.clone(),
                dots: monster.dots.clone(),
            })
        } else {
            let player = self
                .players
                .get(key)
                .ok_or_else(|| EngineError::UnknownPlayer(key.to_string()))?;
            Ok(CombatantView {
                key: key.to_string(),
                name: player.name.clone(),
                is_monster: false,
                hp: player.hp,
                max_hp: player.max_hp,
                ap: player.ap,
                stats: player.stats,
                total_ac: player.total_ac,
                resistances: player.resistances.clone(),
                weapon: player.weapon.clone(),
                buffs: player.buffs.clone(),
                dots: player.dots.clone(),
            })
        }
    }

    /// Spawn a monster instance from its definition. Returns the spawn key.
    ///
    /// The instance copies its drop table minus exclusives the session has
    /// already claimed, and seeds its action cooldown from its dexterity.
    pub fn spawn_monster(
        &mut self,
        def: &MonsterDef,
        personal_name: Option<&str>,
    ) -> Result<String, EngineError> {
        if self.max_encounters > 0 && self.encounters.len() >= self.max_encounters {
            return Err(EngineError::EncounterLimit);
        }

        let abbrev = def.kind.abbreviation();
        let mut ordinal = 1;
        while self.encounters.contains_key(&format!("{abbrev}{ordinal}")) {
            ordinal += 1;
        }
        let spawn_key = format!("{abbrev}{ordinal}");

        let drops: Vec<DropDef> = def
            .drops
            .iter()
            .filter(|drop| !(drop.exclusive && self.claimed_exclusives.contains(&drop.item_id)))
            .cloned()
            .collect();

        self.next_serial += 1;
        let monster = Monster {
            id: def.id.clone(),
            name: personal_name.unwrap_or(&def.name).to_string(),
            spawn_key: spawn_key.clone(),
            kind: def.kind,
            hp: def.hp,
            max_hp: def.hp,
            stats: def.stats,
            ac: def.ac,
            resistances: def.resistances.clone(),
            weapon: WeaponProfile {
                name: "hand".to_string(),
                dmg: def.dmg.clone(),
                dmg_stat: def.dmg_stat,
                to_hit_stat: def.to_hit_stat,
                triggers: Vec::new(),
            },
            actions: def.actions.clone(),
            drops,
            aggro: AggroTable::default(),
            tick: action_cooldown(def.stats.dex),
            buffs: Vec::new(),
            dots: Vec::new(),
            serial: self.next_serial,
        };

        tracing::info!(spawn_key = %spawn_key, monster = %monster.name, "monster spawned");
        self.encounters.insert(spawn_key.clone(), monster);
        Ok(spawn_key)
    }

    /// Names of players still standing, sorted for deterministic iteration.
    pub fn live_player_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .players
            .iter()
            .filter(|(_, player)| player.hp > 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Spawn keys of live monsters, in spawn order.
    pub fn live_monster_keys(&self) -> Vec<String> {
        let mut keyed: Vec<(&u64, &String)> = self
            .encounters
            .iter()
            .filter(|(_, monster)| monster.hp > 0)
            .map(|(key, monster)| (&monster.serial, key))
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, key)| key.clone()).collect()
    }
}

/// Ticks before a combatant may act again after acting:
/// `min(11, 6 - min(5, dex))`, monotonic decreasing in dexterity.
pub fn action_cooldown(dex: i64) -> u32 {
    (6 - dex.min(5)).min(11).max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_catalog, sample_player};

    #[test]
    fn test_resolve_player_target() {
        let mut state = SessionState::new(0);
        state
            .players
            .insert("alice".to_string(), sample_player("alice"));

        let view = state.resolve_target("alice").unwrap();
        assert!(!view.is_monster);
        assert_eq!(view.key, "alice");
        assert!(matches!(
            state.resolve_target("ghost"),
            Err(EngineError::UnknownPlayer(_))
        ));
    }

    #[test]
    fn test_resolve_monster_target_normalizes_case() {
        let catalog = sample_catalog();
        let mut state = SessionState::new(0);
        let key = state
            .spawn_monster(catalog.monster("RAT").unwrap(), None)
            .unwrap();
        assert_eq!(key, "M1");

        let view = state.resolve_target("~m1").unwrap();
        assert!(view.is_monster);
        assert_eq!(view.key, "~M1");
        assert_eq!(view.total_ac, view.stat(Stat::Ac));
        assert_eq!(view.weapon.name, "hand");
        assert!(matches!(
            state.resolve_target("~M9"),
            Err(EngineError::UnknownMonster(_))
        ));
    }

    #[test]
    fn test_spawn_keys_are_unique_per_kind() {
        let catalog = sample_catalog();
        let mut state = SessionState::new(0);
        let rat = catalog.monster("RAT").unwrap();
        assert_eq!(state.spawn_monster(rat, None).unwrap(), "M1");
        assert_eq!(state.spawn_monster(rat, None).unwrap(), "M2");
        state.encounters.remove("M1");
        // Freed keys are reused once the previous holder is gone.
        assert_eq!(state.spawn_monster(rat, None).unwrap(), "M1");
    }

    #[test]
    fn test_spawn_respects_encounter_cap() {
        let catalog = sample_catalog();
        let mut state = SessionState::new(1);
        let rat = catalog.monster("RAT").unwrap();
        state.spawn_monster(rat, None).unwrap();
        assert!(matches!(
            state.spawn_monster(rat, None),
            Err(EngineError::EncounterLimit)
        ));
    }

    #[test]
    fn test_spawn_filters_claimed_exclusives() {
        let catalog = sample_catalog();
        let mut state = SessionState::new(0);
        state.claimed_exclusives.insert("CROWN".to_string());
        let key = state
            .spawn_monster(catalog.monster("GOBLIN_KING").unwrap(), None)
            .unwrap();
        let monster = &state.encounters[&key];
        assert!(monster.drops.iter().all(|drop| drop.item_id != "CROWN"));
    }

    #[test]
    fn test_aggro_top_prefers_earlier_on_tie() {
        let mut aggro = AggroTable::default();
        aggro.add("alice", 10);
        aggro.add("bob", 25);
        assert_eq!(aggro.top(), Some("bob"));

        aggro.add("alice", 15);
        // alice and bob both hold 25; alice appeared first.
        assert_eq!(aggro.top(), Some("alice"));
    }

    #[test]
    fn test_action_cooldown_formula() {
        assert_eq!(action_cooldown(0), 6);
        assert_eq!(action_cooldown(3), 3);
        assert_eq!(action_cooldown(5), 1);
        assert_eq!(action_cooldown(9), 1);
        assert_eq!(action_cooldown(-10), 11);
    }

    #[test]
    fn test_player_expansion_folds_equipment() {
        let catalog = sample_catalog();
        let mut equipment = HashMap::new();
        equipment.insert("hand".to_string(), "RUSTY_SWORD".to_string());
        equipment.insert("armor".to_string(), "LEATHER_VEST".to_string());
        let record = CharacterRecord {
            name: "alice".to_string(),
            hp: 20,
            ap: 10,
            job_id: "WARRIOR".to_string(),
            equipment,
            inventory: vec!["POTION".to_string()],
        };

        let player = Player::from_record(&record, &catalog).unwrap();
        // Job STR 2 + sword mod 1.
        assert_eq!(player.stats.str, 3);
        // Vest armor 2 + vest AC mod 1.
        assert_eq!(player.total_ac, 3);
        assert_eq!(player.weapon.name, "Rusty Sword");
        assert!(player.abilities.contains("SLASH"));
        assert_eq!(player.resistances.value(crate::catalog::Element::Fire), 1);
    }
}
