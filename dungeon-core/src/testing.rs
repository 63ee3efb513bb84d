//! Testing utilities.
//!
//! Provides a scripted [`RandomSource`] for deterministic combat tests and
//! small catalog/player fixtures shared across the test suites.

use crate::catalog::{
    AbilityDef, Area, Catalog, CoreStats, DropDef, Element, ItemDef, ItemType, JobDef,
    MonsterActionDef, MonsterDef, MonsterKind, Resistances, Stat, StatMods, TargetClass,
    WeaponProfile,
};
use crate::dice::DiceFormula;
use crate::random::RandomSource;
use crate::state::Player;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// A random source that replays scripted outcomes, in order.
///
/// Die rolls and index picks are consumed from separate queues; running a
/// queue dry panics, which keeps a test honest about every roll it causes.
pub struct ScriptedRandom {
    dies: VecDeque<i64>,
    picks: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn empty() -> Self {
        Self {
            dies: VecDeque::new(),
            picks: VecDeque::new(),
        }
    }

    pub fn dies(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            dies: values.into_iter().collect(),
            picks: VecDeque::new(),
        }
    }

    pub fn with_picks(mut self, values: impl IntoIterator<Item = usize>) -> Self {
        self.picks = values.into_iter().collect();
        self
    }

    pub fn push_die(&mut self, value: i64) {
        self.dies.push_back(value);
    }
}

impl RandomSource for ScriptedRandom {
    fn die(&mut self, sides: u32) -> i64 {
        self.dies
            .pop_front()
            .unwrap_or_else(|| panic!("scripted dice exhausted (d{sides} requested)"))
    }

    fn pick(&mut self, len: usize) -> usize {
        self.picks
            .pop_front()
            .unwrap_or_else(|| panic!("scripted picks exhausted (len {len} requested)"))
    }
}

fn dice(notation: &str) -> DiceFormula {
    DiceFormula::parse(notation).expect("fixture dice notation")
}

/// A small catalog with one of everything the engine touches.
pub fn sample_catalog() -> Catalog {
    let mut abilities = HashMap::new();
    abilities.insert(
        "SLASH".to_string(),
        AbilityDef {
            id: "SLASH".into(),
            name: "Slash".into(),
            element: Element::None,
            ap: 1,
            dmg: dice("1d6"),
            ..Default::default()
        },
    );
    abilities.insert(
        "FIREBALL".to_string(),
        AbilityDef {
            id: "FIREBALL".into(),
            name: "Fireball".into(),
            element: Element::Fire,
            ap: 4,
            dmg: dice("2d6"),
            to_hit_stat: Stat::Int,
            ..Default::default()
        },
    );
    abilities.insert(
        "FIRESTORM".to_string(),
        AbilityDef {
            id: "FIRESTORM".into(),
            name: "Firestorm".into(),
            element: Element::Fire,
            area: Area::All,
            ap: 6,
            dmg: dice("1d6"),
            to_hit_stat: Stat::Int,
            ..Default::default()
        },
    );
    abilities.insert(
        "HEAL".to_string(),
        AbilityDef {
            id: "HEAL".into(),
            name: "Heal".into(),
            element: Element::Healing,
            target: TargetClass::Friendly,
            ap: 3,
            dmg: dice("2d4"),
            ..Default::default()
        },
    );
    abilities.insert(
        "WAR_CRY".to_string(),
        AbilityDef {
            id: "WAR_CRY".into(),
            name: "War Cry".into(),
            element: Element::Buffing,
            target: TargetClass::Friendly,
            ap: 2,
            buffs: "STR+2;AC+1".into(),
            buff_duration: 3,
            ..Default::default()
        },
    );
    abilities.insert(
        "CURE".to_string(),
        AbilityDef {
            id: "CURE".into(),
            name: "Cure".into(),
            element: Element::Cleansing,
            target: TargetClass::Friendly,
            ap: 2,
            buffs: "-BURN".into(),
            ..Default::default()
        },
    );
    abilities.insert(
        "BURN".to_string(),
        AbilityDef {
            id: "BURN".into(),
            name: "Burn".into(),
            element: Element::Fire,
            dmg: dice("1d4"),
            proc_time: 2,
            max_procs: 2,
            ..Default::default()
        },
    );

    let mut items = HashMap::new();
    items.insert(
        "RUSTY_SWORD".to_string(),
        ItemDef {
            id: "RUSTY_SWORD".into(),
            name: "Rusty Sword".into(),
            item_type: ItemType::Weapon,
            rarity: 1,
            mods: StatMods {
                str: 1,
                ..Default::default()
            },
            abilities: vec!["SLASH".into()],
            weapon: Some(WeaponProfile {
                name: "Rusty Sword".into(),
                dmg: dice("1d6"),
                dmg_stat: Stat::Hp,
                to_hit_stat: Stat::Hit,
                triggers: Vec::new(),
            }),
            ..Default::default()
        },
    );
    let mut vest_resistances = Resistances::default();
    vest_resistances.set(Element::Fire, 1);
    items.insert(
        "LEATHER_VEST".to_string(),
        ItemDef {
            id: "LEATHER_VEST".into(),
            name: "Leather Vest".into(),
            item_type: ItemType::Armor,
            rarity: 1,
            ac: 2,
            mods: StatMods {
                ac: 1,
                ..Default::default()
            },
            resistances: vest_resistances,
            ..Default::default()
        },
    );
    items.insert(
        "POTION".to_string(),
        ItemDef {
            id: "POTION".into(),
            name: "Potion".into(),
            item_type: ItemType::Consumable,
            rarity: 1,
            use_ability: Some("HEAL".into()),
            ..Default::default()
        },
    );
    items.insert(
        "CHEESE".to_string(),
        ItemDef {
            id: "CHEESE".into(),
            name: "Cheese".into(),
            item_type: ItemType::Gear,
            rarity: 1,
            ..Default::default()
        },
    );
    items.insert(
        "CROWN".to_string(),
        ItemDef {
            id: "CROWN".into(),
            name: "Goblin Crown".into(),
            item_type: ItemType::Gear,
            rarity: 7,
            ..Default::default()
        },
    );

    let mut jobs = HashMap::new();
    jobs.insert(
        "WARRIOR".to_string(),
        JobDef {
            id: "WARRIOR".into(),
            name: "Warrior".into(),
            stats: CoreStats {
                str: 2,
                dex: 1,
                int: 0,
                hit: 1,
            },
            hp: 20,
            abilities: vec!["WAR_CRY".into()],
        },
    );

    let mut monsters = HashMap::new();
    monsters.insert(
        "RAT".to_string(),
        MonsterDef {
            id: "RAT".into(),
            name: "Giant Rat".into(),
            kind: MonsterKind::Mob,
            rarity: 1,
            hp: 10,
            stats: CoreStats {
                str: 1,
                dex: 1,
                int: 0,
                hit: 1,
            },
            ac: 2,
            dmg: dice("1d4"),
            drops: vec![DropDef {
                item_id: "CHEESE".into(),
                chance: 50,
                ..Default::default()
            }],
            ..Default::default()
        },
    );
    monsters.insert(
        "GOBLIN_KING".to_string(),
        MonsterDef {
            id: "GOBLIN_KING".into(),
            name: "Goblin King".into(),
            kind: MonsterKind::Boss,
            rarity: 5,
            dungeon: Some("caves".into()),
            hp: 40,
            stats: CoreStats {
                str: 3,
                dex: 2,
                int: 1,
                hit: 2,
            },
            ac: 5,
            dmg: dice("1d8"),
            actions: vec![MonsterActionDef {
                ability_id: "FIREBALL".into(),
                chance: 30,
            }],
            drops: vec![
                DropDef {
                    item_id: "CROWN".into(),
                    chance: 100,
                    exclusive: true,
                    only_one: true,
                },
                DropDef {
                    item_id: "CHEESE".into(),
                    chance: 50,
                    ..Default::default()
                },
            ],
            ..Default::default()
        },
    );

    Catalog::new(items, jobs, monsters, abilities)
}

/// A ready-to-fight player with the fixture ability set.
pub fn sample_player(name: &str) -> Player {
    Player {
        name: name.to_string(),
        hp: 20,
        max_hp: 20,
        ap: 10,
        stats: CoreStats {
            str: 2,
            dex: 1,
            int: 1,
            hit: 1,
        },
        total_ac: 2,
        resistances: Resistances::default(),
        weapon: WeaponProfile::bare_hands(),
        abilities: ["SLASH", "FIREBALL", "FIRESTORM", "HEAL", "WAR_CRY", "CURE"]
            .iter()
            .map(|id| id.to_string())
            .collect::<BTreeSet<String>>(),
        inventory: vec!["POTION".to_string()],
        buffs: Vec::new(),
        dots: Vec::new(),
    }
}
