//! Static game data: items, jobs, monsters, and abilities.
//!
//! Catalog tables are loaded once at session start from the persistence
//! collaborator and treated as immutable afterwards, so they can be shared
//! read-only across sessions. Anything a call needs to vary per invocation
//! (the AP cost of an ability used through a consumable item, for example)
//! is carried in an [`AbilityInvocation`] instead of being patched into the
//! shared definition.

use crate::dice::DiceFormula;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ============================================================================
// Elements and stats
// ============================================================================

/// The element of an ability. Support elements (healing, buffing, cleansing)
/// select which resolver runs; everything else is a damage element checked
/// against the defender's resistances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Element {
    #[default]
    None,
    Healing,
    Buffing,
    Cleansing,
    Fire,
    Ice,
    Lightning,
    Water,
    Earth,
    Light,
    Dark,
}

impl Element {
    /// Whether this element resolves through the damage pathway.
    pub fn is_damage(&self) -> bool {
        !matches!(self, Element::Healing | Element::Buffing | Element::Cleansing)
    }

    /// Lowercase display name, as used in chat messages.
    pub fn name(&self) -> &'static str {
        match self {
            Element::None => "none",
            Element::Healing => "healing",
            Element::Buffing => "buffing",
            Element::Cleansing => "cleansing",
            Element::Fire => "fire",
            Element::Ice => "ice",
            Element::Lightning => "lightning",
            Element::Water => "water",
            Element::Earth => "earth",
            Element::Light => "light",
            Element::Dark => "dark",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Who an ability may be pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetClass {
    #[default]
    Enemy,
    Friendly,
}

/// How many combatants an ability touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Area {
    #[default]
    One,
    All,
}

/// A named combatant stat, used for damage targets, to-hit sources, and
/// buff changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stat {
    Hp,
    Ap,
    Str,
    Dex,
    Int,
    Hit,
    Ac,
}

impl Stat {
    /// Uppercase display name, as embedded in battle messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Hp => "HP",
            Stat::Ap => "AP",
            Stat::Str => "STR",
            Stat::Dex => "DEX",
            Stat::Int => "INT",
            Stat::Hit => "HIT",
            Stat::Ac => "AC",
        }
    }

    /// Parse a stat token such as `STR` or `hp`.
    pub fn parse(token: &str) -> Option<Stat> {
        match token.to_uppercase().as_str() {
            "HP" => Some(Stat::Hp),
            "AP" => Some(Stat::Ap),
            "STR" => Some(Stat::Str),
            "DEX" => Some(Stat::Dex),
            "INT" => Some(Stat::Int),
            "HIT" => Some(Stat::Hit),
            "AC" => Some(Stat::Ac),
            _ => None,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four core combat stats every combatant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoreStats {
    pub str: i64,
    pub dex: i64,
    pub int: i64,
    pub hit: i64,
}

impl CoreStats {
    pub fn get(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Str => self.str,
            Stat::Dex => self.dex,
            Stat::Int => self.int,
            Stat::Hit => self.hit,
            Stat::Hp | Stat::Ap | Stat::Ac => 0,
        }
    }
}

/// Flat stat modifiers on abilities and equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatMods {
    pub hp: i64,
    pub str: i64,
    pub dex: i64,
    pub int: i64,
    pub hit: i64,
    pub ac: i64,
}

impl StatMods {
    pub fn get(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Hp => self.hp,
            Stat::Str => self.str,
            Stat::Dex => self.dex,
            Stat::Int => self.int,
            Stat::Hit => self.hit,
            Stat::Ac => self.ac,
            Stat::Ap => 0,
        }
    }
}

/// Per-element resistance values. Each point shaves 5% off incoming damage
/// of that element; negative values mark a weakness.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resistances(pub BTreeMap<Element, i64>);

impl Resistances {
    pub fn value(&self, element: Element) -> i64 {
        self.0.get(&element).copied().unwrap_or(0)
    }

    pub fn set(&mut self, element: Element, value: i64) {
        self.0.insert(element, value);
    }

    pub fn add(&mut self, element: Element, delta: i64) {
        *self.0.entry(element).or_insert(0) += delta;
    }
}

// ============================================================================
// Abilities
// ============================================================================

/// A secondary ability fired probabilistically after a successful hit.
/// `chance` is checked as `1d20 <= chance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDef {
    pub ability_id: String,
    pub chance: i64,
}

/// Static ability definition from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityDef {
    pub id: String,
    pub name: String,
    pub element: Element,
    pub target: TargetClass,
    pub area: Area,
    /// AP cost for non-monster users.
    pub ap: i64,
    /// Damage or healing formula. Percentage formulas resolve against the
    /// defender's `dmg_stat` value.
    pub dmg: DiceFormula,
    pub dmg_stat: Stat,
    pub to_hit_stat: Stat,
    pub mods: StatMods,
    /// Buff-effect string: `STAT±N[%]` tokens separated by `;` for buffing
    /// abilities, `-EFFECTID` tokens for cleansing abilities.
    pub buffs: String,
    /// Buff lifetime in scheduler ticks.
    pub buff_duration: u32,
    /// Ticks between damage-over-time procs; zero means no DOT.
    pub proc_time: u32,
    /// Number of DOT procs before the effect wears off.
    pub max_procs: u32,
    pub triggers: Vec<TriggerDef>,
    /// When set, damage is the raw roll: no stat mods, no resistance.
    pub ignore_damage_mods: bool,
}

impl Default for AbilityDef {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            element: Element::None,
            target: TargetClass::Enemy,
            area: Area::One,
            ap: 0,
            dmg: DiceFormula::flat(1),
            dmg_stat: Stat::Hp,
            to_hit_stat: Stat::Hit,
            mods: StatMods::default(),
            buffs: String::new(),
            buff_duration: 0,
            proc_time: 0,
            max_procs: 0,
            triggers: Vec::new(),
            ignore_damage_mods: false,
        }
    }
}

/// One use of an ability, with its effective AP cost.
///
/// Item-backed uses zero the cost here rather than mutating the shared
/// [`AbilityDef`], which would leak the discount to every session.
#[derive(Debug, Clone, Copy)]
pub struct AbilityInvocation<'a> {
    pub ability: &'a AbilityDef,
    pub ap_cost: i64,
}

impl<'a> AbilityInvocation<'a> {
    /// Invoke at the ability's listed cost.
    pub fn new(ability: &'a AbilityDef) -> Self {
        Self {
            ability,
            ap_cost: ability.ap,
        }
    }

    /// Invoke at no AP cost (consumable items, triggered procs).
    pub fn free(ability: &'a AbilityDef) -> Self {
        Self { ability, ap_cost: 0 }
    }
}

// ============================================================================
// Items and jobs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemType {
    Armor,
    Weapon,
    Consumable,
    #[default]
    Gear,
}

/// The damage profile of an equipped (or implicit) weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    pub name: String,
    pub dmg: DiceFormula,
    pub dmg_stat: Stat,
    pub to_hit_stat: Stat,
    #[serde(default)]
    pub triggers: Vec<TriggerDef>,
}

impl WeaponProfile {
    /// The default when nothing is equipped.
    pub fn bare_hands() -> Self {
        Self {
            name: "Bare Hands".to_string(),
            dmg: DiceFormula::flat(1),
            dmg_stat: Stat::Hp,
            to_hit_stat: Stat::Hit,
            triggers: Vec::new(),
        }
    }
}

/// Static item definition from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub item_type: ItemType,
    pub rarity: i64,
    /// Base armor class contributed when this is worn armor.
    pub ac: i64,
    pub mods: StatMods,
    pub resistances: Resistances,
    /// Ability ids granted while equipped.
    pub abilities: Vec<String>,
    /// For consumables: the ability fired on use.
    pub use_ability: Option<String>,
    /// For weapons: the attack profile granted while equipped.
    pub weapon: Option<WeaponProfile>,
}

impl Default for ItemDef {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            item_type: ItemType::Gear,
            rarity: 0,
            ac: 0,
            mods: StatMods::default(),
            resistances: Resistances::default(),
            abilities: Vec::new(),
            use_ability: None,
            weapon: None,
        }
    }
}

/// A character job: the base stat block players derive from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDef {
    pub id: String,
    pub name: String,
    pub stats: CoreStats,
    pub hp: i64,
    pub abilities: Vec<String>,
}

// ============================================================================
// Monsters
// ============================================================================

/// Monster tier; determines the spawn key abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonsterKind {
    #[default]
    Mob,
    Elite,
    Boss,
    Rare,
}

impl MonsterKind {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            MonsterKind::Mob => "M",
            MonsterKind::Elite => "E",
            MonsterKind::Boss => "B",
            MonsterKind::Rare => "R",
        }
    }
}

/// A weighted entry in a monster's action table. Weights are percentage
/// points on a d100; the remainder falls through to a basic attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterActionDef {
    pub ability_id: String,
    pub chance: i64,
}

/// A loot table entry. `chance` is checked as `1d100 < chance` per
/// aggro-holding attacker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropDef {
    pub item_id: String,
    pub chance: i64,
    /// Drops at most once, ever, across the session.
    pub exclusive: bool,
    /// Drops at most once per monster death.
    pub only_one: bool,
}

impl Default for DropDef {
    fn default() -> Self {
        Self {
            item_id: String::new(),
            chance: 0,
            exclusive: false,
            only_one: false,
        }
    }
}

/// Static monster definition from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonsterDef {
    pub id: String,
    pub name: String,
    pub kind: MonsterKind,
    pub rarity: i64,
    /// Dungeon tag for themed spawns.
    pub dungeon: Option<String>,
    pub hp: i64,
    pub stats: CoreStats,
    pub ac: i64,
    pub dmg: DiceFormula,
    pub dmg_stat: Stat,
    pub to_hit_stat: Stat,
    pub resistances: Resistances,
    pub actions: Vec<MonsterActionDef>,
    pub drops: Vec<DropDef>,
}

impl Default for MonsterDef {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind: MonsterKind::Mob,
            rarity: 0,
            dungeon: None,
            hp: 1,
            stats: CoreStats::default(),
            ac: 0,
            dmg: DiceFormula::parse("1d6").expect("static formula"),
            dmg_stat: Stat::Hp,
            to_hit_stat: Stat::Hit,
            resistances: Resistances::default(),
            actions: Vec::new(),
            drops: Vec::new(),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// The full static data set for a session, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub items: HashMap<String, ItemDef>,
    pub jobs: HashMap<String, JobDef>,
    pub monsters: HashMap<String, MonsterDef>,
    pub abilities: HashMap<String, AbilityDef>,
}

impl Catalog {
    pub fn new(
        items: HashMap<String, ItemDef>,
        jobs: HashMap<String, JobDef>,
        monsters: HashMap<String, MonsterDef>,
        abilities: HashMap<String, AbilityDef>,
    ) -> Self {
        Self {
            items,
            jobs,
            monsters,
            abilities,
        }
    }

    pub fn ability(&self, id: &str) -> Result<&AbilityDef, EngineError> {
        self.abilities
            .get(&id.to_uppercase())
            .ok_or_else(|| EngineError::UnknownAbility(id.to_string()))
    }

    pub fn item(&self, id: &str) -> Result<&ItemDef, EngineError> {
        self.items
            .get(&id.to_uppercase())
            .ok_or_else(|| EngineError::UnknownItem(id.to_string()))
    }

    pub fn monster(&self, id: &str) -> Result<&MonsterDef, EngineError> {
        self.monsters
            .get(&id.to_uppercase())
            .ok_or_else(|| EngineError::UnknownMonster(id.to_string()))
    }

    pub fn job(&self, id: &str) -> Result<&JobDef, EngineError> {
        self.jobs
            .get(&id.to_uppercase())
            .ok_or_else(|| EngineError::UnknownJob(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_classes() {
        assert!(Element::Fire.is_damage());
        assert!(Element::None.is_damage());
        assert!(!Element::Healing.is_damage());
        assert!(!Element::Cleansing.is_damage());
    }

    #[test]
    fn test_stat_parse_round_trip() {
        for stat in [
            Stat::Hp,
            Stat::Ap,
            Stat::Str,
            Stat::Dex,
            Stat::Int,
            Stat::Hit,
            Stat::Ac,
        ] {
            assert_eq!(Stat::parse(stat.as_str()), Some(stat));
        }
        assert_eq!(Stat::parse("luck"), None);
    }

    #[test]
    fn test_resistance_default_is_zero() {
        let resistances = Resistances::default();
        assert_eq!(resistances.value(Element::Fire), 0);
    }

    #[test]
    fn test_invocation_cost_override() {
        let ability = AbilityDef {
            id: "HEAL".into(),
            ap: 3,
            ..Default::default()
        };
        assert_eq!(AbilityInvocation::new(&ability).ap_cost, 3);
        assert_eq!(AbilityInvocation::free(&ability).ap_cost, 0);
    }

    #[test]
    fn test_catalog_lookup_is_case_insensitive() {
        let mut abilities = HashMap::new();
        abilities.insert(
            "FIREBALL".to_string(),
            AbilityDef {
                id: "FIREBALL".into(),
                ..Default::default()
            },
        );
        let catalog = Catalog {
            abilities,
            ..Default::default()
        };
        assert!(catalog.ability("fireball").is_ok());
        assert!(catalog.ability("ICEBOLT").is_err());
    }

    #[test]
    fn test_ability_def_from_json() {
        let ability: AbilityDef = serde_json::from_str(
            r#"{
                "id": "FIREBALL",
                "name": "Fireball",
                "element": "FIRE",
                "target": "ENEMY",
                "area": "ONE",
                "ap": 4,
                "dmg": "2d6",
                "dmg_stat": "HP",
                "to_hit_stat": "INT"
            }"#,
        )
        .unwrap();
        assert_eq!(ability.element, Element::Fire);
        assert_eq!(ability.to_hit_stat, Stat::Int);
        assert!(ability.triggers.is_empty());
    }
}
