//! Loot distribution on monster death.

use crate::catalog::DropDef;
use crate::random::{shuffle, RandomSource};
use std::collections::BTreeSet;

/// One successful drop roll, attributed to the attacker who rolled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootDrop {
    pub attacker: String,
    pub item_id: String,
    pub exclusive: bool,
}

/// Roll a dead monster's drop table.
///
/// Every attacker holding aggro rolls independently against every drop
/// entry (`1d100 < chance`), in shuffled attacker order. `exclusive` drops
/// are withheld when the session has already claimed them; `only_one`
/// drops land at most once per death.
pub fn distribute_loot(
    drops: &[DropDef],
    contributors: &[String],
    claimed_exclusives: &BTreeSet<String>,
    rng: &mut dyn RandomSource,
) -> Vec<LootDrop> {
    let mut order: Vec<String> = contributors.to_vec();
    shuffle(&mut order, rng);

    let mut taken: BTreeSet<&str> = BTreeSet::new();
    let mut results = Vec::new();

    for attacker in &order {
        for drop in drops {
            let roll = rng.die(100);
            tracing::debug!(item = %drop.item_id, roll, chance = drop.chance, "drop roll");
            if roll >= drop.chance {
                continue;
            }
            if drop.exclusive
                && (claimed_exclusives.contains(&drop.item_id)
                    || taken.contains(drop.item_id.as_str()))
            {
                continue;
            }
            if drop.only_one && taken.contains(drop.item_id.as_str()) {
                continue;
            }

            taken.insert(drop.item_id.as_str());
            results.push(LootDrop {
                attacker: attacker.clone(),
                item_id: drop.item_id.clone(),
                exclusive: drop.exclusive,
            });
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRandom;

    fn drop(item_id: &str, chance: i64, exclusive: bool, only_one: bool) -> DropDef {
        DropDef {
            item_id: item_id.to_string(),
            chance,
            exclusive,
            only_one,
        }
    }

    #[test]
    fn test_each_contributor_rolls_each_drop() {
        let drops = vec![drop("CHEESE", 50, false, false)];
        let contributors = vec!["alice".to_string(), "bob".to_string()];
        // Shuffle swap keeps order, then one winning and one losing roll.
        let mut rng = ScriptedRandom::dies([10, 80]).with_picks([1]);

        let result = distribute_loot(&drops, &contributors, &BTreeSet::new(), &mut rng);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].item_id, "CHEESE");
    }

    #[test]
    fn test_only_one_caps_per_death() {
        let drops = vec![drop("CHEESE", 100, false, true)];
        let contributors = vec!["alice".to_string(), "bob".to_string()];
        let mut rng = ScriptedRandom::dies([1, 1]).with_picks([1]);

        let result = distribute_loot(&drops, &contributors, &BTreeSet::new(), &mut rng);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_exclusive_respects_claimed_set() {
        let drops = vec![drop("CROWN", 100, true, false)];
        let contributors = vec!["alice".to_string()];
        let mut claimed = BTreeSet::new();
        claimed.insert("CROWN".to_string());
        let mut rng = ScriptedRandom::dies([1]);

        let result = distribute_loot(&drops, &contributors, &claimed, &mut rng);
        assert!(result.is_empty());
    }

    #[test]
    fn test_chance_boundary_is_strict() {
        // 1d100 < chance: a roll equal to the chance loses.
        let drops = vec![drop("CHEESE", 50, false, false)];
        let contributors = vec!["alice".to_string()];
        let mut rng = ScriptedRandom::dies([50]);

        let result = distribute_loot(&drops, &contributors, &BTreeSet::new(), &mut rng);
        assert!(result.is_empty());
    }
}
