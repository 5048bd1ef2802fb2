use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::{Rect, Vec2};

/// Chest categories recognized by the planner. Weights are configured per
/// category in 'PlannerSettings::chest_weights'.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum ChestKind {
    Blight,
    Fragment,
    League,
    Jewellery,
    Weapon,
    Currency,
    Heist,
    Breach,
    Ritual,
    Maps,
    Gems,
    Fossils,
    DivinationCards,
    Essence,
    Armour,
    Legion,
    Delirium,
    Uniques,
    Other,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone)]
pub enum LootKind {
    NormalMonster,
    RunicMonster,
    Chest(ChestKind),
}

impl LootKind {
    pub fn is_monster(&self) -> bool {
        matches!(self, LootKind::NormalMonster | LootKind::RunicMonster)
    }
}

/// Named relic effect categories whose strength is configured per category
/// in 'PlannerSettings::relic_settings'. The excavated-chest variants target
/// chests; everything else targets monsters.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum RelicEffectKind {
    Experience,
    Rarity,
    Logbooks,
    PackSize,
    MonsterMods,
    Artifacts,
    Quantity,
    CorruptedItems,
    RarityExcavatedChest,
    ArtifactsExcavatedChest,
    QuantityExcavatedChest,
}

impl RelicEffectKind {
    pub fn applies_to_monsters(&self) -> bool {
        !matches!(
            self,
            RelicEffectKind::RarityExcavatedChest
                | RelicEffectKind::ArtifactsExcavatedChest
                | RelicEffectKind::QuantityExcavatedChest
        )
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone)]
pub enum RelicKind {
    /// Relic with configured effect strength, applying either to monsters or
    /// to chests.
    Configurable {
        multiplier: f64,
        increase: f64,
        applies_to_monsters: bool,
    },
    /// Doubles runic monsters.
    DoubledMonsters,
    /// Relic with a downside mod. Capturing it is discouraged, not forbidden.
    Warning,
}

impl RelicKind {
    /// (multiplier, additive increase) this relic contributes for the given
    /// loot while active.
    pub fn score_multiplier(&self, loot: &LootKind) -> (f64, f64) {
        match (self, loot) {
            (RelicKind::Configurable { multiplier, increase, applies_to_monsters }, _)
                if *applies_to_monsters == loot.is_monster() => (*multiplier, *increase),
            (RelicKind::Configurable { .. }, _) => (1.0, 0.0),
            (RelicKind::DoubledMonsters, LootKind::RunicMonster) => (2.0, 0.0),
            (RelicKind::DoubledMonsters, _) => (1.0, 0.0),
            (RelicKind::Warning, _) => (0.5, 0.0),
        }
    }
}

/// Stable identity of one loot entry, assigned at environment construction.
/// Two entries at the same coordinates are still distinct for
/// already-collected tracking.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct LootId(pub usize);

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct RelicId(pub usize);

/// Pathability oracle for candidate explosion points, derived from external
/// terrain data by the caller.
pub type WalkabilityFn = dyn Fn(Vec2) -> bool + Send + Sync;

/// Immutable snapshot of one planning problem. Built once per session and
/// shared read-only across all search workers.
pub struct Environment {
    pub relics: Vec<(Vec2, RelicKind)>,
    pub loot: Vec<(Vec2, LootKind)>,
    /// Max travel distance between consecutive explosion points.
    pub explosion_range: f32,
    /// Capture distance of a single explosion.
    pub explosion_radius: f32,
    /// Path length budget.
    pub max_explosions: usize,
    pub starting_point: Vec2,
    pub is_walkable: Box<WalkabilityFn>,
    /// Points may not land inside this area.
    pub exclusion_area: Rect,
    /// Logbook areas use a different runic monster weight.
    pub is_logbook: bool,
}

impl Environment {
    pub fn relic_ids(&self) -> impl Iterator<Item = (RelicId, &Vec2, &RelicKind)> {
        self.relics.iter().enumerate().map(|(i, (pos, kind))| (RelicId(i), pos, kind))
    }

    pub fn loot_ids(&self) -> impl Iterator<Item = (LootId, &Vec2, &LootKind)> {
        self.loot.iter().enumerate().map(|(i, (pos, kind))| (LootId(i), pos, kind))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("relics", &self.relics.len())
            .field("loot", &self.loot.len())
            .field("explosion_range", &self.explosion_range)
            .field("explosion_radius", &self.explosion_radius)
            .field("max_explosions", &self.max_explosions)
            .field("starting_point", &self.starting_point)
            .field("exclusion_area", &self.exclusion_area)
            .field("is_logbook", &self.is_logbook)
            .finish()
    }
}
