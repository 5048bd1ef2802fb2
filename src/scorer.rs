use rustc_hash::FxHashSet;

use crate::environment::{Environment, LootId, LootKind, RelicId};
use crate::geometry::Vec2;
use crate::planner::PlannerSettings;

/// Score contribution of a single explosion point within one path.
#[derive(Debug, Clone, PartialEq)]
pub struct PerPointLootScore {
    pub point: Vec2,
    pub score_diff: f64,
    pub new_relics: usize,
    pub new_loot: usize,
}

/// Per-point breakdown of a path's score, for inspection. The search loop
/// itself only ever uses the plain total.
#[derive(Debug, Clone)]
pub struct DetailedLootScore {
    pub per_point: Vec<PerPointLootScore>,
    pub total_score: f64,
}

/// Scores candidate paths against one environment. The per-loot base values
/// are folded down from the settings once at construction.
pub struct Scorer {
    // Indexed by LootId.
    loot_values: Vec<f64>,
}

impl Scorer {
    pub fn new(settings: &PlannerSettings, environment: &Environment) -> Self {
        let loot_values = environment
            .loot
            .iter()
            .map(|(_, kind)| match kind {
                LootKind::RunicMonster if environment.is_logbook => {
                    settings.runic_monster_logbook_weight
                }
                LootKind::RunicMonster => settings.runic_monster_weight,
                LootKind::Chest(chest) => {
                    settings.chest_weights.get(chest).copied().unwrap_or(0.0)
                }
                LootKind::NormalMonster => settings.normal_monster_weight,
            })
            .collect();
        Scorer { loot_values }
    }

    /// Total loot value collected by the path. Relic effects are global once
    /// triggered: a relic captured at some point applies to all loot scored
    /// from that point onward (including loot at the same point), so the
    /// order of explosion points matters.
    pub fn score(&self, path: &[Vec2], environment: &Environment) -> f64 {
        let mut relics: FxHashSet<RelicId> = FxHashSet::default();
        let mut counted: FxHashSet<LootId> = FxHashSet::default();
        let mut score = 0.0;
        for point in path {
            for (id, pos, _) in environment.relic_ids() {
                if pos.distance(point) <= environment.explosion_radius {
                    relics.insert(id);
                }
            }

            for (id, pos, kind) in environment.loot_ids() {
                if pos.distance_less_than_or_equal(point, environment.explosion_radius)
                    && counted.insert(id)
                {
                    score += self.loot_value(id, kind, &relics, environment);
                }
            }
        }

        score
    }

    // Sync with the method above.
    pub fn detailed_score(&self, path: &[Vec2], environment: &Environment) -> DetailedLootScore {
        let mut relics: FxHashSet<RelicId> = FxHashSet::default();
        let mut counted: FxHashSet<LootId> = FxHashSet::default();
        let mut per_point = Vec::with_capacity(path.len());
        let mut score = 0.0;
        for point in path {
            let mut new_relics = 0;
            let mut new_loot = 0;
            for (id, pos, _) in environment.relic_ids() {
                if pos.distance(point) <= environment.explosion_radius && relics.insert(id) {
                    new_relics += 1;
                }
            }

            let mut local_score = 0.0;
            for (id, pos, kind) in environment.loot_ids() {
                if pos.distance_less_than_or_equal(point, environment.explosion_radius)
                    && counted.insert(id)
                {
                    new_loot += 1;
                    local_score += self.loot_value(id, kind, &relics, environment);
                }
            }

            per_point.push(PerPointLootScore {
                point: *point,
                score_diff: local_score,
                new_relics,
                new_loot,
            });
            score += local_score;
        }

        DetailedLootScore { per_point, total_score: score }
    }

    fn loot_value(
        &self,
        id: LootId,
        kind: &LootKind,
        relics: &FxHashSet<RelicId>,
        environment: &Environment,
    ) -> f64 {
        let (multiplier, sum) = relics
            .iter()
            .map(|relic_id| environment.relics[relic_id.0].1.score_multiplier(kind))
            .fold((1.0, 0.0), |(mult, sum), (m, s)| (mult * m, sum + s));
        self.loot_values[id.0] * multiplier * (1.0 + sum)
    }
}
