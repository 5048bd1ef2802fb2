use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::environment::{ChestKind, Environment, LootKind, RelicEffectKind, RelicKind};
use crate::geometry::{Rect, Vec2};
use crate::planner::{PlannerSettings, RelicSettings};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("could not read scenario file ({0})")]
    Io(#[from] std::io::Error),
    #[error("could not parse scenario file ({0})")]
    Json(#[from] serde_json::Error),
}

/// Relic entry in a scenario: either a named effect category whose strength
/// comes out of the settings, or a fully specified relic.
#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone)]
pub enum RelicSpec {
    Effect(RelicEffectKind),
    Custom(RelicKind),
}

impl RelicSpec {
    fn resolve(&self, settings: &PlannerSettings) -> RelicKind {
        match self {
            RelicSpec::Effect(effect) => {
                let relic_settings = settings
                    .relic_settings
                    .get(effect)
                    .copied()
                    .unwrap_or_else(RelicSettings::default);
                RelicKind::Configurable {
                    multiplier: relic_settings.multiplier,
                    increase: relic_settings.increase,
                    applies_to_monsters: effect.applies_to_monsters(),
                }
            }
            RelicSpec::Custom(kind) => *kind,
        }
    }
}

/// Serializable planning problem: what the overlay host would scan out of
/// process memory, expressed as a plain file instead. Walkability is a
/// bounds check against the grid dimensions minus the blocked rectangles.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Scenario {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub blocked: Vec<Rect>,
    #[serde(default)]
    pub exclusion_area: Option<Rect>,
    pub relics: Vec<(Vec2, RelicSpec)>,
    pub loot: Vec<(Vec2, LootKind)>,
    pub explosion_range: f32,
    pub explosion_radius: f32,
    pub max_explosions: usize,
    pub starting_point: Vec2,
    #[serde(default)]
    pub is_logbook: bool,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Scenario, ScenarioError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn build_environment(self, settings: &PlannerSettings) -> Environment {
        let width = self.width;
        let height = self.height;
        let blocked = self.blocked;
        let relics = self
            .relics
            .iter()
            .map(|(pos, spec)| (*pos, spec.resolve(settings)))
            .collect();
        Environment {
            relics,
            loot: self.loot,
            explosion_range: self.explosion_range,
            explosion_radius: self.explosion_radius,
            max_explosions: self.max_explosions,
            starting_point: self.starting_point,
            is_walkable: Box::new(move |p| {
                p.x >= 0.0
                    && p.y >= 0.0
                    && p.x < width
                    && p.y < height
                    && !blocked.iter().any(|rect| rect.contains(&p))
            }),
            exclusion_area: self.exclusion_area.unwrap_or(Rect::EMPTY),
            is_logbook: self.is_logbook,
        }
    }

    /// Synthesizes a random but plausible dig site for demos and benches.
    pub fn random(seed: u64) -> Scenario {
        const CHESTS: [ChestKind; 6] = [
            ChestKind::League,
            ChestKind::Currency,
            ChestKind::Weapon,
            ChestKind::Maps,
            ChestKind::Fossils,
            ChestKind::Other,
        ];
        let mut rng = SmallRng::seed_from_u64(seed);
        let width = 220.0;
        let height = 220.0;
        let starting_point = Vec2::new(30.0, 110.0);

        let mut blocked = Vec::new();
        while blocked.len() < 5 {
            let min = Vec2::new(rng.gen_range(0.0..width - 30.0), rng.gen_range(0.0..height - 30.0));
            let rect = Rect::new(
                min,
                min + Vec2::new(rng.gen_range(10.0..30.0), rng.gen_range(10.0..30.0)),
            );
            if !rect.contains(&starting_point) {
                blocked.push(rect);
            }
        }

        let random_point = |rng: &mut SmallRng| {
            Vec2::new(rng.gen_range(10.0..width - 10.0), rng.gen_range(10.0..height - 10.0)).round()
        };

        let loot = (0..40)
            .map(|_| {
                let kind = match rng.gen_range(0..10) {
                    0..=1 => LootKind::RunicMonster,
                    2..=4 => LootKind::Chest(CHESTS[rng.gen_range(0..CHESTS.len())]),
                    _ => LootKind::NormalMonster,
                };
                (random_point(&mut rng), kind)
            })
            .collect();

        const EFFECTS: [RelicEffectKind; 4] = [
            RelicEffectKind::Logbooks,
            RelicEffectKind::PackSize,
            RelicEffectKind::Artifacts,
            RelicEffectKind::QuantityExcavatedChest,
        ];
        let relics = (0..6)
            .map(|_| {
                let spec = match rng.gen_range(0..6) {
                    0 => RelicSpec::Custom(RelicKind::DoubledMonsters),
                    1 => RelicSpec::Custom(RelicKind::Warning),
                    _ => RelicSpec::Effect(EFFECTS[rng.gen_range(0..EFFECTS.len())]),
                };
                (random_point(&mut rng), spec)
            })
            .collect();

        Scenario {
            width,
            height,
            blocked,
            exclusion_area: None,
            relics,
            loot,
            explosion_range: 30.0,
            explosion_radius: 10.0,
            max_explosions: 8,
            starting_point,
            is_logbook: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let scenario = Scenario::random(11);
        let json = serde_json::to_string_pretty(&scenario).unwrap();
        let parsed: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.loot, scenario.loot);
        assert_eq!(parsed.relics, scenario.relics);
        assert_eq!(parsed.blocked, scenario.blocked);
        assert_eq!(parsed.starting_point, scenario.starting_point);
    }

    fn basic_scenario() -> Scenario {
        Scenario {
            width: 100.0,
            height: 100.0,
            blocked: vec![Rect::new(Vec2::new(40.0, 40.0), Vec2::new(60.0, 60.0))],
            exclusion_area: None,
            relics: vec![],
            loot: vec![],
            explosion_range: 20.0,
            explosion_radius: 5.0,
            max_explosions: 3,
            starting_point: Vec2::new(10.0, 10.0),
            is_logbook: false,
        }
    }

    #[test]
    fn test_environment_walkability_honors_blocks_and_bounds() {
        let environment = basic_scenario().build_environment(&PlannerSettings::default());
        assert!((environment.is_walkable)(Vec2::new(10.0, 10.0)));
        assert!(!(environment.is_walkable)(Vec2::new(50.0, 50.0)));
        assert!(!(environment.is_walkable)(Vec2::new(-1.0, 10.0)));
        assert!(!(environment.is_walkable)(Vec2::new(10.0, 100.0)));
    }

    #[test]
    fn test_relic_effects_resolve_through_settings() {
        let mut scenario = basic_scenario();
        scenario.relics = vec![
            (Vec2::new(20.0, 20.0), RelicSpec::Effect(RelicEffectKind::Logbooks)),
            (Vec2::new(30.0, 20.0), RelicSpec::Effect(RelicEffectKind::QuantityExcavatedChest)),
            // Not in the default map, resolves to the neutral effect.
            (Vec2::new(40.0, 20.0), RelicSpec::Effect(RelicEffectKind::Experience)),
            (Vec2::new(50.0, 20.0), RelicSpec::Custom(RelicKind::Warning)),
        ];
        let environment = scenario.build_environment(&PlannerSettings::default());
        assert_eq!(
            environment.relics[0].1,
            RelicKind::Configurable { multiplier: 1.5, increase: 0.0, applies_to_monsters: true }
        );
        assert_eq!(
            environment.relics[1].1,
            RelicKind::Configurable { multiplier: 1.0, increase: 0.4, applies_to_monsters: false }
        );
        assert_eq!(
            environment.relics[2].1,
            RelicKind::Configurable { multiplier: 1.0, increase: 0.0, applies_to_monsters: true }
        );
        assert_eq!(environment.relics[3].1, RelicKind::Warning);
    }

    #[test]
    fn test_random_scenario_start_is_walkable() {
        for seed in 0..20 {
            let scenario = Scenario::random(seed);
            let start = scenario.starting_point;
            let environment = scenario.build_environment(&PlannerSettings::default());
            assert!((environment.is_walkable)(start), "seed {} blocks the start", seed);
        }
    }
}
