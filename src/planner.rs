use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::environment::{ChestKind, Environment, RelicEffectKind};
use crate::geometry::{Vec2, ORIGIN};
use crate::scorer::Scorer;

// Candidate radii shrink by the decay factor on every attempt; after the
// last attempt the anchor point itself is the fallback.
const CANDIDATE_ATTEMPTS: i32 = 1000;
const CANDIDATE_RADIUS_DECAY: f32 = 0.99;

const POINT_REPLACE_TRIES: usize = 10;

/// Configured strength of one relic effect category.
#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone)]
#[serde(default)]
pub struct RelicSettings {
    pub multiplier: f64,
    pub increase: f64,
}

impl Default for RelicSettings {
    fn default() -> Self {
        RelicSettings { multiplier: 1.0, increase: 0.0 }
    }
}

/// Tunables for the search, plus the loot weights the scorer folds into its
/// base-value table. Serializable so runs can load them from a JSON file.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PlannerSettings {
    /// Number of independent search workers racing each other.
    pub search_threads: usize,

    /// Per-worker wall-clock budget, measured from that worker's own start.
    pub maximum_generation_time_seconds: f32,

    /// Survivor count per generation.
    pub path_generation_size: usize,

    /// Probability that a survivor copy gets mutated.
    pub path_mutate_chance: f64,

    /// Fresh random paths injected per generation, as a fraction of the
    /// generation size.
    pub new_random_path_injection_rate: f64,

    /// Extra samples validated along each segment, on top of the endpoint.
    pub validated_intermediate_points: usize,

    pub runic_monster_weight: f64,
    pub runic_monster_logbook_weight: f64,
    pub normal_monster_weight: f64,
    pub chest_weights: HashMap<ChestKind, f64>,
    /// Effect strength per named relic category; unlisted categories fall
    /// back to a neutral effect.
    pub relic_settings: HashMap<RelicEffectKind, RelicSettings>,

    /// Fire the completion notifier when the session ends.
    pub play_sound_on_finish: bool,

    /// Base seed for the search workers; random when absent.
    pub seed: Option<u64>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        PlannerSettings {
            search_threads: 5,
            maximum_generation_time_seconds: 5.0,
            path_generation_size: 100,
            path_mutate_chance: 0.5,
            new_random_path_injection_rate: 1.0,
            validated_intermediate_points: 1,
            runic_monster_weight: 3.0,
            runic_monster_logbook_weight: 3.0,
            normal_monster_weight: 0.2,
            chest_weights: HashMap::from([(ChestKind::League, 2.0)]),
            relic_settings: HashMap::from([
                (RelicEffectKind::Logbooks, RelicSettings { multiplier: 1.5, increase: 0.0 }),
                (RelicEffectKind::PackSize, RelicSettings { multiplier: 1.25, increase: 0.0 }),
                (RelicEffectKind::Artifacts, RelicSettings { multiplier: 1.0, increase: 0.4 }),
                (
                    RelicEffectKind::ArtifactsExcavatedChest,
                    RelicSettings { multiplier: 1.0, increase: 0.4 },
                ),
                (RelicEffectKind::Quantity, RelicSettings { multiplier: 1.0, increase: 0.4 }),
                (
                    RelicEffectKind::QuantityExcavatedChest,
                    RelicSettings { multiplier: 1.0, increase: 0.4 },
                ),
            ]),
            play_sound_on_finish: true,
            seed: None,
        }
    }
}

/// Stochastic generator and mutator of explosion paths. Owns its RNG; one
/// instance per search worker.
pub struct PathPlanner {
    settings: PlannerSettings,
    // validated_intermediate_points + 1, so the segment endpoint is always
    // sampled.
    validated_points: usize,
    rng: SmallRng,
}

impl PathPlanner {
    pub fn new(settings: PlannerSettings, seed: u64) -> Self {
        let validated_points = settings.validated_intermediate_points + 1;
        PathPlanner {
            settings,
            validated_points,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// A point placement is valid when it is within travel range of its
    /// predecessor, lands outside the exclusion area, and the sampled segment
    /// from the predecessor is fully walkable. Validity never depends on
    /// later points.
    fn is_valid_placement(
        &self,
        previous: &Vec2,
        position: &Vec2,
        environment: &Environment,
    ) -> bool {
        previous.distance_less_than_or_equal(position, environment.explosion_range)
            && !environment.exclusion_area.contains(position)
            && (1..=self.validated_points).all(|i| {
                let t = i as f32 / self.validated_points as f32;
                (environment.is_walkable)(previous.lerp(position, t))
            })
    }

    /// First valid candidate around 'anchor' at successively shrinking radii,
    /// validated against 'previous'. Falls back to the anchor itself when
    /// every attempt fails, so path building always terminates even in a
    /// fully blocked environment (at the cost of a stuck point).
    fn next_position(
        &mut self,
        anchor: Vec2,
        previous: Vec2,
        radius: f32,
        environment: &Environment,
    ) -> Vec2 {
        for i in 1..=CANDIDATE_ATTEMPTS {
            let candidate = Self::next_maybe_invalid_position(
                &mut self.rng,
                anchor,
                radius * CANDIDATE_RADIUS_DECAY.powi(i),
            );
            if self.is_valid_placement(&previous, &candidate, environment) {
                return candidate;
            }
        }
        anchor
    }

    /// Random grid point within 'radius' of 'anchor', without any validity
    /// check. Half the time the length is drawn as max(U1, U2), biasing
    /// toward longer hops; rounding can push the point past the radius, so
    /// it is clamped back by trimming the dominant axis.
    fn next_maybe_invalid_position(rng: &mut SmallRng, anchor: Vec2, radius: f32) -> Vec2 {
        let radius = radius.max(1.0);
        let length = if rng.gen_bool(0.5) {
            radius
        } else {
            Self::weighted_length(rng, radius)
        }
        .max(1.0);
        let angle = rng.gen::<f32>() * std::f32::consts::TAU;
        let (sin, cos) = angle.sin_cos();
        let mut point = (anchor + Vec2::new(cos * length, sin * length)).round();
        while !point.distance_less_than_or_equal(&anchor, radius) {
            let diff = point - anchor;
            if diff.x.abs() > diff.y.abs() {
                point.x -= diff.x.signum();
            } else {
                point.y -= diff.y.signum();
            }
        }
        point
    }

    fn weighted_length(rng: &mut SmallRng, radius: f32) -> f32 {
        rng.gen::<f32>().max(rng.gen::<f32>()) * radius
    }

    /// Builds a random path of exactly 'max_explosions' points. Half the
    /// time it starts by walking straight toward a random relic, then fills
    /// the remaining budget with random hops.
    pub fn build_path(&mut self, environment: &Environment) -> Vec<Vec2> {
        let mut path = Vec::with_capacity(environment.max_explosions);
        if environment.max_explosions == 0 {
            return path;
        }

        if self.rng.gen_bool(0.5) && !environment.relics.is_empty() {
            let seek_range = environment.explosion_range * 0.9;
            let (relic_pos, _) = environment.relics[self.rng.gen_range(0..environment.relics.len())];
            let mut current = environment.starting_point;
            loop {
                let diff = relic_pos - current;
                if diff.length() < seek_range {
                    current = relic_pos;
                } else {
                    current = current + diff * (seek_range / diff.length());
                }
                path.push(current.round());

                let previous = if path.len() >= 2 {
                    path[path.len() - 2]
                } else {
                    environment.starting_point
                };
                if !self.is_valid_placement(&previous, &path[path.len() - 1], environment) {
                    path.pop();
                    break;
                }

                if current.distance_less_than_or_equal(&relic_pos, environment.explosion_radius)
                    || path.len() >= environment.max_explosions
                {
                    break;
                }
            }
        }

        let mut point = *path.last().unwrap_or(&environment.starting_point);
        while path.len() < environment.max_explosions {
            point = self.next_position(point, point, environment.explosion_range, environment);
            path.push(point);
        }

        path
    }

    /// Returns a mutated copy of 'original'; the input is untouched.
    /// Applies 1-3 rounds; each round tries the skip and swap operators
    /// behind coin flips and falls back to replacing a single point.
    pub fn mutate_path(
        &mut self,
        starting_point: Vec2,
        radius: f32,
        original: &[Vec2],
        environment: &Environment,
    ) -> Vec<Vec2> {
        let mutate_times = self.rng.gen_range(1..4);
        let mut path = original.to_vec();
        for _ in 0..mutate_times {
            if self.rng.gen_bool(0.5) && self.try_apply_skip_mutation(&mut path, environment) {
                continue;
            }

            if self.rng.gen_bool(0.5) && self.try_apply_swap_mutation(&mut path, environment) {
                continue;
            }

            if path.is_empty() {
                continue;
            }
            let change_index = self.rng.gen_range(0..path.len());
            let previous = if change_index == 0 {
                starting_point
            } else {
                path[change_index - 1]
            };
            let current = path[change_index];
            let mut changed = current;
            let mut valid_change = false;
            for _ in 0..=POINT_REPLACE_TRIES {
                changed = if self.rng.gen_bool(0.5) {
                    self.next_position(previous, previous, radius, environment)
                } else {
                    // Shrunk radius keeps the replacement near the current
                    // point.
                    let allowed_radius =
                        (radius - previous.distance(&current)).max(radius / 5.0);
                    self.next_position(current, previous, allowed_radius, environment)
                };
                valid_change = previous.distance_less_than_or_equal(&changed, radius)
                    && (change_index == path.len() - 1
                        || self.is_valid_placement(&changed, &path[change_index + 1], environment));
                if valid_change {
                    break;
                }
            }

            if valid_change {
                path[change_index] = changed;
            }
        }

        path
    }

    /// Either inserts the midpoint of a random adjacent pair (dropping the
    /// tail point), or removes a skippable point and appends a fresh one at
    /// max range. Preserves path length either way.
    fn try_apply_skip_mutation(&mut self, path: &mut Vec<Vec2>, environment: &Environment) -> bool {
        if path.len() < 3 {
            return false;
        }
        let interior = path.len() - 2;

        let mut offset = self.rng.gen_range(0..=interior);
        if offset == interior {
            let injection_index = self.rng.gen_range(0..interior);
            let midpoint = ((path[injection_index] + path[injection_index + 1]) * 0.5).round();
            if self.is_valid_placement(&path[injection_index], &midpoint, environment)
                && self.is_valid_placement(&midpoint, &path[injection_index + 1], environment)
            {
                path.pop();
                path.insert(injection_index + 1, midpoint);
                return true;
            }

            offset = 0;
        }

        for i in 0..interior {
            let check_index = 1 + (i + offset) % interior;
            if self.is_valid_placement(&path[check_index - 1], &path[check_index + 1], environment)
            {
                path.remove(check_index);
                let last = path[path.len() - 1];
                let appended =
                    self.next_position(last, last, environment.explosion_range, environment);
                path.push(appended);
                return true;
            }
        }

        false
    }

    /// Swaps two adjacent points when all four affected segments stay valid.
    fn try_apply_swap_mutation(&mut self, path: &mut [Vec2], environment: &Environment) -> bool {
        if path.len() < 4 {
            return false;
        }
        let count = path.len() - 3;

        let offset = self.rng.gen_range(0..count);
        for i in 0..count {
            let check_index = 1 + (i + offset) % count;
            if self.is_valid_placement(&path[check_index - 1], &path[check_index + 1], environment)
                && self.is_valid_placement(&path[check_index], &path[check_index + 2], environment)
            {
                path.swap(check_index, check_index + 1);
                return true;
            }
        }

        false
    }
}

/// Best path seen so far by one search, with its score.
#[derive(Debug, Clone)]
pub struct PathState {
    pub points: Arc<Vec<Vec2>>,
    pub score: f64,
}

/// One worker's generational local-search loop. 'step' runs a single
/// generation and yields the improving-or-equal best; the loop is unbounded,
/// termination belongs to the caller. Also usable as an 'Iterator'.
pub struct Search {
    planner: PathPlanner,
    scorer: Scorer,
    environment: Arc<Environment>,
    batch: Vec<Vec<Vec2>>,
    best_path: Arc<Vec<Vec2>>,
    best_score: f64,
    exhausted: bool,
}

impl Search {
    pub fn new(mut planner: PathPlanner, scorer: Scorer, environment: Arc<Environment>) -> Self {
        // The very first batch is double-sized; survivors halve it.
        let batch = if environment.max_explosions > 0 {
            (0..planner.settings.path_generation_size * 2)
                .map(|_| planner.build_path(&environment))
                .collect()
        } else {
            Vec::new()
        };
        let best_path = Arc::new(vec![ORIGIN; environment.max_explosions]);
        let best_score = scorer.score(&best_path, &environment);
        Search {
            planner,
            scorer,
            environment,
            batch,
            best_path,
            best_score,
            exhausted: false,
        }
    }

    pub fn best(&self) -> PathState {
        PathState { points: self.best_path.clone(), score: self.best_score }
    }

    /// Runs one generation: score the batch, keep the top generation-size
    /// paths, rebuild the batch from mutated survivor copies plus fresh
    /// random paths plus the best-ever path (elitism). Returns None only for
    /// a zero explosion budget, after yielding the empty path once.
    pub fn step(&mut self) -> Option<PathState> {
        if self.environment.max_explosions == 0 {
            if self.exhausted {
                return None;
            }
            self.exhausted = true;
            return Some(PathState { points: Arc::new(Vec::new()), score: 0.0 });
        }

        let environment = self.environment.clone();
        let generation_size = self.planner.settings.path_generation_size;
        let mutate_chance = self.planner.settings.path_mutate_chance;
        let injection_count = (generation_size as f64
            * self.planner.settings.new_random_path_injection_rate)
            as usize;

        let survivors = self
            .batch
            .drain(..)
            .map(|path| (self.scorer.score(&path, &environment), path))
            .sorted_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal))
            .take(generation_size)
            .collect_vec();

        let mut next_batch =
            Vec::with_capacity(survivors.len() * 2 + injection_count + 1);
        for _ in 0..2 {
            for (_, path) in &survivors {
                if self.planner.rng.gen::<f64>() > mutate_chance {
                    next_batch.push(path.clone());
                } else {
                    next_batch.push(self.planner.mutate_path(
                        environment.starting_point,
                        environment.explosion_range,
                        path,
                        &environment,
                    ));
                }
            }
        }
        next_batch.push(self.best_path.as_ref().clone());
        for _ in 0..injection_count {
            next_batch.push(self.planner.build_path(&environment));
        }

        // Elitism: the best path is only ever replaced by a strictly better
        // one, so the yielded score never decreases.
        if let Some((top_score, top_path)) = survivors.into_iter().next() {
            if top_score > self.best_score {
                self.best_path = Arc::new(top_path);
                self.best_score = top_score;
            }
        }

        self.batch = next_batch;
        Some(self.best())
    }
}

impl Iterator for Search {
    type Item = PathState;

    fn next(&mut self) -> Option<PathState> {
        self.step()
    }
}
