use log::{error, info};
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::environment::Environment;
use crate::geometry::Vec2;
use crate::planner::{PathPlanner, PlannerSettings, Search};
use crate::scorer::{DetailedLootScore, Scorer};

/// Sound name handed to the completion notifier.
pub const FINISH_SOUND: &str = "expedition_attention";

// Identity-keyed memoization of detailed scores; bounded since unbounded
// growth in the original was incidental.
const DETAIL_CACHE_SIZE: usize = 8;

/// Best-effort "play a named sound" side effect, fired at most once per
/// start/stop cycle. Implementations swallow their own failures.
pub trait CompletionNotifier: Send + Sync {
    fn notify(&self, sound: &str);
}

/// Latest snapshot from one search worker. Each worker overwrites only its
/// own slot, once per generation.
#[derive(Debug, Clone)]
pub struct BestValue {
    pub path: Arc<Vec<Vec2>>,
    pub score: f64,
    pub generation: u64,
    pub last_generation: Duration,
}

#[derive(Error, Debug)]
pub enum StartError {
    #[error("a planning session is already running")]
    AlreadyRunning,
    #[error("path generation size must be at least 1")]
    EmptyGeneration,
    #[error("the starting point is not walkable, no path can be anchored there")]
    BlockedStartingPoint,
}

type Slots = Arc<Vec<Mutex<Option<BestValue>>>>;

struct Session {
    scorer: Scorer,
    environment: Arc<Environment>,
}

/// Runs a fixed pool of independent search workers racing against a
/// wall-clock budget, and aggregates their per-worker bests for the
/// presentation layer to poll.
pub struct PlannerRunner {
    cancel: Arc<AtomicBool>,
    alive: Arc<AtomicUsize>,
    slots: Slots,
    session: Option<Session>,
    detail_cache: Vec<(Arc<Vec<Vec2>>, Arc<DetailedLootScore>)>,
}

impl Default for PlannerRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerRunner {
    pub fn new() -> Self {
        PlannerRunner {
            cancel: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicUsize::new(0)),
            slots: Arc::new(Vec::new()),
            session: None,
            detail_cache: Vec::new(),
        }
    }

    /// Spawns the worker pool. Precondition failures surface here,
    /// synchronously, before any worker starts; after that no error ever
    /// crosses the session boundary.
    pub fn start(
        &mut self,
        settings: PlannerSettings,
        environment: Environment,
        notifier: Option<Arc<dyn CompletionNotifier>>,
    ) -> Result<(), StartError> {
        if self.is_running() {
            return Err(StartError::AlreadyRunning);
        }
        if settings.path_generation_size == 0 {
            return Err(StartError::EmptyGeneration);
        }
        if !(environment.is_walkable)(environment.starting_point) {
            return Err(StartError::BlockedStartingPoint);
        }

        let environment = Arc::new(environment);
        let thread_count = settings.search_threads.max(1);
        info!(
            "starting path planner: {} workers, {:.1}s budget, {:?}",
            thread_count, settings.maximum_generation_time_seconds, environment
        );

        self.cancel = Arc::new(AtomicBool::new(false));
        // One unit per worker plus one for the coordinator, so is_running
        // stays true until the completion notification has fired.
        self.alive = Arc::new(AtomicUsize::new(thread_count + 1));
        self.slots = Arc::new((0..thread_count).map(|_| Mutex::new(None)).collect());
        self.detail_cache.clear();
        self.session = Some(Session {
            scorer: Scorer::new(&settings, &environment),
            environment: environment.clone(),
        });

        let base_seed = settings.seed.unwrap_or_else(rand::random);
        let cancel = self.cancel.clone();
        let alive = self.alive.clone();
        let slots = self.slots.clone();
        thread::spawn(move || {
            let workers: Vec<_> = (0..thread_count)
                .map(|worker| {
                    let settings = settings.clone();
                    let environment = environment.clone();
                    let slots = slots.clone();
                    let cancel = cancel.clone();
                    let alive = alive.clone();
                    let seed = base_seed.wrapping_add((worker as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                    thread::spawn(move || {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            run_worker(worker, seed, settings, environment, slots, cancel);
                        }));
                        if result.is_err() {
                            // The worker stops contributing; its last
                            // snapshot stays in the slot.
                            error!("search worker {} failed", worker);
                        }
                        alive.fetch_sub(1, AtomicOrdering::SeqCst);
                    })
                })
                .collect();

            for handle in workers {
                let _ = handle.join();
            }
            info!("path planner finished");
            if settings.play_sound_on_finish {
                if let Some(notifier) = &notifier {
                    notifier.notify(FINISH_SOUND);
                }
            }
            alive.fetch_sub(1, AtomicOrdering::SeqCst);
        });

        Ok(())
    }

    /// Cooperative: each worker observes the flag at the next generation
    /// boundary, so one slow generation delays shutdown.
    pub fn stop(&self) {
        self.cancel.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(AtomicOrdering::SeqCst) > 0
    }

    /// Max score across all worker slots; 0 until any worker has finished a
    /// generation.
    pub fn current_best_score(&self) -> f64 {
        self.slots
            .iter()
            .filter_map(|slot| lock_slot(slot).as_ref().map(|value| value.score))
            .fold(0.0, f64::max)
    }

    /// Detailed breakdown of the best path across all workers, memoized by
    /// path identity so per-frame polling against an unchanged best is free.
    pub fn current_best_path(&mut self) -> Option<Arc<DetailedLootScore>> {
        let best = self
            .slots
            .iter()
            .filter_map(|slot| lock_slot(slot).clone())
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))?;

        if let Some(hit) = self
            .detail_cache
            .iter()
            .position(|(path, _)| Arc::ptr_eq(path, &best.path))
        {
            let entry = self.detail_cache.remove(hit);
            let detailed = entry.1.clone();
            self.detail_cache.insert(0, entry);
            return Some(detailed);
        }

        let session = self.session.as_ref()?;
        let detailed = Arc::new(session.scorer.detailed_score(&best.path, &session.environment));
        self.detail_cache.insert(0, (best.path, detailed.clone()));
        self.detail_cache.truncate(DETAIL_CACHE_SIZE);
        Some(detailed)
    }

    /// Per-worker snapshots, for inspection (generation counters, last
    /// generation duration).
    pub fn best_values(&self) -> Vec<Option<BestValue>> {
        self.slots.iter().map(|slot| lock_slot(slot).clone()).collect()
    }
}

// A panicking worker must not poison the slot against its readers.
fn lock_slot(slot: &Mutex<Option<BestValue>>) -> std::sync::MutexGuard<'_, Option<BestValue>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_worker(
    worker: usize,
    seed: u64,
    settings: PlannerSettings,
    environment: Arc<Environment>,
    slots: Slots,
    cancel: Arc<AtomicBool>,
) {
    let time_budget = Duration::from_secs_f32(settings.maximum_generation_time_seconds.max(0.0));
    let scorer = Scorer::new(&settings, &environment);
    let planner = PathPlanner::new(settings, seed);
    let mut search = Search::new(planner, scorer, environment);

    let started = Instant::now();
    let mut generation_timer = Instant::now();
    let mut generation = 0u64;
    while let Some(state) = search.step() {
        generation += 1;
        *lock_slot(&slots[worker]) = Some(BestValue {
            path: state.points,
            score: state.score,
            generation,
            last_generation: generation_timer.elapsed(),
        });
        generation_timer = Instant::now();

        // Checked after the write, so even a zero budget publishes one
        // generation.
        if started.elapsed() >= time_budget || cancel.load(AtomicOrdering::Relaxed) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{LootKind, RelicKind};
    use crate::geometry::Rect;
    use std::sync::atomic::AtomicUsize;

    fn make_environment() -> Environment {
        Environment {
            relics: vec![(
                Vec2::new(25.0, 0.0),
                RelicKind::Configurable { multiplier: 2.0, increase: 0.0, applies_to_monsters: true },
            )],
            loot: vec![
                (Vec2::new(20.0, 0.0), LootKind::NormalMonster),
                (Vec2::new(30.0, 5.0), LootKind::NormalMonster),
            ],
            explosion_range: 20.0,
            explosion_radius: 8.0,
            max_explosions: 3,
            starting_point: Vec2::new(0.0, 0.0),
            is_walkable: Box::new(|_| true),
            exclusion_area: Rect::EMPTY,
            is_logbook: false,
        }
    }

    fn fast_settings() -> PlannerSettings {
        PlannerSettings {
            search_threads: 2,
            maximum_generation_time_seconds: 0.2,
            path_generation_size: 10,
            normal_monster_weight: 1.0,
            seed: Some(17),
            ..PlannerSettings::default()
        }
    }

    fn wait_until_stopped(runner: &PlannerRunner) {
        for _ in 0..500 {
            if !runner.is_running() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("runner did not stop in time");
    }

    struct CountingNotifier(AtomicUsize);

    impl CompletionNotifier for CountingNotifier {
        fn notify(&self, _sound: &str) {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    #[test]
    fn test_start_rejects_blocked_starting_point() {
        let mut environment = make_environment();
        environment.is_walkable = Box::new(|_| false);
        let mut runner = PlannerRunner::new();
        let result = runner.start(fast_settings(), environment, None);
        assert!(matches!(result, Err(StartError::BlockedStartingPoint)));
        assert!(!runner.is_running());
    }

    #[test]
    fn test_start_rejects_empty_generation() {
        let mut runner = PlannerRunner::new();
        let settings = PlannerSettings { path_generation_size: 0, ..fast_settings() };
        let result = runner.start(settings, make_environment(), None);
        assert!(matches!(result, Err(StartError::EmptyGeneration)));
    }

    #[test]
    fn test_run_to_completion_finds_loot() {
        let mut runner = PlannerRunner::new();
        let notifier = Arc::new(CountingNotifier(AtomicUsize::new(0)));
        runner
            .start(fast_settings(), make_environment(), Some(notifier.clone()))
            .unwrap();
        wait_until_stopped(&runner);

        // Both loot items are trivially reachable within 3 explosions.
        assert!(runner.current_best_score() > 0.0);
        let detailed = runner.current_best_path().expect("no best path");
        assert!(detailed.total_score > 0.0);
        assert_eq!(notifier.0.load(AtomicOrdering::SeqCst), 1);

        let values = runner.best_values();
        assert_eq!(values.len(), 2);
        for value in values.iter().flatten() {
            assert!(value.generation >= 1);
        }
    }

    #[test]
    fn test_best_path_query_is_memoized() {
        let mut runner = PlannerRunner::new();
        runner.start(fast_settings(), make_environment(), None).unwrap();
        wait_until_stopped(&runner);

        let first = runner.current_best_path().expect("no best path");
        let second = runner.current_best_path().expect("no best path");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_stop_is_responsive() {
        let mut runner = PlannerRunner::new();
        let settings = PlannerSettings {
            maximum_generation_time_seconds: 60.0,
            ..fast_settings()
        };
        runner.start(settings, make_environment(), None).unwrap();
        assert!(runner.is_running());
        runner.stop();
        wait_until_stopped(&runner);
    }

    #[test]
    fn test_second_start_while_running_is_rejected() {
        let mut runner = PlannerRunner::new();
        let settings = PlannerSettings {
            maximum_generation_time_seconds: 60.0,
            ..fast_settings()
        };
        runner.start(settings.clone(), make_environment(), None).unwrap();
        let result = runner.start(settings, make_environment(), None);
        assert!(matches!(result, Err(StartError::AlreadyRunning)));
        runner.stop();
        wait_until_stopped(&runner);
    }

    #[test]
    fn test_no_best_before_any_start() {
        let mut runner = PlannerRunner::new();
        assert!(!runner.is_running());
        assert_eq!(runner.current_best_score(), 0.0);
        assert!(runner.current_best_path().is_none());
    }
}
