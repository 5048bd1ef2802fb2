use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use expedition_planner::environment::Environment;
use expedition_planner::planner::{PathPlanner, PlannerSettings, Search};
use expedition_planner::scenario::Scenario;
use expedition_planner::scorer::Scorer;

fn make_environment() -> Arc<Environment> {
    Arc::new(Scenario::random(35334).build_environment(&PlannerSettings::default()))
}

fn bench_build_path(c: &mut Criterion) {
    let environment = make_environment();
    let mut planner = PathPlanner::new(PlannerSettings::default(), 1);
    c.bench_function("build_path", |b| b.iter(|| planner.build_path(&environment)));
}

fn bench_mutate_path(c: &mut Criterion) {
    let environment = make_environment();
    let mut planner = PathPlanner::new(PlannerSettings::default(), 2);
    let path = planner.build_path(&environment);
    c.bench_function("mutate_path", |b| {
        b.iter(|| {
            planner.mutate_path(
                environment.starting_point,
                environment.explosion_range,
                &path,
                &environment,
            )
        })
    });
}

fn bench_score(c: &mut Criterion) {
    let environment = make_environment();
    let settings = PlannerSettings::default();
    let scorer = Scorer::new(&settings, &environment);
    let mut planner = PathPlanner::new(settings, 3);
    let path = planner.build_path(&environment);
    c.bench_function("score", |b| b.iter(|| scorer.score(&path, &environment)));
}

fn bench_generation_step(c: &mut Criterion) {
    let environment = make_environment();
    let settings = PlannerSettings { path_generation_size: 20, ..PlannerSettings::default() };
    let scorer = Scorer::new(&settings, &environment);
    let planner = PathPlanner::new(settings, 4);
    let mut search = Search::new(planner, scorer, environment);
    c.bench_function("generation_step", |b| b.iter(|| search.step()));
}

criterion_group!(
    benches,
    bench_build_path,
    bench_mutate_path,
    bench_score,
    bench_generation_step
);
criterion_main!(benches);
