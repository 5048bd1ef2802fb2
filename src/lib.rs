//! Anytime stochastic local-search planner for expedition explosive
//! placement: given loot, relics and explosion geometry, race a pool of
//! independent generational searches to find a bounded sequence of explosion
//! points with maximal collected loot value.

pub mod environment;
pub mod geometry;
pub mod planner;
pub mod runner;
pub mod scenario;
pub mod scorer;
