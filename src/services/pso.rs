//! Particle swarm optimizer.
//!
//! The built-in implementation of the optimizer capability: global-best
//! PSO with inertia damping and bound clamping. Deterministic when
//! seeded, which the tests rely on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::ports::{FitnessFn, Optimizer};

const DEFAULT_INERTIA: f64 = 0.72;
const DEFAULT_COGNITIVE: f64 = 1.49;
const DEFAULT_SOCIAL: f64 = 1.49;
/// Leaders tracked by `select_leaders`.
const LEADER_COUNT: usize = 3;

/// Global-best particle swarm.
pub struct ParticleSwarm {
    rng: StdRng,
    inertia: f64,
    cognitive: f64,
    social: f64,
    bounds: Vec<(f64, f64)>,
    positions: Vec<Vec<f64>>,
    velocities: Vec<Vec<f64>>,
    personal_best: Vec<Vec<f64>>,
    personal_best_fitness: Vec<f64>,
    leaders: Vec<usize>,
    best_position: Vec<f64>,
    best_fitness: f64,
}

impl ParticleSwarm {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Seeded construction for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            inertia: DEFAULT_INERTIA,
            cognitive: DEFAULT_COGNITIVE,
            social: DEFAULT_SOCIAL,
            bounds: Vec::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
            personal_best: Vec::new(),
            personal_best_fitness: Vec::new(),
            leaders: Vec::new(),
            best_position: Vec::new(),
            best_fitness: f64::INFINITY,
        }
    }

    /// Current leader indices, best first.
    pub fn leaders(&self) -> &[usize] {
        &self.leaders
    }

    fn clamp_into_bounds(&self, position: &mut [f64]) {
        for (value, (lo, hi)) in position.iter_mut().zip(&self.bounds) {
            *value = value.clamp(*lo, *hi);
        }
    }

    fn score(&mut self, index: usize, fitness: FitnessFn<'_>) {
        let raw = fitness(&self.positions[index]);
        let value = if raw.is_finite() { raw } else { f64::INFINITY };
        if value < self.personal_best_fitness[index] {
            self.personal_best_fitness[index] = value;
            self.personal_best[index] = self.positions[index].clone();
        }
        if value < self.best_fitness {
            self.best_fitness = value;
            self.best_position = self.positions[index].clone();
        }
    }
}

impl Default for ParticleSwarm {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimizer for ParticleSwarm {
    fn name(&self) -> &'static str {
        "pso"
    }

    fn initialize(&mut self, particles: usize, bounds: &[(f64, f64)]) {
        let particles = particles.max(1);
        self.bounds = bounds.to_vec();
        self.positions.clear();
        self.velocities.clear();
        self.personal_best.clear();
        self.personal_best_fitness.clear();
        self.leaders.clear();
        self.best_position = Vec::new();
        self.best_fitness = f64::INFINITY;

        for _ in 0..particles {
            let position: Vec<f64> = bounds
                .iter()
                .map(|(lo, hi)| self.rng.gen_range(*lo..=*hi))
                .collect();
            let velocity: Vec<f64> = bounds
                .iter()
                .map(|(lo, hi)| {
                    let span = hi - lo;
                    self.rng.gen_range(-span..=span) * 0.1
                })
                .collect();
            self.personal_best.push(position.clone());
            self.personal_best_fitness.push(f64::INFINITY);
            self.positions.push(position);
            self.velocities.push(velocity);
        }
    }

    fn update_positions(&mut self, fitness: FitnessFn<'_>) {
        if self.positions.is_empty() {
            return;
        }
        // First pass seeds the incumbent best before any movement
        if self.best_position.is_empty() {
            self.evaluate(fitness);
        }

        // With no finite score yet there is no incumbent to steer toward
        let global = if self.best_position.is_empty() {
            None
        } else {
            Some(self.best_position.clone())
        };
        for i in 0..self.positions.len() {
            for d in 0..self.bounds.len() {
                let r_cognitive: f64 = self.rng.gen();
                let r_social: f64 = self.rng.gen();
                let social_pull = global
                    .as_ref()
                    .map_or(0.0, |g| g[d] - self.positions[i][d]);
                let velocity = self.inertia * self.velocities[i][d]
                    + self.cognitive * r_cognitive * (self.personal_best[i][d] - self.positions[i][d])
                    + self.social * r_social * social_pull;
                self.velocities[i][d] = velocity;
                self.positions[i][d] += velocity;
            }
            let mut position = std::mem::take(&mut self.positions[i]);
            self.clamp_into_bounds(&mut position);
            self.positions[i] = position;
            self.score(i, fitness);
        }
    }

    fn evaluate(&mut self, fitness: FitnessFn<'_>) {
        for i in 0..self.positions.len() {
            self.score(i, fitness);
        }
    }

    fn select_leaders(&mut self) {
        let mut ranked: Vec<usize> = (0..self.personal_best_fitness.len()).collect();
        ranked.sort_by(|a, b| {
            self.personal_best_fitness[*a]
                .partial_cmp(&self.personal_best_fitness[*b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(LEADER_COUNT);
        self.leaders = ranked;
    }

    fn best_position(&self) -> Vec<f64> {
        self.best_position.clone()
    }

    fn best_fitness(&self) -> f64 {
        self.best_fitness
    }
}
