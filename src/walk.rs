//! WalkEngine: a goal-attracted softmax random walk over the
//! substrate graph. The per-candidate score blends an elo-strength term,
//! an observation-magnitude term, an observation-confidence sigmoid, S³
//! proximity to the current position, a flat locality term, goal
//! attraction, and repeat/novelty/energy penalties.

use crate::storage::Datastore;
use crate::substrate::Physicality;
use nalgebra::Vector4;
use rand::Rng;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct WalkParameters {
    pub w_model: f64,
    pub w_text: f64,
    pub w_rel: f64,
    pub w_geo: f64,
    pub w_hilbert: f64,
    pub w_repeat: f64,
    pub w_novelty: f64,
    pub goal_attraction: f64,
    pub w_energy: f64,
    pub base_temp: f64,
    pub energy_alpha: f64,
    pub energy_decay: f64,
    pub recent_window: usize,
}

impl Default for WalkParameters {
    fn default() -> Self {
        Self {
            w_model: 0.35,
            w_text: 0.40,
            w_rel: 0.15,
            w_geo: 0.05,
            w_hilbert: 0.05,
            w_repeat: 0.25,
            w_novelty: 0.15,
            goal_attraction: 2.0,
            w_energy: 0.10,
            base_temp: 0.4,
            energy_alpha: 0.6,
            energy_decay: 0.05,
            recent_window: 16,
        }
    }
}

/// Mutable state of one in-progress walk.
pub struct WalkState {
    pub current_composition: u128,
    pub current_position: Vector4<f64>,
    pub previous_position: Vector4<f64>,
    pub current_energy: f64,
    pub trajectory: Vec<u128>,
    pub visit_counts: HashMap<u128, u32>,
    pub recent: VecDeque<u128>,
    pub goal_composition: Option<u128>,
    pub goal_position: Option<Vector4<f64>>,
}

impl WalkState {
    pub fn new(start: u128, position: Vector4<f64>, initial_energy: f64) -> Self {
        let mut visit_counts = HashMap::new();
        visit_counts.insert(start, 1);
        Self {
            current_composition: start,
            current_position: position,
            previous_position: position,
            current_energy: initial_energy,
            trajectory: vec![start],
            visit_counts,
            recent: VecDeque::from([start]),
            goal_composition: None,
            goal_position: None,
        }
    }

    pub fn set_goal(&mut self, goal_id: u128, goal_position: Vector4<f64>) {
        self.goal_composition = Some(goal_id);
        self.goal_position = Some(goal_position);
    }
}

#[derive(Debug, Clone)]
pub struct WalkStepResult {
    pub next_composition: Option<u128>,
    pub probability: f64,
    pub energy_remaining: f64,
    pub terminated: bool,
    pub reason: String,
}

struct Candidate {
    id: u128,
    position: Vector4<f64>,
    elo: f64,
    observations: u32,
}

/// Graph-adjacent neighbors come from relations (capped at 500); spatial
/// neighbors come from a kNN query on the physicality index (capped at 20),
/// bounding per-step branching factor.
const MAX_GRAPH_NEIGHBORS: usize = 500;
const MAX_SPATIAL_NEIGHBORS: usize = 20;

pub struct WalkEngine<'a> {
    datastore: &'a dyn Datastore,
}

impl<'a> WalkEngine<'a> {
    pub fn new(datastore: &'a dyn Datastore) -> Self {
        Self { datastore }
    }

    pub async fn init_walk(&self, start: u128, initial_energy: f64) -> crate::error::Result<WalkState> {
        let comp = self
            .datastore
            .fetch_composition(start)
            .await?
            .ok_or_else(|| crate::error::SubstrateError::InvalidComposition(format!("{start:#x} not found")))?;
        let phys = self
            .datastore
            .fetch_physicality(comp.phys_id)
            .await?
            .ok_or_else(|| crate::error::SubstrateError::Invariant("composition missing physicality".into()))?;
        Ok(WalkState::new(start, phys.centroid, initial_energy))
    }

    /// Advance one step. Terminates when energy is exhausted or no
    /// candidates are reachable from the current position.
    pub async fn step(
        &self,
        state: &mut WalkState,
        params: &WalkParameters,
        rng: &mut impl Rng,
    ) -> crate::error::Result<WalkStepResult> {
        if state.current_energy <= 0.0 {
            return Ok(terminal_result(state, "out of energy"));
        }

        let candidates = self.get_candidates(state).await?;
        if candidates.is_empty() {
            return Ok(terminal_result(state, "trapped"));
        }

        let scores: Vec<f64> = candidates
            .iter()
            .map(|c| self.score_candidate(state, c, params))
            .collect();

        let temperature = (params.base_temp + params.energy_alpha * state.current_energy).max(1e-6);
        let probs = softmax(&scores, temperature);
        let index = select_index(&probs, rng);

        let chosen = &candidates[index];
        let probability = probs[index];

        state.previous_position = state.current_position;
        state.current_position = chosen.position;
        state.current_composition = chosen.id;
        state.trajectory.push(chosen.id);
        *state.visit_counts.entry(chosen.id).or_insert(0) += 1;
        state.recent.push_back(chosen.id);
        if state.recent.len() > params.recent_window {
            state.recent.pop_front();
        }
        state.current_energy = (state.current_energy - params.energy_decay).max(0.0);

        let terminated = state.current_energy <= 0.0
            || state.goal_composition == Some(chosen.id);
        let reason = if state.goal_composition == Some(chosen.id) {
            "goal reached".to_string()
        } else if terminated {
            "out of energy".to_string()
        } else {
            String::new()
        };

        Ok(WalkStepResult {
            next_composition: Some(chosen.id),
            probability,
            energy_remaining: state.current_energy,
            terminated,
            reason,
        })
    }

    async fn get_candidates(&self, state: &WalkState) -> crate::error::Result<Vec<Candidate>> {
        let mut seen = std::collections::HashSet::new();
        let mut candidates = Vec::new();

        let siblings = self
            .datastore
            .fetch_relation_neighbors(state.current_composition, MAX_GRAPH_NEIGHBORS)
            .await?;
        for n in siblings {
            if seen.insert(n.comp_id) {
                candidates.push(Candidate {
                    id: n.comp_id,
                    position: n.centroid,
                    elo: n.elo,
                    observations: n.observations,
                });
            }
        }

        let spatial = self
            .datastore
            .query_knn(&state.current_position, MAX_SPATIAL_NEIGHBORS + 1)
            .await?;
        for phys in spatial {
            if phys.phys_id == state.current_composition {
                continue;
            }
            if seen.insert(phys.phys_id) {
                candidates.push(build_candidate(phys.phys_id, &phys));
            }
        }

        Ok(candidates)
    }

    fn score_candidate(&self, state: &WalkState, c: &Candidate, params: &WalkParameters) -> f64 {
        let mut score = params.w_model * elo_strength(c.elo)
            + params.w_text * (1.0 + c.observations as f64).ln() / 10.0
            + params.w_rel * sigmoid(c.observations as f64 / 100.0)
            + params.w_geo * (1.0 + state.current_position.dot(&c.position)) / 2.0
            + params.w_hilbert * 0.5;

        let visits = *state.visit_counts.get(&c.id).unwrap_or(&0) as f64;
        score -= params.w_repeat * visits;

        if state.recent.contains(&c.id) {
            score -= params.w_novelty;
        }

        score += params.w_energy * state.current_energy;

        if let Some(goal_pos) = state.goal_position {
            score += params.goal_attraction * (1.0 + c.position.dot(&goal_pos)) / 2.0;
        }

        score
    }
}

fn build_candidate(id: u128, phys: &Physicality) -> Candidate {
    Candidate {
        id,
        position: phys.centroid,
        elo: 0.0,
        observations: 0,
    }
}

/// ELO rating mapped to `[0, 1]` via a logistic curve centered on the
/// default rating of 1500, for use as a relation-strength signal.
fn elo_strength(elo: f64) -> f64 {
    1.0 / (1.0 + (-(elo - 1500.0) / 400.0).exp())
}

/// Standard logistic sigmoid.
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(scores: &[f64], temperature: f64) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::MIN, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| ((s - max) / temperature).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum <= 0.0 {
        vec![1.0 / scores.len() as f64; scores.len()]
    } else {
        exps.into_iter().map(|e| e / sum).collect()
    }
}

fn select_index(probs: &[f64], rng: &mut impl Rng) -> usize {
    let mut r: f64 = rng.gen();
    for (i, p) in probs.iter().enumerate() {
        r -= p;
        if r <= 0.0 {
            return i;
        }
    }
    probs.len() - 1
}

fn terminal_result(state: &WalkState, reason: &str) -> WalkStepResult {
    WalkStepResult {
        next_composition: None,
        probability: 0.0,
        energy_remaining: state.current_energy,
        terminated: true,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0], 1.0);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn softmax_prefers_higher_score() {
        let probs = softmax(&[0.0, 5.0], 0.5);
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn elo_strength_is_centered_at_half() {
        assert!((elo_strength(1500.0) - 0.5).abs() < 1e-9);
        assert!(elo_strength(2000.0) > 0.5);
        assert!(elo_strength(1000.0) < 0.5);
    }

    #[test]
    fn sigmoid_is_centered_at_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-9);
        assert!(sigmoid(10.0) > 0.5);
        assert!(sigmoid(-10.0) < 0.5);
    }

    #[test]
    fn select_index_respects_deterministic_rng_edges() {
        struct FixedRng(f64);
        impl rand::RngCore for FixedRng {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                dest.fill(0);
                Ok(())
            }
        }
        // gen::<f64>() on an all-zero RngCore yields 0.0, which should
        // select the first candidate.
        let mut rng = FixedRng(0.0);
        let probs = vec![0.5, 0.5];
        assert_eq!(select_index(&probs, &mut rng), 0);
    }
}
