//! AStarSearch: goal-directed pathfinding over the relation graph.
//!
//! The heuristic is the S³ geodesic distance between the current
//! composition's centroid and the goal's: admissible because geodesic
//! distance is the shortest possible path on the sphere, and consistent
//! because the triangle inequality holds on S³, so standard A* (weight 1.0)
//! returns optimal paths. Edge cost is `1 / (elo_norm * obs_norm)` with both
//! factors clamped to `[0.01, 1]` — well-evidenced, high-confidence
//! relations are cheap to traverse, thin or unreliable ones are expensive.

use crate::geometry::distance_s3;
use crate::storage::Datastore;
use nalgebra::Vector4;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Cap on incident relations fetched per expansion, matching the walk
/// engine's graph-neighbor bound.
const MAX_NEIGHBORS: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct AStarConfig {
    pub max_expansions: usize,
    pub heuristic_weight: f64,
    pub min_elo: f64,
    pub min_observations: f64,
    /// 0 = full A*; >0 keeps only the best `beam_width` frontier nodes per
    /// expansion round, trading optimality for a bounded frontier.
    pub beam_width: usize,
}

impl Default for AStarConfig {
    fn default() -> Self {
        Self {
            max_expansions: 10_000,
            heuristic_weight: 1.0,
            min_elo: 800.0,
            min_observations: 1.0,
            beam_width: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AStarPath {
    pub nodes: Vec<u128>,
    pub total_cost: f64,
    pub avg_elo: f64,
    pub avg_observations: f64,
    pub found: bool,
    pub nodes_expanded: usize,
}

impl AStarPath {
    fn not_found(nodes_expanded: usize) -> Self {
        Self {
            nodes: Vec::new(),
            total_cost: f64::INFINITY,
            avg_elo: 0.0,
            avg_observations: 0.0,
            found: false,
            nodes_expanded,
        }
    }
}

#[derive(Clone)]
struct Frontier {
    f_cost: f64,
    g_cost: f64,
    id: u128,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.f_cost == other.f_cost
    }
}
impl Eq for Frontier {}
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap (a max-heap) pops the lowest f_cost first.
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Neighbor {
    id: u128,
    elo: f64,
    observations: f64,
    position: Vector4<f64>,
}

pub struct AStarSearch<'a> {
    datastore: &'a dyn Datastore,
}

impl<'a> AStarSearch<'a> {
    pub fn new(datastore: &'a dyn Datastore) -> Self {
        Self { datastore }
    }

    pub async fn search(
        &self,
        start: u128,
        goal: u128,
        config: &AStarConfig,
    ) -> crate::error::Result<AStarPath> {
        self.search_multi_goal(start, &[goal], config).await
    }

    /// Finds a path from `start` to any composition in `goals`, using the
    /// minimum geodesic distance to any goal as the heuristic.
    pub async fn search_multi_goal(
        &self,
        start: u128,
        goals: &[u128],
        config: &AStarConfig,
    ) -> crate::error::Result<AStarPath> {
        if goals.is_empty() {
            return Ok(AStarPath::not_found(0));
        }

        let start_pos = self.load_position(start).await?;
        let mut goal_positions = Vec::with_capacity(goals.len());
        for &g in goals {
            goal_positions.push(self.load_position(g).await?);
        }
        let goal_set: HashSet<u128> = goals.iter().copied().collect();

        let mut g_scores: HashMap<u128, f64> = HashMap::new();
        let mut parents: HashMap<u128, u128> = HashMap::new();
        let mut edge_info: HashMap<u128, (f64, f64)> = HashMap::new();
        let mut closed: HashSet<u128> = HashSet::new();

        g_scores.insert(start, 0.0);
        let mut open = BinaryHeap::new();
        open.push(Frontier {
            f_cost: self.heuristic(&start_pos, &goal_positions) * config.heuristic_weight,
            g_cost: 0.0,
            id: start,
        });

        let mut expansions = 0usize;

        while let Some(current) = open.pop() {
            if closed.contains(&current.id) {
                continue;
            }
            if goal_set.contains(&current.id) {
                return Ok(self.reconstruct_path(
                    start,
                    current.id,
                    &parents,
                    &g_scores,
                    &edge_info,
                    expansions,
                ));
            }

            closed.insert(current.id);
            expansions += 1;
            if expansions > config.max_expansions {
                return Ok(AStarPath::not_found(expansions));
            }

            let neighbors = self
                .get_neighbors(current.id, config.min_elo, config.min_observations)
                .await?;

            let mut ranked: Vec<(f64, Neighbor)> = Vec::with_capacity(neighbors.len());
            for neighbor in neighbors {
                if closed.contains(&neighbor.id) {
                    continue;
                }
                let cost = self.edge_cost(neighbor.elo, neighbor.observations);
                ranked.push((cost, neighbor));
            }

            if config.beam_width > 0 && ranked.len() > config.beam_width {
                ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
                ranked.truncate(config.beam_width);
            }

            for (cost, neighbor) in ranked {
                let tentative_g = current.g_cost + cost;
                let better = g_scores
                    .get(&neighbor.id)
                    .map(|&existing| tentative_g < existing)
                    .unwrap_or(true);
                if better {
                    g_scores.insert(neighbor.id, tentative_g);
                    parents.insert(neighbor.id, current.id);
                    edge_info.insert(neighbor.id, (neighbor.elo, neighbor.observations));
                    let h = self.heuristic(&neighbor.position, &goal_positions);
                    open.push(Frontier {
                        f_cost: tentative_g + h * config.heuristic_weight,
                        g_cost: tentative_g,
                        id: neighbor.id,
                    });
                }
            }
        }

        Ok(AStarPath::not_found(expansions))
    }

    async fn load_position(&self, comp_id: u128) -> crate::error::Result<Vector4<f64>> {
        let comp = self.datastore.fetch_composition(comp_id).await?.ok_or_else(|| {
            crate::error::SubstrateError::InvalidComposition(format!("{comp_id:#x} not found"))
        })?;
        let phys = self
            .datastore
            .fetch_physicality(comp.phys_id)
            .await?
            .ok_or_else(|| crate::error::SubstrateError::Invariant("missing physicality".into()))?;
        Ok(phys.centroid)
    }

    async fn get_neighbors(
        &self,
        comp_id: u128,
        min_elo: f64,
        min_observations: f64,
    ) -> crate::error::Result<Vec<Neighbor>> {
        let siblings = self
            .datastore
            .fetch_relation_neighbors(comp_id, MAX_NEIGHBORS)
            .await?;
        Ok(siblings
            .into_iter()
            .filter(|n| n.elo >= min_elo && (n.observations as f64) >= min_observations)
            .map(|n| Neighbor {
                id: n.comp_id,
                elo: n.elo,
                observations: n.observations as f64,
                position: n.centroid,
            })
            .collect())
    }

    fn heuristic(&self, current: &Vector4<f64>, goals: &[Vector4<f64>]) -> f64 {
        goals
            .iter()
            .map(|g| distance_s3(current, g))
            .fold(f64::INFINITY, f64::min)
    }

    fn edge_cost(&self, elo: f64, observations: f64) -> f64 {
        let elo_norm = ((elo - 800.0) / 1200.0).clamp(0.01, 1.0);
        let obs_norm = ((1.0 + observations).ln() / 1000f64.ln()).clamp(0.01, 1.0);
        1.0 / (elo_norm * obs_norm)
    }

    fn reconstruct_path(
        &self,
        start: u128,
        goal: u128,
        parents: &HashMap<u128, u128>,
        g_scores: &HashMap<u128, f64>,
        edge_info: &HashMap<u128, (f64, f64)>,
        expansions: usize,
    ) -> AStarPath {
        let mut nodes = vec![goal];
        let mut current = goal;
        while current != start {
            match parents.get(&current) {
                Some(&parent) => {
                    current = parent;
                    nodes.push(current);
                }
                None => break,
            }
        }
        nodes.reverse();

        let (elo_sum, obs_sum, count) = nodes.iter().filter_map(|n| edge_info.get(n)).fold(
            (0.0, 0.0, 0usize),
            |(elo_sum, obs_sum, count), (elo, obs)| (elo_sum + elo, obs_sum + obs, count + 1),
        );

        AStarPath {
            total_cost: *g_scores.get(&goal).unwrap_or(&f64::INFINITY),
            avg_elo: if count > 0 { elo_sum / count as f64 } else { 0.0 },
            avg_observations: if count > 0 { obs_sum / count as f64 } else { 0.0 },
            found: true,
            nodes_expanded: expansions,
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_cost_prefers_high_confidence_relations() {
        let search = TestHarness::edge_cost_only();
        let cheap = search.edge_cost(2000.0, 100.0);
        let expensive = search.edge_cost(800.0, 1.0);
        assert!(cheap < expensive);
    }

    #[test]
    fn heuristic_picks_nearest_goal() {
        let search = TestHarness::edge_cost_only();
        let current = Vector4::new(1.0, 0.0, 0.0, 0.0);
        let near = Vector4::new(0.99, 0.14, 0.0, 0.0);
        let far = Vector4::new(-1.0, 0.0, 0.0, 0.0);
        let h = search.heuristic(&current, &[far, near]);
        assert!((h - distance_s3(&current, &near)).abs() < 1e-9);
    }

    #[test]
    fn not_found_path_has_infinite_cost() {
        let path = AStarPath::not_found(3);
        assert!(!path.found);
        assert!(path.total_cost.is_infinite());
        assert_eq!(path.nodes_expanded, 3);
    }

    /// Minimal datastore-free harness for exercising pure functions that
    /// don't touch storage.
    struct TestHarness;
    impl TestHarness {
        fn edge_cost_only() -> AStarSearch<'static> {
            // Leaks a trivial Datastore impl for the lifetime of the test
            // process; acceptable since tests are short-lived and this
            // avoids threading a real connection through pure-function tests.
            struct NoopDatastore;
            #[async_trait::async_trait]
            impl Datastore for NoopDatastore {
                async fn begin(&self) -> crate::error::Result<Box<dyn crate::storage::Transaction>> {
                    unimplemented!()
                }
                async fn query_radius(
                    &self,
                    _center: &Vector4<f64>,
                    _radius: f64,
                    _limit: usize,
                ) -> crate::error::Result<Vec<crate::substrate::Physicality>> {
                    unimplemented!()
                }
                async fn query_knn(
                    &self,
                    _center: &Vector4<f64>,
                    _k: usize,
                ) -> crate::error::Result<Vec<crate::substrate::Physicality>> {
                    unimplemented!()
                }
                async fn fetch_physicality(
                    &self,
                    _phys_id: u128,
                ) -> crate::error::Result<Option<crate::substrate::Physicality>> {
                    unimplemented!()
                }
                async fn fetch_relation_neighbors(
                    &self,
                    _comp_id: u128,
                    _limit: usize,
                ) -> crate::error::Result<Vec<crate::storage::RelationNeighbor>> {
                    unimplemented!()
                }
                async fn fetch_composition(
                    &self,
                    _comp_id: u128,
                ) -> crate::error::Result<Option<crate::substrate::Composition>> {
                    unimplemented!()
                }
            }
            AStarSearch::new(Box::leak(Box::new(NoopDatastore)))
        }
    }
}
