use std::collections::{HashMap, HashSet, VecDeque};

/// Immutable map of the universe: flat arena of system nodes indexed by
/// position, adjacency stored once as index lists. All queries run over
/// primitive indices; system ids only appear at the boundary.
#[derive(Debug, Clone, Default)]
pub struct UniverseGraph {
    nodes: Vec<SystemNode>,
    index: HashMap<i32, u32>,
}

#[derive(Debug, Clone)]
struct SystemNode {
    system_id: i32,
    region_id: i32,
    /// Security rating in [-1.0, 1.0].
    security: f64,
    adjacent: Vec<u32>,
}

impl UniverseGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system(&mut self, system_id: i32, region_id: i32, security: f64) {
        if self.index.contains_key(&system_id) {
            return;
        }
        let idx = self.nodes.len() as u32;
        self.nodes.push(SystemNode {
            system_id,
            region_id,
            security,
            adjacent: Vec::new(),
        });
        self.index.insert(system_id, idx);
    }

    /// Register an undirected gate between two known systems.
    pub fn add_gate(&mut self, a: i32, b: i32) {
        let (Some(&ia), Some(&ib)) = (self.index.get(&a), self.index.get(&b)) else {
            return;
        };
        if ia == ib {
            return;
        }
        if !self.nodes[ia as usize].adjacent.contains(&ib) {
            self.nodes[ia as usize].adjacent.push(ib);
        }
        if !self.nodes[ib as usize].adjacent.contains(&ia) {
            self.nodes[ib as usize].adjacent.push(ia);
        }
    }

    pub fn contains(&self, system_id: i32) -> bool {
        self.index.contains_key(&system_id)
    }

    pub fn security(&self, system_id: i32) -> Option<f64> {
        self.index
            .get(&system_id)
            .map(|&i| self.nodes[i as usize].security)
    }

    pub fn region_of(&self, system_id: i32) -> Option<i32> {
        self.index
            .get(&system_id)
            .map(|&i| self.nodes[i as usize].region_id)
    }

    /// BFS out to `max_jumps`, returning system id -> jump distance.
    ///
    /// With `min_security` set, only systems at or above the rating are
    /// traversed; the origin is always included.
    pub fn systems_within_radius(
        &self,
        origin: i32,
        max_jumps: u32,
        min_security: Option<f64>,
    ) -> HashMap<i32, u32> {
        let mut distances = HashMap::new();
        let Some(&start) = self.index.get(&origin) else {
            return distances;
        };

        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        visited[start as usize] = true;
        queue.push_back((start, 0u32));
        distances.insert(origin, 0);

        while let Some((idx, dist)) = queue.pop_front() {
            if dist == max_jumps {
                continue;
            }
            // Clone-free walk over the adjacency of the arena node
            for n in 0..self.nodes[idx as usize].adjacent.len() {
                let next = self.nodes[idx as usize].adjacent[n];
                if visited[next as usize] {
                    continue;
                }
                visited[next as usize] = true;
                let node = &self.nodes[next as usize];
                if let Some(min_sec) = min_security {
                    if node.security < min_sec {
                        continue;
                    }
                }
                distances.insert(node.system_id, dist + 1);
                queue.push_back((next, dist + 1));
            }
        }

        distances
    }

    /// Shortest route length in jumps, constrained to systems at or above
    /// `min_security`. Endpoints are exempt from the filter; intermediate
    /// systems are not. Unit edge weights, so plain BFS suffices.
    pub fn shortest_path_len(&self, from: i32, to: i32, min_security: Option<f64>) -> Option<u32> {
        let &start = self.index.get(&from)?;
        let &goal = self.index.get(&to)?;
        if start == goal {
            return Some(0);
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        visited[start as usize] = true;
        queue.push_back((start, 0u32));

        while let Some((idx, dist)) = queue.pop_front() {
            for n in 0..self.nodes[idx as usize].adjacent.len() {
                let next = self.nodes[idx as usize].adjacent[n];
                if visited[next as usize] {
                    continue;
                }
                if next == goal {
                    return Some(dist + 1);
                }
                visited[next as usize] = true;
                let node = &self.nodes[next as usize];
                if let Some(min_sec) = min_security {
                    if node.security < min_sec {
                        continue;
                    }
                }
                queue.push_back((next, dist + 1));
            }
        }

        None
    }

    /// Distinct region ids covering the given systems.
    pub fn regions_in_set<'a>(&self, systems: impl IntoIterator<Item = &'a i32>) -> HashSet<i32> {
        systems
            .into_iter()
            .filter_map(|id| self.region_of(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Line of five systems: 1 - 2 - 3 - 4 - 5, system 3 lowsec.
    fn line_graph() -> UniverseGraph {
        let mut g = UniverseGraph::new();
        for (id, sec) in [(1, 0.9), (2, 0.8), (3, 0.3), (4, 0.7), (5, 1.0)] {
            g.add_system(id, 100 + id / 4, sec);
        }
        for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 5)] {
            g.add_gate(a, b);
        }
        g
    }

    #[test]
    fn radius_returns_jump_distances() {
        let g = line_graph();
        let within = g.systems_within_radius(1, 2, None);
        assert_eq!(within.len(), 3);
        assert_eq!(within[&1], 0);
        assert_eq!(within[&2], 1);
        assert_eq!(within[&3], 2);
    }

    #[test]
    fn radius_respects_security_floor() {
        let g = line_graph();
        let within = g.systems_within_radius(1, 4, Some(0.5));
        // System 3 (0.3) blocks the route past it.
        assert!(within.contains_key(&2));
        assert!(!within.contains_key(&3));
        assert!(!within.contains_key(&4));
    }

    #[test]
    fn shortest_path_counts_jumps() {
        let g = line_graph();
        assert_eq!(g.shortest_path_len(1, 5, None), Some(4));
        assert_eq!(g.shortest_path_len(1, 1, None), Some(0));
    }

    #[test]
    fn shortest_path_security_filter_blocks_route() {
        let g = line_graph();
        assert_eq!(g.shortest_path_len(1, 5, Some(0.5)), None);
        // Destination itself may sit below the floor.
        assert_eq!(g.shortest_path_len(1, 3, Some(0.5)), Some(2));
    }

    #[test]
    fn unknown_origin_yields_empty() {
        let g = line_graph();
        assert!(g.systems_within_radius(999, 3, None).is_empty());
        assert_eq!(g.shortest_path_len(999, 1, None), None);
    }

    #[test]
    fn regions_deduplicated() {
        let g = line_graph();
        let set = g.regions_in_set([1, 2, 3, 4, 5].iter());
        assert_eq!(set.len(), 2);
    }
}
