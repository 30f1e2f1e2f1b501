//! Overlap resolution between competing repeat candidates.
//!
//! Candidates that claim the same residues are alternative explanations of
//! one repeat. They are linked in an [`OverlapGraph`]; every connected
//! component of that graph is one cluster, and exactly one candidate per
//! cluster survives. Overlap is not transitive, but cluster membership is:
//! if A overlaps B and B overlaps C, all three compete even when A and C are
//! disjoint.

use std::cmp::Ordering;

use log::debug;

use crate::types::{Candidate, CandidateSet, ScoreModel};

/// Relation deciding whether two candidates compete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapRule {
    /// Ranges share at least one residue
    #[default]
    SharedPosition,
}

impl OverlapRule {
    #[must_use]
    pub const fn overlaps(self, a: &Candidate, b: &Candidate) -> bool {
        match self {
            Self::SharedPosition => a.overlaps(b),
        }
    }
}

/// Score used to rank candidates inside a cluster, lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKey {
    PValue,
    Divergence,
}

impl RankKey {
    fn value(self, candidate: &Candidate, model: &ScoreModel) -> f64 {
        let value = match self {
            Self::PValue => candidate.pvalue(model),
            Self::Divergence => candidate.divergence(model),
        };
        // Unscored candidates lose against every scored one.
        value.unwrap_or(f64::INFINITY)
    }
}

/// Ordering used to pick the winner of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieBreak {
    /// Model the ranking scores are read from
    pub model: ScoreModel,
    /// Keys compared in order until one differs
    pub keys: Vec<RankKey>,
}

impl TieBreak {
    /// Lowest p-value first, then lowest divergence
    #[must_use]
    pub fn by_significance(model: ScoreModel) -> Self {
        Self {
            model,
            keys: vec![RankKey::PValue, RankKey::Divergence],
        }
    }

    #[must_use]
    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        self.keys
            .iter()
            .map(|key| {
                key.value(a, &self.model)
                    .total_cmp(&key.value(b, &self.model))
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl Default for TieBreak {
    fn default() -> Self {
        Self::by_significance(ScoreModel::default())
    }
}

/// Undirected overlap graph over the candidates of one protein.
///
/// Node `i` is the candidate at index `i` of the slice the graph was built
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapGraph {
    adjacency: Vec<Vec<usize>>,
}

impl OverlapGraph {
    /// Links every pair of overlapping candidates.
    ///
    /// Candidates are swept in order of their first residue, so each one is
    /// only compared against the candidates that start inside its range.
    #[must_use]
    pub fn build(candidates: &[Candidate], rule: OverlapRule) -> Self {
        let mut adjacency = vec![Vec::new(); candidates.len()];
        let mut by_begin: Vec<usize> = (0..candidates.len()).collect();
        by_begin.sort_by_key(|&i| (candidates[i].begin, i));

        for (position, &i) in by_begin.iter().enumerate() {
            for &j in &by_begin[position + 1..] {
                if candidates[j].begin > candidates[i].end() {
                    break;
                }
                if rule.overlaps(&candidates[i], &candidates[j]) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }
        for neighbours in &mut adjacency {
            neighbours.sort_unstable();
        }

        Self { adjacency }
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Connected components, each sorted ascending, ordered by their
    /// smallest member
    #[must_use]
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.adjacency.len()];
        let mut components = Vec::new();

        for start in 0..self.adjacency.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                component.push(node);
                for &next in &self.adjacency[node] {
                    if !visited[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }

        components
    }
}

/// Keeps one candidate per overlap cluster.
///
/// Within a cluster the candidate ranked first by `tie_break` wins; exact
/// ties go to the candidate that came first in `set`. Winners keep their
/// original relative order.
///
/// # Examples
///
/// ```rust
/// use trsift_core::cluster::{OverlapRule, TieBreak, cluster};
/// use trsift_core::types::{Candidate, CandidateSet, RepeatScore, ScoreModel};
///
/// let model = ScoreModel::default();
/// let set: CandidateSet = vec![
///     Candidate::from_alignment(10, ["QQQ", "QQQ", "QQQ"])?
///         .with_score(model.clone(), RepeatScore::new(0.01, 0.05)),
///     Candidate::from_alignment(12, ["QQ", "QQ", "QQ"])?
///         .with_score(model.clone(), RepeatScore::new(0.01, 0.02)),
/// ]
/// .into();
///
/// let winners = cluster(&set, OverlapRule::SharedPosition, &TieBreak::by_significance(model));
/// assert_eq!(winners.len(), 1);
/// assert_eq!(winners.get(0).unwrap().begin, 12);
/// # Ok::<(), trsift_core::types::TrsiftError>(())
/// ```
#[must_use]
pub fn cluster(set: &CandidateSet, rule: OverlapRule, tie_break: &TieBreak) -> CandidateSet {
    let candidates = set.as_slice();
    let graph = OverlapGraph::build(candidates, rule);
    let components = graph.components();

    let mut winners: Vec<usize> = components
        .iter()
        .filter_map(|members| {
            members.iter().copied().min_by(|&a, &b| {
                tie_break
                    .compare(&candidates[a], &candidates[b])
                    .then(a.cmp(&b))
            })
        })
        .collect();
    winners.sort_unstable();

    debug!(
        "clustering: {} candidates, {} overlaps, {} clusters",
        candidates.len(),
        graph.edge_count(),
        components.len()
    );

    winners
        .into_iter()
        .map(|index| candidates[index].clone())
        .collect()
}
