//! Agreement clustering for scalar fields
//!
//! Candidates are nodes; an edge joins two candidates whose similarity meets
//! the field's agreement cutoff. The largest connected component wins and its
//! medoid becomes the consensus value.

/// Symmetric pairwise similarity matrix with a unit diagonal
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    data: Vec<f32>,
}

impl SimilarityMatrix {
    /// Build an `n x n` matrix, calling `similarity` once per unordered pair.
    pub fn build<F, E>(n: usize, mut similarity: F) -> Result<Self, E>
    where
        F: FnMut(usize, usize) -> Result<f32, E>,
    {
        let mut data = vec![0.0f32; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let s = similarity(i, j)?;
                data[i * n + j] = s;
                data[j * n + i] = s;
            }
        }
        Ok(Self { n, data })
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.n + j]
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

/// Disjoint-set forest with path halving
#[derive(Debug, Clone)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub(crate) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`; the lower root index survives.
    pub(crate) fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }

    /// Members grouped by set, each group ascending, groups ordered by first member.
    pub(crate) fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut slot_of_root = vec![usize::MAX; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            let root = self.find(i);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_root[root]].push(i);
        }
        groups
    }
}

/// A connected component of agreeing candidates
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Candidate indices, ascending
    pub members: Vec<usize>,
    /// Sum of pairwise similarity between members
    pub cohesion: f32,
}

impl Component {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Earliest-appearing member
    pub fn first(&self) -> usize {
        self.members[0]
    }
}

/// Connected components under `similarity >= cutoff`, ordered by first member.
pub fn connected_components(matrix: &SimilarityMatrix, cutoff: f32) -> Vec<Component> {
    let n = matrix.len();
    let mut sets = DisjointSet::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if matrix.get(i, j) >= cutoff {
                sets.union(i, j);
            }
        }
    }

    sets.groups()
        .into_iter()
        .map(|members| {
            let mut cohesion = 0.0f32;
            for (k, &i) in members.iter().enumerate() {
                for &j in &members[k + 1..] {
                    cohesion += matrix.get(i, j);
                }
            }
            Component { members, cohesion }
        })
        .collect()
}

/// Largest component; ties go to greater cohesion, then to the earliest member.
pub fn select_component(components: &[Component]) -> Option<&Component> {
    let mut best: Option<&Component> = None;
    for c in components {
        best = match best {
            None => Some(c),
            Some(b) if c.len() > b.len() => Some(c),
            Some(b) if c.len() == b.len() && c.cohesion > b.cohesion => Some(c),
            Some(b) => Some(b),
        };
    }
    best
}

/// Member with the greatest summed similarity to the other members.
/// Ties go to the earliest member.
pub fn medoid(matrix: &SimilarityMatrix, members: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for &i in members {
        let total: f32 = members
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| matrix.get(i, j))
            .sum();
        match best {
            Some((b, t)) if total < t || (total == t && b < i) => {}
            _ => best = Some((i, total)),
        }
    }
    best.map(|(i, _)| i)
}

/// Outcome of clustering one field's candidate values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterOutcome {
    /// Index of the candidate whose value becomes the consensus
    pub representative: usize,
    /// Size of the winning component
    pub support: usize,
    /// Candidate indices in the winning component, ascending
    pub members: Vec<usize>,
    /// No two candidates agreed; the first candidate was taken as a fallback
    pub low_confidence: bool,
}

/// Cluster one field's values and pick its consensus representative.
///
/// Returns `None` only for an empty matrix.
pub fn resolve(matrix: &SimilarityMatrix, cutoff: f32) -> Option<ClusterOutcome> {
    if matrix.is_empty() {
        return None;
    }
    if matrix.len() == 1 {
        return Some(ClusterOutcome {
            representative: 0,
            support: 1,
            members: vec![0],
            low_confidence: false,
        });
    }

    let components = connected_components(matrix, cutoff);
    let winner = select_component(&components)?;

    if winner.len() == 1 {
        return Some(ClusterOutcome {
            representative: 0,
            support: 1,
            members: vec![0],
            low_confidence: true,
        });
    }

    let representative = medoid(matrix, &winner.members).unwrap_or_else(|| winner.first());
    Some(ClusterOutcome {
        representative,
        support: winner.len(),
        members: winner.members.clone(),
        low_confidence: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn matrix_of(values: &[f32]) -> SimilarityMatrix {
        // Similarity decays with distance on a line; 1.0 at distance 0, 0 at 10+
        SimilarityMatrix::build(values.len(), |i, j| {
            Ok::<_, Infallible>((1.0 - (values[i] - values[j]).abs() / 10.0).max(0.0))
        })
        .unwrap()
    }

    #[test]
    fn test_matrix_symmetric_unit_diagonal() {
        let m = matrix_of(&[0.0, 3.0, 9.0]);
        for i in 0..3 {
            assert_eq!(m.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    #[test]
    fn test_matrix_build_error() {
        let r = SimilarityMatrix::build(3, |_, _| Err::<f32, _>("bad"));
        assert_eq!(r, Err("bad"));
        // A single value needs no comparisons
        assert!(SimilarityMatrix::build(1, |_, _| Err::<f32, _>("bad")).is_ok());
    }

    #[test]
    fn test_disjoint_set_groups() {
        let mut sets = DisjointSet::new(5);
        sets.union(3, 1);
        sets.union(4, 0);
        assert_eq!(sets.groups(), vec![vec![0, 4], vec![1, 3], vec![2]]);
    }

    #[test]
    fn test_components_are_transitive() {
        // 0-1 and 1-2 agree, 0-2 do not: still one component
        let m = matrix_of(&[0.0, 1.5, 3.0, 50.0]);
        let components = connected_components(&m, 0.8);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].members, vec![0, 1, 2]);
        assert_eq!(components[1].members, vec![3]);
    }

    #[test]
    fn test_largest_component_wins() {
        let m = matrix_of(&[100.0, 0.0, 0.5, 1.0]);
        let outcome = resolve(&m, 0.9).unwrap();
        assert_eq!(outcome.support, 3);
        assert_eq!(outcome.members, vec![1, 2, 3]);
        assert!(!outcome.low_confidence);
        // 0.5 is closest to both neighbours
        assert_eq!(outcome.representative, 2);
    }

    #[test]
    fn test_tie_broken_by_cohesion_then_order() {
        // Two pairs: {0,1} loose, {2,3} tight
        let m = matrix_of(&[0.0, 0.9, 50.0, 50.1]);
        let components = connected_components(&m, 0.9);
        let winner = select_component(&components).unwrap();
        assert_eq!(winner.members, vec![2, 3]);

        // Identical cohesion: earliest component wins
        let m = matrix_of(&[0.0, 0.5, 50.0, 50.5]);
        let components = connected_components(&m, 0.9);
        let winner = select_component(&components).unwrap();
        assert_eq!(winner.members, vec![0, 1]);
    }

    #[test]
    fn test_outcome_members_match_winning_component() {
        // Winner {2, 3, 4} sits after a looser pair {0, 1}
        let m = matrix_of(&[0.0, 0.9, 50.0, 50.2, 50.4]);
        let outcome = resolve(&m, 0.9).unwrap();
        let components = connected_components(&m, 0.9);
        let winner = select_component(&components).unwrap();
        assert_eq!(outcome.members, winner.members);
        assert_eq!(outcome.members, vec![2, 3, 4]);
        assert_eq!(outcome.support, outcome.members.len());
        assert!(outcome.members.contains(&outcome.representative));
    }

    #[test]
    fn test_medoid_tie_goes_to_earliest() {
        let m = matrix_of(&[5.0, 5.0, 5.0]);
        assert_eq!(medoid(&m, &[0, 1, 2]), Some(0));
        assert_eq!(medoid(&m, &[2, 1]), Some(1));
        assert_eq!(medoid(&m, &[]), None);
    }

    #[test]
    fn test_total_disagreement_falls_back_to_first() {
        let m = matrix_of(&[0.0, 20.0, 40.0]);
        let outcome = resolve(&m, 0.9).unwrap();
        assert_eq!(
            outcome,
            ClusterOutcome {
                representative: 0,
                support: 1,
                members: vec![0],
                low_confidence: true
            }
        );
    }

    #[test]
    fn test_single_and_empty() {
        let single = matrix_of(&[7.0]);
        let outcome = resolve(&single, 1.0).unwrap();
        assert!(!outcome.low_confidence);
        assert_eq!(outcome.representative, 0);
        assert_eq!(outcome.members, vec![0]);

        assert!(resolve(&matrix_of(&[]), 1.0).is_none());
    }
}
