use crate::mol::Molecule;
use crate::smarts::QueryMol;

/// Whether `target` contains `query` as a subgraph (monomorphism).
///
/// Query atoms are visited in depth-first order so that every atom after the
/// first of its component is placed next to an already-mapped neighbour; the
/// candidate set for such atoms is just the neighbours of that image.
pub fn has_substructure(query: &QueryMol, target: &Molecule) -> bool {
    let query_atoms = query.atom_count();
    if query_atoms == 0 {
        return true;
    }
    if query_atoms > target.atom_count() || query.bonds().len() > target.bond_count() {
        return false;
    }

    let candidates: Vec<Vec<bool>> = (0..query_atoms)
        .map(|q| {
            (0..target.atom_count())
                .map(|t| target.degree(t) >= query.degree(q) && query.atom(q).matches(target, t))
                .collect()
        })
        .collect();
    if candidates.iter().any(|row| !row.iter().any(|&ok| ok)) {
        return false;
    }

    let plan = search_plan(query);
    let mut state = MatchState {
        query,
        target,
        candidates: &candidates,
        plan: &plan,
        mapping: vec![None; query_atoms],
        used: vec![false; target.atom_count()],
    };
    state.extend(0)
}

/// Visit order paired with an already-visited neighbour, if any.
fn search_plan(query: &QueryMol) -> Vec<(usize, Option<usize>)> {
    let mut visited = vec![false; query.atom_count()];
    let mut plan = Vec::with_capacity(query.atom_count());
    for root in 0..query.atom_count() {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut stack = vec![(root, None)];
        while let Some((atom, parent)) = stack.pop() {
            plan.push((atom, parent));
            for (next, _) in query.neighbors(atom) {
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, Some(atom)));
                }
            }
        }
    }
    plan
}

struct MatchState<'a> {
    query: &'a QueryMol,
    target: &'a Molecule,
    candidates: &'a [Vec<bool>],
    plan: &'a [(usize, Option<usize>)],
    mapping: Vec<Option<usize>>,
    used: Vec<bool>,
}

impl MatchState<'_> {
    fn extend(&mut self, depth: usize) -> bool {
        let Some(&(q, parent)) = self.plan.get(depth) else {
            return true;
        };
        let options: Vec<usize> = match parent.and_then(|p| self.mapping[p]) {
            Some(image) => self.target.neighbors(image).map(|(t, _)| t).collect(),
            None => (0..self.target.atom_count()).collect(),
        };

        for t in options {
            if self.used[t] || !self.candidates[q][t] || !self.bonds_consistent(q, t) {
                continue;
            }
            self.mapping[q] = Some(t);
            self.used[t] = true;
            if self.extend(depth + 1) {
                return true;
            }
            self.used[t] = false;
            self.mapping[q] = None;
        }
        false
    }

    /// Every bond to an already-mapped query neighbour must exist and match.
    fn bonds_consistent(&self, q: usize, t: usize) -> bool {
        self.query.neighbors(q).all(|(other, expr)| match self.mapping[other] {
            None => true,
            Some(image) => match self.target.bond_between(t, image) {
                Some(order) => expr.matches(self.target, t, image, order),
                None => false,
            },
        })
    }
}
