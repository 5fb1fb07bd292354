//! Basic graph pattern joins.
//!
//! Each pattern component is a variable (`?name`), a wildcard (empty) or a
//! constant term. Patterns are ordered greedily by an upper bound on their
//! constant-only cardinality, preferring patterns connected to variables
//! that are already bound, then evaluated as a nested-loop join: one cursor per pattern,
//! each opened with the bindings produced by the cursors above it.
//!
//! Variables bind to identifiers together with the role they were read in.
//! Subject and object identifiers coincide only inside the shared range, and
//! predicate identifiers live in their own space, so comparing a binding
//! across roles goes through [`TripleStore::translate_id`].

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::TripleStore;
use crate::dictionary::Role;
use crate::error::{HdtError, Result};
use crate::triples::{IdPattern, TripleId, TripleIdIter};

/// One solution: variable name (with its `?`) to term.
pub type Solution = BTreeMap<String, String>;

const ROLES: [Role; 3] = [Role::Subject, Role::Predicate, Role::Object];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinTerm {
    Any,
    Const(u64),
    Var(usize),
}

#[derive(Debug, Clone)]
struct JoinPattern {
    terms: [JoinTerm; 3],
    /// Upper bound on matches from the constants alone, from
    /// [`BitmapTriples::estimate`](crate::triples::BitmapTriples::estimate).
    cardinality: usize,
}

impl JoinPattern {
    fn constants(&self) -> IdPattern {
        let get = |t: JoinTerm| match t {
            JoinTerm::Const(id) => Some(id),
            _ => None,
        };
        IdPattern::new(get(self.terms[0]), get(self.terms[1]), get(self.terms[2]))
    }

    fn variables(&self) -> impl Iterator<Item = usize> + '_ {
        self.terms.iter().filter_map(|t| match t {
            JoinTerm::Var(v) => Some(*v),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
struct Frame<'a> {
    cursor: TripleIdIter<'a>,
    /// Variables bound by this frame's current triple.
    bound_here: Vec<usize>,
}

/// Lazy iterator over the solutions of a basic graph pattern.
#[derive(Debug, Clone)]
pub struct JoinIter<'a> {
    store: &'a TripleStore,
    variables: Vec<String>,
    plan: Vec<JoinPattern>,
    bindings: Vec<Option<(Role, u64)>>,
    stack: Vec<Frame<'a>>,
    /// A constant is missing from the dictionary; nothing can match.
    unsatisfiable: bool,
    started: bool,
    exhausted: bool,
    nb_reads: usize,
}

fn parse_variable(term: &str, variables: &mut Vec<String>) -> Result<usize> {
    if term.len() < 2 {
        return Err(HdtError::InvalidQuery(format!(
            "variable '{}' has no name",
            term
        )));
    }
    if let Some(pos) = variables.iter().position(|v| v == term) {
        return Ok(pos);
    }
    variables.push(term.to_string());
    Ok(variables.len() - 1)
}

impl<'a> JoinIter<'a> {
    pub(crate) fn new<S: AsRef<str>>(store: &'a TripleStore, patterns: &[[S; 3]]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(HdtError::InvalidQuery("join needs at least one pattern".into()));
        }

        let mut variables = Vec::new();
        let mut parsed = Vec::with_capacity(patterns.len());
        let mut unsatisfiable = false;
        for pattern in patterns {
            let mut terms = [JoinTerm::Any; 3];
            for (slot, (raw, role)) in pattern.iter().zip(ROLES).enumerate() {
                let raw = raw.as_ref();
                terms[slot] = if raw.is_empty() {
                    JoinTerm::Any
                } else if raw.starts_with('?') {
                    JoinTerm::Var(parse_variable(raw, &mut variables)?)
                } else {
                    match store.convert_term(raw, role)? {
                        Some(id) => JoinTerm::Const(id),
                        None => {
                            unsatisfiable = true;
                            JoinTerm::Any
                        }
                    }
                };
            }
            let mut p = JoinPattern {
                terms,
                cardinality: 0,
            };
            p.cardinality = store.triples().estimate(p.constants());
            parsed.push(p);
        }

        let plan = if unsatisfiable { parsed } else { plan(parsed) };
        debug!(
            patterns = plan.len(),
            variables = variables.len(),
            unsatisfiable,
            first_cardinality = plan.first().map_or(0, |p| p.cardinality),
            "Planned join"
        );

        let bindings = vec![None; variables.len()];
        Ok(Self {
            store,
            variables,
            plan,
            bindings,
            stack: Vec::new(),
            unsatisfiable,
            started: false,
            exhausted: false,
            nb_reads: 0,
        })
    }

    /// Variable names in order of first appearance.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Upper bound on the first planned pattern's matches.
    pub fn estimated_cardinality(&self) -> usize {
        if self.unsatisfiable {
            return 0;
        }
        self.plan.first().map_or(0, |p| p.cardinality)
    }

    /// Solutions returned so far.
    pub fn nb_reads(&self) -> usize {
        self.nb_reads
    }

    /// Restart evaluation from the first solution.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.bindings.iter_mut().for_each(|b| *b = None);
        self.started = false;
        self.exhausted = false;
        self.nb_reads = 0;
    }

    /// Value of a bound variable, expressed in `role`.
    fn bound_in(&self, var: usize, role: Role) -> Result<Option<Option<u64>>> {
        match self.bindings[var] {
            None => Ok(None),
            Some((from, id)) => Ok(Some(self.store.translate_id(id, from, role)?)),
        }
    }

    /// Open a cursor for plan level `level` under the current bindings.
    /// `None` when a binding has no counterpart in the needed role.
    fn open(&self, level: usize) -> Result<Option<Frame<'a>>> {
        let mut ids = [None; 3];
        for (slot, role) in ROLES.into_iter().enumerate() {
            ids[slot] = match self.plan[level].terms[slot] {
                JoinTerm::Any => None,
                JoinTerm::Const(id) => Some(id),
                JoinTerm::Var(v) => match self.bound_in(v, role)? {
                    None => None,
                    Some(Some(id)) => Some(id),
                    Some(None) => return Ok(None),
                },
            };
        }
        let pattern = IdPattern::new(ids[0], ids[1], ids[2]);
        Ok(Some(Frame {
            cursor: self.store.triples().search(pattern),
            bound_here: Vec::new(),
        }))
    }

    /// Bind the variables of plan level `level` to `t`. Returns the
    /// variables newly bound, or `None` when a repeated variable disagrees.
    fn bind(&mut self, level: usize, t: TripleId) -> Result<Option<Vec<usize>>> {
        let values = [t.subject, t.predicate, t.object];
        let mut bound_here = Vec::new();
        for (slot, role) in ROLES.into_iter().enumerate() {
            let JoinTerm::Var(v) = self.plan[level].terms[slot] else {
                continue;
            };
            match self.bound_in(v, role)? {
                None => {
                    self.bindings[v] = Some((role, values[slot]));
                    bound_here.push(v);
                }
                Some(Some(id)) if id == values[slot] => {}
                Some(_) => {
                    for v in bound_here {
                        self.bindings[v] = None;
                    }
                    return Ok(None);
                }
            }
        }
        Ok(Some(bound_here))
    }

    fn solution(&self) -> Result<Solution> {
        let mut out = Solution::new();
        for (name, binding) in self.variables.iter().zip(&self.bindings) {
            if let Some((role, id)) = binding {
                out.insert(name.clone(), self.store.convert_id(*id, *role)?);
            }
        }
        Ok(out)
    }

    fn advance(&mut self) -> Result<Option<Solution>> {
        if !self.started {
            self.started = true;
            if self.unsatisfiable {
                return Ok(None);
            }
            match self.open(0)? {
                Some(frame) => self.stack.push(frame),
                None => return Ok(None),
            }
        }

        while let Some(level) = self.stack.len().checked_sub(1) {
            let frame = &mut self.stack[level];
            for v in frame.bound_here.drain(..) {
                self.bindings[v] = None;
            }
            let Some(t) = frame.cursor.next() else {
                self.stack.pop();
                continue;
            };
            let Some(bound_here) = self.bind(level, t)? else {
                continue;
            };
            self.stack[level].bound_here = bound_here;

            if level + 1 == self.plan.len() {
                return self.solution().map(Some);
            }
            if let Some(frame) = self.open(level + 1)? {
                self.stack.push(frame);
            }
        }
        Ok(None)
    }
}

impl<'a> Iterator for JoinIter<'a> {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Result<Solution>> {
        if self.exhausted {
            return None;
        }
        match self.advance() {
            Ok(Some(solution)) => {
                self.nb_reads += 1;
                Some(Ok(solution))
            }
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

/// Greedy order: cheapest pattern first, then repeatedly the cheapest
/// pattern sharing a variable with those already placed (or the cheapest
/// overall when none is connected).
fn plan(mut remaining: Vec<JoinPattern>) -> Vec<JoinPattern> {
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut bound: HashSet<usize> = HashSet::new();

    while !remaining.is_empty() {
        let connected = |p: &JoinPattern| p.variables().any(|v| bound.contains(&v));
        let pick = remaining
            .iter()
            .enumerate()
            .min_by_key(|(i, p)| (!connected(p), p.cardinality, *i))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let next = remaining.remove(pick);
        bound.extend(next.variables());
        ordered.push(next);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(terms: [JoinTerm; 3], cardinality: usize) -> JoinPattern {
        JoinPattern { terms, cardinality }
    }

    #[test]
    fn test_plan_prefers_connected_patterns() {
        use JoinTerm::*;
        let patterns = vec![
            pattern([Var(2), Const(1), Var(1)], 50),
            pattern([Var(2), Const(2), Any], 1),
            pattern([Var(0), Const(3), Var(3)], 5),
        ];
        let ordered = plan(patterns);
        // Cheapest first; then the connected pattern wins over the cheaper
        // disconnected one.
        assert_eq!(ordered[0].cardinality, 1);
        assert_eq!(ordered[1].cardinality, 50);
        assert_eq!(ordered[2].cardinality, 5);
    }

    #[test]
    fn test_parse_variable() {
        let mut vars = Vec::new();
        assert_eq!(parse_variable("?x", &mut vars).unwrap(), 0);
        assert_eq!(parse_variable("?y", &mut vars).unwrap(), 1);
        assert_eq!(parse_variable("?x", &mut vars).unwrap(), 0);
        assert_eq!(parse_variable("?", &mut vars).unwrap_err().code(), "INVALID_QUERY");
    }
}
