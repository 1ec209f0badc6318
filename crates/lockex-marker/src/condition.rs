use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::ops::Bound;
use std::str::FromStr;

use itertools::Itertools;
use pep440_rs::Version;
use serde::{Deserialize, Deserializer, de};
use version_ranges::Ranges;

use lockex_normalize::ExtraName;

use crate::environment::MarkerEnvironment;
use crate::python::python_alternatives;
use crate::{MarkerExpression, MarkerParseError, MarkerValueString, parse};

/// The values a string-valued marker key may take within a clause.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub(crate) enum StringSet {
    /// Exactly these values.
    In(BTreeSet<String>),
    /// Any value except these.
    NotIn(BTreeSet<String>),
}

impl StringSet {
    fn is_empty(&self) -> bool {
        matches!(self, Self::In(values) if values.is_empty())
    }

    fn is_full(&self) -> bool {
        matches!(self, Self::NotIn(values) if values.is_empty())
    }

    fn contains(&self, value: &str) -> bool {
        match self {
            Self::In(values) => values.contains(value),
            Self::NotIn(values) => !values.contains(value),
        }
    }

    fn complement(&self) -> Self {
        match self {
            Self::In(values) => Self::NotIn(values.clone()),
            Self::NotIn(values) => Self::In(values.clone()),
        }
    }

    fn intersection(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::In(a), Self::In(b)) => Self::In(a.intersection(b).cloned().collect()),
            (Self::In(a), Self::NotIn(b)) | (Self::NotIn(b), Self::In(a)) => {
                Self::In(a.difference(b).cloned().collect())
            }
            (Self::NotIn(a), Self::NotIn(b)) => Self::NotIn(a.union(b).cloned().collect()),
        }
    }

    fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::In(a), Self::In(b)) => Self::In(a.union(b).cloned().collect()),
            (Self::In(a), Self::NotIn(b)) | (Self::NotIn(b), Self::In(a)) => {
                Self::NotIn(b.difference(a).cloned().collect())
            }
            (Self::NotIn(a), Self::NotIn(b)) => Self::NotIn(a.intersection(b).cloned().collect()),
        }
    }

    fn is_subset(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::In(a), Self::In(b)) => a.is_subset(b),
            (Self::In(a), Self::NotIn(b)) => a.is_disjoint(b),
            (Self::NotIn(_), Self::In(_)) => false,
            (Self::NotIn(a), Self::NotIn(b)) => b.is_subset(a),
        }
    }
}

/// A conjunction of constraints, one per dimension.
///
/// A missing key places no constraint on that key. A clause never holds an empty set, so every
/// clause matches at least one environment.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct Clause {
    python: Ranges<Version>,
    strings: BTreeMap<MarkerValueString, StringSet>,
    extras: BTreeMap<ExtraName, bool>,
    opaque: BTreeMap<MarkerExpression, bool>,
}

impl Clause {
    fn any() -> Self {
        Self {
            python: Ranges::full(),
            strings: BTreeMap::new(),
            extras: BTreeMap::new(),
            opaque: BTreeMap::new(),
        }
    }

    fn is_any(&self) -> bool {
        self.python == Ranges::full()
            && self.strings.is_empty()
            && self.extras.is_empty()
            && self.opaque.is_empty()
    }

    /// The conjunction of two clauses, or `None` if no environment satisfies both.
    fn intersection(&self, other: &Self) -> Option<Self> {
        let python = self.python.intersection(&other.python);
        if python.is_empty() {
            return None;
        }

        let mut strings = self.strings.clone();
        for (key, set) in &other.strings {
            let set = match strings.get(key) {
                Some(existing) => existing.intersection(set),
                None => set.clone(),
            };
            if set.is_empty() {
                return None;
            }
            strings.insert(*key, set);
        }

        let extras = merge_literals(&self.extras, &other.extras)?;
        let opaque = merge_literals(&self.opaque, &other.opaque)?;

        Some(Self {
            python,
            strings,
            extras,
            opaque,
        })
    }

    /// Whether every environment matching `self` also matches `other`.
    fn is_subset(&self, other: &Self) -> bool {
        self.python.intersection(&other.python) == self.python
            && other.strings.iter().all(|(key, set)| {
                self.strings
                    .get(key)
                    .is_some_and(|ours| ours.is_subset(set))
            })
            && other
                .extras
                .iter()
                .all(|(name, value)| self.extras.get(name) == Some(value))
            && other
                .opaque
                .iter()
                .all(|(expression, value)| self.opaque.get(expression) == Some(value))
    }

    /// Merge two clauses that differ in a single literal into one equivalent clause.
    fn merge(&self, other: &Self) -> Option<Self> {
        let python = self.python == other.python;
        let strings = self.strings == other.strings;
        let extras = self.extras == other.extras;
        let opaque = self.opaque == other.opaque;

        match (python, strings, extras, opaque) {
            (false, true, true, true) => Some(Self {
                python: self.python.union(&other.python),
                ..self.clone()
            }),
            (true, false, true, true) => {
                let key = single_difference(&self.strings, &other.strings)?;
                let mut merged = self.clone();
                let set = self.strings[&key].union(&other.strings[&key]);
                if set.is_full() {
                    merged.strings.remove(&key);
                } else {
                    merged.strings.insert(key, set);
                }
                Some(merged)
            }
            (true, true, false, true) => {
                let name = single_difference(&self.extras, &other.extras)?;
                let mut merged = self.clone();
                merged.extras.remove(&name);
                Some(merged)
            }
            (true, true, true, false) => {
                let expression = single_difference(&self.opaque, &other.opaque)?;
                let mut merged = self.clone();
                merged.opaque.remove(&expression);
                Some(merged)
            }
            _ => None,
        }
    }

    /// The negation of this clause as a disjunction of single-literal clauses.
    fn negate(&self) -> Vec<Self> {
        let mut clauses = Vec::new();
        if self.python != Ranges::full() {
            clauses.push(Self {
                python: self.python.complement(),
                ..Self::any()
            });
        }
        for (key, set) in &self.strings {
            let mut clause = Self::any();
            clause.strings.insert(*key, set.complement());
            clauses.push(clause);
        }
        for (name, value) in &self.extras {
            let mut clause = Self::any();
            clause.extras.insert(name.clone(), !value);
            clauses.push(clause);
        }
        for (expression, value) in &self.opaque {
            let mut clause = Self::any();
            clause.opaque.insert(expression.clone(), !value);
            clauses.push(clause);
        }
        clauses
    }

    fn evaluate(&self, env: &MarkerEnvironment, extras: &[ExtraName]) -> bool {
        self.python.contains(&env.python_full_version)
            && self
                .strings
                .iter()
                .all(|(key, set)| set.contains(env.get_string(*key)))
            && self
                .extras
                .iter()
                .all(|(name, value)| extras.contains(name) == *value)
            && self
                .opaque
                .iter()
                .all(|(expression, value)| env.evaluate_expression(expression) == *value)
    }

    /// Render as alternatives of conjunctions of atoms.
    fn alternatives(&self) -> Vec<Vec<String>> {
        let mut dimensions = vec![python_alternatives(&self.python)];
        for (key, set) in &self.strings {
            dimensions.push(match set {
                StringSet::In(values) => values
                    .iter()
                    .map(|value| vec![format!("{key} == \"{value}\"")])
                    .collect(),
                StringSet::NotIn(values) => vec![
                    values
                        .iter()
                        .map(|value| format!("{key} != \"{value}\""))
                        .collect(),
                ],
            });
        }
        for (expression, value) in &self.opaque {
            let atom = if *value {
                expression.to_string()
            } else {
                expression
                    .negate()
                    .map_or_else(|| expression.to_string(), |negated| negated.to_string())
            };
            dimensions.push(vec![vec![atom]]);
        }
        for (name, value) in &self.extras {
            let operator = if *value { "==" } else { "!=" };
            dimensions.push(vec![vec![format!("extra {operator} \"{name}\"")]]);
        }

        dimensions
            .into_iter()
            .fold(vec![Vec::<String>::new()], |product, dimension| {
                product
                    .iter()
                    .cartesian_product(dimension.iter())
                    .map(|(head, tail)| head.iter().chain(tail).cloned().collect::<Vec<_>>())
                    .collect()
            })
    }
}

impl Ord for Clause {
    fn cmp(&self, other: &Self) -> Ordering {
        python_key(&self.python)
            .cmp(&python_key(&other.python))
            .then_with(|| self.strings.cmp(&other.strings))
            .then_with(|| self.extras.cmp(&other.extras))
            .then_with(|| self.opaque.cmp(&other.opaque))
    }
}

impl PartialOrd for Clause {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A sort key for a range that orders lower bounds first.
fn python_key(range: &Ranges<Version>) -> Vec<[(u8, Option<&Version>, u8); 2]> {
    range
        .iter()
        .map(|(lower, upper)| {
            [
                match lower {
                    Bound::Unbounded => (0, None, 0),
                    Bound::Included(version) => (1, Some(version), 0),
                    Bound::Excluded(version) => (1, Some(version), 1),
                },
                match upper {
                    Bound::Excluded(version) => (1, Some(version), 0),
                    Bound::Included(version) => (1, Some(version), 1),
                    Bound::Unbounded => (2, None, 0),
                },
            ]
        })
        .collect()
}

/// Combine two sets of boolean literals, or `None` if they contradict each other.
fn merge_literals<K: Ord + Clone>(
    left: &BTreeMap<K, bool>,
    right: &BTreeMap<K, bool>,
) -> Option<BTreeMap<K, bool>> {
    let mut merged = left.clone();
    for (key, value) in right {
        if let Some(existing) = merged.insert(key.clone(), *value) {
            if existing != *value {
                return None;
            }
        }
    }
    Some(merged)
}

/// The only key on which two maps with identical key sets disagree.
fn single_difference<K: Ord + Clone, V: PartialEq>(
    left: &BTreeMap<K, V>,
    right: &BTreeMap<K, V>,
) -> Option<K> {
    if !left.keys().eq(right.keys()) {
        return None;
    }
    left.iter()
        .zip(right.values())
        .filter(|((_, a), b)| a != b)
        .map(|((key, _), _)| key.clone())
        .exactly_one()
        .ok()
}

/// A set of environments, described by a PEP 508 marker expression.
///
/// Conditions are kept in a canonical disjunctive normal form: an empty disjunction never
/// matches, and a disjunction containing an unconstrained clause always matches. All operations
/// return new values.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    /// The condition that matches every environment.
    pub fn always() -> Self {
        Self {
            clauses: vec![Clause::any()],
        }
    }

    /// The condition that matches no environment.
    pub fn never() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// The environments whose full Python version lies in `range`.
    pub fn python(range: Ranges<Version>) -> Self {
        Self::from_clauses(vec![Clause {
            python: range,
            ..Clause::any()
        }])
    }

    /// `extra == "<name>"`, or `extra != "<name>"` when `active` is false.
    pub fn extra(name: ExtraName, active: bool) -> Self {
        let mut clause = Clause::any();
        clause.extras.insert(name, active);
        Self::from_clauses(vec![clause])
    }

    pub(crate) fn string(key: MarkerValueString, values: StringSet) -> Self {
        if values.is_full() {
            return Self::always();
        }
        let mut clause = Clause::any();
        clause.strings.insert(key, values);
        Self::from_clauses(vec![clause])
    }

    pub(crate) fn expression(expression: MarkerExpression, value: bool) -> Self {
        let mut clause = Clause::any();
        clause.opaque.insert(expression, value);
        Self::from_clauses(vec![clause])
    }

    fn from_clauses(clauses: Vec<Clause>) -> Self {
        let clauses = clauses
            .into_iter()
            .filter(|clause| !clause.python.is_empty())
            .filter(|clause| !clause.strings.values().any(StringSet::is_empty))
            .collect();
        Self {
            clauses: normalize(clauses),
        }
    }

    /// The environments matched by both conditions.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        let clauses = self
            .clauses
            .iter()
            .cartesian_product(&other.clauses)
            .filter_map(|(left, right)| left.intersection(right))
            .collect();
        Self {
            clauses: normalize(clauses),
        }
    }

    /// The environments matched by either condition.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        let clauses = self
            .clauses
            .iter()
            .chain(&other.clauses)
            .cloned()
            .collect();
        Self {
            clauses: normalize(clauses),
        }
    }

    /// The environments not matched by this condition.
    #[must_use]
    pub fn negate(&self) -> Self {
        let mut negated = Self::always();
        for clause in &self.clauses {
            negated = negated.and(&Self::from_clauses(clause.negate()));
            if negated.is_false() {
                break;
            }
        }
        negated
    }

    /// Whether the condition matches no environment.
    pub fn is_false(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether the condition matches every environment.
    pub fn is_true(&self) -> bool {
        if self.clauses.iter().any(Clause::is_any) {
            return true;
        }
        self.negate().is_false()
    }

    /// Whether every environment matched by `self` is matched by `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.and(&other.negate()).is_false()
    }

    /// Whether no environment is matched by both conditions.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.and(other).is_false()
    }

    /// Drop every `extra` comparison, keeping the environments matched under some choice of
    /// extras.
    #[must_use]
    pub fn without_extras(&self) -> Self {
        let clauses = self
            .clauses
            .iter()
            .map(|clause| Clause {
                extras: BTreeMap::new(),
                ..clause.clone()
            })
            .collect();
        Self {
            clauses: normalize(clauses),
        }
    }

    /// Resolve every `extra` comparison against the given set of active extras.
    ///
    /// Extras not in `active` are considered inactive.
    #[must_use]
    pub fn simplify_extras(&self, active: &BTreeSet<ExtraName>) -> Self {
        let clauses = self
            .clauses
            .iter()
            .filter(|clause| {
                clause
                    .extras
                    .iter()
                    .all(|(name, value)| active.contains(name) == *value)
            })
            .map(|clause| Clause {
                extras: BTreeMap::new(),
                ..clause.clone()
            })
            .collect();
        Self {
            clauses: normalize(clauses),
        }
    }

    /// The extras this condition compares against.
    pub fn extra_names(&self) -> impl Iterator<Item = &ExtraName> {
        self.clauses
            .iter()
            .flat_map(|clause| clause.extras.keys())
            .unique()
    }

    /// Whether the given environment, with the given extras requested, is matched.
    pub fn evaluate(&self, env: &MarkerEnvironment, extras: &[ExtraName]) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.evaluate(env, extras))
    }

    /// The renderable contents of the condition, or `None` if it always matches.
    pub fn contents(&self) -> Option<ConditionContents<'_>> {
        if self.is_true() {
            None
        } else {
            Some(ConditionContents(self))
        }
    }

    /// Like [`Condition::contents`], rendered to a string.
    pub fn try_to_string(&self) -> Option<String> {
        self.contents().map(|contents| contents.to_string())
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::always()
    }
}

/// Sort, deduplicate, remove subsumed clauses and merge adjacent ones until a fixed point.
fn normalize(mut clauses: Vec<Clause>) -> Vec<Clause> {
    loop {
        clauses.sort();
        clauses.dedup();

        if clauses.iter().any(Clause::is_any) {
            return vec![Clause::any()];
        }

        let mut keep = vec![true; clauses.len()];
        for i in 0..clauses.len() {
            for j in 0..clauses.len() {
                if i != j && keep[j] && clauses[i].is_subset(&clauses[j]) {
                    keep[i] = false;
                    break;
                }
            }
        }
        let mut keep = keep.into_iter();
        clauses.retain(|_| keep.next().unwrap_or(true));

        let merged = clauses
            .iter()
            .enumerate()
            .tuple_combinations()
            .find_map(|((i, left), (j, right))| left.merge(right).map(|merged| (i, j, merged)));
        match merged {
            Some((i, j, merged)) => {
                clauses.remove(j);
                clauses[i] = merged;
            }
            None => return clauses,
        }
    }
}

impl FromStr for Condition {
    type Err = MarkerParseError;

    /// An empty string parses to [`Condition::always`].
    fn from_str(markers: &str) -> Result<Self, Self::Err> {
        parse::parse_markers(markers)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_false() {
            return f.write_str("false");
        }
        match self.contents() {
            Some(contents) => contents.fmt(f),
            None => f.write_str("true"),
        }
    }
}

/// A non-trivial [`Condition`], rendered in PEP 508 syntax with `or` binding looser than `and`.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContents<'a>(&'a Condition);

impl Display for ConditionContents<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let alternatives = self
            .0
            .clauses
            .iter()
            .flat_map(Clause::alternatives)
            .map(|atoms| atoms.join(" and "))
            .unique()
            .join(" or ");
        f.write_str(&alternatives)
    }
}
