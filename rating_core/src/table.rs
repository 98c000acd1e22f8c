//! N-dimensional lookup tables and the recursive rating algorithm.
//!
//! A table with `k` independent axes is a tree of depth `k`. Every branch at
//! level `i` holds the strictly increasing values of axis `i` and one child
//! per value; the children of the deepest branches are the dependent values.

use crate::lookup::{LookupMethod, LookupPolicy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// One level of a rating table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RatingNode {
    Leaf(f64),
    Branch {
        keys: Vec<f64>,
        children: Vec<RatingNode>,
    },
}

impl RatingNode {
    fn leaf_value(&self) -> Result<f64> {
        match self {
            RatingNode::Leaf(value) => Ok(*value),
            RatingNode::Branch { .. } => Err(Error::Table(
                "Expected a dependent value, found a nested table".into(),
            )),
        }
    }
}

/// A validated lookup table with a fixed number of independent axes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingTable {
    axis_count: usize,
    root: RatingNode,
}

impl RatingTable {
    /// Validate a tree and wrap it
    pub fn new(axis_count: usize, root: RatingNode) -> Result<Self> {
        if axis_count == 0 {
            return Err(Error::Table("A rating table needs at least one axis".into()));
        }
        validate_node(&root, 0, axis_count)?;
        Ok(Self { axis_count, root })
    }

    /// Build a table from rows of `[ind_1, ..., ind_k, dep]`
    ///
    /// Rows must already be ordered: rows sharing an outer-axis value are
    /// contiguous, and the values of every axis strictly increase within the
    /// group they belong to.
    pub fn from_points(axis_count: usize, rows: &[Vec<f64>]) -> Result<Self> {
        if axis_count == 0 {
            return Err(Error::Table("A rating table needs at least one axis".into()));
        }
        if rows.is_empty() {
            return Err(Error::Table("A rating table needs at least one point".into()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != axis_count + 1 {
                return Err(Error::Table(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    axis_count + 1
                )));
            }
        }
        let rows: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        let root = build_node(&rows, 0, axis_count)?;
        Ok(Self { axis_count, root })
    }

    pub fn axis_count(&self) -> usize {
        self.axis_count
    }

    pub fn root(&self) -> &RatingNode {
        &self.root
    }

    /// Flatten the table back into `[ind_1, ..., ind_k, dep]` rows
    pub fn points(&self) -> Vec<Vec<f64>> {
        let mut rows = Vec::new();
        let mut prefix = Vec::with_capacity(self.axis_count);
        collect_points(&self.root, &mut prefix, &mut rows);
        rows
    }

    /// Number of dependent values stored in the table
    pub fn len(&self) -> usize {
        count_leaves(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rate one value-set; `values[0]` addresses the outermost axis
    pub fn rate(&self, values: &[f64], lookup: &[LookupPolicy]) -> Result<f64> {
        if values.len() != self.axis_count {
            return Err(Error::Rating(format!(
                "Expected {} independent values, got {}",
                self.axis_count,
                values.len()
            )));
        }
        if lookup.len() != self.axis_count {
            return Err(Error::Rating(format!(
                "Expected {} lookup policies, got {}",
                self.axis_count,
                lookup.len()
            )));
        }
        rate_node(&self.root, values, lookup, 0)
    }

    /// The single axis's values and the dependent values of a 1-axis table
    fn single_axis(&self) -> Result<(&[f64], Vec<f64>)> {
        match (&self.root, self.axis_count) {
            (RatingNode::Branch { keys, children }, 1) => {
                let deps = children
                    .iter()
                    .map(RatingNode::leaf_value)
                    .collect::<Result<Vec<_>>>()?;
                Ok((keys, deps))
            }
            _ => Err(Error::Rating(format!(
                "Cannot reverse rate a table with {} independent parameters",
                self.axis_count
            ))),
        }
    }

    /// Find the independent value that rates to `dep`
    ///
    /// Only valid for 1-axis tables whose dependent values never decrease.
    /// `lookup` is the forward policy; log roles are exchanged internally.
    pub fn reverse_rate(&self, dep: f64, lookup: &LookupPolicy) -> Result<f64> {
        let (inds, deps) = self.single_axis()?;
        if let Some(i) = deps.windows(2).position(|w| w[1] < w[0]) {
            return Err(Error::Rating(format!(
                "Cannot reverse rate: dependent values decrease from {} to {}",
                deps[i],
                deps[i + 1]
            )));
        }
        let reversed = lookup.reversed();
        if dep.is_nan() {
            return Ok(f64::NAN);
        }
        match bracket(&deps, dep, &reversed, Domain::Dependent)? {
            None => Ok(f64::NAN),
            Some(Bracket { lo, hi, .. }) if lo == hi => Ok(inds[lo]),
            Some(Bracket { lo, hi, method }) => {
                interpolate_or_select(dep, deps[lo], deps[hi], inds[lo], inds[hi], method)
            }
        }
    }
}

fn validate_node(node: &RatingNode, depth: usize, axis_count: usize) -> Result<()> {
    match node {
        RatingNode::Leaf(_) if depth == axis_count => Ok(()),
        RatingNode::Leaf(_) => Err(Error::Table(format!(
            "Found a dependent value at axis {} of a {}-axis table",
            depth + 1,
            axis_count
        ))),
        RatingNode::Branch { .. } if depth == axis_count => Err(Error::Table(format!(
            "Table is nested deeper than its {} axes",
            axis_count
        ))),
        RatingNode::Branch { keys, children } => {
            if keys.is_empty() || keys.len() != children.len() {
                return Err(Error::Table(format!(
                    "Axis {} has {} values and {} entries",
                    depth + 1,
                    keys.len(),
                    children.len()
                )));
            }
            check_increasing(keys, depth)?;
            children
                .iter()
                .try_for_each(|child| validate_node(child, depth + 1, axis_count))
        }
    }
}

fn check_increasing(keys: &[f64], depth: usize) -> Result<()> {
    if let Some(bad) = keys.iter().find(|k| !k.is_finite()) {
        return Err(Error::Table(format!(
            "Axis {} contains non-finite value {}",
            depth + 1,
            bad
        )));
    }
    if let Some(i) = keys.windows(2).position(|w| w[1] <= w[0]) {
        return Err(Error::Table(format!(
            "Values of axis {} are not strictly increasing: {} followed by {}",
            depth + 1,
            keys[i],
            keys[i + 1]
        )));
    }
    Ok(())
}

fn build_node(rows: &[&[f64]], depth: usize, axis_count: usize) -> Result<RatingNode> {
    let mut keys = Vec::new();
    let mut children = Vec::new();
    if depth + 1 == axis_count {
        for row in rows {
            keys.push(row[depth]);
            children.push(RatingNode::Leaf(row[axis_count]));
        }
    } else {
        let mut start = 0;
        while start < rows.len() {
            let key = rows[start][depth];
            let end = rows[start..]
                .iter()
                .position(|row| row[depth] != key)
                .map_or(rows.len(), |offset| start + offset);
            keys.push(key);
            children.push(build_node(&rows[start..end], depth + 1, axis_count)?);
            start = end;
        }
    }
    check_increasing(&keys, depth)?;
    Ok(RatingNode::Branch { keys, children })
}

fn collect_points(node: &RatingNode, prefix: &mut Vec<f64>, rows: &mut Vec<Vec<f64>>) {
    match node {
        RatingNode::Leaf(value) => {
            let mut row = prefix.clone();
            row.push(*value);
            rows.push(row);
        }
        RatingNode::Branch { keys, children } => {
            for (key, child) in keys.iter().zip(children) {
                prefix.push(*key);
                collect_points(child, prefix, rows);
                prefix.pop();
            }
        }
    }
}

fn count_leaves(node: &RatingNode) -> usize {
    match node {
        RatingNode::Leaf(_) => 1,
        RatingNode::Branch { children, .. } => children.iter().map(count_leaves).sum(),
    }
}

/// Bracketing indices and the method that combines them
#[derive(Debug, PartialEq)]
pub(crate) struct Bracket {
    pub lo: usize,
    pub hi: usize,
    pub method: LookupMethod,
}

/// What a bracketed sequence of keys holds, for messages
#[derive(Clone, Copy, Debug)]
pub(crate) enum Domain {
    Axis(usize),
    Dependent,
    EffectiveTime,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Axis(axis) => write!(f, "axis {}", axis + 1),
            Domain::Dependent => f.write_str("the dependent values"),
            Domain::EffectiveTime => f.write_str("the effective times"),
        }
    }
}

/// Locate `x` among `keys` under `policy`
///
/// `Ok(None)` means a NULL policy applies and the result is NaN. An in-range
/// NULL applies even on an exact key, while ERROR accepts one.
pub(crate) fn bracket(
    keys: &[f64],
    x: f64,
    policy: &LookupPolicy,
    domain: Domain,
) -> Result<Option<Bracket>> {
    let n = keys.len();
    let hi = keys.partition_point(|k| *k <= x);

    if hi > 0 && keys[hi - 1] == x {
        if policy.in_range == LookupMethod::Null {
            return Ok(None);
        }
        return Ok(Some(Bracket {
            lo: hi - 1,
            hi: hi - 1,
            method: policy.in_range,
        }));
    }

    if hi == n {
        let method = policy.out_range_high;
        return match method {
            LookupMethod::Null => Ok(None),
            LookupMethod::Error | LookupMethod::Next | LookupMethod::Higher => {
                Err(Error::Policy(format!(
                    "Value {} is above the largest value {} of {} (out-range-high method {})",
                    x,
                    keys[n - 1],
                    domain,
                    method
                )))
            }
            _ => {
                debug!(%domain, x, method = %method, "value above range");
                let method = if method.is_selection() {
                    LookupMethod::Next
                } else {
                    method
                };
                Ok(Some(Bracket {
                    lo: n.saturating_sub(2),
                    hi: n - 1,
                    method,
                }))
            }
        };
    }

    if hi == 0 {
        let method = policy.out_range_low;
        return match method {
            LookupMethod::Null => Ok(None),
            LookupMethod::Error | LookupMethod::Previous | LookupMethod::Lower => {
                Err(Error::Policy(format!(
                    "Value {} is below the smallest value {} of {} (out-range-low method {})",
                    x,
                    keys[0],
                    domain,
                    method
                )))
            }
            _ => {
                debug!(%domain, x, method = %method, "value below range");
                let method = if method.is_selection() {
                    LookupMethod::Previous
                } else {
                    method
                };
                Ok(Some(Bracket {
                    lo: 0,
                    hi: 1.min(n - 1),
                    method,
                }))
            }
        };
    }

    match policy.in_range {
        LookupMethod::Null => Ok(None),
        LookupMethod::Error => Err(Error::Policy(format!(
            "Value {} falls between {} and {} of {} (in-range method ERROR)",
            x,
            keys[hi - 1],
            keys[hi],
            domain
        ))),
        method => Ok(Some(Bracket {
            lo: hi - 1,
            hi,
            method,
        })),
    }
}

fn rate_node(
    node: &RatingNode,
    values: &[f64],
    lookup: &[LookupPolicy],
    axis: usize,
) -> Result<f64> {
    let (keys, children) = match node {
        RatingNode::Branch { keys, children } => (keys, children),
        RatingNode::Leaf(_) => {
            return Err(Error::Table(format!(
                "Table ends before axis {}",
                axis + 1
            )))
        }
    };
    let x = values[0];
    if x.is_nan() {
        return Ok(f64::NAN);
    }
    let Some(Bracket { lo, hi, method }) = bracket(keys, x, &lookup[0], Domain::Axis(axis))? else {
        return Ok(f64::NAN);
    };

    let value_at = |i: usize| -> Result<f64> {
        if values.len() == 1 {
            children[i].leaf_value()
        } else {
            rate_node(&children[i], &values[1..], &lookup[1..], axis + 1)
        }
    };

    if lo == hi {
        return value_at(lo);
    }
    let y0 = value_at(lo)?;
    let y1 = value_at(hi)?;
    interpolate_or_select(x, keys[lo], keys[hi], y0, y1, method)
}

/// Combine two bracketing values for `x` with one lookup method
///
/// Logarithmic methods fall back to linear on an axis whose values are not
/// all positive. NULL yields NaN; ERROR only accepts `x` on a bracket value.
pub fn interpolate_or_select(
    x: f64,
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    method: LookupMethod,
) -> Result<f64> {
    if x0 == x1 {
        return Ok(y0);
    }
    match method {
        LookupMethod::Null => Ok(f64::NAN),
        LookupMethod::Error => {
            if x == x0 {
                Ok(y0)
            } else if x == x1 {
                Ok(y1)
            } else {
                Err(Error::Policy(format!(
                    "Value {} falls between {} and {} (method ERROR)",
                    x, x0, x1
                )))
            }
        }
        LookupMethod::Previous
        | LookupMethod::Lower
        | LookupMethod::Next
        | LookupMethod::Higher
        | LookupMethod::Nearest
        | LookupMethod::Closest => Ok(if selects_lower(x, x0, x1, method) {
            y0
        } else {
            y1
        }),
        LookupMethod::Linear
        | LookupMethod::Logarithmic
        | LookupMethod::LinLog
        | LookupMethod::LogLin => Ok(interpolate(x, x0, x1, y0, y1, method)),
    }
}

/// For a selection method, whether the lower bracket value is chosen
pub(crate) fn selects_lower(x: f64, x0: f64, x1: f64, method: LookupMethod) -> bool {
    match method {
        LookupMethod::Next | LookupMethod::Higher => false,
        LookupMethod::Nearest | LookupMethod::Closest => x - x0 <= x1 - x,
        _ => true,
    }
}

fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64, method: LookupMethod) -> f64 {
    let (mut log_x, mut log_y) = method.log_axes();
    let (mut x, mut x0, mut x1) = (x, x0, x1);
    let (mut y0, mut y1) = (y0, y1);

    if log_x {
        if x > 0.0 && x0 > 0.0 && x1 > 0.0 {
            x = x.log10();
            x0 = x0.log10();
            x1 = x1.log10();
        } else {
            log_x = false;
        }
    }
    if log_y {
        if y0 > 0.0 && y1 > 0.0 {
            y0 = y0.log10();
            y1 = y1.log10();
        } else {
            log_y = false;
            if log_x && method == LookupMethod::Logarithmic {
                x = 10f64.powf(x);
                x0 = 10f64.powf(x0);
                x1 = 10f64.powf(x1);
            }
        }
    }

    let fraction = (x - x0) / (x1 - x0);
    let y = y0 + fraction * (y1 - y0);
    if log_y {
        10f64.powf(y)
    } else {
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LookupMethod::*;

    fn policy(in_range: LookupMethod, low: LookupMethod, high: LookupMethod) -> LookupPolicy {
        LookupPolicy::new(in_range, low, high)
    }

    fn one_axis() -> RatingTable {
        RatingTable::from_points(
            1,
            &[
                vec![1.0, 10.0],
                vec![2.0, 20.0],
                vec![4.0, 40.0],
                vec![8.0, 100.0],
            ],
        )
        .unwrap()
    }

    fn two_axis() -> RatingTable {
        RatingTable::from_points(
            2,
            &[
                vec![1.0, 100.0, 1.0],
                vec![1.0, 200.0, 3.0],
                vec![2.0, 100.0, 5.0],
                vec![2.0, 200.0, 9.0],
                vec![2.0, 300.0, 11.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_points_builds_tree() {
        let table = two_axis();
        assert_eq!(table.axis_count(), 2);
        assert_eq!(table.len(), 5);
        match table.root() {
            RatingNode::Branch { keys, children } => {
                assert_eq!(keys, &vec![1.0, 2.0]);
                assert_eq!(children.len(), 2);
            }
            RatingNode::Leaf(_) => panic!("root must be a branch"),
        }
    }

    #[test]
    fn test_points_flatten_in_order() {
        let rows = vec![vec![1.0, 100.0, 1.0], vec![2.0, 100.0, 5.0]];
        let table = RatingTable::from_points(2, &rows).unwrap();
        assert_eq!(table.points(), rows);
    }

    #[test]
    fn test_rejects_non_monotonic_keys() {
        assert!(RatingTable::from_points(1, &[vec![2.0, 1.0], vec![1.0, 2.0]]).is_err());
        assert!(RatingTable::from_points(1, &[vec![1.0, 1.0], vec![1.0, 2.0]]).is_err());
        let outer_repeats = [
            vec![1.0, 1.0, 1.0],
            vec![2.0, 1.0, 1.0],
            vec![1.0, 2.0, 1.0],
        ];
        assert!(RatingTable::from_points(2, &outer_repeats).is_err());
        let inner_decreases = [vec![1.0, 2.0, 1.0], vec![1.0, 1.0, 1.0]];
        assert!(RatingTable::from_points(2, &inner_decreases).is_err());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(RatingTable::from_points(1, &[]).is_err());
        assert!(RatingTable::from_points(2, &[vec![1.0, 2.0]]).is_err());
        let ragged = RatingNode::Branch {
            keys: vec![1.0, 2.0],
            children: vec![RatingNode::Leaf(1.0)],
        };
        assert!(RatingTable::new(1, ragged).is_err());
        let too_shallow = RatingNode::Branch {
            keys: vec![1.0],
            children: vec![RatingNode::Leaf(1.0)],
        };
        assert!(RatingTable::new(2, too_shallow).is_err());
    }

    #[test]
    fn test_exact_grid_values() {
        let table = two_axis();
        let lookup = [LookupPolicy::default(); 2];
        assert_eq!(table.rate(&[2.0, 300.0], &lookup).unwrap(), 11.0);
        assert_eq!(table.rate(&[1.0, 200.0], &lookup).unwrap(), 3.0);
    }

    #[test]
    fn test_exact_match_ignores_error_policy() {
        let table = one_axis();
        let lookup = [policy(Error, Error, Error)];
        assert_eq!(table.rate(&[4.0], &lookup).unwrap(), 40.0);
        assert!(table.rate(&[3.0], &lookup).is_err());
    }

    #[test]
    fn test_null_in_range_applies_on_exact_match() {
        let table = one_axis();
        let lookup = [policy(Null, Nearest, Nearest)];
        assert!(table.rate(&[2.0], &lookup).unwrap().is_nan());
        assert!(table.rate(&[3.0], &lookup).unwrap().is_nan());
        assert_eq!(table.rate(&[0.5], &lookup).unwrap(), 10.0);
        assert!(table.reverse_rate(20.0, &lookup[0]).unwrap().is_nan());
    }

    #[test]
    fn test_linear_interpolation_across_axes() {
        let table = two_axis();
        let lookup = [LookupPolicy::default(); 2];
        // axis 2 at 150: 2.0 on the first branch, 7.0 on the second
        let rated = table.rate(&[1.5, 150.0], &lookup).unwrap();
        assert!((rated - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_policies() {
        crate::logging::init_test();
        let table = one_axis();
        let lookup = [policy(Linear, Error, Null)];
        assert!(matches!(table.rate(&[0.5], &lookup), Err(crate::Error::Policy(_))));
        assert!(table.rate(&[9.0], &lookup).unwrap().is_nan());
        assert_eq!(table.rate(&[3.0], &lookup).unwrap(), 30.0);
    }

    #[test]
    fn test_extrapolation_uses_end_segments() {
        let table = one_axis();
        let lookup = [policy(Linear, Linear, Linear)];
        assert_eq!(table.rate(&[0.0], &lookup).unwrap(), 0.0);
        assert_eq!(table.rate(&[12.0], &lookup).unwrap(), 160.0);
    }

    #[test]
    fn test_selection_out_of_range_returns_boundary() {
        let table = one_axis();
        let lookup = [policy(Linear, Nearest, Nearest)];
        assert_eq!(table.rate(&[0.5], &lookup).unwrap(), 10.0);
        assert_eq!(table.rate(&[20.0], &lookup).unwrap(), 100.0);

        let toward_missing = [policy(Linear, Previous, Next)];
        assert!(table.rate(&[0.5], &toward_missing).is_err());
        assert!(table.rate(&[20.0], &toward_missing).is_err());
    }

    #[test]
    fn test_in_range_selection_methods() {
        let table = one_axis();
        let rate = |method| table.rate(&[3.0], &[policy(method, Error, Error)]).unwrap();
        assert_eq!(rate(Previous), 20.0);
        assert_eq!(rate(Lower), 20.0);
        assert_eq!(rate(Next), 40.0);
        assert_eq!(rate(Higher), 40.0);
        assert_eq!(rate(Nearest), 20.0);
        assert!(table.rate(&[3.0], &[policy(Null, Error, Error)]).unwrap().is_nan());
    }

    #[test]
    fn test_nearest_tie_prefers_lower() {
        assert_eq!(interpolate_or_select(1.5, 1.0, 2.0, 10.0, 20.0, Nearest).unwrap(), 10.0);
        assert_eq!(interpolate_or_select(1.6, 1.0, 2.0, 10.0, 20.0, Closest).unwrap(), 20.0);
    }

    #[test]
    fn test_degenerate_bracket_returns_y0() {
        assert_eq!(interpolate_or_select(5.0, 5.0, 5.0, 1.0, 2.0, Linear).unwrap(), 1.0);
    }

    #[test]
    fn test_logarithmic_interpolation() {
        let rated = interpolate_or_select(10.0, 1.0, 100.0, 1.0, 10000.0, Logarithmic).unwrap();
        assert!((rated - 100.0).abs() < 1e-9);
        let linlog = interpolate_or_select(1.5, 1.0, 2.0, 10.0, 1000.0, LinLog).unwrap();
        assert!((linlog - 100.0).abs() < 1e-9);
        let loglin = interpolate_or_select(10.0, 1.0, 100.0, 0.0, 2.0, LogLin).unwrap();
        assert!((loglin - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_logarithmic_falls_back_to_linear() {
        let x_non_positive = interpolate_or_select(0.5, 0.0, 1.0, 10.0, 20.0, Logarithmic).unwrap();
        // x stays linear, y is still interpolated in log space
        assert!((x_non_positive - 200f64.sqrt()).abs() < 1e-9);
        let y_non_positive = interpolate_or_select(10.0, 1.0, 100.0, 0.0, 2.0, Logarithmic).unwrap();
        let linear = 0.0 + (10.0 - 1.0) / 99.0 * 2.0;
        assert!((y_non_positive - linear).abs() < 1e-12);
    }

    #[test]
    fn test_nan_input_rates_to_nan() {
        let table = one_axis();
        assert!(table.rate(&[f64::NAN], &[LookupPolicy::default()]).unwrap().is_nan());
    }

    #[test]
    fn test_reverse_rate_round_trip() {
        let table = one_axis();
        let lookup = LookupPolicy::default();
        for x in [1.2, 2.0, 3.3, 7.9] {
            let dep = table.rate(&[x], &[lookup]).unwrap();
            let back = table.reverse_rate(dep, &lookup).unwrap();
            assert!((back - x).abs() < 1e-9, "{} != {}", back, x);
        }
    }

    #[test]
    fn test_reverse_rate_round_trip_with_mixed_log_methods() {
        let table = RatingTable::from_points(
            1,
            &[vec![1.0, 10.0], vec![2.0, 100.0], vec![4.0, 1000.0], vec![8.0, 1500.0]],
        )
        .unwrap();
        for method in [LinLog, LogLin] {
            let lookup = policy(method, method, method);
            for x in [1.0, 1.3, 2.0, 3.1, 5.5, 8.0] {
                let dep = table.rate(&[x], &[lookup]).unwrap();
                let back = table.reverse_rate(dep, &lookup).unwrap();
                assert!((back - x).abs() < 1e-9, "{}: {} != {}", method, back, x);
            }
        }
    }

    #[test]
    fn test_reverse_rate_requires_single_non_decreasing_axis() {
        let lookup = LookupPolicy::default();
        assert!(two_axis().reverse_rate(3.0, &lookup).is_err());
        let falling = RatingTable::from_points(1, &[vec![1.0, 5.0], vec![2.0, 4.0]]).unwrap();
        assert!(falling.reverse_rate(4.5, &lookup).is_err());
        let flat_start = RatingTable::from_points(
            1,
            &[vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 5.0]],
        )
        .unwrap();
        assert_eq!(flat_start.reverse_rate(2.5, &lookup).unwrap(), 2.5);
    }

    #[test]
    fn test_reverse_rate_null_policy() {
        let table = one_axis();
        let lookup = policy(Linear, Null, Null);
        assert!(table.reverse_rate(500.0, &lookup).unwrap().is_nan());
        assert!(table.reverse_rate(f64::NAN, &lookup).unwrap().is_nan());
    }
}
