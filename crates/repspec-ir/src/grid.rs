//! Grid-variable algebra
//!
//! A performance map samples its lookup variables on the cartesian product of
//! its grid-variable axes. [`expand`] turns the per-axis sample values into one
//! flat column per axis (one row per grid point, last-listed axis varying
//! fastest) and [`compress`] recovers the distinct, sorted axis values from such
//! columns.

use std::cmp::Ordering;
use thiserror::Error;

/// Errors raised by grid expansion
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Axis order [{}] does not match grid variables [{}]", order.join(", "), axes.join(", "))]
    AxisOrderMismatch { axes: Vec<String>, order: Vec<String> },

    #[error("Grid variable '{0}' has no values")]
    EmptyAxis(String),

    #[error("Grid column '{name}' has {actual} rows, expected {expected}")]
    RaggedColumns {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Ordered mapping from axis name to its distinct sample values
#[derive(Debug, Clone, Default)]
pub struct GridVariableSet {
    axes: Vec<(String, Vec<f64>)>,
}

impl GridVariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an axis.
    #[must_use]
    pub fn with_axis(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        match self.axes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.axes.push((name, values)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.axes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn names(&self) -> Vec<String> {
        self.axes.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.axes.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }
}

/// Axis sets compare as mappings; insertion order is irrelevant.
impl PartialEq for GridVariableSet {
    fn eq(&self, other: &Self) -> bool {
        self.axes.len() == other.axes.len()
            && self
                .axes
                .iter()
                .all(|(name, values)| other.get(name) == Some(values.as_slice()))
    }
}

/// Flat cartesian-product expansion: one equally long column per axis
#[derive(Debug, Clone, Default)]
pub struct GridSet {
    columns: Vec<(String, Vec<f64>)>,
    len: usize,
}

impl GridSet {
    /// Assemble a grid set from columns, checking that all have equal length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self, GridError> {
        let len = columns.first().map_or(0, |(_, v)| v.len());
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != len) {
            return Err(GridError::RaggedColumns {
                name: name.clone(),
                expected: len,
                actual: values.len(),
            });
        }
        Ok(Self { columns, len })
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Axis names in column order.
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }
}

impl PartialEq for GridSet {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .all(|(name, values)| other.column(name) == Some(values.as_slice()))
    }
}

/// Cartesian-product expansion of `axes` in `order`, last axis fastest.
pub fn expand(axes: &GridVariableSet, order: &[String]) -> Result<GridSet, GridError> {
    let mismatch = || GridError::AxisOrderMismatch {
        axes: axes.names(),
        order: order.to_vec(),
    };
    if order.len() != axes.len() {
        return Err(mismatch());
    }
    let mut ordered = Vec::with_capacity(order.len());
    for (position, name) in order.iter().enumerate() {
        if order[..position].contains(name) {
            return Err(mismatch());
        }
        let values = axes.get(name).ok_or_else(mismatch)?;
        if values.is_empty() {
            return Err(GridError::EmptyAxis(name.clone()));
        }
        ordered.push((name, values));
    }

    let len: usize = ordered.iter().map(|(_, v)| v.len()).product();
    let mut columns = Vec::with_capacity(ordered.len());
    let mut stride = len;
    for (name, values) in ordered {
        stride /= values.len();
        let column = (0..len)
            .map(|row| values[(row / stride) % values.len()])
            .collect();
        columns.push((name.clone(), column));
    }
    Ok(GridSet { columns, len })
}

/// Distinct values of every column, sorted ascending.
pub fn compress(grid: &GridSet) -> GridVariableSet {
    let mut axes = GridVariableSet::new();
    for (name, column) in grid.iter() {
        let mut values = column.to_vec();
        values.sort_by(f64::total_cmp);
        values.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
        axes.insert(name, values);
    }
    axes
}

/// `name` if free, else `name` followed by the smallest non-negative integer
/// that is not already taken.
pub fn unique_name<S: AsRef<str>>(name: &str, taken: &[S]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|t| t.as_ref() == candidate);
    if !is_taken(name) {
        return name.to_string();
    }
    (0..)
        .map(|i| format!("{name}{i}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// [`unique_name`] for sheet names, truncating `base` so that the result,
/// suffix included, fits `max_len` characters.
pub fn unique_sheet_name<S: AsRef<str>>(base: &str, taken: &[S], max_len: usize) -> String {
    let truncate = |s: &str, n: usize| s.chars().take(n).collect::<String>();
    let is_taken = |candidate: &str| taken.iter().any(|t| t.as_ref() == candidate);

    let whole = truncate(base, max_len);
    if !is_taken(&whole) {
        return whole;
    }
    (0_usize..)
        .map(|i| {
            let suffix = i.to_string();
            format!("{}{suffix}", truncate(base, max_len.saturating_sub(suffix.len())))
        })
        .find(|candidate| !is_taken(candidate))
        .unwrap_or(whole)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_expand_last_axis_fastest() {
        let axes = GridVariableSet::new()
            .with_axis("x", vec![1.0, 2.0])
            .with_axis("y", vec![10.0, 20.0, 30.0]);
        let grid = expand(&axes, &names(&["x", "y"])).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.column("x").unwrap(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert_eq!(grid.column("y").unwrap(), &[10.0, 20.0, 30.0, 10.0, 20.0, 30.0]);
        assert_eq!(compress(&grid), axes);
    }

    #[test]
    fn test_expand_respects_order() {
        let axes = GridVariableSet::new()
            .with_axis("x", vec![1.0, 2.0])
            .with_axis("y", vec![10.0, 20.0, 30.0]);
        let grid = expand(&axes, &names(&["y", "x"])).unwrap();
        assert_eq!(grid.column("y").unwrap(), &[10.0, 10.0, 20.0, 20.0, 30.0, 30.0]);
        assert_eq!(grid.column("x").unwrap(), &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        assert_eq!(grid.names(), names(&["y", "x"]));
    }

    #[test]
    fn test_round_trip_every_permutation() {
        let axes = GridVariableSet::new()
            .with_axis("a", vec![0.5, 1.5])
            .with_axis("b", vec![-3.0, 0.0, 7.25])
            .with_axis("c", vec![100.0]);
        let permutations = [
            ["a", "b", "c"],
            ["a", "c", "b"],
            ["b", "a", "c"],
            ["b", "c", "a"],
            ["c", "a", "b"],
            ["c", "b", "a"],
        ];
        for order in permutations {
            let grid = expand(&axes, &names(&order)).unwrap();
            assert_eq!(grid.len(), 6);
            for (_, column) in grid.iter() {
                assert_eq!(column.len(), 6);
            }
            assert_eq!(compress(&grid), axes, "order {order:?}");
        }
    }

    #[test]
    fn test_expand_rejects_order_mismatch() {
        let axes = GridVariableSet::new()
            .with_axis("x", vec![1.0])
            .with_axis("y", vec![2.0]);
        assert!(matches!(
            expand(&axes, &names(&["x"])),
            Err(GridError::AxisOrderMismatch { .. })
        ));
        assert!(matches!(
            expand(&axes, &names(&["x", "z"])),
            Err(GridError::AxisOrderMismatch { .. })
        ));
        assert!(matches!(
            expand(&axes, &names(&["x", "x"])),
            Err(GridError::AxisOrderMismatch { .. })
        ));
    }

    #[test]
    fn test_expand_rejects_empty_axis() {
        let axes = GridVariableSet::new()
            .with_axis("x", vec![1.0])
            .with_axis("y", vec![]);
        assert_eq!(
            expand(&axes, &names(&["x", "y"])),
            Err(GridError::EmptyAxis("y".to_string()))
        );
    }

    #[test]
    fn test_compress_sorts_and_dedups() {
        let grid = GridSet::from_columns(vec![("t".to_string(), vec![3.0, 1.0, 3.0, 2.0])]).unwrap();
        assert_eq!(compress(&grid).get("t").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let err = GridSet::from_columns(vec![
            ("a".to_string(), vec![1.0, 2.0]),
            ("b".to_string(), vec![1.0]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            GridError::RaggedColumns {
                name: "b".to_string(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_unique_name() {
        let taken = names(&["speeds", "speeds0", "map"]);
        assert_eq!(unique_name("other", &taken), "other");
        assert_eq!(unique_name("speeds", &taken), "speeds1");
        assert_eq!(unique_name("map", &taken), "map0");
    }

    #[test]
    fn test_unique_sheet_name_truncates() {
        let long = "performance_map_with_a_very_long_name";
        let first = unique_sheet_name(long, &Vec::<String>::new(), 31);
        assert_eq!(first.chars().count(), 31);
        let second = unique_sheet_name(long, &[first.clone()], 31);
        assert_eq!(second.chars().count(), 31);
        assert!(second.ends_with('0'));
        assert_ne!(first, second);
    }
}
