//! Alpha expression enumeration.
//!
//! Exhaustive Cartesian product over five axes, each combination rendered as
//! `groupOp(tsOp(field, window), group)`. Enumeration is lazy; the full list
//! is only materialized when generating, and is then shuffled so sequential
//! submission under a quota does not favor any one axis value.

use rand::seq::SliceRandom;
use rand::Rng;

/// Axes of the expression space.
#[derive(Debug, Clone)]
pub struct ExpressionGrid {
    pub group_ops: Vec<String>,
    pub ts_ops: Vec<String>,
    pub fields: Vec<String>,
    pub windows: Vec<u32>,
    pub groups: Vec<String>,
}

impl Default for ExpressionGrid {
    fn default() -> Self {
        Self {
            group_ops: to_strings(&["group_rank", "group_zscore", "group_percentile"]),
            ts_ops: to_strings(&["ts_zscore", "ts_av_rank", "ts_av_zscore"]),
            fields: Vec::new(),
            windows: vec![120, 240],
            groups: to_strings(&[
                "market",
                "industry",
                "sector",
                "densify(py13_h_f1_sector)",
                "densify(pv13_revere_company_total)",
                "densify(pv13_revere_key_sector_total)",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ExpressionGrid {
    /// Default axes over the given candidate fields.
    pub fn with_fields(fields: Vec<String>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Number of expressions the grid enumerates: the product of the five
    /// axis lengths.
    pub fn len(&self) -> usize {
        self.group_ops.len()
            * self.ts_ops.len()
            * self.fields.len()
            * self.windows.len()
            * self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy enumeration in `group_op → ts_op → field → window → group`
    /// nesting order. Each combination is rendered exactly once; duplicate
    /// axis entries yield duplicate expressions, kept as-is.
    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.group_ops.iter().flat_map(move |group_op| {
            self.ts_ops.iter().flat_map(move |ts_op| {
                self.fields.iter().flat_map(move |field| {
                    self.windows.iter().flat_map(move |window| {
                        self.groups.iter().map(move |group| {
                            format!("{}({}({}, {}), {})", group_op, ts_op, field, window, group)
                        })
                    })
                })
            })
        })
    }

    /// Materialize the full grid and shuffle it uniformly.
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Vec<String> {
        let mut expressions: Vec<String> = self.iter().collect();
        expressions.shuffle(rng);
        expressions
    }
}
