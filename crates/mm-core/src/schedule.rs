//! Loop-nest descriptions of the kernels.
//!
//! A [`LoopNest`] records the loop order, extents and the position of the
//! hoisted A load for a kernel, and renders them as pseudo-IR. It mirrors
//! the hand-written loops in [`crate::cpu`] and is used for inspection and
//! load accounting, not for execution.

use std::fmt;

use crate::shape::MatmulDims;
use crate::tiling::{Axis, AxisTiling, TileConfig};

/// Block level of a loop within its axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// The axis is not tiled; the loop covers it entirely.
    Full,
    Outer,
    Middle,
    Inner,
}

/// One loop of a nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLevel {
    pub axis: Axis,
    pub level: Level,
    pub extent: usize,
}

impl LoopLevel {
    /// Loop variable name, e.g. `k` or `m_outer`.
    pub fn var(&self) -> String {
        match self.level {
            Level::Full => self.axis.to_string(),
            Level::Outer => format!("{}_outer", self.axis),
            Level::Middle => format!("{}_middle", self.axis),
            Level::Inner => format!("{}_inner", self.axis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopNest {
    loops: Vec<LoopLevel>,
    /// Index of the loop the A load is hoisted above.
    hoist: Option<usize>,
    tiles: Option<TileConfig>,
}

impl LoopNest {
    /// The m, n, k triple loop.
    pub fn naive(dims: MatmulDims) -> Self {
        let full = |axis, extent| LoopLevel {
            axis,
            level: Level::Full,
            extent,
        };
        LoopNest {
            loops: vec![full(Axis::M, dims.m), full(Axis::N, dims.n), full(Axis::K, dims.k)],
            hoist: None,
            tiles: None,
        }
    }

    /// The nest executed by [`BlockedMatmul`](crate::cpu::BlockedMatmul).
    pub fn blocked(tiles: &TileConfig) -> Self {
        use Axis::{K, M, N};
        use Level::{Inner, Middle, Outer};

        let order = [
            (M, Outer),
            (N, Outer),
            (K, Outer),
            (M, Middle),
            (N, Middle),
            (K, Middle),
            (M, Inner),
            (K, Inner),
            (N, Inner),
        ];
        let loops = order
            .into_iter()
            .map(|(axis, level)| {
                let t = tiles.axis(axis);
                let extent = match level {
                    Outer => t.outer,
                    Middle => t.middle,
                    _ => t.inner,
                };
                LoopLevel {
                    axis,
                    level,
                    extent,
                }
            })
            .collect();
        LoopNest {
            loops,
            hoist: Some(order.len() - 1),
            tiles: Some(*tiles),
        }
    }

    pub fn loops(&self) -> &[LoopLevel] {
        &self.loops
    }

    /// Loop variable names from outermost to innermost.
    pub fn order(&self) -> Vec<String> {
        self.loops.iter().map(LoopLevel::var).collect()
    }

    /// Depth of the loop the A load sits directly above, if hoisted.
    pub fn hoist_depth(&self) -> Option<usize> {
        self.hoist
    }

    /// Depth of the innermost k loop, which carries the reduction.
    pub fn reduction_depth(&self) -> Option<usize> {
        self.loops.iter().rposition(|l| l.axis == Axis::K)
    }

    /// Total innermost iterations (= m * n * k).
    pub fn iterations(&self) -> u64 {
        self.loops.iter().map(|l| l.extent as u64).product()
    }

    /// Number of A element loads the nest performs.
    pub fn a_loads(&self) -> u64 {
        match self.hoist {
            Some(depth) => self.loops[..depth].iter().map(|l| l.extent as u64).product(),
            None => self.iterations(),
        }
    }

    /// Number of B element loads (one per innermost iteration).
    pub fn b_loads(&self) -> u64 {
        self.iterations()
    }

    /// Pseudo-IR rendering of the nest.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

fn index_expr(axis: Axis, t: &AxisTiling) -> String {
    format!(
        "{axis} = {axis}_outer * {} + {axis}_middle * {} + {axis}_inner",
        t.block(),
        t.inner
    )
}

impl fmt::Display for LoopNest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tiles) = &self.tiles {
            for axis in [Axis::M, Axis::N, Axis::K] {
                writeln!(f, "// {}", index_expr(axis, tiles.axis(axis)))?;
            }
        }
        let reduction = self.reduction_depth();
        let mut indent = String::new();
        for (depth, l) in self.loops.iter().enumerate() {
            if self.hoist == Some(depth) {
                writeln!(f, "{indent}%a = load A[m, k]  // hoisted")?;
            }
            write!(f, "{indent}for {} in 0..{} {{", l.var(), l.extent)?;
            if reduction == Some(depth) {
                write!(f, "  // reduction")?;
            }
            writeln!(f)?;
            indent.push_str("  ");
        }
        if self.hoist.is_some() {
            writeln!(f, "{indent}C[m, n] += %a * B[k, n]")?;
        } else {
            writeln!(f, "{indent}C[m, n] += A[m, k] * B[k, n]")?;
        }
        for _ in &self.loops {
            indent.truncate(indent.len() - 2);
            writeln!(f, "{indent}}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_order() {
        let nest = LoopNest::blocked(&TileConfig::REFERENCE);
        assert_eq!(
            nest.order(),
            vec![
                "m_outer", "n_outer", "k_outer", "m_middle", "n_middle", "k_middle", "m_inner",
                "k_inner", "n_inner"
            ]
        );
        assert_eq!(nest.reduction_depth(), Some(7));
        assert_eq!(nest.hoist_depth(), Some(8));
        let extents: Vec<usize> = nest.loops().iter().map(|l| l.extent).collect();
        assert_eq!(extents, vec![4, 4, 4, 8, 2, 8, 32, 32, 128]);
    }

    #[test]
    fn test_iteration_counts() {
        let dims = MatmulDims::square(1024);
        let naive = LoopNest::naive(dims);
        let blocked = LoopNest::blocked(&TileConfig::REFERENCE);
        assert_eq!(naive.iterations(), 1 << 30);
        assert_eq!(blocked.iterations(), naive.iterations());
        assert_eq!(naive.a_loads(), naive.b_loads());
        // The hoist saves one A load per n_inner step.
        assert_eq!(naive.a_loads() / blocked.a_loads(), 128);
    }

    #[test]
    fn test_naive_order() {
        let nest = LoopNest::naive(MatmulDims::new(2, 3, 4));
        assert_eq!(nest.order(), vec!["m", "n", "k"]);
        assert_eq!(nest.hoist_depth(), None);
        assert_eq!(nest.reduction_depth(), Some(2));
        assert_eq!(nest.iterations(), 24);
    }

    #[test]
    fn test_render_places_hoist_above_n_inner() {
        let text = LoopNest::blocked(&TileConfig::REFERENCE).render();
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        assert_eq!(lines[0], "// m = m_outer * 256 + m_middle * 32 + m_inner");
        assert_eq!(lines[1], "// n = n_outer * 256 + n_middle * 128 + n_inner");
        let load = lines.iter().position(|l| l.starts_with("%a = load")).unwrap();
        assert_eq!(lines[load - 1], "for k_inner in 0..32 {  // reduction");
        assert_eq!(lines[load + 1], "for n_inner in 0..128 {");
        assert_eq!(lines[load + 2], "C[m, n] += %a * B[k, n]");
        assert_eq!(lines.iter().filter(|l| **l == "}").count(), 9);
    }

    #[test]
    fn test_render_naive() {
        let text = LoopNest::naive(MatmulDims::square(2)).render();
        assert_eq!(
            text,
            "for m in 0..2 {\n  for n in 0..2 {\n    for k in 0..2 {  // reduction\n      C[m, n] += A[m, k] * B[k, n]\n    }\n  }\n}\n"
        );
    }
}
