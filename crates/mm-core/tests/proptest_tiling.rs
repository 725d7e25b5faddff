//! Property tests for tile arithmetic and blocked/naive agreement.
//!
//! Tilings are generated with small radices so that every configuration,
//! including degenerate single-element blocks, gets exercised quickly.

use mm_core::cpu::{matmul_blocked, matmul_naive};
use mm_core::{AxisTiling, LoopNest, MatmulDims, TileConfig};
use proptest::prelude::*;

// ── Strategies ───────────────────────────────────────────────────────────

fn radix() -> impl Strategy<Value = usize> {
    1usize..=5
}

fn arb_axis() -> impl Strategy<Value = AxisTiling> {
    (radix(), radix(), radix()).prop_map(|(o, m, i)| AxisTiling::new(o, m, i))
}

fn arb_tiles() -> impl Strategy<Value = TileConfig> {
    (arb_axis(), arb_axis(), arb_axis()).prop_map(|(m, n, k)| TileConfig::new(m, n, k))
}

/// Integer-valued entries keep every partial sum exact in f32.
fn small_ints(len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec((-4i32..=4).prop_map(|v| v as f32), len)
}

fn tiles_with_data() -> impl Strategy<Value = (TileConfig, Vec<f32>, Vec<f32>)> {
    arb_tiles().prop_flat_map(|tiles| {
        let dims = tiles.dims();
        (
            Just(tiles),
            small_ints(dims.m * dims.k),
            small_ints(dims.k * dims.n),
        )
    })
}

// ── Properties ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn decompose_compose_is_bijection(t in arb_axis()) {
        let mut seen = vec![false; t.extent()];
        for idx in 0..t.extent() {
            let c = t.decompose(idx);
            prop_assert!(c.outer < t.outer && c.middle < t.middle && c.inner < t.inner);
            prop_assert_eq!(t.compose(c.outer, c.middle, c.inner), idx);
            prop_assert!(!seen[idx]);
            seen[idx] = true;
        }
        prop_assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn fit_always_covers_extent(extent in 1usize..=2048, inner in 1usize..=256, middle in 1usize..=16) {
        let t = AxisTiling::fit(extent, inner, middle);
        prop_assert_eq!(t.extent(), extent);
        prop_assert!(t.inner <= inner);
        prop_assert!(t.middle <= middle);
    }

    #[test]
    fn blocked_matches_naive((tiles, a, b) in tiles_with_data()) {
        let dims = tiles.dims();
        let mut naive = vec![0.0; dims.m * dims.n];
        let mut blocked = vec![0.0; dims.m * dims.n];
        matmul_naive(&a, &b, &mut naive, dims);
        matmul_blocked(&a, &b, &mut blocked, dims, &tiles);
        prop_assert_eq!(naive, blocked);
    }

    #[test]
    fn nest_iterations_match_dims(tiles in arb_tiles()) {
        let dims: MatmulDims = tiles.dims();
        let nest = LoopNest::blocked(&tiles);
        prop_assert_eq!(nest.iterations(), LoopNest::naive(dims).iterations());
        prop_assert_eq!(nest.a_loads() * tiles.n.inner as u64, nest.iterations());
    }
}
