use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use mm_core::{
    AxisTiling, KernelKind, LoopNest, MatmulDims, MatmulKernel, TileConfig, REFERENCE_SIZE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mm-cli")]
#[command(about = "tiled-matmul development CLI")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Time the kernels on random matrices.
    Bench {
        #[command(flatten)]
        problem: Problem,
        /// Kernel to run (repeatable); all kernels when omitted.
        #[arg(long = "kernel")]
        kernels: Vec<KernelKind>,
        /// Timed runs per kernel.
        #[arg(long, default_value_t = 3)]
        iters: usize,
    },
    /// Compare the blocked kernels against the naive baseline.
    Verify {
        #[command(flatten)]
        problem: Problem,
        /// Largest accepted relative error per element.
        #[arg(long, default_value_t = 1e-3)]
        tolerance: f32,
    },
    /// Print the naive and blocked loop nests.
    Schedule {
        #[command(flatten)]
        problem: Problem,
    },
}

/// Problem size and tiling shared by every subcommand.
#[derive(clap::Args)]
struct Problem {
    /// Side length used for any of m, k, n not given explicitly.
    #[arg(long, default_value_t = REFERENCE_SIZE)]
    size: usize,
    #[arg(long)]
    m: Option<usize>,
    #[arg(long)]
    k: Option<usize>,
    #[arg(long)]
    n: Option<usize>,
    /// m-axis tiling as OUTERxMIDDLExINNER, e.g. 4x8x32.
    #[arg(long)]
    m_tiles: Option<AxisTiling>,
    /// n-axis tiling as OUTERxMIDDLExINNER, e.g. 4x2x128.
    #[arg(long)]
    n_tiles: Option<AxisTiling>,
    /// k-axis tiling as OUTERxMIDDLExINNER, e.g. 4x8x32.
    #[arg(long)]
    k_tiles: Option<AxisTiling>,
    /// Seed for the random operands.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Problem {
    fn dims(&self) -> MatmulDims {
        MatmulDims::new(
            self.m.unwrap_or(self.size),
            self.k.unwrap_or(self.size),
            self.n.unwrap_or(self.size),
        )
    }

    /// Tiling derived for the dims, with any explicit axis overrides applied.
    fn tiles(&self, dims: MatmulDims) -> Result<TileConfig> {
        let mut tiles = TileConfig::for_dims(dims);
        if let Some(t) = self.m_tiles {
            tiles.m = t;
        }
        if let Some(t) = self.n_tiles {
            tiles.n = t;
        }
        if let Some(t) = self.k_tiles {
            tiles.k = t;
        }
        tiles.validate(dims)?;
        Ok(tiles)
    }

    fn operands(&self, dims: MatmulDims) -> (Vec<f32>, Vec<f32>) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut random = |len: usize| -> Vec<f32> {
            (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
        };
        let a = random(dims.m * dims.k);
        let b = random(dims.k * dims.n);
        (a, b)
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("MM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    match args.cmd {
        Cmd::Bench {
            problem,
            kernels,
            iters,
        } => bench(&problem, &kernels, iters),
        Cmd::Verify { problem, tolerance } => verify(&problem, tolerance),
        Cmd::Schedule { problem } => schedule(&problem),
    }
}

fn bench(problem: &Problem, kernels: &[KernelKind], iters: usize) -> Result<()> {
    let dims = problem.dims();
    let tiles = problem.tiles(dims)?;
    let kinds = if kernels.is_empty() {
        KernelKind::ALL.to_vec()
    } else {
        kernels.to_vec()
    };
    let iters = iters.max(1);
    let (a, b) = problem.operands(dims);
    let mut c = vec![0.0f32; dims.m * dims.n];

    info!(%dims, %tiles, iters, "starting benchmark");
    println!("Matrix: {dims}");
    println!("Tiling: {tiles}");
    println!("{}", "-".repeat(50));
    println!("{:<14} {:>12} {:>12} {:>10}", "kernel", "best (ms)", "mean (ms)", "GFLOP/s");

    for kind in kinds {
        let kernel = kind.kernel(dims, Some(tiles));
        let mut times = Vec::with_capacity(iters);
        for run in 0..iters {
            c.fill(0.0);
            let start = Instant::now();
            kernel.matmul_into(&a, &b, &mut c, dims)?;
            let elapsed = start.elapsed();
            debug!(kernel = kernel.name(), run, ?elapsed, "timed run");
            times.push(elapsed);
        }

        let best = times.iter().min().copied().unwrap_or_default();
        let mean = times.iter().sum::<Duration>() / iters as u32;
        let gflops = dims.flops() as f64 / best.as_secs_f64().max(f64::EPSILON) / 1e9;
        println!(
            "{:<14} {:>12.2} {:>12.2} {:>10.2}",
            kernel.name(),
            best.as_secs_f64() * 1e3,
            mean.as_secs_f64() * 1e3,
            gflops
        );
        info!(kernel = kernel.name(), best_ms = best.as_secs_f64() * 1e3, gflops, "kernel done");
    }
    Ok(())
}

fn verify(problem: &Problem, tolerance: f32) -> Result<()> {
    let dims = problem.dims();
    let tiles = problem.tiles(dims)?;
    let (a, b) = problem.operands(dims);

    let expected = KernelKind::Naive.kernel(dims, None).matmul(&a, &b, dims)?;
    for kind in [KernelKind::Blocked, KernelKind::BlockedParallel] {
        let kernel = kind.kernel(dims, Some(tiles));
        let actual = kernel.matmul(&a, &b, dims)?;
        let worst = expected
            .iter()
            .zip(&actual)
            .map(|(x, y)| (x - y).abs() / x.abs().max(1.0))
            .fold(0.0f32, f32::max);
        println!("{:<14} max relative error {worst:.3e}", kernel.name());
        if worst > tolerance {
            bail!(
                "{} differs from naive by {worst:e} (tolerance {tolerance:e})",
                kernel.name()
            );
        }
    }
    info!(%dims, %tiles, "blocked kernels match naive");
    Ok(())
}

fn schedule(problem: &Problem) -> Result<()> {
    let dims = problem.dims();
    let tiles = problem.tiles(dims)?;

    for (label, nest) in [
        ("naive", LoopNest::naive(dims)),
        ("blocked", LoopNest::blocked(&tiles)),
    ] {
        println!("== {label}");
        print!("{nest}");
        println!(
            "iterations {}  A loads {}  B loads {}\n",
            nest.iterations(),
            nest.a_loads(),
            nest.b_loads()
        );
    }
    Ok(())
}
