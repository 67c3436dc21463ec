/// Pure Rust benchmarks for the two vertical solvers.
///
/// Uses std::time::Instant for timing, a deterministic LCG PRNG for forcing
/// generation, and std::hint::black_box to prevent dead-code elimination.
/// Set `RUST_LOG=soilflux_core=debug` to see per-day solver summaries.
use std::hint::black_box;
use std::time::{Duration, Instant};

use soilflux_core::traits::HydrologicalModel;
use soilflux_core::{
    DailyForcing, EngineConfig, LayerVec, LowerBoundary, SoilColumn, SolverKind, WaterEngine,
};

const REPEATS: usize = 5;

/// Root-length fractions over the standard profile, top 0.6 m.
const ROOTS: [f64; 10] = [0.15, 0.25, 0.35, 0.25, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

/// Simple LCG PRNG for deterministic forcing generation.
fn make_forcing(n: usize, seed: u64) -> Vec<DailyForcing> {
    let mut state = seed;
    let mut next_f64 = || -> f64 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };

    (0..n)
        .map(|_| {
            // roughly one day in three is wet
            let wet = next_f64() < 0.35;
            DailyForcing {
                throughfall: if wet { next_f64() * 25.0 } else { 0.0 },
                potential_evaporation: 0.2 + next_f64() * 2.5,
                potential_transpiration: next_f64() * 3.5,
                root_fractions: LayerVec::from_slice(&ROOTS),
                rooting_depth: 0.6,
                ..DailyForcing::default()
            }
        })
        .collect()
}

/// Run a closure `REPEATS` times, return the median duration.
fn median_time<F: FnMut()>(mut f: F) -> Duration {
    let mut times: Vec<Duration> = (0..REPEATS)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .collect();
    times.sort();
    times[REPEATS / 2]
}

fn bench_solver(
    kind: SolverKind,
    sizes: &[usize],
) -> Result<Vec<(&'static str, usize, Duration)>, Box<dyn std::error::Error>> {
    let name = match kind {
        SolverKind::Richards => "richards",
        SolverKind::Tipping => "tipping",
    };
    let column = SoilColumn::from_texture(40.0, 40.0, 20.0, LowerBoundary::FreeDrainage)?;
    let mut results = Vec::new();

    for &n in sizes {
        let forcing = make_forcing(n, 42);
        let mut engine = WaterEngine::new(column.clone(), EngineConfig::with_solver(kind))?;

        // Warmup
        black_box(engine.run(&forcing, None)?);

        let mut failure = None;
        let dur = median_time(|| {
            if let Err(e) = engine.run(&forcing, None).map(black_box) {
                failure = Some(e);
            }
        });
        if let Some(e) = failure {
            return Err(e.into());
        }
        results.push((name, n, dur));
    }
    Ok(results)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Soil Water Engine Benchmarks");
    println!("============================================================");
    println!("{:<18} {:>6}   {:>12}", "Solver", "N", "Median (ms)");
    println!("--------------------------------------------");

    let mut all_results: Vec<(&str, usize, Duration)> = Vec::new();

    all_results.extend(bench_solver(SolverKind::Tipping, &[365, 3650, 36500])?);
    all_results.extend(bench_solver(SolverKind::Richards, &[365, 3650])?);

    for (solver, n, dur) in &all_results {
        let ms = dur.as_secs_f64() * 1000.0;
        println!("{:<18} {:>6}      {:>8.2}", solver, n, ms);
    }

    println!("============================================================");
    Ok(())
}
