//! Benchmark driver: runs the same randomized workload against all four
//! table kinds and reports per-kind probe averages plus a comparison
//! normalized against linear probing.

use std::env;
use std::process::ExitCode;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_pcg::Lcg128Xsl64 as Pcg;

use probemap::{HashTable, ProbeStats, TableKind};

const KEY_LEN: usize = 16;
const VALUE_LEN: usize = 8;
const RATIO_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone)]
struct Config {
    size: usize,
    ops: usize,
    load: f64,
    insert_ratio: f64,
    lookup_ratio: f64,
    delete_ratio: f64,
    seed: u64,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: 100_000,
            ops: 50_000,
            load: 0.75,
            insert_ratio: 0.70,
            lookup_ratio: 0.20,
            delete_ratio: 0.10,
            seed: time_seed(),
            verbose: false,
        }
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn usage(program: &str) {
    println!("Usage: {program} [OPTIONS]");
    println!();
    println!("Run an identical randomized workload against all four table kinds");
    println!("and compare their probe counts.");
    println!();
    println!("Options:");
    println!("  --size N         table capacity in slots (default 100000)");
    println!("  --ops COUNT      number of operations (default 50000)");
    println!("  --load F         max load factor for linear/uniform; elastic/funnel");
    println!("                   use a reserve of 1-F (default 0.75)");
    println!("  --insert RATIO   fraction of insert operations (default 0.70)");
    println!("  --lookup RATIO   fraction of lookup operations (default 0.20)");
    println!("  --delete RATIO   fraction of delete operations (default 0.10)");
    println!("  --seed S         RNG seed (default: current time)");
    println!("  --verbose        print histograms and timings per kind");
    println!("  --help           show this message");
}

fn parse_args(args: &[String]) -> Result<Option<Config>, String> {
    let mut config = Config::default();
    let mut iter = args.iter();

    while let Some(flag) = iter.next() {
        let mut value_for = |name: &str| {
            iter.next()
                .ok_or_else(|| format!("{name} requires a value"))
        };
        match flag.as_str() {
            "--help" | "-h" => return Ok(None),
            "--verbose" | "-v" => config.verbose = true,
            "--size" => {
                config.size = parse_number(value_for("--size")?, "--size")?;
            }
            "--ops" => {
                config.ops = parse_number(value_for("--ops")?, "--ops")?;
            }
            "--load" => {
                config.load = parse_number(value_for("--load")?, "--load")?;
            }
            "--insert" => {
                config.insert_ratio = parse_number(value_for("--insert")?, "--insert")?;
            }
            "--lookup" => {
                config.lookup_ratio = parse_number(value_for("--lookup")?, "--lookup")?;
            }
            "--delete" => {
                config.delete_ratio = parse_number(value_for("--delete")?, "--delete")?;
            }
            "--seed" => {
                config.seed = parse_number(value_for("--seed")?, "--seed")?;
            }
            other => return Err(format!("unknown option: {other}")),
        }
    }

    validate(&config)?;
    Ok(Some(config))
}

fn parse_number<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("invalid value for {flag}: {raw}"))
}

fn validate(config: &Config) -> Result<(), String> {
    if config.size == 0 {
        return Err("--size must be positive".into());
    }
    if config.ops == 0 {
        return Err("--ops must be positive".into());
    }
    if !(config.load > 0.0 && config.load < 1.0) {
        return Err("--load must be in (0, 1)".into());
    }
    for (name, ratio) in [
        ("--insert", config.insert_ratio),
        ("--lookup", config.lookup_ratio),
        ("--delete", config.delete_ratio),
    ] {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(format!("{name} must be in [0, 1]"));
        }
    }
    let total = config.insert_ratio + config.lookup_ratio + config.delete_ratio;
    if (total - 1.0).abs() > RATIO_TOLERANCE {
        return Err(format!(
            "operation ratios must sum to 1.0 (got {total:.3})"
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum Op {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Lookup { key: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// One op stream, generated once and replayed against every kind.
fn build_workload(config: &Config) -> Vec<Op> {
    let mut rng = Pcg::seed_from_u64(config.seed);
    let mut live_keys: Vec<Vec<u8>> = Vec::new();
    let mut workload = Vec::with_capacity(config.ops);

    for _ in 0..config.ops {
        let roll: f64 = rng.r#gen();
        if roll < config.insert_ratio || live_keys.is_empty() {
            let key = random_bytes(&mut rng, KEY_LEN);
            let value = random_bytes(&mut rng, VALUE_LEN);
            live_keys.push(key.clone());
            workload.push(Op::Insert { key, value });
        } else if roll < config.insert_ratio + config.lookup_ratio {
            let idx = rng.gen_range(0..live_keys.len());
            workload.push(Op::Lookup {
                key: live_keys[idx].clone(),
            });
        } else {
            let idx = rng.gen_range(0..live_keys.len());
            workload.push(Op::Delete {
                key: live_keys.swap_remove(idx),
            });
        }
    }

    workload
}

fn random_bytes(rng: &mut Pcg, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng.fill(bytes.as_mut_slice());
    bytes
}

#[derive(Debug)]
struct RunResult {
    kind: TableKind,
    stats: ProbeStats,
    load_factor: f64,
    avg_insert: f64,
    avg_lookup: f64,
    avg_delete: f64,
    elapsed: Duration,
    failed_ops: u64,
}

fn run_kind(kind: TableKind, config: &Config, workload: &[Op]) -> Option<RunResult> {
    let param = match kind {
        TableKind::Elastic | TableKind::Funnel => 1.0 - config.load,
        TableKind::Linear | TableKind::Uniform => config.load,
    };
    let mut table = HashTable::new(kind, config.size, param)?;

    let mut failed_ops = 0u64;
    let start = Instant::now();
    for op in workload {
        let ok = match op {
            Op::Insert { key, value } => table.insert(key, value),
            Op::Lookup { key } => table.lookup(key).is_some(),
            Op::Delete { key } => table.remove(key),
        };
        if !ok {
            failed_ops += 1;
        }
    }
    let elapsed = start.elapsed();

    Some(RunResult {
        kind,
        stats: table.stats().clone(),
        load_factor: table.load_factor(),
        avg_insert: table.avg_insert_probes(),
        avg_lookup: table.avg_lookup_probes(),
        avg_delete: table.avg_delete_probes(),
        elapsed,
        failed_ops,
    })
}

fn print_results(results: &[RunResult], config: &Config) {
    let rule = format!(
        "+{}+{}+{}+{}+{}+{}+",
        "-".repeat(18),
        "-".repeat(12),
        "-".repeat(15),
        "-".repeat(15),
        "-".repeat(15),
        "-".repeat(13)
    );

    println!("{rule}");
    println!(
        "| {:<16} | {:>10} | {:>13} | {:>13} | {:>13} | {:>11} |",
        "Hash Type", "Avg Probes", "Insert Probes", "Lookup Probes", "Delete Probes", "Load Factor"
    );
    println!("{rule}");
    for result in results {
        println!(
            "| {:<16} | {:>10.2} | {:>13.2} | {:>13.2} | {:>13.2} | {:>11.2} |",
            result.kind.name(),
            result.stats.avg_probes,
            result.avg_insert,
            result.avg_lookup,
            result.avg_delete,
            result.load_factor
        );
    }
    println!("{rule}");

    if let Some(baseline) = results.iter().find(|r| r.kind == TableKind::Linear) {
        println!();
        println!("Relative to linear probing (lower is better):");
        let rule = format!(
            "+{}+{}+{}+{}+",
            "-".repeat(18),
            "-".repeat(12),
            "-".repeat(15),
            "-".repeat(15)
        );
        println!("{rule}");
        println!(
            "| {:<16} | {:>10} | {:>13} | {:>13} |",
            "Hash Type", "Probes", "Insert Probes", "Lookup Probes"
        );
        println!("{rule}");
        for result in results {
            println!(
                "| {:<16} | {:>10.3} | {:>13.3} | {:>13.3} |",
                result.kind.name(),
                normalized(result.stats.avg_probes, baseline.stats.avg_probes),
                normalized(result.avg_insert, baseline.avg_insert),
                normalized(result.avg_lookup, baseline.avg_lookup)
            );
        }
        println!("{rule}");
    }

    if config.verbose {
        for result in results {
            println!();
            println!(
                "{} details ({:.2?} wall clock, {} failed ops):",
                result.kind.name(),
                result.elapsed,
                result.failed_ops
            );
            print!("{}", result.stats);
        }
    }
}

fn normalized(value: f64, baseline: f64) -> f64 {
    if baseline == 0.0 { 0.0 } else { value / baseline }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("probebench");

    let config = match parse_args(&args[1..]) {
        Ok(Some(config)) => config,
        Ok(None) => {
            usage(program);
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("run '{program} --help' for usage");
            return ExitCode::from(2);
        }
    };

    println!(
        "probe comparison: size={} ops={} load={:.2} ratios={:.2}/{:.2}/{:.2} seed={}",
        config.size,
        config.ops,
        config.load,
        config.insert_ratio,
        config.lookup_ratio,
        config.delete_ratio,
        config.seed
    );
    println!();

    let workload = build_workload(&config);
    let mut results = Vec::with_capacity(TableKind::ALL.len());
    for kind in TableKind::ALL {
        match run_kind(kind, &config, &workload) {
            Some(result) => results.push(result),
            None => {
                eprintln!("error: could not create {kind} table with the given parameters");
                return ExitCode::from(2);
            }
        }
    }

    print_results(&results, &config);
    ExitCode::SUCCESS
}
