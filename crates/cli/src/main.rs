use clap::{Parser, ValueEnum};
use maps_core::{MapValue, Operator};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Arithmetic on saved survey maps
#[derive(Parser, Debug)]
#[command(name = "maps-calc")]
#[command(about = "Combine saved maps with uncertainty, mask and unit propagation", long_about = None)]
struct Args {
    /// Left operand (JSON map file)
    #[arg(short, long)]
    left: PathBuf,

    /// Right operand (JSON map file), required for binary operators
    #[arg(short, long)]
    right: Option<PathBuf>,

    /// Operator to apply
    #[arg(short, long, value_enum, default_value_t = Op::Add)]
    op: Op,

    /// Exponent for `--op pow`
    #[arg(short, long, default_value_t = 2.0, allow_negative_numbers = true)]
    power: f64,

    /// Where to save the result (summary only when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Op {
    fn binary(self) -> Option<Operator> {
        match self {
            Op::Add => Some(Operator::Add),
            Op::Sub => Some(Operator::Sub),
            Op::Mul => Some(Operator::Mul),
            Op::Div => Some(Operator::Div),
            Op::Pow => None,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let binary = match (args.op.binary(), &args.right) {
        (Some(op), Some(right_path)) => Some((op, right_path)),
        (Some(_), None) => return Err(format!("--op {:?} needs --right", args.op).into()),
        (None, _) => None,
    };
    let left = MapValue::restore(&args.left, false)?;

    let result = match binary {
        Some((op, right_path)) => {
            let right = MapValue::restore(right_path, false)?;
            info!("Computing left {} right", op);
            left.apply(&right, op)?
        }
        None => {
            info!("Computing left ** {}", args.power);
            left.powf(args.power)
        }
    };

    print_summary(&result);

    if let Some(output) = &args.output {
        result.save(output)?;
    }
    Ok(())
}

fn print_summary(map: &MapValue) {
    let (rows, cols) = map.shape();
    let total = rows * cols;
    let good: Vec<f64> = map.masked().iter().filter_map(|v| *v).collect();
    let finite: Vec<f64> = good.iter().copied().filter(|v| v.is_finite()).collect();

    println!("\n=== Result ===");
    println!("Shape: {rows} x {cols}");
    match map.unit() {
        Some(unit) => println!("Unit: {unit}"),
        None => println!("Unit: (none)"),
    }
    println!("Unmasked spaxels: {} / {}", good.len(), total);

    if finite.is_empty() {
        println!("No finite unmasked values");
    } else {
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        println!("Value range: {min:.6e} .. {max:.6e} (mean {mean:.6e})");
    }

    if let Some(ivar) = map.ivar() {
        let informative = ivar.iter().filter(|&&x| x > 0.0).count();
        println!("Spaxels with uncertainty: {informative} / {total}");
    } else {
        println!("No inverse variance");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "maps-calc", "--left", "a.json", "--right", "b.json", "--op", "div",
        ]);
        assert_eq!(args.op, Op::Div);
        assert_eq!(args.op.binary(), Some(Operator::Div));
        assert!(args.output.is_none());

        let args = Args::parse_from(["maps-calc", "-l", "a.json", "--op", "pow", "-p", "0.5"]);
        assert_eq!(args.op.binary(), None);
        assert_eq!(args.power, 0.5);

        let args = Args::parse_from([
            "maps-calc", "-l", "a.json", "--op", "pow", "--power", "-0.5",
        ]);
        assert_eq!(args.power, -0.5);

        let args = Args::parse_from(["maps-calc", "-l", "a.json", "--op", "pow", "-p", "-2"]);
        assert_eq!(args.power, -2.0);
    }

    #[test]
    fn test_binary_op_requires_right() {
        let args = Args::parse_from(["maps-calc", "--left", "missing.json"]);
        let err = run(&args).unwrap_err();
        assert!(err.to_string().contains("needs --right"), "{err}");

        // pow never reads --right, so the missing left file is the failure
        let args = Args::parse_from(["maps-calc", "--left", "missing.json", "--op", "pow"]);
        let err = run(&args).unwrap_err();
        assert!(!err.to_string().contains("needs --right"), "{err}");
    }
}
