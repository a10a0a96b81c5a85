use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use font_varmodel::{DesignSpace, Diagnostic, Location, Payload, SourceInstancer};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("expected NAME=VALUE: {0}")]
    InvalidSpec(String),
    #[error("axis name must not be empty: {0}")]
    EmptyName(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

#[derive(Parser)]
#[command(name = "font-varmodel", version)]
#[command(about = "Interpolate design-space sources at user locations")]
struct Cli {
    /// Design-space document (JSON)
    input: PathBuf,

    /// Location as NAME=VALUE[,NAME=VALUE...] (e.g., Weight=700,Italic=1); repeatable
    #[arg(short, long = "location", value_name = "NAME=VALUE")]
    locations: Vec<String>,

    /// Print source contributions instead of instances
    #[arg(long)]
    contributions: bool,

    /// Do not report diagnostics on stderr
    #[arg(short, long)]
    quiet: bool,

    /// Show design-space axes info
    #[arg(long)]
    info: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contributions: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<Diagnostic>,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    if cli.info {
        return show_info(&cli.input);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut locations = parse_locations(&cli.locations)?;
    if locations.is_empty() {
        locations.push(Location::new());
    }

    let designspace = DesignSpace::load(&cli.input)?;
    let instancer = SourceInstancer::new(&designspace)
        .with_context(|| format!("failed to build model for {}", cli.input.display()))?;

    let reports = locations
        .into_par_iter()
        .map(|location| report(&instancer, location, cli.contributions))
        .collect::<Result<Vec<_>>>()?;

    for report in &reports {
        if !cli.quiet {
            for diagnostic in &report.errors {
                eprintln!("{}: {diagnostic}", format_location(&report.location));
            }
        }
        println!("{}", serde_json::to_string(report)?);
    }

    Ok(())
}

fn report(instancer: &SourceInstancer, location: Location, contributions: bool) -> Result<Report> {
    let context = || format!("failed to interpolate at {}", format_location(&location));
    if contributions {
        let result = instancer.source_contributions(&location).with_context(context)?;
        Ok(Report { location, instance: None, contributions: Some(result.instance), errors: result.errors })
    } else {
        let result = instancer.instantiate(&location).with_context(context)?;
        Ok(Report { location, instance: Some(result.instance), contributions: None, errors: result.errors })
    }
}

fn parse_locations(args: &[String]) -> Result<Vec<Location>, CliError> {
    args.iter().map(String::as_str).map(parse_location).collect()
}

fn parse_location(s: &str) -> Result<Location, CliError> {
    s.split(',')
        .map(str::trim)
        .filter(|spec| !spec.is_empty())
        .map(parse_axis_spec)
        .collect()
}

fn parse_axis_spec(s: &str) -> Result<(String, f64), CliError> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| CliError::InvalidSpec(s.to_string()))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::EmptyName(s.to_string()));
    }

    let value = value.trim();
    let value: f64 = value.parse().map_err(|_| CliError::InvalidValue(value.to_string()))?;

    Ok((name.to_string(), value))
}

fn format_location(location: &Location) -> String {
    if location.is_empty() {
        return "default".to_string();
    }
    location
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn show_info(path: &Path) -> ExitCode {
    let designspace = match DesignSpace::load(path) {
        Ok(ds) => ds,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Axes:");
    for axis in &designspace.axes {
        match &axis.values {
            Some(values) => println!(
                "  {:12}  discrete {:?} (default: {})",
                axis.name, values, axis.default_value
            ),
            None => println!(
                "  {:12}  {:6} .. {:6} (default: {:6})",
                axis.name,
                axis.minimum(),
                axis.maximum(),
                axis.default_value,
            ),
        }
        if !axis.mapping.is_empty() {
            println!("  {:12}  mapping {:?}", "", axis.mapping);
        }
    }

    println!("Sources: {}", designspace.sources.len());
    for (index, source) in designspace.sources.iter().enumerate() {
        let name = source.name.clone().unwrap_or_else(|| format!("#{index}"));
        println!("  {name:12}  {}", format_location(&source.location));
    }

    if !designspace.mappings.is_empty() {
        println!("Cross-axis mappings: {}", designspace.mappings.len());
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_spec() {
        assert_eq!(parse_axis_spec("Weight=700").unwrap(), ("Weight".to_string(), 700.0));
    }

    #[test]
    fn parse_float_value() {
        assert_eq!(parse_axis_spec("opsz=10.5").unwrap().1, 10.5);
        assert_eq!(parse_axis_spec("slnt=-12").unwrap().1, -12.0);
    }

    #[test]
    fn parse_invalid_spec() {
        assert!(matches!(parse_axis_spec("Weight700"), Err(CliError::InvalidSpec(_))));
        assert!(matches!(parse_axis_spec("=700"), Err(CliError::EmptyName(_))));
        assert!(matches!(parse_axis_spec("Weight=bold"), Err(CliError::InvalidValue(_))));
    }

    #[test]
    fn parse_multi_axis_location() {
        let location = parse_location("Weight=700, Italic=1").unwrap();
        assert_eq!(location.len(), 2);
        assert_eq!(location["Weight"], 700.0);
        assert_eq!(location["Italic"], 1.0);

        assert!(parse_location("").unwrap().is_empty());
        assert!(parse_location("Weight=700,Width").is_err());
    }

    #[test]
    fn format_locations() {
        assert_eq!(format_location(&Location::new()), "default");
        assert_eq!(format_location(&parse_location("wght=700,Italic=1").unwrap()), "Italic=1,wght=700");
    }

    #[test]
    fn cli_accepts_repeated_locations() {
        let cli = Cli::try_parse_from([
            "font-varmodel",
            "doc.json",
            "-l",
            "Weight=400",
            "--location",
            "Weight=700,Italic=1",
            "--contributions",
        ])
        .unwrap();
        assert_eq!(cli.locations, vec!["Weight=400", "Weight=700,Italic=1"]);
        assert!(cli.contributions);
        assert!(!cli.quiet);
    }
}
