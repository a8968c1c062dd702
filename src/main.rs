use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use shopnav::algorithms::BeaconReading;
use shopnav::complexity::{
    AssemblyNode, ComplexityScoreService, ComponentSpec, ComponentTree, FlatComponentTree,
};
use shopnav::config::AppConfig;
use shopnav::positioning::BeaconPositioningService;
use shopnav::registry::JsonFileBeaconRepository;
use shopnav::telemetry::init_tracing;

#[derive(Parser)]
#[command(name = "shopnav")]
#[command(about = "Shop-floor beacon positioning and cabinet complexity scoring")]
#[command(after_help = "Environment:
  SHOPNAV_BEACON_CONFIG     beacon registry file (default FloorPlan/beacon-config.json)
  SHOPNAV_SCORING_SETTINGS  scoring settings JSON (built-in defaults otherwise)
  SHOPNAV_MAX_TREE_DEPTH    component tree depth limit (default 64)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Beacon setup status
    Status,
    /// Scanner configuration
    Config,
    /// Register or replace a beacon
    Add {
        major: u16,
        minor: u16,
        name: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(allow_negative_numbers = true)]
        lon: Option<f64>,
    },
    /// Remove a beacon (no-op when absent)
    Remove { major: u16, minor: u16 },
    /// Locate from RSSI readings
    Position { readings: PathBuf },
    /// Score a component tree or assembly
    Score { tree: PathBuf },
    /// Complexity label for a score
    Classify {
        #[arg(allow_negative_numbers = true)]
        score: f64,
    },
}

/// `score` 子命令接受的输入格式
#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreInput {
    Assembly(AssemblyNode),
    Flat(FlatComponentTree),
    Nested(ComponentSpec),
}

/// `position` 子命令接受的输入：读数数组或 `{readings: [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum PositionInput {
    Bare(Vec<BeaconReading>),
    Wrapped { readings: Vec<BeaconReading> },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("serialize output: {e}"))?;
    println!("{text}");
    Ok(())
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

fn open_positioning(
    config: &AppConfig,
) -> Result<BeaconPositioningService<JsonFileBeaconRepository>, String> {
    let repository =
        JsonFileBeaconRepository::open(&config.beacon_config_path).map_err(|e| e.to_string())?;
    Ok(BeaconPositioningService::new(repository))
}

async fn open_scoring(config: &AppConfig) -> Result<ComplexityScoreService, String> {
    let scoring = config.load_scoring_config().await.map_err(|e| e.to_string())?;
    Ok(ComplexityScoreService::new(scoring).with_max_depth(config.max_tree_depth))
}

async fn run(command: Commands) -> Result<(), String> {
    let config = AppConfig::from_env().map_err(|e| e.to_string())?;

    match command {
        Commands::Status => {
            let service = open_positioning(&config)?;
            print_json(&service.setup_status().map_err(|e| e.to_string())?)
        }
        Commands::Config => {
            let service = open_positioning(&config)?;
            print_json(&service.js_config().map_err(|e| e.to_string())?)
        }
        Commands::Add {
            major,
            minor,
            name,
            x,
            y,
            lat,
            lon,
        } => {
            let service = open_positioning(&config)?;
            service
                .register_beacon(major, minor, &name, x, y, lat, lon)
                .map_err(|e| e.to_string())?;
            print_json(&service.setup_status().map_err(|e| e.to_string())?)
        }
        Commands::Remove { major, minor } => {
            let service = open_positioning(&config)?;
            service.remove_beacon(major, minor).map_err(|e| e.to_string())?;
            print_json(&service.setup_status().map_err(|e| e.to_string())?)
        }
        Commands::Position { readings } => {
            let service = open_positioning(&config)?;
            let readings = match read_json(&readings).await? {
                PositionInput::Bare(readings) => readings,
                PositionInput::Wrapped { readings } => readings,
            };
            match service.calculate_position(&readings).map_err(|e| e.to_string())? {
                Some(position) => print_json(&position),
                None => Err("No registered beacons detected".to_string()),
            }
        }
        Commands::Score { tree } => {
            let service = open_scoring(&config).await?;
            match read_json(&tree).await? {
                ScoreInput::Assembly(node) => {
                    print_json(&service.score_assembly(&node).map_err(|e| e.to_string())?)
                }
                ScoreInput::Flat(flat) => {
                    let tree =
                        ComponentTree::from_records(flat.nodes).map_err(|e| e.to_string())?;
                    print_json(&service.evaluate(&tree, flat.root).map_err(|e| e.to_string())?)
                }
                ScoreInput::Nested(spec) => {
                    let (tree, root) = spec.into_tree().map_err(|e| e.to_string())?;
                    print_json(&service.evaluate(&tree, root).map_err(|e| e.to_string())?)
                }
            }
        }
        Commands::Classify { score } => {
            let service = open_scoring(&config).await?;
            let label = service.classify(score);
            info!(score, %label, "classified");
            println!("{} ({}) x{}", label, label.as_str(), label.multiplier());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_add_parses_typed_arguments() {
        let args = ["shopnav", "add", "10", "2", "Saw", "-1.5", "3", "45", "-9"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Add {
                major,
                minor,
                x,
                lat,
                lon,
                ..
            } => {
                assert_eq!((major, minor), (10, 2));
                assert_eq!(x, -1.5);
                assert_eq!((lat, lon), (Some(45.0), Some(-9.0)));
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_add_rejects_out_of_range_and_unpaired_geo() {
        assert!(Cli::try_parse_from(["shopnav", "add", "70000", "1", "A", "0", "0"]).is_err());
        assert!(Cli::try_parse_from(["shopnav", "add", "1", "1", "A", "0", "0", "45"]).is_err());
        assert!(Cli::try_parse_from(["shopnav", "classify", "abc"]).is_err());
    }
}
