use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "server")]
use goalgraph::serve::{ServeArgs, run_serve};
use goalgraph::{EditorConfig, EditorSession, RoutingAlgorithm, export_graph, parse_graph};

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "goalgraph check",
    about = "Validate a goal-model graph document and optionally write it back in canonical form."
)]
struct CheckArgs {
    /// Path to the graph document. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Write the normalized document here. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Parser)]
#[command(name = "goalgraph path", about = "Print the SVG path of one edge.")]
struct PathArgs {
    /// Path to the graph document. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Identifier of the edge to route.
    #[arg(long = "edge")]
    edge: String,

    /// Route with this algorithm instead of the one stored on the edge.
    #[arg(short = 'a', long = "algorithm", value_enum)]
    algorithm: Option<AlgorithmArg>,

    /// Print path, label anchor and handles as JSON.
    #[arg(long = "json", action = ArgAction::SetTrue)]
    json: bool,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum AlgorithmArg {
    Linear,
    #[value(name = "bezier-catmull-rom")]
    CatmullRom,
    Straight,
}

impl From<AlgorithmArg> for RoutingAlgorithm {
    fn from(value: AlgorithmArg) -> Self {
        match value {
            AlgorithmArg::Linear => RoutingAlgorithm::Linear,
            AlgorithmArg::CatmullRom => RoutingAlgorithm::CatmullRomBezier,
            AlgorithmArg::Straight => RoutingAlgorithm::Straight,
        }
    }
}

/// Installs the stderr log subscriber. `GOALGRAPH_LOG` takes precedence over
/// the level implied by `quiet`.
fn init_tracing(quiet: bool) {
    let filter = EnvFilter::try_from_env("GOALGRAPH_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if quiet { "warn" } else { "info" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn subcommand_args(args: &[String]) -> impl Iterator<Item = String> + '_ {
    std::iter::once(args[0].clone()).chain(args.iter().skip(2).cloned())
}

#[cfg(feature = "server")]
pub async fn dispatch() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let serve_args = ServeArgs::parse_from(subcommand_args(&args));
            init_tracing(false);
            run_serve(serve_args).await
        }
        Some("path") => run_path(PathArgs::parse_from(subcommand_args(&args))),
        Some("check") => run_check(CheckArgs::parse_from(subcommand_args(&args))),
        _ => run_check(CheckArgs::parse_from(args)),
    }
}

#[cfg(not(feature = "server"))]
pub fn dispatch_sync() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => Err(anyhow!(
            "'serve' command requires the 'server' feature to be enabled"
        )),
        Some("path") => run_path(PathArgs::parse_from(subcommand_args(&args))),
        Some("check") => run_check(CheckArgs::parse_from(subcommand_args(&args))),
        _ => run_check(CheckArgs::parse_from(args)),
    }
}

fn run_check(cli: CheckArgs) -> Result<()> {
    init_tracing(cli.quiet);
    let input = parse_input(cli.input.as_deref())?;
    let json = load_document(&input)?;
    let graph = parse_graph(&json).with_context(|| format!("{} is not a valid graph", describe(&input)))?;

    let writes_stdout = matches!(cli.output.as_deref(), Some("-"));
    if !cli.quiet && !writes_stdout {
        println!(
            "{}: {} nodes, {} edges",
            describe(&input),
            graph.nodes.len(),
            graph.edges.len()
        );
    }

    if let Some(output) = cli.output.as_deref() {
        let dest = parse_output(output)?;
        let mut normalized = export_graph(&graph).context("failed to serialize graph")?;
        normalized.push('\n');
        write_output(dest, normalized.as_bytes(), cli.quiet)?;
    }

    Ok(())
}

fn run_path(cli: PathArgs) -> Result<()> {
    init_tracing(cli.quiet);
    let input = parse_input(cli.input.as_deref())?;
    let json = load_document(&input)?;

    let mut session = EditorSession::new(EditorConfig::from_env());
    session
        .import_json(&json)
        .with_context(|| format!("{} is not a valid graph", describe(&input)))?;

    if let Some(algorithm) = cli.algorithm {
        session
            .set_edge_routing_algorithm(&cli.edge, algorithm.into())
            .with_context(|| format!("cannot reroute edge '{}'", cli.edge))?;
    }

    let geometry = session
        .edge_geometry(&cli.edge)
        .with_context(|| format!("cannot route edge '{}'", cli.edge))?;

    if cli.json {
        let rendered =
            serde_json::to_string_pretty(&geometry).context("failed to serialize geometry")?;
        println!("{rendered}");
    } else {
        println!("{}", geometry.path);
    }
    Ok(())
}

fn describe(input: &InputSource) -> String {
    match input {
        InputSource::Stdin => "stdin".to_string(),
        InputSource::File(path) => format!("'{}'", path.display()),
    }
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        Some("-") | None => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("input file '{path_str}' does not exist"));
            }
            Ok(InputSource::File(path))
        }
    }
}

fn parse_output(output: &str) -> Result<OutputDestination> {
    if output == "-" {
        return Ok(OutputDestination::Stdout);
    }
    let path = PathBuf::from(output);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(anyhow!(
                "output directory '{}' does not exist",
                parent.display()
            ));
        }
    }
    Ok(OutputDestination::File(path))
}

fn load_document(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            if buffer.trim().is_empty() {
                Err(anyhow!("no graph document supplied on stdin"))
            } else {
                Ok(buffer)
            }
        }
        InputSource::File(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if contents.trim().is_empty() {
                Err(anyhow!("input file '{}' was empty", path.display()))
            } else {
                Ok(contents)
            }
        }
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Normalized graph -> {}", path.display());
            }
        }
    }
    Ok(())
}
