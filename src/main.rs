use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowsync::assistant::extract_diagram_block;
use flowsync::config::{ConfigError, EngineConfig};
use flowsync::element::{ConversionError, decode_scene, encode_scene};
use flowsync::export::{self, ExportError};
use flowsync::flowchart::FlowchartParser;
use flowsync::graph_to_text::scene_to_text;
use flowsync::text_to_graph::{ConversionOutcome, ParseError, TextToGraph};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: io::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Scene(#[from] ConversionError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("conversion produced no elements")]
    NotConverted,
    #[error("no diagram block found in input")]
    NoDiagramBlock,
    #[error("nothing to export; pass --svg and/or --png")]
    NoExportTarget,
}

#[derive(Parser, Debug)]
#[command(name = "flowsync", about = "Convert flowcharts between text, canvas elements, and images")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct InputArgs {
    #[arg(default_value = "-", help = "Input file path, or - for stdin")]
    input: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out diagram text and print the element JSON.
    ToElements(InputArgs),
    /// Read element JSON and print canonical diagram text.
    ToText(InputArgs),
    /// Render diagram text to SVG and/or PNG files.
    Export {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        svg: Option<PathBuf>,
        #[arg(long)]
        png: Option<PathBuf>,
    },
    /// Print the diagram block found in an assistant reply.
    Extract(InputArgs),
}

fn read_input(path: &str) -> Result<String, CliError> {
    let mut buf = String::new();
    let result = if path == "-" {
        io::stdin().read_to_string(&mut buf).map(|_| ())
    } else {
        std::fs::read_to_string(path).map(|content| buf = content)
    };
    result.map_err(|source| CliError::Read { path: path.to_owned(), source })?;
    Ok(buf)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes).map_err(|source| CliError::Write { path: path.display().to_string(), source })?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
    Ok(())
}

async fn layout(text: &str, config: &EngineConfig) -> Result<Vec<flowsync::VisualElement>, CliError> {
    let converter = TextToGraph::new(Arc::new(FlowchartParser), config);
    match converter.convert(text, true).await? {
        ConversionOutcome::Converted(elements) => Ok(elements),
        ConversionOutcome::Unchanged | ConversionOutcome::Superseded => Err(CliError::NotConverted),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowsync=info")))
        .with_writer(io::stderr)
        .init();
    if let Err(err) = dotenv {
        if !err.not_found() {
            warn!(error = %err, "failed to load .env");
        }
    }

    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    match cli.command {
        Command::ToElements(args) => {
            let text = read_input(&args.input)?;
            let elements = layout(&text, &config).await?;
            println!("{}", encode_scene(&elements)?);
        }
        Command::ToText(args) => {
            let json = read_input(&args.input)?;
            let elements = decode_scene(&json)?;
            print!("{}", scene_to_text(&elements));
        }
        Command::Export { input, svg, png } => {
            if svg.is_none() && png.is_none() {
                return Err(CliError::NoExportTarget);
            }
            let text = read_input(&input.input)?;
            let elements = layout(&text, &config).await?;
            if let Some(path) = &svg {
                write_output(path, export::svg(&elements)?.as_bytes())?;
            }
            if let Some(path) = &png {
                write_output(path, &export::png(&elements)?)?;
            }
        }
        Command::Extract(args) => {
            let reply = read_input(&args.input)?;
            let block = extract_diagram_block(&reply).ok_or(CliError::NoDiagramBlock)?;
            println!("{block}");
        }
    }

    Ok(())
}
