mod capability;
mod cli;
mod clock;
mod color;
mod config;
mod headline;
mod invoke;
mod prompt;
mod providers;
mod registry;
mod utils;

use std::path::PathBuf;

use capability::CapabilityClass;
use clap::{Parser, Subcommand, ValueEnum};
use cli::{
    generate::generate_cmd, headline::headline_cmd, list::list_cmd, probe::probe_cmd,
    resolve::resolve_cmd, ColorMode,
};
use prompt::{Style, Template};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "MODELSCOUT_LOG";

#[derive(Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "modelscout")]
#[command(
    about = "Find the best available generative model for each capability",
    version = "0.0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, global = true, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the model currently serving a capability
    Resolve(ResolveArgs),
    /// List the models deployed in the catalog with their rank
    List(ListArgs),
    /// Probe candidate models for a capability
    Probe(ProbeArgs),
    /// Generate with the resolved model
    #[command(subcommand)]
    Generate(GenerateCommand),
    /// Write a short marketing headline for a subject
    Headline(HeadlineArgs),
}

/// Output formats
#[derive(ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeadlessTable,
}

#[derive(Parser)]
pub(crate) struct ResolveArgs {
    /// Resolve only this capability
    capability: Option<CapabilityClass>,
    /// Ignore any cached selection
    #[arg(long)]
    force: bool,
    /// Only report whether MODEL is currently selected for any capability
    #[arg(long, value_name = "MODEL", conflicts_with = "capability")]
    check: Option<String>,
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Only show the rank in this capability's table
    #[arg(short, long)]
    capability: Option<CapabilityClass>,
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Parser)]
pub(crate) struct ProbeArgs {
    capability: CapabilityClass,
    /// Candidates to probe, most preferred first; defaults to the configured list
    candidates: Vec<String>,
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Subcommand)]
pub(crate) enum GenerateCommand {
    /// Generate images and write them to disk
    Image(GenerateImageArgs),
    /// Generate a text completion
    Text(GenerateTextArgs),
}

#[derive(Parser)]
pub(crate) struct GenerateImageArgs {
    /// The prompt; repeat to generate for several prompts
    #[arg(short, long, required = true)]
    prompt: Vec<String>,
    /// Images per prompt
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=4))]
    count: u32,
    /// Directory the images are written to
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
    /// Use this model instead of resolving one
    #[arg(short, long)]
    model: Option<String>,
    /// Visual style added to each prompt
    #[arg(short, long)]
    style: Option<Style>,
    /// Layout the image is composed for
    #[arg(short, long, default_value_t = Template::default())]
    template: Template,
    /// Brand colors as hex, primary first; up to three are used
    #[arg(long, value_name = "HEX", value_delimiter = ',')]
    palette: Vec<String>,
    /// Render this text inside the image instead of leaving room for it
    #[arg(long)]
    text: Option<String>,
    /// Send the prompts unchanged
    #[arg(long, conflicts_with_all = ["style", "palette", "text"])]
    raw: bool,
}

#[derive(Parser)]
pub(crate) struct GenerateTextArgs {
    /// The prompt; repeat to generate for several prompts
    #[arg(short, long, required = true)]
    prompt: Vec<String>,
    /// Use this model instead of resolving one
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Parser)]
pub(crate) struct HeadlineArgs {
    /// What the image is about
    subject: String,
}

fn init_logging(color: ColorMode) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(color, ColorMode::On))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let color = ColorMode::resolve_auto(cli.color);

    color::configure_color(color);

    init_logging(color);

    let config = config::read_config(cli.config);

    match &cli.command {
        Commands::Resolve(args) => resolve_cmd(&config, args).await,
        Commands::List(args) => list_cmd(&config, args).await,
        Commands::Probe(args) => probe_cmd(&config, args).await,
        Commands::Generate(command) => generate_cmd(&config, command).await,
        Commands::Headline(args) => headline_cmd(&config, args).await,
    }
}
