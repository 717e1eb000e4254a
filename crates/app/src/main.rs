use std::path::{Path, PathBuf};

use arranger_core::{
    detect_parts, export_project_json, load_project_from_file, save_project_to_file,
    Arrangement, ArrangerConfig, ArrangerError, DirectorySink, PartState, ProjectSummary,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> arranger_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ArrangerConfig::load(path)?,
        None => ArrangerConfig::default(),
    };

    match cli.command {
        Commands::Parts { tune } => run_parts(&tune),
        Commands::Preprocess { tune, mix } => run_preprocess(config, &tune, &mix),
        Commands::Save {
            tune,
            name,
            mix,
            out_dir,
            file_name,
        } => run_save(config, &tune, &name, &mix, &out_dir, file_name.as_deref()),
        Commands::Inspect { project } => run_inspect(&project).await,
        Commands::Export { project, pretty } => run_export(&project, pretty).await,
    }
}

fn run_parts(tune: &Path) -> arranger_core::Result<()> {
    let source = std::fs::read_to_string(tune)?;
    let parts = detect_parts(&source);
    tracing::info!(?tune, count = parts.len(), "listing parts");

    for part in parts {
        let lines = part.content.trim().lines().count();
        println!("{}\t{lines} line(s)", part.name);
    }
    Ok(())
}

fn run_preprocess(config: ArrangerConfig, tune: &Path, mix: &MixArgs) -> arranger_core::Result<()> {
    let arrangement = load_arrangement(config, tune, mix)?;
    println!("{}", arrangement.processed());
    Ok(())
}

fn run_save(
    config: ArrangerConfig,
    tune: &Path,
    name: &str,
    mix: &MixArgs,
    out_dir: &Path,
    file_name: Option<&str>,
) -> arranger_core::Result<()> {
    let arrangement = load_arrangement(config, tune, mix)?;
    let mut project = arrangement.to_project(name);
    let mut sink = DirectorySink::new(out_dir);

    let saved = save_project_to_file(&mut project, file_name, &mut sink)?;
    println!("{}", out_dir.join(saved).display());
    Ok(())
}

async fn run_inspect(path: &Path) -> arranger_core::Result<()> {
    let project = load_project_from_file(path).await?;
    let summary = ProjectSummary::from(&project);

    println!("name:     {}", summary.name);
    println!("bpm:      {}", summary.bpm);
    println!("parts:    {} ({} active)", summary.part_count, summary.active_part_count);
    println!("created:  {}", summary.created.to_rfc3339());
    println!("modified: {}", summary.modified.to_rfc3339());
    for (name, state) in &project.part_states {
        println!("  {name}: {state}");
    }
    Ok(())
}

async fn run_export(path: &Path, pretty: bool) -> arranger_core::Result<()> {
    let project = load_project_from_file(path).await?;
    println!("{}", export_project_json(&project, pretty)?);
    Ok(())
}

fn load_arrangement(
    config: ArrangerConfig,
    tune: &Path,
    mix: &MixArgs,
) -> arranger_core::Result<Arrangement> {
    let source = std::fs::read_to_string(tune)?;
    let mut arrangement = Arrangement::new(config);
    arrangement.set_source(source);

    for (name, state) in &mix.states {
        if !arrangement.set_part_state(name, *state) {
            tracing::warn!(part = %name, "no such part in tune");
        }
    }
    if let Some(volume) = mix.volume {
        arrangement.set_volume(volume);
    }
    if let Some(bpm) = mix.bpm {
        arrangement.set_bpm(bpm);
    }

    tracing::info!(
        ?tune,
        parts = arrangement.parts().len(),
        volume = arrangement.volume(),
        bpm = arrangement.bpm(),
        "arrangement ready"
    );
    Ok(arrangement)
}

fn parse_state_assignment(value: &str) -> Result<(String, PartState), String> {
    let (name, state) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=STATE, got `{value}`"))?;
    let state = state
        .parse::<PartState>()
        .map_err(|err: ArrangerError| err.to_string())?;
    Ok((name.to_string(), state))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Arrange Strudel tunes part by part", long_about = None)]
struct Cli {
    /// Optional JSON configuration file with project and mixer defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct MixArgs {
    /// Part state as NAME=on|hush|solo. May be repeated.
    #[arg(short, long = "state", value_parser = parse_state_assignment)]
    states: Vec<(String, PartState)>,
    /// Master volume multiplier between 0 and 2.
    #[arg(short, long)]
    volume: Option<f64>,
    /// Tempo in beats per minute (20-300).
    #[arg(short, long)]
    bpm: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the parts found in a tune.
    Parts {
        /// Tune source file.
        tune: PathBuf,
    },
    /// Print the tune as the playback engine would receive it.
    Preprocess {
        /// Tune source file.
        tune: PathBuf,
        #[command(flatten)]
        mix: MixArgs,
    },
    /// Save a tune and its part states as a project file.
    Save {
        /// Tune source file.
        tune: PathBuf,
        /// Project name, also used for the file name.
        #[arg(short, long)]
        name: String,
        #[command(flatten)]
        mix: MixArgs,
        /// Directory the project file is written to.
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// File name to use instead of one derived from the project name.
        #[arg(short, long)]
        file_name: Option<String>,
    },
    /// Load a project file and print a summary.
    Inspect {
        /// Project file (`.json`).
        project: PathBuf,
    },
    /// Load a project file and print it as JSON.
    Export {
        /// Project file (`.json`).
        project: PathBuf,
        /// Pretty-print the output.
        #[arg(long)]
        pretty: bool,
    },
}
