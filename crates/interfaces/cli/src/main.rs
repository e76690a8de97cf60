mod classify_cmds;
mod garden_cmds;
mod guide_cmds;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use verdant_config::AppConfig;

const DEFAULT_CONFIG_PATH: &str = "config/verdant.toml";

#[derive(Debug, Parser)]
#[command(
    name = "verdant",
    version,
    about = "Plant care scheduling, reminders and achievements"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add a plant to the garden.
    Add {
        name: String,
        #[arg(long)]
        species: String,
        /// Watering interval in days (defaults to the configured interval).
        #[arg(long)]
        interval: Option<u32>,
        /// Path or URI of a photo of the plant.
        #[arg(long)]
        image: Option<String>,
    },
    /// List every plant with its watering status.
    List,
    /// Show one plant and its journal.
    Show { plant: String },
    /// Mark a plant as watered now.
    Water { plant: String },
    /// Complete a care task of the given kind now.
    Complete {
        plant: String,
        #[arg(long, default_value = "watered")]
        kind: String,
    },
    /// Add a journal entry.
    Log {
        plant: String,
        #[arg(long, default_value = "note")]
        kind: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Change a plant's watering interval.
    Interval { plant: String, days: u32 },
    /// Delete a plant and its journal.
    Delete { plant: String },
    /// Upcoming, overdue and completed-today care tasks.
    Schedule,
    Achievements,
    /// Garden statistics and achievement progress.
    Profile,
    /// Pending watering reminders.
    Reminders,
    /// Identify a plant from a JPEG photo.
    Identify {
        image: PathBuf,
        /// Add the identified plant to the garden under this name.
        #[arg(long)]
        add_as: Option<String>,
    },
    /// Check a plant photo for disease or pests.
    Diagnose {
        image: PathBuf,
        /// Record the result as a health check on this plant.
        #[arg(long)]
        plant: Option<String>,
    },
    /// Delete every plant and cancel every reminder.
    Wipe {
        #[arg(long)]
        yes: bool,
    },
    /// Care reference guides.
    Guide {
        #[command(subcommand)]
        command: GuideCommands,
    },
    /// Rewrite the garden journal without superseded records.
    Compact,
}

#[derive(Debug, Subcommand)]
enum GuideCommands {
    /// Ideal humidity for a plant type (succulent, standard, tropical).
    Humidity { plant_type: Option<String> },
    /// Classify a camera brightness reading.
    Light {
        #[arg(allow_hyphen_values = true)]
        brightness: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let command = cli.command.unwrap_or(Commands::Schedule);
    if let Commands::Guide { command } = &command {
        match command {
            GuideCommands::Humidity { plant_type } => {
                guide_cmds::run_humidity_guide(plant_type.as_deref())?
            }
            GuideCommands::Light { brightness } => guide_cmds::run_light_reading(*brightness),
        }
        return Ok(());
    }

    let garden = garden_cmds::open_garden(&config)?;
    garden.begin_session()?;

    match command {
        Commands::Add {
            name,
            species,
            interval,
            image,
        } => garden_cmds::run_add(&garden, name, species, interval, image)?,
        Commands::List => garden_cmds::run_list(&garden),
        Commands::Show { plant } => garden_cmds::run_show(&garden, &plant)?,
        Commands::Water { plant } => garden_cmds::run_complete(&garden, &plant, "watered")?,
        Commands::Complete { plant, kind } => garden_cmds::run_complete(&garden, &plant, &kind)?,
        Commands::Log {
            plant,
            kind,
            note,
            image,
        } => garden_cmds::run_log(&garden, &plant, &kind, note, image)?,
        Commands::Interval { plant, days } => garden_cmds::run_interval(&garden, &plant, days)?,
        Commands::Delete { plant } => garden_cmds::run_delete(&garden, &plant)?,
        Commands::Schedule => garden_cmds::run_schedule(&garden),
        Commands::Achievements => garden_cmds::run_achievements(&garden),
        Commands::Profile => garden_cmds::run_profile(&garden)?,
        Commands::Reminders => garden_cmds::run_reminders(&garden)?,
        Commands::Identify { image, add_as } => {
            classify_cmds::run_identify(&config, &garden, &image, add_as).await?
        }
        Commands::Diagnose { image, plant } => {
            classify_cmds::run_diagnose(&config, &garden, &image, plant.as_deref()).await?
        }
        Commands::Wipe { yes } => garden_cmds::run_wipe(&garden, yes)?,
        Commands::Compact => garden_cmds::run_compact(&garden)?,
        Commands::Guide { .. } => {}
    }

    Ok(())
}
