use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use lci_importer::config::Config;
use lci_importer::extract::JsonExtractor;
use lci_importer::logging::init_logging;
use lci_importer::pipeline::PipelineConfig;
use lci_importer::storage::{DatabaseRegistry, JsonDirectoryRegistry};
use lci_importer::{ImporterVariant, LciImporter};

#[derive(Parser)]
#[command(name = "lci-importer")]
#[command(about = "Normalize and link life cycle inventory datasets")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file; falls back to $LCI_IMPORTER_CONFIG, then ./config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, normalize, link and write a database
    Import {
        /// JSON export of datasets
        #[arg(long)]
        input: PathBuf,
        /// Name of the database to create
        #[arg(long)]
        db_name: String,
        /// Split allocated multi-output datasets first
        #[arg(long)]
        multi_output: bool,
        /// Directory holding registered databases as JSON files
        #[arg(long, default_value = "databases")]
        registry: PathBuf,
        /// Write even if some exchanges could not be linked
        #[arg(long)]
        allow_unlinked: bool,
    },
    /// Check a configured pipeline without running it
    ValidatePipeline,
    /// Print a built-in strategy sequence as TOML
    ShowPipeline {
        #[arg(long)]
        multi_output: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::resolve(cli.config.as_deref())?;
    let _guard = init_logging(&config.logging);

    match cli.command {
        Commands::Import {
            input,
            db_name,
            multi_output,
            registry,
            allow_unlinked,
        } => {
            let variant = if multi_output {
                ImporterVariant::MultiOutputEcospold1
            } else {
                ImporterVariant::SingleOutputEcospold1
            };
            let registry: Arc<dyn DatabaseRegistry> =
                Arc::new(JsonDirectoryRegistry::new(registry));

            let mut importer =
                LciImporter::new(&JsonExtractor, &input, &db_name, variant, &config, registry)?;
            let result = importer.apply_strategies()?;
            if let Some(duration) = result.duration() {
                info!(
                    "Pipeline {} finished in {} ms",
                    result.pipeline_name,
                    duration.num_milliseconds()
                );
            }

            let stats = importer.statistics();
            println!("\n📊 Import results for {}:", db_name);
            println!("   Datasets: {}", stats.datasets);
            println!("   Exchanges: {}", stats.exchanges);
            println!("   Unlinked exchanges: {}", stats.unlinked);

            if stats.unlinked > 0 {
                warn!("{} exchanges remain unlinked", stats.unlinked);
                println!("\n⚠️  Unlinked exchanges:");
                for exc in importer.unlinked() {
                    println!("   - {} ({:?})", exc.name, exc.exchange_type);
                }
            }

            let written = importer.write_database(allow_unlinked)?;
            println!("\n✅ Wrote {} datasets to {}", written, db_name);
        }
        Commands::ValidatePipeline => match &config.pipeline {
            Some(pipeline) => {
                pipeline.validate()?;
                println!(
                    "✅ Pipeline '{}' is valid ({} steps)",
                    pipeline.name,
                    pipeline.steps.len()
                );
            }
            None => println!("No [pipeline] section configured; built-in sequences are used"),
        },
        Commands::ShowPipeline { multi_output } => {
            let (biosphere, fields) = (&config.biosphere_database, &config.link_fields);
            let pipeline = if multi_output {
                PipelineConfig::multi_output_ecospold1(biosphere, fields)
            } else {
                PipelineConfig::single_output_ecospold1(biosphere, fields)
            };
            println!("{}", toml::to_string_pretty(&pipeline)?);
        }
    }

    Ok(())
}
