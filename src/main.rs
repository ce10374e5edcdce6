//! Kitchen Production Planner
//!
//! Plans production runs for a campus food vendor from a local snapshot
//! of recipes and raw-material stock.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kitchen_planner::db::{self, SqliteStore};
use kitchen_planner::provider::RecordingProductionService;
use kitchen_planner::{
    PlanSummary, PlannerConfig, PlanningSession, RawMaterialProvider, Recipe, RecipeProvider,
    import,
};

#[derive(Parser)]
#[command(name = "kitchen-planner")]
#[command(about = "Recipe-to-production planner for campus food vendors")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "kitchen.db")]
    database: PathBuf,

    /// Vendor whose recipes and stock are used
    #[arg(long, default_value = "vendor-1")]
    vendor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load a sample bakery vendor
    LoadSample,

    /// Import recipe JSON files from a directory
    Import {
        /// Directory searched recursively for *.json recipes
        dir: PathBuf,

        /// Clear existing data before import
        #[arg(long)]
        clear: bool,
    },

    /// List the vendor's recipes
    ListRecipes,

    /// List the vendor's raw-material stock
    ListStock,

    /// Evaluate whether a recipe can be produced
    Plan {
        /// Recipe id
        recipe: String,

        /// Quantity to produce
        #[arg(short, long, default_value = "1")]
        quantity: f64,

        /// Print the evaluation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build and submit the production request for a recipe
    Commit {
        /// Recipe id
        recipe: String,

        /// Quantity to produce
        #[arg(short, long)]
        quantity: f64,
    },
}

async fn find_recipe(store: &SqliteStore, vendor: &str, recipe_id: &str) -> Result<Recipe> {
    let catalog = store.recipes(vendor).await?;
    catalog
        .find(recipe_id)
        .cloned()
        .ok_or_else(|| anyhow!("Recipe '{}' not found for vendor '{}'", recipe_id, vendor))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let store = SqliteStore::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let count = store.with_conn(|conn| db::load_sample_data(conn, &cli.vendor))?;
            println!("Loaded {} sample recipes for {}", count, cli.vendor);
        }

        Commands::Import { dir, clear } => {
            let conn = store.lock()?;
            if clear {
                println!("Clearing existing data...");
                db::clear_data(&conn, &cli.vendor)?;
            }

            let stats = import::import_recipes(&conn, &cli.vendor, &dir)?;
            println!("\n{}", stats);
        }

        Commands::ListRecipes => {
            let catalog = store.recipes(&cli.vendor).await?;
            if catalog.iter().next().is_none() {
                println!("No recipes in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<20} {:<28} {:>8} {:<8}", "Id", "Title", "Servings", "Output");
                println!("{}", "-".repeat(67));
                for r in catalog.iter() {
                    println!(
                        "{:<20} {:<28} {:>8} {:<8}",
                        r.id, r.title, r.servings, r.output_type
                    );
                }
            }
        }

        Commands::ListStock => {
            let stock = store.raw_materials(&cli.vendor).await?;
            if stock.is_empty() {
                println!("No stock in database. Run 'load-sample' first.");
            } else {
                println!(
                    "{:<16} {:<20} {:>10} {:>10} {:<8}",
                    "Item", "Name", "Opening", "Closing", "Unit"
                );
                println!("{}", "-".repeat(68));
                for s in stock {
                    println!(
                        "{:<16} {:<20} {:>10.3} {:>10.3} {:<8}",
                        s.item_id, s.name, s.opening_amount, s.closing_amount, s.unit
                    );
                }
            }
        }

        Commands::Plan {
            recipe,
            quantity,
            json,
        } => {
            let recipe = find_recipe(&store, &cli.vendor, &recipe).await?;
            let mut session = PlanningSession::new(&cli.vendor, PlannerConfig::default());
            session.select_recipe(recipe.clone())?;
            session.set_quantity(quantity)?;
            let evaluation = session.refresh(&store).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&evaluation.ingredients)?);
            } else {
                println!("{}", PlanSummary::new(&recipe, evaluation));
            }
        }

        Commands::Commit { recipe, quantity } => {
            let recipe = find_recipe(&store, &cli.vendor, &recipe).await?;
            let service = RecordingProductionService::new();
            let mut session = PlanningSession::new(&cli.vendor, PlannerConfig::default());
            session.select_recipe(recipe)?;
            session.set_quantity(quantity)?;
            session.refresh(&store).await?;

            let response = session.commit(&service).await?;
            for request in service.commits()? {
                println!("{}", serde_json::to_string_pretty(&request)?);
            }
            println!("{}", response.message);
        }
    }

    Ok(())
}
