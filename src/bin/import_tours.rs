use anyhow::Result;
use clap::{Parser, Subcommand};
use visitslovenia::import::pipeline::{self, ImportParams};
use visitslovenia::import::ImportEvent;

#[derive(Parser, Debug)]
#[command(name = "import_tours", version, about = "VisitSlovenia tour import CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// List provider countries
    Countries,
    /// List provider cities for the given country ids
    Cities {
        /// Comma-separated country destination ids
        #[arg(long, value_delimiter = ',')]
        countries: Vec<String>,
    },
    /// Check that each selected city has provider inventory
    Verify {
        /// Comma-separated city destination ids
        #[arg(long, value_delimiter = ',')]
        locations: Vec<String>,
    },
    /// Preview a page of tours per selected city
    Preview {
        #[arg(long, value_delimiter = ',')]
        locations: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    /// Run an import, printing one progress event per line
    Import {
        #[arg(long, value_delimiter = ',')]
        locations: Vec<String>,
        /// Tours to import per city
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Tour type for this run (the wizard's category stage)
        #[arg(long)]
        tour_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    visitslovenia::util::env::init_env();
    visitslovenia::tracing::init_tracing("info,sqlx=warn")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Countries => {
            let ctx = visitslovenia::build_context().await?;
            let countries = ctx.inventory.get_countries().await?;
            for country in &countries {
                println!("{}\t{}", country.destination_id, country.name);
            }
            println!("{} countries", countries.len());
        }
        Commands::Cities { countries } => {
            let ctx = visitslovenia::build_context().await?;
            let cities = ctx.inventory.get_cities_by_countries(&countries).await?;
            for city in &cities {
                println!(
                    "{}\t{}\t{}",
                    city.destination.destination_id,
                    city.destination.name,
                    city.country_name.as_deref().unwrap_or("-")
                );
            }
            println!("{} cities", cities.len());
        }
        Commands::Verify { locations } => {
            let ctx = visitslovenia::build_context().await?;
            let results = pipeline::verify_locations(&ctx.inventory, &locations).await;
            for entry in &results {
                match &entry.matched {
                    Some(tour) => println!(
                        "{}\tmatch\t{}",
                        entry.city_id,
                        tour.product_code.as_deref().unwrap_or("-")
                    ),
                    None => println!("{}\tno match", entry.city_id),
                }
            }
        }
        Commands::Preview {
            locations,
            page,
            page_size,
        } => {
            let ctx = visitslovenia::build_context().await?;
            let report =
                pipeline::preview_tours(&ctx.inventory, &locations, page, page_size).await?;
            for location in &report.locations {
                println!(
                    "{} ({}): {} tours, {} total, {} pages",
                    location.city_name.as_deref().unwrap_or(&location.city_id),
                    location.country_name.as_deref().unwrap_or("-"),
                    location.tours.len(),
                    location.total_count,
                    location.total_pages
                );
                for tour in &location.tours {
                    println!(
                        "    {}\t{}\t{}",
                        tour.product_code.as_deref().unwrap_or("-"),
                        tour.duration.as_deref().unwrap_or("-"),
                        tour.title
                    );
                }
            }
            println!(
                "{} tours across {} location(s), {} aggregate pages",
                report.total_tours,
                report.locations.len(),
                report.total_pages
            );
        }
        Commands::Import {
            locations,
            limit,
            tour_type,
        } => {
            let ctx = visitslovenia::build_context().await?;
            let params = ImportParams {
                city_ids: locations,
                limit,
                tour_type,
                batch_id: pipeline::new_batch_id(),
            };
            println!("batch {}", params.batch_id);
            let mut rx = pipeline::spawn_import(ctx, params);
            while let Some(event) = rx.recv().await {
                match &event {
                    ImportEvent::Toast { .. } => print!("{}", event.to_ndjson_line()),
                    ImportEvent::Summary { summary } => {
                        println!(
                            "imported={} skipped={} failed={} total={}",
                            summary.imported, summary.skipped, summary.failed, summary.total
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
