use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

use gymintel_scraper::analytics::{AnalyticsEngine, UniformPopulationModel};
use gymintel_scraper::config::Config;
use gymintel_scraper::coordinator::FetchCoordinator;
use gymintel_scraper::geocoding::{LocationResolver, NominatimGeocoder};
use gymintel_scraper::progress::ProgressPublisher;
use gymintel_scraper::providers::{
    GooglePlacesProvider, MultiSourceFetcher, OpenStreetMapProvider, YelpProvider,
};
use gymintel_scraper::reconcile::Reconciler;
use gymintel_scraper::search::{SearchFilters, SearchService};
use gymintel_scraper::storage::{InMemoryStorage, Storage};
use gymintel_scraper::types::GymDataSource;
use gymintel_scraper::{logging, server};

#[derive(Parser)]
#[command(name = "gymintel")]
#[command(about = "Gym discovery engine with multi-source reconciliation")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the GraphQL API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8000")]
        port: u16,
    },
    /// Run a one-off gym search from the command line
    Search {
        /// Location to search: city/state, zipcode, or free text
        location: String,
        /// Search radius in miles
        #[arg(long)]
        radius: Option<f64>,
        /// Bypass persisted data and fetch fresh results
        #[arg(long)]
        force_refresh: bool,
    },
    /// Analyze gym market density around a location
    Analytics {
        /// Location to analyze
        location: String,
        /// Analysis radius in miles
        #[arg(long)]
        radius: Option<f64>,
    },
}

/// Assemble the provider set from the environment. Keyless providers are
/// always available; keyed ones are skipped with a warning when their key
/// is absent.
fn build_providers() -> Vec<Arc<dyn GymDataSource>> {
    let mut providers: Vec<Arc<dyn GymDataSource>> = Vec::new();

    match YelpProvider::from_env() {
        Ok(provider) => providers.push(Arc::new(provider)),
        Err(_) => warn!("YELP_API_KEY not set; Yelp provider disabled"),
    }
    match GooglePlacesProvider::from_env() {
        Ok(provider) => providers.push(Arc::new(provider)),
        Err(_) => warn!("GOOGLE_PLACES_API_KEY not set; Google Places provider disabled"),
    }
    providers.push(Arc::new(OpenStreetMapProvider::new()));

    providers
}

fn build_service(config: &Config) -> (Arc<SearchService>, Arc<AnalyticsEngine>) {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new(
        config.scoring.clone(),
        config.clustering.clone(),
    ));

    let providers = build_providers();
    info!("Configured {} data providers", providers.len());

    let service = Arc::new(SearchService::new(
        LocationResolver::new(Arc::new(NominatimGeocoder::new())),
        MultiSourceFetcher::new(providers, &config.search),
        Reconciler::new(config.scoring.clone(), config.clustering.clone()),
        Arc::clone(&storage),
        FetchCoordinator::new(),
        Arc::new(ProgressPublisher::new(
            config.search.progress_buffer_size,
            config.search.progress_retention_seconds,
        )),
        config.search.clone(),
    ));
    let analytics = Arc::new(AnalyticsEngine::new(storage));

    (service, analytics)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load_or_default();
    let _log_guard = logging::init(&config.logging)?;

    match cli.command {
        Commands::Serve { port } => {
            let (service, analytics) = build_service(&config);
            server::start_server(service, analytics, port).await?;
        }
        Commands::Search {
            location,
            radius,
            force_refresh,
        } => {
            let (service, _) = build_service(&config);

            println!("🔍 Searching for gyms near {}...", location);
            let result = service
                .search_gyms(&location, radius, &SearchFilters::default(), force_refresh)
                .await?;

            println!("\n📊 Search results for {}:", result.location_key);
            println!("   Total gyms: {}", result.total_results);
            println!("   Merged from multiple sources: {}", result.merged_count);
            println!("   Average confidence: {:.2}", result.avg_confidence);
            for count in &result.per_provider_counts {
                if count.errored {
                    println!(
                        "   ⚠️  {}: failed ({})",
                        count.provider_name,
                        count.error_message.as_deref().unwrap_or("unknown error")
                    );
                } else {
                    println!("   {}: {} listings", count.provider_name, count.count);
                }
            }
            println!();
            for gym in &result.gyms {
                println!(
                    "   {} — {} (confidence {:.2}, {} sources)",
                    gym.name,
                    gym.address,
                    gym.confidence,
                    gym.sources.len()
                );
            }
        }
        Commands::Analytics { location, radius } => {
            let (service, analytics) = build_service(&config);

            // Make sure data exists before analyzing
            let result = service
                .search_gyms(&location, radius, &SearchFilters::default(), false)
                .await?;

            let radius = radius.unwrap_or(config.search.default_radius_miles);
            let report = analytics
                .analyze(&location, &result.coordinates, radius)
                .await?;

            println!("\n📈 Market analytics for {}:", location);
            println!("   Total gyms: {}", report.total_gyms);
            println!("   Density: {:.3} gyms/sq mi", report.density_score);
            println!("   Saturation: {}", report.market_saturation);
            println!("   Confidence distribution: {}", report.confidence_distribution);
            println!("   Source breakdown: {}", report.source_breakdown);

            let population = UniformPopulationModel {
                center: result.coordinates,
                peak_density: 4000.0,
            };
            let gaps = analytics
                .market_gap_analysis(&location, &result.coordinates, radius, &population)
                .await?;

            if !gaps.is_empty() {
                println!("\n🗺️  Top market gaps:");
                for gap in gaps.iter().take(5) {
                    println!("   {:.2} — {}", gap.gap_score, gap.reasoning);
                }
            }
        }
    }

    Ok(())
}
