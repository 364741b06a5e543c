//! # Seed Data Generator
//!
//! Populates a local offline store with sample marketplace data for
//! development.
//!
//! ## Usage
//! ```bash
//! # 200 listings (default), all 16 regions, the eco-feature catalog
//! cargo run -p haven-db --bin seed
//!
//! # Custom amount
//! cargo run -p haven-db --bin seed -- --count 1000
//!
//! # Specify database path (or set HAVEN_DB_PATH)
//! cargo run -p haven-db --bin seed -- --db ./data/haven.db
//! ```
//!
//! ## Generated Listings
//! Each listing gets a city from its region, a sale or rent price in
//! cedis, and (for roughly two thirds of them) a green score with a subset
//! of the eco-feature catalog.

use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use haven_core::{EcoFeature, GhanaRegion, ListingType, Property, SearchFilters};
use haven_db::{DbConfig, OfflineStore};

/// Regions of Ghana with their capital and a few towns listings are placed in.
const REGIONS: &[(&str, &str, &[&str])] = &[
    ("Greater Accra", "Accra", &["Accra", "East Legon", "Tema", "Spintex", "Madina"]),
    ("Ashanti", "Kumasi", &["Kumasi", "Obuasi", "Ejisu"]),
    ("Western", "Sekondi-Takoradi", &["Takoradi", "Tarkwa"]),
    ("Central", "Cape Coast", &["Cape Coast", "Winneba", "Kasoa"]),
    ("Eastern", "Koforidua", &["Koforidua", "Aburi", "Akosombo"]),
    ("Volta", "Ho", &["Ho", "Hohoe", "Keta"]),
    ("Northern", "Tamale", &["Tamale", "Yendi"]),
    ("Upper East", "Bolgatanga", &["Bolgatanga", "Navrongo"]),
    ("Upper West", "Wa", &["Wa"]),
    ("Bono", "Sunyani", &["Sunyani", "Berekum"]),
    ("Bono East", "Techiman", &["Techiman"]),
    ("Ahafo", "Goaso", &["Goaso"]),
    ("Western North", "Sefwi Wiawso", &["Sefwi Wiawso"]),
    ("Oti", "Dambai", &["Dambai"]),
    ("Savannah", "Damongo", &["Damongo"]),
    ("North East", "Nalerigu", &["Nalerigu"]),
];

/// Eco-feature catalog: (id, name, category, weight).
const FEATURES: &[(&str, &str, &str, u32)] = &[
    ("solar", "Solar", "energy", 20),
    ("led", "LED Lighting", "energy", 5),
    ("solar-water", "Solar Water Heater", "energy", 10),
    ("rainwater", "Rainwater Harvesting", "water", 15),
    ("greywater", "Greywater Recycling", "water", 10),
    ("compressed-earth", "Compressed Earth Blocks", "materials", 15),
    ("bamboo", "Bamboo Finishes", "materials", 5),
    ("cross-ventilation", "Cross Ventilation", "design", 10),
    ("green-roof", "Green Roof", "design", 10),
];

const KINDS: &[&str] = &["Apartment", "Townhouse", "Bungalow", "Villa", "Duplex"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = env::var("HAVEN_DB_PATH").unwrap_or_else(|_| String::from("./haven_dev.db"));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Haven Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of listings to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./haven_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding offline store");

    let store = OfflineStore::new(DbConfig::new(&db_path));
    store.init().await?;

    let existing = store.get_storage_stats().await?;
    if existing.properties > 0 {
        warn!(
            properties = existing.properties,
            "Store already has listings, skipping seed (delete the file to regenerate)"
        );
        return Ok(());
    }

    let start = std::time::Instant::now();

    let regions: Vec<GhanaRegion> = REGIONS
        .iter()
        .map(|(name, capital, _)| GhanaRegion {
            id: slug(name),
            name: name.to_string(),
            capital: capital.to_string(),
            property_count: None,
        })
        .collect();

    let features: Vec<EcoFeature> = FEATURES
        .iter()
        .map(|(id, name, category, weight)| EcoFeature {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            description: None,
            score_weight: Some(*weight),
        })
        .collect();

    let properties: Vec<Property> = (0..count).map(generate_property).collect();

    let report = store.cache_ghana_regions(&regions).await;
    info!(written = report.written, failed = report.failed, "Regions cached");

    let report = store.cache_eco_features(&features).await;
    info!(written = report.written, failed = report.failed, "Eco features cached");

    let report = store.cache_properties(&properties).await;
    info!(written = report.written, failed = report.failed, "Listings cached");

    let green_filters = SearchFilters::new().green_score_min(70).eco_features(["Solar"]);
    let green = store.search_properties_offline(&green_filters).await?;
    let key = store
        .cache_search_results("solar homes", &green_filters, &green)
        .await;
    info!(key = %key, results = green.len(), "Sample search cached");

    let stats = store.get_storage_stats().await?;
    info!(
        properties = stats.properties,
        regions = stats.regions,
        features = stats.features,
        search_results = stats.search_results,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,haven=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Generates a single listing with plausible data.
fn generate_property(seed: usize) -> Property {
    let (region, _, towns) = REGIONS[seed % REGIONS.len()];
    let city = towns[(seed / REGIONS.len()) % towns.len()];
    let kind = KINDS[seed % KINDS.len()];
    let bedrooms = 1 + (seed % 5) as u32;

    let listing_type = if seed % 3 == 0 {
        ListingType::Rent
    } else {
        ListingType::Sale
    };

    // Monthly rent 1,500-9,000 GHS; sale price 250,000-2,500,000 GHS
    let price_ghs = match listing_type {
        ListingType::Rent => 1_500.0 + ((seed * 37) % 7_500) as f64,
        ListingType::Sale => 250_000.0 + ((seed * 7_919) % 2_250_000) as f64,
    };

    let (green_score, eco_features) = if seed % 3 == 2 {
        (None, None)
    } else {
        let picked: Vec<String> = FEATURES
            .iter()
            .enumerate()
            .filter(|(idx, _)| (seed >> idx) & 1 == 1)
            .map(|(_, (_, name, _, _))| name.to_string())
            .collect();
        let score: u32 = FEATURES
            .iter()
            .filter(|(_, name, _, _)| picked.iter().any(|p| p == name))
            .map(|(_, _, _, weight)| *weight)
            .sum();
        (Some(score.min(100)), Some(picked))
    };

    Property {
        id: Uuid::new_v4().to_string(),
        title: format!("{} bedroom {} in {}", bedrooms, kind, city),
        description: None,
        city: city.to_string(),
        region: region.to_string(),
        listing_type,
        price_ghs,
        bedrooms: Some(bedrooms),
        green_score,
        eco_features,
        image_url: None,
        updated_at: Some(Utc::now()),
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}
