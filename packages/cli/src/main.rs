#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for community polygon reconstruction.

use std::{path::PathBuf, time::Instant};

use clap::{Parser, Subcommand};
use community_polygon_arcgis::{
    ArcGisClient,
    registry::{DEFAULT_LAYER_SET, all_layer_sets},
};
use community_polygon_boundary_models::{BoundaryDescription, ReferencePoint};
use community_polygon_geocoder::{
    DEFAULT_USER_AGENT, Geocoder, GeocodingProvider, USER_AGENT_ENV, geocode_first, geocoder_for,
    service_registry::all_services,
};
use community_polygon_geometry::Coord;
use community_polygon_overpass::OverpassClient;
use community_polygon_reconstruct::{
    Approach, BoundaryCheck, Reconstruction, ReconstructionConfig, Reconstructor,
    check::CheckOutcome, config::DEFAULT_CONFIG_TOML, profile,
};

#[derive(Parser)]
#[command(
    name = "community_polygon",
    about = "Reconstruct community boundary polygons from named streets and waterways"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct the polygon for a boundary description file
    Reconstruct {
        /// Boundary description JSON file
        input: PathBuf,
        /// Reference point latitude (overrides the file; needs --lon)
        #[arg(long, requires = "lon", conflicts_with = "address")]
        lat: Option<f64>,
        /// Reference point longitude (overrides the file; needs --lat)
        #[arg(long, requires = "lat", conflicts_with = "address")]
        lon: Option<f64>,
        /// Reference address to geocode (overrides the file)
        #[arg(long)]
        address: Option<String>,
        /// Tuning config TOML file (defaults are built in)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Which outlines to build: lines, zoning or both
        #[arg(long, default_value = "both")]
        approach: Approach,
        /// Restrict geocoding to one provider (nominatim or google)
        #[arg(long)]
        provider: Option<GeocodingProvider>,
        /// `ArcGIS` layer set id
        #[arg(long, default_value = DEFAULT_LAYER_SET)]
        layer_set: String,
        /// Skip the Overpass fallback source
        #[arg(long)]
        no_secondary: bool,
        /// Write the `GeoJSON` result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Report the zoning, planning and ward areas containing a point
    Lookup {
        /// Latitude (needs --lon)
        #[arg(long, requires = "lon", conflicts_with = "address")]
        lat: Option<f64>,
        /// Longitude (needs --lat)
        #[arg(long, requires = "lat", conflicts_with = "address")]
        lon: Option<f64>,
        /// Address to geocode
        #[arg(long, required_unless_present = "lat")]
        address: Option<String>,
        /// Restrict geocoding to one provider (nominatim or google)
        #[arg(long)]
        provider: Option<GeocodingProvider>,
        /// `ArcGIS` layer set id
        #[arg(long, default_value = DEFAULT_LAYER_SET)]
        layer_set: String,
    },
    /// Check whether a point lies inside a described community
    Check {
        /// Boundary description JSON file
        input: PathBuf,
        /// Latitude of the point (defaults to the reference point; needs --lon)
        #[arg(long, requires = "lon", conflicts_with = "address")]
        lat: Option<f64>,
        /// Longitude of the point (needs --lat)
        #[arg(long, requires = "lat", conflicts_with = "address")]
        lon: Option<f64>,
        /// Address of the point to geocode
        #[arg(long)]
        address: Option<String>,
        /// Tuning config TOML file (defaults are built in)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Restrict geocoding to one provider (nominatim or google)
        #[arg(long)]
        provider: Option<GeocodingProvider>,
        /// `ArcGIS` layer set id
        #[arg(long, default_value = DEFAULT_LAYER_SET)]
        layer_set: String,
        /// Skip the Overpass fallback source
        #[arg(long)]
        no_secondary: bool,
    },
    /// Print the built-in tuning config
    Config,
    /// List the configured geocoding services
    Services,
    /// List the registered `ArcGIS` layer sets
    LayerSets,
}

fn init_logger() {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn user_agent() -> String {
    std::env::var(USER_AGENT_ENV).unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string())
}

fn log_summary(record: &Reconstruction) {
    for edge in &record.edges {
        match (&edge.segment, &edge.error) {
            (Some(segment), _) => log::info!(
                "  {:<28} {:<20} {:<12} {}",
                edge.edge.feature_name,
                edge.canonical_name.as_deref().unwrap_or("-"),
                edge.tier.as_ref(),
                segment
            ),
            (None, Some(error)) => log::info!("  {:<28} {error}", edge.edge.feature_name),
            (None, None) => log::info!("  {:<28} skipped", edge.edge.feature_name),
        }
    }
    if let Some(boundary) = &record.boundary {
        log::info!(
            "Boundary: {:.3} km2, contains reference: {}, repaired: {}",
            boundary.area_m2 / 1e6,
            boundary.contains_reference,
            boundary.repaired
        );
    }
    if let Some(zoning) = &record.zoning {
        log::info!(
            "Zoning x{}: {} parcels, {:.3} km2",
            zoning.exception_number,
            zoning.parcel_count,
            zoning.area_m2 / 1e6
        );
    }
    if let Some(comparison) = &record.comparison {
        log::info!("Agreement (IoU): {:.3}", comparison.iou);
    }
}

/// The point given on the command line, geocoding `address` if needed.
async fn point_from_args(
    lat: Option<f64>,
    lon: Option<f64>,
    address: Option<&str>,
    geocoder: &dyn Geocoder,
) -> Result<Option<Coord<f64>>, Box<dyn std::error::Error>> {
    if let (Some(lat), Some(lon)) = (lat, lon) {
        return Ok(Some(Coord { x: lon, y: lat }));
    }
    let Some(address) = address else {
        return Ok(None);
    };
    let place = geocode_first(geocoder, address)
        .await?
        .ok_or_else(|| format!("Address not found: {address}"))?;
    log::info!(
        "{address:?} -> ({:.5}, {:.5}) via {}",
        place.latitude,
        place.longitude,
        place.provider
    );
    Ok(Some(Coord {
        x: place.longitude,
        y: place.latitude,
    }))
}

fn log_check(result: &BoundaryCheck) {
    if let Some(applies) = result.zoning_applies {
        log::info!("On a zoning exception parcel: {applies}");
    }
    let failed: Vec<&str> = result
        .checks
        .iter()
        .filter(|c| c.outcome == CheckOutcome::Fail)
        .map(|c| c.edge.as_str())
        .collect();
    if failed.is_empty() {
        log::info!("Verdict: {}", result.verdict);
    } else {
        log::info!("Verdict: {} (across {})", result.verdict, failed.join(", "));
    }
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config => {
            print!("{DEFAULT_CONFIG_TOML}");
        }
        Commands::Services => {
            println!(
                "{:<12} {:<10} {:<8} {:<9} NAME",
                "ID", "PROVIDER", "ENABLED", "PRIORITY"
            );
            println!("{}", "-".repeat(70));
            for service in all_services() {
                println!(
                    "{:<12} {:<10} {:<8} {:<9} {}",
                    service.id,
                    service.provider.provider(),
                    service.enabled,
                    service.priority,
                    service.name
                );
            }
        }
        Commands::LayerSets => {
            println!("{:<20} NAME", "ID");
            println!("{}", "-".repeat(50));
            for set in all_layer_sets() {
                println!("{:<20} {}", set.id, set.name);
            }
        }
        Commands::Lookup {
            lat,
            lon,
            address,
            provider,
            layer_set,
        } => {
            let geocoder = geocoder_for(provider)?;
            let point = point_from_args(lat, lon, address.as_deref(), &geocoder)
                .await?
                .ok_or("Give --lat/--lon or --address")?;
            let primary = ArcGisClient::for_layer_set(&layer_set, &user_agent())?;
            let profile = profile(&primary, point).await;
            println!("{}", profile.to_json_string()?);
        }
        Commands::Check {
            input,
            lat,
            lon,
            address,
            config,
            provider,
            layer_set,
            no_secondary,
        } => {
            let text = std::fs::read_to_string(&input)?;
            let description: BoundaryDescription = serde_json::from_str(&text)?;
            let config = match config {
                Some(path) => ReconstructionConfig::from_file(&path)?,
                None => ReconstructionConfig::default(),
            };

            let user_agent = user_agent();
            let geocoder = geocoder_for(provider)?;
            let point = point_from_args(lat, lon, address.as_deref(), &geocoder).await?;
            let primary = ArcGisClient::for_layer_set(&layer_set, &user_agent)?;
            let mut reconstructor = Reconstructor::new(Box::new(primary), Box::new(geocoder), config);
            if !no_secondary {
                reconstructor =
                    reconstructor.with_secondary(Box::new(OverpassClient::new(&user_agent)?));
            }

            let result = reconstructor.check(&description, point).await?;
            log_check(&result);
            println!("{}", result.to_json_string()?);
        }
        Commands::Reconstruct {
            input,
            lat,
            lon,
            address,
            config,
            approach,
            provider,
            layer_set,
            no_secondary,
            output,
        } => {
            let start = Instant::now();
            let text = std::fs::read_to_string(&input)?;
            let mut description: BoundaryDescription = serde_json::from_str(&text)?;

            if let (Some(lat), Some(lon)) = (lat, lon) {
                description.reference_point = Some(ReferencePoint::Coordinates { lat, lon });
            } else if let Some(address) = address {
                description.reference_point = Some(ReferencePoint::Address { address });
            }

            let config = match config {
                Some(path) => ReconstructionConfig::from_file(&path)?,
                None => ReconstructionConfig::default(),
            };

            let user_agent = user_agent();
            let primary = ArcGisClient::for_layer_set(&layer_set, &user_agent)?;
            let mut reconstructor =
                Reconstructor::new(Box::new(primary), Box::new(geocoder_for(provider)?), config)
                    .with_approach(approach);
            if !no_secondary {
                reconstructor =
                    reconstructor.with_secondary(Box::new(OverpassClient::new(&user_agent)?));
            }

            let record = reconstructor.reconstruct(&description).await?;
            log_summary(&record);

            let geojson = record.to_geojson_string()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, geojson)?;
                    log::info!("Wrote {}", path.display());
                }
                None => println!("{geojson}"),
            }

            log::info!(
                "Reconstructed {} in {:.1}s",
                record.community_name,
                start.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}
