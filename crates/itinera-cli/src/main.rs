// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Itinera contributors

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use itinera_core::config::Settings;
use itinera_core::country_info::{CountryInfo, CountryInfoSource};
use itinera_core::itinerary::ItinerarySource;
use itinera_core::map::plot_locations;
use itinera_core::reference::{ReferenceData, DEFAULT_COUNTRY};
use itinera_core::{Planner, TripRequest};
use log::info;
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding cached itineraries
    #[arg(long, env = "ITINERA_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Country table (columns: country,code)
    #[arg(long, requires = "cities_table")]
    countries: Option<PathBuf>,

    /// City table (columns: city,country)
    #[arg(long, requires = "countries")]
    cities_table: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known countries
    Countries,
    /// List the cities known for a country
    Cities { country: String },
    /// Generate (or read from cache) an itinerary
    Plan {
        #[arg(long, default_value = DEFAULT_COUNTRY)]
        country: String,
        /// First city of the trip
        #[arg(long)]
        first: String,
        /// Last city of the trip
        #[arg(long)]
        last: String,
        /// Number of cities to visit (at least 3)
        #[arg(long, default_value_t = 5)]
        cities: u32,
        /// Write the route map as an HTML page
        #[arg(long)]
        map: Option<PathBuf>,
    },
    /// Show official name, capital, currencies and flag of a country
    Info { country: String },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("itinera")
        .build();
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::load_default()?;
    if let Some(dir) = cli.cache_dir {
        settings.cache_dir = Some(dir);
    }
    if let (Some(countries), Some(cities)) = (cli.countries, cli.cities_table) {
        settings.countries_csv = Some(countries);
        settings.cities_csv = Some(cities);
    }

    let reference = settings
        .reference_data()
        .context("Failed to load reference tables")?;

    match cli.command {
        Commands::Countries => {
            for country in reference.countries() {
                println!("{} ({})", country.name, country.code);
            }
        }
        Commands::Cities { country } => {
            require_country(&reference, &country)?;
            for city in reference.cities_in(&country) {
                println!("{}", city);
            }
        }
        Commands::Plan {
            country,
            first,
            last,
            cities,
            map,
        } => {
            require_country(&reference, &country)?;
            let request = TripRequest::new(&country, &first, &last, cities)?;
            let cache = settings.cache();
            let generator = settings.completion_client()?;
            let geocoder = settings.geocoder()?;
            let planner = Planner::new(
                &reference,
                &generator,
                &geocoder,
                &cache,
                settings.model.clone(),
            );

            let itinerary = planner.plan(&request)?;
            info!(
                "Plan finished — stops={} source={:?}",
                itinerary.len(),
                itinerary.source
            );

            println!("{} cities to visit in {}", request.num_cities, country);
            match itinerary.center() {
                None => {
                    println!("Sorry, it was not possible to generate the itinerary...");
                    println!("You can always try another!");
                }
                Some(center) => {
                    for (i, stop) in itinerary.locations.iter().enumerate() {
                        println!(
                            "{:>3}. {} ({:.4}, {:.4})",
                            i + 1,
                            stop.name,
                            stop.coordinates.lat,
                            stop.coordinates.lon
                        );
                    }
                    if itinerary.source == ItinerarySource::Cache {
                        println!("(from cache: {})", cache.path_for(&itinerary.key).display());
                    }
                    if let Some(path) = map {
                        plot_locations(&itinerary.locations, center)
                            .write_html(&path, &country)
                            .with_context(|| format!("Failed to write map to {:?}", path))?;
                        println!("Map written to {}", path.display());
                    }
                }
            }
        }
        Commands::Info { country } => match settings.country_info().lookup(&country) {
            Some(info) => print_country_info(&info),
            None => println!("No information available for {}", country),
        },
    }

    Ok(())
}

fn require_country(reference: &ReferenceData, country: &str) -> Result<()> {
    if reference.contains_country(country) {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Unknown country '{}'. Run `itinera countries` for the list.",
            country
        ))
    }
}

fn print_country_info(info: &CountryInfo) {
    println!("{}", info.official_name);
    if let Some(capital) = &info.capital {
        println!("- Capital: {}", capital);
    }
    if let Some(currencies) = &info.currencies {
        println!("- Currencies:");
        for currency in currencies {
            println!("  - {} ({})", currency.name, currency.symbol);
        }
    }
    if let Some(flag) = &info.flag_png {
        println!("- Flag: {}", flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_country() {
        let reference = ReferenceData::bundled();
        assert!(require_country(&reference, "Portugal").is_ok());

        let err = require_country(&reference, "Atlantis").unwrap_err();
        assert!(err.to_string().contains("Unknown country 'Atlantis'"));
    }
}
