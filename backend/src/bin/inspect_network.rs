use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jeju_backend::{
    config::{DEFAULT_LINK_GEOJSON, DEFAULT_NODE_GEOJSON},
    itinerary::interleave,
    models::Coordinate,
    network::{DEFAULT_MAX_RADIUS_M, RoadNetwork},
    route_parser::parse_interleaved_route,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Inspect the Jeju road network: counts, nearest nodes and BFS paths"
)]
struct Args {
    /// Node GeoJSON (a `.zst` sibling is used when present)
    #[arg(long, default_value = DEFAULT_NODE_GEOJSON)]
    nodes: PathBuf,

    /// Link GeoJSON
    #[arg(long, default_value = DEFAULT_LINK_GEOJSON)]
    links: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Node, link and isolated-node counts
    Stats,
    /// Nearest node to a coordinate
    Nearest {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
        #[arg(long, default_value_t = DEFAULT_MAX_RADIUS_M)]
        radius: f64,
    },
    /// Fewest-hops path between two nodes, printed as an interleaved route
    Path {
        #[arg(long)]
        from: u64,
        #[arg(long)]
        to: u64,
    },
    /// Decode an interleaved route, e.g. `1,10,2,11,3`
    Route {
        #[arg(value_delimiter = ',')]
        tokens: Vec<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!("loading network from {:?} and {:?}", args.nodes, args.links);
    let network = RoadNetwork::from_files(&args.nodes, &args.links)?;

    match args.command {
        Command::Stats => {
            let stats = network.stats();
            println!(
                "nodes={} links={} isolated={} skipped_links={}",
                stats.node_count, stats.link_count, stats.isolated_nodes, stats.skipped_links
            );
        }
        Command::Nearest { lat, lon, radius } => {
            match network.nearest_node(Coordinate::new(lat, lon), radius) {
                Some(found) => println!(
                    "node {} at ({:.6}, {:.6}), {:.1} m",
                    found.node_id, found.coord.lat, found.coord.lon, found.distance_m
                ),
                None => println!("no node within {radius} m"),
            }
        }
        Command::Path { from, to } => {
            let found = network.find_node_path(from, to);
            if found.fallback {
                println!("no connection between {from} and {to}");
                return Ok(());
            }
            let route = network.path_to_route(&found.nodes);
            let tokens = interleave(&route).unwrap_or_else(|| found.nodes.clone());
            println!(
                "{} hops, {:.3} km: {:?}",
                found.nodes.len().saturating_sub(1),
                network.route_distance_km(&route),
                tokens
            );
        }
        Command::Route { tokens } => {
            let route = parse_interleaved_route(&tokens)?;
            for segment in &route.segments {
                println!("{} -> {} via {:?}", segment.from, segment.to, segment.links);
            }
            println!("{:.3} km", network.route_distance_km(&route));
        }
    }

    Ok(())
}
