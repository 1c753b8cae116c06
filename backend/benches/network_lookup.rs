use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use jeju_backend::geojson::{LinkRecord, NodeRecord};
use jeju_backend::models::Coordinate;
use jeju_backend::network::{DEFAULT_MAX_RADIUS_M, RoadNetwork};

/// Square grid of `side × side` nodes roughly 100 m apart, starting near Jeju City.
fn grid_network(side: u64) -> RoadNetwork {
    const STEP_DEG: f64 = 0.0009;
    let id = |row: u64, col: u64| row * side + col + 1;

    let mut nodes = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        for col in 0..side {
            nodes.push(NodeRecord {
                id: id(row, col),
                coord: Coordinate::new(33.40 + row as f64 * STEP_DEG, 126.40 + col as f64 * STEP_DEG),
                name: None,
            });
        }
    }

    let coord = |node: u64| nodes[(node - 1) as usize].coord;
    let mut links = Vec::new();
    let mut link_id = 1_000_000;
    for row in 0..side {
        for col in 0..side {
            let here = id(row, col);
            let mut neighbours = Vec::new();
            if col + 1 < side {
                neighbours.push(id(row, col + 1));
            }
            if row + 1 < side {
                neighbours.push(id(row + 1, col));
            }
            for next in neighbours {
                links.push(LinkRecord {
                    id: link_id,
                    from: here,
                    to: next,
                    geometry: vec![coord(here), coord(next)],
                    length_m: None,
                    road_name: None,
                });
                link_id += 1;
            }
        }
    }

    RoadNetwork::from_records(nodes, links).expect("grid network")
}

fn benchmark_nearest_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_node");
    for side in [50u64, 150] {
        let network = grid_network(side);
        let target = Coordinate::new(33.4321, 126.4321);
        group.bench_with_input(BenchmarkId::from_parameter(side * side), &network, |b, network| {
            b.iter(|| network.nearest_node(black_box(target), DEFAULT_MAX_RADIUS_M))
        });
    }
    group.finish();
}

fn benchmark_find_node_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_node_path");
    for side in [50u64, 150] {
        let network = grid_network(side);
        let corner_to_corner = (1, side * side);
        group.bench_with_input(BenchmarkId::from_parameter(side * side), &network, |b, network| {
            b.iter(|| network.find_node_path(black_box(corner_to_corner.0), black_box(corner_to_corner.1)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_nearest_node, benchmark_find_node_path);
criterion_main!(benches);
