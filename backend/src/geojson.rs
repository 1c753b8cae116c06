use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Coordinate, LinkId, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("failed to read GeoJSON file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid GeoJSON document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub coord: Coordinate,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: LinkId,
    pub from: NodeId,
    pub to: NodeId,
    /// Line-string vertices from the `from` end to the `to` end.
    pub geometry: Vec<Coordinate>,
    #[serde(default)]
    pub length_m: Option<f64>,
    #[serde(default)]
    pub road_name: Option<String>,
}

/// Records decoded from one file plus the number of features that were unusable.
#[derive(Clone, Debug)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    #[serde(other)]
    Unsupported,
}

const NODE_ID_KEYS: [&str; 3] = ["NODE_ID", "node_id", "id"];
const LINK_ID_KEYS: [&str; 3] = ["LINK_ID", "link_id", "id"];
const FROM_NODE_KEYS: [&str; 3] = ["F_NODE", "f_node", "from"];
const TO_NODE_KEYS: [&str; 3] = ["T_NODE", "t_node", "to"];

pub fn parse_nodes(reader: impl Read) -> Result<Decoded<NodeRecord>, GeoJsonError> {
    let collection: FeatureCollection = serde_json::from_reader(reader)?;
    let mut decoded = Decoded::default();

    for feature in collection.features {
        match node_from_feature(&feature) {
            Some(node) => decoded.records.push(node),
            None => decoded.skipped += 1,
        }
    }

    if decoded.skipped > 0 {
        tracing::warn!("skipped {} node features without id or point", decoded.skipped);
    }
    Ok(decoded)
}

pub fn parse_links(reader: impl Read) -> Result<Decoded<LinkRecord>, GeoJsonError> {
    let collection: FeatureCollection = serde_json::from_reader(reader)?;
    let mut decoded = Decoded::default();

    for feature in collection.features {
        match link_from_feature(&feature) {
            Some(link) => decoded.records.push(link),
            None => decoded.skipped += 1,
        }
    }

    if decoded.skipped > 0 {
        tracing::warn!(
            "skipped {} link features without ids, endpoints or line geometry",
            decoded.skipped
        );
    }
    Ok(decoded)
}

/// Read a node file, preferring a Zstandard-compressed `<path>.zst` sibling.
pub fn read_nodes(path: impl AsRef<Path>) -> Result<Decoded<NodeRecord>, GeoJsonError> {
    parse_nodes(open_maybe_compressed(path.as_ref())?)
}

/// Read a link file, preferring a Zstandard-compressed `<path>.zst` sibling.
pub fn read_links(path: impl AsRef<Path>) -> Result<Decoded<LinkRecord>, GeoJsonError> {
    parse_links(open_maybe_compressed(path.as_ref())?)
}

/// Bytes fetched over HTTP may also be compressed; sniff the zstd magic number.
pub fn decompress_if_needed(bytes: Vec<u8>) -> Result<Vec<u8>, io::Error> {
    const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
    if bytes.starts_with(&ZSTD_MAGIC) {
        zstd::stream::decode_all(bytes.as_slice())
    } else {
        Ok(bytes)
    }
}

fn open_maybe_compressed(path: &Path) -> Result<Box<dyn Read>, GeoJsonError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| GeoJsonError::Io { path, source }
    };

    let mut compressed = path.as_os_str().to_owned();
    compressed.push(".zst");
    let compressed = PathBuf::from(compressed);

    if compressed.exists() {
        tracing::debug!("reading compressed GeoJSON {}", compressed.display());
        let file = File::open(&compressed).map_err(io_err(&compressed))?;
        let decoder = zstd::stream::read::Decoder::new(file).map_err(io_err(&compressed))?;
        return Ok(Box::new(BufReader::new(decoder)));
    }

    let file = File::open(path).map_err(io_err(path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn node_from_feature(feature: &Feature) -> Option<NodeRecord> {
    let props = feature.properties.as_ref();
    let id = props
        .and_then(|p| first_id(p, &NODE_ID_KEYS))
        .or_else(|| feature.id.as_ref().and_then(id_from_value))?;

    let coord = match feature.geometry.as_ref()? {
        Geometry::Point { coordinates } => position(coordinates)?,
        _ => return None,
    };

    let name = props
        .and_then(|p| p.get("NODE_NAME"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(NodeRecord { id, coord, name })
}

fn link_from_feature(feature: &Feature) -> Option<LinkRecord> {
    let props = feature.properties.as_ref()?;
    let id = first_id(props, &LINK_ID_KEYS)
        .or_else(|| feature.id.as_ref().and_then(id_from_value))?;
    let from = first_id(props, &FROM_NODE_KEYS)?;
    let to = first_id(props, &TO_NODE_KEYS)?;

    let geometry: Vec<Coordinate> = match feature.geometry.as_ref()? {
        Geometry::LineString { coordinates } => coordinates.iter().filter_map(|p| position(p)).collect(),
        Geometry::MultiLineString { coordinates } => coordinates
            .iter()
            .flatten()
            .filter_map(|p| position(p))
            .collect(),
        _ => return None,
    };
    if geometry.len() < 2 {
        return None;
    }

    let length_m = props.get("LENGTH").and_then(number_from_value);
    let road_name = props
        .get("ROAD_NAME")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    Some(LinkRecord {
        id,
        from,
        to,
        geometry,
        length_m,
        road_name,
    })
}

/// GeoJSON positions are `[lon, lat(, elevation)]`.
fn position(raw: &[f64]) -> Option<Coordinate> {
    match raw {
        [lon, lat, ..] => {
            let coord = Coordinate { lat: *lat, lon: *lon };
            coord.is_valid().then_some(coord)
        }
        _ => None,
    }
}

fn first_id(props: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| props.get(*key).and_then(id_from_value))
}

pub(crate) fn id_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
