//! Core constants for the geodata pipeline.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers;
//! everything here is only a default and is injected through `PipelineConfig`.

/// Public Overpass API mirrors, in preference order.
pub const DEFAULT_ENDPOINTS: [&str; 4] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.private.coffee/api/interpreter",
    "https://maps.mail.ru/osm/tools/overpass/api/interpreter",
];

/// User agent sent with every query.
pub const USER_AGENT: &str = concat!("cityscape/", env!("CARGO_PKG_VERSION"));

/// Per-request HTTP timeout (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Server-side `[timeout:N]` hint embedded in each query (seconds).
pub const QUERY_TIMEOUT_SECS: u32 = 25;

/// Decimal places kept in cache keys (~110 m at the equator).
pub const CACHE_KEY_PRECISION: usize = 3;

/// Maximum query area per zoom bucket (square degrees).
pub const MAX_QUERY_AREA_DEG2: [f64; 5] = [0.04, 0.02, 0.01, 0.005, 0.0025];

/// Maximum building features kept per zoom bucket.
pub const MAX_BUILDINGS: [usize; 5] = [150, 300, 600, 1200, 2500];
/// Maximum road features kept per zoom bucket.
pub const MAX_ROADS: [usize; 5] = [120, 250, 500, 900, 1500];
/// Maximum water features kept per zoom bucket.
pub const MAX_WATER: [usize; 5] = [40, 60, 100, 150, 250];
/// Maximum park/vegetation features kept per zoom bucket.
pub const MAX_PARKS: [usize; 5] = [40, 80, 150, 300, 600];
/// Maximum points of interest kept per zoom bucket.
pub const MAX_POIS: [usize; 5] = [0, 0, 60, 150, 300];

/// Geographic RDP tolerance applied while parsing (degrees).
pub const SIMPLIFY_TOLERANCE_DEG: [f64; 5] = [0.0001, 0.00005, 0.00002, 0.00001, 0.0];

/// Footprints smaller than this (square metres) are dropped per bucket.
pub const MIN_BUILDING_AREA_M2: [f64; 5] = [400.0, 200.0, 80.0, 20.0, 0.0];

/// Building types kept at buckets 1 and 2.
pub const IMPORTANT_BUILDING_TYPES: [&str; 16] = [
    "commercial",
    "office",
    "retail",
    "industrial",
    "church",
    "cathedral",
    "mosque",
    "temple",
    "stadium",
    "hospital",
    "university",
    "school",
    "train_station",
    "transportation",
    "public",
    "civic",
];

/// Highway types requested per zoom bucket; each bucket includes the previous ones.
pub const HIGHWAY_TYPES: [&str; 5] = [
    "motorway|trunk|primary",
    "motorway|trunk|primary|secondary",
    "motorway|trunk|primary|secondary|tertiary",
    "motorway|trunk|primary|secondary|tertiary|residential|unclassified|living_street",
    "motorway|trunk|primary|secondary|tertiary|residential|unclassified|living_street|service|pedestrian|footway|cycleway|path",
];

/// Metres per building level when only `building:levels` is known.
pub const METERS_PER_LEVEL: f64 = 3.2;

/// Elevation added per OSM `layer` step (bridges, overpasses).
pub const METERS_PER_LAYER: f64 = 5.0;
