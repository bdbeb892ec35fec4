//! Network acquisition: query planning, throttling, endpoint rotation,
//! caching and the coordinator that ties them together.

pub mod bbox_policy;
pub mod cache;
pub mod coordinator;
pub mod endpoints;
pub mod error;
pub mod throttle;
pub mod transport;

pub use bbox_policy::{BoundingBoxPolicy, QueryPlan};
pub use cache::{FeatureList, GeoDataCache};
pub use coordinator::{FeatureSource, FetchCoordinator, FetchOutcome, FetchStats};
pub use endpoints::{EndpointHandle, EndpointRegistry, EndpointState};
pub use error::FetchError;
pub use throttle::{SkipReason, ThrottleController, ThrottleDecision, ThrottlePhase};
pub use transport::{GeoDataTransport, HttpTransport, TransportResponse};
