use async_trait::async_trait;
use cityscape::core::config::PipelineConfig;
use cityscape::fetch::{FetchCoordinator, FetchError, GeoDataTransport, TransportResponse};
use cityscape::rendering::{RenderLayer, Renderer, Shape, Theme};
use cityscape::{LatLng, LayerKind, LayerManager, Point, Viewport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BLOCK: &str = r#"{"elements": [
    {"type": "way", "id": 1, "tags": {"leisure": "park"},
     "geometry": [{"lat": 52.5195, "lon": 13.3990}, {"lat": 52.5195, "lon": 13.4020},
                  {"lat": 52.5215, "lon": 13.4020}, {"lat": 52.5215, "lon": 13.3990},
                  {"lat": 52.5195, "lon": 13.3990}]},
    {"type": "way", "id": 2, "tags": {"building": "office", "height": "24"},
     "geometry": [{"lat": 52.5203, "lon": 13.4003}, {"lat": 52.5203, "lon": 13.4008},
                  {"lat": 52.5207, "lon": 13.4008}, {"lat": 52.5207, "lon": 13.4003},
                  {"lat": 52.5203, "lon": 13.4003}]}
]}"#;

struct BlockTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl GeoDataTransport for BlockTransport {
    async fn post_query(&self, _endpoint: &str, _query: &str) -> Result<TransportResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransportResponse::ok(BLOCK))
    }
}

fn viewport() -> Viewport {
    Viewport::from_center(LatLng::new(52.5205, 13.4005), 16.5, Point::new(800.0, 600.0)).unwrap()
}

async fn loaded_manager() -> (LayerManager, Arc<BlockTransport>) {
    let transport = Arc::new(BlockTransport {
        calls: AtomicUsize::new(0),
    });
    let mut config = PipelineConfig::default();
    config.session.layers = vec![LayerKind::Buildings, LayerKind::Parks];
    let session = config.session.clone();
    let mut manager = LayerManager::new(FetchCoordinator::new(config, transport.clone()), &session);

    manager.set_viewport(&viewport());
    manager.settle().await;
    (manager, transport)
}

#[tokio::test(start_paused = true)]
async fn test_viewport_to_primitives() {
    let (manager, transport) = loaded_manager().await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.features(LayerKind::Buildings).len(), 1);
    assert_eq!(snapshot.features(LayerKind::Parks).len(), 1);

    let renderer = Renderer::default();
    let primitives = renderer.render_layers(&snapshot, &viewport().with_tilt(0.7));
    let layers: Vec<RenderLayer> = primitives.iter().map(|p| p.layer).collect();
    assert_eq!(
        layers,
        vec![RenderLayer::Ground, RenderLayer::Shadows, RenderLayer::Buildings]
    );
    assert!(primitives
        .iter()
        .enumerate()
        .all(|(i, primitive)| primitive.z_order == i));

    let building = &primitives[2];
    assert!(building.is_extruded());
    assert!(building.height_px > 0.0);
    let Shape::Polygon(base) = &building.shape else {
        panic!("building footprint should be a polygon");
    };
    assert!(base.iter().all(|p| p.x > 0.0 && p.x < 800.0 && p.y > 0.0 && p.y < 600.0));
}

#[tokio::test(start_paused = true)]
async fn test_flat_render_and_theme_switch() {
    let (manager, _) = loaded_manager().await;
    let snapshot = manager.snapshot();

    let mut renderer = Renderer::default();
    let flat = renderer.render_layers(&snapshot, &viewport());
    assert_eq!(flat.len(), 2);
    assert!(flat.iter().all(|p| !p.is_extruded() && p.shadow_offset.is_none()));

    let day_fill = flat[0].fill;
    let day_background = renderer.background();
    renderer.set_theme(Theme::Night);
    let night = renderer.render_layers(&snapshot, &viewport());
    assert_ne!(night[0].fill, day_fill);
    assert_ne!(renderer.background(), day_background);
}
