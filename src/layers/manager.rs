use crate::core::{config::SessionConfig, viewport::Viewport};
use crate::data::feature::LayerKind;
use crate::fetch::{cache::FeatureList, coordinator::FeatureSource, coordinator::FetchCoordinator};
use crate::layers::session::{LayerSession, SessionCommand, SessionEvent, SessionPhase};
use crate::prelude::HashMap;
use crate::runtime::{self, TaskHandle};
use crate::traits::ViewportAware;
use crate::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::mpsc;

/// Published whenever a layer's visible features change
#[derive(Debug, Clone, PartialEq)]
pub struct LayerUpdate {
    pub kind: LayerKind,
    pub generation: u64,
    pub features: FeatureList,
    pub source: FeatureSource,
}

/// Features of every layer at one instant, in [`LayerKind::ALL`] order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSnapshot {
    pub layers: Vec<(LayerKind, FeatureList)>,
}

impl LayerSnapshot {
    pub fn features(&self, kind: LayerKind) -> FeatureList {
        self.layers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, features)| features.clone())
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.layers.iter().map(|(_, features)| features.len()).sum()
    }
}

type QueuedEvent = (LayerKind, SessionEvent);

/// Drives one [`LayerSession`] per enabled layer.
///
/// Session commands become tasks: debounce timers (one per layer, a new one
/// cancels the pending one) and fetches through the shared
/// [`FetchCoordinator`]. Both report back through an async event queue, so
/// results are applied in completion order. Published updates go to a
/// bounded queue; when nobody drains it the oldest update is dropped.
/// Must be used inside a tokio runtime.
pub struct LayerManager {
    coordinator: FetchCoordinator,
    sessions: HashMap<LayerKind, LayerSession>,
    timers: HashMap<LayerKind, TaskHandle>,
    events_tx: mpsc::UnboundedSender<QueuedEvent>,
    events_rx: mpsc::UnboundedReceiver<QueuedEvent>,
    updates_tx: Sender<LayerUpdate>,
    updates_rx: Receiver<LayerUpdate>,
    viewport: Option<Viewport>,
}

impl LayerManager {
    pub fn new(coordinator: FetchCoordinator, config: &SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = bounded(config.update_queue_capacity.max(1));
        let mut sessions = HashMap::default();
        for kind in &config.layers {
            sessions.insert(*kind, LayerSession::new(*kind, config.clone()));
        }
        Self {
            coordinator,
            sessions,
            timers: HashMap::default(),
            events_tx,
            events_rx,
            updates_tx,
            updates_rx,
            viewport: None,
        }
    }

    /// Manager for the layers and session settings of the coordinator's config
    pub fn from_coordinator(coordinator: FetchCoordinator) -> Self {
        let config = coordinator.config().session.clone();
        Self::new(coordinator, &config)
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    /// Enabled layers in drawing order
    pub fn layers(&self) -> Vec<LayerKind> {
        LayerKind::ALL
            .into_iter()
            .filter(|kind| self.sessions.contains_key(kind))
            .collect()
    }

    pub fn session(&self, kind: LayerKind) -> Option<&LayerSession> {
        self.sessions.get(&kind)
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = Some(viewport.clone());
        self.broadcast(SessionEvent::viewport(viewport));
    }

    pub fn pan_started(&mut self) {
        self.broadcast(SessionEvent::PanStarted);
    }

    pub fn pan_settled(&mut self) {
        self.broadcast(SessionEvent::PanSettled);
    }

    /// Refetches every layer for the current viewport
    pub fn refresh(&mut self) {
        self.broadcast(SessionEvent::Refresh);
    }

    /// Features currently shown for `kind` (empty for disabled layers)
    pub fn features(&self, kind: LayerKind) -> FeatureList {
        self.sessions
            .get(&kind)
            .map(LayerSession::features)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot {
            layers: self
                .layers()
                .into_iter()
                .map(|kind| (kind, self.features(kind)))
                .collect(),
        }
    }

    /// Receiver for layer updates; every clone sees each update once in total.
    /// Holds at most `update_queue_capacity` undrained updates.
    pub fn updates(&self) -> Receiver<LayerUpdate> {
        self.updates_rx.clone()
    }

    /// Drains the updates published so far
    pub fn drain_updates(&self) -> Vec<LayerUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates_rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    /// Applies every queued timer and fetch event without waiting.
    /// Returns the number of events applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((kind, event)) = self.events_rx.try_recv() {
            self.dispatch(kind, event);
            applied += 1;
        }
        applied
    }

    /// Waits for the next timer or fetch event and applies it
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some((kind, event)) => {
                self.dispatch(kind, event);
                true
            }
            None => false,
        }
    }

    /// Any layer waiting on a timer or a fetch
    pub fn is_busy(&self) -> bool {
        self.sessions.values().any(|session| {
            matches!(
                session.phase(),
                SessionPhase::PendingFetch | SessionPhase::Fetching
            )
        })
    }

    /// Processes events until no layer is waiting on a timer or a fetch
    pub async fn settle(&mut self) {
        while self.is_busy() {
            if !self.next_event().await {
                break;
            }
        }
    }

    fn broadcast(&mut self, event: SessionEvent) {
        for kind in self.layers() {
            self.dispatch(kind, event.clone());
        }
    }

    fn dispatch(&mut self, kind: LayerKind, event: SessionEvent) {
        let Some(session) = self.sessions.get_mut(&kind) else {
            return;
        };
        let commands = session.handle(event);
        for command in commands {
            self.execute(kind, command);
        }
    }

    fn execute(&mut self, kind: LayerKind, command: SessionCommand) {
        match command {
            SessionCommand::ScheduleDebounce { generation, delay } => {
                if let Some(previous) = self.timers.remove(&kind) {
                    previous.cancel();
                }
                let tx = self.events_tx.clone();
                let handle = runtime::spawn(async move {
                    runtime::async_delay(delay).await;
                    let _ = tx.send((kind, SessionEvent::DebounceElapsed { generation }));
                });
                self.timers.insert(kind, handle);
            }
            SessionCommand::StartFetch(request) => {
                log::debug!(
                    "{kind}: fetch #{} at {}",
                    request.generation,
                    request.bucket
                );
                let coordinator = self.coordinator.clone();
                let tx = self.events_tx.clone();
                // Fetches are never cancelled; stale results are discarded by the session
                runtime::spawn(async move {
                    let outcome = coordinator
                        .fetch_or_fallback(request.kind, &request.bbox, request.bucket)
                        .await;
                    let _ = tx.send((
                        kind,
                        SessionEvent::FetchCompleted {
                            generation: request.generation,
                            outcome,
                        },
                    ));
                });
            }
            SessionCommand::Publish {
                generation,
                features,
                source,
            } => {
                let update = LayerUpdate {
                    kind,
                    generation,
                    features,
                    source,
                };
                self.publish(update);
            }
        }
    }

    fn publish(&self, mut update: LayerUpdate) {
        loop {
            match self.updates_tx.try_send(update) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(oldest) = self.updates_rx.try_recv() {
                        log::debug!(
                            "{}: update queue full; dropping update #{}",
                            oldest.kind,
                            oldest.generation
                        );
                    }
                    update = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

impl ViewportAware for LayerManager {
    fn on_viewport_changed(&mut self, viewport: &Viewport) -> Result<()> {
        self.set_viewport(viewport);
        Ok(())
    }
}

impl Drop for LayerManager {
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{config::PipelineConfig, geo::LatLng, geo::Point};
    use crate::fetch::{error::FetchError, transport::GeoDataTransport, transport::TransportResponse};
    use crate::prelude::{Arc, Duration};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PARK: &str = r#"{"elements": [{"type": "way", "id": 1, "tags": {"leisure": "park"},
        "geometry": [{"lat": 52.5200, "lon": 13.4000}, {"lat": 52.5200, "lon": 13.4010},
                     {"lat": 52.5210, "lon": 13.4010}, {"lat": 52.5200, "lon": 13.4000}]}]}"#;

    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeoDataTransport for CountingTransport {
        async fn post_query(
            &self,
            _endpoint: &str,
            _query: &str,
        ) -> std::result::Result<TransportResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse::ok(PARK))
        }
    }

    fn park(id: u64) -> String {
        PARK.replace(r#""id": 1"#, &format!(r#""id": {id}"#))
    }

    /// The first query takes ten seconds, later ones answer quickly with a
    /// different park
    struct SlowFirstTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GeoDataTransport for SlowFirstTransport {
        async fn post_query(
            &self,
            _endpoint: &str,
            _query: &str,
        ) -> std::result::Result<TransportResponse, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
            let delay = if call == 0 { 10_000 } else { 50 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(TransportResponse::ok(park(call + 1)))
        }
    }

    fn manager(transport: Arc<CountingTransport>) -> LayerManager {
        let mut config = PipelineConfig::default();
        config.session.layers = vec![LayerKind::Parks];
        LayerManager::from_coordinator(FetchCoordinator::new(config, transport))
    }

    fn viewport(lat: f64) -> Viewport {
        Viewport::from_center(LatLng::new(lat, 13.4005), 16.5, Point::new(800.0, 600.0)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewport_fetch_publishes_update() {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let mut manager = manager(transport.clone());
        assert_eq!(manager.layers(), vec![LayerKind::Parks]);

        manager.set_viewport(&viewport(52.5205));
        assert!(manager.is_busy());
        manager.settle().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.features(LayerKind::Parks).len(), 1);
        assert!(manager.features(LayerKind::Roads).is_empty());

        let updates = manager.drain_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].source, FeatureSource::Network);
        assert_eq!(manager.snapshot().total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_rapid_moves() {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let mut manager = manager(transport.clone());

        for step in 0..5 {
            manager.set_viewport(&viewport(52.0 + step as f64 * 0.1));
            tokio::time::sleep(Duration::from_millis(100)).await;
            manager.process_pending();
        }
        manager.settle().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        let fetched = manager.session(LayerKind::Parks).unwrap().fetched_bounds().unwrap();
        assert!((fetched.center().lat - 52.4).abs() < 1e-6);
    }

    /// Starts the first (slow) fetch for the viewport at `lat`
    async fn start_slow_fetch(transport: Arc<SlowFirstTransport>, lat: f64) -> LayerManager {
        let mut config = PipelineConfig::default();
        config.session.layers = vec![LayerKind::Parks];
        let mut manager = LayerManager::from_coordinator(FetchCoordinator::new(config, transport));
        manager.set_viewport(&viewport(lat));
        tokio::time::sleep(Duration::from_millis(600)).await;
        manager.process_pending();
        assert_eq!(
            manager.session(LayerKind::Parks).unwrap().phase(),
            SessionPhase::Fetching
        );
        manager
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_fetch_finishing_last_is_discarded() {
        let transport = Arc::new(SlowFirstTransport {
            calls: AtomicUsize::new(0),
        });
        let mut manager = start_slow_fetch(transport.clone(), 52.5205).await;

        manager.set_viewport(&viewport(52.0));
        manager.settle().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.features(LayerKind::Parks)[0].id(), "way/2");

        // Let the first fetch land after the second
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(manager.process_pending(), 1);
        assert_eq!(manager.features(LayerKind::Parks)[0].id(), "way/2");

        let updates = manager.drain_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].features[0].id(), "way/2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_away_and_back_during_fetch_settles() {
        let transport = Arc::new(SlowFirstTransport {
            calls: AtomicUsize::new(0),
        });
        let mut manager = start_slow_fetch(transport.clone(), 52.5205).await;

        manager.set_viewport(&viewport(52.0));
        manager.set_viewport(&viewport(52.5205));
        manager.settle().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.features(LayerKind::Parks)[0].id(), "way/1");
        assert!(!manager.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panning_away_and_back_during_fetch_settles() {
        let transport = Arc::new(SlowFirstTransport {
            calls: AtomicUsize::new(0),
        });
        let mut manager = start_slow_fetch(transport.clone(), 52.5205).await;

        manager.pan_started();
        manager.on_viewport_changed(&viewport(52.0)).unwrap();
        manager.on_viewport_changed(&viewport(52.5205)).unwrap();
        manager.pan_settled();
        manager.settle().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.features(LayerKind::Parks)[0].id(), "way/1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_undrained_updates_stay_bounded() {
        let transport = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let mut config = PipelineConfig::default();
        config.session.layers = vec![LayerKind::Parks];
        config.session.update_queue_capacity = 2;
        let mut manager = LayerManager::from_coordinator(FetchCoordinator::new(config, transport));

        manager.set_viewport(&viewport(52.5205));
        manager.settle().await;
        for _ in 0..5 {
            manager.refresh();
            manager.settle().await;
            assert!(manager.updates().len() <= 2);
        }

        let updates = manager.drain_updates();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].generation < updates[1].generation);
        assert_eq!(
            updates[1].generation,
            manager.session(LayerKind::Parks).unwrap().generation()
        );
    }
}
