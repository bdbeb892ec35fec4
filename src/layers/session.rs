//! Refresh policy for one feature layer under a moving viewport.
//!
//! ```text
//! Idle --viewport--> PendingFetch --debounce--> Fetching --result--> Settled
//!                         ^                        |                    |
//!                         +---- viewport moved ----+--------------------+
//! ```
//!
//! The session is a pure state machine: it consumes [`SessionEvent`]s and
//! returns [`SessionCommand`]s for the caller to execute. Every scheduled
//! debounce and fetch carries a generation number; anything that arrives
//! tagged with an older generation is ignored.

use crate::core::{config::SessionConfig, geo::BoundingBox, viewport::Viewport, zoom::ZoomBucket};
use crate::data::feature::LayerKind;
use crate::fetch::{
    cache::FeatureList,
    coordinator::{FeatureSource, FetchOutcome},
};
use crate::prelude::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing requested yet
    Idle,
    /// A debounce timer is running
    PendingFetch,
    Fetching,
    /// The last fetch completed and its features are current
    Settled,
}

/// What to fetch for a given generation
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub generation: u64,
    pub kind: LayerKind,
    pub bbox: BoundingBox,
    pub zoom: f64,
    pub bucket: ZoomBucket,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ViewportChanged { bbox: BoundingBox, zoom: f64 },
    PanStarted,
    PanSettled,
    DebounceElapsed { generation: u64 },
    FetchCompleted { generation: u64, outcome: FetchOutcome },
    /// Refetch the current viewport now, ignoring similarity
    Refresh,
}

impl SessionEvent {
    pub fn viewport(viewport: &Viewport) -> Self {
        SessionEvent::ViewportChanged {
            bbox: viewport.bounds,
            zoom: viewport.zoom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Start a single-shot timer replacing any pending one
    ScheduleDebounce { generation: u64, delay: Duration },
    StartFetch(FetchRequest),
    /// The visible features changed
    Publish {
        generation: u64,
        features: FeatureList,
        source: FeatureSource,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewState {
    bbox: BoundingBox,
    zoom: f64,
}

impl ViewState {
    fn bucket(&self) -> ZoomBucket {
        ZoomBucket::from_zoom(self.zoom)
    }
}

#[derive(Debug, Clone)]
pub struct LayerSession {
    kind: LayerKind,
    config: SessionConfig,
    phase: SessionPhase,
    generation: u64,
    /// Viewport most recently reported
    target: Option<ViewState>,
    /// Viewport the current or last fetch was issued for
    anchor: Option<ViewState>,
    /// Viewport the shown features were fetched for
    shown: Option<ViewState>,
    /// Generation of the newest fetch still outstanding
    in_flight: Option<u64>,
    /// Generation whose result will be applied; `None` once superseded
    awaiting: Option<u64>,
    panning: bool,
    needs_refresh: bool,
    features: FeatureList,
    source: Option<FeatureSource>,
}

impl LayerSession {
    pub fn new(kind: LayerKind, config: SessionConfig) -> Self {
        Self {
            kind,
            config,
            phase: SessionPhase::Idle,
            generation: 0,
            target: None,
            anchor: None,
            shown: None,
            in_flight: None,
            awaiting: None,
            panning: false,
            needs_refresh: false,
            features: FeatureList::default(),
            source: None,
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    /// Features currently shown; possibly empty, never absent
    pub fn features(&self) -> FeatureList {
        self.features.clone()
    }

    /// Where the current features came from
    pub fn source(&self) -> Option<&FeatureSource> {
        self.source.as_ref()
    }

    /// Bounding box of the current or last fetch
    pub fn fetched_bounds(&self) -> Option<BoundingBox> {
        self.anchor.map(|view| view.bbox)
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionCommand> {
        match event {
            SessionEvent::ViewportChanged { bbox, zoom } => self.on_viewport(ViewState { bbox, zoom }),
            SessionEvent::PanStarted => {
                self.panning = true;
                Vec::new()
            }
            SessionEvent::PanSettled => self.on_pan_settled(),
            SessionEvent::DebounceElapsed { generation } => self.on_debounce(generation),
            SessionEvent::FetchCompleted {
                generation,
                outcome,
            } => self.on_fetch_completed(generation, outcome),
            SessionEvent::Refresh => {
                self.generation += 1;
                self.needs_refresh = false;
                self.start_fetch().into_iter().collect()
            }
        }
    }

    /// Whether `view` is close enough to what was last fetched to keep
    /// showing the existing data
    pub fn is_similar(&self, bbox: &BoundingBox, zoom: f64) -> bool {
        let Some(anchor) = self.anchor else {
            return false;
        };
        if anchor.bucket() != ZoomBucket::from_zoom(zoom) {
            return false;
        }
        if (anchor.zoom - zoom).abs() >= self.config.zoom_delta_threshold {
            return false;
        }
        let (a, b) = (anchor.bbox.center(), bbox.center());
        let width = bbox.width_deg().max(f64::EPSILON);
        let height = bbox.height_deg().max(f64::EPSILON);
        let shift = ((a.lng - b.lng).abs() / width).max((a.lat - b.lat).abs() / height);
        shift < self.config.similarity_threshold
    }

    fn on_viewport(&mut self, view: ViewState) -> Vec<SessionCommand> {
        self.target = Some(view);

        if self.is_similar(&view.bbox, view.zoom) {
            let superseded =
                self.phase == SessionPhase::PendingFetch || (self.panning && self.needs_refresh);
            if superseded {
                // Back near the fetched region: cancel the pending timer and
                // take the outstanding fetch back, if there is one
                self.generation += 1;
                self.needs_refresh = false;
                self.awaiting = self.in_flight;
                self.phase = self.resting_phase();
            }
            return Vec::new();
        }

        self.generation += 1;
        self.awaiting = None;
        if self.panning {
            self.needs_refresh = true;
            self.phase = self.resting_phase();
            return Vec::new();
        }

        self.phase = SessionPhase::PendingFetch;
        vec![SessionCommand::ScheduleDebounce {
            generation: self.generation,
            delay: self.config.debounce(),
        }]
    }

    fn on_pan_settled(&mut self) -> Vec<SessionCommand> {
        self.panning = false;
        if !self.needs_refresh {
            return Vec::new();
        }
        self.needs_refresh = false;
        match self.target {
            Some(view) if !self.is_similar(&view.bbox, view.zoom) => {
                self.generation += 1;
                self.start_fetch().into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    fn on_debounce(&mut self, generation: u64) -> Vec<SessionCommand> {
        if generation != self.generation || self.phase != SessionPhase::PendingFetch {
            log::trace!("{}: ignoring stale debounce #{generation}", self.kind);
            return Vec::new();
        }
        if self.panning {
            self.needs_refresh = true;
            self.phase = self.resting_phase();
            return Vec::new();
        }
        self.start_fetch().into_iter().collect()
    }

    fn on_fetch_completed(&mut self, generation: u64, outcome: FetchOutcome) -> Vec<SessionCommand> {
        if self.in_flight == Some(generation) {
            self.in_flight = None;
        }
        if self.awaiting != Some(generation) {
            log::debug!(
                "{}: discarding stale result #{generation} (current #{})",
                self.kind,
                self.generation
            );
            if self.in_flight.is_none() {
                // Nothing outstanding: similarity is judged against what is shown
                self.anchor = self.shown;
            }
            if self.phase == SessionPhase::Fetching {
                self.phase = self.resting_phase();
            }
            return Vec::new();
        }

        self.awaiting = None;
        self.shown = self.anchor;
        self.phase = SessionPhase::Settled;
        let keep_previous = !outcome.is_fresh() && outcome.features.is_empty();
        if keep_previous {
            self.needs_refresh = true;
            log::debug!(
                "{}: fetch yielded nothing ({:?}); keeping {} features",
                self.kind,
                outcome.source,
                self.features.len()
            );
        } else {
            self.features = outcome.features;
        }
        self.source = Some(outcome.source.clone());

        vec![SessionCommand::Publish {
            generation,
            features: self.features.clone(),
            source: outcome.source,
        }]
    }

    fn start_fetch(&mut self) -> Option<SessionCommand> {
        let view = self.target?;
        self.anchor = Some(view);
        self.in_flight = Some(self.generation);
        self.awaiting = Some(self.generation);
        self.phase = SessionPhase::Fetching;
        Some(SessionCommand::StartFetch(FetchRequest {
            generation: self.generation,
            kind: self.kind,
            bbox: view.bbox,
            zoom: view.zoom,
            bucket: view.bucket(),
        }))
    }

    fn resting_phase(&self) -> SessionPhase {
        if self.awaiting.is_some() {
            SessionPhase::Fetching
        } else if self.source.is_some() {
            SessionPhase::Settled
        } else {
            SessionPhase::Idle
        }
    }
}
