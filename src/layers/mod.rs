pub mod manager;
pub mod session;

pub use manager::{LayerManager, LayerSnapshot, LayerUpdate};
pub use session::{FetchRequest, LayerSession, SessionCommand, SessionEvent, SessionPhase};
