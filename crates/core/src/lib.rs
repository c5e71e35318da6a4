pub mod config;
pub mod error;
pub mod event;
pub mod raw;
pub mod state;

pub use config::{AnalysisConfig, Config, Direction, FeatureFilter, TransportConfig};
pub use error::*;
pub use event::*;
pub use raw::{EventKind, Side};
pub use state::*;
