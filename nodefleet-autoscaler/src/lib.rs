pub mod bounds;
pub mod clock;
pub mod config;
pub mod context;
pub mod manager;
pub mod node_group;
pub mod provider_manager;
pub mod refresh_job;
pub mod status;

pub use bounds::{resolve_effective_max, resolve_group_overrides, GroupBounds};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::{AutoscalerConfig, ManagerConfig};
pub use context::{ServiceContext, Timeouts};
pub use manager::{FleetManager, FleetSnapshot};
pub use node_group::{NodeGroupRuntime, NodeGroupStatus};
pub use nodefleet_common::AutoscalerError;
