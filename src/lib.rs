pub mod algorithms;
pub mod error;
pub mod metrics;
pub mod network;
pub mod node;
pub mod simulation;

pub use algorithms::{AlgorithmRegistry, ApplicationAlgorithm, ControlAlgorithm};
pub use error::{ConfigError, SimError, SimResult};
pub use simulation::{ScenarioConfig, Simulator, Termination};

pub mod prelude {
    pub use crate::algorithms::{AlgorithmRegistry, ApplicationAlgorithm, ControlAlgorithm};
    pub use crate::error::{ConfigError, SimError, SimResult};
    pub use crate::metrics::{RunSummary, TraceEntry};
    pub use crate::network::{Destination, Interface, NodeId, Packet, PacketKind, RoutingMetric};
    pub use crate::node::{NodeContext, PacketStats, Plane};
    pub use crate::simulation::{GlobalParameters, ScenarioConfig, Simulator, Termination};
}
