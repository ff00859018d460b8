pub mod graph;
pub mod lane;
pub mod publisher;

pub use graph::advisor::{default_advisors, AgentDescriptor};
pub use graph::context::GraphContext;
pub use graph::engine::{GraphEngine, PreparedTurn, TurnInput, TurnOutcome, TurnRequest};
pub use lane::ThreadLanes;
pub use publisher::{frame_stream, Frame};
