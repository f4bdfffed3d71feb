//! 对话流程：状态、路由策略、状态机

pub mod machine;
pub mod router;
pub mod state;

pub use machine::{AgenticFlow, TurnOutcome};
pub use router::{RoutingDecision, RoutingPolicy};
pub use state::{ConversationState, FlowPhase};
