//! 编排层：决策循环、子智能体执行、并行分发、质量评审、报告装配

pub mod decision;
pub mod delivery;
pub mod dispatch;
pub mod events;
pub mod executor;
pub mod gate;
pub mod loop_;
pub mod parse;
pub mod reviewer;
pub mod template;

pub use decision::{Decision, DecisionStatus, Reflection, ReflectionKind, ToolAbortion};
pub use delivery::{assemble_report, ResearchReport};
pub use events::OrchestratorEvent;
pub use gate::ToolGate;
pub use loop_::{Orchestrator, RunOptions, RunReport};
pub use reviewer::{Evaluation, QualityMode, QualityReviewer, QualityVerdict};
