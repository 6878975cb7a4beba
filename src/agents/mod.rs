//! 子智能体目录：定义、内置研究智能体与查找

pub mod builtin;
pub mod catalog;
pub mod definition;

pub use builtin::{component_type_for, decision_agent, research_agents};
pub use catalog::AgentCatalog;
pub use definition::{AgentDefinition, AgentParameter, AgentStep};
