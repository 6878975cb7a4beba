//! 核心类型：错误与运行结果

pub mod error;

pub use error::{AgentError, RunOutcome};
