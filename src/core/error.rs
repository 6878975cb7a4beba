//! 编排器错误类型与运行结果
//!
//! 错误分级：决策模型失败为致命（终止本次运行）；子智能体内部失败一律就地吸收，
//! 只以 Reflection 或日志形式留痕，循环继续。

use thiserror::Error;

/// 运行过程中可能出现的错误（网络、解析、工具等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    /// 决策模型回复无法解析为 Decision，循环无法继续
    #[error("Decision parse error: {0}")]
    DecisionParseError(String),
}

/// 一次编排运行的最终结果
///
/// `LimitReached` 表示到达迭代上限：按部分成功处理并明确告知用户，不算错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 决策模型返回 done 且报告已装配
    Success,
    /// 决策调用失败或回复不可解析
    Error,
    /// 外部取消信号在迭代边界被观测到
    Stopped,
    /// 迭代上限耗尽，部分结果已交付
    LimitReached,
}
