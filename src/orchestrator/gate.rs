//! 工具闸门
//!
//! 外部裁决（如人工审批）可在工具执行前拒绝调用；拒绝被记录为 ToolAbortion 并折叠进
//! 反思上下文，附带不要重试同一调用的明确指令。

use async_trait::async_trait;
use serde_json::Value;

/// 工具调用前的外部裁决接口
#[async_trait]
pub trait ToolGate: Send + Sync {
    /// 返回 None 放行；返回 Some(reason) 拒绝本次调用
    async fn review(&self, tool: &str, args: &Value) -> Option<String>;
}
