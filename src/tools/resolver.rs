//! 工具解析器
//!
//! 将子智能体步骤声明的工具 id 列表解析为可执行句柄；目录中不存在的 id 仅告警并跳过，
//! 不中断执行。保留 id `short_term_memory` 表示内置记忆访问工具，由执行器单独绑定到
//! 当前分区，因此永远不产生 not found 告警。

use std::sync::Arc;

use crate::tools::{ToolHandle, ToolRegistry};

/// 内置短期记忆工具的保留 id
pub const MEMORY_TOOL_ID: &str = "short_term_memory";

/// 工具解析器：持有注册表，按 id 列表解析
#[derive(Clone)]
pub struct ToolResolver {
    registry: Arc<ToolRegistry>,
}

impl ToolResolver {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// 解析 id 列表为句柄；未知 id 告警跳过，保留 id 静默跳过
    pub fn resolve(&self, tool_ids: &[String]) -> Vec<ToolHandle> {
        let mut handles = Vec::new();
        for id in tool_ids {
            if let Some(handle) = self.registry.get(id) {
                handles.push(handle);
            } else if id != MEMORY_TOOL_ID {
                tracing::warn!(tool = %id, "tool not found in catalog, skipping");
            }
        }
        handles
    }
}
