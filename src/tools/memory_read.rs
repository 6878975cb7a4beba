//! 内置短期记忆访问工具
//!
//! 绑定到单次运行的分区，供子智能体按 id 取回早前产物；对应保留 id `short_term_memory`。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::MemoryStore;
use crate::tools::{Tool, MEMORY_TOOL_ID};

/// 记忆读取工具：scoped 到一个分区
pub struct MemoryReadTool {
    store: Arc<MemoryStore>,
    partition: String,
}

impl MemoryReadTool {
    pub fn new(store: Arc<MemoryStore>, partition: impl Into<String>) -> Self {
        Self {
            store,
            partition: partition.into(),
        }
    }
}

#[async_trait]
impl Tool for MemoryReadTool {
    fn name(&self) -> &str {
        MEMORY_TOOL_ID
    }

    fn description(&self) -> &str {
        "Retrieve a stored work product by its id. Args: {\"id\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "The id of the content to retrieve" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let id = args.get("id").and_then(|v| v.as_str()).unwrap_or("").trim();
        if id.is_empty() {
            return Err("Missing id".to_string());
        }
        match self.store.retrieve(&self.partition, id).await {
            Some(item) => Ok(format!("{}:\n{}", item.title, item.body)),
            None => Err(format!("No content found for '{id}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ItemExtra;

    #[tokio::test]
    async fn test_reads_only_own_partition() {
        let store = Arc::new(MemoryStore::new());
        let id = store.store("run-a", "Plan", "the plan", ItemExtra::default()).await;

        let tool_a = MemoryReadTool::new(store.clone(), "run-a");
        let tool_b = MemoryReadTool::new(store.clone(), "run-b");

        let ok = tool_a.execute(serde_json::json!({ "id": id })).await.unwrap();
        assert!(ok.contains("the plan"));
        assert!(tool_b.execute(serde_json::json!({ "id": id })).await.is_err());
    }
}
