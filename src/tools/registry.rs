//! 工具注册表
//!
//! 工具以两种显式能力形态注册：Single（一个工具一个实现）与 Multi（一个提供者暴露多个工具）。
//! 形态在注册时选定，调用侧统一通过 ToolHandle 执行，不做运行时结构探测。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 单工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 多工具提供者 trait：一个实现暴露多个具名工具
#[async_trait]
pub trait MultiTool: Send + Sync {
    /// (name, description) 列表
    fn tools(&self) -> Vec<(String, String)>;

    /// 按工具名执行
    async fn execute(&self, tool: &str, args: Value) -> Result<String, String>;
}

/// 可执行工具句柄：注册时确定的两种能力形态之一
#[derive(Clone)]
pub enum ToolHandle {
    Single(Arc<dyn Tool>),
    Multi {
        provider: Arc<dyn MultiTool>,
        name: String,
        description: String,
    },
}

impl ToolHandle {
    pub fn name(&self) -> &str {
        match self {
            ToolHandle::Single(tool) => tool.name(),
            ToolHandle::Multi { name, .. } => name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ToolHandle::Single(tool) => tool.description(),
            ToolHandle::Multi { description, .. } => description,
        }
    }

    pub async fn execute(&self, args: Value) -> Result<String, String> {
        match self {
            ToolHandle::Single(tool) => tool.execute(args).await,
            ToolHandle::Multi { provider, name, .. } => provider.execute(name, args).await,
        }
    }
}

/// 工具注册表：按名称存储 ToolHandle，支持 register / register_multi / get / tool_names
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolHandle>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册单工具
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, ToolHandle::Single(Arc::new(tool)));
    }

    /// 注册多工具提供者：其每个具名工具都成为独立可解析的条目
    pub fn register_multi(&mut self, provider: impl MultiTool + 'static) {
        let provider: Arc<dyn MultiTool> = Arc::new(provider);
        for (name, description) in provider.tools() {
            self.tools.insert(
                name.clone(),
                ToolHandle::Multi {
                    provider: provider.clone(),
                    name,
                    description,
                },
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<ToolHandle> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}
