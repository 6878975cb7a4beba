//! 子智能体定义
//!
//! 一个定义 = 名称 + 描述 + 参数 schema + 指令 + 步骤（prompt 模板与工具 id 列表）。
//! 进程启动后只读，所有运行共享。

use serde::Serialize;
use serde_json::Value;

/// 参数 schema 条目（供决策模型理解如何调用该智能体）
#[derive(Clone, Debug, Serialize)]
pub struct AgentParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl AgentParameter {
    pub fn new(name: &str, kind: &str, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
            required,
            default: None,
            enum_values: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|s| s.to_string()).collect());
        self
    }
}

/// 单个执行步骤：prompt 模板（`{{key}}` 占位）与声明的工具 id
#[derive(Clone, Debug)]
pub struct AgentStep {
    pub prompt: String,
    pub tools: Vec<String>,
}

/// 子智能体定义（构造后不可变）
#[derive(Clone, Debug)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<AgentParameter>,
    pub instructions: String,
    pub steps: Vec<AgentStep>,
}

impl AgentDefinition {
    /// 参数 schema 的紧凑 JSON 形式，用于决策 prompt 的 agents 列表
    pub fn parameters_json(&self) -> String {
        serde_json::to_string(&self.parameters).unwrap_or_else(|_| "[]".to_string())
    }
}
