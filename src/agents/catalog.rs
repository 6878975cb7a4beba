//! 智能体目录
//!
//! 编排器构造时由已知定义列表索引而成的只读映射；未知名字返回 None，由调用方按非致命错误处理。

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::AgentDefinition;

/// 只读目录：名称 → 定义；保留注册顺序用于生成决策 prompt 的 agents 列表
pub struct AgentCatalog {
    agents: HashMap<String, Arc<AgentDefinition>>,
    order: Vec<String>,
}

impl AgentCatalog {
    pub fn new(definitions: Vec<AgentDefinition>) -> Self {
        let mut agents = HashMap::new();
        let mut order = Vec::new();
        for def in definitions {
            order.push(def.name.clone());
            agents.insert(def.name.clone(), Arc::new(def));
        }
        Self { agents, order }
    }

    pub fn get(&self, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// 决策 prompt 用的 agents 列表：每个智能体一段（名称、描述、参数 schema）
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for name in &self.order {
            if let Some(agent) = self.agents.get(name) {
                out.push_str(&format!("- {}: {}\n", agent.name, agent.description));
                out.push_str(&format!("  parameters: {}\n", agent.parameters_json()));
            }
        }
        out
    }
}
