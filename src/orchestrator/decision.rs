//! 决策与反思类型
//!
//! Decision 是决策模型每轮迭代的结构化输出，即取即用，不持久化。
//! Reflection / ToolAbortion 累积在运行级状态中，渲染为下一轮决策的上下文。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

/// 决策状态：继续工作或收尾
#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Continue,
    Done,
}

/// 决策模型单轮输出
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// continue 继续派发，done 触发报告装配
    pub status: DecisionStatus,
    /// 下一步动作的人类可读描述
    #[serde(default)]
    pub next_action: Option<String>,
    /// 决策理由与当前进度说明
    #[serde(default)]
    pub reasoning: String,
    /// 要调用的研究智能体名：planning / search / analysis / writer / title / synthesis
    #[serde(default)]
    pub agent_name: Option<String>,
    /// 传给智能体的参数：JSON 字符串或对象，数组形式表示并行 fan-out；可含 _relevantMemory 字段
    #[serde(default)]
    pub agent_params_json: Option<Value>,
    /// status=done 时展示给用户的总结
    #[serde(default)]
    pub delivery_message: Option<String>,
    /// 预估剩余动作数（用于进度展示）
    #[serde(default)]
    pub estimated_remaining: Option<u32>,
}

impl Decision {
    /// 将 agentParamsJson 规整为参数对象列表：字符串先解析，数组展开，单对象包一层。
    /// 解析失败记日志并退回空参数对象，不中断运行。
    pub fn params_list(&self) -> Vec<Value> {
        let parsed = match &self.agent_params_json {
            None => Value::Object(Default::default()),
            Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to parse agentParamsJson, using empty params");
                Value::Object(Default::default())
            }),
            Some(v) => v.clone(),
        };
        match parsed {
            Value::Array(items) => items,
            other => vec![other],
        }
    }

    /// 事件与历史记录用的动作标签
    pub fn action_label(&self) -> String {
        self.next_action
            .clone()
            .or_else(|| self.agent_name.clone())
            .unwrap_or_else(|| "(unnamed action)".to_string())
    }
}

/// Decision 的 JSON Schema 字符串，注入决策 prompt 约束回复格式
pub fn decision_schema_json() -> String {
    let schema = schema_for!(Decision);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

/// 反思类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReflectionKind {
    Learning,
    Failure,
    Success,
}

/// 运行级反思：注入后续每轮决策上下文，从不写入记忆存储
#[derive(Clone, Debug)]
pub struct Reflection {
    pub kind: ReflectionKind,
    pub message: String,
}

/// 工具调用被外部闸门拒绝的记录
#[derive(Clone, Debug)]
pub struct ToolAbortion {
    pub tool: String,
    pub args: Value,
    pub reason: String,
}

/// 渲染反思上下文：先工具拒绝（附不要重试的明确指令），再一般性反思
pub fn build_reflection_context(abortions: &[ToolAbortion], reflections: &[Reflection]) -> String {
    if abortions.is_empty() && reflections.is_empty() {
        return String::new();
    }

    let mut context = String::new();

    if !abortions.is_empty() {
        let blocked = abortions
            .iter()
            .map(|abort| {
                format!(
                    "- Tool: {}\n  Params: {}\n  Reason: {}",
                    abort.tool, abort.args, abort.reason
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        context.push_str(&format!(
            r#"
IMPORTANT - Tool Abortions:
The user has blocked the following tool executions:
{blocked}

You have these options:
1. Skip actions that require these tools (if not critical)
2. Try alternative approach without those tools
3. If request cannot be fulfilled without these tools, return status="done" with deliveryMessage explaining the limitation

DO NOT retry the exact same tool - user already denied it.
"#
        ));
    }

    if !reflections.is_empty() {
        let listed = reflections
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r.message))
            .collect::<Vec<_>>()
            .join("\n");
        context.push_str(&format!(
            "{}\nPREVIOUS LEARNINGS & FEEDBACK:\n{listed}\n",
            if abortions.is_empty() { "" } else { "\n" }
        ));
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_list_single_object() {
        let decision = Decision {
            status: DecisionStatus::Continue,
            next_action: None,
            reasoning: String::new(),
            agent_name: Some("search".to_string()),
            agent_params_json: Some(serde_json::json!({"searchQuery": "q"})),
            delivery_message: None,
            estimated_remaining: None,
        };
        let list = decision.params_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["searchQuery"], "q");
    }

    #[test]
    fn test_params_list_array_fans_out() {
        let decision = Decision {
            status: DecisionStatus::Continue,
            next_action: None,
            reasoning: String::new(),
            agent_name: Some("search".to_string()),
            agent_params_json: Some(serde_json::json!([{"searchQuery": "a"}, {"searchQuery": "b"}])),
            delivery_message: None,
            estimated_remaining: None,
        };
        assert_eq!(decision.params_list().len(), 2);
    }

    #[test]
    fn test_params_list_json_string_form() {
        let decision = Decision {
            status: DecisionStatus::Continue,
            next_action: None,
            reasoning: String::new(),
            agent_name: Some("search".to_string()),
            agent_params_json: Some(Value::String(r#"[{"q":1},{"q":2},{"q":3}]"#.to_string())),
            delivery_message: None,
            estimated_remaining: None,
        };
        assert_eq!(decision.params_list().len(), 3);
    }

    #[test]
    fn test_params_list_malformed_string_falls_back_empty() {
        let decision = Decision {
            status: DecisionStatus::Continue,
            next_action: None,
            reasoning: String::new(),
            agent_name: Some("search".to_string()),
            agent_params_json: Some(Value::String("{not json".to_string())),
            delivery_message: None,
            estimated_remaining: None,
        };
        let list = decision.params_list();
        assert_eq!(list.len(), 1);
        assert!(list[0].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_reflection_context_rendering() {
        let abortions = vec![ToolAbortion {
            tool: "search_internet".to_string(),
            args: serde_json::json!({"query": "x"}),
            reason: "User denied".to_string(),
        }];
        let reflections = vec![Reflection {
            kind: ReflectionKind::Failure,
            message: "Quality check failed".to_string(),
        }];
        let context = build_reflection_context(&abortions, &reflections);
        assert!(context.contains("Tool Abortions"));
        assert!(context.contains("DO NOT retry the exact same tool"));
        assert!(context.contains("1. Quality check failed"));
        assert!(build_reflection_context(&[], &[]).is_empty());
    }

    #[test]
    fn test_decision_schema_lists_fields() {
        let schema = decision_schema_json();
        assert!(schema.contains("agentParamsJson"));
        assert!(schema.contains("deliveryMessage"));
    }
}
