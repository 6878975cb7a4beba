//! LLM 输出解析
//!
//! 从回复文本中提取 JSON 块（```json 围栏或首尾大括号），解析为 Decision 或子智能体回复。
//! 子智能体回复若为 `{"tool": ..., "args": ...}` 则视为工具调用，否则为最终文本。

use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::orchestrator::Decision;

/// 提取文本中的 JSON 块：优先 ```json 围栏，其次首个 `{` 到末个 `}`
pub fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

/// 解析决策模型回复；失败为致命错误（循环无法继续）
pub fn parse_decision(output: &str) -> Result<Decision, AgentError> {
    let json_str = extract_json_block(output)
        .ok_or_else(|| AgentError::DecisionParseError("no JSON object found in reply".to_string()))?;
    serde_json::from_str(json_str)
        .map_err(|e| AgentError::DecisionParseError(format!("{}: {}", e, json_str)))
}

#[derive(Deserialize)]
struct ToolCallFormat {
    tool: String,
    #[serde(default)]
    args: Value,
}

/// 子智能体单步回复
#[derive(Clone, Debug)]
pub enum AgentReply {
    /// 最终文本输出
    Response(String),
    /// 需要执行工具
    ToolCall { tool: String, args: Value },
}

/// 解析子智能体输出：含有效 `{"tool": ...}` JSON 且 tool 非空则为 ToolCall，否则为 Response
pub fn parse_agent_reply(output: &str) -> AgentReply {
    let trimmed = output.trim();
    if let Some(json_str) = extract_json_block(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<ToolCallFormat>(json_str) {
            if !parsed.tool.is_empty() {
                return AgentReply::ToolCall {
                    tool: parsed.tool,
                    args: parsed.args,
                };
            }
        }
    }
    AgentReply::Response(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::DecisionStatus;

    #[test]
    fn test_parse_decision_plain_json() {
        let decision = parse_decision(
            r#"{"status": "continue", "agentName": "planning", "reasoning": "start"}"#,
        )
        .unwrap();
        assert_eq!(decision.status, DecisionStatus::Continue);
        assert_eq!(decision.agent_name.as_deref(), Some("planning"));
    }

    #[test]
    fn test_parse_decision_with_surrounding_text() {
        let decision = parse_decision(
            "Here is my decision:\n```json\n{\"status\": \"done\", \"reasoning\": \"all complete\"}\n```",
        )
        .unwrap();
        assert_eq!(decision.status, DecisionStatus::Done);
    }

    #[test]
    fn test_parse_decision_garbage_is_error() {
        assert!(parse_decision("I cannot decide right now").is_err());
        assert!(parse_decision("{broken").is_err());
    }

    #[test]
    fn test_agent_reply_tool_call() {
        let reply = parse_agent_reply(r#"{"tool": "search_internet", "args": {"query": "rust"}}"#);
        match reply {
            AgentReply::ToolCall { tool, args } => {
                assert_eq!(tool, "search_internet");
                assert_eq!(args["query"], "rust");
            }
            AgentReply::Response(_) => panic!("expected tool call"),
        }
    }

    #[test]
    fn test_agent_reply_plain_text() {
        let reply = parse_agent_reply("# Section One\n\nContent here.");
        assert!(matches!(reply, AgentReply::Response(_)));
    }

    #[test]
    fn test_agent_reply_json_without_tool_is_response() {
        let reply = parse_agent_reply(r#"{"sections": [{"title": "A"}]}"#);
        assert!(matches!(reply, AgentReply::Response(_)));
    }
}
