//! 质量评审
//!
//! 在产物入库前，可选一次轻量 LLM 调用判断「是否达到要求」：fail 则不入库，
//! 反馈以 failure Reflection 留给下一轮决策。评审调用自身失败时放行产物（就地吸收，
//! 不升级为运行错误）。
//!
//! 通过配置可以：
//! - 评审全部产物（all）
//! - 仅评审交付物（deliverable：section / title / exec_summary / conclusion）
//! - 关闭评审（none）

use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::llm::{LlmClient, Message};
use crate::orchestrator::parse::extract_json_block;

/// 评审模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualityMode {
    All,
    Deliverable,
    None,
}

impl FromStr for QualityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(QualityMode::All),
            "deliverable" => Ok(QualityMode::Deliverable),
            "none" => Ok(QualityMode::None),
            other => Err(format!("unknown quality review mode: {other}")),
        }
    }
}

/// 评审结论
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityVerdict {
    Pass,
    Fail,
}

/// 一次评审的结果
#[derive(Clone, Debug, Deserialize)]
pub struct Evaluation {
    pub quality: QualityVerdict,
    #[serde(default)]
    pub feedback: String,
}

const REVIEW_INSTRUCTIONS: &str = r#"You are a quality reviewer for research work products.

Given the action that was requested, the prompt that was used and the output that was produced, judge whether the output adequately fulfills the request. Minor style issues are acceptable; fail only outputs that are off-topic, empty of substance, malformed for their stated format, or clearly incomplete.

Your reply must be a single JSON object with no markdown formatting or additional text:

{"quality": "pass" | "fail", "feedback": "one or two sentences explaining the verdict"}"#;

/// 质量评审器：持有 LLM，evaluate(action, prompt, output) 返回 pass/fail 与反馈
pub struct QualityReviewer {
    llm: Arc<dyn LlmClient>,
}

impl QualityReviewer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn evaluate(
        &self,
        action: &str,
        prompt: &str,
        output: &str,
    ) -> Result<Evaluation, String> {
        let user = format!(
            "Action: {}\n\nPrompt used:\n{}\n\nOutput produced:\n{}",
            action, prompt, output
        );
        let messages = vec![Message::system(REVIEW_INSTRUCTIONS), Message::user(user)];
        let response = self.llm.complete(&messages).await?;

        let json_str = extract_json_block(&response)
            .ok_or_else(|| format!("no JSON verdict in review reply: {response}"))?;
        serde_json::from_str(json_str).map_err(|e| format!("invalid review verdict: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    #[test]
    fn test_mode_from_str() {
        assert_eq!(QualityMode::from_str("all").unwrap(), QualityMode::All);
        assert_eq!(
            QualityMode::from_str("Deliverable").unwrap(),
            QualityMode::Deliverable
        );
        assert_eq!(QualityMode::from_str("none").unwrap(), QualityMode::None);
        assert!(QualityMode::from_str("sometimes").is_err());
    }

    #[tokio::test]
    async fn test_evaluate_pass_and_fail() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            r#"{"quality": "pass", "feedback": "Good"}"#,
            r#"{"quality": "fail", "feedback": "Off-topic"}"#,
        ]));
        let reviewer = QualityReviewer::new(llm);

        let first = reviewer.evaluate("Write section", "p", "o").await.unwrap();
        assert_eq!(first.quality, QualityVerdict::Pass);

        let second = reviewer.evaluate("Write section", "p", "o").await.unwrap();
        assert_eq!(second.quality, QualityVerdict::Fail);
        assert_eq!(second.feedback, "Off-topic");
    }

    #[tokio::test]
    async fn test_evaluate_unparseable_is_error() {
        let llm = Arc::new(ScriptedLlmClient::new(vec!["looks fine to me"]));
        let reviewer = QualityReviewer::new(llm);
        assert!(reviewer.evaluate("a", "p", "o").await.is_err());
    }
}
