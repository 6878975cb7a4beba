//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! MockLlmClient：对决策 prompt 返回 done 决策，其余回显最后一条 User 消息，便于本地跑通循环。
//! ScriptedLlmClient：按预置脚本依次返回回复，供单元与集成测试编排确定性的运行序列。

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：决策 prompt 直接收尾，其余回显用户输入
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        if last_user.contains("Decide which research agent to invoke next") {
            return Ok(
                r#"{"status": "done", "reasoning": "Mock run, nothing to orchestrate.", "deliveryMessage": "Mock LLM produced no research content."}"#
                    .to_string(),
            );
        }

        Ok(format!("Echo from Mock: {}", last_user))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<Pin<Box<dyn futures_util::Stream<Item = Result<String, String>> + Send>>, String>
    {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }
}

/// 脚本化客户端：每次 complete 弹出队首回复；脚本耗尽后返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
        }
    }

    /// 追加一条脚本回复
    pub fn push(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| "Scripted responses exhausted".to_string())
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<Pin<Box<dyn futures_util::Stream<Item = Result<String, String>> + Send>>, String>
    {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }
}
