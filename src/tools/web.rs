//! Web 工具：搜索与网页内容抽取
//!
//! search_internet 调用 SearxNG 兼容端点（`?q=...&format=json`）返回结构化结果列表；
//! extract_webpage_content 抓取 URL 并用 html2text 提取可读文本，可配置域名白名单。
//! 响应超过 max_result_chars 时截断并追加 ...[truncated]。

use std::collections::HashSet;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SearchSection;
use crate::tools::Tool;

// 使用现代浏览器 UA，避免被站点识别为爬虫
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut prev_whitespace = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => {
                let is_whitespace = c.is_whitespace();
                if is_whitespace && prev_whitespace {
                    continue;
                }
                prev_whitespace = is_whitespace;
                out.push(if is_whitespace { ' ' } else { c });
            }
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 从 URL 中提取 host（不含端口与路径）
fn extract_domain(url: &str) -> Option<String> {
    let url = url.trim();
    let url = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://"))?;
    let host = url.split('/').next()?;
    let host = host.split(':').next()?;
    Some(host.to_lowercase())
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        s.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        s.to_string()
    }
}

fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: Option<String>,
}

/// 搜索工具：查询 SearxNG 兼容端点，返回 {"results": [{title, url, content}]} JSON
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    default_max_results: usize,
    max_result_chars: usize,
}

impl WebSearchTool {
    pub fn new(config: &SearchSection, default_max_results: usize) -> Self {
        Self {
            client: build_client(config.timeout_secs),
            endpoint: config.endpoint.clone(),
            default_max_results,
            max_result_chars: config.max_result_chars,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_internet"
    }

    fn description(&self) -> &str {
        "Execute a web search and return a list of results with title, url and content. Args: {\"query\": \"...\", \"maxResults\": 8 (optional)}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query to execute" },
                "maxResults": { "type": "integer", "description": "Maximum number of results" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        let max_results = args
            .get("maxResults")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.default_max_results);

        tracing::info!(query = %query, max_results, "search_internet");

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let parsed: SearxResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid search response: {}", e))?;

        // 每条结果的 content 单独截断，避免一条超长结果挤掉其余结果
        let per_result_chars = self.max_result_chars / max_results.max(1);
        let results: Vec<Value> = parsed
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(max_results)
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "content": r.content.map(|c| truncate_chars(&c, per_result_chars.max(200))),
                })
            })
            .collect();

        Ok(json!({ "results": results }).to_string())
    }
}

/// 网页内容抽取工具：抓取 URL，HTML 转可读文本；仅允许白名单域名（白名单为空则不限制）
pub struct ExtractWebpageTool {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl ExtractWebpageTool {
    pub fn new(config: &SearchSection) -> Self {
        Self {
            client: build_client(config.timeout_secs),
            allowed_domains: config
                .allowed_domains
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            max_result_chars: config.max_result_chars,
        }
    }

    fn is_allowed(&self, url: &str) -> Result<(), String> {
        let domain = extract_domain(url).ok_or_else(|| "Invalid or missing URL".to_string())?;
        if self.allowed_domains.is_empty() || self.allowed_domains.contains(&domain) {
            return Ok(());
        }
        Err(format!("Domain not in allowlist: {}", domain))
    }

    /// 将 HTML 转为可读文本（去除 script/style 等）
    fn html_to_text(&self, html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.is_allowed(url)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let mut body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;

        // 去除 BOM，避免 HTML 检测失败
        if body.starts_with('\u{FEFF}') {
            body = body[1..].to_string();
        }

        let body = if looks_like_html(&body) {
            self.html_to_text(&body)
        } else {
            body
        };

        Ok(truncate_chars(&body, self.max_result_chars))
    }
}

#[async_trait]
impl Tool for ExtractWebpageTool {
    fn name(&self) -> &str {
        "extract_webpage_content"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its readable text content. Args: {\"url\": \"https://...\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to fetch" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args.get("url").and_then(|v| v.as_str()).unwrap_or("").trim();
        if url.is_empty() {
            return Err("Missing url".to_string());
        }
        tracing::info!(url = %url, "extract_webpage_content");
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://en.wikipedia.org/wiki/Rust"),
            Some("en.wikipedia.org".to_string())
        );
        assert_eq!(
            extract_domain("http://example.com:8080/path"),
            Some("example.com".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
    }

    #[test]
    fn test_allowlist() {
        let config = SearchSection {
            allowed_domains: vec!["docs.rs".to_string()],
            ..SearchSection::default()
        };
        let tool = ExtractWebpageTool::new(&config);
        assert!(tool.is_allowed("https://docs.rs/tokio").is_ok());
        assert!(tool.is_allowed("https://evil.example.com").is_err());
    }

    #[test]
    fn test_strip_html_tags() {
        let html = "<html><body><p>Hello <b>world</b></p></body></html>";
        assert_eq!(strip_html_tags(html), "Hello world");
    }

    #[test]
    fn test_truncate_chars() {
        let long = "a".repeat(50);
        let out = truncate_chars(&long, 10);
        assert!(out.starts_with("aaaaaaaaaa"));
        assert!(out.ends_with("...[truncated]"));
    }
}
