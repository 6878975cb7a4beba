//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

fn default_request_timeout() -> u64 {
    60
}

/// [orchestrator] 段：决策循环与子智能体执行的上限与模式
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 决策循环迭代上限（到达后按部分成功结束）
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 一次 fan-out 内同时运行的子智能体上限
    #[serde(default = "default_max_parallel_execution")]
    pub max_parallel_execution: usize,
    /// 质量评审模式：all / deliverable / none
    #[serde(default = "default_quality_review")]
    pub quality_review: String,
    /// 报告目标章节数（breadth）
    #[serde(default = "default_num_sections")]
    pub num_sections: usize,
    /// 每章节搜索查询数（depth）
    #[serde(default = "default_num_queries_per_section")]
    pub num_queries_per_section: usize,
    /// 每次查询返回的最大搜索结果数
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

fn default_max_iterations() -> usize {
    30
}

fn default_max_parallel_execution() -> usize {
    3
}

fn default_quality_review() -> String {
    "deliverable".to_string()
}

fn default_num_sections() -> usize {
    3
}

fn default_num_queries_per_section() -> usize {
    2
}

fn default_max_search_results() -> usize {
    8
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_parallel_execution: default_max_parallel_execution(),
            quality_review: default_quality_review(),
            num_sections: default_num_sections(),
            num_queries_per_section: default_num_queries_per_section(),
            max_search_results: default_max_search_results(),
        }
    }
}

/// [tools] 段：工具超时与 Web 搜索配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub search: SearchSection,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [tools.search] 段：搜索端点、抓取超时、结果大小与域名白名单
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// SearxNG 兼容搜索端点（`?q=...&format=json`）
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
    /// extract_webpage_content 允许抓取的域名；为空表示不限制
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

fn default_search_endpoint() -> String {
    "https://searx.be/search".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    8000
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            timeout_secs: default_search_timeout_secs(),
            max_result_chars: default_max_result_chars(),
            allowed_domains: Vec::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            orchestrator: OrchestratorSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
