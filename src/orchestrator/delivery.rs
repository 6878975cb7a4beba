//! 报告装配
//!
//! 终止时从记忆中按语义角色取出各组件，组合为最终 markdown 文档：
//! 标题、执行摘要、按 sectionNumber 升序的章节（分隔线隔开）、结论、去重后的来源列表。
//! 章节排序显式依赖 sectionNumber 而非完成顺序（fan-out 内无完成顺序保证）。

use serde_json::Value;

use crate::memory::{ComponentType, SearchResultItem, StoreItem};
use crate::orchestrator::parse::extract_json_block;

const DEFAULT_TITLE: &str = "Research Report";

/// 装配完成的最终报告
#[derive(Clone, Debug)]
pub struct ResearchReport {
    pub title: String,
    pub content: String,
}

fn component_type(item: &StoreItem) -> Option<ComponentType> {
    item.extra.component_type
}

/// title 条目优先按 {"title": ...} JSON 解析，否则取正文原样；缺失时用固定默认值
fn extract_title(items: &[(String, StoreItem)]) -> String {
    let Some((_, item)) = items
        .iter()
        .find(|(_, i)| component_type(i) == Some(ComponentType::Title))
    else {
        return DEFAULT_TITLE.to_string();
    };
    if let Some(json_str) = extract_json_block(&item.body) {
        if let Ok(parsed) = serde_json::from_str::<Value>(json_str) {
            if let Some(title) = parsed.get("title").and_then(|v| v.as_str()) {
                if !title.trim().is_empty() {
                    return title.trim().to_string();
                }
            }
        }
    }
    let verbatim = item.body.trim();
    if verbatim.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        verbatim.to_string()
    }
}

fn find_body(items: &[(String, StoreItem)], kind: ComponentType) -> String {
    items
        .iter()
        .find(|(_, i)| component_type(i) == Some(kind))
        .map(|(_, i)| i.body.clone())
        .unwrap_or_default()
}

/// 去重键：去掉 URL 尾部的 highlight 片段（#:~:text=...）
fn clean_source_url(url: &str) -> String {
    url.split("#:~:text=").next().unwrap_or(url).to_string()
}

/// markdown 链接中的括号转义
fn escape_markdown_url(url: &str) -> String {
    url.replace('(', "%28").replace(')', "%29")
}

/// 来源去重：按清洗后的 URL，首见者保留
fn dedup_sources(results: Vec<SearchResultItem>) -> Vec<SearchResultItem> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for mut result in results {
        if result.url.is_empty() {
            continue;
        }
        result.url = clean_source_url(&result.url);
        if seen.insert(result.url.clone()) {
            unique.push(result);
        }
    }
    unique
}

/// 从分区条目装配最终报告
pub fn assemble_report(items: &[(String, StoreItem)]) -> ResearchReport {
    let title = extract_title(items);
    let exec_summary = find_body(items, ComponentType::ExecSummary);
    let conclusion = find_body(items, ComponentType::Conclusion);

    let mut sections: Vec<&StoreItem> = items
        .iter()
        .filter(|(_, i)| component_type(i) == Some(ComponentType::Section))
        .map(|(_, i)| i)
        .collect();
    // 缺失的 sectionNumber 按 0 排序
    sections.sort_by_key(|i| i.extra.section_number.unwrap_or(0));

    let search_results: Vec<SearchResultItem> = items
        .iter()
        .filter(|(_, i)| component_type(i) == Some(ComponentType::SearchResults))
        .flat_map(|(_, i)| i.extra.search_results.clone().unwrap_or_default())
        .collect();
    let sources = dedup_sources(search_results);

    let mut content = format!("# {}", title);

    if !exec_summary.is_empty() {
        content.push_str(&format!("\n\n{}", exec_summary));
    }

    for section in &sections {
        content.push_str(&format!("\n\n---\n\n{}", section.body));
    }

    if !conclusion.is_empty() {
        content.push_str(&format!("\n\n---\n\n{}", conclusion));
    }

    if !sources.is_empty() {
        content.push_str("\n\n---\n\n### Sources:\n");
        for source in &sources {
            content.push_str(&format!(
                "- [{}]({})\n",
                source.title,
                escape_markdown_url(&source.url)
            ));
        }
    }

    ResearchReport { title, content }
}
