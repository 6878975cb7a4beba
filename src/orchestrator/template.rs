//! Prompt 模板渲染
//!
//! 仅做 `{{key}}` 精确匹配替换，无转义、无条件逻辑；下游 prompt 文本对字面格式敏感，
//! 不引入模板引擎。

use serde_json::Value;

/// 用参数对象渲染模板：对象值序列化为紧凑 JSON，字符串值原样替换
pub fn render_template(template: &str, params: &Value) -> String {
    let mut out = template.to_string();
    if let Some(map) = params.as_object() {
        for (key, value) in map {
            let needle = format!("{{{{{}}}}}", key);
            let replacement = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&needle, &replacement);
        }
    }
    out
}

/// 用字符串键值对渲染模板（决策 prompt 的上下文装配）
pub fn render_pairs(template: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in pairs {
        let needle = format!("{{{{{}}}}}", key);
        out = out.replace(&needle, value);
    }
    out
}

const NO_MARKDOWN_DIRECTIVE: &str =
    "Provide your response as plain text without any markdown formatting.";

/// 组装 system 指令：非交付物内容追加去 markdown 指令
pub fn system_instructions(instructions: &str, no_markdown: bool) -> String {
    if no_markdown {
        format!("{}\n\n{}", instructions, NO_MARKDOWN_DIRECTIVE)
    } else {
        instructions.to_string()
    }
}
