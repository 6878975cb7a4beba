//! 内置研究智能体定义与决策智能体
//!
//! planning / search / analysis / writer / title / synthesis 六个子智能体，
//! 加上驱动主循环的决策智能体。指令文本即运行时数据，对字面格式敏感，勿随意重排。

use serde_json::Value;

use crate::agents::{AgentDefinition, AgentParameter, AgentStep};
use crate::memory::ComponentType;

/// 根据智能体名与参数推断产物的语义角色
pub fn component_type_for(agent_name: &str, params: &Value) -> Option<ComponentType> {
    match agent_name {
        "planning" => Some(ComponentType::Plan),
        "search" => Some(ComponentType::SearchResults),
        "analysis" => Some(ComponentType::Learnings),
        "writer" => Some(ComponentType::Section),
        "title" => Some(ComponentType::Title),
        "synthesis" => {
            if params.get("outputType").and_then(|v| v.as_str()) == Some("conclusion") {
                Some(ComponentType::Conclusion)
            } else {
                Some(ComponentType::ExecSummary)
            }
        }
        _ => None,
    }
}

fn planning_agent() -> AgentDefinition {
    AgentDefinition {
        name: "planning".to_string(),
        description: "Strategic research planner specialized in query decomposition and research methodology design. Creates comprehensive research strategies and identifies optimal information gathering approaches.".to_string(),
        parameters: vec![
            AgentParameter::new("userQuery", "string", "The original user research query", true),
            AgentParameter::new("numSections", "integer", "The number of sections to create for the research report", false)
                .with_default(Value::from(3)),
            AgentParameter::new("numQueriesPerSection", "integer", "The number of search queries to generate for each section", true),
        ],
        instructions: r#"You are a planning agent, the strategic planner for deep research investigations.

Given a user research query, your goal is to identify the different sections of the final report. The number of sections will be provided by the user. You have a tolerance of plus or minus 1 section depending on how you interpret the topic and evaluate its complexity.

For each section you will provide:
- the title of the section
- a detailed description of the section's objective
- search queries that will be used to gather information for that section. The number of queries will be provided by the user, but you should aim for a minimum of 1 query per section. If you feel this section requires more queries, you can add them, up to one more query than the user requested.

Do not execute any searches or analysis, just plan the structure of the research report. The search_internet tool is made available to you to help you understand the topic and create relevant sections and search queries.

Your output will ONLY consist of the list of sections as a JSON object with no markdown formatting or additional text. The JSON object should have the following structure:

{
  "sections": [
    {
      "title": "Section Title",
      "description": "Detailed description of the section's objective",
      "queries": [
        "Search query 1",
        "Search query 2"
      ]
    }
  ]
}
"#.to_string(),
        steps: vec![AgentStep {
            prompt: "Plan the research report structure for the following query: {{userQuery}}. Aim for {{numSections}} sections, with {{numQueriesPerSection}} search queries per section.".to_string(),
            tools: vec!["search_internet".to_string()],
        }],
    }
}

fn search_agent() -> AgentDefinition {
    AgentDefinition {
        name: "search".to_string(),
        description: "Expert information retrieval specialist optimized for comprehensive web search and content extraction".to_string(),
        parameters: vec![
            AgentParameter::new("searchQuery", "string", "Specific search query to execute", true),
            AgentParameter::new("maxResults", "integer", "Maximum number of search results to return", false),
        ],
        instructions: r#"You are a search agent, responsible for executing targeted web searches and extracting relevant content.

Your sole responsibility is to run the search_internet tool with the provided search query and extract relevant content from the results.

Do not summarize or analyze the content, just return the raw search results and extracted content.

Remove all <tool> tags from the content and return it as plain text."#.to_string(),
        steps: vec![AgentStep {
            prompt: "Execute targeted search for: {{searchQuery}}".to_string(),
            tools: vec![
                "search_internet".to_string(),
                "extract_webpage_content".to_string(),
            ],
        }],
    }
}

fn analysis_agent() -> AgentDefinition {
    AgentDefinition {
        name: "analysis".to_string(),
        description: "Advanced information processor specialized in extracting insights, identifying patterns, and synthesizing knowledge from raw research data. Performs critical analysis and fact verification.".to_string(),
        parameters: vec![
            AgentParameter::new("sectionObjective", "string", "The objective of the section being analyzed", true),
            AgentParameter::new("rawInformation", "string", "Information to be analyzed", true),
        ],
        instructions: r#"You are an analyst agent, responsible for processing raw research data and extracting meaningful insights.

From the content provided, your task is to identify 5 to 10 key learnings that are relevant to the section objective.

Your output will ONLY consist of the list of learnings as a JSON object with no markdown formatting or additional text. The JSON object should have the following structure:

{
  "learnings": [
    "learning 1",
    "learning 2",
    "learning n"
  ]
}
"#.to_string(),
        steps: vec![AgentStep {
            prompt: "Analyze the following information for the section:\n- Section Objective: {{sectionObjective}}\n- Raw Information: {{rawInformation}}\n".to_string(),
            tools: vec!["extract_webpage_content".to_string()],
        }],
    }
}

fn writer_agent() -> AgentDefinition {
    AgentDefinition {
        name: "writer".to_string(),
        description: "Section generator that creates detailed, coherent sections of research reports based on analyzed information and section objectives. Ensures each section is well-structured and contributes to the overall narrative.".to_string(),
        parameters: vec![
            AgentParameter::new("sectionNumber", "number", "The index of the section being generated", true),
            AgentParameter::new("sectionTitle", "string", "The title of the section being generated", true),
            AgentParameter::new("sectionObjective", "string", "The objective of the section being generated", true),
            AgentParameter::new("keyLearnings", "string", "The key learnings that have been extracted for this section", true),
        ],
        instructions: r#"You are a writer agent, responsible for generating detailed sections of research reports based on analyzed information and section objectives.

Your task is to ensure each section is well-structured and contributes to the overall narrative of the report.

The text generated is part of a larger research report, so do not include any introductory or concluding remarks, just the content of the section.

Start your response with the section title as a 1st level header (#) and build the section content after it. Make sure you use the section objective to guide the content you generate.

You can use markdown formatting to structure the section, such as headings, lists, and code blocks: make sure all subsequent headings are 2nd level headers (##) or lower. Do not include too many level 2 headings: 3 to 5 should be enough. Group concepts if needed so that each level 2 content is meaty enough."#.to_string(),
        steps: vec![AgentStep {
            prompt: "Generate a detailed section based on the following information:\nSection Number: {{sectionNumber}}\nSection Title: {{sectionTitle}}\nSection Objective: {{sectionObjective}}\nKey Learnings: {{keyLearnings}}".to_string(),
            tools: vec![],
        }],
    }
}

fn title_agent() -> AgentDefinition {
    AgentDefinition {
        name: "title".to_string(),
        description: "Report title generator that produces a concise, descriptive title for the final research report based on the topic and key learnings.".to_string(),
        parameters: vec![
            AgentParameter::new("researchTopic", "string", "The topic of the research", true),
            AgentParameter::new("keyLearnings", "string", "The key learnings that have been extracted from the analysis", true),
        ],
        instructions: r#"You are a title agent, responsible for generating the title of a research report.

Given the research topic and the key learnings, produce a single concise title that captures the essence of the report. Do not exceed 12 words.

Your output will ONLY consist of a JSON object with no markdown formatting or additional text. The JSON object should have the following structure:

{
  "title": "Report Title"
}
"#.to_string(),
        steps: vec![AgentStep {
            prompt: "Generate a title for the research report:\n\nResearch Topic: {{researchTopic}}\nKey Learnings: {{keyLearnings}}".to_string(),
            tools: vec![],
        }],
    }
}

fn synthesis_agent() -> AgentDefinition {
    AgentDefinition {
        name: "synthesis".to_string(),
        description: "Expert report synthesizer that transforms analyzed information into comprehensive, coherent reports. Integrates findings, constructs narratives, and generates executive summaries or conclusions.".to_string(),
        parameters: vec![
            AgentParameter::new("researchTopic", "string", "The topic of the research", true),
            AgentParameter::new("keyLearnings", "string", "The key learnings that have been extracted from the analysis", true),
            AgentParameter::new("outputType", "string", "The format of the output desired", true)
                .with_enum(&["executive_summary", "conclusion"]),
        ],
        instructions: r##"You are a synthesis agent, responsible for summarizing information for executive summaries or conclusions.

Your task is to synthesize the provided section contents into a comprehensive executive summary or conclusion based on the user request: do not generate both.

When generating the executive summary, focus on the key findings and insights from the research sections, ensuring it provides a clear overview of the research conducted. Make sure it is in a TL;DR format (but do not say it is a TL;DR) so it can be easily digested: one or two paragraphs with 3 to 5 key learnings. Do not include a conclusion in the executive summary, just the key findings and insights.

When generating the conclusion, summarize the overall findings and implications of the research, providing a final perspective on the topic. Keep it also concise, but ensure it encapsulates the essence of the research and its significance.

Start your content with "# Executive Summary" or "# Conclusion" as appropriate, and then provide the content of the summary or conclusion. Don't say things like "I'll synthesize" or "I'll summarize" or "This is the executive summary" or "This is the conclusion". Just provide the content directly."##.to_string(),
        steps: vec![AgentStep {
            prompt: "Synthesize research findings into a comprehensive report:\n\nResearch Topic: {{researchTopic}}\nKey Learnings: {{keyLearnings}}\nOutput Type: {{outputType}}".to_string(),
            tools: vec![],
        }],
    }
}

/// 全部内置研究智能体（目录注册顺序即决策 prompt 中的展示顺序）
pub fn research_agents() -> Vec<AgentDefinition> {
    vec![
        planning_agent(),
        search_agent(),
        analysis_agent(),
        writer_agent(),
        title_agent(),
        synthesis_agent(),
    ]
}

/// 决策智能体：每轮迭代审视记忆与历史，产出下一步 Decision
///
/// instructions 占位符：{{agentsList}} / {{numSections}} / {{numQueriesPerSection}} / {{maxSearchResults}}
/// step prompt 占位符：{{userRequest}} / {{researchPlan}} / {{iterationHistory}} / {{memoryList}} / {{previousReflections}}
pub fn decision_agent() -> AgentDefinition {
    AgentDefinition {
        name: "research_decision_loop".to_string(),
        description: "Strategic research coordinator that orchestrates research agents".to_string(),
        parameters: vec![
            AgentParameter::new("userRequest", "string", "The user research request to fulfill", true),
            AgentParameter::new("memoryList", "string", "List of items currently in memory", true),
            AgentParameter::new("previousReflections", "string", "Previous reflections or evaluations", false),
        ],
        instructions: r#"You are a strategic research coordinator using the ReAct pattern (Reasoning + Acting).

CRITICAL: You DO NOT execute research yourself. You only DECIDE which research agent to invoke next.

Your ONLY job is to review the current state and make decisions in JSON format.

Your responsibilities:
1. Understand the user's research goal
2. Review what research has been accomplished (check memory)
3. Decide which research agent to call next
4. Identify which memory items are relevant for this action
5. Recognize when the research is complete

Available research agents:
{{agentsList}}

Research configuration:
- Target number of sections: {{numSections}}
- Search queries per section: {{numQueriesPerSection}}
- Search results per query: {{maxSearchResults}}

Use these values when calling the planning agent (numSections, numQueriesPerSection) and search agent (maxResults).

Typical research workflow (inferred from memory state):
1. If no plan exists → call "planning" agent
2. If plan exists but no search results → call "search" agent for queries
3. If search results exist but no key learnings → call "analysis" agent
4. If key learnings exist but no section content → call "writer" agent
5. If all sections done but no exec summary → call "synthesis" agent for executive_summary
6. If exec summary exists but no conclusion → call "synthesis" agent for conclusion
7. If all content ready but no title → call "title" agent
8. If everything complete → status="done"

Decision rules:
- If research is COMPLETE: return status "done" with deliveryMessage
- If more work needed: return status "continue" with nextAction, agentName, and agentParamsJson
- For PARALLEL EXECUTION: Use array in agentParamsJson
  - Each param object can include "_relevantMemory" field with memory IDs for that task
  - Example: [{"searchQuery":"q1","maxResults":8,"_relevantMemory":["plan-id"]}, {"searchQuery":"q2","maxResults":8,"_relevantMemory":["plan-id"]}]
  - Tasks execute concurrently (3x+ faster)
- For SINGLE TASK: Include "_relevantMemory" in the param object
  - Example: {"searchQuery":"q1","maxResults":8,"_relevantMemory":["plan-id","search-id"]}
- Be strategic: infer research state from memory contents
- Don't repeat work that's already in memory
- Estimate remaining actions if possible (helps with progress tracking)

CRITICAL - Using _relevantMemory (Be Selective):
- The original user request is stored in memory as "User Request (Full Details)"
- ONLY include memory IDs when the agent TRULY needs that specific content
- Don't include memory items "just in case"
- Each task's params should have its own "_relevantMemory" array

Your reply must be a single JSON object conforming to this schema:
{{decisionSchema}}
"#.to_string(),
        steps: vec![AgentStep {
            prompt: r#"User research request: {{userRequest}}

{{researchPlan}}

Previous iterations:
{{iterationHistory}}

Memory (completed work):
{{memoryList}}

{{previousReflections}}

Decide which research agent to invoke next to fulfill this research request."#.to_string(),
            tools: vec![],
        }],
    }
}
