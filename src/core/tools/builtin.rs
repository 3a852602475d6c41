//! Tools available to the interviewer.

use async_trait::async_trait;
use serde_json::json;

use super::base::{BlockingTool, JsonMap, ToolHandler, ToolResult, output, required_str};
use crate::core::upstream::FunctionDeclaration;

pub const GET_SCHOOL_INFO: &str = "get_school_info";
pub const TAKE_INTERVIEW_NOTES: &str = "take_interview_notes";

struct SchoolInsight {
    name: &'static str,
    focus: &'static str,
    values: &'static str,
    culture: &'static str,
}

const SCHOOL_INSIGHTS: &[SchoolInsight] = &[
    SchoolInsight {
        name: "harvard business school",
        focus: "leadership excellence, analytical thinking, and collaborative mindset",
        values: "excellence, integrity, respect, accountability, and service",
        culture: "case method learning, collaborative leadership development",
    },
    SchoolInsight {
        name: "stanford graduate school of business",
        focus: "entrepreneurial thinking, innovation, and social impact",
        values: "intellectual vitality, engaged community, personal leadership",
        culture: "innovation, risk-taking, social responsibility",
    },
    SchoolInsight {
        name: "wharton school",
        focus: "analytical rigor, quantitative skills, and global perspective",
        values: "knowledge for action, integrity, global citizenship",
        culture: "analytical excellence, finance leadership, team collaboration",
    },
];

const GENERAL_INSIGHT: &str =
    "General MBA insights: Focus on leadership, teamwork, and analytical thinking.";

/// Look up interview insights for a school by name (case-insensitive).
pub fn school_info(args: JsonMap) -> ToolResult<JsonMap> {
    let school_name = required_str(&args, "school_name")?.trim().to_lowercase();

    let text = SCHOOL_INSIGHTS
        .iter()
        .find(|insight| insight.name == school_name)
        .map(|insight| {
            format!(
                "School insights: focus: {}; values: {}; culture: {}",
                insight.focus, insight.values, insight.culture
            )
        })
        .unwrap_or_else(|| GENERAL_INSIGHT.to_string());

    Ok(output(text))
}

pub fn get_school_info() -> impl ToolHandler {
    BlockingTool::new(
        GET_SCHOOL_INFO,
        "Get information about a specific business school",
        json!({
            "type": "object",
            "properties": {
                "school_name": {
                    "type": "string",
                    "description": "The name of the business school to get information about"
                }
            },
            "required": ["school_name"]
        }),
        school_info,
    )
}

/// Records an observation about the candidate.
pub struct TakeInterviewNotes;

#[async_trait]
impl ToolHandler for TakeInterviewNotes {
    fn name(&self) -> &'static str {
        TAKE_INTERVIEW_NOTES
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: TAKE_INTERVIEW_NOTES.to_string(),
            description: "Take notes during the interview for evaluation purposes".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "observation": {
                        "type": "string",
                        "description": "Important observation or insight about the candidate's response"
                    }
                },
                "required": ["observation"]
            }),
        }
    }

    async fn execute(&self, args: JsonMap) -> ToolResult<JsonMap> {
        let observation = required_str(&args, "observation")?;
        tracing::info!(observation = %observation, "Interview note recorded");
        Ok(output(format!("Note recorded: {observation}")))
    }
}
