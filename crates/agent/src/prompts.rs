//! Instruction templates: reply tone per language, scenario guidance,
//! vision rules and the structured-suggestion format.

use std::fmt;
use std::str::FromStr;

use feedreply_config::ReplyConfig;
use feedreply_core::reply::Language;
use serde::Serialize;

/// Conversation setting that shapes the tone of generated replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Interview,
    Social,
    Business,
    #[default]
    General,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Interview,
        Scenario::Social,
        Scenario::Business,
        Scenario::General,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Interview => "interview",
            Self::Social => "social",
            Self::Business => "business",
            Self::General => "general",
        }
    }

    /// Display name shown in the scenario catalogue.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Interview => "面试",
            Self::Social => "社交",
            Self::Business => "商务",
            Self::General => "日常",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Interview => "求职面试场景，提供专业建议",
            Self::Social => "社交场合，保持轻松友好",
            Self::Business => "商务沟通，专业高效",
            Self::General => "日常对话，自然真诚",
        }
    }

    /// Guidance lines appended to the instructions.
    pub fn guidance(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Interview, Language::Primary) => {
                "场景：面试\n- 突出个人优势和相关经验\n- 使用STAR法则（情境-任务-行动-结果）\n- 保持自信但不傲慢\n- 提问时展现对公司的了解"
            }
            (Self::Social, Language::Primary) => {
                "场景：社交场合\n- 保持轻松友好的语气\n- 展现真诚和兴趣\n- 适当使用幽默\n- 避免敏感话题"
            }
            (Self::Business, Language::Primary) => {
                "场景：商务沟通\n- 专业且高效\n- 突出价值和成果\n- 使用数据和事实\n- 保持礼貌和尊重"
            }
            (Self::General, Language::Primary) => {
                "场景：日常对话\n- 自然真诚\n- 根据对方语气调整\n- 保持友好开放"
            }
            (Self::Interview, Language::Secondary) => {
                "Scenario: job interview\n- Highlight strengths and relevant experience\n- Use the STAR method (situation, task, action, result)\n- Be confident, not arrogant\n- Show you know the company when asking questions"
            }
            (Self::Social, Language::Secondary) => {
                "Scenario: social setting\n- Keep it light and friendly\n- Show genuine interest\n- Use a little humour where it fits\n- Avoid sensitive topics"
            }
            (Self::Business, Language::Secondary) => {
                "Scenario: business conversation\n- Be professional and efficient\n- Focus on value and outcomes\n- Use facts and figures\n- Stay polite and respectful"
            }
            (Self::General, Language::Secondary) => {
                "Scenario: everyday chat\n- Be natural and sincere\n- Match the other person's tone\n- Stay friendly and open"
            }
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sc| sc.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown scenario '{s}'"))
    }
}

/// Scenario plus optional details about the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioContext {
    pub scenario: Scenario,
    pub user_background: Option<String>,
    pub conversation_goal: Option<String>,
}

impl ScenarioContext {
    pub fn from_config(config: &ReplyConfig) -> Self {
        Self {
            scenario: config.scenario.parse().unwrap_or_default(),
            user_background: config.user_background.clone(),
            conversation_goal: config.conversation_goal.clone(),
        }
    }

    fn append_details(&self, prompt: &mut String, language: Language) {
        let (background, goal) = match language {
            Language::Primary => ("用户背景：", "对话目标："),
            Language::Secondary => ("About the user: ", "Conversation goal: "),
        };
        if let Some(bg) = self.user_background.as_deref().filter(|s| !s.trim().is_empty()) {
            prompt.push_str("\n\n");
            prompt.push_str(background);
            prompt.push_str(bg.trim());
        }
        if let Some(goal_text) = self.conversation_goal.as_deref().filter(|s| !s.trim().is_empty()) {
            prompt.push('\n');
            prompt.push_str(goal);
            prompt.push_str(goal_text.trim());
        }
    }
}

const PRIMARY_REPLY_TEMPLATE: &str = "你是一个友好的对话助手。请用中文简洁、自然地回复。\n\
要求：\n\
- 1-2句话，简洁明了\n\
- 语气自然、不做作\n\
- 根据对方的话题继续对话\n\
- 全部用中文回复";

const SECONDARY_REPLY_TEMPLATE: &str = "You are a friendly conversation assistant. Reply concisely and naturally in English.\n\
Requirements:\n\
- 1-2 sentences, clear and concise\n\
- Natural tone, not artificial\n\
- Continue the conversation based on their topic\n\
- Reply entirely in English";

/// System instructions for a text reply.
pub fn reply_instructions(language: Language, context: &ScenarioContext) -> String {
    let mut prompt = String::from(match language {
        Language::Primary => PRIMARY_REPLY_TEMPLATE,
        Language::Secondary => SECONDARY_REPLY_TEMPLATE,
    });
    prompt.push_str("\n\n");
    prompt.push_str(context.scenario.guidance(language));
    context.append_details(&mut prompt, language);
    prompt
}

/// User turn wrapping the inbound message.
pub fn reply_user_content(language: Language, message: &str) -> String {
    match language {
        Language::Primary => format!("对方说：{message}\n\n请简洁回复："),
        Language::Secondary => format!("They said: {message}\n\nReply briefly:"),
    }
}

/// Fixed instructions for image entries.
pub const VISION_INSTRUCTIONS: &str = "You are answering an image someone sent in a chat.\n\
Rules:\n\
- If it is a multiple-choice question, reply with the letter of the correct option only.\n\
- If it needs a calculation, give brief steps and then the final answer.\n\
- Write all math in plain text, no LaTeX or markdown.\n\
- Keep it short. Reply in English unless asked otherwise.";

/// User turn for an image entry; the caption, if any, is passed along.
pub fn vision_user_content(caption: &str) -> String {
    let caption = caption.trim();
    if caption.is_empty() {
        "Answer the question in this image.".to_string()
    } else {
        format!("Answer the question in this image. The sender added: {caption}")
    }
}

const SUGGEST_BASE: &str = "你是一个专业的实时对话助手。你的任务是帮助用户在对话中给出合适的回答建议。\n\
\n\
核心原则：\n\
1. 回答要简洁、自然、不做作\n\
2. 根据场景调整语气和风格\n\
3. 提供1-3句话的建议，不要太长\n\
4. 考虑文化和社交礼仪\n\
5. 避免过于正式或学术化的表达\n\
\n\
输出格式（JSON）：\n\
{\n\
    \"suggestion\": \"建议的回答内容（1-3句话）\",\n\
    \"analysis\": \"对问题的简短分析（1句话）\",\n\
    \"tips\": [\"回答技巧1\", \"回答技巧2\"],\n\
    \"confidence\": 0.85\n\
}";

/// System instructions for a structured suggestion (JSON output).
pub fn suggest_instructions(context: &ScenarioContext) -> String {
    let mut prompt = String::from(SUGGEST_BASE);
    prompt.push_str("\n\n");
    prompt.push_str(context.scenario.guidance(Language::Primary));
    context.append_details(&mut prompt, Language::Primary);
    prompt
}

pub fn suggest_user_content(message: &str) -> String {
    format!("对方说：「{message}」\n\n请提供简洁、自然的回答建议。")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_parsing() {
        assert_eq!("Interview".parse::<Scenario>().unwrap(), Scenario::Interview);
        assert_eq!(" social ".parse::<Scenario>().unwrap(), Scenario::Social);
        assert!("dating".parse::<Scenario>().is_err());
    }

    #[test]
    fn primary_instructions_are_chinese_with_scenario() {
        let ctx = ScenarioContext {
            scenario: Scenario::Business,
            user_background: Some("5年Python开发经验".into()),
            conversation_goal: None,
        };
        let p = reply_instructions(Language::Primary, &ctx);
        assert!(p.starts_with("你是一个友好的对话助手"));
        assert!(p.contains("全部用中文回复"));
        assert!(p.contains("场景：商务沟通"));
        assert!(p.contains("用户背景：5年Python开发经验"));
        assert!(!p.contains("对话目标"));
    }

    #[test]
    fn secondary_instructions_are_english() {
        let p = reply_instructions(Language::Secondary, &ScenarioContext::default());
        assert!(p.contains("Reply entirely in English"));
        assert!(p.contains("Scenario: everyday chat"));
    }

    #[test]
    fn user_content_wraps_message() {
        assert_eq!(
            reply_user_content(Language::Primary, "你好"),
            "对方说：你好\n\n请简洁回复："
        );
        assert!(reply_user_content(Language::Secondary, "hey").contains("hey"));
    }

    #[test]
    fn vision_rules() {
        assert!(VISION_INSTRUCTIONS.contains("letter of the correct option only"));
        assert!(VISION_INSTRUCTIONS.contains("plain text"));
        assert!(vision_user_content("").ends_with("image."));
        assert!(vision_user_content("Q3").contains("Q3"));
    }

    #[test]
    fn suggest_prompt_asks_for_json() {
        let p = suggest_instructions(&ScenarioContext {
            scenario: Scenario::Interview,
            user_background: None,
            conversation_goal: Some("获得offer".into()),
        });
        assert!(p.contains("\"suggestion\""));
        assert!(p.contains("STAR"));
        assert!(p.contains("对话目标：获得offer"));
    }

    #[test]
    fn context_from_config_falls_back_to_general() {
        let cfg = ReplyConfig {
            scenario: "nonsense".into(),
            ..ReplyConfig::default()
        };
        assert_eq!(ScenarioContext::from_config(&cfg).scenario, Scenario::General);
    }
}
