//! Text segmentation, validation and optimisation

use serde::{Deserialize, Serialize};

use super::client::{ChatMessage, ChatRequest, GenerationError, GenerationService, Result};
use crate::config::Limits;

pub const DEFAULT_SEGMENT_COUNT: usize = 3;

/// Optimised text shorter than this is rejected
pub const MIN_OPTIMIZED_CHARS: usize = 10;

const SEGMENT_SEPARATOR: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Cover,
    Content,
}

/// Segments produced for one text, cover first when the reply was structured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segmentation {
    pub segments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_types: Option<Vec<SegmentType>>,
}

#[derive(Deserialize)]
struct StructuredReply {
    cover: String,
    contents: Vec<String>,
}

fn segmentation_prompt(text: &str, segment_count: Option<usize>) -> String {
    let paragraphs = match segment_count {
        Some(count) => count.to_string(),
        None => "3-8".to_string(),
    };

    format!(
        "你是一个小红书内容专家，擅长将长文本拆分成吸引人的小红书笔记格式。\n\n\
         请将以下文本智能拆分为小红书笔记：\n\n\
         要求：\n\
         1. 提取一个吸引眼球的封面标题（20-50字），要有号召力和吸引力\n\
         2. 将剩余内容拆分为{paragraphs}个内容段落，每段50-200字\n\
         3. 每个段落要有明确的主题，内容连贯有重点\n\
         4. 适合小红书的风格，轻松活泼，容易阅读\n\
         5. 请确保JSON字符串中的特殊字符已正确转义\n\n\
         请严格按照以下JSON格式返回（只返回JSON对象，不要包含任何其他内容、解释或markdown标记）：\n\
         {{\n  \"cover\": \"封面标题文字\",\n  \"contents\": [\"第一段内容\", \"第二段内容\", \"第三段内容\"]\n}}\n\n\
         待拆分的文本：\n{text}"
    )
}

/// Ask the text model to split `text` into a cover and content segments
pub async fn segment_text(
    service: &dyn GenerationService,
    text: &str,
    segment_count: Option<usize>,
    custom_prompt: Option<&str>,
) -> Result<Segmentation> {
    let prompt = match custom_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(custom) => format!("{custom}\n\n{text}"),
        None => segmentation_prompt(text, segment_count),
    };

    let reply = service
        .complete(ChatRequest {
            messages: vec![ChatMessage::user(prompt)],
            temperature: 0.7,
            max_tokens: 2000,
        })
        .await?;

    parse_segmentation(&reply)
}

/// Interpret a segmentation reply: structured JSON first, `---` split otherwise
pub fn parse_segmentation(reply: &str) -> Result<Segmentation> {
    // A reply without a cover title is not treated as structured
    if let Some(structured) = extract_json(reply).filter(|r| !r.cover.trim().is_empty()) {
        let mut segments = Vec::with_capacity(structured.contents.len() + 1);
        let mut types = Vec::with_capacity(structured.contents.len() + 1);

        segments.push(structured.cover.trim().to_string());
        types.push(SegmentType::Cover);
        for content in structured.contents {
            segments.push(content.trim().to_string());
            types.push(SegmentType::Content);
        }

        return Ok(Segmentation {
            segments,
            segment_types: Some(types),
        });
    }

    let segments: Vec<String> = reply
        .split(SEGMENT_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        return Err(GenerationError::MalformedResponse(
            "segmentation reply contained no segments".to_string(),
        ));
    }

    Ok(Segmentation {
        segments,
        segment_types: None,
    })
}

/// Parse the outermost `{...}` of a reply, tolerating code fences and prose
fn extract_json(reply: &str) -> Option<StructuredReply> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

/// Local preview split into `count` roughly equal character chunks
pub fn preview_segments(text: &str, count: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let count = count.max(1);
    let chunk = chars.len().div_ceil(count).max(1);

    chars
        .chunks(chunk)
        .take(count)
        .map(|piece| piece.iter().collect::<String>().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub length: usize,
    pub words: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub stats: TextStats,
}

pub fn validate_text(text: &str, limits: &Limits) -> TextValidation {
    let length = text.chars().count();
    let mut issues = Vec::new();

    if text.trim().is_empty() {
        issues.push("Text must not be empty".to_string());
    } else {
        if length < limits.min_text_chars {
            issues.push(format!(
                "Text is too short, at least {} characters recommended",
                limits.min_text_chars
            ));
        }
        if length > limits.max_text_chars {
            issues.push(format!(
                "Text is too long, keep it within {} characters",
                limits.max_text_chars
            ));
        }
    }

    TextValidation {
        valid: issues.is_empty(),
        issues,
        stats: TextStats {
            length,
            words: text.split_whitespace().count(),
        },
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationKind {
    #[default]
    General,
    Engaging,
    Professional,
    Casual,
}

impl OptimizationKind {
    /// Unknown names map to [`OptimizationKind::General`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "engaging" => Self::Engaging,
            "professional" => Self::Professional,
            "casual" => Self::Casual,
            _ => Self::General,
        }
    }

    fn requirements(self) -> &'static str {
        match self {
            Self::General => {
                "请优化以下文本，使其更适合小红书平台发布。要求：\n\
                 1. 保持原意不变\n2. 语言更生动有趣\n3. 适当添加表情符号\n\
                 4. 增强可读性和吸引力\n5. 符合小红书用户的阅读习惯"
            }
            Self::Engaging => {
                "请将以下文本改写得更有吸引力和互动性。要求：\n\
                 1. 增加情感色彩\n2. 使用更多感叹号和疑问句\n3. 添加适当的表情符号\n\
                 4. 让读者产生共鸣\n5. 鼓励互动和评论"
            }
            Self::Professional => {
                "请将以下文本优化为更专业的表达方式。要求：\n\
                 1. 语言准确严谨\n2. 逻辑清晰\n3. 去除冗余表达\n4. 增强说服力\n5. 保持简洁明了"
            }
            Self::Casual => {
                "请将以下文本改写得更轻松随意。要求：\n\
                 1. 使用口语化表达\n2. 增加亲和力\n3. 适当使用网络流行语\n\
                 4. 让文字更有温度\n5. 贴近年轻用户"
            }
        }
    }
}

pub async fn optimize_text(
    service: &dyn GenerationService,
    text: &str,
    kind: OptimizationKind,
) -> Result<String> {
    let prompt = format!(
        "{}\n\n原文本：{text}\n\n请直接返回优化后的文本，不要添加任何解释。",
        kind.requirements()
    );

    let reply = service
        .complete(ChatRequest {
            messages: vec![
                ChatMessage::system("你是一个专业的文案优化助手，擅长为社交媒体平台优化文本内容。"),
                ChatMessage::user(prompt),
            ],
            temperature: 0.7,
            max_tokens: 1000,
        })
        .await?;

    let optimized = reply.trim();
    if optimized.chars().count() < MIN_OPTIMIZED_CHARS {
        return Err(GenerationError::MalformedResponse(
            "optimised text is too short".to_string(),
        ));
    }

    Ok(optimized.to_string())
}
