//! Image prompt construction for note cards

/// Characters of the segment quoted at the end of the prompt
pub const SEGMENT_EXCERPT_CHARS: usize = 100;

const BASE_STYLE: &str = "小红书风格，高质量摄影，自然光线，清新明亮，构图美观";

const GENERIC_SCENE: &str = "生活场景，温馨自然，美好瞬间";

/// Keyword → scene description. Order matters: the first match wins.
const SCENES: &[(&str, &str)] = &[
    ("咖啡", "咖啡店场景，温馨氛围，咖啡杯特写"),
    ("美食", "美食摄影，诱人色彩，精致摆盘"),
    ("旅行", "旅行风景，自然美景，人文景观"),
    ("穿搭", "时尚穿搭，街拍风格，自然姿态"),
    ("护肤", "护肤产品，简约背景，柔和光线"),
    ("健身", "运动场景，活力四射，健康生活"),
    ("学习", "学习场景，书桌整洁，文艺氛围"),
    ("生活", "日常生活，温馨家居，生活美学"),
];

/// Visual treatment selected by a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateStyle {
    Minimalist,
    Vintage,
    Bright,
    Soft,
    Default,
}

impl TemplateStyle {
    /// Unknown names map to [`TemplateStyle::Default`]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "minimalist" => Self::Minimalist,
            "vintage" => Self::Vintage,
            "bright" => Self::Bright,
            "soft" => Self::Soft,
            _ => Self::Default,
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Minimalist => "极简风格，留白设计，简洁构图",
            Self::Vintage => "复古滤镜，暖色调，胶片质感",
            Self::Bright => "明亮色彩，高饱和度，活力四射",
            Self::Soft => "柔和色调，温暖光线，治愈系",
            Self::Default => "自然色彩，平衡构图，真实质感",
        }
    }
}

fn scene_for(segment: &str) -> &'static str {
    SCENES
        .iter()
        .find(|(keyword, _)| segment.contains(keyword))
        .map(|(_, scene)| *scene)
        .unwrap_or(GENERIC_SCENE)
}

/// Build the image prompt for one segment
pub fn build_image_prompt(segment: &str, style: TemplateStyle) -> String {
    let excerpt: String = segment.chars().take(SEGMENT_EXCERPT_CHARS).collect();
    format!(
        "{BASE_STYLE}，{}，{}。文本内容：{excerpt}",
        scene_for(segment),
        style.description()
    )
}
