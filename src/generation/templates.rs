//! Static catalogue of note card templates

use serde::Serialize;

use super::prompt::TemplateStyle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSettings {
    pub style: &'static str,
    pub colors: &'static str,
    pub layout: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub preview: &'static str,
    pub settings: TemplateSettings,
    #[serde(skip)]
    pub prompt_style: TemplateStyle,
}

pub const TEMPLATES: &[Template] = &[
    Template {
        id: "xiaohongshu-classic",
        name: "小红书经典",
        description: "清新简约风格，适合日常分享",
        preview: "/templates/xiaohongshu-classic.jpg",
        settings: TemplateSettings {
            style: "clean and fresh",
            colors: "bright and vibrant",
            layout: "centered",
        },
        prompt_style: TemplateStyle::Minimalist,
    },
    Template {
        id: "xiaohongshu-lifestyle",
        name: "生活方式",
        description: "温馨生活感，适合生活记录",
        preview: "/templates/xiaohongshu-lifestyle.jpg",
        settings: TemplateSettings {
            style: "cozy and warm",
            colors: "soft pastels",
            layout: "natural",
        },
        prompt_style: TemplateStyle::Soft,
    },
    Template {
        id: "xiaohongshu-fashion",
        name: "时尚潮流",
        description: "时尚前卫，适合穿搭分享",
        preview: "/templates/xiaohongshu-fashion.jpg",
        settings: TemplateSettings {
            style: "trendy and stylish",
            colors: "bold and modern",
            layout: "dynamic",
        },
        prompt_style: TemplateStyle::Bright,
    },
];

pub fn find(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|template| template.id == id)
}

/// Resolve a template id or a bare style name to a prompt style
pub fn resolve_style(name: Option<&str>) -> TemplateStyle {
    match name {
        Some(name) => find(name)
            .map(|template| template.prompt_style)
            .unwrap_or_else(|| TemplateStyle::from_name(name)),
        None => TemplateStyle::Default,
    }
}
