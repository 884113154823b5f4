// src/prompts.rs

use crate::models::Gender;

pub const DEFAULT_FEMALE_PROMPT: &str = include_str!("../prompts/female.md");
pub const DEFAULT_MALE_PROMPT: &str = include_str!("../prompts/male.md");

#[derive(Debug, Default, Clone)]
pub struct PromptVariables<'a> {
    pub features: Option<&'a str>,
    pub size: Option<&'a str>,
    pub colors: Option<&'a str>,
    pub outfit_image_count: Option<usize>,
}

pub fn default_prompt(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => DEFAULT_FEMALE_PROMPT,
        Gender::Male => DEFAULT_MALE_PROMPT,
    }
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default)
}

/// Fills the `{{...}}` placeholders of a prompt template.
pub fn apply_variables(template: &str, vars: &PromptVariables<'_>) -> String {
    let outfit_count = vars
        .outfit_image_count
        .filter(|count| *count > 0)
        .map_or_else(|| "6".to_string(), |count| count.to_string());

    template
        .replace("{{features}}", or_default(vars.features, "없음"))
        .replace("{{size}}", or_default(vars.size, "미정"))
        .replace("{{colors}}", or_default(vars.colors, "미정"))
        .replace("{{outfitImageCount}}", &outfit_count)
}
