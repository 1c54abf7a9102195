use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, ScrapingError};

/// Prompt fragments loaded once from a YAML file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PromptTemplates {
    #[serde(rename = "system-prompt")]
    pub system_prompt: String,
    #[serde(rename = "summary-prompt")]
    pub summary_prompt: String,
    #[serde(rename = "comment-template")]
    pub comment_template: String,
}

impl PromptTemplates {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading prompt templates from {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| {
            ScrapingError::TemplateError(format!("Failed to read templates {:?}: {}", path, e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let templates: PromptTemplates = serde_yaml::from_str(content)?;
        debug!("Prompt templates parsed");
        Ok(templates)
    }
}

/// Fills `{name}` placeholders from `context`. `{{` and `}}` produce literal braces.
pub fn render(template: &str, context: &HashMap<&str, String>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if !closed {
                    return Err(ScrapingError::TemplateError(format!(
                        "Unclosed placeholder '{{{}'",
                        name
                    )));
                }
                let key = name.trim();
                let value = context.get(key).ok_or_else(|| {
                    ScrapingError::TemplateError(format!("Missing template variable '{}'", key))
                })?;
                output.push_str(value);
            }
            '}' => {
                return Err(ScrapingError::TemplateError(
                    "Single '}' encountered in template".to_string(),
                ))
            }
            _ => output.push(c),
        }
    }

    Ok(output)
}
