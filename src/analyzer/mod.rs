pub mod provider;

use std::collections::HashMap;
use tracing::{error, info};

use crate::config::{Credentials, LlmConfig};
use crate::error::{Result, ScrapingError};
use crate::parser::{ProductRecord, NO_DESCRIPTION};
use crate::templates::{render, PromptTemplates};

pub use provider::{provider_from_config, GeminiProvider, LlmProvider, OllamaProvider};

const NO_CATEGORY: &str = "No category available";
const UNKNOWN_RATING: &str = "Unknown";

/// Turns a product record into an improvement report through an LLM.
pub struct ProductAnalyzer {
    templates: PromptTemplates,
    provider: Box<dyn LlmProvider>,
}

impl ProductAnalyzer {
    pub fn new(templates: PromptTemplates, provider: Box<dyn LlmProvider>) -> Self {
        Self { templates, provider }
    }

    pub fn from_config(templates: PromptTemplates, config: &LlmConfig, credentials: &Credentials) -> Result<Self> {
        let provider = provider_from_config(config, &credentials.api_key)?;
        Ok(Self::new(templates, provider))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Renders every comment through the comment template, one per line.
    pub fn prepare_review_analysis(&self, comments: &[String]) -> Result<String> {
        let rendered = comments
            .iter()
            .map(|comment| {
                let mut context = HashMap::new();
                context.insert("comment", comment.clone());
                render(&self.templates.comment_template, &context)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join("\n"))
    }

    pub fn build_prompt(&self, product: &ProductRecord) -> Result<String> {
        if product.comments.is_empty() {
            return Err(ScrapingError::AnalysisError("No comments found".to_string()));
        }

        let category = if product.category.trim().is_empty() {
            NO_CATEGORY.to_string()
        } else {
            product.category.clone()
        };
        let description = product
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(NO_DESCRIPTION)
            .to_string();
        let average_rating = if product.has_rating() {
            format!("{:.2}", product.rating)
        } else {
            UNKNOWN_RATING.to_string()
        };

        let mut context = HashMap::new();
        context.insert("title", product.title.clone());
        context.insert("category", category);
        context.insert("description", description);
        context.insert("reviews_analysis", self.prepare_review_analysis(&product.comments)?);
        context.insert("average_rating", average_rating);

        render(&self.templates.summary_prompt, &context)
    }

    pub async fn analyze_product(&self, product: &ProductRecord) -> Result<String> {
        let prompt = self.build_prompt(product)?;

        info!(
            "Running {} analysis over {} comments...",
            self.provider.name(),
            product.comment_count()
        );
        match self.provider.complete(&self.templates.system_prompt, &prompt).await {
            Ok(analysis) => {
                info!("Analysis complete");
                Ok(analysis)
            }
            Err(e) => {
                error!("LLM request error: {}", e);
                Err(ScrapingError::AnalysisError(format!("LLM analysis failed: {}", e)))
            }
        }
    }
}
