//! Turning text resources into output.
//!
//! The session only depends on the [`Renderer`] trait. [`LayoutRenderer`] is
//! the stock implementation:
//!
//! - **Markdown** (`.md`, `.markdown`) is converted with pulldown-cmark and
//!   wrapped in a small HTML layout; the output extension becomes `.html`.
//! - **Everything else** is passed through unchanged at the same path.
//!
//! ## Page Titles
//!
//! First available wins:
//! 1. the first `# heading` of the document
//! 2. the `title` key of the node's effective metadata
//! 3. the file stem
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating,
//! so interpolated titles and metadata are escaped automatically.

use crate::config::LayoutConfig;
use crate::tree::Resource;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to render {path}: {message}")]
    Failed { path: PathBuf, message: String },
}

pub trait Renderer: Send + Sync {
    /// Identifier reported to plugins through `template_loaded`.
    fn name(&self) -> &str;

    /// Where a resource's output goes, relative to the deploy root.
    fn output_path(&self, resource: &Resource) -> PathBuf;

    /// Render the (already plugin-transformed) text of a resource.
    fn render_text(
        &self,
        resource: &Resource,
        text: &str,
        meta: &toml::Table,
    ) -> Result<String, RenderError>;
}

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Markdown-to-HTML renderer with a fixed page layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutRenderer {
    layout: LayoutConfig,
}

impl LayoutRenderer {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    fn is_markdown(resource: &Resource) -> bool {
        resource.is_text() && MARKDOWN_EXTENSIONS.contains(&resource.extension().as_str())
    }
}

impl Renderer for LayoutRenderer {
    fn name(&self) -> &str {
        "layout"
    }

    fn output_path(&self, resource: &Resource) -> PathBuf {
        if Self::is_markdown(resource) {
            resource.path.with_extension("html")
        } else {
            resource.path.clone()
        }
    }

    fn render_text(
        &self,
        resource: &Resource,
        text: &str,
        meta: &toml::Table,
    ) -> Result<String, RenderError> {
        if !Self::is_markdown(resource) {
            return Ok(text.to_string());
        }

        let mut body = String::new();
        md_html::push_html(&mut body, Parser::new_ext(text, Options::ENABLE_TABLES));

        let title = page_title(resource, text, meta);
        let description = meta.get("description").and_then(|v| v.as_str());
        Ok(self
            .base_document(&title, description, PreEscaped(body))
            .into_string())
    }
}

impl LayoutRenderer {
    fn base_document(&self, title: &str, description: Option<&str>, content: Markup) -> Markup {
        let full_title = if self.layout.title.is_empty() {
            title.to_string()
        } else {
            format!("{} - {}", title, self.layout.title)
        };
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    @if let Some(description) = description {
                        meta name="description" content=(description);
                    }
                    title { (full_title) }
                    @if let Some(href) = &self.layout.stylesheet {
                        link rel="stylesheet" href=(href);
                    }
                }
                body {
                    main {
                        article { (content) }
                    }
                }
            }
        }
    }
}

/// Resolve a page title. See the [module docs](self) for the order.
fn page_title(resource: &Resource, text: &str, meta: &toml::Table) -> String {
    text.lines()
        .find(|line| line.starts_with("# "))
        .map(|line| line.trim_start_matches("# ").trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            meta.get("title")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            resource
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}
