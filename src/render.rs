//! Markdown-to-HTML rendering for documentation routes.
//!
//! The renderer is a capability passed into handler contexts, not a
//! global. Pages come out as a `<section>` with a bundled stylesheet so
//! a rendered README is readable without any external assets.

use std::path::Path;

use pulldown_cmark::{html, Options, Parser};

const BUNDLED_CSS: &str = include_str!("../assets/bare.css");

/// Renders markdown into standalone styled HTML pages.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    css: String,
}

impl MarkdownRenderer {
    /// Create a renderer with the bundled stylesheet.
    pub fn new() -> Self {
        Self {
            css: BUNDLED_CSS.to_string(),
        }
    }

    /// Create a renderer with a custom stylesheet.
    pub fn with_css(css: impl Into<String>) -> Self {
        Self { css: css.into() }
    }

    /// Render a markdown string into a full HTML page.
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let parser = Parser::new_ext(markdown, options);
        let mut content = String::new();
        html::push_html(&mut content, parser);

        format!("<section>{content}</section><style>{}</style>", self.css)
    }

    /// Render a markdown file into a full HTML page.
    pub async fn render_file(&self, path: &Path) -> std::io::Result<String> {
        let markdown = tokio::fs::read_to_string(path).await?;
        Ok(self.render(&markdown))
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_wraps_content_in_section_with_style() {
        let renderer = MarkdownRenderer::with_css("body{}");
        let html = renderer.render("# Hello\n\nworld");

        assert!(html.starts_with("<section>"));
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<p>world</p>"));
        assert!(html.ends_with("<style>body{}</style>"));
    }

    #[test]
    fn render_supports_tables() {
        let renderer = MarkdownRenderer::with_css("");
        let html = renderer.render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[tokio::test]
    async fn render_file_reports_missing_file() {
        let renderer = MarkdownRenderer::new();
        let result = renderer.render_file(Path::new("does/not/exist.md")).await;
        assert!(result.is_err());
    }
}
