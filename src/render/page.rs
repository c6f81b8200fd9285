use super::escape_html;
use super::table::Table;
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const VEGA_SCRIPTS: [&str; 3] = [
    "https://cdn.jsdelivr.net/npm/vega@5",
    "https://cdn.jsdelivr.net/npm/vega-lite@5",
    "https://cdn.jsdelivr.net/npm/vega-embed@6",
];

/// Rows of a table printed to the terminal before it is elided.
const TERMINAL_PREVIEW_ROWS: usize = 5;

/// One block of the dashboard, in display order.
#[derive(Debug, Clone)]
pub enum Section {
    Title(String),
    Header(String),
    Subheader(String),
    Text(String),
    Table(Table),
    /// A Vega-Lite chart; `summary` stands in for it on the terminal.
    Chart { spec: Value, summary: Option<Table> },
}

/// An ordered list of sections rendered either as terminal text or as one HTML page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    sections: Vec<Section>,
}

impl Page {
    /// Creates an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `section` below the existing ones.
    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Sections in display order.
    #[cfg(test)]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Renders the page for the terminal.
    ///
    /// Titles and headers are underlined, tables are previewed with their first
    /// and last rows, and charts are replaced by their summary table.
    ///
    /// # Returns
    /// The page as plain text
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        for section in &self.sections {
            match section {
                Section::Title(title) => {
                    let _ = writeln!(out, "{title}\n{}\n", "=".repeat(title.chars().count()));
                }
                Section::Header(header) => {
                    let _ = writeln!(out, "\n{header}\n{}", "-".repeat(header.chars().count()));
                }
                Section::Subheader(subheader) => {
                    let _ = writeln!(out, "\n{subheader}");
                }
                Section::Text(text) => {
                    let _ = writeln!(out, "{text}");
                }
                Section::Table(table) => {
                    let _ = write!(
                        out,
                        "{}",
                        table.preview(TERMINAL_PREVIEW_ROWS, TERMINAL_PREVIEW_ROWS)
                    );
                }
                Section::Chart { summary, .. } => match summary {
                    Some(table) => {
                        let _ = write!(out, "{table}");
                    }
                    None => {
                        let _ = writeln!(out, "(chart)");
                    }
                },
            }
        }

        out
    }

    /// Renders a standalone HTML document; charts are drawn client-side by vega-embed.
    ///
    /// # Errors
    /// Returns an error if a chart specification cannot be serialized
    pub fn render_html(&self) -> Result<String> {
        let title = self
            .sections
            .iter()
            .find_map(|section| match section {
                Section::Title(title) => Some(title.as_str()),
                _ => None,
            })
            .unwrap_or("Dashboard");

        let mut html = String::new();
        let _ = writeln!(html, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>");
        let _ = writeln!(html, "<meta charset=\"utf-8\">");
        let _ = writeln!(html, "<title>{}</title>", escape_html(title));
        for script in VEGA_SCRIPTS {
            let _ = writeln!(html, "<script src=\"{script}\"></script>");
        }
        let _ = writeln!(
            html,
            "<style>body {{ font-family: sans-serif; margin: 2rem auto; max-width: 72rem; }}\n\
             table {{ border-collapse: collapse; font-size: 0.85rem; }}\n\
             th, td {{ border: 1px solid #ddd; padding: 0.2rem 0.5rem; text-align: right; }}\n\
             .scroll {{ max-height: 24rem; overflow: auto; }}\n\
             .chart {{ width: 100%; }}</style>"
        );
        let _ = writeln!(html, "</head>\n<body>");

        let mut charts = 0;
        for section in &self.sections {
            match section {
                Section::Title(title) => {
                    let _ = writeln!(html, "<h1>{}</h1>", escape_html(title));
                }
                Section::Header(header) => {
                    let _ = writeln!(html, "<h2>{}</h2>", escape_html(header));
                }
                Section::Subheader(subheader) => {
                    let _ = writeln!(html, "<h3>{}</h3>", escape_html(subheader));
                }
                Section::Text(text) => {
                    let _ = writeln!(html, "<p>{}</p>", escape_html(text));
                }
                Section::Table(table) => {
                    let _ = writeln!(html, "<div class=\"scroll\">{}</div>", table.to_html());
                }
                Section::Chart { spec, .. } => {
                    charts += 1;
                    let spec = serde_json::to_string(spec)
                        .context("failed to serialize chart specification")?
                        .replace("</", "<\\/");
                    let _ = writeln!(
                        html,
                        "<div id=\"chart-{charts}\" class=\"chart\"></div>\n\
                         <script>vegaEmbed(\"#chart-{charts}\", {spec}, {{\"actions\": false}});</script>"
                    );
                }
            }
        }

        let _ = writeln!(html, "</body>\n</html>");
        Ok(html)
    }

    /// Writes the HTML page to `dir/index.html`, creating `dir` if needed.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written
    pub fn write_html(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;

        let path = dir.join("index.html");
        fs::write(&path, self.render_html()?)
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(path)
    }
}
