//! Rendering of resource lists

use crate::resource::Resource;
use anyhow::Result;

/// Output format for listed resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned table
    #[default]
    Human,
    Json,
    Yaml,
}

pub fn render(resources: &[Resource], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(render_table(resources)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(resources)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(resources)?),
    }
}

const HEADERS: [&str; 3] = ["Type", "UUID", "Name"];

fn render_table(resources: &[Resource]) -> String {
    let rows: Vec<[&str; 3]> = resources
        .iter()
        .map(|r| [r.kind.as_str(), r.uuid.as_str(), r.name.as_str()])
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in std::iter::once(HEADERS).chain(rows) {
        let line = format!(
            "{:<w0$}  {:<w1$}  {}",
            row[0],
            row[1],
            row[2],
            w0 = widths[0],
            w1 = widths[1]
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
