use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

use crate::cache::TranscriptRecord;
use crate::cli::OutputFormat;
use crate::utils::extract_domain;

/// Plain-text rendering of one record
pub fn format_as_text(record: &TranscriptRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Title:  {}", record.title);
    if !record.source.is_empty() {
        let _ = writeln!(out, "Source: {}", record.source);
    }
    match extract_domain(&record.url) {
        Some(domain) => {
            let _ = writeln!(out, "URL:    {} ({})", record.url, domain);
        }
        None => {
            let _ = writeln!(out, "URL:    {}", record.url);
        }
    }
    let _ = writeln!(out, "ID:     {}", record.id);
    out.push('\n');
    out.push_str(record.text.trim_end());
    out.push('\n');
    out
}

/// JSON rendering: a single object for one record, an array otherwise
pub fn format_as_json(records: &[TranscriptRecord]) -> Result<String> {
    let json = match records {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    Ok(json)
}

pub fn render(records: &[TranscriptRecord], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(records
            .iter()
            .map(format_as_text)
            .collect::<Vec<_>>()
            .join("\n---\n\n")),
        OutputFormat::Json => format_as_json(records),
    }
}

/// Save rendered records to file
pub async fn save_to_file(records: &[TranscriptRecord], path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(records, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print rendered records to console
pub fn print_to_console(records: &[TranscriptRecord], format: &OutputFormat) -> Result<()> {
    let content = render(records, format)?;
    println!("{}", content);
    Ok(())
}
