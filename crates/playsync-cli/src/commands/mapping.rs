use std::io::{self, Write};

use playsync_core::FieldMapping;
use serde::Serialize;

use crate::commands::common::{load_mapping, Overrides};
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MappingRow {
    pub local_field: String,
    pub remote_field: String,
    #[serde(rename = "type")]
    pub wire_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub title: bool,
}

pub fn run_mapping_check(overrides: &Overrides, as_json: bool) -> Result<(), CliError> {
    let path = overrides.data_paths().mapping_file;
    let mapping = load_mapping(&path)?;
    let mut stdout = io::stdout();
    if as_json {
        writeln!(
            stdout,
            "{}",
            serde_json::to_string_pretty(&mapping_rows(&mapping))?
        )?;
    } else {
        writeln!(stdout, "{} is valid", path.display())?;
        for line in format_mapping_lines(&mapping) {
            writeln!(stdout, "{line}")?;
        }
    }
    Ok(())
}

pub fn mapping_rows(mapping: &FieldMapping) -> Vec<MappingRow> {
    let title = &mapping.title().local_field;
    mapping
        .entries()
        .iter()
        .map(|entry| MappingRow {
            local_field: entry.local_field.clone(),
            remote_field: entry.remote_field.clone(),
            wire_type: entry.wire_type.label().to_string(),
            format: entry
                .format
                .as_ref()
                .map(|template| template.source().to_string()),
            title: &entry.local_field == title,
        })
        .collect()
}

pub fn format_mapping_lines(mapping: &FieldMapping) -> Vec<String> {
    mapping_rows(mapping)
        .into_iter()
        .map(|row| {
            let mut line = format!(
                "  {} -> {} ({})",
                row.local_field, row.remote_field, row.wire_type
            );
            if let Some(format) = row.format {
                line.push_str(&format!(" from \"{format}\""));
            }
            if row.title {
                line.push_str(" [key]");
            }
            line
        })
        .collect()
}
