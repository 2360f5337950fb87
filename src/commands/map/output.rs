use std::io::{self, Write};

use anyhow::{Context, Result};

use crate::model::{MappingResult, MarketplaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    pub(super) fn from_flags(json: bool, csv: bool) -> Self {
        match (json, csv) {
            (true, _) => Self::Json,
            (false, true) => Self::Csv,
            (false, false) => Self::Text,
        }
    }
}

/// Writes `results` to stdout. `columns` fixes the marketplace order for the
/// text and CSV layouts; JSON carries whatever was mapped.
pub(super) fn write_results(
    results: &[MappingResult],
    columns: &[MarketplaceId],
    subject_header: &str,
    format: OutputFormat,
) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut output, results)
                .context("failed to serialize mapping json output")?;
            writeln!(output)?;
        }
        OutputFormat::Csv => write_csv(&mut output, results, columns, subject_header)?,
        OutputFormat::Text => write_text(&mut output, results, columns)?,
    }
    output.flush()?;
    Ok(())
}

fn write_text<W: Write>(
    output: &mut W,
    results: &[MappingResult],
    columns: &[MarketplaceId],
) -> Result<()> {
    writeln!(output, "Results: {}", results.len())?;
    for (index, result) in results.iter().enumerate() {
        writeln!(output, "{}.\t{}", index + 1, result.label())?;
        for marketplace in columns {
            match result.mappings.get(marketplace) {
                Some(selection) => writeln!(
                    output,
                    "\t{}\t{}\t{}",
                    marketplace.display_name(),
                    selection.id,
                    selection.full_path.as_deref().unwrap_or(&selection.name)
                )?,
                None => writeln!(output, "\t{}\t(no mapping)", marketplace.display_name())?,
            }
        }
    }
    Ok(())
}

fn write_csv<W: Write>(
    output: &mut W,
    results: &[MappingResult],
    columns: &[MarketplaceId],
    subject_header: &str,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(output);

    let mut header = vec![subject_header.to_string()];
    for marketplace in columns {
        header.push(format!("{}カテゴリID", marketplace.display_name()));
        header.push(format!("{}フルパス", marketplace.display_name()));
    }
    writer
        .write_record(&header)
        .context("failed to write CSV header")?;

    for result in results {
        let mut row = vec![result.label()];
        for marketplace in columns {
            let selection = result.mappings.get(marketplace);
            row.push(selection.map(|value| value.id.as_str()).unwrap_or_default());
            row.push(
                selection
                    .and_then(|value| value.full_path.as_deref())
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&row)
            .context("failed to write CSV row")?;
    }

    writer.flush().context("failed to flush CSV output")?;
    Ok(())
}
