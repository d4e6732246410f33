use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use jobscout_core::JobRecord;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unknown format: {other}. Use json or csv."),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        })
    }
}

impl ExportFormat {
    /// An explicit format wins; otherwise the file extension decides.
    pub fn resolve(explicit: Option<ExportFormat>, path: &Path) -> Result<Self> {
        if let Some(format) = explicit {
            return Ok(format);
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(ExportFormat::Json),
            Some("csv") => Ok(ExportFormat::Csv),
            _ => bail!("Cannot determine format from filename. Use --format json or --format csv"),
        }
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    company: &'a str,
    location: &'a str,
    salary_range: &'a str,
    experience: &'a str,
    education: &'a str,
    url: &'a str,
    source: &'a str,
    tags: String,
}

impl<'a> From<&'a JobRecord> for CsvRow<'a> {
    fn from(job: &'a JobRecord) -> Self {
        Self {
            title: &job.title,
            company: &job.company,
            location: &job.location,
            salary_range: job.salary_range.as_deref().unwrap_or_default(),
            experience: job.experience.as_deref().unwrap_or_default(),
            education: job.education.as_deref().unwrap_or_default(),
            url: &job.url,
            source: &job.source,
            tags: job.tags.join(", "),
        }
    }
}

pub fn write_jobs<W: Write>(writer: W, jobs: &[JobRecord], format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Json => write_json(writer, jobs),
        ExportFormat::Csv => write_csv(writer, jobs),
    }
}

fn write_json<W: Write>(mut writer: W, jobs: &[JobRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, jobs).context("Failed to write JSON")?;
    writeln!(writer)?;
    Ok(())
}

fn write_csv<W: Write>(writer: W, jobs: &[JobRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for job in jobs {
        csv.serialize(CsvRow::from(job))
            .context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// Write `jobs` to `path`, creating or truncating it.
pub fn export_to_file(path: &Path, jobs: &[JobRecord], format: ExportFormat) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_jobs(std::io::BufWriter::new(file), jobs, format)
}
