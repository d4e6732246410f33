//! Plain-text rendering for terminal output.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use jobscout_core::JobRecord;
use jobscout_core::service::{CacheStats, QuotaStatus};

const MAX_TAGS_SHOWN: usize = 10;
const MAX_REQUIREMENTS_SHOWN: usize = 8;
const DESCRIPTION_PREVIEW: usize = 500;

/// Cut `text` to `max` characters, ending with `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn pad(text: &str, width: usize) -> String {
    let text = truncate(text, width);
    let fill = width.saturating_sub(text.chars().count());
    format!("{text}{}", " ".repeat(fill))
}

pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now - at;
    let days = diff.num_days();
    match days {
        d if d < 0 => at.format("%Y-%m-%d").to_string(),
        0 => match diff.num_hours() {
            0 if diff.num_minutes() > 1 => format!("{} minutes ago", diff.num_minutes()),
            0 => "Just now".to_string(),
            1 => "1 hour ago".to_string(),
            h => format!("{h} hours ago"),
        },
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days} days ago"),
        7..=13 => "1 week ago".to_string(),
        14..=29 => format!("{} weeks ago", days / 7),
        _ => at.format("%Y-%m-%d").to_string(),
    }
}

pub fn progress_bar(percentage: f64, width: usize) -> String {
    let filled = ((width as f64 * percentage / 100.0) as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn jobs_table(jobs: &[JobRecord], title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}\n");
    let _ = writeln!(
        out,
        "{}  {}  {}  {}  {}  {}",
        pad("#", 4),
        pad("Title", 30),
        pad("Company", 20),
        pad("Location", 15),
        pad("Salary (RMB)", 14),
        "Source"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));
    for (i, job) in jobs.iter().enumerate() {
        let salary = job
            .salary_range
            .as_deref()
            .map_or_else(|| "-".to_string(), |s| format!("¥{s}"));
        let _ = writeln!(
            out,
            "{}  {}  {}  {}  {}  {}",
            pad(&(i + 1).to_string(), 4),
            pad(&job.title, 30),
            pad(&job.company, 20),
            pad(&job.location, 15),
            pad(&salary, 14),
            job.source
        );
    }
    let _ = write!(
        out,
        "\nShowing {} jobs. Use 'jobscout show <#>' to view details.",
        jobs.len()
    );
    out
}

pub fn job_detail(job: &JobRecord, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} @ {}", job.title, job.company);
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "ID:         {}", job.id);
    let _ = writeln!(out, "Location:   {}", job.location);
    if let Some(salary) = &job.salary_range {
        let _ = writeln!(out, "Salary:     ¥{salary}/month");
    }
    if let Some(experience) = &job.experience {
        let _ = writeln!(out, "Experience: {experience}");
    }
    if let Some(education) = &job.education {
        let _ = writeln!(out, "Education:  {education}");
    }
    if let Some(posted) = job.posted_date {
        let _ = writeln!(out, "Posted:     {}", relative_time(posted, now));
    }
    let _ = writeln!(out, "Source:     {}", job.source);

    if !job.tags.is_empty() {
        let tags: Vec<String> = job
            .tags
            .iter()
            .take(MAX_TAGS_SHOWN)
            .map(|t| format!("[{t}]"))
            .collect();
        let _ = writeln!(out, "\nTech Stack:\n  {}", tags.join(" "));
    }
    if let Some(description) = &job.description {
        let _ = writeln!(out, "\nDescription:\n  {}", truncate(description, DESCRIPTION_PREVIEW));
    }
    if !job.requirements.is_empty() {
        let _ = writeln!(out, "\nRequirements:");
        for req in job.requirements.iter().take(MAX_REQUIREMENTS_SHOWN) {
            let _ = writeln!(out, "  - {}", truncate(req, 70));
        }
    }
    let _ = write!(out, "\nURL: {}", job.url);
    out
}

pub fn stats_view(stats: &CacheStats, now: DateTime<Utc>) -> String {
    let quota = &stats.quota;
    let mut out = String::new();
    let _ = writeln!(out, "Monthly API Usage ({})\n", quota.month);
    let _ = writeln!(
        out,
        "  {} {:.1}%",
        progress_bar(quota.usage_percentage(), 20),
        quota.usage_percentage()
    );
    let _ = writeln!(
        out,
        "  {} / {} requests",
        quota.requests_used, quota.monthly_limit
    );
    let _ = writeln!(out, "  {} remaining", quota.requests_remaining());
    match stats.status {
        QuotaStatus::Ok => {}
        QuotaStatus::Low { remaining } => {
            let _ = writeln!(out, "  Warning: only {remaining} requests left this month");
        }
        QuotaStatus::Exhausted { .. } => {
            let _ = writeln!(out, "  Limit reached: searches will use cached data only");
        }
    }

    let _ = writeln!(out, "\nCache Statistics\n");
    let _ = writeln!(out, "{}  {}  Last Refresh", pad("Source", 10), pad("Jobs", 6));
    for source in &stats.sources {
        let refreshed = source
            .last_refresh
            .map_or_else(|| "Never".to_string(), |at| relative_time(at, now));
        let marker = if source.stale { " (stale)" } else { "" };
        let _ = writeln!(
            out,
            "{}  {}  {refreshed}{marker}",
            pad(source.source.as_str(), 10),
            pad(&source.count.to_string(), 6),
        );
    }
    let _ = write!(out, "{}  {}", pad("Total", 10), stats.total_jobs);
    out
}
