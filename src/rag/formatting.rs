use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::rag::types::{IndexStats, QueryFilters, RetrievalResult};

pub fn format_results(result: &RetrievalResult) -> String {
    if result.is_empty() {
        return "No matching documents".to_string();
    }

    let mut output = String::new();

    for scored in &result.documents {
        let doc = &scored.document;
        let meta = &doc.metadata;

        output.push_str(&"━".repeat(60));
        output.push('\n');

        output.push_str(
            &format!("[JOB {}] {}", meta.job_id, meta.title)
                .blue()
                .bold()
                .to_string(),
        );
        output.push('\n');

        if let Some(name) = meta.company.name.as_deref().filter(|n| !n.is_empty()) {
            output.push_str(&name.bright_black().to_string());
            output.push('\n');
        }

        let mut line = meta.salary.format_text();
        if !meta.locations.is_empty() {
            line.push_str(" · ");
            line.push_str(&meta.locations.join(", "));
        }
        output.push_str(&line.cyan().to_string());
        output.push('\n');

        // Content preview (first 200 chars)
        let content = if doc.content.chars().count() > 200 {
            format!("{}...", truncate_chars(&doc.content, 200))
        } else {
            doc.content.clone()
        };
        output.push_str(&content);
        output.push('\n');

        match scored.score {
            Some(score) => {
                let score_pct = (score * 100.0) as u32;
                output.push_str(&format!("{}% relevant", score_pct).green().to_string());
            }
            None => output.push_str(&"pinned".yellow().to_string()),
        }
        output.push_str("\n\n");
    }

    output
}

pub fn format_filters(filters: &QueryFilters) -> String {
    let mut output = String::new();

    output.push_str(&format!("Intent: {}", filters.intent.as_str()));
    output.push('\n');
    if !filters.job_keywords.is_empty() {
        output.push_str(&format!("Keywords: {}", filters.job_keywords.join(", ")));
        output.push('\n');
    }
    if !filters.locations.is_empty() {
        output.push_str(&format!("Locations: {}", filters.locations.join(", ")));
        output.push('\n');
    }
    if !filters.skills.is_empty() {
        output.push_str(&format!("Skills: {}", filters.skills.join(", ")));
        output.push('\n');
    }
    if let Some(min) = filters.min_salary {
        output.push_str(&format!("Min salary: {}", min));
        output.push('\n');
    }
    if let Some(max) = filters.max_salary {
        output.push_str(&format!("Max salary: {}", max));
        output.push('\n');
    }

    output
}

pub fn format_stats(stats: &IndexStats) -> String {
    let mut output = String::new();

    output.push_str(&"Job Index Statistics".bold().to_string());
    output.push('\n');
    output.push_str(&format!("Total Jobs: {}", stats.total_jobs));
    output.push('\n');
    output.push_str(&format!("Total Documents: {}", stats.total_documents));
    output.push('\n');
    output.push_str(&format!("Active Documents: {}", stats.active_documents));
    output.push('\n');

    if stats.total_jobs > 0 {
        let avg = stats.total_documents / stats.total_jobs;
        output.push_str(&format!("Average Documents/Job: {}", avg));
        output.push('\n');
    }

    if let Some(oldest) = stats.oldest_indexed {
        output.push_str(&format!("Oldest Indexed: {}", format_relative_time(oldest)));
        output.push('\n');
    }

    if let Some(newest) = stats.newest_indexed {
        output.push_str(&format!("Newest Indexed: {}", format_relative_time(newest)));
        output.push('\n');
    }

    output
}

fn format_relative_time(dt: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{} days ago", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{} hours ago", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{} minutes ago", duration.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}
