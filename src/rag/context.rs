use serde::{Deserialize, Serialize};

use crate::constants::{MAX_HISTORY_CHARS, MAX_HISTORY_TURNS};
use crate::rag::types::{RetrievalResult, ScoredDocument};

/// One turn of the conversation preceding the current question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Structured job summary handed to the calling layer alongside the
/// answer (job suggestion cards, links)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCard {
    pub job_id: i64,
    pub title: String,
    pub company_name: String,
    pub locations: String,
    pub salary_text: String,
    pub url: String,
    pub score: Option<f32>,
}

/// Fold the tail of the conversation into the retrieval query so
/// follow-up questions ("this job", "the second one") stay anchored to
/// what was discussed.
pub fn build_retrieval_query(message: &str, history: &[ChatTurn]) -> String {
    let base = message.trim();
    if history.is_empty() {
        return base.to_string();
    }

    let tail_turns: Vec<&str> = history
        .iter()
        .rev()
        .take(MAX_HISTORY_TURNS)
        .map(|turn| turn.content.trim())
        .filter(|content| !content.is_empty())
        .collect();

    if tail_turns.is_empty() {
        return base.to_string();
    }

    let mut history_text = tail_turns
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join(" | ");

    // Cap the folded history so it does not wash out the question itself
    if history_text.len() > MAX_HISTORY_CHARS {
        let mut cut = history_text.len() - MAX_HISTORY_CHARS;
        while cut < history_text.len() && !history_text.is_char_boundary(cut) {
            cut += 1;
        }
        history_text = history_text[cut..].to_string();
    }

    if base.is_empty() {
        history_text
    } else {
        format!("{} | Previous context: {}", base, history_text)
    }
}

/// Render retrieved documents into the context text the answer
/// synthesizer consumes: one block per document, each headed by the job
/// id, title, company, salary, and locations.
pub fn build_context_text(result: &RetrievalResult, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(result.len());

    for scored in &result.documents {
        let meta = &scored.document.metadata;
        let mut header = format!("[JOB {}] {}", meta.job_id, meta.title);
        if let Some(name) = meta.company.name.as_deref().filter(|n| !n.is_empty()) {
            header.push_str(" – ");
            header.push_str(name);
        }

        let mut details: Vec<String> = Vec::new();
        details.push(format!("salary: {}", meta.salary.format_text()));
        if !meta.locations.is_empty() {
            details.push(format!("location: {}", meta.locations.join(", ")));
        }
        header.push_str(&format!(" ({})", details.join("; ")));

        parts.push(format!("{}\n{}", header, scored.document.content));
    }

    let mut context = parts.join("\n\n");
    if context.len() > max_chars {
        let mut cut = max_chars;
        while cut > 0 && !context.is_char_boundary(cut) {
            cut -= 1;
        }
        context.truncate(cut);
    }
    context
}

/// Job cards for the calling layer, one per retrieved document
pub fn build_job_cards(result: &RetrievalResult) -> Vec<JobCard> {
    result.documents.iter().map(job_card).collect()
}

fn job_card(scored: &ScoredDocument) -> JobCard {
    let meta = &scored.document.metadata;
    JobCard {
        job_id: meta.job_id,
        title: meta.title.to_uppercase(),
        company_name: meta.company.name.clone().unwrap_or_default(),
        locations: meta.locations.join(", "),
        salary_text: meta.salary.format_text(),
        url: meta
            .url
            .clone()
            .unwrap_or_else(|| format!("/jobs/{}", meta.job_id)),
        score: scored.score,
    }
}
