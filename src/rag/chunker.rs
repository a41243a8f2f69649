/// Splits section text into chunks bounded by a maximum character length.
///
/// Text is split on sentence boundaries and sentences are packed into a
/// chunk until the next one would exceed the limit. A single sentence
/// longer than the limit is hard-split at char boundaries so no chunk
/// body ever exceeds `max_chars`.
pub fn split_text_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let clean = text.trim();
    if clean.is_empty() {
        return Vec::new();
    }

    if clean.len() <= max_chars {
        return vec![collapse_whitespace(clean)];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(clean) {
        if sentence.len() > max_chars {
            // Oversized sentence: flush and hard-split it
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.extend(hard_split(&sentence, max_chars));
            continue;
        }

        if current.is_empty() {
            current = sentence;
        } else if current.len() + 1 + sentence.len() <= max_chars {
            current.push(' ');
            current.push_str(&sentence);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = sentence;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split text into sentences, breaking after `.` `!` `?` followed by
/// whitespace. Inter-sentence whitespace is collapsed to a single space.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_was_terminator = false;

    for (idx, ch) in text.char_indices() {
        if prev_was_terminator && ch.is_whitespace() {
            let sentence = collapse_whitespace(&text[start..idx]);
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = idx;
        }
        prev_was_terminator = matches!(ch, '.' | '!' | '?');
    }

    let tail = collapse_whitespace(&text[start..]);
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hard_split(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < sentence.len() {
        let end_target = (start + max_chars).min(sentence.len());
        let mut end = floor_char_boundary(sentence, end_target);
        if end <= start {
            end = ceil_char_boundary(sentence, start + 1);
        }
        pieces.push(sentence[start..end].to_string());
        start = end;
    }

    pieces
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(split_text_into_chunks("", 100).is_empty());
        assert!(split_text_into_chunks("   \n  ", 100).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text_into_chunks("Python and SQL required.", 100);
        assert_eq!(chunks, vec!["Python and SQL required.".to_string()]);
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First one. Second one!  Third one? Tail");
        assert_eq!(
            sentences,
            vec![
                "First one.".to_string(),
                "Second one!".to_string(),
                "Third one?".to_string(),
                "Tail".to_string(),
            ]
        );
    }

    #[test]
    fn test_never_splits_mid_sentence_when_avoidable() {
        let text = "Build services. Review code. Mentor juniors. Ship features.";
        let chunks = split_text_into_chunks(text, 35);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.ends_with('.'), "chunk should end on a sentence: {}", chunk);
        }
    }

    #[test]
    fn test_chunk_bodies_respect_max_chars() {
        let text = "One sentence here. ".repeat(50);
        let chunks = split_text_into_chunks(&text, 80);
        for chunk in &chunks {
            assert!(chunk.len() <= 80, "chunk too long: {} chars", chunk.len());
        }
    }

    #[test]
    fn test_oversized_sentence_is_hard_split_within_bound() {
        let text = format!("{} tail sentence follows.", "x".repeat(250));
        let chunks = split_text_into_chunks(&text, 100);
        for chunk in &chunks {
            assert!(chunk.len() <= 100);
        }
    }

    #[test]
    fn test_concatenated_chunks_reconstruct_section_text() {
        let text = "Design REST APIs.  Own the deployment pipeline.\nWork with product.  Write tests.";
        let chunks = split_text_into_chunks(text, 40);
        let rebuilt = chunks.join(" ");
        let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(rebuilt, normalized);
    }

    #[test]
    fn test_multibyte_text_survives_hard_split() {
        let text = "tuyển dụng kỹ sư phần mềm ".repeat(30);
        let chunks = split_text_into_chunks(&text, 64);
        for chunk in &chunks {
            assert!(chunk.len() <= 64);
            // re-slicing must not panic on char boundaries
            let _ = chunk.chars().count();
        }
    }
}
