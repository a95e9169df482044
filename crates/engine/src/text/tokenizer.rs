//! Word tokenizer for title and abstract payloads

use regex_lite::Regex;
use streamforge_common::errors::{EngineError, Result};

const WORD_PATTERN: &str = r"[a-z][a-z0-9]*(?:-[a-z0-9]+)*";

/// Lowercasing tokenizer with stop-word removal
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
    min_token_length: usize,
}

impl Tokenizer {
    pub fn new(min_token_length: usize) -> Result<Self> {
        let pattern = Regex::new(WORD_PATTERN)
            .map_err(|e| EngineError::Other(anyhow::anyhow!("invalid token pattern: {}", e)))?;
        Ok(Self {
            pattern,
            min_token_length,
        })
    }

    /// Split text into normalized terms, in order of appearance
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().trim_matches('-'))
            .filter(|w| w.chars().count() >= self.min_token_length && !is_stop_word(w))
            .map(str::to_string)
            .collect()
    }
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "for" | "are" | "but" | "not" | "you" | "all" | "can" | "had"
            | "her" | "was" | "one" | "our" | "out" | "has" | "have" | "been" | "from"
            | "this" | "that" | "with" | "they" | "will" | "each" | "which" | "their"
            | "said" | "what" | "its" | "into" | "more" | "other" | "these" | "those"
            | "than" | "then" | "there" | "here" | "were" | "also" | "such" | "both"
            | "between" | "using" | "used" | "use" | "based" | "via" | "paper"
            | "study" | "results" | "approach" | "show" | "propose" | "proposed"
            | "present" | "new" | "two" | "may" | "cannot" | "how" | "who" | "when"
            | "where" | "while" | "about" | "over" | "under" | "within" | "without"
            | "through" | "among" | "most" | "many" | "some" | "any" | "only" | "well"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_filters() {
        let tokenizer = Tokenizer::new(3).unwrap();
        let tokens = tokenizer.tokenize("The Citation-Network of Deep Learning, 2019!");
        // Bare numbers never start a token
        assert_eq!(tokens, vec!["citation-network", "deep", "learning"]);
    }

    #[test]
    fn test_short_and_stop_words_removed() {
        let tokenizer = Tokenizer::new(3).unwrap();
        let tokens = tokenizer.tokenize("an ai of the graph and with");
        assert_eq!(tokens, vec!["graph"]);
    }

    #[test]
    fn test_contractions_split_at_apostrophe() {
        let tokenizer = Tokenizer::new(3).unwrap();
        // "can't" splits into "can" and "t"; both are dropped
        let tokens = tokenizer.tokenize("Graphs can't scale; cannot converge");
        assert_eq!(tokens, vec!["graphs", "scale", "converge"]);
    }

    #[test]
    fn test_empty_text() {
        let tokenizer = Tokenizer::new(3).unwrap();
        assert!(tokenizer.tokenize("   ").is_empty());
    }
}
