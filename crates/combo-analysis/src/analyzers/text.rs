//! Per-column free-text profile.
//!
//! Length statistics, word counts and the most frequent tokens of one text
//! column. Tokens are lowercased runs of alphanumeric characters.

use crate::config::AnalysisConfig;
use crate::types::{AnalysisKind, PairResult, ResultDetails, TokenCount};
use std::collections::HashMap;

pub fn analyze_column(name: &str, values: &[Option<String>], config: &AnalysisConfig) -> PairResult {
    let mut result = PairResult::new(name, None, AnalysisKind::Text);

    let present: Vec<&str> = values.iter().flatten().map(String::as_str).collect();
    result.set_metric("count", present.len());
    result.set_metric("missing", values.len() - present.len());
    if present.is_empty() {
        return result;
    }

    let lengths: Vec<usize> = present.iter().map(|s| s.chars().count()).collect();
    let total_length: usize = lengths.iter().sum();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total_words = 0usize;
    for text in &present {
        for token in tokenize(text) {
            total_words += 1;
            *counts.entry(token).or_default() += 1;
        }
    }

    let n = present.len() as f64;
    result.set_metric("avg_length", total_length as f64 / n);
    result.set_metric("min_length", lengths.iter().copied().min().unwrap_or(0));
    result.set_metric("max_length", lengths.iter().copied().max().unwrap_or(0));
    result.set_metric("avg_words", total_words as f64 / n);
    result.set_metric("total_tokens", total_words);
    result.set_metric("unique_tokens", counts.len());

    let mut tokens: Vec<TokenCount> = counts
        .into_iter()
        .map(|(token, count)| TokenCount { token, count })
        .collect();
    tokens.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.token.cmp(&b.token)));
    tokens.truncate(config.reliability.top_tokens);
    if !tokens.is_empty() {
        result.details = Some(ResultDetails::Tokens(tokens));
    }
    result.primary_metric = Some("avg_length".to_string());
    result
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
