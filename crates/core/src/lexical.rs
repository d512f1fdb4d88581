use crate::error::SearchError;
use crate::models::SearchResult;
use crate::traits::{ChunkReranker, LexicalScorer};
use async_trait::async_trait;

/// Query terms worth matching: lowercased whitespace tokens longer than
/// two characters.
fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| token.to_lowercase())
        .filter(|token| token.len() > 2)
        .collect()
}

fn overlap_fraction(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let matched = terms.iter().filter(|term| lowered.contains(*term)).count();
    matched as f32 / terms.len() as f32
}

/// Keyword leg for hybrid search: scores each candidate by the fraction of
/// query terms it contains.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlapScorer;

#[async_trait]
impl LexicalScorer for TermOverlapScorer {
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, SearchError> {
        let terms = query_terms(query);
        Ok(texts
            .iter()
            .map(|text| overlap_fraction(&terms, text))
            .collect())
    }
}

/// Shortlist reranker ordering by term overlap. Stable: candidates with
/// equal overlap keep their incoming order, so reranking never scrambles
/// an already deterministic ranking.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlapReranker;

#[async_trait]
impl ChunkReranker for TermOverlapReranker {
    async fn rerank(
        &self,
        query: &str,
        shortlist: &[SearchResult],
    ) -> Result<Vec<SearchResult>, SearchError> {
        let terms = query_terms(query);
        let mut reordered: Vec<(f32, SearchResult)> = shortlist
            .iter()
            .map(|result| (overlap_fraction(&terms, &result.text), result.clone()))
            .collect();
        reordered.sort_by(|left, right| right.0.total_cmp(&left.0));
        Ok(reordered.into_iter().map(|(_, result)| result).collect())
    }
}
