use std::cmp::Ordering;

/// Cosine similarity between two vectors. Returns 0.0 when either vector
/// is all zeros, so degraded fallback embeddings score as "no match"
/// instead of dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// The `k` corpus vectors most similar to the query, as
/// `(corpus_index, similarity)` sorted descending by similarity. Ties break
/// toward the lower original index. `k` is clamped to the corpus size, and
/// selection is partial rather than a full sort.
pub fn top_k_similar(query: &[f32], corpus: &[Vec<f32>], k: usize) -> Vec<(usize, f32)> {
    let k = k.min(corpus.len());
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = corpus
        .iter()
        .enumerate()
        .map(|(index, vector)| (index, cosine_similarity(query, vector)))
        .collect();

    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, compare_hits);
        scored.truncate(k);
    }
    scored.sort_by(compare_hits);
    scored
}

fn compare_hits(left: &(usize, f32), right: &(usize, f32)) -> Ordering {
    right
        .1
        .total_cmp(&left.1)
        .then_with(|| left.0.cmp(&right.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_a_vector_with_itself_is_one() {
        let v = vec![0.3, -1.2, 4.0, 0.5];
        let similarity = cosine_similarity(&v, &v);
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_against_a_zero_vector_is_zero() {
        let zero = vec![0.0; 4];
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn top_k_is_clamped_to_corpus_size() {
        let corpus = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let hits = top_k_similar(&[1.0, 0.0], &corpus, 10);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn top_k_orders_descending_with_index_tiebreak() {
        let corpus = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let hits = top_k_similar(&[1.0, 0.0], &corpus, 3);

        // Indexes 1 and 2 tie at similarity 1.0; the lower index wins.
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 3);
        assert!(hits[0].1 >= hits[1].1 && hits[1].1 >= hits[2].1);
    }

    #[test]
    fn empty_corpus_yields_no_hits() {
        assert!(top_k_similar(&[1.0], &[], 5).is_empty());
    }

    #[test]
    fn euclidean_distance_is_zero_for_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(euclidean_distance(&v, &v), 0.0);
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }
}
