//! Fuzzy text similarity evaluated as a column function.
use ahash::AHashSet;
use polars::prelude::*;

use crate::config::SimilarityMetric;

type Trigram = [char; 3];

/// Trigram set of `text` the way `pg_trgm` builds it: lowercased, split on
/// anything that is not alphanumeric, each word padded with two leading blanks and
/// one trailing blank.
pub fn trigrams(text: &str) -> AHashSet<Trigram> {
    let lowered = text.to_lowercase();
    let mut set = AHashSet::new();
    for word in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = [' ', ' ']
            .into_iter()
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        set.extend(padded.windows(3).map(|w| [w[0], w[1], w[2]]));
    }
    set
}

fn jaccard(a: &AHashSet<Trigram>, b: &AHashSet<Trigram>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / (a.len() + b.len() - shared) as f64
}

/// Shared trigrams over all distinct trigrams, in `[0, 1]`.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    jaccard(&trigrams(a), &trigrams(b))
}

/// Normalised Indel similarity of the lowercased strings, in `[0, 1]`.
pub fn indel_similarity(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.to_lowercase().chars(), b.to_lowercase().chars())
}

/// The query side of a similarity computation, prepared once per request.
#[derive(Debug, Clone)]
pub enum QueryScorer {
    Trigram(AHashSet<Trigram>),
    Indel(String),
}

impl QueryScorer {
    pub fn new(query: &str, metric: SimilarityMetric) -> Self {
        match metric {
            SimilarityMetric::Trigram => Self::Trigram(trigrams(query)),
            SimilarityMetric::Indel => Self::Indel(query.to_lowercase()),
        }
    }

    pub fn score(&self, text: &str) -> f64 {
        match self {
            Self::Trigram(query) => jaccard(query, &trigrams(text)),
            Self::Indel(query) => {
                rapidfuzz::fuzz::ratio(query.chars(), text.to_lowercase().chars())
            }
        }
    }
}

/// Similarity of every value of `column` to `query`. Nulls stay null.
pub fn similarity_expr(column: &str, query: &str, metric: SimilarityMetric) -> Expr {
    let scorer = QueryScorer::new(query, metric);
    col(column).map(
        move |c: Column| {
            let scores: Float64Chunked = c
                .str()?
                .into_iter()
                .map(|value| value.map(|text| scorer.score(text)))
                .collect();
            Ok(Some(Column::from(
                scores.with_name(c.name().clone()).into_series(),
            )))
        },
        GetOutput::from_type(DataType::Float64),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_trigrams_of_short_word() {
        let set = trigrams("Appl");
        assert_eq!(set.len(), 5);
        assert!(set.contains(&[' ', ' ', 'a']));
        assert!(set.contains(&['p', 'l', ' ']));
    }

    #[test]
    fn test_trigram_similarity_values() {
        assert!(approx(trigram_similarity("appl", "Apple Juice"), 4.0 / 13.0));
        assert!(approx(trigram_similarity("appl", "Organic Apple"), 4.0 / 15.0));
        assert!(approx(trigram_similarity("appl", "Banana"), 0.0));
        assert!(approx(trigram_similarity("Carrot", "carrot"), 1.0));
    }

    #[test]
    fn test_trigram_similarity_ignores_punctuation_and_empty() {
        assert!(approx(
            trigram_similarity("free-range eggs", "Free Range Eggs"),
            1.0
        ));
        assert!(approx(trigram_similarity("", "anything"), 0.0));
        assert!(approx(trigram_similarity("!!!", "!!!"), 0.0));
    }

    #[test]
    fn test_indel_similarity_is_normalised() {
        assert!(approx(indel_similarity("Honey", "honey"), 1.0));
        let s = indel_similarity("appl", "apple");
        assert!(s > 0.8 && s < 1.0, "got {s}");
        assert!(approx(indel_similarity("abc", "xyz"), 0.0));
    }

    #[test]
    fn test_similarity_expr_keeps_nulls() {
        let df = df![
            "title" => [Some("Apple Juice"), None, Some("Banana")],
        ]
        .unwrap();

        let out = df
            .lazy()
            .select([similarity_expr("title", "appl", SimilarityMetric::Trigram)])
            .collect()
            .unwrap();
        let scores: Vec<Option<f64>> = out.column("title").unwrap().f64().unwrap().into_iter().collect();

        assert!(approx(scores[0].unwrap(), 4.0 / 13.0));
        assert_eq!(scores[1], None);
        assert!(approx(scores[2].unwrap(), 0.0));
    }
}
