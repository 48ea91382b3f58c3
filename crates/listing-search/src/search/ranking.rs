use crate::{
    config::SimilarityMetric,
    filter::{FilterCriteria, SortDirection, SortField, SortSpec},
};

use super::compose::TextField;

/// One key of a result ordering, highest priority first in a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Best similarity of `query` across `fields`, best match first
    Relevance {
        query: String,
        fields: Vec<TextField>,
        metric: SimilarityMetric,
    },
    Field(SortSpec),
    /// Final tie-break so pages never overlap
    IdAsc,
}

/// Relevance first when there is free text, then the requested field, then id.
pub fn order_for(criteria: &FilterCriteria, metric: SimilarityMetric) -> Vec<SortKey> {
    let mut order = Vec::with_capacity(3);
    if let Some(query) = &criteria.text {
        order.push(SortKey::Relevance {
            query: query.clone(),
            fields: TextField::ALL.to_vec(),
            metric,
        });
    }
    order.push(SortKey::Field(criteria.sort));
    order.push(SortKey::IdAsc);
    order
}

/// Newest first, used by the map fast path.
pub fn recency_order() -> Vec<SortKey> {
    vec![
        SortKey::Field(SortSpec::new(SortField::CreatedAt, SortDirection::Desc)),
        SortKey::IdAsc,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_text_only_requested_field_and_id() {
        let criteria =
            FilterCriteria::default().with_sort(SortSpec::new(SortField::Price, SortDirection::Asc));
        assert_eq!(
            order_for(&criteria, SimilarityMetric::Trigram),
            vec![
                SortKey::Field(SortSpec::new(SortField::Price, SortDirection::Asc)),
                SortKey::IdAsc
            ]
        );
    }

    #[test]
    fn test_with_text_relevance_dominates() {
        let criteria = FilterCriteria::default().with_text("eggs");
        let order = order_for(&criteria, SimilarityMetric::Indel);
        assert_eq!(order.len(), 3);
        assert_eq!(
            order[0],
            SortKey::Relevance {
                query: "eggs".into(),
                fields: TextField::ALL.to_vec(),
                metric: SimilarityMetric::Indel,
            }
        );
        assert_eq!(order[1], SortKey::Field(SortSpec::default()));
    }

    #[test]
    fn test_recency_order() {
        assert_eq!(recency_order()[0], SortKey::Field(SortSpec::default()));
        assert_eq!(recency_order()[1], SortKey::IdAsc);
    }
}
