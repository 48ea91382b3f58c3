//! Lowering of query plans to polars expressions.
//!
//! Caller values only ever enter as literals.
use polars::prelude::*;

use super::{
    compose::{Predicate, QueryPlan, TextField},
    ranking::SortKey,
    text::similarity_expr,
};
use crate::{
    config::SimilarityMetric,
    filter::{BoundingBox, SortField},
    geo::{GeoPoint, haversine_threshold},
};
use listing_search_data::schema::listing;

pub fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Price => listing::PRICE_CENTS,
        SortField::CreatedAt => listing::CREATED_AT,
    }
}

/// Case-insensitive identifier equality; exports may carry upper-case UUIDs.
pub fn id_equals(column: &str, id: &str) -> Expr {
    col(column).str().to_lowercase().eq(lit(id.to_lowercase()))
}

fn contains_expr(column: &str, needle: &str) -> Expr {
    col(column)
        .str()
        .to_lowercase()
        .str()
        .contains_literal(lit(needle.to_string()))
}

/// Literal case-insensitive substring on any of `fields`.
fn contains_any_expr(query: &str, fields: &[TextField]) -> Expr {
    let needle = query.to_lowercase();
    fields
        .iter()
        .map(|field| contains_expr(field.column(), &needle))
        .reduce(|a, b| a.or(b))
        .map_or_else(|| lit(false), |e| e.fill_null(lit(false)))
}

fn within_bbox_expr(bbox: &BoundingBox) -> Expr {
    col(listing::LON)
        .gt_eq(lit(bbox.west))
        .and(col(listing::LON).lt_eq(lit(bbox.east)))
        .and(col(listing::LAT).gt_eq(lit(bbox.south)))
        .and(col(listing::LAT).lt_eq(lit(bbox.north)))
}

/// Haversine test without the inverse trigonometry: compares the `a` term of the
/// formula against the threshold for `meters`.
fn within_radius_expr(center: GeoPoint, meters: f64) -> Expr {
    let lat0 = center.lat.to_radians();
    let lon0 = center.lon.to_radians();
    let lat = col(listing::LAT) * lit(std::f64::consts::PI / 180.0);
    let lon = col(listing::LON) * lit(std::f64::consts::PI / 180.0);

    let half_dlat = ((lat.clone() - lit(lat0)) / lit(2.0)).sin();
    let half_dlon = ((lon - lit(lon0)) / lit(2.0)).sin();
    let a = half_dlat.clone() * half_dlat
        + lit(lat0.cos()) * lat.cos() * half_dlon.clone() * half_dlon;

    a.lt_eq(lit(haversine_threshold(meters)))
}

fn text_match_expr(
    query: &str,
    fields: &[TextField],
    threshold: f64,
    metric: SimilarityMetric,
) -> Expr {
    let needle = query.to_lowercase();
    fields
        .iter()
        .map(|field| {
            let substring = contains_expr(field.column(), &needle);
            let similar = similarity_expr(field.column(), query, metric).gt_eq(lit(threshold));
            substring.or(similar)
        })
        .reduce(|a, b| a.or(b))
        .map_or_else(|| lit(false), |e| e.fill_null(lit(false)))
}

pub fn predicate_expr(predicate: &Predicate) -> Expr {
    match predicate {
        Predicate::HasLocation => col(listing::LON)
            .is_not_null()
            .and(col(listing::LAT).is_not_null()),
        Predicate::Available(available) => col(listing::AVAILABLE).eq(lit(*available)),
        Predicate::MinPrice(min) => col(listing::PRICE_CENTS).gt_eq(lit(*min)),
        Predicate::MaxPrice(max) => col(listing::PRICE_CENTS).lt_eq(lit(*max)),
        Predicate::ListingId(id) => id_equals(listing::ID, id),
        Predicate::Product(id) => id_equals(listing::PRODUCT_ID, &id.to_string()),
        Predicate::Category(id) => id_equals(listing::CATEGORY_ID, &id.to_string()),
        Predicate::CategoryName(name) => col(listing::CATEGORY_NAME).eq(lit(name.clone())),
        Predicate::Contains { query, fields } => contains_any_expr(query, fields),
        Predicate::Text {
            query,
            fields,
            threshold,
            metric,
        } => text_match_expr(query, fields, *threshold, *metric),
        Predicate::WithinBbox(bbox) => within_bbox_expr(bbox),
        Predicate::WithinRadius { center, meters } => within_radius_expr(*center, *meters),
    }
}

/// Conjunction of all predicates; an empty set keeps every row.
pub fn filter_expr(predicates: &[Predicate]) -> Expr {
    predicates
        .iter()
        .map(predicate_expr)
        .reduce(|a, b| a.and(b))
        .unwrap_or_else(|| lit(true))
}

/// Best similarity across `fields`; a null field scores 0.
pub fn relevance_expr(query: &str, fields: &[TextField], metric: SimilarityMetric) -> Expr {
    let scores: Vec<Expr> = fields
        .iter()
        .map(|field| similarity_expr(field.column(), query, metric).fill_null(lit(0.0)))
        .collect();
    if scores.is_empty() {
        return lit(0.0);
    }
    // Only fails on an empty input.
    max_horizontal(scores).unwrap_or_else(|_| lit(0.0))
}

fn sort_key_expr(key: &SortKey) -> (Expr, bool) {
    match key {
        SortKey::Relevance {
            query,
            fields,
            metric,
        } => (relevance_expr(query, fields, *metric), true),
        SortKey::Field(spec) => (
            col(sort_column(spec.field)),
            spec.direction.is_descending(),
        ),
        SortKey::IdAsc => (col(listing::ID), false),
    }
}

pub fn sort_by(lf: LazyFrame, order: &[SortKey]) -> LazyFrame {
    if order.is_empty() {
        return lf;
    }
    let (exprs, descending): (Vec<Expr>, Vec<bool>) = order.iter().map(sort_key_expr).unzip();
    lf.sort_by_exprs(
        exprs,
        SortMultipleOptions::default()
            .with_order_descending_multi(descending)
            .with_nulls_last(true)
            .with_maintain_order(true),
    )
}

/// Filtered rows, unordered.
pub fn filtered(lf: LazyFrame, plan: &QueryPlan) -> LazyFrame {
    lf.filter(filter_expr(&plan.predicates))
}

/// Filtered and ordered rows.
pub fn ordered(lf: LazyFrame, plan: &QueryPlan) -> LazyFrame {
    sort_by(filtered(lf, plan), &plan.order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{SortDirection, SortSpec};
    use crate::search::text::trigram_similarity;
    use uuid::Uuid;

    fn frame() -> LazyFrame {
        df![
            "id" => ["a", "b", "c", "d"],
            "title" => ["Apple Juice", "Banana", "100% Honey", "Carrots"],
            "description" => [Some("pressed"), None, Some("raw"), Some("bunch")],
            "product_name" => ["Juice", "Banana", "Honey", "Carrot"],
            "price_cents" => [300i64, 150, 900, 200],
            "available" => [true, true, false, true],
            "product_id" => [
                "00000000-0000-0000-0000-000000000001",
                "00000000-0000-0000-0000-000000000002",
                "00000000-0000-0000-0000-000000000001",
                "00000000-0000-0000-0000-000000000003",
            ],
            "category_id" => [Some("00000000-0000-0000-0000-0000000000AA"), None, None, None],
            "category_name" => [Some("Drinks"), Some("Fruit"), None, Some("Vegetables")],
            "farmer_name" => [Some("Green Valley"), None, Some("Bee Happy"), Some("Old Orchard")],
            "lon" => [Some(4.0), Some(4.5), None, Some(5.0)],
            "lat" => [Some(50.0), Some(50.5), Some(50.2), Some(51.0)],
            "created_at" => [4i64, 3, 2, 1],
        ]
        .unwrap()
        .lazy()
    }

    fn ids(lf: LazyFrame) -> Vec<String> {
        lf.collect()
            .unwrap()
            .column("id")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|s| s.unwrap().to_string())
            .collect()
    }

    fn filter_ids(predicates: Vec<Predicate>) -> Vec<String> {
        let plan = QueryPlan::new(predicates, vec![SortKey::IdAsc]);
        ids(ordered(frame(), &plan))
    }

    fn text(query: &str) -> Predicate {
        Predicate::Text {
            query: query.into(),
            fields: TextField::ALL.to_vec(),
            threshold: 0.15,
            metric: SimilarityMetric::Trigram,
        }
    }

    #[test]
    fn test_empty_predicates_keep_everything() {
        assert_eq!(filter_ids(vec![]), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_has_location_drops_unmappable_rows() {
        assert_eq!(filter_ids(vec![Predicate::HasLocation]), vec!["a", "b", "d"]);
    }

    #[test]
    fn test_price_bounds_are_inclusive() {
        assert_eq!(
            filter_ids(vec![Predicate::MinPrice(200), Predicate::MaxPrice(300)]),
            vec!["a", "d"]
        );
        // Crossed bounds match nothing rather than failing
        assert!(filter_ids(vec![Predicate::MinPrice(500), Predicate::MaxPrice(100)]).is_empty());
    }

    #[test]
    fn test_identity_and_availability() {
        assert_eq!(
            filter_ids(vec![Predicate::Product(Uuid::from_u128(1))]),
            vec!["a", "c"]
        );
        assert_eq!(
            filter_ids(vec![Predicate::Product(Uuid::from_u128(1)), Predicate::Available(true)]),
            vec!["a"]
        );
        // Null category never matches; stored upper case still matches
        assert_eq!(
            filter_ids(vec![Predicate::Category(Uuid::from_u128(0xaa))]),
            vec!["a"]
        );
    }

    #[test]
    fn test_bbox_containment_is_inclusive() {
        let bbox = BoundingBox::new(4.0, 50.0, 4.5, 50.5);
        assert_eq!(filter_ids(vec![Predicate::WithinBbox(bbox)]), vec!["a", "b"]);
    }

    #[test]
    fn test_text_matches_substring_and_similarity() {
        assert_eq!(filter_ids(vec![text("APPL")]), vec!["a"]);
        assert_eq!(filter_ids(vec![text("bananna")]), vec!["b"]);
        assert_eq!(filter_ids(vec![text("pressed")]), vec!["a"]);
    }

    #[test]
    fn test_text_substring_is_literal() {
        assert_eq!(filter_ids(vec![text("0%")]), vec!["c"]);
        assert!(filter_ids(vec![text("1_0")]).is_empty());
        assert!(filter_ids(vec![text("%_")]).is_empty());
    }

    #[test]
    fn test_radius_filter() {
        let center = GeoPoint::new(4.0, 50.0);
        // b is ~64 km away, d ~131 km
        assert_eq!(
            filter_ids(vec![
                Predicate::HasLocation,
                Predicate::WithinRadius {
                    center,
                    meters: 70_000.0
                }
            ]),
            vec!["a", "b"]
        );
        assert_eq!(
            filter_ids(vec![Predicate::WithinRadius {
                center,
                meters: 1.0
            }]),
            vec!["a"]
        );
    }

    #[test]
    fn test_sort_by_field_then_id() {
        let plan = QueryPlan::new(
            vec![],
            vec![
                SortKey::Field(SortSpec::new(SortField::CreatedAt, SortDirection::Asc)),
                SortKey::IdAsc,
            ],
        );
        assert_eq!(ids(ordered(frame(), &plan)), vec!["d", "c", "b", "a"]);

        let plan = QueryPlan::new(
            vec![],
            vec![
                SortKey::Field(SortSpec::new(SortField::Price, SortDirection::Desc)),
                SortKey::IdAsc,
            ],
        );
        assert_eq!(ids(ordered(frame(), &plan)), vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn test_relevance_sort() {
        let plan = QueryPlan::new(
            vec![],
            vec![
                SortKey::Relevance {
                    query: "honey".into(),
                    fields: TextField::ALL.to_vec(),
                    metric: SimilarityMetric::Trigram,
                },
                SortKey::IdAsc,
            ],
        );
        assert_eq!(ids(ordered(frame(), &plan))[0], "c");
    }

    #[test]
    fn test_listing_id_ignores_case() {
        assert_eq!(filter_ids(vec![Predicate::ListingId("C".into())]), vec!["c"]);
        assert!(filter_ids(vec![Predicate::ListingId("e".into())]).is_empty());
    }

    #[test]
    fn test_contains_and_category_name() {
        let farmer_or_title = |q: &str| Predicate::Contains {
            query: q.into(),
            fields: vec![TextField::Title, TextField::FarmerName],
        };
        assert_eq!(filter_ids(vec![farmer_or_title("orchard")]), vec!["d"]);
        assert_eq!(filter_ids(vec![farmer_or_title("AN")]), vec!["b"]);
        // Similarity plays no part here
        assert!(filter_ids(vec![farmer_or_title("bananna")]).is_empty());

        assert_eq!(
            filter_ids(vec![Predicate::CategoryName("Fruit".into())]),
            vec!["b"]
        );
        assert!(filter_ids(vec![Predicate::CategoryName("fruit".into())]).is_empty());
    }

    #[test]
    fn test_relevance_is_best_field_score() {
        let scores = frame()
            .select([relevance_expr(
                "honey",
                &TextField::ALL,
                SimilarityMetric::Trigram,
            )
            .alias("score")])
            .collect()
            .unwrap();
        let scores: Vec<f64> = scores
            .column("score")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect();

        let rows = [
            ("Apple Juice", Some("pressed"), "Juice"),
            ("Banana", None, "Banana"),
            ("100% Honey", Some("raw"), "Honey"),
            ("Carrots", Some("bunch"), "Carrot"),
        ];
        for ((title, description, product), score) in rows.into_iter().zip(scores) {
            let expected = [
                trigram_similarity("honey", title),
                description.map_or(0.0, |d| trigram_similarity("honey", d)),
                trigram_similarity("honey", product),
            ]
            .into_iter()
            .fold(0.0, f64::max);
            assert!((score - expected).abs() < 1e-9, "{title}: {score} vs {expected}");
        }
    }
}
