use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::query::{ContentQuery, Predicate, SortKey};
use crate::db::repository::ContentRepository;
use crate::error::AppResult;
use crate::models::{ContentItem, ContentRow, EngagementKind};

const SELECT_CONTENT: &str = "SELECT id, title, content_type, creator_type, creator_id, agency_id, \
     engagement_score, view_count, created_at, price_min, price_max, property_type, \
     lifestyle_categories, suburb, city, province, latitude, longitude, video_url, \
     thumbnail_url, is_featured, is_active FROM explore_content";

/// Content repository over the `explore_content` table
#[derive(Clone)]
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn lowered(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.trim().to_lowercase()).collect()
}

fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_location_match(builder: &mut QueryBuilder<'_, Postgres>, needle: &str) {
    let pattern = like_pattern(needle);
    builder.push("(suburb ILIKE ");
    builder.push_bind(pattern.clone());
    builder.push(" OR city ILIKE ");
    builder.push_bind(pattern.clone());
    builder.push(" OR province ILIKE ");
    builder.push_bind(pattern);
    builder.push(")");
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::ActiveOnly => {
            builder.push("is_active = TRUE");
        }
        Predicate::ContentTypeIs(content_type) => {
            builder.push("lower(content_type) = ");
            builder.push_bind(content_type.to_lowercase());
        }
        Predicate::CreatorTypeIs(creator_type) => {
            builder.push("lower(creator_type) = ");
            builder.push_bind(creator_type.as_str());
        }
        Predicate::CreatorIdIs(id) => {
            builder.push("creator_id = ");
            builder.push_bind(*id);
        }
        Predicate::AgencyIs(id) => {
            builder.push("agency_id = ");
            builder.push_bind(*id);
        }
        Predicate::LocationMatches(needle) => push_location_match(builder, needle),
        Predicate::LocationMatchesAny(needles) => {
            if needles.is_empty() {
                builder.push("FALSE");
                return;
            }
            builder.push("(");
            for (i, needle) in needles.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                push_location_match(builder, needle);
            }
            builder.push(")");
        }
        Predicate::CategoryContains(category) => {
            builder.push("EXISTS (SELECT 1 FROM unnest(lifestyle_categories) c WHERE lower(c) = ");
            builder.push_bind(category.trim().to_lowercase());
            builder.push(")");
        }
        Predicate::CategoryAny(categories) => {
            builder.push("EXISTS (SELECT 1 FROM unnest(lifestyle_categories) c WHERE lower(c) = ANY(");
            builder.push_bind(lowered(categories));
            builder.push("))");
        }
        Predicate::PropertyTypeIn(types) => {
            builder.push("lower(property_type) = ANY(");
            builder.push_bind(lowered(types));
            builder.push(")");
        }
        Predicate::PriceOverlaps(range) => {
            builder.push("(price_min <= ");
            builder.push_bind(range.max);
            builder.push(" AND price_max >= ");
            builder.push_bind(range.min);
            builder.push(")");
        }
        Predicate::ExcludeIds(ids) => {
            builder.push("NOT (id = ANY(");
            builder.push_bind(ids.clone());
            builder.push("))");
        }
    }
}

fn order_column(key: &SortKey) -> &'static str {
    match key {
        SortKey::Featured => "is_featured DESC",
        SortKey::Engagement => "engagement_score DESC",
        SortKey::Views => "view_count DESC",
        SortKey::Recency => "created_at DESC",
    }
}

/// Renders a [`ContentQuery`] into a single parameterised SELECT
pub fn build_select(query: &ContentQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_CONTENT);

    for (i, predicate) in query.predicates.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_predicate(&mut builder, predicate);
    }

    builder.push(" ORDER BY ");
    for key in &query.order {
        builder.push(order_column(key));
        builder.push(", ");
    }
    builder.push("id DESC");

    builder.push(" LIMIT ");
    builder.push_bind(i64::from(query.limit));
    builder.push(" OFFSET ");
    builder.push_bind(i64::from(query.offset));

    builder
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn find(&self, query: ContentQuery) -> AppResult<Vec<ContentItem>> {
        let mut builder = build_select(&query);
        let rows: Vec<ContentRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        tracing::debug!(
            rows = rows.len(),
            predicates = query.predicates.len(),
            "Content query executed"
        );

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn record_engagement(&self, content_id: i64, kind: EngagementKind) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE explore_content \
             SET engagement_score = engagement_score + $1, view_count = view_count + $2 \
             WHERE id = $3",
        )
        .bind(kind.weight())
        .bind(kind.views())
        .bind(content_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::{CANDIDATE_ORDER, SCOPED_FEED_ORDER};
    use crate::models::{CreatorType, PriceRange};

    #[test]
    fn test_scoped_feed_sql() {
        let query = ContentQuery::active()
            .with(Predicate::CreatorTypeIs(CreatorType::Agent))
            .with(Predicate::CreatorIdIs(12))
            .order_by(&SCOPED_FEED_ORDER)
            .page(20, 40);

        let sql = build_select(&query).into_sql();
        assert!(sql.ends_with(
            "WHERE is_active = TRUE AND lower(creator_type) = $1 AND creator_id = $2 \
             ORDER BY is_featured DESC, engagement_score DESC, created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        ));
    }

    #[test]
    fn test_candidate_sql_with_filters() {
        let query = ContentQuery::active()
            .with(Predicate::ExcludeIds(vec![1, 2]))
            .with(Predicate::LocationMatchesAny(vec!["Sandton".into()]))
            .with(Predicate::PriceOverlaps(PriceRange { min: 1.0, max: 2.0 }))
            .order_by(&CANDIDATE_ORDER)
            .page(60, 0);

        let sql = build_select(&query).into_sql();
        assert!(sql.contains("NOT (id = ANY($1))"));
        assert!(sql.contains("((suburb ILIKE $2 OR city ILIKE $3 OR province ILIKE $4))"));
        assert!(sql.contains("(price_min <= $5 AND price_max >= $6)"));
        assert!(sql.contains("view_count DESC"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 100%_off "), "%100\\%\\_off%");
    }
}
