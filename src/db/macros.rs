/// A macro to simplify read-through caching.
///
/// This macro checks if a value is present in the cache.
/// If found, it returns the cached value.
/// If not found, it executes the provided block to compute the value,
/// stores it in the cache, and then returns the computed value.
/// Errors from the block propagate with `?` and are never cached.
///
/// # Arguments
/// * `$cache`: The [`crate::db::Cache`] to use for retrieval and storage.
/// * `$key`: The [`crate::db::CacheKey`] the value lives under.
/// * `$ttl`: The time-to-live of the stored value, as a `Duration`.
/// * `$block`: The future to await if the value is not found in cache.
///
/// # Example
/// ```rust,ignore
/// let page: FeedResult = cached!(self.cache, key, ttl, async {
///     self.assemble_page(query).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get(&$key).await {
            Ok::<_, $crate::error::AppError>(cached)
        } else {
            let value = $block.await?;
            $cache.set(&$key, &value, $ttl).await;
            Ok::<_, $crate::error::AppError>(value)
        }
    }};
}
