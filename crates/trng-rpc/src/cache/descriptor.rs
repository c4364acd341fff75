use crate::{Error, Request, Result};
use serde_json::Value;

/// Turns a response document into cacheable items.
///
/// The second argument is the cache's decimal mode: integer requests in a
/// base other than 10 come back as strings.
pub type Extractor<I> = Box<dyn Fn(&Value, bool) -> Result<Vec<I>> + Send + Sync>;

/// Queue capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 20;

/// Smallest queue capacity a cache will run with.
pub const MIN_CAPACITY: usize = 2;

/// Shape of one bulk fetch: `batches` groups of `per_batch` items each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bulk {
    pub batches: usize,
    pub per_batch: usize,
}

impl Bulk {
    /// Number of items one bulk fetch must return.
    pub const fn total(&self) -> usize {
        self.batches.saturating_mul(self.per_batch)
    }

    /// Splits a fetched batch into consecutive groups, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if `items` does not hold exactly
    /// [`Self::total`] items.
    pub fn split<I>(&self, items: Vec<I>) -> Result<Vec<Vec<I>>> {
        if items.len() != self.total() {
            return Err(Error::malformed(format!(
                "bulk fetch returned {} items, expected {} ({} x {})",
                items.len(),
                self.total(),
                self.batches,
                self.per_batch
            )));
        }
        let mut items = items.into_iter();
        Ok((0..self.batches)
            .map(|_| items.by_ref().take(self.per_batch).collect())
            .collect())
    }
}

/// Describes what a [`Cache`] keeps warm.
///
/// In single mode every fetch becomes one queued item. In bulk mode a fetch
/// asks the service for several result sets at once and the cache splits the
/// response into [`Bulk::batches`] items.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trng_rpc::{CacheSpec, Request, extract, methods};
///
/// let request = Request::new(
///     methods::GENERATE_INTEGERS,
///     json!({ "n": 15, "min": 1, "max": 6, "base": 10 }),
/// );
/// let spec = CacheSpec::new(request, |response, _| extract::random_data::<i64>(response))
///     .capacity(6)
///     .bulk(CacheSpec::<i64>::bulk_batches_for(6), 3);
///
/// assert_eq!(spec.queue_capacity(), 6);
/// assert_eq!(spec.bulk_shape().map(|b| b.batches), Some(5));
/// assert!(spec.is_decimal());
/// ```
///
/// [`Cache`]: crate::Cache
pub struct CacheSpec<I> {
    pub(crate) request: Request,
    pub(crate) extractor: Extractor<I>,
    pub(crate) capacity: usize,
    pub(crate) bulk: Option<Bulk>,
    pub(crate) decimal: bool,
}

impl<I> CacheSpec<I> {
    /// Describes a single-mode cache of [`DEFAULT_CAPACITY`] items. Decimal
    /// mode follows [`Request::is_decimal`].
    pub fn new(
        request: Request,
        extractor: impl Fn(&Value, bool) -> Result<Vec<I>> + Send + Sync + 'static,
    ) -> Self {
        let decimal = request.is_decimal();
        Self {
            request,
            extractor: Box::new(extractor),
            capacity: DEFAULT_CAPACITY,
            bulk: None,
            decimal,
        }
    }

    /// Sets the queue capacity, raised to [`MIN_CAPACITY`] if smaller.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(MIN_CAPACITY);
        self
    }

    /// Switches to bulk mode. Zero `batches` means single mode.
    pub fn bulk(mut self, batches: usize, per_batch: usize) -> Self {
        self.bulk = (batches > 0).then_some(Bulk { batches, per_batch });
        self
    }

    pub fn decimal(mut self, decimal: bool) -> Self {
        self.decimal = decimal;
        self
    }

    /// Default number of result sets per bulk fetch for a queue of
    /// `capacity`: half the queue for small queues, five otherwise.
    pub const fn bulk_batches_for(capacity: usize) -> usize {
        if capacity <= 5 { capacity / 2 } else { 5 }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    pub fn bulk_shape(&self) -> Option<Bulk> {
        self.bulk
    }

    pub fn is_decimal(&self) -> bool {
        self.decimal
    }

    /// Items the queue must have room for before a fetch starts.
    pub(crate) fn room_needed(&self) -> usize {
        self.bulk.map_or(1, |bulk| bulk.batches)
    }

    /// Checks that a bulk fetch can ever fit into the queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for a bulk shape with more batches
    /// than the queue holds or with empty batches.
    pub fn validate(&self) -> Result<()> {
        let Some(bulk) = self.bulk else {
            return Ok(());
        };
        if bulk.batches > self.capacity {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "{} bulk batches do not fit a cache of capacity {}",
                    bulk.batches, self.capacity
                ),
            });
        }
        if bulk.per_batch == 0 {
            return Err(Error::InvalidRequest {
                reason: "bulk batches must hold at least one item".to_string(),
            });
        }
        Ok(())
    }
}

impl<I> core::fmt::Debug for CacheSpec<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheSpec")
            .field("request", &self.request)
            .field("capacity", &self.capacity)
            .field("bulk", &self.bulk)
            .field("decimal", &self.decimal)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods;
    use serde_json::json;

    fn spec(params: Value) -> CacheSpec<i64> {
        CacheSpec::new(Request::new(methods::GENERATE_INTEGERS, params), |_, _| {
            Ok(Vec::new())
        })
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(spec(json!({})).queue_capacity(), DEFAULT_CAPACITY);
        assert_eq!(spec(json!({})).capacity(0).queue_capacity(), 2);
        assert_eq!(spec(json!({})).capacity(1).queue_capacity(), 2);
        assert_eq!(spec(json!({})).capacity(7).queue_capacity(), 7);
    }

    #[test]
    fn bulk_sizing_rule() {
        assert_eq!(CacheSpec::<i64>::bulk_batches_for(2), 1);
        assert_eq!(CacheSpec::<i64>::bulk_batches_for(5), 2);
        assert_eq!(CacheSpec::<i64>::bulk_batches_for(6), 5);
        assert_eq!(CacheSpec::<i64>::bulk_batches_for(20), 5);
    }

    #[test]
    fn zero_batches_means_single_mode() {
        let spec = spec(json!({})).bulk(0, 4);
        assert_eq!(spec.bulk_shape(), None);
        assert_eq!(spec.room_needed(), 1);
    }

    #[test]
    fn decimal_mode_defaults_from_base() {
        assert!(spec(json!({ "base": 10 })).is_decimal());
        assert!(!spec(json!({ "base": 16 })).is_decimal());
        assert!(spec(json!({ "base": 16 })).decimal(true).is_decimal());
    }

    #[test]
    fn validation_rejects_unfit_bulk_shapes() {
        assert!(spec(json!({})).capacity(4).bulk(4, 1).validate().is_ok());
        assert!(matches!(
            spec(json!({})).capacity(4).bulk(5, 1).validate(),
            Err(Error::InvalidRequest { .. })
        ));
        assert!(matches!(
            spec(json!({})).capacity(4).bulk(2, 0).validate(),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[test]
    fn split_preserves_order() {
        let bulk = Bulk {
            batches: 3,
            per_batch: 2,
        };
        let groups = bulk.split((1..=6).collect()).unwrap();
        assert_eq!(groups, vec![vec![1, 2], vec![3, 4], vec![5, 6]]);
        assert_eq!(groups.concat(), (1..=6).collect::<Vec<_>>());

        assert!(matches!(
            bulk.split(vec![1, 2, 3]),
            Err(Error::MalformedResponse { .. })
        ));
    }
}
