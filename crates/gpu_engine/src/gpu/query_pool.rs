//! GPU query pools
//!
//! A query pool holds a fixed number of queries. Timestamp queries are ended
//! either immediately through [`GpuManager::end_query`](super::GpuManager::end_query)
//! or at their position in a render pass through
//! [`GpuCommandList::end_query`](super::GpuCommandList::end_query). Results
//! are read back in bulk and queries are reset before being reused.

use std::any::Any;

use super::defs::ObjectId;
use crate::check_msg;

/// Type of the queries in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuQueryType {
    /// GPU timestamp in nanoseconds, recorded when the query is ended
    #[default]
    Timestamp,
}

/// Descriptor for a query pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuQueryPoolDesc {
    /// Type of the queries
    pub query_type: GpuQueryType,
    /// Number of queries in the pool
    pub count: u32,
}

impl GpuQueryPoolDesc {
    /// Descriptor for a pool of `count` queries
    pub const fn new(query_type: GpuQueryType, count: u32) -> Self {
        Self { query_type, count }
    }

    /// Set the query type
    pub const fn with_type(mut self, query_type: GpuQueryType) -> Self {
        self.query_type = query_type;
        self
    }

    /// Set the number of queries
    pub const fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

/// A pool of GPU queries
///
/// Pools are created through [`GpuManager::create_query_pool`](super::GpuManager::create_query_pool)
/// and shared as `Rc<dyn GpuQueryPool>`.
pub trait GpuQueryPool {
    /// Descriptor the pool was created from
    fn desc(&self) -> &GpuQueryPoolDesc;

    /// Unique identity of this pool
    fn id(&self) -> ObjectId;

    /// Backend implementation of [`GpuQueryPool::reset`], range already checked
    fn reset_impl(&self, start: u32, count: u32);

    /// Backend implementation of [`GpuQueryPool::get_results`], range already checked
    fn results_impl(&self, start: u32, results: &mut [u64]);

    /// Backend implementation of [`GpuQueryPool::end`], index already checked
    fn end_impl(&self, index: u32);

    /// Access to the concrete backend type
    fn as_any(&self) -> &dyn Any;

    /// Type of the queries
    fn query_type(&self) -> GpuQueryType {
        self.desc().query_type
    }

    /// Number of queries in the pool
    fn count(&self) -> u32 {
        self.desc().count
    }

    /// Reset a range of queries so that they can be ended again
    fn reset(&self, start: u32, count: u32) {
        check_msg!(
            start.saturating_add(count) <= self.count(),
            "Query reset outside pool bounds (total: {}, start: {}, count: {})",
            self.count(),
            start,
            count
        );

        self.reset_impl(start, count);
    }

    /// Read the results of the queries from `start`, one per element of `results`
    ///
    /// Waits for the queries to complete.
    fn get_results(&self, start: u32, results: &mut [u64]) {
        let count = u32::try_from(results.len()).unwrap_or(u32::MAX);
        check_msg!(
            start.saturating_add(count) <= self.count(),
            "Query results outside pool bounds (total: {}, start: {}, count: {})",
            self.count(),
            start,
            count
        );

        self.results_impl(start, results);
    }

    /// End a query immediately
    ///
    /// For timestamp queries this records the time at which all previously
    /// submitted work has completed.
    fn end(&self, index: u32) {
        check_msg!(
            index < self.count(),
            "Query {} outside pool bounds (total: {})",
            index,
            self.count()
        );

        self.end_impl(index);
    }
}
