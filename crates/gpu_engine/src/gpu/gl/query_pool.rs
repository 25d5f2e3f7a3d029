//! GL query pool implementation

use std::any::Any;
use std::rc::Rc;

use super::device::QueryName;
use super::GlContext;
use crate::foundation::logging::trace;
use crate::gpu::defs::ObjectId;
use crate::gpu::query_pool::{GpuQueryPool, GpuQueryPoolDesc, GpuQueryType};

/// Query pool backed by one GL query object per query
///
/// GL query objects need no reset between uses: ending a timestamp query
/// again overwrites its result.
pub struct GlQueryPool {
    desc: GpuQueryPoolDesc,
    id: ObjectId,
    context: Rc<GlContext>,
    queries: Vec<QueryName>,
}

impl GlQueryPool {
    pub(super) fn new(context: &Rc<GlContext>, desc: GpuQueryPoolDesc) -> Self {
        let queries = match desc.query_type {
            GpuQueryType::Timestamp => context.device.gen_queries(desc.count),
        };

        Self {
            desc,
            id: ObjectId::next(),
            context: Rc::clone(context),
            queries,
        }
    }
}

impl GpuQueryPool for GlQueryPool {
    fn desc(&self) -> &GpuQueryPoolDesc {
        &self.desc
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn reset_impl(&self, start: u32, count: u32) {
        trace!("GL: Reset of queries {}+{} in pool {}", start, count, self.id.raw());
    }

    fn results_impl(&self, start: u32, results: &mut [u64]) {
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let queries = self.queries.iter().skip(start);
        for (result, &query) in results.iter_mut().zip(queries) {
            *result = self.context.device.query_result(query);
        }
    }

    fn end_impl(&self, index: u32) {
        let query = usize::try_from(index).ok().and_then(|index| self.queries.get(index));
        if let Some(&query) = query {
            self.context.device.query_counter(query);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlQueryPool {
    fn drop(&mut self) {
        self.context.device.delete_queries(&self.queries);
    }
}
