//! Computed stub leaves.

use crate::error::ComputeError;
use crate::fetch::ResponseMeta;
use crate::request::RequestContext;
use serde_json::Value;

/// A stub position whose value is produced at serve time.
///
/// `live` is the upstream value at the leaf's position (`Value::Null` when
/// absent). `meta` is the upstream response, present only for service-backed
/// routes; implementations may rewrite its status or headers.
pub trait Computed: Send + Sync {
    fn evaluate(
        &self,
        live: &Value,
        request: &RequestContext,
        meta: Option<&mut ResponseMeta>,
    ) -> Result<Value, ComputeError>;
}

impl<F> Computed for F
where
    F: Fn(&Value, &RequestContext, Option<&mut ResponseMeta>) -> Result<Value, ComputeError>
        + Send
        + Sync,
{
    fn evaluate(
        &self,
        live: &Value,
        request: &RequestContext,
        meta: Option<&mut ResponseMeta>,
    ) -> Result<Value, ComputeError> {
        self(live, request, meta)
    }
}
