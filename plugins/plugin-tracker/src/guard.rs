//! Conversion of engine failures, including panics, at the plugin boundary.

use crate::engine::EngineError;
use playdeck_runtime::{RuntimeError, RuntimeResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run an engine call, turning errors and panics into [`RuntimeError`]s.
pub(crate) fn guarded<T>(
    url: &str,
    f: impl FnOnce() -> Result<T, EngineError>,
) -> RuntimeResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(EngineError::NoSuchSubsong { index, count })) => {
            Err(RuntimeError::SubsongOutOfRange { index, count })
        }
        Ok(Err(e)) => Err(RuntimeError::DecodeRejected {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(payload) => Err(RuntimeError::DecodeRejected {
            url: url.to_string(),
            reason: format!("engine panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
