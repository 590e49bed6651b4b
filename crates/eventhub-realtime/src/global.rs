//! Optional process-wide registry.
//!
//! Nothing is created implicitly: the application builds a registry and
//! installs it once with [`init`]. Code without access to the handle can
//! then reach it through [`get`].

use std::sync::{Arc, OnceLock};

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;

use crate::channel::registry::ChannelRegistry;

static REGISTRY: OnceLock<Arc<ChannelRegistry>> = OnceLock::new();

/// Installs the shared registry. Fails if one is already installed.
pub fn init(registry: Arc<ChannelRegistry>) -> AppResult<Arc<ChannelRegistry>> {
    REGISTRY
        .set(registry.clone())
        .map_err(|_| AppError::internal("Shared channel registry is already initialised"))?;
    Ok(registry)
}

/// Returns the shared registry, if one was installed.
pub fn get() -> Option<Arc<ChannelRegistry>> {
    REGISTRY.get().cloned()
}

#[cfg(test)]
mod tests {
    use eventhub_core::config::CodecKind;

    use super::*;
    use crate::test_support::RecordingTransport;

    #[test]
    fn test_init_once() {
        let registry = Arc::new(ChannelRegistry::new(
            Arc::new(RecordingTransport::new()),
            CodecKind::Json,
        ));
        init(registry.clone()).expect("first init");

        let shared = get().expect("installed");
        assert!(Arc::ptr_eq(&shared, &registry));

        let other = Arc::new(ChannelRegistry::new(
            Arc::new(RecordingTransport::new()),
            CodecKind::Json,
        ));
        assert!(init(other).is_err());
    }
}
