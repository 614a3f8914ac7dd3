use super::{PtyError, PtyHandles, PtyProvider, SpawnRequest};

/// Provider for platforms without pty support
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPtyProvider;

impl PtyProvider for UnsupportedPtyProvider {
    fn is_supported(&self) -> bool {
        false
    }

    fn spawn(&self, _request: &SpawnRequest) -> Result<PtyHandles, PtyError> {
        Err(PtyError::Unsupported)
    }
}
