//! Platforms without a mandatory kernel sandbox primitive.

use super::SandboxError;

/// Records the baseline level. There is nothing to install.
pub(super) fn install(high_security: bool) -> Result<(), SandboxError> {
    tracing::warn!(
        platform = std::env::consts::OS,
        high_security,
        "no kernel sandbox on this platform; running with baseline restrictions"
    );
    Ok(())
}
