//! OpenBSD backend: narrow the process with `pledge(2)`.
//!
//! Pledges only ever shrink, so every capability the worker will use is
//! declared in this one call.

use super::SandboxError;

/// Promises held for the rest of the process lifetime.
///
/// - stdio: general stdio, memory, time
/// - rpath: read config and CA bundles
/// - wpath, cpath: write the output file, create its directory
/// - inet, dns: the fetch itself
/// - getpw: home directory lookup when `HOME` is unset
#[cfg_attr(not(target_os = "openbsd"), allow(dead_code))]
pub(crate) const PROMISES: &str = "stdio rpath wpath cpath inet dns getpw";

#[cfg(target_os = "openbsd")]
pub(super) fn install(promises: &str) -> Result<(), SandboxError> {
    use std::ffi::CString;
    use std::io;

    let promises_c = CString::new(promises).map_err(|e| SandboxError::InstallFailed {
        step: "pledge",
        source: io::Error::new(io::ErrorKind::InvalidInput, e),
    })?;

    // SAFETY: both pointers are valid C strings or null for the duration of the call.
    let rc = unsafe { libc::pledge(promises_c.as_ptr(), std::ptr::null()) };
    if rc != 0 {
        return Err(SandboxError::InstallFailed {
            step: "pledge",
            source: io::Error::last_os_error(),
        });
    }

    tracing::info!(promises, "pledge applied");
    Ok(())
}

#[cfg(not(target_os = "openbsd"))]
pub(super) fn install(_promises: &str) -> Result<(), SandboxError> {
    Err(SandboxError::Unavailable {
        platform: std::env::consts::OS,
        reason: "pledge(2) is only available on OpenBSD".into(),
    })
}
