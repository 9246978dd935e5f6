//! Process privilege restriction, applied once before any network I/O.
//!
//! One [`SandboxProfile`] exists per platform:
//!
//! | Platform          | Backend    | Descriptor                 |
//! |-------------------|------------|----------------------------|
//! | Linux (x86_64/aarch64) | seccomp-bpf | syscall allow-list table |
//! | Linux (other arches) | none, `apply` fails with `Unavailable` | empty table |
//! | OpenBSD           | pledge     | promise string             |
//! | everything else   | baseline   | flag only                  |
//!
//! The process moves from unsandboxed to sandboxed exactly once. A second
//! attempt is rejected with [`SandboxError::AlreadyApplied`] and does not
//! touch the restrictions already in force. Every failure is fatal to the
//! worker: it must exit before fetching anything.

mod baseline;
mod pledge;
#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
mod seccomp;

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::outcome::{EXIT_SANDBOX_FAILED, EXIT_SANDBOX_UNAVAILABLE};

#[derive(Debug, Error)]
pub enum SandboxError {
    /// The platform has no usable sandbox primitive for this profile.
    #[error("sandbox unavailable on {platform}: {reason}")]
    Unavailable {
        platform: &'static str,
        reason: String,
    },

    /// A step of the install sequence failed.
    #[error("sandbox install failed at {step}: {source}")]
    InstallFailed {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    /// `apply` was called a second time in this process.
    #[error("sandbox already applied in this process")]
    AlreadyApplied,
}

impl SandboxError {
    /// Process exit code reported to the orchestrator.
    pub fn exit_code(&self) -> u8 {
        match self {
            SandboxError::Unavailable { .. } => EXIT_SANDBOX_UNAVAILABLE,
            SandboxError::InstallFailed { .. } | SandboxError::AlreadyApplied => {
                EXIT_SANDBOX_FAILED
            }
        }
    }
}

/// One permitted syscall in a seccomp allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedSyscall {
    pub name: &'static str,
    pub nr: i64,
}

/// Restriction descriptor of a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// Default-deny syscall filter; anything not listed kills the process.
    SyscallFilter(Vec<AllowedSyscall>),
    /// Space-separated pledge promises.
    Promises(&'static str),
    /// No kernel primitive; only the flag is recorded.
    Baseline { high_security: bool },
}

/// The restriction applied to this process. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxProfile {
    platform: &'static str,
    restriction: Restriction,
}

impl SandboxProfile {
    /// Profile for the platform this binary was built for.
    #[cfg(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64")
    ))]
    pub fn for_current_platform() -> Self {
        Self {
            platform: "linux",
            restriction: Restriction::SyscallFilter(seccomp::allowed_syscalls()),
        }
    }

    #[cfg(target_os = "openbsd")]
    pub fn for_current_platform() -> Self {
        Self {
            platform: "openbsd",
            restriction: Restriction::Promises(pledge::PROMISES),
        }
    }

    /// Linux without a known audit arch: an empty filter that cannot be
    /// installed, so `apply` fails closed with `Unavailable`.
    #[cfg(all(
        target_os = "linux",
        not(any(target_arch = "x86_64", target_arch = "aarch64"))
    ))]
    pub fn for_current_platform() -> Self {
        Self {
            platform: "linux",
            restriction: Restriction::SyscallFilter(Vec::new()),
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "openbsd")))]
    pub fn for_current_platform() -> Self {
        Self::baseline()
    }

    /// Baseline profile for the current OS.
    pub fn baseline() -> Self {
        Self {
            platform: std::env::consts::OS,
            restriction: Restriction::Baseline {
                high_security: false,
            },
        }
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    pub fn restriction(&self) -> &Restriction {
        &self.restriction
    }

    /// Always true: setup failure aborts the worker.
    pub fn fail_closed(&self) -> bool {
        true
    }

    /// True when the profile is backed by a kernel-enforced primitive.
    pub fn is_kernel_enforced(&self) -> bool {
        !matches!(self.restriction, Restriction::Baseline { .. })
    }
}

impl fmt::Display for SandboxProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.restriction {
            Restriction::SyscallFilter(table) => {
                writeln!(
                    f,
                    "platform: {}\nbackend: seccomp (default deny, {} syscalls)",
                    self.platform,
                    table.len()
                )?;
                for entry in table {
                    writeln!(f, "  {:<20} {}", entry.name, entry.nr)?;
                }
                Ok(())
            }
            Restriction::Promises(promises) => writeln!(
                f,
                "platform: {}\nbackend: pledge\npromises: {}",
                self.platform, promises
            ),
            Restriction::Baseline { high_security } => writeln!(
                f,
                "platform: {}\nbackend: baseline (high_security={})",
                self.platform, high_security
            ),
        }
    }
}

/// The one-way unsandboxed → sandboxed transition.
#[derive(Debug)]
pub struct SandboxState {
    applied: AtomicBool,
}

impl SandboxState {
    pub const fn new() -> Self {
        Self {
            applied: AtomicBool::new(false),
        }
    }

    /// Whether a transition has been attempted (successfully or not).
    pub fn is_applied(&self) -> bool {
        self.applied.load(Ordering::SeqCst)
    }

    /// Claims the transition, then runs `install`. A failed install still
    /// consumes the transition: there is no second try in this process.
    fn transition<F>(&self, install: F) -> Result<(), SandboxError>
    where
        F: FnOnce() -> Result<(), SandboxError>,
    {
        if self
            .applied
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SandboxError::AlreadyApplied);
        }
        install()
    }
}

impl Default for SandboxState {
    fn default() -> Self {
        Self::new()
    }
}

static PROCESS_STATE: SandboxState = SandboxState::new();

/// Applies a profile to the current process.
pub trait Sandbox {
    /// Irreversibly restricts the process. At most one call succeeds.
    fn apply(&self, profile: &SandboxProfile) -> Result<(), SandboxError>;
}

/// The real OS sandbox, dispatching on the profile's restriction.
#[derive(Debug, Clone, Copy)]
pub struct OsSandbox<'a> {
    state: &'a SandboxState,
}

impl OsSandbox<'static> {
    /// Sandbox bound to this process's global transition state.
    pub fn process() -> Self {
        Self {
            state: &PROCESS_STATE,
        }
    }
}

impl<'a> OsSandbox<'a> {
    /// Sandbox bound to a caller-owned transition state.
    pub fn with_state(state: &'a SandboxState) -> Self {
        Self { state }
    }
}

impl Sandbox for OsSandbox<'_> {
    fn apply(&self, profile: &SandboxProfile) -> Result<(), SandboxError> {
        tracing::info!(platform = profile.platform(), "applying sandbox");
        self.state.transition(|| match profile.restriction() {
            Restriction::SyscallFilter(table) => install_syscall_filter(table),
            Restriction::Promises(promises) => pledge::install(promises),
            Restriction::Baseline { high_security } => baseline::install(*high_security),
        })
    }
}

/// Process-wide `apply` for the current platform's profile.
pub fn apply(profile: &SandboxProfile) -> Result<(), SandboxError> {
    OsSandbox::process().apply(profile)
}

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
fn install_syscall_filter(table: &[AllowedSyscall]) -> Result<(), SandboxError> {
    seccomp::install(table)
}

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
fn install_syscall_filter(_table: &[AllowedSyscall]) -> Result<(), SandboxError> {
    Err(SandboxError::Unavailable {
        platform: std::env::consts::OS,
        reason: "seccomp filters need Linux on x86_64 or aarch64".into(),
    })
}
