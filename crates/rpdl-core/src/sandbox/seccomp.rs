//! Linux backend: default-deny seccomp-bpf filter built from a syscall table.
//!
//! # Install sequence
//!
//! 1. `PR_SET_NO_NEW_PRIVS` so neither this process nor its children can gain
//!    privileges through setuid binaries or file capabilities.
//! 2. `PR_SET_DUMPABLE = 0` so the filter cannot be bypassed with ptrace.
//! 3. Build the BPF program: architecture check, then one compare/allow pair
//!    per table entry, then kill-process.
//! 4. The entries come from [`allowed_syscalls`], never from inline calls.
//! 5. Install with `PR_SET_SECCOMP` and drop the program.
//!
//! The steps only exist inside [`install`]; callers cannot run a subset.

#![allow(clippy::unreadable_literal)]

use std::io;

use tracing::{debug, info};

use super::{AllowedSyscall, SandboxError};

// ============================================================================
// Constants
// ============================================================================

/// Seccomp filter action: allow syscall.
const SECCOMP_RET_ALLOW: u32 = 0x7fff_0000;

/// Seccomp filter action: kill the whole process.
const SECCOMP_RET_KILL_PROCESS: u32 = 0x8000_0000;

/// BPF_LD | BPF_W | BPF_ABS
const BPF_LD_W_ABS: u16 = 0x20;
/// BPF_JMP | BPF_JEQ | BPF_K
const BPF_JEQ_K: u16 = 0x15;
/// BPF_RET | BPF_K
const BPF_RET_K: u16 = 0x06;

/// Offsets into `struct seccomp_data`.
const SECCOMP_DATA_NR: u32 = 0;
const SECCOMP_DATA_ARCH: u32 = 4;

/// Instructions before the first table entry.
pub(super) const FILTER_HEADER_LEN: usize = 4;

#[cfg(target_arch = "x86_64")]
const AUDIT_ARCH: u32 = 0xC000_003E;
#[cfg(target_arch = "aarch64")]
const AUDIT_ARCH: u32 = 0xC000_00B7;

const fn allow(name: &'static str, nr: libc::c_long) -> AllowedSyscall {
    AllowedSyscall {
        name,
        nr: nr as i64,
    }
}

// ============================================================================
// Allow-list
// ============================================================================

/// Syscalls with the same name on every supported 64-bit architecture.
static BASE_SYSCALLS: &[AllowedSyscall] = &[
    // Bootstrap and exit: needed the instant the filter is live.
    allow("read", libc::SYS_read),
    allow("write", libc::SYS_write),
    allow("exit", libc::SYS_exit),
    allow("exit_group", libc::SYS_exit_group),
    allow("rt_sigreturn", libc::SYS_rt_sigreturn),
    allow("brk", libc::SYS_brk),
    // Memory
    allow("mmap", libc::SYS_mmap),
    allow("munmap", libc::SYS_munmap),
    allow("mremap", libc::SYS_mremap),
    allow("mprotect", libc::SYS_mprotect),
    allow("madvise", libc::SYS_madvise),
    // Threads (libcurl's threaded resolver) and runtime
    allow("clone", libc::SYS_clone),
    allow("clone3", libc::SYS_clone3),
    allow("futex", libc::SYS_futex),
    allow("set_robust_list", libc::SYS_set_robust_list),
    allow("rseq", libc::SYS_rseq),
    allow("sched_yield", libc::SYS_sched_yield),
    allow("sched_getaffinity", libc::SYS_sched_getaffinity),
    allow("sigaltstack", libc::SYS_sigaltstack),
    allow("rt_sigaction", libc::SYS_rt_sigaction),
    allow("rt_sigprocmask", libc::SYS_rt_sigprocmask),
    allow("gettid", libc::SYS_gettid),
    allow("getpid", libc::SYS_getpid),
    allow("tgkill", libc::SYS_tgkill),
    // Time and entropy
    allow("clock_gettime", libc::SYS_clock_gettime),
    allow("gettimeofday", libc::SYS_gettimeofday),
    allow("nanosleep", libc::SYS_nanosleep),
    allow("clock_nanosleep", libc::SYS_clock_nanosleep),
    allow("clock_getres", libc::SYS_clock_getres),
    allow("getrandom", libc::SYS_getrandom),
    // Identity (home directory lookup, CA paths)
    allow("getuid", libc::SYS_getuid),
    allow("geteuid", libc::SYS_geteuid),
    allow("getgid", libc::SYS_getgid),
    allow("getegid", libc::SYS_getegid),
    allow("uname", libc::SYS_uname),
    allow("prlimit64", libc::SYS_prlimit64),
    allow("sysinfo", libc::SYS_sysinfo),
    // File descriptors
    allow("close", libc::SYS_close),
    allow("fcntl", libc::SYS_fcntl),
    allow("ioctl", libc::SYS_ioctl),
    allow("dup", libc::SYS_dup),
    allow("dup3", libc::SYS_dup3),
    allow("pipe2", libc::SYS_pipe2),
    allow("eventfd2", libc::SYS_eventfd2),
    allow("ppoll", libc::SYS_ppoll),
    // select() in curl_multi_wait goes through pselect6 in glibc
    allow("pselect6", libc::SYS_pselect6),
    allow("readv", libc::SYS_readv),
    allow("writev", libc::SYS_writev),
    allow("pread64", libc::SYS_pread64),
    allow("lseek", libc::SYS_lseek),
    // Files: CA bundles, resolver config, output file
    allow("openat", libc::SYS_openat),
    allow("newfstatat", libc::SYS_newfstatat),
    allow("fstat", libc::SYS_fstat),
    allow("statx", libc::SYS_statx),
    allow("faccessat", libc::SYS_faccessat),
    allow("faccessat2", libc::SYS_faccessat2),
    allow("getdents64", libc::SYS_getdents64),
    allow("readlinkat", libc::SYS_readlinkat),
    allow("getcwd", libc::SYS_getcwd),
    allow("mkdirat", libc::SYS_mkdirat),
    allow("renameat", libc::SYS_renameat),
    allow("renameat2", libc::SYS_renameat2),
    allow("unlinkat", libc::SYS_unlinkat),
    allow("utimensat", libc::SYS_utimensat),
    allow("ftruncate", libc::SYS_ftruncate),
    allow("fsync", libc::SYS_fsync),
    allow("fdatasync", libc::SYS_fdatasync),
    // Sockets (libcurl, DNS)
    allow("socket", libc::SYS_socket),
    allow("socketpair", libc::SYS_socketpair),
    allow("connect", libc::SYS_connect),
    allow("bind", libc::SYS_bind),
    allow("getsockname", libc::SYS_getsockname),
    allow("getpeername", libc::SYS_getpeername),
    allow("getsockopt", libc::SYS_getsockopt),
    allow("setsockopt", libc::SYS_setsockopt),
    allow("sendto", libc::SYS_sendto),
    allow("recvfrom", libc::SYS_recvfrom),
    allow("sendmsg", libc::SYS_sendmsg),
    allow("recvmsg", libc::SYS_recvmsg),
    allow("sendmmsg", libc::SYS_sendmmsg),
    allow("shutdown", libc::SYS_shutdown),
];

/// Legacy entry points that only exist on x86_64 and that glibc still uses there.
#[cfg(target_arch = "x86_64")]
static ARCH_SYSCALLS: &[AllowedSyscall] = &[
    allow("open", libc::SYS_open),
    allow("stat", libc::SYS_stat),
    allow("lstat", libc::SYS_lstat),
    allow("access", libc::SYS_access),
    allow("poll", libc::SYS_poll),
    allow("select", libc::SYS_select),
    allow("mkdir", libc::SYS_mkdir),
    allow("rename", libc::SYS_rename),
    allow("unlink", libc::SYS_unlink),
    allow("getdents", libc::SYS_getdents),
    allow("readlink", libc::SYS_readlink),
];

#[cfg(not(target_arch = "x86_64"))]
static ARCH_SYSCALLS: &[AllowedSyscall] = &[];

/// The complete allow-list for this architecture.
pub(super) fn allowed_syscalls() -> Vec<AllowedSyscall> {
    BASE_SYSCALLS
        .iter()
        .chain(ARCH_SYSCALLS)
        .copied()
        .collect()
}

// ============================================================================
// BPF Structures
// ============================================================================

/// BPF filter instruction (sock_filter).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SockFilter {
    code: u16,
    jt: u8,
    jf: u8,
    k: u32,
}

impl SockFilter {
    const fn stmt(code: u16, k: u32) -> Self {
        Self {
            code,
            jt: 0,
            jf: 0,
            k,
        }
    }

    const fn jump(code: u16, k: u32, jt: u8, jf: u8) -> Self {
        Self { code, jt, jf, k }
    }
}

/// BPF program (sock_fprog).
#[repr(C)]
struct SockFprog {
    len: u16,
    filter: *const SockFilter,
}

/// Builds the filter program for `table` on the architecture `audit_arch`.
pub(super) fn build_filter(audit_arch: u32, table: &[AllowedSyscall]) -> Vec<SockFilter> {
    let mut filter = Vec::with_capacity(FILTER_HEADER_LEN + 2 * table.len() + 1);

    // Reject foreign-ABI syscalls outright: their numbers mean something else.
    filter.push(SockFilter::stmt(BPF_LD_W_ABS, SECCOMP_DATA_ARCH));
    filter.push(SockFilter::jump(BPF_JEQ_K, audit_arch, 1, 0));
    filter.push(SockFilter::stmt(BPF_RET_K, SECCOMP_RET_KILL_PROCESS));
    filter.push(SockFilter::stmt(BPF_LD_W_ABS, SECCOMP_DATA_NR));

    for entry in table {
        filter.push(SockFilter::jump(BPF_JEQ_K, entry.nr as u32, 0, 1));
        filter.push(SockFilter::stmt(BPF_RET_K, SECCOMP_RET_ALLOW));
    }

    filter.push(SockFilter::stmt(BPF_RET_K, SECCOMP_RET_KILL_PROCESS));
    filter
}

// ============================================================================
// Install
// ============================================================================

fn last_error(step: &'static str) -> SandboxError {
    SandboxError::InstallFailed {
        step,
        source: io::Error::last_os_error(),
    }
}

/// Runs the full install sequence. Irreversible on success.
pub(super) fn install(table: &[AllowedSyscall]) -> Result<(), SandboxError> {
    // SAFETY: prctl with integer arguments only changes flags of this process.
    unsafe {
        if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != 0 {
            return Err(last_error("PR_SET_NO_NEW_PRIVS"));
        }
        if libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) != 0 {
            return Err(last_error("PR_SET_DUMPABLE"));
        }
    }

    let filter = build_filter(AUDIT_ARCH, table);
    let len = u16::try_from(filter.len()).map_err(|_| SandboxError::InstallFailed {
        step: "build filter",
        source: io::Error::new(io::ErrorKind::InvalidInput, "filter program too long"),
    })?;
    let prog = SockFprog {
        len,
        filter: filter.as_ptr(),
    };
    debug!(instructions = filter.len(), "seccomp filter built");

    // SAFETY: `prog` points at `filter`, which outlives the call; the kernel
    // copies the program before returning.
    let rc = unsafe {
        libc::prctl(
            libc::PR_SET_SECCOMP,
            libc::SECCOMP_MODE_FILTER,
            &prog as *const SockFprog,
            0,
            0,
        )
    };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINVAL) {
            return Err(SandboxError::Unavailable {
                platform: "linux",
                reason: "kernel does not support seccomp filters".into(),
            });
        }
        return Err(SandboxError::InstallFailed {
            step: "PR_SET_SECCOMP",
            source: err,
        });
    }
    drop(filter);

    info!(syscalls = table.len(), "seccomp filter installed");
    Ok(())
}
