//! Profile command: show the sandbox this binary applies, without applying it.

use rpdl_core::outcome::EXIT_SUCCESS;
use rpdl_core::sandbox::SandboxProfile;

pub fn run_profile() -> u8 {
    let profile = SandboxProfile::for_current_platform();
    print!("{}", profile);
    println!(
        "enforcement: {}",
        if profile.is_kernel_enforced() {
            "kernel"
        } else {
            "none"
        }
    );
    EXIT_SUCCESS
}
