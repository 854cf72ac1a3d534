//! `wstun info` (§15): reports build information. Rust's standard library
//! has no equivalent of a VCS-embedding build-info reporter without a
//! build-script crate (e.g. `vergen`) that nothing else here needs, so this
//! reports crate version, OS/ARCH, and a fixed project URL from
//! `env!`/`std::env::consts` instead.

/// Fixed project URL reported by `info`, in place of the VCS revision
/// metadata a build-script crate would otherwise need to provide.
const PROJECT_URL: &str = "https://github.com/wstun-project/wstun";

pub fn run() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("Platform: {}/{}", std::env::consts::OS, std::env::consts::ARCH);
    println!("Project page: {PROJECT_URL}");
}
