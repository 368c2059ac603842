//! # Core Module
//!
//! Small shared building blocks used throughout the streaming engine.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `fatal`: Logs and aborts on structural invariant violations

pub mod mt_resource;

pub use mt_resource::MtResource;

/// Logs `message` at error level and aborts the process.
///
/// Used when a structural invariant of the streaming pipeline is broken (an illegal
/// state transition, an exhausted sub-chunk pool). Continuing would risk two owners
/// writing the same GPU-visible buffer, and unwinding a worker would leave the state
/// machine stuck, so the process stops here.
pub fn fatal(message: &str) -> ! {
    log::error!("{}", message);
    std::process::abort()
}
