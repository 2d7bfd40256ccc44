//! Shared types for the agent-desktop distribution shim.
//!
//! Everything in this crate is pure: platform resolution, release asset
//! naming and checksum manifest parsing. Side effects live in `shim-core`.

pub mod checksum;
pub mod platform;
pub mod release;

pub use checksum::{ChecksumManifest, DigestError, ManifestEntry, Sha256Digest};
pub use platform::{PlatformKey, TargetSpec, Unsupported, resolve};
pub use release::ReleaseAsset;

/// Name of the wrapped program, used for log prefixes and the global entry point.
pub const PROGRAM_NAME: &str = "agent-desktop";

/// Project home page shown in remediation messages.
pub const REPOSITORY_URL: &str = "https://github.com/lahfir/agent-desktop";
