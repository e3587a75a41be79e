//! # Surge Engine Core
//!
//! Main-thread building blocks shared by every other Surge crate:
//!
//! - [`codec`]: little-endian integers and a portable `f64` encoding
//! - [`pool`]: case-insensitive, reference-counted resource pool
//! - [`scene`]: bounded LIFO of scenes driven by the main loop
//! - [`timer`]: monotonic clock with framestep clamping and pause support

pub mod codec;
pub mod pool;
pub mod scene;
pub mod timer;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Numeric engine version, `major * 10000 + minor * 100 + patch`.
///
/// Written into persisted files so that newer formats can be recognised.
pub const VERSION_CODE: u32 = version_code(
    parse_u32(env!("CARGO_PKG_VERSION_MAJOR")),
    parse_u32(env!("CARGO_PKG_VERSION_MINOR")),
    parse_u32(env!("CARGO_PKG_VERSION_PATCH")),
);

/// Packs a version triple into a single comparable number.
pub const fn version_code(major: u32, minor: u32, patch: u32) -> u32 {
    major * 10000 + minor * 100 + patch
}

const fn parse_u32(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut value = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u32;
        i += 1;
    }
    value
}

/// Logs the engine banner. Called once by the application before any subsystem starts.
pub fn init() {
    log::info!("Surge Core v{} (code {}) initialized", VERSION, VERSION_CODE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_version_code_matches_version_string() {
        let parts: Vec<u32> = VERSION.split('.').map(|p| p.parse().unwrap()).collect();
        assert_eq!(VERSION_CODE, version_code(parts[0], parts[1], parts[2]));
    }

    #[test]
    fn test_version_code_ordering() {
        assert!(version_code(0, 6, 1) > version_code(0, 6, 0));
        assert!(version_code(1, 0, 0) > version_code(0, 99, 99));
    }
}
