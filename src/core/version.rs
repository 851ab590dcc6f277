//! Build metadata generated by the build script.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Client API version from the package metadata. Falls back to a fixed
/// value if the build script could not read it.
pub fn api_version() -> u32 {
    CLIENT_API_VERSION.parse().unwrap_or(20261016)
}

pub fn build_time() -> &'static str {
    BUILD_TIME
}

pub fn git_hash() -> &'static str {
    GIT_HASH
}

fn component(text: &str) -> u32 {
    text.parse().unwrap_or(0) & 0xff
}

/// Package version packed as `major << 16 | minor << 8 | patch`.
pub fn int_version() -> u32 {
    (component(env!("CARGO_PKG_VERSION_MAJOR")) << 16)
        | (component(env!("CARGO_PKG_VERSION_MINOR")) << 8)
        | component(env!("CARGO_PKG_VERSION_PATCH"))
}

pub fn version_string() -> String {
    format!(
        "{} {} (api {}, git {}, built {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        CLIENT_API_VERSION,
        GIT_HASH,
        BUILD_TIME
    )
}
