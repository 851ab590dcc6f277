//! Ambient infrastructure shared by the runtime

pub mod config;
pub mod diagnostics;
pub mod error_handling;
pub mod logging;
pub mod shutdown;
pub mod sync;
pub mod version;
