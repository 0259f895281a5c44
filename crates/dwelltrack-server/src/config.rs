/// Re-export `Config` from `dwelltrack-core` for use within this crate.
///
/// All environment-variable parsing lives in `dwelltrack-core` so it can be
/// shared with integration tests and future crates without depending on the
/// full server.
pub use dwelltrack_core::config::Config;
