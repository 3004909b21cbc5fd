// Build-time version from Cargo.toml

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `name version`, stamped into the HTML report footer.
pub fn generator_tag() -> String {
    format!("{NAME} {VERSION}")
}
