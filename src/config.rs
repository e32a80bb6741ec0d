/// Application-level constants
pub const APP_NAME: &str = "labelscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default output file for exported rows.
pub const DEFAULT_EXPORT_FILE: &str = "labels.csv";

/// Image extensions picked up when a directory is given as input.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "labelscan_lib=info,labelscan=info,warn"
}
