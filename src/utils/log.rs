// src/utils/log.rs

//! Console helpers for run banners and summaries.
//!
//! Everything goes through the `log` facade so the CLI's logger decides
//! formatting and filtering.

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {}", message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        sub_item(&format!("{key}: {value}"));
    }
}
