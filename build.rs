/// Build script
/// Injects app metadata into Rust code. A package.json next to the crate
/// (the web front-end manifest) wins over Cargo metadata when present.
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=package.json");
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let package_json = fs::read_to_string(manifest_dir.join("package.json")).ok();

    let name = package_json
        .as_deref()
        .and_then(|json| extract_json_field(json, "name"))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    let version = package_json
        .as_deref()
        .and_then(|json| extract_json_field(json, "version"))
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    // Normalize name for file system use (lowercase, alphanumeric + hyphens only)
    let app_id = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>();

    println!("cargo:rustc-env=APP_NAME={}", name);
    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rustc-env=APP_ID={}", app_id);
}

// Simple JSON field extractor (avoids serde dependency in build script)
fn extract_json_field(json: &str, field: &str) -> Option<String> {
    let pattern = format!(r#""{}""#, field);
    let start = json.find(&pattern)?;
    let colon_pos = json[start..].find(':')?;
    let after_colon = json[start + colon_pos + 1..].trim_start();
    let rest = after_colon.strip_prefix('"')?;
    let end_quote = rest.find('"')?;
    Some(rest[..end_quote].to_string())
}
