use std::env;
use std::process::Command;

/// Short commit hash from `GIT_SHA` or the local checkout
fn commit_sha() -> Option<String> {
    if let Ok(sha) = env::var("GIT_SHA")
        && !sha.trim().is_empty()
    {
        return Some(sha.trim().to_string());
    }
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    let base = env!("CARGO_PKG_VERSION");

    // Release builds report the bare crate version
    let release = env::var("ENERGYMETER_RELEASE").is_ok_and(|v| v == "1");
    let version = match (release, commit_sha()) {
        (false, Some(sha)) => format!("{}+{}", base, sha),
        _ => base.to_string(),
    };
    println!("cargo:rustc-env=APP_VERSION={}", version);

    println!("cargo:rerun-if-env-changed=ENERGYMETER_RELEASE");
    println!("cargo:rerun-if-env-changed=GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
