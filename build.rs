use std::process::Command;

fn main() {
    let built_at = chrono::Utc::now().format("%Y-%m-%d").to_string();
    println!("cargo:rustc-env=AUTOFARM_BUILT_AT={built_at}");

    let revision = git_revision().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=AUTOFARM_REVISION={revision}");

    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
