use std::process::Command;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    emit_build_metadata();

    #[cfg(feature = "grpc")]
    {
        tonic_prost_build::configure()
            .compile_protos(&["proto/health.proto"], &["proto"])?;
    }
    Ok(())
}

/// Expose build metadata to `build_info` through `env!`/`option_env!`
fn emit_build_metadata() {
    println!("cargo:rerun-if-changed=proto/health.proto");
    println!("cargo:rerun-if-env-changed=APP_LAYOUT_COMMIT_ID");
    // Any source edit refreshes the build time
    println!("cargo:rerun-if-changed=src");
    rerun_on_git_head_change();

    let build_time = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    println!("cargo:rustc-env=APP_LAYOUT_BUILD_TIME={}", build_time);

    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=APP_LAYOUT_BUILD_USER={}", user);

    let commit = std::env::var("APP_LAYOUT_COMMIT_ID")
        .ok()
        .or_else(|| command_output("git", &["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=APP_LAYOUT_COMMIT_ID={}", commit);

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version =
        command_output(&rustc, &["--version"]).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=APP_LAYOUT_RUSTC_VERSION={}", rustc_version);

    let arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=APP_LAYOUT_TARGET_ARCH={}", arch);

    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=APP_LAYOUT_TARGET_OS={}", os);
}

/// Re-run when HEAD moves so the commit id never goes stale
fn rerun_on_git_head_change() {
    let Some(git_dir) = command_output("git", &["rev-parse", "--git-dir"]) else {
        return;
    };
    let git_dir = std::path::PathBuf::from(git_dir);

    let head = git_dir.join("HEAD");
    let mut watched = vec![head.clone(), git_dir.join("packed-refs")];

    // A symbolic HEAD moves when the branch ref it points to changes
    if let Some(reference) = std::fs::read_to_string(&head)
        .ok()
        .and_then(|text| text.trim().strip_prefix("ref: ").map(str::to_string))
    {
        watched.push(git_dir.join(reference));
    }

    // Missing paths would force a rerun on every build
    for path in watched.iter().filter(|path| path.exists()) {
        println!("cargo:rerun-if-changed={}", path.display());
    }
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
