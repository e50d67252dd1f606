//! Smoke tests for the `shadelink-reflect` binary.

use std::path::PathBuf;
use std::process::{Command, Output};

fn shader_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_shaders")
}

fn reflect(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shadelink-reflect"))
        .args(args)
        .current_dir(shader_dir())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run shadelink-reflect")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_prints_entry_points_and_layout() {
    let output = reflect(&["particles"]);
    let stdout = stdout(&output);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    assert!(stdout.starts_with("CWD: "), "{}", stdout);
    assert!(stdout.contains("=== Begin update (function) ===\n"), "{}", stdout);
    assert!(stdout.contains("\tdeltaTime: float\n"), "{}", stdout);
    assert!(stdout.contains("=== End update ===\n"), "{}", stdout);
    assert!(
        stdout.contains(
            "Num entrypoint: 1\tNum parameter count: 1\tNum hashed string: 1\tNum type parameter: 0\n"
        ),
        "{}",
        stdout
    );
    assert!(stdout.contains("[slot=0, space=0, category=3] particles\n"), "{}", stdout);
    assert!(!stdout.contains("Diagnostics message:"), "{}", stdout);
}

#[test]
fn test_register_target_from_include_path() {
    let output = Command::new(env!("CARGO_BIN_EXE_shadelink-reflect"))
        .args(["particles", "--target", "hlsl", "--profile", "sm_6_0", "-I"])
        .arg(shader_dir())
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .expect("Failed to run shadelink-reflect");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("[slot=0, space=0, category=3] particles\n"));
}

#[test]
fn test_load_failure_prints_diagnostics_and_fails() {
    let output = reflect(&["broken"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("Diagnostics message:\n"));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("failed to load module 'broken'")
    );
}

#[test]
fn test_unresolved_extern_fails_to_link() {
    let output = reflect(&["lighting"]);
    assert!(!output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("=== Begin vsMain (function) ==="), "{}", stdout);
    assert!(
        stdout.contains("entry point 'fsMain' references unresolved symbol 'shadow'"),
        "{}",
        stdout
    );
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("failed to link module 'lighting'")
    );
}

#[test]
fn test_unknown_profile_is_rejected() {
    let output = reflect(&["particles", "--profile", "spirv_9_9"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown profile 'spirv_9_9'"));
}
