//! Invokes the external C++ tool chain to turn the backend's output artifact
//! into an executable.

use std::path::Path;
use std::process::Command;

/// Links `object_path` into an executable named `executable_name`, with
/// optimizations disabled. Returns the linker's combined failure output on
/// error.
pub fn link_executable(object_path: &Path, executable_name: &str) -> Result<(), String> {
    let output = Command::new("clang++")
        .arg("-O0")
        .arg(object_path)
        .arg("-o")
        .arg(executable_name)
        .output()
        .map_err(|e| format!("Failed to run clang++: {e}"))?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).to_string());
    }

    Ok(())
}
