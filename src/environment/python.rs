//! Python Interpreter Environment
//!
//! Locates the interpreter used to run generated dataset scripts and
//! checks that the packages those scripts import are installed.
//!
//! # Interpreter Resolution Priority
//!
//! 1. Explicit path from configuration
//! 2. `DEMOFORGE_PYTHON` environment variable
//! 3. `python3` on the system PATH
//! 4. `python` on the system PATH

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use once_cell::sync::Lazy;

/// Environment variable overriding interpreter discovery.
pub const PYTHON_ENV_VAR: &str = "DEMOFORGE_PYTHON";

/// Modules generated dataset scripts are written against.
pub const REQUIRED_PACKAGES: &[&str] = &["pandas", "numpy", "faker"];

/// Prints the names of modules that cannot be imported, one per line.
const MISSING_MODULES_PROBE: &str = "import importlib.util, sys\n\
for name in sys.argv[1:]:\n    \
if importlib.util.find_spec(name) is None:\n        \
print(name)\n";

/// Lazily-discovered interpreter path.
pub static PYTHON_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(path) = std::env::var(PYTHON_ENV_VAR) {
        if !path.trim().is_empty() {
            info!("Using {} interpreter: {}", PYTHON_ENV_VAR, path);
            return PathBuf::from(path.trim());
        }
    }

    for candidate in ["python3", "python"] {
        if let Some(path) = find_in_path(candidate) {
            info!("Using system interpreter: {}", path.display());
            return path;
        }
    }

    warn!("No Python interpreter found");
    warn!("  Searched: ${}", PYTHON_ENV_VAR);
    warn!("  Searched: python3, python on system PATH");

    PathBuf::from("python3")
});

/// Returns the configured interpreter, or the discovered one.
pub fn resolve_interpreter(configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(path) => path.to_path_buf(),
        None => PYTHON_PATH.clone(),
    }
}

/// Looks a program up on the system PATH.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(program).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Returns the interpreter's version string, e.g. `Python 3.11.4`.
pub fn interpreter_version(interpreter: &Path) -> io::Result<String> {
    let output = Command::new(interpreter).arg("--version").output()?;

    // Python 2 printed its version on stderr
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };

    if !output.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} --version failed: {}", interpreter.display(), text),
        ));
    }
    Ok(text)
}

/// Returns the packages from `packages` the interpreter cannot import.
pub fn check_packages(interpreter: &Path, packages: &[&str]) -> io::Result<Vec<String>> {
    debug!("Checking packages {:?} with {}", packages, interpreter.display());

    let output = Command::new(interpreter)
        .arg("-c")
        .arg(MISSING_MODULES_PROBE)
        .args(packages)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("package check failed: {}", stderr.trim()),
        ));
    }

    Ok(parse_missing(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_missing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
