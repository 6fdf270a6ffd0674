//! Rasterisation: turn a page's HTML into a PNG at the fixed viewport.
//!
//! ## Why a trait?
//!
//! The pipeline only needs "markup file in, PNG file out". Keeping that
//! behind [`RenderBackend`] lets tests inject a pure-Rust renderer and lets
//! callers plug in any browser-automation library they already run.
//!
//! ## Why a session lock?
//!
//! A headless browser profile is not safe to share between concurrent
//! screenshot invocations. [`ChromiumRenderer`] serialises its calls with a
//! mutex, so files processed concurrently still render one page at a time.
//! Rendering is blocking; callers run it inside `spawn_blocking`.

use crate::config::Viewport;
use crate::error::SheetError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, info};

/// Produces one image file per markup file.
pub trait RenderBackend: Send + Sync {
    /// Render `markup` at exactly `viewport` and write a PNG to `target`.
    fn render(&self, markup: &Path, viewport: Viewport, target: &Path) -> Result<(), SheetError>;
}

/// Environment variables consulted, in order, when no browser path is given.
pub const BROWSER_ENV_VARS: &[&str] = &["SHEET2PNG_BROWSER", "CHROME", "CHROMIUM"];

/// Executable names searched on `PATH`.
pub const BROWSER_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Headless Chromium/Chrome screenshot backend.
#[derive(Debug)]
pub struct ChromiumRenderer {
    binary: PathBuf,
    session: Mutex<()>,
}

impl ChromiumRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            session: Mutex::new(()),
        }
    }

    /// Locate a browser: explicit path, then env vars, then `PATH`.
    pub fn detect(explicit: Option<&Path>) -> Result<Self, SheetError> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(Self::new(path));
            }
            return Err(SheetError::BrowserNotFound(format!(
                "'{}' does not exist",
                path.display()
            )));
        }

        for var in BROWSER_ENV_VARS {
            if let Some(value) = std::env::var_os(var) {
                let path = PathBuf::from(value);
                if path.is_file() {
                    debug!("Using browser from ${}: {}", var, path.display());
                    return Ok(Self::new(path));
                }
            }
        }

        let search_path = std::env::var_os("PATH").unwrap_or_default();
        if let Some(found) = find_in_path(&search_path, BROWSER_NAMES) {
            info!("Using browser {}", found.display());
            return Ok(Self::new(found));
        }

        Err(SheetError::BrowserNotFound(format!(
            "none of {} on PATH",
            BROWSER_NAMES.join(", ")
        )))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn args(markup: &Path, viewport: Viewport, target: &Path) -> Vec<String> {
        vec![
            "--headless".into(),
            "--disable-gpu".into(),
            "--no-sandbox".into(),
            "--hide-scrollbars".into(),
            "--force-device-scale-factor=1".into(),
            format!("--window-size={},{}", viewport.width, viewport.height),
            format!("--screenshot={}", target.display()),
            format!("file://{}", markup.display()),
        ]
    }
}

impl RenderBackend for ChromiumRenderer {
    fn render(&self, markup: &Path, viewport: Viewport, target: &Path) -> Result<(), SheetError> {
        let page = markup
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let failed = |detail: String| SheetError::RenderFailed {
            page: page.clone(),
            detail,
        };

        let markup = markup
            .canonicalize()
            .map_err(|e| failed(format!("markup not readable: {e}")))?;

        let _session = self
            .session
            .lock()
            .map_err(|_| SheetError::Internal("browser session lock poisoned".into()))?;

        let output = Command::new(&self.binary)
            .args(Self::args(&markup, viewport, target))
            .output()
            .map_err(|e| failed(format!("could not start {}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "browser exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !target.is_file() {
            return Err(failed("browser produced no screenshot".into()));
        }

        debug!("Rendered {} → {}", page, target.display());
        Ok(())
    }
}

fn find_in_path(search_path: &std::ffi::OsStr, names: &[&str]) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_path) {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
