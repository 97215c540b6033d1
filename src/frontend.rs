//! Interaction frontends: one scripted request, or a read loop on stdin.
use crate::error::Result;
use crate::runner::RunResult;
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Typing this (any case) ends the interactive loop
pub const EXIT_SENTINEL: &str = "exit";

pub const SCREENSHOTS_DIR: &str = "screenshots";

pub const DEFAULT_TARGET_URL: &str = "https://example.com";

/// Executes one natural-language request
#[async_trait::async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &str) -> Result<RunResult>;
}

pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Create `<base>/screenshots` if missing and return its path
pub fn ensure_screenshots_dir(base: &Path) -> Result<PathBuf> {
    let dir = base.join(SCREENSHOTS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn screenshot_file_name(now: DateTime<Local>) -> String {
    format!("screenshot_{}.png", now.format("%Y%m%d_%H%M%S"))
}

/// The fixed multi-step request used by the scripted frontend
pub fn scripted_request(url: &str, screenshot_path: &Path) -> String {
    let file_name = screenshot_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "Please complete these steps in order:\n\
         1. Navigate to {url}\n\
         2. Wait until the page has finished loading\n\
         3. Take a full-page screenshot and save it as '{file_name}' (full path: {path})\n\
         4. Report the page title and the location of the saved screenshot",
        url = url,
        file_name = file_name,
        path = screenshot_path.display(),
    )
}

/// What the post-run screenshot check found
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotReport {
    pub expected: PathBuf,
    /// Size of the expected file, if it exists
    pub size: Option<u64>,
    /// Every `.png` in the directory with its size, sorted by path
    pub found: Vec<(PathBuf, u64)>,
}

/// Check whether the expected screenshot exists and list what the directory holds
pub fn report_screenshots<W: Write>(expected: &Path, dir: &Path, out: &mut W) -> Result<ScreenshotReport> {
    let size = std::fs::metadata(expected).ok().filter(|m| m.is_file()).map(|m| m.len());
    match size {
        Some(bytes) => writeln!(out, "Screenshot saved: {} ({} bytes)", expected.display(), bytes)?,
        None => writeln!(out, "Screenshot not found at {}", expected.display())?,
    }

    let mut found = Vec::new();
    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_png = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if is_png {
                let len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                found.push((path, len));
            }
        }
    }
    found.sort();

    if !found.is_empty() {
        writeln!(out, "Screenshots in {}:", dir.display())?;
        for (path, len) in &found {
            writeln!(out, "  {} ({} bytes)", path.display(), len)?;
        }
    }

    Ok(ScreenshotReport {
        expected: expected.to_path_buf(),
        size,
        found,
    })
}

/// Run the fixed request once, print the result and check for the screenshot
pub async fn run_scripted<E, W>(
    executor: &E,
    url: &str,
    screenshots_dir: &Path,
    out: &mut W,
) -> Result<(RunResult, ScreenshotReport)>
where
    E: RequestExecutor + ?Sized,
    W: Write,
{
    let screenshot_path = screenshots_dir.join(screenshot_file_name(Local::now()));
    let request = scripted_request(url, &screenshot_path);
    writeln!(out, "\nProcessing request:\n{}\n", request)?;

    let result = executor.execute(&request).await?;
    writeln!(out, "\nResult: {}", result)?;

    let report = report_screenshots(&screenshot_path, screenshots_dir, out)?;
    Ok((result, report))
}

/// Read requests line by line until the exit sentinel or end of input.
///
/// Returns how many requests were executed.
pub async fn interactive_loop<E, R, W>(executor: &E, mut reader: R, out: &mut W) -> Result<usize>
where
    E: RequestExecutor + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut executed = 0;
    let mut line = String::new();

    loop {
        writeln!(out, "\nEnter your request (or '{}' to quit):", EXIT_SENTINEL)?;
        out.flush()?;

        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            tracing::debug!("Input closed, leaving interactive loop");
            break;
        }

        let request = line.trim();
        if is_exit(request) {
            break;
        }

        writeln!(out, "\nProcessing request: {}\n", request)?;
        let result = executor.execute(request).await?;
        executed += 1;
        writeln!(out, "\nResult: {}", result)?;
    }

    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        requests: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl RequestExecutor for RecordingExecutor {
        async fn execute(&self, request: &str) -> Result<RunResult> {
            self.requests.lock().unwrap().push(request.to_string());
            if self.fail {
                return Err(Error::LLMError("boom".to_string()));
            }
            Ok(RunResult {
                input: request.to_string(),
                final_output: format!("done: {}", request),
                new_items: vec![],
                last_agent: "Playwright Assistant".to_string(),
                trace_id: None,
                turns: 1,
            })
        }
    }

    #[test]
    fn test_exit_sentinel_any_case() {
        for word in ["exit", "EXIT", "Exit", "eXiT", "  exit  "] {
            assert!(is_exit(word), "{word:?} should exit");
        }
        assert!(!is_exit("exit now"));
        assert!(!is_exit("quit"));
    }

    #[tokio::test]
    async fn test_exit_terminates_without_request() {
        for word in ["exit\n", "EXIT\n", "ExIt\n"] {
            let executor = RecordingExecutor::default();
            let mut out = Vec::new();
            let executed = interactive_loop(&executor, word.as_bytes(), &mut out).await.unwrap();
            assert_eq!(executed, 0);
            assert!(executor.requests.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_each_line_executed_once() {
        let executor = RecordingExecutor::default();
        let input = "Navigate to https://example.com and screenshot it\nopen github.com\nexit\nnever read\n";
        let mut out = Vec::new();
        let executed = interactive_loop(&executor, input.as_bytes(), &mut out).await.unwrap();

        assert_eq!(executed, 2);
        assert_eq!(
            *executor.requests.lock().unwrap(),
            vec!["Navigate to https://example.com and screenshot it", "open github.com"]
        );
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("Result: RunResult:"));
        assert!(printed.contains("done: open github.com"));
    }

    #[tokio::test]
    async fn test_end_of_input_stops_loop() {
        let executor = RecordingExecutor::default();
        let mut out = Vec::new();
        let executed = interactive_loop(&executor, "one request".as_bytes(), &mut out)
            .await
            .unwrap();
        assert_eq!(executed, 1);
    }

    #[tokio::test]
    async fn test_executor_error_propagates() {
        let executor = RecordingExecutor {
            fail: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = interactive_loop(&executor, "first\nsecond\n".as_bytes(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LLMError(_)));
        assert_eq!(executor.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_screenshots_dir_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let first = ensure_screenshots_dir(base.path()).unwrap();
        let second = ensure_screenshots_dir(base.path()).unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert_eq!(first, base.path().join("screenshots"));
    }

    #[test]
    fn test_screenshot_file_name() {
        let now = Local.with_ymd_and_hms(2026, 10, 19, 8, 5, 9).unwrap();
        assert_eq!(screenshot_file_name(now), "screenshot_20261019_080509.png");
    }

    #[test]
    fn test_scripted_request_embeds_path() {
        let path = Path::new("/tmp/screenshots/screenshot_20261019_080509.png");
        let request = scripted_request(DEFAULT_TARGET_URL, path);
        assert!(request.contains("Navigate to https://example.com"));
        assert!(request.contains("'screenshot_20261019_080509.png'"));
        assert!(request.contains("/tmp/screenshots/screenshot_20261019_080509.png"));
    }

    #[test]
    fn test_report_screenshots() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("shot.png");
        std::fs::write(&expected, [0u8; 16]).unwrap();
        std::fs::write(dir.path().join("older.PNG"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let mut out = Vec::new();
        let report = report_screenshots(&expected, dir.path(), &mut out).unwrap();
        assert_eq!(report.size, Some(16));
        assert_eq!(report.found.len(), 2);

        let missing = dir.path().join("missing.png");
        let report = report_screenshots(&missing, dir.path(), &mut out).unwrap();
        assert_eq!(report.size, None);
        assert!(String::from_utf8(out).unwrap().contains("Screenshot not found"));
    }

    #[tokio::test]
    async fn test_run_scripted_single_request() {
        let dir = tempfile::tempdir().unwrap();
        let executor = RecordingExecutor::default();
        let mut out = Vec::new();
        let (result, report) = run_scripted(&executor, DEFAULT_TARGET_URL, dir.path(), &mut out)
            .await
            .unwrap();

        let requests = executor.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(result.input, requests[0]);
        assert!(requests[0].contains(&report.expected.display().to_string()));
        assert_eq!(report.size, None);
    }
}
