//! Bounded execution supervisor and the `analyze` entry point.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dataset::DataFrame;
use crate::llm::LlmClient;
use crate::pipeline::{self, runner::PipelineRunner};
use crate::router::{route, Route};

/// Normalized outcome of one request. Every execution path of `analyze`
/// produces one of these; errors never escape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Analysis { response: String },
    Visualization { text: String, image_url: String },
    Error { error: String },
    Timeout { message: String },
}

const TIMEOUT_MESSAGE: &str =
    "The analysis is taking longer than expected. Please try a more specific question.";

const FILE_NOT_FOUND_MESSAGE: &str = "The agent attempted to create the visualization, but the \
                                      final file was not found. Check the logs for details.";

pub struct Engine {
    cfg: Config,
    output_dir: PathBuf,
    deadline: Duration,
}

impl Engine {
    pub fn new(cfg: Config) -> Self {
        let output_dir = cfg.output_path();
        let deadline = cfg.pipeline_timeout();
        Self {
            cfg,
            output_dir,
            deadline,
        }
    }

    /// Route the question, run the matching agent pipeline under the
    /// deadline, and normalize whatever happens into a typed result.
    pub async fn analyze(&self, df: Arc<DataFrame>, question: &str) -> AnalysisResult {
        match self.try_analyze(df, question).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %format!("{e:#}"), "analysis failed");
                AnalysisResult::Error {
                    error: format!(
                        "An error occurred during the analysis: {e:#}. Try rephrasing your \
                         question or check the data."
                    ),
                }
            }
        }
    }

    async fn try_analyze(&self, df: Arc<DataFrame>, question: &str) -> Result<AnalysisResult> {
        if self.cfg.get("OPENAI_API_KEY").is_none() {
            bail!("OPENAI_API_KEY is not configured; the run cannot continue");
        }

        let chosen = route(question);
        info!(route = ?chosen, question, "request routed");

        let client = LlmClient::from_config(&self.cfg)?;
        let runner = PipelineRunner::new(client, self.cfg.model(), self.cfg.temperature());
        let pipeline = pipeline::build(&df, chosen, &self.output_dir, question);

        let outcome = run_bounded(self.deadline, async move {
            runner.run(&pipeline).await
        })
        .await?;

        match outcome {
            None => {
                warn!(deadline_secs = self.deadline.as_secs(), "pipeline timed out; worker abandoned");
                Ok(AnalysisResult::Timeout {
                    message: TIMEOUT_MESSAGE.into(),
                })
            }
            Some(text) => self.resolve(chosen, text),
        }
    }

    /// Map the pipeline's raw text output to a typed result for the route.
    fn resolve(&self, chosen: Route, text: String) -> Result<AnalysisResult> {
        match chosen {
            Route::Analysis => Ok(AnalysisResult::Analysis { response: text }),
            Route::Visualization => {
                // Resolve the artifact from the sink rather than trusting
                // the agent's reply; the reply only gets a sanity check.
                if !text.contains(".png") {
                    warn!(reply = %text, "visualization reply is not a plausible file path");
                }
                match newest_png(&self.output_dir)? {
                    Some(path) => {
                        info!(path = %path.display(), "visualization resolved");
                        Ok(AnalysisResult::Visualization {
                            text: String::new(),
                            image_url: self.image_url(&path),
                        })
                    }
                    None => Ok(AnalysisResult::Error {
                        error: FILE_NOT_FOUND_MESSAGE.into(),
                    }),
                }
            }
        }
    }

    fn image_url(&self, path: &Path) -> String {
        match (self.cfg.get("OUTPUT_BASE_URL"), path.file_name()) {
            (Some(base), Some(name)) => {
                format!("{}/{}", base.trim_end_matches('/'), name.to_string_lossy())
            }
            _ => path.display().to_string(),
        }
    }
}

/// Run the worker on its own task under a wall-clock deadline. `Ok(None)`
/// is a timeout: the worker is abandoned, not aborted, and its eventual
/// result is discarded. Worker errors and panics surface as `Err`.
async fn run_bounded<T, F>(deadline: Duration, work: F) -> Result<Option<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let handle = tokio::spawn(work);
    match tokio::time::timeout(deadline, handle).await {
        Err(_elapsed) => Ok(None),
        Ok(Err(join_err)) => Err(anyhow!("analysis worker panicked: {join_err}")),
        Ok(Ok(result)) => result.map(Some),
    }
}

/// Most-recently-modified PNG in the output sink, if any.
fn newest_png(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read output directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, p)| p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn timeout_returns_within_deadline_plus_slack() {
        let deadline = Duration::from_millis(50);
        let started = Instant::now();
        let outcome: Option<String> = run_bounded(deadline, async {
            std::future::pending::<()>().await;
            unreachable!()
        })
        .await
        .unwrap();
        let elapsed = started.elapsed();
        assert!(outcome.is_none());
        assert!(elapsed >= deadline);
        assert!(elapsed < deadline + Duration::from_secs(2));
    }

    #[tokio::test]
    async fn worker_errors_surface_to_the_caller() {
        let err = run_bounded::<String, _>(Duration::from_secs(1), async {
            Err(anyhow!("reasoning engine unreachable"))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("reasoning engine unreachable"));
    }

    #[tokio::test]
    async fn worker_panics_surface_as_errors() {
        let err = run_bounded::<String, _>(Duration::from_secs(1), async {
            panic!("boom");
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn fast_workers_return_their_value() {
        let out = run_bounded(Duration::from_secs(1), async { Ok(41 + 1) })
            .await
            .unwrap();
        assert_eq!(out, Some(42));
    }

    #[test]
    fn newest_png_picks_by_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("visualization_1.png"), b"a").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        std::fs::write(dir.path().join("visualization_2.png"), b"b").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"c").unwrap();

        let newest = newest_png(dir.path()).unwrap().unwrap();
        assert_eq!(newest.file_name().unwrap(), "visualization_2.png");
    }

    #[test]
    fn newest_png_handles_missing_directory() {
        assert_eq!(newest_png(Path::new("/nonexistent/outputs")).unwrap(), None);
    }

    #[tokio::test]
    async fn analyze_without_credentials_yields_an_error_result() {
        use crate::dataset::{Column, ColumnValues};

        let cfg = Config::from_pairs([("OUTPUT_PATH", "/tmp/tabgpt-test-outputs")]);
        let engine = Engine::new(cfg);
        let df = Arc::new(DataFrame::from_columns(vec![Column {
            name: "age".into(),
            values: ColumnValues::Numeric(vec![Some(1.0)]),
        }]));
        let result = engine.analyze(df, "Qual a média da coluna age?").await;
        match result {
            AnalysisResult::Error { error } => assert!(error.contains("OPENAI_API_KEY")),
            other => panic!("expected an error result, got {other:?}"),
        }
    }

    #[test]
    fn resolve_reports_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::from_pairs([("OUTPUT_PATH", dir.path().to_str().unwrap())]);
        let engine = Engine::new(cfg);
        let result = engine
            .resolve(Route::Visualization, "no file here".into())
            .unwrap();
        match result {
            AnalysisResult::Error { error } => assert!(error.contains("was not found")),
            other => panic!("expected an error result, got {other:?}"),
        }
    }

    #[test]
    fn resolve_prefixes_a_configured_base_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("visualization_9.png"), b"x").unwrap();
        let cfg = Config::from_pairs([
            ("OUTPUT_PATH", dir.path().to_str().unwrap()),
            ("OUTPUT_BASE_URL", "http://localhost:8000/outputs/"),
        ]);
        let engine = Engine::new(cfg);
        let result = engine
            .resolve(Route::Visualization, "visualization_9.png".into())
            .unwrap();
        assert_eq!(
            result,
            AnalysisResult::Visualization {
                text: String::new(),
                image_url: "http://localhost:8000/outputs/visualization_9.png".into(),
            }
        );
    }

    #[test]
    fn analysis_route_wraps_the_text_directly() {
        let cfg = Config::from_pairs::<_, String, String>([]);
        let engine = Engine::new(cfg);
        let result = engine.resolve(Route::Analysis, "mean age is 30".into()).unwrap();
        assert_eq!(
            result,
            AnalysisResult::Analysis {
                response: "mean age is 30".into()
            }
        );
    }

    #[test]
    fn results_serialize_to_the_wire_shapes() {
        let r = AnalysisResult::Analysis {
            response: "ok".into(),
        };
        assert_eq!(serde_json::to_value(&r).unwrap(), serde_json::json!({"response": "ok"}));

        let r = AnalysisResult::Visualization {
            text: String::new(),
            image_url: "outputs/visualization_1.png".into(),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["image_url"], "outputs/visualization_1.png");
        assert!(v.get("response").is_none());
    }
}
