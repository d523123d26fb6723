use crate::acquisition::error::{AttemptFailure, FetchError};
use crate::acquisition::feed::{looks_like_error_response, GridFeed};
use crate::acquisition::retry::{AttemptError, Retrier, RetryOutcome, RetryPolicy, Sleeper};
use crate::acquisition::validation_log::{
    write_response_snippet, Severity, ValidationLog, ValidationLogEntry,
};
use crate::grid::parser::GridResponseParser;
use crate::layout::DataLayout;
use crate::types::snapshot::GridSnapshot;
use crate::types::variable::ObservationInstant;
use crate::utils::truncate_chars;
use bon::Builder;
use log::{debug, info, warn};
use reqwest::StatusCode;

/// Performs one logical fetch of a whole grid snapshot: request, validate,
/// parse, and retry transient failures. Every attempt is written to the
/// validation log of the (date, variable) pair.
#[derive(Builder)]
pub struct RetryingDownloader<F: GridFeed, S: Sleeper> {
    feed: F,
    sleeper: S,
    parser: GridResponseParser,
    layout: DataLayout,
    #[builder(default)]
    policy: RetryPolicy,
    #[builder(default = 30)]
    snippet_lines: usize,
    #[builder(default = 500)]
    preview_chars: usize,
}

impl<F: GridFeed, S: Sleeper> RetryingDownloader<F, S> {
    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn parser(&self) -> &GridResponseParser {
        &self.parser
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn validation_log(&self, instant: ObservationInstant, variable: &str) -> ValidationLog {
        ValidationLog::new(
            self.layout.validation_log_file(instant.date(), variable),
            self.preview_chars,
        )
    }

    /// Fetches the snapshot for `instant` and `variable`.
    ///
    /// A forbidden answer stops immediately with [`FetchError::Forbidden`].
    /// Anything else that fails is retried per the policy; when attempts run
    /// out the result is [`FetchError::Exhausted`] and the unit is unusable.
    pub async fn fetch(
        &self,
        instant: ObservationInstant,
        variable: &str,
    ) -> Result<GridSnapshot, FetchError> {
        let log = self.validation_log(instant, variable);
        let retrier = Retrier::new(self.policy, &self.sleeper);
        let tm = instant.tm();

        let outcome = retrier
            .run(
                |attempt| self.attempt(instant, variable, &log, attempt),
                |attempt, error, delay| {
                    warn!(
                        "Attempt {} for tm={} var={} failed ({}), retrying in {:.1}s",
                        attempt,
                        tm,
                        variable,
                        error,
                        delay.as_secs_f64()
                    )
                },
            )
            .await;

        match outcome {
            Ok(snapshot) => Ok(snapshot),
            Err(RetryOutcome::Aborted { .. }) => Err(FetchError::Forbidden {
                tm,
                variable: variable.to_string(),
                log_path: log.path().to_path_buf(),
            }),
            Err(RetryOutcome::Exhausted { error, attempts }) => {
                let entry = ValidationLogEntry::new(
                    Severity::Error,
                    Some(tm.clone()),
                    variable,
                    format!(
                        "giving up after {} attempts; the unit is unusable",
                        attempts
                    ),
                )
                .with_exception(&error);
                self.record(&log, &entry).await;
                Err(FetchError::Exhausted {
                    tm,
                    variable: variable.to_string(),
                    attempts,
                    log_path: log.path().to_path_buf(),
                    last_error: error,
                })
            }
        }
    }

    async fn attempt(
        &self,
        instant: ObservationInstant,
        variable: &str,
        log: &ValidationLog,
        attempt: u32,
    ) -> Result<GridSnapshot, AttemptError<AttemptFailure>> {
        let max = self.policy.attempts();
        let tm = instant.tm();
        let severity = if attempt < max {
            Severity::Warn
        } else {
            Severity::Error
        };
        let entry = |severity: Severity, message: String| {
            ValidationLogEntry::new(severity, Some(tm.clone()), variable, message)
        };

        let response = match self.feed.request(instant, variable).await {
            Ok(response) => response,
            Err(e) => {
                let failure = AttemptFailure::from(e);
                let msg = format!("request failed (attempt {}/{})", attempt, max);
                self.record(log, &entry(severity, msg).with_exception(&failure))
                    .await;
                return self.retry(log, &tm, variable, attempt, failure).await;
            }
        };

        if response.status == StatusCode::FORBIDDEN {
            let msg = format!("access forbidden (status {}); not retrying", response.status);
            let preview = Some(self.preview(&response.body));
            self.record(
                log,
                &entry(Severity::Error, msg).with_response_preview(preview),
            )
            .await;
            return Err(AttemptError::Abort(AttemptFailure::HttpStatus(
                response.status,
            )));
        }

        if !response.status.is_success() {
            let msg = format!(
                "unexpected status {} (attempt {}/{})",
                response.status, attempt, max
            );
            let preview = Some(self.preview(&response.body));
            self.record(log, &entry(severity, msg).with_response_preview(preview))
                .await;
            let failure = AttemptFailure::HttpStatus(response.status);
            return self.retry(log, &tm, variable, attempt, failure).await;
        }

        if looks_like_error_response(&response.body) {
            let msg = format!("empty or error response (attempt {}/{})", attempt, max);
            let preview = Some(self.preview(&response.body));
            self.record(log, &entry(severity, msg).with_response_preview(preview))
                .await;
            return self
                .retry(log, &tm, variable, attempt, AttemptFailure::ErrorBody)
                .await;
        }

        match self.parser.parse(&response.body) {
            Ok(snapshot) => {
                debug!(
                    "Parsed tm={} var={}: {} values, {} missing",
                    tm,
                    variable,
                    snapshot.len(),
                    snapshot.missing_count()
                );
                if attempt > 1 {
                    let msg = format!("recovered on attempt {}/{}", attempt, max);
                    self.record(log, &entry(Severity::Info, msg)).await;
                }
                Ok(snapshot)
            }
            Err(e) => {
                let snippet_path = self.layout.snippet_file(instant, variable);
                if let Err(io) = write_response_snippet(
                    &snippet_path,
                    &tm,
                    variable,
                    &response.body,
                    Some(&e.to_string()),
                    self.snippet_lines,
                )
                .await
                {
                    warn!(
                        "Failed to write response snippet '{}': {}",
                        snippet_path.display(),
                        io
                    );
                }
                let msg = format!(
                    "parse failed (attempt {}/{}); snippet={}",
                    attempt,
                    max,
                    snippet_path.display()
                );
                let preview = Some(self.preview(&response.body));
                self.record(
                    log,
                    &entry(severity, msg)
                        .with_exception(&e)
                        .with_response_preview(preview),
                )
                .await;
                self.retry(log, &tm, variable, attempt, AttemptFailure::Parse(e))
                    .await
            }
        }
    }

    /// Logs the upcoming wait (when another attempt remains) and classifies the failure as retryable.
    async fn retry(
        &self,
        log: &ValidationLog,
        tm: &str,
        variable: &str,
        attempt: u32,
        failure: AttemptFailure,
    ) -> Result<GridSnapshot, AttemptError<AttemptFailure>> {
        let max = self.policy.attempts();
        if attempt < max {
            let delay = self.policy.delay_after(attempt);
            let entry = ValidationLogEntry::new(
                Severity::Info,
                Some(tm.to_string()),
                variable,
                format!(
                    "retrying in {:.1}s (next attempt {}/{})",
                    delay.as_secs_f64(),
                    attempt + 1,
                    max
                ),
            );
            self.record(log, &entry).await;
        }
        Err(AttemptError::Retry(failure))
    }

    fn preview<'a>(&self, body: &'a str) -> &'a str {
        truncate_chars(body, self.preview_chars)
    }

    /// Validation log write failures never fail the fetch itself.
    async fn record(&self, log: &ValidationLog, entry: &ValidationLogEntry) {
        if let Err(e) = log.append(entry).await {
            warn!(
                "Failed to append to validation log '{}': {}",
                log.path().display(),
                e
            );
        } else if entry.severity == Severity::Error {
            info!(
                "Validation log {} updated: {}",
                log.path().display(),
                entry.message
            );
        }
    }
}
