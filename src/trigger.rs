//! Trigger intake.
//!
//! Stands in for the OS hotkey layer: every line read from the source is one
//! trigger event, except `quit`/`exit` which stop the loop. The loop also stops
//! when the source reaches end of input or the cancellation token fires. In-flight
//! pipelines are awaited before returning so the clipboard is always restored.

use crate::actions::{PipelineCoordinator, PipelineOutcome};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TriggerSummary {
    /// Triggers that started a pipeline
    pub accepted: usize,
    /// Triggers dropped because a pipeline was already running
    pub dropped: usize,
    pub outcomes: Vec<PipelineOutcome>,
}

fn is_quit_command(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "quit" | "exit")
}

/// Feeds triggers from `source` into the coordinator until told to stop.
///
/// With `once` set the loop returns after the first accepted trigger's
/// pipeline has finished.
pub async fn run_trigger_loop<R>(
    coordinator: Arc<PipelineCoordinator>,
    source: R,
    cancel: CancellationToken,
    once: bool,
) -> TriggerSummary
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = source.lines();
    let mut summary = TriggerSummary::default();
    let mut in_flight: Vec<JoinHandle<PipelineOutcome>> = Vec::new();

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Trigger loop cancelled");
                break;
            }
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) if is_quit_command(&line) => {
                debug!("Quit command received");
                break;
            }
            Ok(Some(_)) => match coordinator.on_trigger() {
                Some(handle) => {
                    summary.accepted += 1;
                    in_flight.push(handle);
                    if once {
                        break;
                    }
                }
                None => {
                    summary.dropped += 1;
                    debug!("Trigger dropped, pipeline busy");
                }
            },
            Ok(None) => {
                debug!("Trigger source closed");
                break;
            }
            Err(e) => {
                warn!("Failed to read trigger source: {}", e);
                break;
            }
        }
    }

    for handle in in_flight {
        match handle.await {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(e) => error!("Pipeline task failed: {}", e),
        }
    }

    info!(
        "Trigger loop finished: {} accepted, {} dropped",
        summary.accepted, summary.dropped
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{PipelineTiming, ReplaceTiming};
    use crate::selection::CaptureTiming;
    use crate::test_support::{FakeInput, MemoryClipboard, MockTranslator};
    use crate::utils::RetryPolicy;
    use std::time::Duration;

    fn quick_timing() -> PipelineTiming {
        let retry = RetryPolicy::new(2, Duration::from_millis(1));
        PipelineTiming {
            capture: CaptureTiming {
                copy_retry: retry,
                poll_attempts: 3,
                poll_interval: Duration::from_millis(1),
                restore_delay: Duration::ZERO,
                max_chars: 0,
            },
            replace: ReplaceTiming {
                paste_retry: retry,
                pre_paste_delay: Duration::ZERO,
                paste_land_delay: Duration::ZERO,
                restore_delay: Duration::ZERO,
            },
        }
    }

    fn coordinator(translator: MockTranslator) -> (Arc<PipelineCoordinator>, Arc<MemoryClipboard>) {
        let clipboard = Arc::new(MemoryClipboard::with_text("saved"));
        let input = Arc::new(FakeInput::new(clipboard.clone(), Some("你好")));
        let coordinator = PipelineCoordinator::new(
            clipboard.clone(),
            input,
            Arc::new(translator),
            quick_timing(),
        );
        (Arc::new(coordinator), clipboard)
    }

    #[test]
    fn quit_commands_are_recognised() {
        assert!(is_quit_command("quit"));
        assert!(is_quit_command("  EXIT \r"));
        assert!(!is_quit_command(""));
        assert!(!is_quit_command("translate"));
    }

    #[tokio::test]
    async fn each_line_is_a_trigger_until_end_of_input() {
        let (coordinator, clipboard) = coordinator(MockTranslator::ok("Hello"));
        let input: &[u8] = b"\n";

        let summary =
            run_trigger_loop(coordinator.clone(), input, CancellationToken::new(), false).await;

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.outcomes, vec![PipelineOutcome::Replaced]);
        assert_eq!(clipboard.current().as_deref(), Some("saved"));
    }

    #[tokio::test]
    async fn triggers_while_busy_are_dropped() {
        let (coordinator, _clipboard) =
            coordinator(MockTranslator::ok("Hello").with_delay(Duration::from_millis(200)));
        let input: &[u8] = b"go\ngo\ngo\n";

        let summary = run_trigger_loop(coordinator, input, CancellationToken::new(), false).await;

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.dropped, 2);
        assert_eq!(summary.outcomes, vec![PipelineOutcome::Replaced]);
    }

    #[tokio::test]
    async fn quit_stops_before_later_lines() {
        let (coordinator, _clipboard) = coordinator(MockTranslator::ok("Hello"));
        let input: &[u8] = b"quit\ngo\n";

        let summary = run_trigger_loop(coordinator, input, CancellationToken::new(), false).await;

        assert_eq!(summary, TriggerSummary::default());
    }

    #[tokio::test]
    async fn once_returns_after_first_pipeline() {
        let (coordinator, _clipboard) = coordinator(MockTranslator::ok("Hello"));
        let (reader, mut writer) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut writer, b"go\n")
            .await
            .unwrap();

        // The writer stays open: only `once` can end the loop here.
        let summary = run_trigger_loop(
            coordinator,
            tokio::io::BufReader::new(reader),
            CancellationToken::new(),
            true,
        )
        .await;

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.outcomes, vec![PipelineOutcome::Replaced]);
        drop(writer);
    }

    #[tokio::test]
    async fn cancellation_stops_an_idle_loop() {
        let (coordinator, _clipboard) = coordinator(MockTranslator::ok("Hello"));
        let (reader, _writer) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_trigger_loop(
            coordinator,
            tokio::io::BufReader::new(reader),
            cancel.clone(),
            false,
        ));
        cancel.cancel();

        let summary = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.accepted, 0);
    }
}
