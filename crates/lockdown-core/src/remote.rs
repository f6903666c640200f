//! Remote command dispatch and bounded polling.
//!
//! The only place in the pipeline that deliberately suspends: after
//! dispatching the forensic script we poll the agent on a fixed cadence until
//! the command leaves {Pending, InProgress}. `max_wait` is a hard ceiling so
//! a command that never terminates cannot pin the session forever.

use std::sync::Arc;
use std::time::Duration;

use lockdown_traits::{CommandStatus, RemoteExecutor};
use tracing::debug;

use crate::error::ContainmentError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(7);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct RemoteCommandRunner {
    executor: Arc<dyn RemoteExecutor>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl RemoteCommandRunner {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            executor,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn with_timing(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Submit a script for out-of-band execution on the target.
    pub async fn dispatch(
        &self,
        instance_id: &str,
        region: &str,
        script: &str,
    ) -> Result<String, ContainmentError> {
        self.executor
            .send_command(instance_id, region, script)
            .await
            .map_err(|e| ContainmentError::Dispatch(e.to_string()))
    }

    /// Poll until the command reaches a terminal status or `max_wait`
    /// elapses. Only this session sleeps; sessions for other instances are
    /// unaffected.
    pub async fn await_completion(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<(), ContainmentError> {
        let started = tokio::time::Instant::now();
        loop {
            let status = self
                .executor
                .command_status(command_id, instance_id)
                .await
                .map_err(|e| ContainmentError::Dispatch(e.to_string()))?;

            debug!(command_id, instance_id, ?status, "remote command poll");

            match status {
                CommandStatus::Succeeded => return Ok(()),
                CommandStatus::Failed { output } => {
                    return Err(ContainmentError::CommandFailed(output));
                }
                CommandStatus::Pending | CommandStatus::InProgress => {}
            }

            if started.elapsed() + self.poll_interval > self.max_wait {
                return Err(ContainmentError::Timeout(self.max_wait));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Render the forensic script template. Placeholders: `{instance_id}`,
/// `{region}`, `{bucket}`.
pub fn render_script(template: &str, instance_id: &str, region: &str, bucket: &str) -> String {
    template
        .replace("{instance_id}", instance_id)
        .replace("{region}", region)
        .replace("{bucket}", bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockdown_traits::memory::MemoryExecutor;

    fn runner(executor: Arc<MemoryExecutor>) -> RemoteCommandRunner {
        RemoteCommandRunner::new(executor)
            .with_timing(Duration::from_secs(7), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn waits_through_polls_until_success() {
        let executor = Arc::new(MemoryExecutor::new());
        executor.set_polls_until_terminal(3);
        let runner = runner(executor.clone());

        let id = runner.dispatch("i-001", "ap-southeast-1", "echo capture").await.unwrap();
        runner.await_completion(&id, "i-001").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_failure_carries_diagnostic_output() {
        let executor = Arc::new(MemoryExecutor::new());
        executor.set_terminal_status(CommandStatus::Failed {
            output: "tar: permission denied".to_string(),
        });
        let runner = runner(executor.clone());

        let id = runner.dispatch("i-001", "ap-southeast-1", "script").await.unwrap();
        match runner.await_completion(&id, "i-001").await {
            Err(ContainmentError::CommandFailed(output)) => {
                assert!(output.contains("permission denied"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_command_never_terminates() {
        let executor = Arc::new(MemoryExecutor::new());
        executor.set_polls_until_terminal(usize::MAX);
        let runner = RemoteCommandRunner::new(executor)
            .with_timing(Duration::from_secs(7), Duration::from_secs(20));

        let id = runner.dispatch("i-001", "ap-southeast-1", "script").await.unwrap();
        match runner.await_completion(&id, "i-001").await {
            Err(ContainmentError::Timeout(max)) => assert_eq!(max, Duration::from_secs(20)),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_agent_is_a_dispatch_error() {
        let executor = Arc::new(MemoryExecutor::new());
        executor.fail_dispatch(true);
        let runner = runner(executor);

        match runner.dispatch("i-001", "ap-southeast-1", "script").await {
            Err(ContainmentError::Dispatch(msg)) => assert!(msg.contains("unreachable")),
            other => panic!("expected Dispatch, got {other:?}"),
        }
    }

    #[test]
    fn render_script_substitutes_placeholders() {
        let script = render_script(
            "capture {instance_id}; aws s3 cp x s3://{bucket}/ --region {region}",
            "i-009",
            "ap-northeast-1",
            "evidence",
        );
        assert_eq!(
            script,
            "capture i-009; aws s3 cp x s3://evidence/ --region ap-northeast-1"
        );
    }
}
