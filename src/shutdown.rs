use std::future::Future;
use tracing::{info, warn};

/// How a guarded operation ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Completion<T> {
    Finished(T),
    Interrupted,
}

impl<T> Completion<T> {
    pub fn finished(self) -> Option<T> {
        match self {
            Completion::Finished(value) => Some(value),
            Completion::Interrupted => None,
        }
    }
}

/// Graceful interrupt handling for long-running waits (pipeline monitoring)
pub struct ShutdownCoordinator;

impl ShutdownCoordinator {
    /// Run `operation` until it finishes or Ctrl-C is pressed. The operation
    /// is dropped on interrupt; nothing is left running.
    pub async fn run_until_interrupted<F>(name: &str, operation: F) -> Completion<F::Output>
    where
        F: Future,
    {
        Self::run_until(name, operation, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run `operation` until it finishes or `signal` resolves.
    pub async fn run_until<F, S>(name: &str, operation: F, signal: S) -> Completion<F::Output>
    where
        F: Future,
        S: Future<Output = ()>,
    {
        tokio::select! {
            value = operation => Completion::Finished(value),
            _ = signal => {
                info!(operation = name, "Interrupted by user");
                Completion::Interrupted
            }
        }
    }
}
