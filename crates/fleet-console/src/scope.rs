use fleet_core::{ControlError, ControlPlane};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::error;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `call` with a deadline; expiry is reported like any other failure.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, ControlError>
where
    F: Future<Output = Result<T, ControlError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(ControlError::Timeout(deadline)),
    }
}

/// Remote calls belonging to one activation of a view. Dropping or cancelling
/// the scope aborts whatever is still in flight.
pub struct ActivationScope<E> {
    plane: Arc<dyn ControlPlane>,
    deadline: Duration,
    tasks: JoinSet<E>,
}

impl<E: Send + 'static> ActivationScope<E> {
    pub fn new(plane: Arc<dyn ControlPlane>, deadline: Duration) -> Self {
        Self {
            plane,
            deadline,
            tasks: JoinSet::new(),
        }
    }

    pub fn plane(&self) -> Arc<dyn ControlPlane> {
        Arc::clone(&self.plane)
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = E> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Next finished task's event. Pending while nothing is in flight.
    pub async fn next_event(&mut self) -> E {
        loop {
            match self.tasks.join_next().await {
                Some(Ok(event)) => return event,
                Some(Err(err)) => {
                    if err.is_panic() {
                        error!(event = "scope_task_panicked", error = %err);
                    }
                }
                None => std::future::pending::<()>().await,
            }
        }
    }

    pub fn cancel(&mut self) {
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlane;

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_hang_into_timeout() {
        let result: Result<(), ControlError> = with_deadline(
            Duration::from_secs(5),
            std::future::pending::<Result<(), ControlError>>(),
        )
        .await;
        assert!(matches!(result, Err(ControlError::Timeout(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn finished_tasks_surface_in_order_of_completion() {
        let mut scope: ActivationScope<u32> =
            ActivationScope::new(Arc::new(FakePlane::default()), DEFAULT_REQUEST_TIMEOUT);
        scope.spawn(async { 7 });
        assert_eq!(scope.in_flight(), 1);
        assert_eq!(scope.next_event().await, 7);
        assert_eq!(scope.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancel_aborts_in_flight_tasks() {
        let mut scope: ActivationScope<u32> =
            ActivationScope::new(Arc::new(FakePlane::default()), DEFAULT_REQUEST_TIMEOUT);
        scope.spawn(async {
            std::future::pending::<()>().await;
            1
        });
        scope.spawn(async { 2 });
        scope.cancel();
        let next = tokio::time::timeout(Duration::from_millis(50), scope.next_event()).await;
        // The quick task may finish before the abort lands; the pending one never does.
        if let Ok(value) = next {
            assert_eq!(value, 2);
        }
        let again = tokio::time::timeout(Duration::from_millis(50), scope.next_event()).await;
        assert!(again.is_err());
        assert_eq!(scope.in_flight(), 0);
    }
}
