use futures::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Bounded set of background tasks sharing one shutdown signal.
///
/// Timer loops, the refresh worker and the governor wake-up listener all run here,
/// so cancelling the pool stops every background activity of an engine.
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    cancel_token: CancellationToken,
}

impl TaskPool {
    pub fn new(n_tasks: usize) -> TaskPool {
        let semaphore = Arc::new(Semaphore::new(n_tasks));
        let cancel_token = CancellationToken::new();

        TaskPool {
            semaphore,
            cancel_token,
        }
    }

    /// Spawn `func`, waiting for a free slot first. The task is dropped at its next
    /// await point once the pool shuts down.
    pub fn execute<F, T>(&self, name: &'static str, func: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        let token = self.cancel_token.clone();
        tokio::spawn(async move {
            let main = async {
                let Ok(_permit) = semaphore.acquire().await else {
                    log::debug!("Task pool closed, not starting {name}");
                    return None;
                };
                Some(func.await)
            };

            tokio::select! {
                result = main => result,
                () = token.cancelled() => {
                    log::debug!("Background task {name} cancelled");
                    None
                }
            }
        })
    }

    /// Token cancelled when the pool shuts down.
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn shutdown(&self) {
        self.semaphore.close();
        self.cancel_token.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
