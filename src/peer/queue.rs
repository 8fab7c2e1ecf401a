use std::future::Future;

use futures_util::future::BoxFuture;
use tokio::sync::mpsc::{
    UnboundedSender,
    unbounded_channel,
};

/// A single-consumer FIFO queue for delivering user-facing callbacks.
///
/// Every callback a peer invokes (call responses, events, invocations) is dispatched onto a
/// caller-chosen queue rather than run inline on the connection's receive path. Jobs on one queue
/// run strictly one at a time, in dispatch order; jobs on different queues run concurrently.
///
/// A queue is backed by a dedicated task that drains jobs for as long as any clone of the queue
/// handle is alive. Jobs are futures, so a slow asynchronous job (such as a procedure invocation)
/// holds back only its own queue.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    job_tx: UnboundedSender<BoxFuture<'static, ()>>,
}

impl DeliveryQueue {
    /// Creates a new queue and spawns its draining task.
    ///
    /// Must be called within a tokio runtime.
    pub fn new() -> Self {
        let (job_tx, mut job_rx) = unbounded_channel::<BoxFuture<'static, ()>>();
        tokio::spawn(async move {
            while let Some(job) = job_rx.recv().await {
                job.await;
            }
        });
        Self { job_tx }
    }

    /// Dispatches a job onto the queue.
    ///
    /// Jobs run in dispatch order, one at a time.
    pub fn dispatch<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.job_tx.send(Box::pin(job)).ok();
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod delivery_queue_test {
    use std::sync::{
        Arc,
        Mutex,
    };

    use crate::peer::queue::DeliveryQueue;

    #[tokio::test]
    async fn runs_jobs_in_dispatch_order() {
        let queue = DeliveryQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        for i in 0..100 {
            let seen = seen.clone();
            queue.dispatch(async move {
                seen.lock().unwrap().push(i);
            });
        }
        queue.dispatch(async move {
            done_tx.send(()).ok();
        });
        done_rx.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }
}
