use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::Result;

/// A background job driven by the [`Scheduler`] on a fixed interval.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;
    fn interval(&self) -> Duration;
    async fn run(&self) -> Result<()>;
}

/// Runs registered jobs on their own tick loops until stopped. Each job gets
/// a dedicated task; a shared watch channel fans out the stop signal.
pub struct Scheduler {
    jobs: Vec<Arc<dyn ScheduledJob>>,
    handles: Vec<JoinHandle<()>>,
    stop: Option<watch::Sender<bool>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            handles: Vec::new(),
            stop: None,
        }
    }

    pub fn register(&mut self, job: Arc<dyn ScheduledJob>) {
        self.jobs.push(job);
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_some()
    }

    pub fn start(&mut self) {
        if self.stop.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        self.stop = Some(tx);

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut tick = tokio::time::interval(job.interval());
            let mut rx = rx.clone();
            let handle = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            if let Err(err) = job.run().await {
                                warn!("scheduled job {} failed: {err}", job.name());
                            }
                        }
                        _ = rx.changed() => {
                            if *rx.borrow() {
                                break;
                            }
                        }
                    }
                }
            });
            self.handles.push(handle);
        }
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(true);
        }
        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
