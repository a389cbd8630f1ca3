use std::future::Future;

use tracing::warn;

/// Sees failures that a best-effort call site swallowed. Control flow does
/// not depend on it.
pub trait FailureObserver: Send + Sync {
    fn absorbed(&self, site: &str, error: &anyhow::Error);
}

/// Default observer: a warning in the log.
pub struct LogObserver;

impl FailureObserver for LogObserver {
    fn absorbed(&self, site: &str, error: &anyhow::Error) {
        warn!(site, error = %format!("{error:#}"), "Best-effort call failed");
    }
}

/// Await `fut`, reporting a failure to `observer` instead of returning it.
/// Returns whether the call succeeded.
pub async fn best_effort<F>(observer: &dyn FailureObserver, site: &str, fut: F) -> bool
where
    F: Future<Output = anyhow::Result<()>>,
{
    match fut.await {
        Ok(()) => true,
        Err(e) => {
            observer.absorbed(site, &e);
            false
        }
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingObserver {
    pub sites: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FailureObserver for RecordingObserver {
    fn absorbed(&self, site: &str, _error: &anyhow::Error) {
        self.sites.lock().unwrap().push(site.to_string());
    }
}
