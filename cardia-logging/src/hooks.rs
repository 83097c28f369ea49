//! Process-wide fault hooks
//!
//! [`FaultHooks::install`] routes panics into the event log as `global_error`
//! entries. [`monitor_task`] and [`spawn_monitored`] do the same for
//! background tasks that fail with nobody awaiting them, as
//! `unhandled_rejection` entries.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::future::Future;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::DIAGNOSTICS_TARGET;
use crate::entry::ErrorCapture;
use crate::event_log::EventLog;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Installed panic hook. Dropping it reinstates the hook that was active
/// before [`FaultHooks::install`].
pub struct FaultHooks {
    log: Arc<EventLog>,
    previous: Option<Arc<PanicHook>>,
}

impl FaultHooks {
    /// Record every panic as a `global_error` entry, then run the hook that
    /// was installed before
    ///
    /// The entry is stored and persisted from inside the hook. Sinks see it
    /// on the next append, because a panic raised while the hook runs would
    /// abort the process.
    pub fn install(log: Arc<EventLog>) -> Self {
        let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
        let chained = Arc::clone(&previous);
        let hook_log = Arc::clone(&log);

        panic::set_hook(Box::new(move |info| {
            if !record_panic(&hook_log, info) {
                debug!(target: DIAGNOSTICS_TARGET, "Panic raised inside an append was not recorded");
            }
            chained(info);
        }));
        debug!("Installed fault hooks");

        Self {
            log,
            previous: Some(previous),
        }
    }

    /// Record a failure that escaped its task
    pub fn report_unhandled(&self, task: Option<&str>, reason: &(dyn Error + 'static)) {
        self.log
            .unhandled_rejection(task, ErrorCapture::from_error(reason));
    }

    /// Log the hooks record into
    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }
}

impl Drop for FaultHooks {
    fn drop(&mut self) {
        // The hook cannot be replaced while this thread is panicking
        if std::thread::panicking() {
            return;
        }
        if let Some(previous) = self.previous.take() {
            let _ours = panic::take_hook();
            panic::set_hook(Box::new(move |info| previous(info)));
            debug!("Removed fault hooks");
        }
    }
}

fn record_panic(log: &EventLog, info: &PanicHookInfo<'_>) -> bool {
    let location = info.location();
    let mut capture = ErrorCapture::new("Panic", panic_message(info.payload()));

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        capture = capture.with_stack_trace(backtrace.to_string());
    }

    log.global_error(
        location.map(|l| l.file()),
        location.map(|l| l.line()),
        location.map(|l| l.column()),
        capture,
    )
    .recorded
}

/// Text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Await a background task, recording an `unhandled_rejection` entry when it
/// returns an error, panics or is cancelled
pub async fn monitor_task<T, E>(
    log: Arc<EventLog>,
    task_name: impl Into<String>,
    handle: JoinHandle<Result<T, E>>,
) -> Option<T>
where
    E: Error + 'static,
{
    let task_name = task_name.into();
    match handle.await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            log.unhandled_rejection(Some(&task_name), ErrorCapture::from_error(&e));
            None
        }
        Err(e) => {
            let capture = if e.is_panic() {
                ErrorCapture::new("Panic", panic_message(e.into_panic().as_ref()))
            } else {
                ErrorCapture::from_error(&e)
            };
            log.unhandled_rejection(Some(&task_name), capture);
            None
        }
    }
}

/// Spawn `future` and watch it with [`monitor_task`]
pub fn spawn_monitored<F, T, E>(
    log: Arc<EventLog>,
    task_name: impl Into<String>,
    future: F,
) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + 'static,
{
    let task_name = task_name.into();
    let handle = tokio::spawn(future);
    tokio::spawn(monitor_task(log, task_name, handle))
}
