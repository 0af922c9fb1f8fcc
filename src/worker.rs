// SPDX-License-Identifier: MPL-2.0

//! # Metrics Worker
//!
//! Polls a [`MetricsSource`] on a background thread and sends every snapshot
//! to the UI thread over a channel. The UI never blocks on sensor queries.
//!
//! ```rust,ignore
//! let (mut worker, events) = MetricsWorker::new(HardwareMonitor::new());
//! worker.start(Duration::from_secs(1));
//!
//! while let Ok(WorkerEvent::Metrics(metrics)) = events.recv() {
//!     println!("{:?}", metrics.cpu.usage);
//! }
//! ```
//!
//! The thread owns the source while it runs. [`MetricsWorker::stop`] joins
//! the thread and takes the source back, so a restart with a new interval
//! keeps collector state such as the network byte baseline.

use crate::monitor::{HardwareMonitor, Metrics};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest single sleep, so `stop()` is honoured promptly.
const MAX_SLEEP: Duration = Duration::from_millis(100);

/// Anything that can produce a metrics snapshot.
pub trait MetricsSource: Send + 'static {
    fn collect(&mut self) -> Metrics;
}

impl MetricsSource for HardwareMonitor {
    fn collect(&mut self) -> Metrics {
        self.get_all_metrics()
    }
}

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Metrics(Box<Metrics>),
    /// A collection panicked; the worker keeps running.
    Error(String),
}

pub struct MetricsWorker<S: MetricsSource> {
    source: Option<S>,
    sender: Sender<WorkerEvent>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<S>>,
}

impl<S: MetricsSource> MetricsWorker<S> {
    pub fn new(source: S) -> (Self, Receiver<WorkerEvent>) {
        let (sender, receiver) = mpsc::channel();
        let worker = Self {
            source: Some(source),
            sender,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        };
        (worker, receiver)
    }

    /// True while the polling thread is alive. It ends on its own once the
    /// receiver is dropped.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start polling every `interval`. Restarts the thread if it is running.
    pub fn start(&mut self, interval: Duration) {
        self.stop();
        let Some(source) = self.source.take() else {
            log::error!("Metrics source lost, worker cannot start");
            return;
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let sender = self.sender.clone();

        log::debug!("Starting metrics worker, interval {:?}", interval);
        self.handle = Some(thread::spawn(move || {
            run(source, interval, &running, &sender)
        }));
    }

    /// Stop the thread and wait for it to finish the current collection.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(source) => self.source = Some(source),
                Err(_) => log::error!("Metrics worker thread panicked"),
            }
        }
    }
}

impl<S: MetricsSource> Drop for MetricsWorker<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<S: MetricsSource>(
    mut source: S,
    interval: Duration,
    running: &AtomicBool,
    sender: &Sender<WorkerEvent>,
) -> S {
    let mut last_collection: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        let due = last_collection.is_none_or(|at| at.elapsed() >= interval);
        if !due {
            let remaining = last_collection
                .map(|at| interval.saturating_sub(at.elapsed()))
                .unwrap_or_default();
            thread::sleep(remaining.min(MAX_SLEEP));
            continue;
        }

        let started = Instant::now();
        last_collection = Some(started);

        let event = match panic::catch_unwind(AssertUnwindSafe(|| source.collect())) {
            Ok(metrics) => {
                log::debug!("Collected metrics in {:?}", started.elapsed());
                WorkerEvent::Metrics(Box::new(metrics))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Metrics collection failed: {}", message);
                WorkerEvent::Error(message)
            }
        };

        if sender.send(event).is_err() {
            // Receiver gone, nobody is listening.
            break;
        }
    }
    source
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        calls: u32,
    }

    impl MetricsSource for Counter {
        fn collect(&mut self) -> Metrics {
            self.calls += 1;
            let mut metrics = Metrics::default();
            metrics.cpu.usage = Some(self.calls as f64);
            metrics
        }
    }

    struct Flaky {
        calls: u32,
    }

    impl MetricsSource for Flaky {
        fn collect(&mut self) -> Metrics {
            self.calls += 1;
            if self.calls == 1 {
                panic!("sensor went away");
            }
            Metrics::default()
        }
    }

    fn usage(event: WorkerEvent) -> f64 {
        match event {
            WorkerEvent::Metrics(metrics) => metrics.cpu.usage.unwrap(),
            WorkerEvent::Error(message) => panic!("unexpected error {message}"),
        }
    }

    #[test]
    fn emits_metrics_until_stopped() {
        let (mut worker, events) = MetricsWorker::new(Counter { calls: 0 });
        worker.start(Duration::from_millis(10));

        let timeout = Duration::from_secs(5);
        assert_eq!(usage(events.recv_timeout(timeout).unwrap()), 1.0);
        assert_eq!(usage(events.recv_timeout(timeout).unwrap()), 2.0);

        worker.stop();
        assert!(!worker.is_running());
        while events.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(50));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn restart_keeps_source_state() {
        let (mut worker, events) = MetricsWorker::new(Counter { calls: 0 });
        worker.start(Duration::from_secs(60));
        assert_eq!(usage(events.recv_timeout(Duration::from_secs(5)).unwrap()), 1.0);

        worker.start(Duration::from_secs(60));
        assert_eq!(usage(events.recv_timeout(Duration::from_secs(5)).unwrap()), 2.0);
    }

    #[test]
    fn panics_become_error_events() {
        let (mut worker, events) = MetricsWorker::new(Flaky { calls: 0 });
        worker.start(Duration::from_millis(10));

        let timeout = Duration::from_secs(5);
        match events.recv_timeout(timeout).unwrap() {
            WorkerEvent::Error(message) => assert_eq!(message, "sensor went away"),
            WorkerEvent::Metrics(_) => panic!("expected an error first"),
        }
        assert!(matches!(
            events.recv_timeout(timeout).unwrap(),
            WorkerEvent::Metrics(_)
        ));
    }

    #[test]
    fn dropping_receiver_ends_thread() {
        let (mut worker, events) = MetricsWorker::new(Counter { calls: 0 });
        drop(events);
        worker.start(Duration::from_millis(1));

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!worker.is_running());

        worker.stop();
        assert!(worker.source.is_some());
    }
}
