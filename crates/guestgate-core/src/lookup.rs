// ── Debounced scanner lookup ──
//
// Barcode scanners type like very fast keyboards: a burst of characters,
// sometimes a trailing Enter, sometimes nothing. This module turns that
// raw key stream into at most one device lookup per scan, with burst
// coalescing and duplicate suppression so a wedge scanner that fires
// twice doesn't hammer the appliance.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Performs the actual device lookup for a scanned code.
///
/// The returned future is dropped if a newer scan supersedes it before
/// it completes, so implementations must tolerate cancellation at any
/// await point. Result delivery (UI update, channel send) is the
/// implementor's business.
pub trait TokenLookup: Send + Sync + 'static {
    fn lookup(&self, code: String) -> impl Future<Output = ()> + Send;
}

/// Timing knobs for the scan pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Codes shorter than this are discarded as line noise.
    pub min_length: usize,
    /// Candidates arriving within this window coalesce; the longest one
    /// is dispatched when the window closes.
    pub debounce: Duration,
    /// A code identical to the last dispatched one is dropped within
    /// this window.
    pub dedupe_window: Duration,
    /// Idle gap after which the accumulated buffer is treated as a
    /// complete code (scanners emit keys far faster than humans).
    pub key_gap: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_length: 4,
            debounce: Duration::from_millis(300),
            dedupe_window: Duration::from_secs(3),
            key_gap: Duration::from_millis(80),
        }
    }
}

enum ScanEvent {
    Key(char),
    Submit,
}

/// Handle to the scan pipeline task. Feed it keystrokes; it calls the
/// [`TokenLookup`] at most once per debounce window.
pub struct DebouncedLookup {
    tx: mpsc::UnboundedSender<ScanEvent>,
    task: JoinHandle<()>,
}

impl DebouncedLookup {
    pub fn spawn<L: TokenLookup>(lookup: L, options: ScanOptions, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, Arc::new(lookup), options, cancel));
        Self { tx, task }
    }

    /// A single keystroke from the scanner.
    pub fn key(&self, c: char) {
        let _ = self.tx.send(ScanEvent::Key(c));
    }

    /// Explicit end-of-code (scanner-appended Enter).
    pub fn submit(&self) {
        let _ = self.tx.send(ScanEvent::Submit);
    }

    pub fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.task.abort_handle()
    }
}

type InFlight = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Pipeline<L> {
    lookup: Arc<L>,
    opts: ScanOptions,
    /// Keys accumulated since the last flush.
    buffer: String,
    last_key: Option<Instant>,
    /// Longest candidate seen in the open debounce window.
    best: Option<String>,
    window_closes: Option<Instant>,
    last_dispatched: Option<(String, Instant)>,
    in_flight: Option<InFlight>,
}

async fn run<L: TokenLookup>(
    mut rx: mpsc::UnboundedReceiver<ScanEvent>,
    lookup: Arc<L>,
    opts: ScanOptions,
    cancel: CancellationToken,
) {
    let mut p = Pipeline {
        lookup,
        opts,
        buffer: String::new(),
        last_key: None,
        best: None,
        window_closes: None,
        last_dispatched: None,
        in_flight: None,
    };

    loop {
        let gap_deadline = p.last_key.map(|t| t + p.opts.key_gap);
        let buffer_open = !p.buffer.is_empty();
        let window_deadline = p.window_closes;

        tokio::select! {
            () = cancel.cancelled() => break,

            event = rx.recv() => match event {
                None => break,
                Some(ScanEvent::Key(c)) => {
                    p.buffer.push(c);
                    p.last_key = Some(Instant::now());
                }
                Some(ScanEvent::Submit) => p.flush_buffer(),
            },

            () = sleep_until_some(gap_deadline), if buffer_open => p.flush_buffer(),

            () = sleep_until_some(window_deadline), if window_deadline.is_some() => {
                p.dispatch_best();
            }

            () = async { p.in_flight.as_mut().expect("guarded by if").await },
                if p.in_flight.is_some() =>
            {
                p.in_flight = None;
            }
        }
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

impl<L: TokenLookup> Pipeline<L> {
    /// Close out the key buffer into a debounce-window candidate.
    fn flush_buffer(&mut self) {
        let code = std::mem::take(&mut self.buffer);
        self.last_key = None;
        if code.len() < self.opts.min_length {
            if !code.is_empty() {
                trace!(len = code.len(), "discarding short scan fragment");
            }
            return;
        }

        // Longest candidate wins the window; partial reads from a
        // mid-scan flush lose to the complete code that follows.
        let replace = self.best.as_ref().is_none_or(|b| code.len() >= b.len());
        if replace {
            self.best = Some(code);
        }
        if self.window_closes.is_none() {
            self.window_closes = Some(Instant::now() + self.opts.debounce);
        }
    }

    /// Debounce window closed: dispatch the winning candidate.
    fn dispatch_best(&mut self) {
        self.window_closes = None;
        let Some(code) = self.best.take() else { return };

        let now = Instant::now();
        if let Some((last, at)) = &self.last_dispatched {
            if *last == code && now.duration_since(*at) < self.opts.dedupe_window {
                debug!(code = %code, "suppressing duplicate scan");
                return;
            }
        }

        if self.in_flight.is_some() {
            debug!("superseding in-flight lookup");
        }
        self.last_dispatched = Some((code.clone(), now));
        let lookup = Arc::clone(&self.lookup);
        self.in_flight = Some(Box::pin(async move { lookup.lookup(code).await }));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TokenLookup for Recorder {
        fn lookup(&self, code: String) -> impl Future<Output = ()> + Send {
            let calls = Arc::clone(&self.calls);
            async move {
                calls.lock().unwrap().push(code);
            }
        }
    }

    fn pipeline(recorder: Recorder) -> (DebouncedLookup, CancellationToken) {
        let cancel = CancellationToken::new();
        let handle = DebouncedLookup::spawn(recorder, ScanOptions::default(), cancel.clone());
        (handle, cancel)
    }

    async fn type_code(handle: &DebouncedLookup, code: &str) {
        for c in code.chars() {
            handle.key(c);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn growing_prefixes_collapse_to_longest() {
        let recorder = Recorder::default();
        let (handle, cancel) = pipeline(recorder.clone());

        // Three flushes of the same scan landing mid-read: the complete
        // code is the one that reaches the device.
        for code in ["12345", "123456", "1234567"] {
            type_code(&handle, code).await;
            handle.submit();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(*recorder.calls.lock().unwrap(), vec!["1234567".to_owned()]);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_gap_flushes_without_enter() {
        let recorder = Recorder::default();
        let (handle, cancel) = pipeline(recorder.clone());

        type_code(&handle, "998877").await;
        // No Enter; the 80ms idle gap closes the buffer on its own.
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(*recorder.calls.lock().unwrap(), vec!["998877".to_owned()]);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn short_fragments_are_ignored() {
        let recorder = Recorder::default();
        let (handle, cancel) = pipeline(recorder.clone());

        type_code(&handle, "123").await;
        handle.submit();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(recorder.calls.lock().unwrap().is_empty());
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_scan_suppressed_within_window() {
        let recorder = Recorder::default();
        let (handle, cancel) = pipeline(recorder.clone());

        type_code(&handle, "424242").await;
        handle.submit();
        tokio::time::sleep(Duration::from_millis(400)).await;

        // Scanner double-fire 1s later: same code, suppressed.
        type_code(&handle, "424242").await;
        handle.submit();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(recorder.calls.lock().unwrap().len(), 1);

        // Past the 3s dedupe window the same code is a fresh scan.
        tokio::time::sleep(Duration::from_secs(3)).await;
        type_code(&handle, "424242").await;
        handle.submit();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(recorder.calls.lock().unwrap().len(), 2);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_codes_both_dispatch() {
        let recorder = Recorder::default();
        let (handle, cancel) = pipeline(recorder.clone());

        type_code(&handle, "111111").await;
        handle.submit();
        tokio::time::sleep(Duration::from_millis(400)).await;
        type_code(&handle, "222222").await;
        handle.submit();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["111111".to_owned(), "222222".to_owned()]
        );
        cancel.cancel();
    }

    /// Records only after a long device round trip, so a second scan can
    /// land while the first is still in flight.
    #[derive(Clone, Default)]
    struct SlowRecorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TokenLookup for SlowRecorder {
        fn lookup(&self, code: String) -> impl Future<Output = ()> + Send {
            let calls = Arc::clone(&self.calls);
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                calls.lock().unwrap().push(code);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn newer_scan_supersedes_an_in_flight_lookup() {
        let recorder = SlowRecorder::default();
        let cancel = CancellationToken::new();
        let handle =
            DebouncedLookup::spawn(recorder.clone(), ScanOptions::default(), cancel.clone());

        // First scan dispatches after its debounce window, then stalls
        // inside the device call for a full second.
        type_code(&handle, "111111").await;
        handle.submit();
        tokio::time::sleep(Duration::from_millis(400)).await;

        // Second scan dispatches while the first is still in flight;
        // the stalled lookup is dropped, not awaited.
        type_code(&handle, "222222").await;
        handle.submit();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(*recorder.calls.lock().unwrap(), vec!["222222".to_owned()]);
        cancel.cancel();
    }
}
