use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_core::FusedFuture;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::gap::{AdvData, ScanParams};
use crate::le::Addr;
use crate::radio::Radio;
use crate::{Error, Result};

/// Advertising report from a scanned device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanResult {
    pub addr: Addr,
    /// Received signal strength in dBm.
    pub rssi: i8,
    pub adv_data: AdvData,
    pub scan_response: AdvData,
}

/// Scan result callback.
pub type ScanCallback = Box<dyn FnMut(&ScanResult) + Send>;

/// Scanner.
///
/// Results are either delivered to a callback until scanning is stopped, or
/// captured into a bounded buffer that is returned by a [`ScanCapture`]
/// future. A capture stops scanning as soon as the buffer is full.
pub struct Observer {
    radio: Arc<dyn Radio>,
    params: ScanParams,
    mode: Mode,
}

enum Mode {
    Idle,
    Callback(ScanCallback),
    Capture {
        results: Vec<ScanResult>,
        target: usize,
        done: oneshot::Sender<Vec<ScanResult>>,
    },
}

impl Observer {
    pub(crate) fn new(radio: Arc<dyn Radio>, params: ScanParams) -> Self {
        Self {
            radio,
            params,
            mode: Mode::Idle,
        }
    }

    /// Returns the scan parameters.
    #[inline(always)]
    #[must_use]
    pub const fn params(&self) -> &ScanParams {
        &self.params
    }

    /// Returns whether a scan started by this observer is in progress.
    #[inline]
    #[must_use]
    pub const fn is_scanning(&self) -> bool {
        !matches!(self.mode, Mode::Idle)
    }

    /// Scans with the current parameters, delivering every result to `f`.
    pub fn scan(&mut self, f: impl FnMut(&ScanResult) + Send + 'static) -> Result<()> {
        let p = self.params;
        self.scan_with(p, f)
    }

    /// Scans for at most `timeout`, delivering every result to `f`.
    pub fn scan_timeout(
        &mut self,
        timeout: Duration,
        f: impl FnMut(&ScanResult) + Send + 'static,
    ) -> Result<()> {
        let p = ScanParams {
            timeout,
            ..self.params
        };
        self.scan_with(p, f)
    }

    /// Scans with parameters `p`, which become the current parameters,
    /// delivering every result to `f`.
    pub fn scan_with(
        &mut self,
        p: ScanParams,
        f: impl FnMut(&ScanResult) + Send + 'static,
    ) -> Result<()> {
        self.start(p, Mode::Callback(Box::new(f)))
    }

    /// Scans with the current parameters until `n` results are captured or
    /// scanning stops.
    pub fn scan_capture(&mut self, n: usize) -> Result<ScanCapture> {
        let p = self.params;
        self.scan_capture_with(p, n)
    }

    /// Scans for at most `timeout` until `n` results are captured.
    pub fn scan_capture_timeout(&mut self, timeout: Duration, n: usize) -> Result<ScanCapture> {
        let p = ScanParams {
            timeout,
            ..self.params
        };
        self.scan_capture_with(p, n)
    }

    /// Scans with parameters `p` until `n` results are captured.
    pub fn scan_capture_with(&mut self, p: ScanParams, n: usize) -> Result<ScanCapture> {
        if n == 0 {
            return Err(Error::InvalidArgument("empty capture buffer"));
        }
        let (done, rx) = oneshot::channel();
        let mode = Mode::Capture {
            results: Vec::with_capacity(n),
            target: n,
            done,
        };
        self.start(p, mode)?;
        Ok(ScanCapture(Some(rx)))
    }

    /// Stops scanning. A pending capture completes with the results received
    /// so far.
    pub fn stop_scanning(&mut self) -> Result<()> {
        self.radio.stop_scan()?;
        self.finish();
        Ok(())
    }

    /// Handles an advertising or scan response report.
    pub(crate) fn process_result(&mut self, r: &ScanResult) {
        match self.mode {
            Mode::Idle => trace!("Ignoring scan result from {:?}", r.addr),
            Mode::Callback(ref mut f) => f(r),
            Mode::Capture {
                ref mut results,
                target,
                ..
            } => {
                results.push(r.clone());
                if results.len() >= target {
                    if let Err(e) = self.radio.stop_scan() {
                        warn!("Failed to stop scanning ({e})");
                    }
                    self.finish();
                }
            }
        }
    }

    /// Handles the end of scanning.
    pub(crate) fn process_stopped(&mut self) {
        debug!("Scanning stopped");
        self.finish();
    }

    fn start(&mut self, p: ScanParams, mode: Mode) -> Result<()> {
        if !p.is_valid() {
            return Err(Error::InvalidArgument("invalid scan window"));
        }
        self.radio.set_scan_params(&p)?;
        self.params = p;
        self.finish();
        self.radio.start_scan()?;
        self.mode = mode;
        Ok(())
    }

    /// Returns to the idle mode, completing any pending capture.
    fn finish(&mut self) {
        if let Mode::Capture { results, done, .. } = std::mem::replace(&mut self.mode, Mode::Idle)
        {
            debug!("Captured {} scan result(s)", results.len());
            // The receiver may have been dropped
            let _ = done.send(results);
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::Idle => "Idle",
            Mode::Callback(_) => "Callback",
            Mode::Capture { .. } => "Capture",
        };
        f.debug_struct("Observer")
            .field("params", &self.params)
            .field("mode", &mode)
            .finish_non_exhaustive()
    }
}

/// Future that resolves to the captured scan results. Resolves to an empty
/// vector if the observer is dropped before the capture completes.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ScanCapture(Option<oneshot::Receiver<Vec<ScanResult>>>);

impl ScanCapture {
    /// Returns the results if the capture is complete.
    pub fn try_take(&mut self) -> Option<Vec<ScanResult>> {
        let rx = self.0.as_mut()?;
        let v = match rx.try_recv() {
            Ok(v) => v,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Vec::new(),
        };
        self.0 = None;
        Some(v)
    }
}

impl Future for ScanCapture {
    type Output = Vec<ScanResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.0.as_mut() else {
            return Poll::Ready(Vec::new());
        };
        let r = match Pin::new(rx).poll(cx) {
            Poll::Ready(r) => r.unwrap_or_default(),
            Poll::Pending => return Poll::Pending,
        };
        self.0 = None;
        Poll::Ready(r)
    }
}

impl FusedFuture for ScanCapture {
    #[inline(always)]
    fn is_terminated(&self) -> bool {
        self.0.is_none()
    }
}
