use std::time::Duration;

use anyhow::Result;
use kuchikiki::NodeRef;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::scanner::PageScanner;

/// Timing knobs for the scan driver.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Delay before the first scan, letting dynamically rendered content
    /// settle.
    pub settle_delay: Duration,
    /// Quiet period applied to mutation bursts before re-scanning.
    pub debounce_delay: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            debounce_delay: Duration::from_secs(1),
        }
    }
}

/// Create the channel connecting a mutation source to the scan driver.
pub fn mutation_channel() -> (MutationNotifier, MutationEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MutationNotifier { tx }, MutationEvents { rx })
}

/// Sender half handed to whatever watches the document for changes.
#[derive(Clone)]
pub struct MutationNotifier {
    tx: mpsc::UnboundedSender<()>,
}

impl MutationNotifier {
    /// Signal that the document changed. Non-blocking; bursts are coalesced
    /// by the driver.
    pub fn notify(&self) {
        let _ = self.tx.send(());
    }
}

/// Receiver half consumed by [`ScanDriver::run`].
pub struct MutationEvents {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Re-runs the scanner whenever the watched document mutates.
///
/// Level-triggered: every pass sweeps the whole document, so answers that
/// were already scored are simply re-requested and overwritten. Outstanding
/// requests from an earlier pass are not cancelled.
pub struct ScanDriver {
    scanner: PageScanner,
    options: DriverOptions,
}

impl ScanDriver {
    pub fn new(scanner: PageScanner, options: DriverOptions) -> Self {
        Self { scanner, options }
    }

    /// Run until the mutation channel closes.
    ///
    /// `load` produces the current document for each pass and `store`
    /// observes the annotated tree after the pass settles. `run` consumes
    /// the driver, so one driver cannot host two loops.
    pub async fn run<L, S>(self, mut events: MutationEvents, mut load: L, mut store: S) -> Result<()>
    where
        L: FnMut() -> Result<NodeRef>,
        S: FnMut(&NodeRef) -> Result<()>,
    {
        sleep(self.options.settle_delay).await;
        self.pass(&mut load, &mut store).await;

        while events.rx.recv().await.is_some() {
            sleep(self.options.debounce_delay).await;
            // Coalesce the burst that accumulated while we waited.
            while events.rx.try_recv().is_ok() {}
            self.pass(&mut load, &mut store).await;
        }
        debug!("mutation channel closed, driver stopping");
        Ok(())
    }

    /// One load/scan/store cycle. A failed pass never takes down the run
    /// loop; the next mutation simply triggers another attempt.
    async fn pass<L, S>(&self, load: &mut L, store: &mut S)
    where
        L: FnMut() -> Result<NodeRef>,
        S: FnMut(&NodeRef) -> Result<()>,
    {
        let document = match load() {
            Ok(document) => document,
            Err(error) => {
                warn!(%error, "failed to load document for scan pass");
                return;
            }
        };
        self.scanner.scan(&document).await;
        if let Err(error) = store(&document) {
            warn!(%error, "failed to store annotated document");
        }
    }
}
