//! Publish worker and location pump.
//!
//! The worker owns the [`TrackerService`] and runs on its own thread so that
//! connect and PUBACK waits never stall the location callback.  It is a plain
//! async loop driven by `futures_lite::future::block_on`:
//!
//! ```text
//! loop {
//!     select(mailbox.receive(), shutdown.wait())
//!       fix      → service.handle_fix()
//!       shutdown → break
//! }
//! service.shutdown()
//! ```
//!
//! The selection is biased towards the mailbox, so a fix that is already
//! pending when shutdown is requested still gets published.
//!
//! The location pump gets a thread of its own as well ([`spawn_pump`]):
//! a read that never returns must not keep a shutdown request from
//! reaching the worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use futures_lite::future;
use log::{debug, info, warn};

use crate::app::events::TrackerEvent;
use crate::app::payload::PositionFix;
use crate::app::ports::{Clock, DoseRateSource, EventSink};
use crate::app::service::{PublishOutcome, TrackerService};
use crate::mqtt::transport::Connector;

use super::mailbox::{FixMailbox, Shutdown};

enum Wake {
    Fix(PositionFix),
    Shutdown,
}

/// Counters reported when the worker exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub handled: u32,
    pub delivered: u32,
    pub dropped: u32,
    pub superseded: u32,
}

/// Run the publish loop until shutdown is requested.
///
/// Does not call [`TrackerService::start`]; [`spawn`] does that before
/// entering the loop.
pub async fn run<C, D, K, S>(
    service: &mut TrackerService<C, D, K>,
    mailbox: &FixMailbox,
    shutdown: &Shutdown,
    sink: &mut S,
) -> WorkerReport
where
    C: Connector,
    D: DoseRateSource,
    K: Clock,
    S: EventSink,
{
    let mut report = WorkerReport::default();

    loop {
        let wake = future::or(async { Wake::Fix(mailbox.receive().await) }, async {
            shutdown.wait().await;
            Wake::Shutdown
        })
        .await;

        let fix = match wake {
            Wake::Fix(fix) => fix,
            Wake::Shutdown => break,
        };

        let superseded = mailbox.take_superseded();
        if superseded > 0 {
            debug!("PIPE: {} fix(es) superseded", superseded);
            report.superseded += superseded;
            sink.emit(&TrackerEvent::FixesSuperseded(superseded));
        }

        report.handled += 1;
        match service.handle_fix(fix, sink) {
            Ok(PublishOutcome::Delivered(_)) => report.delivered += 1,
            Ok(PublishOutcome::Dropped(_)) => report.dropped += 1,
            Err(e) => {
                warn!("PIPE: fix not delivered: {}", e);
                report.dropped += 1;
            }
        }
    }

    service.shutdown(sink);
    info!(
        "PIPE: worker stopped ({} handled, {} delivered, {} dropped, {} superseded)",
        report.handled, report.delivered, report.dropped, report.superseded
    );
    report
}

/// Start the service and run the publish loop on a dedicated thread.
pub fn spawn<C, D, K, S>(
    mut service: TrackerService<C, D, K>,
    mailbox: Arc<FixMailbox>,
    shutdown: Arc<Shutdown>,
    mut sink: S,
) -> std::io::Result<JoinHandle<WorkerReport>>
where
    C: Connector,
    D: DoseRateSource,
    K: Clock,
    TrackerService<C, D, K>: Send + 'static,
    S: EventSink + Send + 'static,
{
    thread::Builder::new()
        .name("publish-worker".into())
        .spawn(move || {
            service.start(&mut sink);
            future::block_on(run(&mut service, &mailbox, &shutdown, &mut sink))
        })
}

/// Run [`pump`] on a dedicated thread.
///
/// Requests shutdown once the source runs dry.  The handle yields the number
/// of fixes posted; callers that stop on an external request need not join it.
pub fn spawn_pump<I>(
    fixes: I,
    mailbox: Arc<FixMailbox>,
    shutdown: Arc<Shutdown>,
) -> std::io::Result<JoinHandle<u64>>
where
    I: IntoIterator<Item = PositionFix> + Send + 'static,
{
    thread::Builder::new()
        .name("location-pump".into())
        .spawn(move || {
            let posted = pump(fixes, &mailbox, &shutdown);
            if !shutdown.is_requested() {
                info!("PIPE: location input ended after {} fix(es)", posted);
                shutdown.request();
            }
            posted
        })
}

/// Feed fixes from a subscription into the mailbox.
///
/// Returns the number of fixes posted.  Stops early once shutdown has been
/// requested; the caller still owns requesting shutdown when the source
/// runs dry.
pub fn pump<I>(fixes: I, mailbox: &FixMailbox, shutdown: &Shutdown) -> u64
where
    I: IntoIterator<Item = PositionFix>,
{
    let mut posted = 0;
    for fix in fixes {
        if shutdown.is_requested() {
            break;
        }
        mailbox.post(fix);
        posted += 1;
    }
    posted
}
