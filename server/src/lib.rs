//! Polling loop bridging the control service and serial-attached devices.
//!
//! Once per cycle, at most one pending schedule and one pending request are
//! fetched, dispatched to their device and reported back. Everything runs
//! to completion before the next cycle; pending work queues on the remote
//! side.

use std::error;
use std::fmt;
use std::time::Duration;

use async_io::Timer;

use pinbridge_proto::{Request, Response, Schedule};

pub mod dispatch;
pub mod registry;
pub mod remote;

pub use registry::{Bridge, Registry};
pub use remote::{HttpRemote, RemoteError, RemoteService};

/// Pause between poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The only failure that stops the loop: a device's serial loop is gone
/// and its byte stream cannot be trusted any more.
#[derive(Debug)]
pub enum Error {
    LinkDown { port: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LinkDown { port } => write!(f, "device link at {port} is down"),
        }
    }
}

impl error::Error for Error {}

pub struct Server<R> {
    remote: R,
    registry: Registry,
    poll_interval: Duration,
}

impl<R> Server<R>
where
    R: RemoteService,
{
    pub fn new(remote: R, registry: Registry) -> Self {
        Server { remote, registry, poll_interval: POLL_INTERVAL }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn main_loop(&self) -> Result<(), Error> {
        loop {
            self.run_cycle().await?;
            Timer::after(self.poll_interval).await;
        }
    }

    /// One cycle body: the schedule step, then the request step. A failed
    /// fetch skips its step and the loop carries on.
    pub async fn run_cycle(&self) -> Result<(), Error> {
        match self.remote.fetch_schedule().await {
            Ok(Some(schedule)) => self.handle_schedule(&schedule).await?,
            Ok(None) => {}
            Err(e) => log::warn!("schedule fetch failed: {e}"),
        }

        match self.remote.fetch_request().await {
            Ok(Some(request)) => self.handle_request(&request).await?,
            Ok(None) => {}
            Err(e) => log::warn!("request fetch failed: {e}"),
        }

        Ok(())
    }

    /// The error flag of the done report means "no device serves this
    /// port"; a rejected or garbled set still counts as done.
    async fn handle_schedule(&self, schedule: &Schedule) -> Result<(), Error> {
        let error = match self.registry.device_at(&schedule.port) {
            Some(bridge) => {
                dispatch::perform_schedule(&self.registry, bridge, schedule).await?;
                false
            }
            None => true,
        };

        if let Err(e) = self.remote.report_schedule_done(schedule.id, error).await {
            log::warn!("could not report schedule {} done: {e}", schedule.id);
        }
        Ok(())
    }

    async fn handle_request(&self, request: &Request) -> Result<(), Error> {
        let response = match self.registry.device_at(&request.port) {
            Some(bridge) => dispatch::perform_request(bridge, request).await?,
            None => Response::error(request.id),
        };

        if let Err(e) = self.remote.post_response(&response).await {
            log::warn!("could not post response for request {:?}: {e}", request.id);
        }
        Ok(())
    }
}
