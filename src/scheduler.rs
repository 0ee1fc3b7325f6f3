//! Periodic drivers
//!
//! Three independent loops on the tokio runtime: the simulation tick, the
//! alarm flash-phase timer and the external feed poll. None of them awaits
//! while holding plant state.

use log::{debug, info};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::feed::AlarmFeed;
use crate::reactor::Reactor;

/// Handles of the running loops; dropping it leaves them running
#[derive(Debug)]
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the tick and flash loops, plus the feed poll when a feed is given
    pub fn spawn(reactor: Arc<Reactor>, feed: Option<AlarmFeed>) -> Self {
        let config = reactor.config();
        let (tick_period, flash_period, poll_period) =
            (config.tick_period(), config.flash_period(), config.feed_poll_period());
        let mut handles = Vec::with_capacity(3);

        let tick_reactor = Arc::clone(&reactor);
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tick_reactor.tick();
            }
        }));

        let flash_reactor = Arc::clone(&reactor);
        handles.push(tokio::spawn(async move {
            let mut flasher = interval(flash_period);
            loop {
                flasher.tick().await;
                flash_reactor.toggle_flash_phase();
            }
        }));

        if let Some(mut feed) = feed {
            let feed_reactor = Arc::clone(&reactor);
            handles.push(tokio::spawn(async move {
                let mut poll = interval(poll_period);
                poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    poll.tick().await;
                    let applied = feed.drain(&feed_reactor);
                    if applied > 0 {
                        debug!("Alarm feed: applied {applied} line(s)");
                    }
                }
            }));
        }

        info!(
            "Scheduler started: tick {} ms, flash {} ms, feed poll {} ms",
            config.tick_ms, config.flash_ms, config.feed_poll_ms
        );
        Self { handles }
    }

    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
        info!("Scheduler stopped");
    }
}
