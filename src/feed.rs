//! External alarm feed
//!
//! A line stream (file, FIFO or pipe) of alarm commands from outside the
//! simulator:
//!
//! ```text
//! red <id>      yellow <id>      off <id>
//! alloff        ack
//! text <id> <message...>         cleartext <id>
//! ```
//!
//! Lines are queued as they arrive and drained on a fixed poll period, so a
//! burst of lines lands within a single state update. Malformed lines are
//! dropped.

use log::{debug, info};
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::alarm::{AlarmBoard, AlarmMode};
use crate::error::FeedError;
use crate::lattice::ElementId;
use crate::reactor::Reactor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    Red(ElementId),
    Yellow(ElementId),
    Off(ElementId),
    AllOff,
    Ack,
    Text(ElementId, String),
    ClearText(ElementId),
}

fn id_arg(token: Option<&str>) -> Result<ElementId, FeedError> {
    let token = token.ok_or(FeedError::MissingId)?;
    token.parse().map_err(|_| FeedError::BadId(token.to_string()))
}

impl FromStr for FeedCommand {
    type Err = FeedError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let head = parts.next().ok_or(FeedError::Empty)?;
        match head {
            "red" => Ok(FeedCommand::Red(id_arg(parts.next())?)),
            "yellow" => Ok(FeedCommand::Yellow(id_arg(parts.next())?)),
            "off" => Ok(FeedCommand::Off(id_arg(parts.next())?)),
            "alloff" => Ok(FeedCommand::AllOff),
            "ack" => Ok(FeedCommand::Ack),
            "text" => {
                let id = id_arg(parts.next())?;
                Ok(FeedCommand::Text(id, parts.collect::<Vec<_>>().join(" ")))
            }
            "cleartext" => Ok(FeedCommand::ClearText(id_arg(parts.next())?)),
            other => Err(FeedError::UnknownCommand(other.to_string())),
        }
    }
}

impl FeedCommand {
    /// Apply to the alarm board. Returns false when the id names no element.
    pub fn apply(&self, board: &mut AlarmBoard) -> bool {
        match self {
            FeedCommand::Red(id) => board.trigger(*id, AlarmMode::Red),
            FeedCommand::Yellow(id) => board.trigger(*id, AlarmMode::Yellow),
            FeedCommand::Off(id) => board.turn_off(*id),
            FeedCommand::AllOff => {
                board.all_off();
                true
            }
            FeedCommand::Ack => {
                board.acknowledge();
                true
            }
            FeedCommand::Text(id, text) => board.set_text(*id, text.clone()),
            FeedCommand::ClearText(id) => {
                board.clear_text(*id);
                true
            }
        }
    }
}

/// Receiving end of the feed queue
#[derive(Debug)]
pub struct AlarmFeed {
    rx: UnboundedReceiver<String>,
}

pub type FeedSender = UnboundedSender<String>;

pub fn channel() -> (FeedSender, AlarmFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, AlarmFeed { rx })
}

impl AlarmFeed {
    /// Apply every queued line under one plant update. Returns how many
    /// lines took effect.
    pub fn drain(&mut self, reactor: &Reactor) -> usize {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        if lines.is_empty() {
            return 0;
        }

        reactor.update(|st| {
            let mut applied = 0;
            for line in &lines {
                match line.parse::<FeedCommand>() {
                    Ok(cmd) if cmd.apply(&mut st.alarms) => applied += 1,
                    Ok(cmd) => debug!("Alarm feed: no element for {cmd:?}"),
                    Err(FeedError::Empty) => {}
                    Err(e) => debug!("Alarm feed: dropped '{line}': {e}"),
                }
            }
            applied
        })
    }
}

/// Forward lines from `reader` into the feed queue until EOF or until the
/// queue is closed
pub fn spawn_reader<R>(reader: R, tx: FeedSender) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if tx.send(line).is_err() {
                break;
            }
        }
        info!("Alarm feed closed");
        Ok(())
    })
}
