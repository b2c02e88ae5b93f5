//! Panel-side listener for writing notices from the page

use super::messages::PanelNotice;
use super::{Dispatch, Listener, decode_known};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Forwards `userWritingDetected` notices as timestamps; never replies
#[derive(Debug)]
pub struct WritingListener {
    tx: mpsc::UnboundedSender<DateTime<Utc>>,
}

impl WritingListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DateTime<Utc>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Listener for WritingListener {
    fn handle(&self, message: &Value) -> Dispatch {
        match decode_known::<PanelNotice>(message, PanelNotice::ACTIONS) {
            None => Dispatch::Ignored,
            Some(Err(e)) => {
                warn!(error = %e, "dropping malformed notice");
                Dispatch::Silent
            }
            Some(Ok(PanelNotice::UserWritingDetected)) => {
                debug!("user writing detected");
                if self.tx.send(Utc::now()).is_err() {
                    debug!("writing notice receiver is gone");
                }
                Dispatch::Silent
            }
        }
    }
}
