//! Acquiring a drive slot from the broker.

use super::{Waited, wait_sliced};
use crate::broker::{AllocReply, AllocRequest, Broker, Grant, RequestId};
use crate::error::{LeaseError, Result};
use crate::lease::DeviceDescriptor;
use crate::recovery::Interrupt;
use std::time::Duration;

/// Runs one allocation request to completion.
pub struct AllocationEngine<'a> {
    broker: &'a mut dyn Broker,
    interrupt: &'a dyn Interrupt,
    slice: Duration,
}

impl<'a> AllocationEngine<'a> {
    pub fn new(broker: &'a mut dyn Broker, interrupt: &'a dyn Interrupt, slice: Duration) -> Self {
        Self {
            broker,
            interrupt,
            slice,
        }
    }

    /// Queue `request` and wait up to `timeout` for the grant.
    ///
    /// On success the descriptor carries the granted drive and `owner_pid`.
    /// A grant that slips in right after our cancel still counts: the broker
    /// may have granted the request before it saw the cancel.
    pub fn allocate(
        &mut self,
        request: &AllocRequest,
        timeout: Duration,
        owner_pid: u32,
    ) -> Result<DeviceDescriptor> {
        let bid = self.broker.queue_alloc(request)?;
        tracing::info!(
            bid,
            host = %request.host,
            group = %request.group,
            device_type = %request.device_type,
            timeout_secs = timeout.as_secs(),
            "allocation queued"
        );

        let broker = &mut *self.broker;
        let waited = wait_sliced(self.interrupt, self.slice, timeout, |slice| {
            match broker.alloc_reply(slice)? {
                AllocReply::Granted(grant) => Ok(Some(grant)),
                AllocReply::TimedOut => Ok(None),
                AllocReply::NonePending => Err(LeaseError::Broker(format!(
                    "no allocation request pending while waiting for request {}",
                    bid
                ))),
            }
        })?;

        match waited {
            Waited::Reply(grant) => {
                let grant = check_bid(bid, grant)?;
                Ok(granted(grant, owner_pid))
            }
            Waited::TimedOut => {
                tracing::warn!(bid, "allocation timed out, cancelling");
                match self.cancel_and_repoll(bid)? {
                    Some(grant) => {
                        tracing::info!(bid, "grant arrived after cancel, keeping it");
                        Ok(granted(grant, owner_pid))
                    }
                    None => Err(LeaseError::Timeout(format!(
                        "no drive granted for request {} within {} seconds",
                        bid,
                        timeout.as_secs()
                    ))),
                }
            }
            Waited::Interrupted(signal) => {
                tracing::warn!(bid, signal, "allocation interrupted, cancelling");
                self.abandon(bid);
                Err(LeaseError::Interrupted(signal))
            }
        }
    }

    /// Cancel `bid`, then look once more for a grant that raced the cancel.
    fn cancel_and_repoll(&mut self, bid: RequestId) -> Result<Option<Grant>> {
        self.broker.alloc_cancel(bid)?;
        match self.broker.alloc_reply(Duration::ZERO)? {
            AllocReply::Granted(grant) => check_bid(bid, grant).map(Some),
            AllocReply::TimedOut | AllocReply::NonePending => Ok(None),
        }
    }

    /// Withdraw `bid` after a signal. A grant that arrives anyway is handed
    /// straight back; nobody is left to use it.
    fn abandon(&mut self, bid: RequestId) {
        match self.cancel_and_repoll(bid) {
            Ok(Some(grant)) => {
                tracing::warn!(bid, host = %grant.host, device = %grant.device, "returning late grant");
                if let Err(e) = self.broker.deallocate(&grant.host, &grant.device) {
                    tracing::error!(bid, error = %e, "failed to return late grant");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(bid, error = %e, "allocation cancel failed"),
        }
    }
}

fn check_bid(bid: RequestId, grant: Grant) -> Result<Grant> {
    if grant.bid == bid {
        Ok(grant)
    } else {
        tracing::error!(expected = bid, got = grant.bid, "broker replied to a foreign request");
        Err(LeaseError::Mismatch {
            expected: bid,
            got: grant.bid,
        })
    }
}

fn granted(grant: Grant, owner_pid: u32) -> DeviceDescriptor {
    tracing::info!(bid = grant.bid, host = %grant.host, device = %grant.device, "drive allocated");
    DeviceDescriptor::new(grant.host, grant.device, owner_pid)
}
