//! Interface to the external allocation and mount broker.
//!
//! The broker is an opaque request/reply/cancel service: requests return
//! immediately, replies are collected with a bounded blocking wait, and a
//! pending request can be cancelled. The protocol engines in `protocol` only
//! ever talk to the `Broker` trait; `CommandBroker` is the production
//! implementation.

mod command;
mod types;


pub use command::CommandBroker;
pub use types::{
    AllocReply, AllocRequest, Grant, MountMode, MountReply, MountRequest, MountResult,
    ReleaseStatus, RequestId,
};

use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Operations the broker offers.
pub trait Broker {
    /// Queue an allocation request; returns its request id.
    fn queue_alloc(&mut self, request: &AllocRequest) -> Result<RequestId>;

    /// Wait up to `timeout` for the next allocation reply.
    fn alloc_reply(&mut self, timeout: Duration) -> Result<AllocReply>;

    /// Cancel a queued allocation request.
    fn alloc_cancel(&mut self, bid: RequestId) -> Result<()>;

    /// Give a drive back to the broker.
    fn deallocate(&mut self, host: &str, device: &str) -> Result<ReleaseStatus>;

    /// Ask for a volume to be mounted on an allocated drive.
    fn mount_request(&mut self, request: &MountRequest) -> Result<()>;

    /// Wait up to `timeout` for the next mount reply.
    fn mount_reply(&mut self, timeout: Duration) -> Result<MountReply>;

    /// Cancel the pending mount on a drive.
    fn mount_cancel(&mut self, host: &str, device: &str) -> Result<()>;

    /// Dismount whatever volume is on a drive.
    fn dismount(&mut self, host: &str, device: &str, options: &str) -> Result<ReleaseStatus>;

    /// Send a message to the operator channel `target`.
    fn operator_message(&mut self, target: &str, text: &str) -> Result<()>;

    /// Resolve the device special file of a drive for an attribute spec.
    fn device_file(&mut self, host: &str, device: &str, attribute: &str) -> Result<PathBuf>;
}
