//! Broker implementation that drives an external helper program.
//!
//! Every broker operation runs `<broker_command> <op> <args...>` without a
//! shell. The helper answers with one line on stdout:
//!
//! - `ok [fields...]`
//! - `timeout`
//! - `none-pending`
//! - `not-allocated` / `not-mounted`
//! - `error <message...>`
//!
//! A non-zero exit status without one of these lines is a broker error.

use super::types::{
    AllocReply, AllocRequest, Grant, MountReply, MountRequest, MountResult, ReleaseStatus,
    RequestId,
};
use super::Broker;
use crate::config::Config;
use crate::error::{LeaseError, Result};
use std::path::PathBuf;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::time::Duration;

/// One parsed helper answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HelperReply {
    Ok(Vec<String>),
    Timeout,
    NonePending,
    NotAllocated,
    NotMounted,
}

/// Broker reached through the configured helper command.
#[derive(Debug, Clone)]
pub struct CommandBroker {
    program: String,
    base_args: Vec<String>,
}

impl CommandBroker {
    /// Build from a shell-words command line such as `ocs-client --server robot1`.
    pub fn new(command: &str) -> Result<Self> {
        let mut words = shell_words::split(command).map_err(|e| {
            LeaseError::Config(format!(
                "failed to parse broker_command '{}': {}",
                command, e
            ))
        })?;
        if words.is_empty() {
            return Err(LeaseError::Config(
                "broker_command is empty after parsing".to_string(),
            ));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            base_args: words,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.broker_command)
    }

    fn run(&self, op: &str, args: &[String]) -> Result<HelperReply> {
        tracing::trace!(program = %self.program, op, ?args, "broker call");

        let output = Command::new(&self.program)
            .args(&self.base_args)
            .arg(op)
            .args(args)
            // Own process group: a terminal Ctrl-C reaches us, not the helper.
            .process_group(0)
            .output()
            .map_err(|e| {
                LeaseError::Broker(format!(
                    "failed to execute broker helper '{}': {}",
                    self.program, e
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_reply(op, &stdout, &stderr, output.status.success())
    }

    fn expect_ok(&self, op: &str, args: &[String]) -> Result<Vec<String>> {
        match self.run(op, args)? {
            HelperReply::Ok(fields) => Ok(fields),
            other => Err(unexpected(op, &other)),
        }
    }
}

/// Interpret the helper's stdout.
pub(crate) fn parse_reply(
    op: &str,
    stdout: &str,
    stderr: &str,
    success: bool,
) -> Result<HelperReply> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty());

    let Some(line) = line else {
        let detail = stderr.trim();
        return Err(LeaseError::Broker(if detail.is_empty() {
            format!("{}: no reply from broker helper", op)
        } else {
            format!("{}: {}", op, detail)
        }));
    };

    let mut words = line.split_whitespace();
    let keyword = words.next().unwrap_or_default();
    let rest: Vec<String> = words.map(str::to_string).collect();

    match keyword {
        "ok" if success => Ok(HelperReply::Ok(rest)),
        "timeout" => Ok(HelperReply::Timeout),
        "none-pending" => Ok(HelperReply::NonePending),
        "not-allocated" => Ok(HelperReply::NotAllocated),
        "not-mounted" => Ok(HelperReply::NotMounted),
        "error" => Err(LeaseError::Broker(format!("{}: {}", op, rest.join(" ")))),
        _ => Err(LeaseError::Broker(format!(
            "{}: unexpected broker reply '{}'",
            op, line
        ))),
    }
}

fn unexpected(op: &str, reply: &HelperReply) -> LeaseError {
    LeaseError::Broker(format!("{}: unexpected broker reply {:?}", op, reply))
}

fn field<'a>(op: &str, fields: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    fields
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| LeaseError::Broker(format!("{}: reply is missing {}", op, name)))
}

fn number<T: std::str::FromStr>(op: &str, value: &str, name: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| LeaseError::Broker(format!("{}: {} '{}' is not a number", op, name, value)))
}

fn millis(timeout: Duration) -> String {
    timeout.as_millis().to_string()
}

/// Parse `ok <bid> <host> <device>`.
pub(crate) fn parse_grant(fields: &[String]) -> Result<Grant> {
    let op = "alloc-reply";
    Ok(Grant {
        bid: number(op, field(op, fields, 0, "request id")?, "request id")?,
        host: field(op, fields, 1, "host")?.to_string(),
        device: field(op, fields, 2, "device")?.to_string(),
    })
}

/// Parse `ok <host> <device> <status> [message...]`.
pub(crate) fn parse_mount_result(fields: &[String]) -> Result<MountResult> {
    let op = "mount-reply";
    Ok(MountResult {
        host: field(op, fields, 0, "host")?.to_string(),
        device: field(op, fields, 1, "device")?.to_string(),
        status: number(op, field(op, fields, 2, "status")?, "status")?,
        message: fields.get(3..).map(|m| m.join(" ")).unwrap_or_default(),
    })
}

impl Broker for CommandBroker {
    fn queue_alloc(&mut self, request: &AllocRequest) -> Result<RequestId> {
        let op = "queue-alloc";
        let fields = self.expect_ok(
            op,
            &[
                request.host.clone(),
                request.group.clone(),
                request.device_type.clone(),
            ],
        )?;
        number(op, field(op, &fields, 0, "request id")?, "request id")
    }

    fn alloc_reply(&mut self, timeout: Duration) -> Result<AllocReply> {
        match self.run("alloc-reply", &[millis(timeout)])? {
            HelperReply::Ok(fields) => Ok(AllocReply::Granted(parse_grant(&fields)?)),
            HelperReply::Timeout => Ok(AllocReply::TimedOut),
            HelperReply::NonePending => Ok(AllocReply::NonePending),
            other => Err(unexpected("alloc-reply", &other)),
        }
    }

    fn alloc_cancel(&mut self, bid: RequestId) -> Result<()> {
        self.expect_ok("alloc-cancel", &[bid.to_string()]).map(|_| ())
    }

    fn deallocate(&mut self, host: &str, device: &str) -> Result<ReleaseStatus> {
        match self.run("deallocate", &[host.to_string(), device.to_string()])? {
            HelperReply::Ok(_) => Ok(ReleaseStatus::Done),
            HelperReply::NotAllocated => Ok(ReleaseStatus::AlreadyReleased),
            other => Err(unexpected("deallocate", &other)),
        }
    }

    fn mount_request(&mut self, request: &MountRequest) -> Result<()> {
        let mut args = vec![
            request.host.clone(),
            request.device.clone(),
            request.volume.clone(),
            request.mode.as_str().to_string(),
        ];
        if let Some(directive) = &request.directive {
            args.push(directive.clone());
        }
        self.expect_ok("mount", &args).map(|_| ())
    }

    fn mount_reply(&mut self, timeout: Duration) -> Result<MountReply> {
        match self.run("mount-reply", &[millis(timeout)])? {
            HelperReply::Ok(fields) => Ok(MountReply::Reply(parse_mount_result(&fields)?)),
            HelperReply::Timeout => Ok(MountReply::TimedOut),
            other => Err(unexpected("mount-reply", &other)),
        }
    }

    fn mount_cancel(&mut self, host: &str, device: &str) -> Result<()> {
        self.expect_ok("mount-cancel", &[host.to_string(), device.to_string()])
            .map(|_| ())
    }

    fn dismount(&mut self, host: &str, device: &str, options: &str) -> Result<ReleaseStatus> {
        let args = [host.to_string(), device.to_string(), options.to_string()];
        match self.run("dismount", &args)? {
            HelperReply::Ok(_) => Ok(ReleaseStatus::Done),
            HelperReply::NotMounted => Ok(ReleaseStatus::AlreadyReleased),
            other => Err(unexpected("dismount", &other)),
        }
    }

    fn operator_message(&mut self, target: &str, text: &str) -> Result<()> {
        self.expect_ok("oper-message", &[target.to_string(), text.to_string()])
            .map(|_| ())
    }

    fn device_file(&mut self, host: &str, device: &str, attribute: &str) -> Result<PathBuf> {
        let op = "device-file";
        let fields = self.expect_ok(
            op,
            &[host.to_string(), device.to_string(), attribute.to_string()],
        )?;
        Ok(PathBuf::from(field(op, &fields, 0, "path")?))
    }
}
