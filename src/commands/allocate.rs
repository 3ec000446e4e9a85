//! Implementation of the `drivelease allocate` command.
//!
//! Leases one drive, mounts the requested volume on it, waits for the drive
//! to become ready, and hands the lease to a detached watchdog before the
//! token is printed.
//!
//! # Steps
//!
//! 1. Resolve the device group in the registry (fallback: any drive)
//! 2. Allocate a drive from the broker
//! 3. Arm the recovery point
//! 4. Open the door, clearing a cartridge a crashed holder left behind
//! 5. Mount the volume and verify it landed on the leased drive
//! 6. Wait for the drive to report ready (unless the group says not to)
//! 7. Start the watchdog, which records the lease
//! 8. Disarm the recovery point and print the token
//!
//! # Recovery
//!
//! Any failure or termination signal after step 3 goes through the recovery
//! point, which releases the drive once and decides the exit code. Before
//! step 3 there is nothing to release.


use crate::broker::{AllocRequest, Broker, CommandBroker, MountMode};
use crate::cli::AllocateArgs;
use crate::context::LeaseContext;
use crate::drive::{DriveOpener, MtOpener, Readiness, ReadinessPoller, open_door};
use crate::error::{LeaseError, Result};
use crate::events::{Event, EventAction};
use crate::lease::{DeviceDescriptor, LeaseToken};
use crate::protocol::{AllocationEngine, MountEngine, MountSpec};
use crate::recovery::{Interrupt, RecoveryController, SignalTrap};
use crate::registry::DeviceGroupEntry;
use crate::release::Releaser;
use crate::watchdog::{ForkLauncher, WatchdogLauncher};
use serde_json::json;

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LeaseRequest {
    pub volume: String,
    pub group: String,
    pub mode: MountMode,
    pub overwrite: bool,
    pub timeout_minutes: Option<i64>,
}

impl From<&AllocateArgs> for LeaseRequest {
    fn from(args: &AllocateArgs) -> Self {
        Self {
            volume: args.volume.clone(),
            group: args.group.clone(),
            mode: if args.write {
                MountMode::Write
            } else {
                MountMode::Read
            },
            overwrite: args.overwrite,
            timeout_minutes: args.timeout_minutes,
        }
    }
}

/// The collaborators an allocation talks to.
pub(crate) struct Collaborators<'a> {
    pub broker: &'a mut dyn Broker,
    pub opener: &'a dyn DriveOpener,
    pub interrupt: &'a dyn Interrupt,
    pub launcher: &'a mut dyn WatchdogLauncher,
}

/// Run the allocate command and print the lease token.
pub fn cmd_allocate(ctx: &LeaseContext, args: AllocateArgs) -> Result<()> {
    let trap = SignalTrap::install()?;
    let mut broker = CommandBroker::from_config(&ctx.config)?;
    let opener = MtOpener;
    let mut launcher = ForkLauncher::new(&ctx.config);
    let owner_pid = nix::unistd::getppid().as_raw() as u32;

    let token = allocate_lease(
        ctx,
        &LeaseRequest::from(&args),
        owner_pid,
        Collaborators {
            broker: &mut broker,
            opener: &opener,
            interrupt: &trap,
            launcher: &mut launcher,
        },
    )?;

    println!("{}", token);
    Ok(())
}

/// Lease a drive for `owner_pid` and return its token.
///
/// A failure comes back as `LeaseError::Aborted`, carrying the exit code
/// chosen by the recovery point.
pub(crate) fn allocate_lease(
    ctx: &LeaseContext,
    request: &LeaseRequest,
    owner_pid: u32,
    with: Collaborators<'_>,
) -> Result<LeaseToken> {
    let Collaborators {
        broker,
        opener,
        interrupt,
        launcher,
    } = with;
    let mut controller = RecoveryController::new();

    let outcome = hold_drive(
        ctx,
        request,
        owner_pid,
        &mut *broker,
        opener,
        interrupt,
        launcher,
        &mut controller,
    );

    match outcome {
        Ok(dev) => {
            let token = dev.token();
            tracing::info!(lease = %token, volume = %request.volume, "lease handed to watchdog");
            ctx.events.record(
                Event::new(EventAction::Allocate)
                    .with_lease(&token)
                    .with_details(json!({
                        "volume": request.volume,
                        "group": request.group,
                        "mode": request.mode.as_str(),
                        "overwrite": request.overwrite,
                    })),
            );
            Ok(token)
        }
        Err(err) => {
            let err = match interrupt.pending() {
                Some(signal) if !matches!(err, LeaseError::Interrupted(_)) => {
                    tracing::warn!(error = %err, signal, "failure while a signal was pending");
                    LeaseError::Interrupted(signal)
                }
                _ => err,
            };
            let armed = controller.is_armed();
            let mut releaser = Releaser::new(broker, opener, &ctx.drive);
            let (exit_code, report) = controller.recover(err.recovery_tag(), &mut releaser);

            if let Some(report) = &report {
                ctx.events.record(Event::new(EventAction::Recover).with_details(json!({
                    "tag": err.recovery_tag(),
                    "already_released": report.was_already_released(),
                    "door_failures": report.door.failures,
                })));
            }
            tracing::error!(error = %err, exit_code, released = report.is_some(), "allocate failed");
            ctx.events.record(
                Event::new(EventAction::AllocateFailed).with_details(json!({
                    "volume": request.volume,
                    "group": request.group,
                    "error": err.to_string(),
                    "exit_code": exit_code,
                    "leased": armed,
                })),
            );

            Err(LeaseError::Aborted {
                exit_code,
                cause: Box::new(err),
            })
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn hold_drive(
    ctx: &LeaseContext,
    request: &LeaseRequest,
    owner_pid: u32,
    broker: &mut dyn Broker,
    opener: &dyn DriveOpener,
    interrupt: &dyn Interrupt,
    launcher: &mut dyn WatchdogLauncher,
    controller: &mut RecoveryController,
) -> Result<DeviceDescriptor> {
    let config = &ctx.config;
    let timeout = config.lease_timeout(request.timeout_minutes);
    let entry = ctx.registry.resolve(&request.group);

    let mut dev = AllocationEngine::new(&mut *broker, interrupt, config.reply_poll()).allocate(
        &allocation_request(&request.group, entry.as_ref()),
        timeout,
        owner_pid,
    )?;
    if let Some(entry) = &entry {
        dev.flags = entry.flags;
    }
    controller.arm(&dev);

    let door = open_door(&mut *broker, opener, &dev, &ctx.drive);
    if !door.is_clean() {
        tracing::warn!(drive = %dev.drive_name(), failures = %door.summary(), "door-open before mount");
    }

    let spec = MountSpec {
        volume: request.volume.clone(),
        mode: request.mode,
        overwrite: request.overwrite,
        timeout,
    };
    MountEngine::new(
        &mut *broker,
        interrupt,
        config.reply_poll(),
        config.mount_cancel_ack(),
    )
    .mount(&mut dev, &spec)?;

    let readiness = ReadinessPoller::new(&mut *broker, opener, interrupt, &ctx.drive)
        .wait_ready(&dev, ctx.drive.ready_max_attempts)?;
    if readiness == Readiness::TimedOut {
        return Err(LeaseError::ReadinessTimeout(dev.drive_name()));
    }

    interrupt.check()?;
    dev.watchdog_pid = launcher.launch(&dev, &ctx.lease_dir)?;
    controller.disarm();
    Ok(dev)
}

/// Broker request for `group`: the registry row pins host and device type,
/// an unknown group leaves both open and names the group instead.
pub(crate) fn allocation_request(group: &str, entry: Option<&DeviceGroupEntry>) -> AllocRequest {
    match entry {
        Some(entry) => AllocRequest::new(Some(&entry.host), None, Some(&entry.device)),
        None => {
            tracing::info!(group, "device group not in registry, asking for any drive");
            AllocRequest::new(None, Some(group), None)
        }
    }
}
