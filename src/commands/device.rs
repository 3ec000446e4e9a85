//! Implementation of the `drivelease device` command.

use crate::broker::{Broker, CommandBroker};
use crate::cli::{DEFAULT_ATTRIBUTE, DeviceArgs};
use crate::context::LeaseContext;
use crate::error::{LeaseError, Result};
use crate::lease::LeaseToken;
use std::path::PathBuf;

pub fn cmd_device(ctx: &LeaseContext, args: DeviceArgs) -> Result<()> {
    let (attribute, token) = args.attribute_and_token().map_err(LeaseError::UserError)?;
    let token = LeaseToken::parse(token)?;
    let mut broker = CommandBroker::from_config(&ctx.config)?;

    let path = device_path(&mut broker, ctx, attribute, &token)?;
    println!("{}", path.display());
    Ok(())
}

/// Device file of the leased drive for `attribute`.
pub(crate) fn device_path(
    broker: &mut dyn Broker,
    ctx: &LeaseContext,
    attribute: &str,
    token: &LeaseToken,
) -> Result<PathBuf> {
    let spec = attribute_spec(attribute, &ctx.config.default_device_attribute)?;
    broker.device_file(&token.host, &token.device, &spec)
}

/// Broker attribute spec: the default attribute alone, or `<attribute>:<default>`.
pub(crate) fn attribute_spec(attribute: &str, default: &str) -> Result<String> {
    if attribute.is_empty() || attribute.contains(char::is_whitespace) {
        return Err(LeaseError::UserError(format!(
            "illegal attribute '{}'",
            attribute
        )));
    }
    if attribute == DEFAULT_ATTRIBUTE {
        Ok(default.to_string())
    } else {
        Ok(format!("{}:{}", attribute, default))
    }
}
