//! Implementation of the `drivelease notify` command.

use crate::broker::{Broker, CommandBroker};
use crate::cli::NotifyArgs;
use crate::context::LeaseContext;
use crate::error::Result;
use crate::events::{Event, EventAction};
use crate::lease::LeaseToken;
use serde_json::json;

pub fn cmd_notify(ctx: &LeaseContext, args: NotifyArgs) -> Result<()> {
    let token = LeaseToken::parse(&args.token)?;
    let mut broker = CommandBroker::from_config(&ctx.config)?;
    notify_operator(ctx, &mut broker, &token, &args.text())
}

/// Operator text for a message about a lease.
pub(crate) fn operator_text(token: &LeaseToken, message: &str) -> String {
    format!(" {} : {}", token, message)
}

/// Send `message` tagged with `token` to the configured operator channel.
pub(crate) fn notify_operator(
    ctx: &LeaseContext,
    broker: &mut dyn Broker,
    token: &LeaseToken,
    message: &str,
) -> Result<()> {
    let target = &ctx.config.operator_target;
    let text = operator_text(token, message);
    tracing::info!(lease = %token, target = %target, "message to operator");

    if let Err(e) = broker.operator_message(target, &text) {
        tracing::error!(lease = %token, error = %e, "operator message failed");
        return Err(e);
    }

    ctx.events.record(
        Event::new(EventAction::Notify)
            .with_lease(token)
            .with_details(json!({ "target": target, "message": message })),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBroker, temp_config};

    #[test]
    fn test_message_is_tagged_with_token() {
        let (_temp, config) = temp_config();
        let ctx = LeaseContext::from_config(config);
        let mut broker = MockBroker::new();
        let token = LeaseToken::parse("robot1.drv3.10.11").unwrap();

        notify_operator(&ctx, &mut broker, &token, "please load VOL002").unwrap();

        assert_eq!(
            broker.messages,
            vec![(
                "any".to_string(),
                " robot1.drv3.10.11 : please load VOL002".to_string()
            )]
        );
        assert_eq!(ctx.events.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_delivery_failure_fails_command() {
        let (_temp, config) = temp_config();
        let ctx = LeaseContext::from_config(config);
        let mut broker = MockBroker::new();
        broker.operator_error = Some("console offline".to_string());
        let token = LeaseToken::parse("robot1.drv3.10.11").unwrap();

        let err = notify_operator(&ctx, &mut broker, &token, "hello").unwrap_err();

        assert_eq!(err.exit_code(), crate::exit_codes::FAILURE);
        assert!(ctx.events.read_all().unwrap().is_empty());
    }
}
