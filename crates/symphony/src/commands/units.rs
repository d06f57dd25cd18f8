//! `symphony units`: one refresh, then print the roster.

use std::time::Duration;

use tracing::debug;

use symphony_core::Bridge;

use crate::cli::{GlobalOpts, UnitsArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(bridge: &Bridge, args: UnitsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cycles = bridge.cycles();
    bridge.start().await?;

    let waited = tokio::time::timeout(
        Duration::from_secs(args.wait),
        cycles.wait_for(Option::is_some),
    )
    .await;
    let report = match waited {
        Ok(Ok(report)) => *report,
        Ok(Err(_)) | Err(_) => None,
    };
    bridge.stop().await;

    let Some(report) = report else {
        return Err(CliError::Timeout { seconds: args.wait });
    };
    debug!(?report, "first cycle");

    let units: Vec<_> = bridge
        .registry()
        .all()
        .iter()
        .map(|record| record.as_ref().clone())
        .collect();
    let rendered = output::render_units(global.output, &units)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
