//! `symphony run`: keep the bridge up until Ctrl-C.

use tracing::{info, warn};

use symphony_core::{Bridge, SetpointKind};

use crate::cli::{RunArgs, SetpointArg};
use crate::error::CliError;

pub async fn handle(bridge: &Bridge, args: RunArgs) -> Result<(), CliError> {
    let mut pending: Vec<(SetpointKind, SetpointArg)> = args
        .heat
        .into_iter()
        .map(|arg| (SetpointKind::Heating, arg))
        .chain(args.cool.into_iter().map(|arg| (SetpointKind::Cooling, arg)))
        .collect();

    let mut units = bridge.registry().subscribe();
    bridge.start().await?;
    info!(user = %bridge.username(), "bridge running, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        // Setpoints wait until their unit shows up on the roster.
        pending.retain(|(kind, arg)| {
            let Some(record) = bridge.registry().find(&arg.unit) else {
                return true;
            };
            info!(unit = %record.unit_id, %kind, degrees = arg.degrees, "queueing setpoint");
            bridge.setpoints().queue(*kind, record.unit_id.clone(), arg.degrees);
            false
        });

        tokio::select! {
            biased;
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                }
                break;
            }
            changed = units.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("stopping");
    bridge.stop().await;

    for (kind, arg) in &pending {
        warn!(unit = %arg.unit, %kind, "setpoint never applied, unit did not appear");
    }
    Ok(())
}
