//! The `run` state machine: merge the schedule, dispatch every pair to the right handler,
//! realize deferred work, clear the schedule.

use super::traversal::Step;
use super::types::ExtraArgs;
use crate::Result;
use crate::target::Target;
use std::path::Path;

pub(crate) async fn run<S: Step + ?Sized>(
    step: &mut S,
    in_paths: Vec<Target>,
    out_paths: Vec<Target>,
    extra_args: ExtraArgs,
) -> Result<Vec<Target>> {
    let name = step.name().to_string();
    let verbosity = step.core().config.verbosity;
    verbose!(1, verbosity, "started {name} step");

    step.core_mut().schedule(in_paths, out_paths);
    let dispatched = dispatch_all(step, &extra_args).await;

    // deferred work is realized and the schedule cleared even when a handler failed
    let realized = step.core_mut().realize().await;
    step.core_mut().clear_schedule();
    dispatched?;

    let core = step.core();
    let failed = core.ledger.failures().count();
    if failed > 0 {
        warn!("{name}: {failed} unit(s) failed");
    }
    verbose!(
        1,
        verbosity,
        "finished {name} step ({} processed, {realized} deferred)",
        core.ledger.len()
    );
    Ok(core.ledger.processed_out())
}

async fn dispatch_all<S: Step + ?Sized>(step: &mut S, extra_args: &ExtraArgs) -> Result<()> {
    let (scheduled_in, scheduled_out) = {
        let (ins, outs) = step.core().scheduled();
        (ins.to_vec(), outs.to_vec())
    };
    let total = scheduled_in.len();
    for (i, (input, output)) in scheduled_in.iter().zip(&scheduled_out).enumerate() {
        let core = step.core();
        if core.ledger.contains(input) && !core.config.overwrite {
            trace!("{input}: already processed");
            continue;
        }
        for path in output.paths() {
            xx::file::mkdirp(path)?;
        }
        let verbosity = core.config.verbosity;
        verbose!(2, verbosity, "processing {input} -> {output}");

        let args = slice_args(extra_args, i, total);
        if core.config.nested {
            step.run_nested(input, output, &args).await?;
        } else if input.first().is_some_and(Path::is_dir) {
            step.run_directory(input, output, &args).await?;
        } else {
            step.run_single(input, output, &args).await?;
        }
        verbose!(2, verbosity, "processed {input} -> {output}");
    }
    Ok(())
}

/// Pick element `i` of every list argument that has one entry per scheduled input.
fn slice_args(extra_args: &ExtraArgs, i: usize, total: usize) -> ExtraArgs {
    extra_args
        .iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::Array(values) if values.len() == total => values[i].clone(),
                value => value.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}
