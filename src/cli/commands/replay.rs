//! replay command - Apply a scenario file to a fresh ledger

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::ProtocolSinkKind;
use crate::engine::protocol::{FileProtocol, NullProtocol, ProtocolSink, TracingProtocol};
use crate::engine::scenario::{Replay, Report, Scenario, StepOutcome, StepReport};
use crate::ui::output;

/// Replay `scenario` and print one block per step plus a summary.
///
/// `protocol` and `no_protocol` override the configured protocol sink.
pub fn replay(
    ctx: &Context,
    scenario: &Path,
    protocol: Option<&Path>,
    no_protocol: bool,
    strict: bool,
) -> Result<()> {
    let verbosity = ctx.verbosity();
    let document = Scenario::load(scenario)?;

    let sink = if no_protocol {
        ProtocolSinkKind::None
    } else if let Some(path) = protocol {
        ProtocolSinkKind::File(path.to_path_buf())
    } else {
        ctx.config.protocol_sink()
    };
    output::debug(format!("protocol sink: {sink:?}"), verbosity);

    let mut replay = Replay::new(
        &document,
        build_sink(&sink),
        ctx.config.default_daily_rate(),
    )
    .context("Failed to set up scenario")?;
    let report = replay.run(&document.steps);

    for step in &report.steps {
        output::print(format_step(step), verbosity);
    }
    output::success(summary(&report));

    let rejected = report.rejected();
    if strict && rejected > 0 {
        bail!("{rejected} step(s) rejected");
    }
    Ok(())
}

fn build_sink(kind: &ProtocolSinkKind) -> Box<dyn ProtocolSink> {
    match kind {
        ProtocolSinkKind::Log => Box::new(TracingProtocol),
        ProtocolSinkKind::File(path) => Box::new(FileProtocol::new(path)),
        ProtocolSinkKind::None => Box::new(NullProtocol),
    }
}

/// `[n] step` followed by the indented outcome.
fn format_step(report: &StepReport) -> String {
    let (label, detail) = match &report.outcome {
        StepOutcome::Applied(detail) => ("ok", detail),
        StepOutcome::Rejected(reason) => ("rejected", reason),
    };

    let mut lines = detail.lines();
    let first = lines.next().unwrap_or_default();
    let mut text = format!("[{}] {}\n    {label}: {first}", report.index, report.step);
    for line in lines {
        text.push_str("\n        ");
        text.push_str(line);
    }
    text
}

fn summary(report: &Report) -> String {
    format!(
        "{} step(s), {} rejected, {} notification(s), {} item(s) still lent",
        report.steps.len(),
        report.rejected(),
        report.notifications,
        report.lent
    )
}
