//! CLI command implementations

pub mod apply;
pub mod enter;
pub mod introspect;
pub mod list;
pub mod status;

use hearth_engine::manifest::Manifest;
use hearth_engine::plan::{MaterializationPlan, OverlayMaterializer};
use hearth_engine::vcs::Vcs;

use crate::common::RuntimeContext;
use crate::error::Result;

/// Plan the overlay of `vcs` onto the work tree for this host
pub(crate) fn plan_overlay(
    context: &RuntimeContext,
    vcs: &dyn Vcs,
    previous: &Manifest,
) -> Result<MaterializationPlan> {
    let classifier = context.classifier();
    let processor = context.processor()?;

    let plan = OverlayMaterializer::new(
        &context.host,
        context.layout.work_tree(),
        &classifier,
        &processor,
    )
    .with_jobs(context.config.jobs())
    .plan(vcs, previous)?;

    Ok(plan)
}
