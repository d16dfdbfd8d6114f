//! ---
//! cpe_section: "01-core-functionality"
//! cpe_subsection: "module"
//! cpe_type: "source"
//! cpe_scope: "code"
//! cpe_description: "Scheduling directive returned by reconcilers."
//! cpe_version: "v0.0.0-prealpha"
//! cpe_owner: "tbd"
//! ---
use std::time::Duration;

/// Signal handed back to the scheduling substrate after a convergence pass.
///
/// The substrate owns the work queue; a reconciler never sleeps or polls
/// internally and instead asks to be invoked again through this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Actual state matches desired state; nothing left to do.
    Done,
    /// A mutation was issued this pass; re-invoke as soon as possible so the
    /// next tier is evaluated against fresh state.
    RequeueNow,
    /// Re-invoke after the given delay, e.g. while a patched field propagates
    /// or a delegated job is still running.
    RequeueAfter(Duration),
}

impl Directive {
    /// True when the pass finished with no further scheduling requested.
    pub fn is_done(&self) -> bool {
        matches!(self, Directive::Done)
    }
}
