//! Match fields of a request to the windows it acts on

use textcast_core::{CoreError, SendTextRequest};

use crate::registry::{TargetId, TargetRegistry};

/// Resolve the targets of one request, in registry order without duplicates
///
/// `all` wins over match expressions, a tab match wins over a window match,
/// and with neither the active window is used. `exclude_active` applies to
/// every branch.
pub fn resolve_targets<R>(reg: &R, req: &SendTextRequest) -> Result<Vec<TargetId>, CoreError>
where
    R: TargetRegistry + ?Sized,
{
    let mut targets = if req.all {
        reg.all_targets()
    } else if let Some(spec) = req.match_tab.as_deref() {
        let tabs = reg.match_tabs(spec);
        if tabs.is_empty() {
            return Err(CoreError::no_tabs(spec));
        }
        tabs.into_iter().flat_map(|tab| reg.tab_members(tab)).collect()
    } else if let Some(spec) = req.match_spec.as_deref() {
        reg.match_windows(spec)
    } else {
        reg.active_target().into_iter().collect()
    };

    let mut seen = std::collections::HashSet::new();
    targets.retain(|id| seen.insert(*id));

    if req.exclude_active {
        if let Some(active) = reg.active_target() {
            targets.retain(|id| *id != active);
        }
    }
    Ok(targets)
}
