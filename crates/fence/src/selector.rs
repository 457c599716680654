//! Primary boundary selection.
//!
//! Pure domain logic - no I/O.

use crate::event::{BackendBoundary, BoundaryKind};
use waypost_geo::{CircleFence, GeometryError};

/// Selection order. Fixed: the start line always wins.
pub const BOUNDARY_PRIORITY: [BoundaryKind; 3] = [
    BoundaryKind::Start,
    BoundaryKind::Checkpoint,
    BoundaryKind::Finish,
];

/// Pick the boundary that drives monitoring.
///
/// Priority:
/// 1. Start
/// 2. Checkpoint
/// 3. Finish
///
/// Within a kind the first one in list order wins. Returns `Ok(None)` when
/// no boundary qualifies, and an error when the winner is malformed.
pub fn select_primary(
    boundaries: &[BackendBoundary],
) -> Result<Option<CircleFence>, GeometryError> {
    let winner = BOUNDARY_PRIORITY
        .iter()
        .find_map(|kind| boundaries.iter().find(|b| b.kind == *kind));

    let Some(boundary) = winner else {
        return Ok(None);
    };

    let circle = boundary.to_circle();
    circle.validate()?;
    Ok(Some(circle))
}
