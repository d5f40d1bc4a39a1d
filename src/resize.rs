use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::schema::ColumnSpec;

/// Current width and floor of every column of one column list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnWidths {
    widths: HashMap<String, u16>,
    minimums: HashMap<String, u16>,
}

impl ColumnWidths {
    /// Seeds widths from the declared ones. A declared width below its
    /// minimum is raised to the minimum.
    pub fn from_columns(columns: &[ColumnSpec]) -> Self {
        let mut widths = HashMap::with_capacity(columns.len());
        let mut minimums = HashMap::with_capacity(columns.len());
        for column in columns {
            widths.insert(column.id().to_string(), column.width.max(column.min_width));
            minimums.insert(column.id().to_string(), column.min_width);
        }
        Self { widths, minimums }
    }

    pub fn get(&self, id: &str) -> Option<u16> {
        self.widths.get(id).copied()
    }

    pub fn min_width(&self, id: &str) -> Option<u16> {
        self.minimums.get(id).copied()
    }

    fn bounds(&self, id: &str) -> Option<(u16, u16)> {
        Some((self.get(id)?, self.min_width(id)?))
    }

    fn set(&mut self, id: &str, width: u16) {
        if let Some(slot) = self.widths.get_mut(id) {
            *slot = width;
        }
    }
}

/// Limits `delta` so that neither side of the pair drops below its floor.
/// The result applies to both sides, so the pair's total never changes.
pub fn clamp_delta(left_start: u16, right_start: u16, left_min: u16, right_min: u16, delta: i32) -> i32 {
    let lowest = i32::from(left_min) - i32::from(left_start);
    let highest = i32::from(right_start) - i32::from(right_min);
    if lowest > highest {
        // Both floors can not be met at once; leave the pair as it is.
        return 0;
    }
    delta.clamp(lowest, highest)
}

/// Redistributes width inside a pair. Returns the new (left, right) widths.
pub fn redistribute(left_start: u16, right_start: u16, left_min: u16, right_min: u16, delta: i32) -> (u16, u16) {
    let delta = clamp_delta(left_start, right_start, left_min, right_min, delta);
    let left = i32::from(left_start) + delta;
    let right = i32::from(right_start) - delta;
    // Both stay inside [min, left_start + right_start] thanks to the clamp.
    (
        u16::try_from(left).unwrap_or(left_start),
        u16::try_from(right).unwrap_or(right_start),
    )
}

/// Global pointer listener registration.
///
/// Whoever holds a [`CaptureGuard`] receives every pointer move regardless
/// of where it happens. Dropping the guard releases the capture.
#[derive(Debug, Clone, Default)]
pub struct PointerCapture {
    holders: Rc<Cell<usize>>,
}

impl PointerCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> CaptureGuard {
        self.holders.set(self.holders.get() + 1);
        trace!("Pointer capture acquired ({} holders)", self.holders.get());
        CaptureGuard {
            holders: Rc::clone(&self.holders),
        }
    }

    pub fn is_held(&self) -> bool {
        self.holders.get() > 0
    }
}

#[derive(Debug)]
pub struct CaptureGuard {
    holders: Rc<Cell<usize>>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.holders.set(self.holders.get().saturating_sub(1));
        trace!("Pointer capture released ({} holders)", self.holders.get());
    }
}

#[derive(Debug)]
struct Drag {
    left: String,
    right: String,
    start_x: i32,
    left_start: u16,
    right_start: u16,
    left_min: u16,
    right_min: u16,
    _capture: CaptureGuard,
}

#[derive(Debug, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging(Drag),
}

/// Column width state plus the Idle/Dragging gesture machine.
#[derive(Debug)]
pub struct ResizeEngine {
    widths: ColumnWidths,
    state: DragState,
    capture: PointerCapture,
}

impl ResizeEngine {
    pub fn new(widths: ColumnWidths, capture: PointerCapture) -> Self {
        Self {
            widths,
            state: DragState::Idle,
            capture,
        }
    }

    pub fn width(&self, id: &str) -> Option<u16> {
        self.widths.get(id)
    }

    /// Starts a gesture on the border between `left` and `right`.
    /// Unknown columns are ignored. A gesture already running is finished
    /// first.
    pub fn begin_drag(&mut self, left: &str, right: &str, x: i32) -> bool {
        let (Some((left_start, left_min)), Some((right_start, right_min))) =
            (self.widths.bounds(left), self.widths.bounds(right))
        else {
            trace!("Ignoring resize between unknown columns {left:?} / {right:?}");
            return false;
        };
        self.end_drag();

        trace!("Begin resize {left}|{right} at x={x} ({left_start}/{right_start})");
        self.state = DragState::Dragging(Drag {
            left: left.to_string(),
            right: right.to_string(),
            start_x: x,
            left_start,
            right_start,
            left_min,
            right_min,
            _capture: self.capture.acquire(),
        });
        true
    }

    /// Pointer moved to `x`. Returns the new widths of the pair, or `None`
    /// when no gesture is running.
    pub fn drag_to(&mut self, x: i32) -> Option<(u16, u16)> {
        let DragState::Dragging(drag) = &self.state else {
            return None;
        };
        let (left, right) = redistribute(
            drag.left_start,
            drag.right_start,
            drag.left_min,
            drag.right_min,
            x - drag.start_x,
        );
        let (left_id, right_id) = (drag.left.clone(), drag.right.clone());
        self.widths.set(&left_id, left);
        self.widths.set(&right_id, right);
        Some((left, right))
    }

    /// Finishes the gesture, keeping the last widths.
    pub fn end_drag(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            DragState::Idle => false,
            DragState::Dragging(drag) => {
                trace!("End resize {}|{}", drag.left, drag.right);
                true
            }
        }
    }

    /// One-shot resize of a pair, as used by keyboard shortcuts.
    pub fn nudge(&mut self, left: &str, right: &str, delta: i32) -> Option<(u16, u16)> {
        let (left_start, left_min) = self.widths.bounds(left)?;
        let (right_start, right_min) = self.widths.bounds(right)?;
        let (l, r) = redistribute(left_start, right_start, left_min, right_min, delta);
        self.widths.set(left, l);
        self.widths.set(right, r);
        Some((l, r))
    }
}
