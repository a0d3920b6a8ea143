// Grid layout domain model - Collision-free placement and vertical compaction
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Responsive screen-width tier. Each tier has its own layout and column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Lg,
    Md,
    Sm,
    Xs,
    Xxs,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 5] = [
        Breakpoint::Lg,
        Breakpoint::Md,
        Breakpoint::Sm,
        Breakpoint::Xs,
        Breakpoint::Xxs,
    ];

    pub fn columns(self) -> u32 {
        match self {
            Breakpoint::Lg => 12,
            Breakpoint::Md => 10,
            Breakpoint::Sm => 6,
            Breakpoint::Xs => 4,
            Breakpoint::Xxs => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Breakpoint::Lg => "lg",
            Breakpoint::Md => "md",
            Breakpoint::Sm => "sm",
            Breakpoint::Xs => "xs",
            Breakpoint::Xxs => "xxs",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == name)
    }
}

/// A widget's rectangle on one breakpoint, in grid units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub i: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_h: Option<u32>,
}

impl Position {
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    /// Standard AABB test: disjoint only when one rectangle lies entirely
    /// left of, right of, above or below the other.
    pub fn intersects(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        !(x.saturating_add(w) <= self.x
            || x >= self.right()
            || y.saturating_add(h) <= self.y
            || y >= self.bottom())
    }
}

/// Largest row or span a stored layout may reach.
pub const MAX_GRID_EXTENT: u32 = 10_000;

/// Top-left corner chosen for a new widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub x: u32,
    pub y: u32,
}

/// Positions per breakpoint.
pub type Layouts = IndexMap<Breakpoint, Vec<Position>>;

pub fn empty_layouts() -> Layouts {
    Breakpoint::ALL.into_iter().map(|b| (b, Vec::new())).collect()
}

pub fn can_place(layout: &[Position], x: u32, y: u32, w: u32, h: u32) -> bool {
    layout.iter().all(|p| !p.intersects(x, y, w, h))
}

pub fn max_bottom(layout: &[Position]) -> u32 {
    layout.iter().map(Position::bottom).max().unwrap_or(0)
}

/// Checks layouts that arrive from outside (imports, stored files): every
/// position has a non-zero size, stays within the grid and the row limit,
/// appears once, and overlaps nothing else on its breakpoint. A widget
/// wider than the grid may only overhang when anchored at column 0, which
/// is where placement puts it.
pub fn check_layouts(layouts: &Layouts) -> Result<(), String> {
    for (breakpoint, positions) in layouts {
        let columns = breakpoint.columns();
        for (idx, p) in positions.iter().enumerate() {
            let name = breakpoint.as_str();
            if p.w == 0 || p.h == 0 {
                return Err(format!("widget {} on {} has an empty size", p.i, name));
            }
            if p.w > MAX_GRID_EXTENT || p.bottom() > MAX_GRID_EXTENT {
                return Err(format!("widget {} on {} exceeds the grid limit", p.i, name));
            }
            if p.right() > columns && !(p.x == 0 && p.w > columns) {
                return Err(format!(
                    "widget {} on {} does not fit {} columns",
                    p.i, name, columns
                ));
            }
            for other in &positions[idx + 1..] {
                if other.i == p.i {
                    return Err(format!("widget {} appears twice on {}", p.i, name));
                }
                if other.intersects(p.x, p.y, p.w, p.h) {
                    return Err(format!("widgets {} and {} overlap on {}", p.i, other.i, name));
                }
            }
        }
    }
    Ok(())
}

/// Row-major first-fit. Falls back to appending below everything, so
/// placement never fails; gaps left by earlier widgets may stay unfilled.
pub fn find_optimal_position(layout: &[Position], columns: u32, w: u32, h: u32) -> Slot {
    let bottom = max_bottom(layout);

    if w <= columns {
        for y in 0..bottom {
            for x in 0..=columns - w {
                if can_place(layout, x, y, w, h) {
                    return Slot { x, y };
                }
            }
        }
    }

    Slot { x: 0, y: bottom }
}

/// Vertical compaction. Positions are re-inserted in `(y, x)` order, each
/// keeping its `x`, `w` and `h`, at the lowest `y` free of everything
/// re-inserted before it. The result is returned in `(y, x)` order of the
/// compacted positions, so compacting it again changes nothing.
pub fn optimize_layout(layout: &[Position]) -> Vec<Position> {
    let mut ordered: Vec<&Position> = layout.iter().collect();
    ordered.sort_by_key(|p| (p.y, p.x));

    let mut compacted: Vec<Position> = Vec::with_capacity(layout.len());
    for position in ordered {
        let mut y = 0;
        while !can_place(&compacted, position.x, y, position.w, position.h) {
            y += 1;
        }
        if y != position.y {
            tracing::debug!(widget = %position.i, from = position.y, to = y, "compacted widget");
        }
        compacted.push(Position {
            y,
            ..position.clone()
        });
    }

    compacted.sort_by_key(|p| (p.y, p.x));
    compacted
}
