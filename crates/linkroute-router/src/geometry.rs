//! Geometry helpers shared by the search and the nudging pass.

use kurbo::{Point, Rect, Vec2};

/// Tolerance used for coordinate comparisons.
pub(crate) const EPSILON: f64 = 1e-6;

/// A side of a rectangle, also used as a heading for orthogonal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    /// All sides in clockwise order starting at the top.
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    /// Outward unit normal of this side.
    pub fn normal(self) -> Vec2 {
        match self {
            Side::Top => Vec2::new(0.0, -1.0),
            Side::Right => Vec2::new(1.0, 0.0),
            Side::Bottom => Vec2::new(0.0, 1.0),
            Side::Left => Vec2::new(-1.0, 0.0),
        }
    }

    /// The side facing the other way.
    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }

    /// Midpoint of this side of `rect`.
    pub fn midpoint(self, rect: Rect) -> Point {
        let center = rect.center();
        match self {
            Side::Top => Point::new(center.x, rect.y0),
            Side::Right => Point::new(rect.x1, center.y),
            Side::Bottom => Point::new(center.x, rect.y1),
            Side::Left => Point::new(rect.x0, center.y),
        }
    }

    /// Index used by the search state tables.
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Heading of an axis-aligned move from `a` to `b`.
    pub(crate) fn heading(a: Point, b: Point) -> Option<Side> {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            None
        } else if dx.abs() >= dy.abs() {
            Some(if dx > 0.0 { Side::Right } else { Side::Left })
        } else {
            Some(if dy > 0.0 { Side::Bottom } else { Side::Top })
        }
    }
}

/// Check that a rectangle is usable as an obstacle: finite with positive area.
pub fn is_valid_rect(rect: Rect) -> bool {
    [rect.x0, rect.y0, rect.x1, rect.y1]
        .iter()
        .all(|v| v.is_finite())
        && rect.width() > 0.0
        && rect.height() > 0.0
}

/// Whether the segment `a`-`b` passes through the open interior of `rect`.
///
/// Running along the boundary does not count. Exact for axis-aligned
/// segments; diagonal segments are tested by their bounding box.
pub fn segment_enters_rect(a: Point, b: Point, rect: Rect) -> bool {
    let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
    let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
    x1 > rect.x0 + EPSILON
        && x0 < rect.x1 - EPSILON
        && y1 > rect.y0 + EPSILON
        && y0 < rect.y1 - EPSILON
}

/// Whether any segment of the polyline passes through the interior of `rect`.
pub fn path_enters_rect(points: &[Point], rect: Rect) -> bool {
    points
        .windows(2)
        .any(|w| segment_enters_rect(w[0], w[1], rect))
}

/// Whether any segment of the polyline touches the closed rectangle.
pub(crate) fn path_touches_rect(points: &[Point], rect: Rect) -> bool {
    let grown = rect.inflate(EPSILON, EPSILON);
    points.windows(2).any(|w| {
        let (x0, x1) = (w[0].x.min(w[1].x), w[0].x.max(w[1].x));
        let (y0, y1) = (w[0].y.min(w[1].y), w[0].y.max(w[1].y));
        x1 >= grown.x0 && x0 <= grown.x1 && y1 >= grown.y0 && y0 <= grown.y1
    })
}

/// Whether a point lies strictly inside `rect`.
pub(crate) fn point_inside(point: Point, rect: Rect) -> bool {
    point.x > rect.x0 + EPSILON
        && point.x < rect.x1 - EPSILON
        && point.y > rect.y0 + EPSILON
        && point.y < rect.y1 - EPSILON
}

/// Drop repeated points and interior points of straight runs.
pub(crate) fn compress_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if let Some(last) = out.last() {
            if (last.x - p.x).abs() < EPSILON && (last.y - p.y).abs() < EPSILON {
                continue;
            }
        }
        if out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let collinear_x = (a.x - b.x).abs() < EPSILON && (b.x - p.x).abs() < EPSILON;
            let collinear_y = (a.y - b.y).abs() < EPSILON && (b.y - p.y).abs() < EPSILON;
            if collinear_x || collinear_y {
                out.pop();
            }
        }
        out.push(p);
    }
    out
}
