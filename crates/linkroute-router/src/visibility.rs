//! Orthogonal route search.
//!
//! Candidate lines are the edges of every inflated obstacle, the stub points
//! of both connector ends and a frame around everything. A Dijkstra search
//! over `(node, heading)` states then minimizes length plus a penalty per
//! bend.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use kurbo::{Point, Rect};

use crate::geometry::{EPSILON, Side, compress_path, point_inside, segment_enters_rect};

/// Extra room around the obstacles so routes can go around the outermost ones.
const FRAME_MARGIN: f64 = 20.0;

/// Gap kept between a shortened stub and a neighbouring body.
const STUB_CLEARANCE: f64 = 1.0;

/// Stubs are not shortened below this length.
const MIN_STUB: f64 = 1.0;

/// One way a connector end can leave or enter its shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Exit {
    /// Point on the shape (or the free point itself).
    pub attach: Point,
    /// First point outside the buffer zone; the route may bend here.
    pub stub: Point,
    /// Side the route leaves through, `None` for free points.
    pub outward: Option<Side>,
}

impl Exit {
    pub fn free(point: Point) -> Self {
        Self {
            attach: point,
            stub: point,
            outward: None,
        }
    }

    fn stub_cost(&self) -> f64 {
        (self.stub - self.attach).hypot()
    }

    /// Pull the stub back toward the attach point until it clears every body
    /// except `own`.
    ///
    /// Used when a neighbour sits inside the buffer zone. The stub length is
    /// halved until it fits; an exit that never fits is returned unchanged.
    pub fn shortened(self, own: Option<Rect>, bodies: &[Rect]) -> Self {
        let Some(side) = self.outward else {
            return self;
        };
        let fits = |stub: Point| {
            bodies.iter().filter(|r| own != Some(**r)).all(|r| {
                !point_inside(stub, r.inflate(STUB_CLEARANCE, STUB_CLEARANCE))
                    && !segment_enters_rect(self.attach, stub, *r)
            })
        };
        let mut length = self.stub_cost();
        while length >= MIN_STUB {
            let stub = self.attach + side.normal() * length;
            if fits(stub) {
                return Self { stub, ..self };
            }
            length /= 2.0;
        }
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    cost: f64,
    state: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.state.cmp(&self.state))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sparse grid of candidate lines.
struct Grid {
    xs: Vec<f64>,
    ys: Vec<f64>,
    blocked: Vec<bool>,
}

impl Grid {
    fn build(obstacles: &[Rect], exits: &[Exit]) -> Self {
        let mut xs = Vec::with_capacity(obstacles.len() * 2 + exits.len() + 2);
        let mut ys = Vec::with_capacity(obstacles.len() * 2 + exits.len() + 2);
        let mut frame: Option<Rect> = None;
        let mut grow = |r: Rect| {
            frame = Some(match frame {
                Some(f) => f.union(r),
                None => r,
            });
        };
        for r in obstacles {
            xs.extend([r.x0, r.x1]);
            ys.extend([r.y0, r.y1]);
            grow(*r);
        }
        for e in exits {
            xs.push(e.stub.x);
            ys.push(e.stub.y);
            grow(Rect::from_points(e.stub, e.attach));
        }
        if let Some(f) = frame {
            let f = f.inflate(FRAME_MARGIN, FRAME_MARGIN);
            xs.extend([f.x0, f.x1]);
            ys.extend([f.y0, f.y1]);
        }
        dedup_sorted(&mut xs);
        dedup_sorted(&mut ys);

        let mut blocked = vec![false; xs.len() * ys.len()];
        for (iy, &y) in ys.iter().enumerate() {
            for (ix, &x) in xs.iter().enumerate() {
                let p = Point::new(x, y);
                blocked[iy * xs.len() + ix] = obstacles.iter().any(|r| point_inside(p, *r));
            }
        }
        Self { xs, ys, blocked }
    }

    fn node(&self, ix: usize, iy: usize) -> usize {
        iy * self.xs.len() + ix
    }

    fn point(&self, node: usize) -> Point {
        let cols = self.xs.len();
        Point::new(self.xs[node % cols], self.ys[node / cols])
    }

    fn locate(&self, p: Point) -> Option<usize> {
        let ix = self.xs.iter().position(|x| (x - p.x).abs() < EPSILON)?;
        let iy = self.ys.iter().position(|y| (y - p.y).abs() < EPSILON)?;
        Some(self.node(ix, iy))
    }

    fn neighbor(&self, node: usize, heading: Side) -> Option<usize> {
        let cols = self.xs.len();
        let (ix, iy) = (node % cols, node / cols);
        let (nx, ny) = match heading {
            Side::Top => (ix, iy.checked_sub(1)?),
            Side::Bottom => (ix, iy + 1),
            Side::Left => (ix.checked_sub(1)?, iy),
            Side::Right => (ix + 1, iy),
        };
        if nx >= cols || ny >= self.ys.len() {
            return None;
        }
        Some(self.node(nx, ny))
    }
}

fn dedup_sorted(values: &mut Vec<f64>) {
    values.retain(|v| v.is_finite());
    values.sort_by(f64::total_cmp);
    values.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
}

/// Find the cheapest orthogonal route from any source exit to any target exit.
///
/// Returns the full polyline from the source attach point to the target
/// attach point, or `None` when the ends are walled in.
pub(crate) fn route(
    sources: &[Exit],
    targets: &[Exit],
    obstacles: &[Rect],
    bend_penalty: f64,
) -> Option<Vec<Point>> {
    let exits: Vec<Exit> = sources.iter().chain(targets.iter()).copied().collect();
    let grid = Grid::build(obstacles, &exits);
    let states = grid.blocked.len() * 4;
    let mut best = vec![f64::INFINITY; states];
    let mut prev: Vec<Option<usize>> = vec![None; states];
    let mut origin: Vec<Option<usize>> = vec![None; states];
    let mut heap = BinaryHeap::new();

    for (i, exit) in sources.iter().enumerate() {
        let Some(node) = grid.locate(exit.stub) else {
            continue;
        };
        if grid.blocked[node] {
            continue;
        }
        let headings: Vec<Side> = match exit.outward {
            Some(side) => vec![side],
            None => Side::ALL.to_vec(),
        };
        for heading in headings {
            let state = node * 4 + heading.index();
            let cost = exit.stub_cost();
            if cost < best[state] {
                best[state] = cost;
                origin[state] = Some(i);
                heap.push(Entry { cost, state });
            }
        }
    }

    while let Some(Entry { cost, state }) = heap.pop() {
        if cost > best[state] {
            continue;
        }
        let node = state / 4;
        let heading = Side::ALL[state % 4];
        for next_heading in Side::ALL {
            if next_heading == heading.opposite() {
                continue;
            }
            let Some(next) = grid.neighbor(node, next_heading) else {
                continue;
            };
            if grid.blocked[next] {
                continue;
            }
            let (a, b) = (grid.point(node), grid.point(next));
            if obstacles.iter().any(|r| segment_enters_rect(a, b, *r)) {
                continue;
            }
            let mut next_cost = cost + (b - a).hypot();
            if next_heading != heading {
                next_cost += bend_penalty;
            }
            let next_state = next * 4 + next_heading.index();
            if next_cost + EPSILON < best[next_state] {
                best[next_state] = next_cost;
                prev[next_state] = Some(state);
                origin[next_state] = origin[state];
                heap.push(Entry {
                    cost: next_cost,
                    state: next_state,
                });
            }
        }
    }

    let mut winner: Option<(f64, usize, usize)> = None;
    for (ti, exit) in targets.iter().enumerate() {
        let Some(node) = grid.locate(exit.stub) else {
            continue;
        };
        for heading in Side::ALL {
            let state = node * 4 + heading.index();
            let Some(si) = origin[state] else {
                continue;
            };
            if sources[si].stub.distance(exit.stub) < EPSILON && sources.len() > 1 {
                continue;
            }
            let arrival = match exit.outward {
                Some(out) if heading == out.opposite() => 0.0,
                Some(_) => bend_penalty,
                None => 0.0,
            };
            let total = best[state] + arrival + exit.stub_cost();
            if winner.is_none_or(|(c, _, _)| total < c - EPSILON) {
                winner = Some((total, state, ti));
            }
        }
    }

    let (_, end_state, ti) = winner?;
    let mut nodes = vec![grid.point(end_state / 4)];
    let mut cur = end_state;
    while let Some(p) = prev[cur] {
        nodes.push(grid.point(p / 4));
        cur = p;
    }
    nodes.reverse();
    let si = origin[end_state]?;

    let mut points = Vec::with_capacity(nodes.len() + 2);
    points.push(sources[si].attach);
    points.extend(nodes);
    points.push(targets[ti].attach);
    Some(compress_path(&points))
}
