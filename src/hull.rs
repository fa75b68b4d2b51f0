//! Convex hulls of labelled lattice points, for the interval search.
//!
//! Points are `(negatives, positives)` count pairs. Each carries the numeric label of the split
//! point it stands for, so that a vertex of a Minkowski difference can be turned back into the
//! interval between two split points.

/// A point with the split point it represents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HullPoint {
    /// Negative count.
    pub x: i64,
    /// Positive count.
    pub y: i64,
    /// The split point.
    pub label: f32,
}

/// A vertex of the Minkowski difference `right - left` of two hulls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HullDifference {
    /// Negatives between the two split points.
    pub x: i64,
    /// Positives between the two split points.
    pub y: i64,
    /// Label of the vertex taken from the left hull.
    pub lower: f32,
    /// Label of the vertex taken from the right hull.
    pub upper: f32,
}

/// A convex polygon with counter-clockwise vertices and no collinear vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvexHull {
    vertices: Vec<HullPoint>,
}

fn cross(o: (i64, i64), a: (i64, i64), b: (i64, i64)) -> i64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

fn edge_cross(a: (i64, i64), b: (i64, i64)) -> i64 {
    a.0 * b.1 - a.1 * b.0
}

/// Rotates a polygon so that it starts at its lowest, then leftmost, vertex.
fn start_at_bottom<T: Copy>(vertices: &mut [T], position: impl Fn(&T) -> (i64, i64)) {
    let start = vertices
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| {
            let (x, y) = position(v);
            (y, x)
        })
        .map_or(0, |(i, _)| i);
    vertices.rotate_left(start);
}

impl ConvexHull {
    /// The hull of a single point.
    pub fn point(x: i64, y: i64, label: f32) -> Self {
        ConvexHull {
            vertices: vec![HullPoint { x, y, label }],
        }
    }

    /// The hull of a set of points, by Andrew's monotone chain.
    pub fn from_points(mut points: Vec<HullPoint>) -> Self {
        points.sort_by(|a, b| (a.x, a.y).cmp(&(b.x, b.y)));
        points.dedup_by(|a, b| a.x == b.x && a.y == b.y);
        if points.len() <= 2 {
            return ConvexHull { vertices: points };
        }

        let pos = |p: &HullPoint| (p.x, p.y);
        let mut lower: Vec<HullPoint> = Vec::with_capacity(points.len());
        for &p in &points {
            while lower.len() >= 2
                && cross(pos(&lower[lower.len() - 2]), pos(&lower[lower.len() - 1]), pos(&p)) <= 0
            {
                lower.pop();
            }
            lower.push(p);
        }
        let mut upper: Vec<HullPoint> = Vec::with_capacity(points.len());
        for &p in points.iter().rev() {
            while upper.len() >= 2
                && cross(pos(&upper[upper.len() - 2]), pos(&upper[upper.len() - 1]), pos(&p)) <= 0
            {
                upper.pop();
            }
            upper.push(p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);
        ConvexHull { vertices: lower }
    }

    /// The vertices in counter-clockwise order.
    pub fn vertices(&self) -> &[HullPoint] {
        &self.vertices
    }

    /// The hull of the union of two hulls.
    pub fn concatenate(&self, other: &ConvexHull) -> ConvexHull {
        let mut points = Vec::with_capacity(self.vertices.len() + other.vertices.len());
        points.extend_from_slice(&self.vertices);
        points.extend_from_slice(&other.vertices);
        ConvexHull::from_points(points)
    }

    /// The vertices of `{r - l}` over every point `l` of `self` and `r` of `right`.
    ///
    /// This is the Minkowski sum of `right` with `self` reflected through the origin, merged edge
    /// by edge in angular order.
    pub fn minkowski_difference(&self, right: &ConvexHull) -> Vec<HullDifference> {
        if self.vertices.is_empty() || right.vertices.is_empty() {
            return Vec::new();
        }
        let mut left: Vec<HullPoint> = self
            .vertices
            .iter()
            .map(|v| HullPoint {
                x: -v.x,
                y: -v.y,
                label: v.label,
            })
            .collect();
        let mut right: Vec<HullPoint> = right.vertices.clone();
        start_at_bottom(&mut left, |v| (v.x, v.y));
        start_at_bottom(&mut right, |v| (v.x, v.y));

        let (n, m) = (left.len(), right.len());
        left.push(left[0]);
        left.push(left[1]);
        right.push(right[0]);
        right.push(right[1]);

        let mut result = Vec::with_capacity(n + m);
        let (mut i, mut j) = (0, 0);
        while i < n || j < m {
            result.push(HullDifference {
                x: left[i].x + right[j].x,
                y: left[i].y + right[j].y,
                lower: left[i].label,
                upper: right[j].label,
            });
            let a = (left[i + 1].x - left[i].x, left[i + 1].y - left[i].y);
            let b = (right[j + 1].x - right[j].x, right[j + 1].y - right[j].y);
            let turn = edge_cross(a, b);
            if turn >= 0 && i < n {
                i += 1;
            }
            if turn <= 0 && j < m {
                j += 1;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i64, y: i64) -> HullPoint {
        HullPoint {
            x,
            y,
            label: (x * 100 + y) as f32,
        }
    }

    fn coords(v: &[HullPoint]) -> Vec<(i64, i64)> {
        v.iter().map(|p| (p.x, p.y)).collect()
    }

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let hull = ConvexHull::from_points(vec![p(0, 0), p(2, 0), p(1, 0), p(1, 1), p(2, 2), p(0, 2)]);
        assert_eq!(coords(hull.vertices()), [(0, 0), (2, 0), (2, 2), (0, 2)]);
    }

    #[test]
    fn difference_of_points_and_segments() {
        let a = ConvexHull::point(1, 2, 1.0);
        let b = ConvexHull::point(4, 7, 2.0);
        let d = a.minkowski_difference(&b);
        assert_eq!(d, [HullDifference { x: 3, y: 5, lower: 1.0, upper: 2.0 }]);

        let left = ConvexHull::from_points(vec![p(0, 0), p(2, 0)]);
        let right = ConvexHull::from_points(vec![p(5, 5), p(5, 8)]);
        let mut d: Vec<(i64, i64)> = left
            .minkowski_difference(&right)
            .iter()
            .map(|v| (v.x, v.y))
            .collect();
        d.sort_unstable();
        assert_eq!(d, [(3, 5), (3, 8), (5, 5), (5, 8)]);
    }

    #[test]
    fn difference_matches_brute_force_hull() {
        let left = vec![p(0, 0), p(3, 1), p(4, 4), p(1, 5), p(2, 2)];
        let right = vec![p(10, 10), p(14, 11), p(12, 15), p(9, 13)];
        let hull_l = ConvexHull::from_points(left.clone());
        let hull_r = ConvexHull::from_points(right.clone());

        let mut all = Vec::new();
        for l in &left {
            for r in &right {
                all.push(HullPoint {
                    x: r.x - l.x,
                    y: r.y - l.y,
                    label: 0.0,
                });
            }
        }
        let mut expected = coords(ConvexHull::from_points(all).vertices());
        expected.sort_unstable();

        let mut got: Vec<(i64, i64)> = hull_l
            .minkowski_difference(&hull_r)
            .iter()
            .map(|v| (v.x, v.y))
            .collect();
        got.sort_unstable();
        got.dedup();
        assert_eq!(got, expected);
    }
}
