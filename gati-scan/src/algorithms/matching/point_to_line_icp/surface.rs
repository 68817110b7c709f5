//! Cartesian view of a point set with clusters and surface orientation.

use super::line2d::Line2D;
use crate::core::types::{NormalizedPointSet, Point2D};

/// Valid readings of a point set in Cartesian form.
///
/// Index `k` here refers to the k-th valid reading, `reading[k]` maps it back
/// into the point set.
#[derive(Debug, Default)]
pub struct Surface {
    pub points: Vec<Point2D>,
    pub reading: Vec<usize>,
    pub cluster: Vec<u32>,
    /// Normal direction facing the sensor, when it could be estimated
    pub alpha: Vec<Option<f64>>,
}

impl Surface {
    /// Extract valid readings and tag clusters on `set`.
    ///
    /// Consecutive valid readings closer than `clustering_threshold` share a
    /// cluster. Orientation is fitted over up to `neighbourhood` same-cluster
    /// neighbours on each side.
    pub fn build(set: &mut NormalizedPointSet, clustering_threshold: f64, neighbourhood: usize) -> Self {
        let mut surface = Self::default();
        let threshold_sq = clustering_threshold * clustering_threshold;
        let mut cluster = 0u32;

        for (i, reading) in set.readings.iter_mut().enumerate() {
            if !reading.valid {
                continue;
            }
            let p = reading.point();
            if let Some(prev) = surface.points.last()
                && prev.distance_squared(&p) > threshold_sq
            {
                cluster += 1;
            }
            reading.cluster = Some(cluster);
            surface.points.push(p);
            surface.reading.push(i);
            surface.cluster.push(cluster);
        }

        surface.alpha = (0..surface.points.len())
            .map(|k| surface.orientation_at(k, neighbourhood))
            .collect();
        surface
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Adjacent valid reading in the same cluster, if any.
    #[inline]
    pub fn neighbour(&self, k: usize, forward: bool) -> Option<usize> {
        let j = if forward { k.checked_add(1)? } else { k.checked_sub(1)? };
        (j < self.len() && self.cluster[j] == self.cluster[k]).then_some(j)
    }

    fn orientation_at(&self, k: usize, neighbourhood: usize) -> Option<f64> {
        let c = self.cluster[k];
        let lo = k.saturating_sub(neighbourhood);
        let hi = (k + neighbourhood).min(self.len() - 1);

        let mut start = k;
        while start > lo && self.cluster[start - 1] == c {
            start -= 1;
        }
        let mut end = k;
        while end < hi && self.cluster[end + 1] == c {
            end += 1;
        }
        if end - start < 2 {
            return None;
        }
        Line2D::fit(&self.points[start..=end]).map(|line| line.normal_towards_origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wall_with_gap() -> NormalizedPointSet {
        // Two walls at distance 2 m separated by an invalid reading and a jump
        let mut set = NormalizedPointSet::default();
        for i in 0..10 {
            let angle = -0.2 + 0.02 * i as f64;
            set.push(angle, 2.0 / angle.cos(), true);
        }
        set.push(0.0, 0.0, false);
        for i in 0..10 {
            let angle = 0.5 + 0.02 * i as f64;
            set.push(angle, 4.0 / angle.cos(), true);
        }
        set.update_span();
        set
    }

    #[test]
    fn test_clusters_split_on_jump() {
        let mut set = wall_with_gap();
        let surface = Surface::build(&mut set, 0.25, 5);

        assert_eq!(surface.len(), 20);
        assert_eq!(surface.cluster[0], surface.cluster[9]);
        assert_ne!(surface.cluster[9], surface.cluster[10]);
        assert_eq!(set.readings[10].cluster, None);
        assert_eq!(surface.reading[10], 11);
    }

    #[test]
    fn test_neighbour_stays_in_cluster() {
        let mut set = wall_with_gap();
        let surface = Surface::build(&mut set, 0.25, 5);
        assert_eq!(surface.neighbour(9, true), None);
        assert_eq!(surface.neighbour(9, false), Some(8));
        assert_eq!(surface.neighbour(0, false), None);
    }

    #[test]
    fn test_orientation_faces_sensor() {
        let mut set = wall_with_gap();
        let surface = Surface::build(&mut set, 0.25, 5);
        // Wall x = 2 seen from the origin faces -x
        let alpha = surface.alpha[4].unwrap();
        assert_relative_eq!(alpha.cos(), -1.0, epsilon = 1e-9);
    }
}
