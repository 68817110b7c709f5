//! Correspondence search and filtering.

use kiddo::{KdTree, SquaredEuclidean};

use super::surface::Surface;
use crate::algorithms::matching::MatcherConfig;
use crate::core::math::angle_diff;
use crate::core::types::{Point2D, Pose2D};

/// Items sharing one coordinate beyond this overflow a k-d tree bucket.
const KD_BUCKET_SIZE: usize = 32;

/// Match between a current point and a reference segment.
#[derive(Debug, Clone, Copy)]
pub struct Correspondence {
    /// Index in the current surface
    pub cur: usize,
    /// Nearest reference point
    pub j1: usize,
    /// Adjacent reference point in the same cluster
    pub j2: Option<usize>,
    /// Unit normal of the j1-j2 segment, reference frame
    pub normal: [f64; 2],
    /// Non-negative residual (line or point distance)
    pub error: f64,
    pub weight: f64,
}

/// Nearest-neighbour lookup over the reference surface.
pub enum NeighbourSearch {
    Tree(KdTree<f64, 2>),
    Linear,
}

impl NeighbourSearch {
    /// Build a k-d tree when allowed and safe, a linear scan otherwise.
    pub fn build(reference: &Surface, use_tree: bool) -> Self {
        if !use_tree {
            return NeighbourSearch::Linear;
        }
        if has_axis_pileup(&reference.points) {
            log::debug!("Reference has too many points on one axis value, using linear search");
            return NeighbourSearch::Linear;
        }
        let mut tree: KdTree<f64, 2> = KdTree::new();
        for (i, p) in reference.points.iter().enumerate() {
            tree.add(&[p.x, p.y], i as u64);
        }
        NeighbourSearch::Tree(tree)
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, NeighbourSearch::Tree(_))
    }

    /// Nearest reference point and its squared distance.
    pub fn nearest(&self, reference: &Surface, p: &Point2D) -> Option<(usize, f64)> {
        match self {
            NeighbourSearch::Tree(tree) => {
                if reference.is_empty() {
                    return None;
                }
                let n = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y]);
                Some((n.item as usize, n.distance))
            }
            NeighbourSearch::Linear => linear_nearest(reference, p),
        }
    }
}

fn linear_nearest(reference: &Surface, p: &Point2D) -> Option<(usize, f64)> {
    reference
        .points
        .iter()
        .enumerate()
        .map(|(i, q)| (i, q.distance_squared(p)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// True when some x or y value repeats more than a k-d tree bucket holds.
fn has_axis_pileup(points: &[Point2D]) -> bool {
    let pileup = |mut values: Vec<f64>| {
        values.sort_by(f64::total_cmp);
        values
            .chunk_by(|a, b| a == b)
            .any(|run| run.len() >= KD_BUCKET_SIZE)
    };
    pileup(points.iter().map(|p| p.x).collect()) || pileup(points.iter().map(|p| p.y).collect())
}

/// Counters from one correspondence pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchStats {
    /// k-d tree answers that disagreed with the linear scan
    pub verify_mismatches: usize,
    pub rejected_visibility: usize,
    pub rejected_alpha: usize,
    pub rejected_outliers: usize,
}

/// Find correspondences for every current point at `estimate`.
///
/// `fov` is the angular span of the current scan, used by the visibility test.
#[allow(clippy::too_many_arguments)]
pub fn find_correspondences_into(
    config: &MatcherConfig,
    reference: &Surface,
    current: &Surface,
    search: &NeighbourSearch,
    estimate: &Pose2D,
    fov: (f64, f64),
    output: &mut Vec<Correspondence>,
    stats: &mut SearchStats,
) {
    output.clear();
    let max_dist_sq = config.max_correspondence_dist * config.max_correspondence_dist;
    let inverse = estimate.inverse();
    let sigma_weight = if config.use_sigma_weights && config.sigma > 0.0 {
        1.0 / (config.sigma * config.sigma)
    } else {
        1.0
    };

    for (k, p) in current.points.iter().enumerate() {
        let pw = estimate.transform_point(p);

        let Some((j1, dist_sq)) = search.nearest(reference, &pw) else {
            continue;
        };
        if config.debug_verify_tricks
            && search.is_tree()
            && let Some((_, linear_sq)) = linear_nearest(reference, &pw)
            && (linear_sq - dist_sq).abs() > 1e-12
        {
            stats.verify_mismatches += 1;
        }
        if dist_sq > max_dist_sq {
            continue;
        }

        let q1 = reference.points[j1];

        if config.do_visibility_test {
            let seen = inverse.transform_point(&q1);
            let bearing = seen.y.atan2(seen.x);
            if bearing < fov.0 || bearing > fov.1 {
                stats.rejected_visibility += 1;
                continue;
            }
        }

        if config.do_alpha_test
            && let (Some(alpha_ref), Some(alpha_cur)) = (reference.alpha[j1], current.alpha[k])
            && angle_diff(alpha_ref, alpha_cur + estimate.theta).abs() > config.alpha_test_threshold()
        {
            stats.rejected_alpha += 1;
            continue;
        }

        let j2 = [reference.neighbour(j1, false), reference.neighbour(j1, true)]
            .into_iter()
            .flatten()
            .min_by(|a, b| {
                let da = reference.points[*a].distance_squared(&pw);
                let db = reference.points[*b].distance_squared(&pw);
                da.total_cmp(&db)
            });

        let (normal, error) = if config.use_point_to_line_distance {
            let Some(j2) = j2 else {
                continue;
            };
            let q2 = reference.points[j2];
            let (dx, dy) = (q2.x - q1.x, q2.y - q1.y);
            let len = dx.hypot(dy);
            if len < 1e-12 {
                continue;
            }
            let n = [-dy / len, dx / len];
            let residual = n[0] * (pw.x - q1.x) + n[1] * (pw.y - q1.y);
            (n, residual.abs())
        } else {
            ([0.0, 0.0], dist_sq.sqrt())
        };

        let mut weight = sigma_weight;
        if config.use_ml_weights {
            weight *= incidence_weight(estimate, &pw, reference.alpha[j1]);
        }

        output.push(Correspondence {
            cur: k,
            j1,
            j2,
            normal,
            error,
            weight,
        });
    }

    if config.outliers_remove_doubles {
        remove_doubles(output);
    }
    stats.rejected_outliers += reject_outliers(config, output);
}

/// cos² of the angle between the reversed beam and the surface normal.
fn incidence_weight(estimate: &Pose2D, pw: &Point2D, alpha: Option<f64>) -> f64 {
    let Some(alpha) = alpha else {
        return 1.0;
    };
    let beam = (estimate.y - pw.y).atan2(estimate.x - pw.x);
    let c = angle_diff(alpha, beam).cos();
    (c * c).max(0.01)
}

/// Keep the lowest-error correspondence per reference point.
fn remove_doubles(output: &mut Vec<Correspondence>) {
    output.sort_by(|a, b| a.j1.cmp(&b.j1).then(a.error.total_cmp(&b.error)));
    output.dedup_by_key(|c| c.j1);
    output.sort_by_key(|c| c.cur);
}

/// Drop correspondences above the percentile and adaptive limits.
///
/// Returns the number removed.
fn reject_outliers(config: &MatcherConfig, output: &mut Vec<Correspondence>) -> usize {
    let n = output.len();
    if n == 0 {
        return 0;
    }

    let mut errors: Vec<f64> = output.iter().map(|c| c.error).collect();
    errors.sort_by(f64::total_cmp);

    let at = |fraction: f64| {
        let idx = (fraction.clamp(0.0, 1.0) * n as f64).ceil() as usize;
        errors[idx.clamp(1, n) - 1]
    };
    let perc_limit = at(config.outliers_max_perc);
    let adaptive_limit = config.outliers_adaptive_mult * at(config.outliers_adaptive_order);
    let limit = perc_limit.min(adaptive_limit);

    output.retain(|c| c.error <= limit);
    n - output.len()
}
