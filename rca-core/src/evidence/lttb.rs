//! Largest-Triangle-Three-Buckets downsampling for time-series evidence.
//!
//! Keeps a time series visually representative at a fixed point budget
//! without dragging a multi-thousand-sample series into `raw_output`
//! verbatim. The first and last points are always preserved.

/// Downsample `points` to at most `threshold` points via LTTB. A series no
/// longer than `threshold` is returned unchanged.
pub fn downsample(points: &[(i64, f64)], threshold: usize) -> Vec<(i64, f64)> {
    if threshold == 0 || points.len() <= threshold {
        return points.to_vec();
    }
    if threshold < 3 {
        return vec![points[0], points[points.len() - 1]];
    }

    let mut sampled = Vec::with_capacity(threshold);
    sampled.push(points[0]);

    // Bucket size for the body between the fixed first and last points.
    let bucket_size = (points.len() - 2) as f64 / (threshold - 2) as f64;
    let mut a = 0usize;

    for i in 0..(threshold - 2) {
        let bucket_start = (i as f64 * bucket_size) as usize + 1;
        let bucket_end = ((i + 1) as f64 * bucket_size) as usize + 1;
        let bucket_end = bucket_end.min(points.len() - 1);

        let next_bucket_start = bucket_end;
        let next_bucket_end = (((i + 2) as f64 * bucket_size) as usize + 1).min(points.len());
        let avg_range = &points[next_bucket_start..next_bucket_end.max(next_bucket_start + 1).min(points.len())];
        let (avg_x, avg_y) = average_point(avg_range, points[points.len() - 1]);

        let point_a = points[a];
        let mut best_area = -1.0f64;
        let mut best_index = bucket_start.min(points.len() - 1);

        for (offset, candidate) in points[bucket_start..bucket_end.max(bucket_start + 1).min(points.len())]
            .iter()
            .enumerate()
        {
            let area = triangle_area(point_a, *candidate, (avg_x, avg_y));
            if area > best_area {
                best_area = area;
                best_index = bucket_start + offset;
            }
        }

        sampled.push(points[best_index]);
        a = best_index;
    }

    sampled.push(points[points.len() - 1]);
    sampled
}

fn average_point(range: &[(i64, f64)], fallback: (i64, f64)) -> (f64, f64) {
    if range.is_empty() {
        return (fallback.0 as f64, fallback.1);
    }
    let (sum_x, sum_y) = range
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + *x as f64, sy + *y));
    (sum_x / range.len() as f64, sum_y / range.len() as f64)
}

fn triangle_area(a: (i64, f64), b: (i64, f64), c: (f64, f64)) -> f64 {
    let (ax, ay) = (a.0 as f64, a.1);
    let (bx, by) = (b.0 as f64, b.1);
    let (cx, cy) = c;
    ((ax - cx) * (by - ay) - (ax - bx) * (cy - ay)).abs() * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> Vec<(i64, f64)> {
        (0..n as i64).map(|i| (i, (i as f64).sin())).collect()
    }

    #[test]
    fn short_series_is_untouched() {
        let points = series(100);
        let out = downsample(&points, 150);
        assert_eq!(out, points);
    }

    #[test]
    fn long_series_downsamples_to_threshold() {
        let points = series(10_000);
        let out = downsample(&points, 150);
        assert!(out.len() <= 150);
        assert_eq!(out.first(), points.first());
        assert_eq!(out.last(), points.last());
    }

    #[test]
    fn exactly_at_threshold_is_untouched() {
        let points = series(150);
        let out = downsample(&points, 150);
        assert_eq!(out, points);
    }
}
