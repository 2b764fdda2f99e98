//! Connected-component clustering of a diff mask

use figdiff_common::{BoundingBox, DiffMask};

/// One 8-connected cluster of differing pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub bounds: BoundingBox,
    pub pixel_count: u64,
}

/// Flood-fill `mask` into clusters, in row-major order of their first pixel
pub fn cluster(mask: &DiffMask) -> Vec<Cluster> {
    let (width, height) = (mask.width(), mask.height());
    let mut visited = vec![false; width as usize * height as usize];
    let mut clusters = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * width as usize + x as usize;
            if visited[idx] || !mask.get(x, y) {
                continue;
            }

            visited[idx] = true;
            stack.push((x, y));
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
            let mut pixel_count = 0u64;

            while let Some((cx, cy)) = stack.pop() {
                pixel_count += 1;
                min_x = min_x.min(cx);
                min_y = min_y.min(cy);
                max_x = max_x.max(cx);
                max_y = max_y.max(cy);

                for ny in cy.saturating_sub(1)..=(cy + 1).min(height - 1) {
                    for nx in cx.saturating_sub(1)..=(cx + 1).min(width - 1) {
                        let nidx = ny as usize * width as usize + nx as usize;
                        if !visited[nidx] && mask.get(nx, ny) {
                            visited[nidx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }

            clusters.push(Cluster {
                bounds: BoundingBox {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                },
                pixel_count,
            });
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with(width: u32, height: u32, points: &[(u32, u32)]) -> DiffMask {
        let mut mask = DiffMask::new(width, height);
        for &(x, y) in points {
            mask.set(x, y);
        }
        mask
    }

    #[test]
    fn test_empty_mask_has_no_clusters() {
        assert!(cluster(&DiffMask::new(50, 50)).is_empty());
        assert!(cluster(&DiffMask::new(0, 0)).is_empty());
    }

    #[test]
    fn test_square_is_one_cluster() {
        let points: Vec<_> = (20..30).flat_map(|y| (40..50).map(move |x| (x, y))).collect();
        let clusters = cluster(&mask_with(100, 100, &points));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].pixel_count, 100);
        assert_eq!(clusters[0].bounds, BoundingBox { x: 40, y: 20, width: 10, height: 10 });
    }

    #[test]
    fn test_diagonal_neighbors_connect() {
        let clusters = cluster(&mask_with(5, 5, &[(0, 0), (1, 1), (2, 2)]));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].pixel_count, 3);
    }

    #[test]
    fn test_separate_clusters_in_scan_order() {
        let clusters = cluster(&mask_with(10, 10, &[(8, 0), (0, 5), (1, 5), (9, 9)]));
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].bounds.x, 8);
        assert_eq!(clusters[1].pixel_count, 2);
        assert_eq!(clusters[2].bounds, BoundingBox { x: 9, y: 9, width: 1, height: 1 });
    }
}
