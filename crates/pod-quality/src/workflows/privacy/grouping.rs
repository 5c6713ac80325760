//! Clustering of overlapping detection windows into face boxes.

use super::detector::DetectedFace;

/// Relative tolerance under which two windows count as the same face.
pub const GROUPING_EPS: f64 = 0.2;

/// Merges similar candidate windows and keeps clusters with more than
/// `min_neighbors` members, dropping clusters nested inside stronger ones.
///
/// Output follows the order in which clusters first appear in `candidates`.
pub fn group_rectangles(
    candidates: &[DetectedFace],
    min_neighbors: u32,
    eps: f64,
) -> Vec<DetectedFace> {
    if candidates.is_empty() {
        return Vec::new();
    }
    if min_neighbors == 0 {
        return candidates.to_vec();
    }

    let labels = partition(candidates, eps);
    let cluster_count = labels.iter().copied().max().map_or(0, |max| max + 1);

    let mut sums = vec![[0.0_f64; 4]; cluster_count];
    let mut counts = vec![0u32; cluster_count];
    for (face, &label) in candidates.iter().zip(&labels) {
        let sum = &mut sums[label];
        sum[0] += f64::from(face.x);
        sum[1] += f64::from(face.y);
        sum[2] += f64::from(face.width);
        sum[3] += f64::from(face.height);
        counts[label] += 1;
    }

    let averaged: Vec<Rect> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| {
            let scale = 1.0 / f64::from(count);
            Rect {
                x: (sum[0] * scale).round() as i64,
                y: (sum[1] * scale).round() as i64,
                width: (sum[2] * scale).round() as i64,
                height: (sum[3] * scale).round() as i64,
            }
        })
        .collect();

    let mut faces = Vec::new();
    for (i, inner) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }

        let nested = averaged.iter().enumerate().any(|(j, outer)| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (outer.width as f64 * eps).round() as i64;
            let dy = (outer.height as f64 * eps).round() as i64;
            inner.x >= outer.x - dx
                && inner.y >= outer.y - dy
                && inner.x + inner.width <= outer.x + outer.width + dx
                && inner.y + inner.height <= outer.y + outer.height + dy
                && (n2 > n1.max(3) || n1 < 3)
        });

        if !nested {
            faces.push(DetectedFace {
                x: inner.x.max(0) as u32,
                y: inner.y.max(0) as u32,
                width: inner.width.max(0) as u32,
                height: inner.height.max(0) as u32,
            });
        }
    }
    faces
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: i64,
    y: i64,
    width: i64,
    height: i64,
}

fn similar(a: &DetectedFace, b: &DetectedFace, eps: f64) -> bool {
    let delta = eps * (f64::from(a.width.min(b.width)) + f64::from(a.height.min(b.height))) * 0.5;
    let (ax, ay, aw, ah) = (f64::from(a.x), f64::from(a.y), f64::from(a.width), f64::from(a.height));
    let (bx, by, bw, bh) = (f64::from(b.x), f64::from(b.y), f64::from(b.width), f64::from(b.height));
    (ax - bx).abs() <= delta
        && (ay - by).abs() <= delta
        && (ax + aw - bx - bw).abs() <= delta
        && (ay + ah - by - bh).abs() <= delta
}

/// Union-find over the similarity relation; labels are dense and numbered
/// by first appearance.
fn partition(candidates: &[DetectedFace], eps: f64) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..candidates.len()).collect();

    fn root(parent: &mut [usize], mut node: usize) -> usize {
        while parent[node] != node {
            parent[node] = parent[parent[node]];
            node = parent[node];
        }
        node
    }

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            if similar(&candidates[i], &candidates[j], eps) {
                let (ri, rj) = (root(&mut parent, i), root(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut labels = vec![usize::MAX; candidates.len()];
    let mut root_labels = vec![usize::MAX; candidates.len()];
    let mut next = 0;
    for (index, label) in labels.iter_mut().enumerate() {
        let r = root(&mut parent, index);
        if root_labels[r] == usize::MAX {
            root_labels[r] = next;
            next += 1;
        }
        *label = root_labels[r];
    }
    labels
}
