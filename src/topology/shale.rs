//! Dimensional decomposition: one round robin per axis line of a node cube.

use crate::error::{Result, ScheduleError};
use crate::types::{Circuit, NodeId, PortId};

use super::round_robin::round_robin_over;

/// Shale schedule for `nb_node = root^dimensions` nodes.
///
/// Node ids are laid out row-major in a `root^dimensions` cube. Along axis
/// `k`, every line of `root` nodes runs its own round robin on port `k`, so
/// each node uses one port per dimension.
pub fn shale(nb_node: usize, dimensions: usize) -> Result<Vec<Circuit>> {
    if dimensions == 0 {
        return Err(ScheduleError::invalid("shale needs at least one dimension"));
    }
    let root = integer_root(nb_node, dimensions).ok_or_else(|| {
        ScheduleError::invalid(format!(
            "node count {} is not a perfect power of {}",
            nb_node, dimensions
        ))
    })?;

    // stride[k] = root^(dimensions - 1 - k)
    let strides: Vec<usize> = (0..dimensions)
        .map(|k| root.pow((dimensions - 1 - k) as u32))
        .collect();

    let mut circuits = Vec::new();
    for axis in 0..dimensions {
        for base in 0..root.pow(dimensions as u32 - 1) {
            // Digits of `base` fill every axis except `axis`, most significant first.
            let mut digits = Vec::with_capacity(dimensions - 1);
            let mut rest = base;
            for _ in 0..dimensions - 1 {
                digits.push(rest % root);
                rest /= root;
            }
            digits.reverse();

            let mut origin = 0;
            let mut digit = digits.iter();
            for (k, stride) in strides.iter().enumerate() {
                if k != axis {
                    origin += digit.next().copied().unwrap_or(0) * stride;
                }
            }

            let line: Vec<NodeId> = (0..root)
                .map(|i| (origin + i * strides[axis]) as NodeId)
                .collect();
            let port = axis as PortId;
            circuits.extend(round_robin_over(&line, port, port, false));
        }
    }
    Ok(circuits)
}

fn integer_root(n: usize, dimensions: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let guess = (n as f64).powf(1.0 / dimensions as f64).round() as usize;
    [guess.saturating_sub(1), guess, guess + 1]
        .into_iter()
        .find(|r| *r > 0 && r.checked_pow(dimensions as u32) == Some(n))
}
