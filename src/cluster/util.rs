use crate::error::{Error, Result};

#[inline]
pub(crate) fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance between two points of equal dimension.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean(a, b).sqrt()
}

/// Coordinate-wise mean of a non-empty set of points.
///
/// Returns `None` when `points` yields nothing.
pub fn mean<'a, I>(points: I, dim: usize) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a Vec<f32>>,
{
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;
    for p in points {
        for (s, x) in sum.iter_mut().zip(p.iter()) {
            *s += x;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let n = count as f32;
    for s in &mut sum {
        *s /= n;
    }
    Some(sum)
}

/// Validate that `data` is non-empty, shares one dimensionality, and holds only
/// finite coordinates. Returns the dimensionality.
pub(crate) fn check_dimensions(data: &[Vec<f32>]) -> Result<usize> {
    let first = data.first().ok_or(Error::NoDataset)?;
    let d = first.len();
    if d == 0 {
        return Err(Error::InvalidParameter {
            name: "dimension",
            message: "must be at least 1",
        });
    }
    for point in data {
        if point.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: point.len(),
            });
        }
        if point.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "point",
                message: "coordinates must be finite",
            });
        }
    }
    Ok(d)
}
