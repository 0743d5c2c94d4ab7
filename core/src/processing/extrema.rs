use crate::math::spline::CubicSpline;
use crate::math::stats::StatsHelper;
use crate::prelude::{ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};

/// Controls how local extrema are thinned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtremaConfig {
    /// Minima are reduced to the deepest one per chunk of this many.
    pub min_chunk: usize,
    /// Maxima are reduced to the highest one per chunk of this many.
    pub max_chunk: usize,
    /// Keep only minima below the signal mean and maxima above it.
    pub split: bool,
}

impl Default for ExtremaConfig {
    fn default() -> Self {
        Self {
            min_chunk: 1,
            max_chunk: 1,
            split: false,
        }
    }
}

/// Indices of the local minima and maxima of a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtremaIndices {
    pub minima: Vec<usize>,
    pub maxima: Vec<usize>,
}

/// Locates local extrema from sign changes of the discrete slope.
pub fn hl_envelope_indices(
    signal: &[f64],
    config: &ExtremaConfig,
) -> ProcessingResult<ExtremaIndices> {
    if config.min_chunk == 0 || config.max_chunk == 0 {
        return Err(ProcessingError::InvalidParameter(
            "extrema chunk sizes must be at least 1".into(),
        ));
    }

    let slope_sign: Vec<i8> = signal
        .windows(2)
        .map(|pair| sign(pair[1] - pair[0]))
        .collect();

    let mut minima = Vec::new();
    let mut maxima = Vec::new();
    for (idx, pair) in slope_sign.windows(2).enumerate() {
        let turn = pair[1] - pair[0];
        if turn > 0 {
            minima.push(idx + 1);
        } else if turn < 0 {
            maxima.push(idx + 1);
        }
    }

    if config.split {
        let mid = StatsHelper::mean(signal);
        minima.retain(|&i| signal[i] < mid);
        maxima.retain(|&i| signal[i] > mid);
    }

    Ok(ExtremaIndices {
        minima: reduce_chunks(signal, &minima, config.min_chunk, |candidate, best| {
            candidate < best
        }),
        maxima: reduce_chunks(signal, &maxima, config.max_chunk, |candidate, best| {
            candidate > best
        }),
    })
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Keeps the first most extreme index of each consecutive chunk.
fn reduce_chunks(
    signal: &[f64],
    indices: &[usize],
    chunk: usize,
    better: impl Fn(f64, f64) -> bool,
) -> Vec<usize> {
    indices
        .chunks(chunk)
        .map(|group| {
            group[1..].iter().fold(group[0], |best, &candidate| {
                if better(signal[candidate], signal[best]) {
                    candidate
                } else {
                    best
                }
            })
        })
        .collect()
}

/// Result of [`envelope_curves`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeCurves {
    /// One of the two sides had fewer than two interior peaks.
    InsufficientPeaks,
    Curves { upper: Vec<f64>, lower: Vec<f64> },
}

impl EnvelopeCurves {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, EnvelopeCurves::InsufficientPeaks)
    }
}

/// Upper and lower envelopes through the peaks and troughs of `y`.
///
/// Both endpoints join each peak set; cubic splines through them are evaluated
/// at every `x` and then clipped so the upper curve never dips below `y` and the
/// lower curve never rises above it.
pub fn envelope_curves(x: &[f64], y: &[f64]) -> ProcessingResult<EnvelopeCurves> {
    if x.len() != y.len() {
        return Err(ProcessingError::ShapeMismatch(format!(
            "x has {} samples but y has {}",
            x.len(),
            y.len()
        )));
    }
    let n = y.len();
    if n < 3 {
        return Ok(EnvelopeCurves::InsufficientPeaks);
    }

    let mut upper_idx = vec![0];
    let mut lower_idx = vec![0];
    for i in 1..n - 1 {
        if y[i] >= y[i - 1] && y[i] >= y[i + 1] {
            upper_idx.push(i);
        }
        if y[i] <= y[i - 1] && y[i] <= y[i + 1] {
            lower_idx.push(i);
        }
    }
    upper_idx.push(n - 1);
    lower_idx.push(n - 1);

    // Two endpoints plus at least two interior peaks on each side.
    if upper_idx.len() < 4 || lower_idx.len() < 4 {
        return Ok(EnvelopeCurves::InsufficientPeaks);
    }

    let upper_spline = spline_through(x, y, &upper_idx)?;
    let lower_spline = spline_through(x, y, &lower_idx)?;

    let upper = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| yi.max(upper_spline.evaluate(xi)))
        .collect();
    let lower = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| yi.min(lower_spline.evaluate(xi)))
        .collect();

    Ok(EnvelopeCurves::Curves { upper, lower })
}

/// Fits a spline through the selected samples, ordered by `x` whatever the axis direction.
fn spline_through(x: &[f64], y: &[f64], indices: &[usize]) -> ProcessingResult<CubicSpline> {
    let mut points: Vec<(f64, f64)> = indices.iter().map(|&i| (x[i], y[i])).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let (knots, values): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
    CubicSpline::not_a_knot(&knots, &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const PERIOD: usize = 64;

    fn two_tone(len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| {
                let phase = 2.0 * PI * n as f64 / PERIOD as f64;
                phase.sin() + 0.25 * (2.0 * phase).sin()
            })
            .collect()
    }

    #[test]
    fn extrema_of_two_tone_follow_its_period() {
        let signal = two_tone(10 * PERIOD);
        let indices = hl_envelope_indices(&signal, &ExtremaConfig::default()).unwrap();
        assert_eq!(indices.maxima.len(), 10);
        assert_eq!(indices.minima.len(), 10);
        assert!(indices.maxima.windows(2).all(|w| w[1] - w[0] == PERIOD));
        assert!(indices.minima.windows(2).all(|w| w[1] - w[0] == PERIOD));
        assert_eq!(indices.maxima[0], 12);
        assert_eq!(indices.minima[0], 52);
    }

    #[test]
    fn chunking_keeps_one_extremum_per_chunk() {
        let signal = two_tone(10 * PERIOD);
        let config = ExtremaConfig {
            min_chunk: 2,
            max_chunk: 2,
            split: false,
        };
        let indices = hl_envelope_indices(&signal, &config).unwrap();
        assert_eq!(indices.maxima.len(), 5);
        assert_eq!(indices.minima.len(), 5);
    }

    #[test]
    fn split_discards_extrema_on_the_wrong_side_of_the_mean() {
        let signal: Vec<f64> = (0..10 * PERIOD)
            .map(|n| {
                let phase = 2.0 * PI * n as f64 / PERIOD as f64;
                phase.sin() + 0.3 * (8.0 * phase).sin()
            })
            .collect();
        let all = hl_envelope_indices(&signal, &ExtremaConfig::default()).unwrap();
        let split = hl_envelope_indices(
            &signal,
            &ExtremaConfig {
                split: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(all.maxima.len(), 80);
        assert_eq!(split.maxima.len(), 50);
        let mean = StatsHelper::mean(&signal);
        assert!(split.maxima.iter().all(|&i| signal[i] > mean));
        assert!(split.minima.iter().all(|&i| signal[i] < mean));
    }

    #[test]
    fn zero_chunk_is_rejected() {
        let config = ExtremaConfig {
            min_chunk: 0,
            ..Default::default()
        };
        assert!(hl_envelope_indices(&[0.0, 1.0, 0.0], &config).is_err());
    }

    #[test]
    fn envelope_curves_bracket_the_signal() {
        let x: Vec<f64> = (0..400).map(|n| n as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&n| (2.0 * PI * n / 20.0).sin() * (1.0 + 0.5 * (2.0 * PI * n / 200.0).sin()))
            .collect();
        match envelope_curves(&x, &y).unwrap() {
            EnvelopeCurves::Curves { upper, lower } => {
                assert_eq!(upper.len(), y.len());
                assert_eq!(lower.len(), y.len());
                for i in 0..y.len() {
                    assert!(upper[i] >= y[i]);
                    assert!(lower[i] <= y[i]);
                }
                // Near a carrier crest the upper curve hugs the modulation.
                assert!((upper[105] - 1.0 - 0.5 * (2.0 * PI * 105.0 / 200.0).sin()).abs() < 0.05);
            }
            EnvelopeCurves::InsufficientPeaks => panic!("expected curves"),
        }
    }

    #[test]
    fn too_few_peaks_yield_the_empty_result() {
        let ramp: Vec<f64> = (0..10).map(|n| n as f64).collect();
        assert!(envelope_curves(&ramp, &ramp).unwrap().is_insufficient());

        let x: Vec<f64> = (0..7).map(|n| n as f64).collect();
        let tent = [0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0];
        assert!(envelope_curves(&x, &tent).unwrap().is_insufficient());

        assert!(envelope_curves(&[], &[]).unwrap().is_insufficient());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(envelope_curves(&[0.0, 1.0], &[0.0]).is_err());
    }

    #[test]
    fn descending_axis_mirrors_the_ascending_fit() {
        let n = 40;
        let y: Vec<f64> = (0..n).map(|i| (0.9 * i as f64).sin()).collect();
        let descending: Vec<f64> = (0..n).rev().map(|i| i as f64).collect();
        let ascending: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let mirrored: Vec<f64> = y.iter().rev().copied().collect();

        let (upper, lower) = match envelope_curves(&descending, &y).unwrap() {
            EnvelopeCurves::Curves { upper, lower } => (upper, lower),
            EnvelopeCurves::InsufficientPeaks => panic!("expected curves"),
        };
        let (upper_ref, lower_ref) = match envelope_curves(&ascending, &mirrored).unwrap() {
            EnvelopeCurves::Curves { upper, lower } => (upper, lower),
            EnvelopeCurves::InsufficientPeaks => panic!("expected curves"),
        };
        for i in 0..n {
            assert!(upper[i] >= y[i] && lower[i] <= y[i]);
            assert!((upper[i] - upper_ref[n - 1 - i]).abs() < 1e-9);
            assert!((lower[i] - lower_ref[n - 1 - i]).abs() < 1e-9);
        }
    }
}
