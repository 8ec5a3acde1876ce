use crate::error::{Error, Result};
use crate::s2::EqualAreaGrid;
use crate::vector3d::Vector3d;
use nalgebra::Vector3;
use statrs::distribution::{Continuous, Normal};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    Upper,
    Lower,
    Both,
}

impl FromStr for Hemisphere {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upper" => Ok(Hemisphere::Upper),
            "lower" => Ok(Hemisphere::Lower),
            "both" => Ok(Hemisphere::Both),
            _ => Err(Error::UnknownHemisphere { name: s.into() }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DensityOptions {
    /// Angular cell size of the estimation grid, degrees.
    pub resolution: f64,
    /// Half-width of the smoothing kernel, degrees; 0 disables smoothing.
    pub sigma: f64,
    pub hemisphere: Hemisphere,
    /// Map the output through ln(1 + v) for display.
    pub log: bool,
}

impl Default for DensityOptions {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            sigma: 5.0,
            hemisphere: Hemisphere::Upper,
            log: false,
        }
    }
}

/// Density over one hemisphere of the equal-area grid, in multiples of
/// random density: a uniform infinite sample converges to 1 everywhere.
#[derive(Debug, Clone)]
pub struct PoleDensity {
    /// `Upper` or `Lower`; a `Both` request yields one of each.
    pub hemisphere: Hemisphere,
    pub centers: Vector3d,
    pub values: Vec<f64>,
}

/// Estimate the pole density of a cloud of directions.
///
/// Each direction spreads its weight over grid cells within three kernel
/// half-widths; with `sigma == 0` it counts into its own cell only. Cell
/// sums are normalized against the expectation under a uniform
/// distribution of the same total per-hemisphere weight, which is what
/// makes the unit MRD. Hemispheres are reported separately, never folded.
pub fn pole_density(
    dirs: &Vector3d,
    weights: Option<&[f64]>,
    opts: &DensityOptions,
) -> Result<Vec<PoleDensity>> {
    if !(opts.resolution > 0.0 && opts.resolution <= 180.0) {
        return Err(Error::BadResolution {
            resolution: opts.resolution,
        });
    }
    if opts.sigma < 0.0 {
        return Err(Error::BadSigma { sigma: opts.sigma });
    }
    if let Some(w) = weights {
        if w.len() != dirs.len() {
            return Err(Error::ShapeMismatch {
                left: dirs.len(),
                right: w.len(),
            });
        }
    }

    let grid = EqualAreaGrid::new(opts.resolution.to_radians());
    let centers = grid.centers_vec();
    let sigma = opts.sigma.to_radians();
    let mut acc = vec![0.0f64; grid.len()];

    if sigma > 0.0 {
        let kernel = Normal::new(0.0, sigma).map_err(|_| Error::BadSigma { sigma: opts.sigma })?;
        let cut = 3.0 * sigma;
        let mut touched: Vec<(usize, f64)> = Vec::new();
        for (i, v) in dirs.iter().enumerate() {
            let norm = v.norm();
            if norm == 0.0 {
                continue;
            }
            let w = weights.map_or(1.0, |ws| ws[i]);
            let u = v / norm;
            let polar = u.z.clamp(-1.0, 1.0).acos();
            touched.clear();
            let k0 = ((polar - cut) / grid.band()).floor().max(0.0) as usize;
            let k1 = ((polar + cut) / grid.band()).floor().max(0.0) as usize;
            for k in k0..=k1.min(grid.rings() - 1) {
                for c in grid.ring_cells(k) {
                    let angle = centers[c].dot(&u).clamp(-1.0, 1.0).acos();
                    if angle <= cut {
                        touched.push((c, kernel.pdf(angle)));
                    }
                }
            }
            let total: f64 = touched.iter().map(|(_, k)| k).sum();
            if total > 0.0 {
                for &(c, k) in &touched {
                    acc[c] += w * k / total;
                }
            } else {
                // kernel underflow, keep the weight as a plain count
                acc[grid.cell_index(v)] += w;
            }
        }
    } else {
        for (i, v) in dirs.iter().enumerate() {
            if v.norm() == 0.0 {
                continue;
            }
            let w = weights.map_or(1.0, |ws| ws[i]);
            acc[grid.cell_index(v)] += w;
        }
    }

    let omega = grid.solid_angles();
    let hemis = match opts.hemisphere {
        Hemisphere::Both => vec![Hemisphere::Upper, Hemisphere::Lower],
        h => vec![h],
    };

    let mut out = Vec::with_capacity(hemis.len());
    for h in hemis {
        let range = match h {
            Hemisphere::Upper => grid.upper_cells(),
            Hemisphere::Lower => grid.lower_cells(),
            Hemisphere::Both => unreachable!(),
        };
        let w_h: f64 = acc[range.clone()].iter().sum();
        let omega_h: f64 = omega[range.clone()].iter().sum();
        let mut values: Vec<f64> = range
            .clone()
            .map(|c| {
                if w_h > 0.0 {
                    acc[c] * omega_h / (w_h * omega[c])
                } else {
                    0.0
                }
            })
            .collect();
        if opts.log {
            for v in &mut values {
                *v = v.ln_1p();
            }
        }
        let cells: Vec<Vector3<f64>> = range.map(|c| centers[c]).collect();
        out.push(PoleDensity {
            hemisphere: h,
            centers: Vector3d::from_vecs(cells),
            values,
        });
    }
    Ok(out)
}
