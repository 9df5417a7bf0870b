//! Pixel grids and image operations
//!
//! Images are row-major: index `iy * nx + ix`, with `y` increasing with the
//! row index. Grid coordinates are pixel centres, symmetric about the origin.

use super::NumericError;
use serde::Serialize;

/// A simulated image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub nx: usize,
    pub ny: usize,
    pub data: Vec<f64>,
}

impl Image {
    pub fn new(nx: usize, ny: usize, data: Vec<f64>) -> Result<Self, NumericError> {
        if data.len() != nx * ny {
            return Err(NumericError::InvalidGrid(format!(
                "{} samples do not fill a {nx}x{ny} image",
                data.len()
            )));
        }
        Ok(Self { nx, ny, data })
    }

    pub fn get(&self, ix: usize, iy: usize) -> Option<f64> {
        if ix < self.nx && iy < self.ny {
            Some(self.data[iy * self.nx + ix])
        } else {
            None
        }
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.nx.max(1)).map(<[f64]>::to_vec).collect()
    }

    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// Pixel-centre coordinates of an `nx` by `ny` grid.
pub fn meshgrid(pixelscale: f64, nx: usize, ny: usize) -> (Vec<f64>, Vec<f64>) {
    let cx = (nx as f64 - 1.0) / 2.0;
    let cy = (ny as f64 - 1.0) / 2.0;
    let mut x = Vec::with_capacity(nx * ny);
    let mut y = Vec::with_capacity(nx * ny);
    for iy in 0..ny {
        for ix in 0..nx {
            x.push((ix as f64 - cx) * pixelscale);
            y.push((iy as f64 - cy) * pixelscale);
        }
    }
    (x, y)
}

/// Normalised square Gaussian kernel; returns the weights and side length.
///
/// The side covers four standard deviations either way and is always odd.
pub fn gaussian_kernel(pixelscale: f64, sigma: f64) -> (Vec<f64>, usize) {
    let half = (4.0 * sigma / pixelscale).ceil().max(1.0) as usize;
    let side = 2 * half + 1;
    let (x, y) = meshgrid(pixelscale, side, side);
    let mut kernel: Vec<f64> = x
        .iter()
        .zip(&y)
        .map(|(x, y)| (-(x * x + y * y) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= total;
    }
    (kernel, side)
}

/// Direct 2D convolution with zero boundary, output the same size as input.
pub fn convolve(image: &[f64], nx: usize, ny: usize, kernel: &[f64], side: usize) -> Vec<f64> {
    let half = (side / 2) as isize;
    let mut out = vec![0.0; image.len()];
    for iy in 0..ny as isize {
        for ix in 0..nx as isize {
            let mut acc = 0.0;
            for ky in 0..side as isize {
                let sy = iy + ky - half;
                if sy < 0 || sy >= ny as isize {
                    continue;
                }
                for kx in 0..side as isize {
                    let sx = ix + kx - half;
                    if sx < 0 || sx >= nx as isize {
                        continue;
                    }
                    // Flipped kernel: true convolution
                    let w = kernel[((side as isize - 1 - ky) * side as isize
                        + (side as isize - 1 - kx)) as usize];
                    acc += w * image[(sy * nx as isize + sx) as usize];
                }
            }
            out[(iy * nx as isize + ix) as usize] = acc;
        }
    }
    out
}

/// Remove `pad` pixels from every edge.
pub fn crop(image: &[f64], nx: usize, ny: usize, pad: usize) -> Vec<f64> {
    if pad == 0 {
        return image.to_vec();
    }
    let mut out = Vec::with_capacity((nx - 2 * pad) * (ny - 2 * pad));
    for iy in pad..ny - pad {
        out.extend_from_slice(&image[iy * nx + pad..iy * nx + nx - pad]);
    }
    out
}

/// Mean over non-overlapping `factor` by `factor` blocks.
pub fn avg_pool(image: &[f64], nx: usize, ny: usize, factor: usize) -> Vec<f64> {
    if factor == 1 {
        return image.to_vec();
    }
    let (ox, oy) = (nx / factor, ny / factor);
    let norm = (factor * factor) as f64;
    let mut out = vec![0.0; ox * oy];
    for iy in 0..oy * factor {
        for ix in 0..ox * factor {
            out[(iy / factor) * ox + ix / factor] += image[iy * nx + ix] / norm;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meshgrid_is_centred() {
        let (x, y) = meshgrid(0.5, 3, 2);
        assert_eq!(x, vec![-0.5, 0.0, 0.5, -0.5, 0.0, 0.5]);
        assert_eq!(y, vec![-0.25, -0.25, -0.25, 0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_gaussian_kernel_is_normalised_and_odd() {
        let (kernel, side) = gaussian_kernel(0.1, 0.2);
        assert_eq!(side % 2, 1);
        assert_eq!(kernel.len(), side * side);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        let centre = kernel[side * side / 2];
        assert!(kernel.iter().all(|&w| w <= centre));
    }

    #[test]
    fn test_convolution_preserves_interior_flux() {
        let mut image = vec![0.0; 81];
        image[40] = 2.0;
        let (kernel, side) = gaussian_kernel(1.0, 0.8);
        let out = convolve(&image, 9, 9, &kernel, side);
        assert!((out.iter().sum::<f64>() - 2.0).abs() < 1e-9);
        assert!(out[40] < 2.0);
    }

    #[test]
    fn test_crop_and_pool() {
        let image: Vec<f64> = (0..16).map(f64::from).collect();
        assert_eq!(crop(&image, 4, 4, 1), vec![5.0, 6.0, 9.0, 10.0]);
        assert_eq!(avg_pool(&image, 4, 4, 2), vec![2.5, 4.5, 10.5, 12.5]);
    }

    #[test]
    fn test_image_shape_checked() {
        assert!(Image::new(2, 2, vec![0.0; 3]).is_err());
        let image = Image::new(2, 1, vec![1.0, 2.0]).unwrap();
        assert_eq!(image.get(1, 0), Some(2.0));
        assert_eq!(image.rows(), vec![vec![1.0, 2.0]]);
    }
}
