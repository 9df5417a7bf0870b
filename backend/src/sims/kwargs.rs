// Lens_Source simulator options
//
// Declarations for the registry plus the typed view the forward routines
// sample with.

use crate::models::grid::gaussian_kernel;
use crate::registry::{KwargDecl, KwargDefault, KwargType, KwargValue, ParamDecl};
use crate::schema::{FieldPath, KwargMap, ValidationError};
use serde::Serialize;

/// Simulator parameter carrying the source-plane redshift
pub const SOURCE_REDSHIFT: &str = "z_s";

pub const LENS_SOURCE_PARAMS: [ParamDecl; 1] = [ParamDecl::dynamic(
    SOURCE_REDSHIFT,
    "Redshift of the source plane",
    "unitless",
)];

pub const LENS_SOURCE_KWARGS: [KwargDecl; 7] = [
    KwargDecl::new(
        "pixelscale",
        KwargType::Float,
        KwargDefault::Required,
        "Pixel side length in arcsec",
    ),
    KwargDecl::new(
        "pixels_x",
        KwargType::Int,
        KwargDefault::Required,
        "Image width in pixels",
    ),
    KwargDecl::new(
        "pixels_y",
        KwargType::Int,
        KwargDefault::Optional,
        "Image height in pixels (defaults to pixels_x)",
    ),
    KwargDecl::new(
        "upsample_factor",
        KwargType::Int,
        KwargDefault::Int(1),
        "Sub-pixel sampling factor per axis",
    ),
    KwargDecl::new(
        "psf",
        KwargType::Float,
        KwargDefault::Optional,
        "Gaussian PSF standard deviation in arcsec",
    ),
    KwargDecl::new(
        "psf_pad",
        KwargType::Bool,
        KwargDefault::Bool(true),
        "Sample a border wide enough to avoid PSF edge effects",
    ),
    KwargDecl::new(
        "psf_mode",
        KwargType::Choice(&["fft", "conv2d"]),
        KwargDefault::Str("fft"),
        "PSF convolution mode",
    ),
];

/// Largest fine grid side (pixels times upsample factor plus PSF border)
pub const MAX_FINE_SIDE: usize = 4096;

/// Largest PSF kernel half width in fine pixels
pub const MAX_PSF_HALF_WIDTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PsfMode {
    Fft,
    Conv2d,
}

/// Typed Lens_Source options with defaults applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorKwargs {
    pub pixelscale: f64,
    pub pixels_x: usize,
    pub pixels_y: usize,
    pub upsample_factor: usize,
    pub psf: Option<f64>,
    pub psf_pad: bool,
    pub psf_mode: PsfMode,
}

impl SimulatorKwargs {
    /// Read resolved keyword arguments, checking ranges.
    pub fn from_kwargs(kwargs: &KwargMap, path: &FieldPath) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut positive_float = |name: &str| -> Option<f64> {
            let value = kwargs.get(name).and_then(KwargValue::as_f64)?;
            if value > 0.0 && value.is_finite() {
                Some(value)
            } else {
                errors.push(ValidationError::new(
                    path.field(name),
                    "a positive number",
                    value.to_string(),
                ));
                None
            }
        };
        let pixelscale = positive_float("pixelscale");
        let psf = positive_float("psf");

        let mut positive_int = |name: &str| -> Option<usize> {
            let value = kwargs.get(name).and_then(KwargValue::as_i64)?;
            if value >= 1 {
                Some(value as usize)
            } else {
                errors.push(ValidationError::new(
                    path.field(name),
                    "a positive integer",
                    value.to_string(),
                ));
                None
            }
        };
        let pixels_x = positive_int("pixels_x");
        let pixels_y = positive_int("pixels_y").or(pixels_x);
        let upsample_factor = positive_int("upsample_factor").unwrap_or(1);

        let psf_pad = kwargs
            .get("psf_pad")
            .and_then(KwargValue::as_bool)
            .unwrap_or(true);
        let psf_mode = match kwargs.get("psf_mode").and_then(KwargValue::as_str) {
            Some("conv2d") => PsfMode::Conv2d,
            _ => PsfMode::Fft,
        };

        match (pixelscale, pixels_x, pixels_y) {
            (Some(pixelscale), Some(pixels_x), Some(pixels_y)) if errors.is_empty() => {
                let parsed = Self {
                    pixelscale,
                    pixels_x,
                    pixels_y,
                    upsample_factor,
                    psf,
                    psf_pad,
                    psf_mode,
                };
                parsed.check_grid(kwargs.contains_key("pixels_y"), path, &mut errors);
                if errors.is_empty() {
                    Ok(parsed)
                } else {
                    Err(errors)
                }
            }
            (pixelscale, pixels_x, _) => {
                if pixelscale.is_none() && !kwargs.contains_key("pixelscale") {
                    errors.push(ValidationError::new(
                        path.field("pixelscale"),
                        "a positive number",
                        "nothing",
                    ));
                }
                if pixels_x.is_none() && !kwargs.contains_key("pixels_x") {
                    errors.push(ValidationError::new(
                        path.field("pixels_x"),
                        "a positive integer",
                        "nothing",
                    ));
                }
                Err(errors)
            }
        }
    }

    /// Bound the PSF kernel and the fine grid before anything is allocated.
    fn check_grid(&self, explicit_y: bool, path: &FieldPath, errors: &mut Vec<ValidationError>) {
        let mut pad = 0;
        if let Some(sigma) = self.psf {
            let half = (4.0 * sigma / self.fine_pixelscale()).ceil().max(1.0);
            if half > MAX_PSF_HALF_WIDTH as f64 {
                errors.push(ValidationError::new(
                    path.field("psf"),
                    format!("a PSF at most {MAX_PSF_HALF_WIDTH} fine pixels wide at 4 sigma"),
                    format!("{sigma} ({half} fine pixels)"),
                ));
            } else if self.psf_pad {
                pad = half as usize;
            }
        }

        let mut axes = vec![("pixels_x", self.pixels_x)];
        if explicit_y {
            axes.push(("pixels_y", self.pixels_y));
        }
        for (name, pixels) in axes {
            let side = pixels
                .checked_mul(self.upsample_factor)
                .and_then(|side| side.checked_add(2 * pad));
            if !side.is_some_and(|side| side <= MAX_FINE_SIDE) {
                errors.push(ValidationError::new(
                    path.field(name),
                    format!(
                        "a fine grid side ({name} x upsample_factor + PSF border) of at most {MAX_FINE_SIDE}"
                    ),
                    format!("{pixels} x {} + {}", self.upsample_factor, 2 * pad),
                ));
            }
        }
    }

    /// Fine grid shape for a PSF border of `pad` fine pixels.
    pub fn fine_shape(&self, pad: usize) -> (usize, usize) {
        (
            self.pixels_x * self.upsample_factor + 2 * pad,
            self.pixels_y * self.upsample_factor + 2 * pad,
        )
    }

    pub fn fine_pixelscale(&self) -> f64 {
        self.pixelscale / self.upsample_factor as f64
    }

    /// Gaussian kernel on the fine grid, if a PSF is configured.
    pub fn psf_kernel(&self) -> Option<(Vec<f64>, usize)> {
        self.psf
            .map(|sigma| gaussian_kernel(self.fine_pixelscale(), sigma))
    }

    /// Border in fine pixels sampled beyond the image.
    pub fn pad(&self, kernel_side: Option<usize>) -> usize {
        match kernel_side {
            Some(side) if self.psf_pad => side / 2,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::resolve_kwargs;

    fn kwargs(pairs: &[(&str, KwargValue)]) -> KwargMap {
        let given = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        resolve_kwargs(&LENS_SOURCE_KWARGS, &given)
    }

    #[test]
    fn test_defaults_applied() {
        let kw = SimulatorKwargs::from_kwargs(
            &kwargs(&[
                ("pixelscale", KwargValue::Float(0.05)),
                ("pixels_x", KwargValue::Int(100)),
            ]),
            &FieldPath::root("simulator.kwargs"),
        )
        .unwrap();

        assert_eq!(kw.pixels_y, 100);
        assert_eq!(kw.upsample_factor, 1);
        assert_eq!(kw.psf, None);
        assert!(kw.psf_pad);
        assert_eq!(kw.psf_mode, PsfMode::Fft);
        assert_eq!(kw.pad(None), 0);
    }

    #[test]
    fn test_ranges_checked() {
        let errors = SimulatorKwargs::from_kwargs(
            &kwargs(&[
                ("pixelscale", KwargValue::Float(-1.0)),
                ("pixels_x", KwargValue::Int(0)),
            ]),
            &FieldPath::root("simulator.kwargs"),
        )
        .unwrap_err();

        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["simulator.kwargs.pixelscale", "simulator.kwargs.pixels_x"]
        );
    }

    #[test]
    fn test_psf_padding_uses_half_kernel() {
        let kw = SimulatorKwargs::from_kwargs(
            &kwargs(&[
                ("pixelscale", KwargValue::Float(0.1)),
                ("pixels_x", KwargValue::Int(10)),
                ("upsample_factor", KwargValue::Int(2)),
                ("psf", KwargValue::Float(0.1)),
            ]),
            &FieldPath::root("k"),
        )
        .unwrap();

        let (_, side) = kw.psf_kernel().unwrap();
        assert_eq!(side, 17);
        assert_eq!(kw.pad(Some(side)), 8);
        assert_eq!(kw.fine_shape(8), (36, 36));
    }

    #[test]
    fn test_oversized_fine_grid_rejected() {
        let errors = SimulatorKwargs::from_kwargs(
            &kwargs(&[
                ("pixelscale", KwargValue::Float(0.1)),
                ("pixels_x", KwargValue::Int(4_294_967_296)),
                ("upsample_factor", KwargValue::Int(4_294_967_296)),
            ]),
            &FieldPath::root("simulator.kwargs"),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "simulator.kwargs.pixels_x");

        // Exactly at the limit is fine; the PSF border counts
        let at_limit = |psf: Option<f64>| {
            let mut pairs = vec![
                ("pixelscale", KwargValue::Float(1.0)),
                ("pixels_x", KwargValue::Int(MAX_FINE_SIDE as i64)),
                ("pixels_y", KwargValue::Int(4)),
            ];
            if let Some(psf) = psf {
                pairs.push(("psf", KwargValue::Float(psf)));
            }
            SimulatorKwargs::from_kwargs(&kwargs(&pairs), &FieldPath::root("k"))
        };
        assert!(at_limit(None).is_ok());
        let errors = at_limit(Some(0.5)).unwrap_err();
        assert_eq!(errors[0].path, "k.pixels_x");
    }

    #[test]
    fn test_oversized_psf_kernel_rejected() {
        let errors = SimulatorKwargs::from_kwargs(
            &kwargs(&[
                ("pixelscale", KwargValue::Float(1e-6)),
                ("pixels_x", KwargValue::Int(8)),
                ("psf", KwargValue::Float(100.0)),
                ("psf_pad", KwargValue::Bool(false)),
            ]),
            &FieldPath::root("simulator.kwargs"),
        )
        .unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["simulator.kwargs.psf"]);
    }
}
