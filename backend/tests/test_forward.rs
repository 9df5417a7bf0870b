//! Forward Invocation Tests
//!
//! Running built simulators through the built-in routines and forward
//! scripts.
//!
//! Critical invariants tested:
//! - Output shape follows the simulator kwargs
//! - Routines agree where the physics says they must
//! - Numeric errors surface unwrapped; script runtime errors as Forward
//! - Calls are safe to run concurrently on one simulator

use caustics_core_rs::forward::ForwardError;
use caustics_core_rs::{
    build_simulator, CausticsError, ConfigSource, Image, NumericError, Simulator,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// SIS lens with a dynamic Einstein radius and a fixed round Sersic source.
fn sis_yaml(kwargs: &str, forward: &str) -> String {
    format!(
        r#"
simulator:
  name: sim
  kind: Lens_Source
  params: {{z_s: 1.0}}
  kwargs: {kwargs}
  lens:
    name: lens
    kind: SIS
    params: {{z_l: 0.5, x0: 0.0, y0: 0.0}}
  src:
    name: src
    kind: Sersic
    params: {{x0: 0.0, y0: 0.0, q: 1.0, phi: 0.0, n: 1.0, Re: 0.1, Ie: 1.0}}
{forward}"#
    )
}

fn build(yaml: &str) -> Simulator {
    build_simulator(ConfigSource::yaml(yaml)).unwrap()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

fn assert_images_close(a: &Image, b: &Image) {
    assert_eq!((a.nx, a.ny), (b.nx, b.ny));
    for (x, y) in a.data.iter().zip(&b.data) {
        assert_close(*x, *y);
    }
}

// ============================================================================
// Built-in routines
// ============================================================================

#[test]
fn test_output_shape_follows_kwargs() {
    let sim = build(&sis_yaml(
        "{pixelscale: 0.05, pixels_x: 6, pixels_y: 4, upsample_factor: 2}",
        "",
    ));
    let image = sim.call(vec![0.5]).unwrap();
    assert_eq!((image.nx, image.ny), (6, 4));
    assert_eq!(image.rows().len(), 4);
    assert!(image.data.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn test_sis_convergence_map() {
    let sim = build(&sis_yaml(
        "{pixelscale: 1.0, pixels_x: 2}",
        "  forward: convergence\n",
    ));
    let image = sim.call(vec![1.0]).unwrap();

    // Pixel centres at (+-0.5, +-0.5): kappa = th_ein / (2 r)
    let expected = 0.5 / 0.5_f64.sqrt();
    for value in &image.data {
        assert_close(*value, expected);
    }
}

#[test]
fn test_upsampling_averages_sub_pixels() {
    let coarse = build(&sis_yaml(
        "{pixelscale: 1.0, pixels_x: 2}",
        "  forward: convergence\n",
    ));
    let fine = build(&sis_yaml(
        "{pixelscale: 1.0, pixels_x: 2, upsample_factor: 2}",
        "  forward: convergence\n",
    ));
    let coarse = coarse.call(vec![1.0]).unwrap();
    let fine = fine.call(vec![1.0]).unwrap();

    let kappa = |x: f64, y: f64| 0.5 / (x * x + y * y).sqrt();
    let expected = (kappa(0.75, 0.75) + 2.0 * kappa(0.25, 0.75) + kappa(0.25, 0.25)) / 4.0;
    for value in &fine.data {
        assert_close(*value, expected);
    }
    assert!(fine.data[0] > coarse.data[0]);
}

#[test]
fn test_zero_mass_lens_matches_unlensed() {
    let kwargs = "{pixelscale: 0.05, pixels_x: 5}";
    let lensed = build(&sis_yaml(kwargs, "")).call(vec![0.0]).unwrap();
    let unlensed = build(&sis_yaml(kwargs, "  forward: unlensed\n"))
        .call(Vec::new())
        .unwrap();
    assert_images_close(&lensed, &unlensed);
}

#[test]
fn test_lensing_changes_the_image() {
    let sim = build(&sis_yaml("{pixelscale: 0.05, pixels_x: 5}", ""));
    let without = sim.call(vec![0.0]).unwrap();
    let with = sim.call(vec![0.1]).unwrap();
    assert!(without
        .data
        .iter()
        .zip(&with.data)
        .any(|(a, b)| (a - b).abs() > 1e-6));
}

#[test]
fn test_psf_lowers_the_peak() {
    let sharp = build(&sis_yaml(
        "{pixelscale: 0.05, pixels_x: 5}",
        "  forward: unlensed\n",
    ));
    let blurred = build(&sis_yaml(
        "{pixelscale: 0.05, pixels_x: 5, psf: 0.05}",
        "  forward: unlensed\n",
    ));
    let sharp = sharp.call(Vec::new()).unwrap();
    let blurred = blurred.call(Vec::new()).unwrap();

    let centre = |image: &Image| image.get(2, 2).unwrap();
    assert!(centre(&blurred) < centre(&sharp));
    assert!(centre(&blurred) > 0.0);
}

#[test]
fn test_lens_light_adds_to_lensed_source() {
    let base = sis_yaml("{pixelscale: 0.05, pixels_x: 5}", "");
    let with_light = format!(
        "{base}  lens_light:\n    name: light\n    kind: Sersic\n    params: {{x0: 0.0, y0: 0.0, q: 1.0, phi: 0.0, n: 4.0, Re: 0.2, Ie: 0.5}}\n"
    );
    let bare = build(&base).call(vec![0.1]).unwrap();
    let lit = build(&with_light).call(vec![0.1]).unwrap();
    assert!(lit.total() > bare.total());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_numeric_errors_pass_through() {
    let yaml = r#"
simulator:
  name: sim
  kind: Lens_Source
  params: {z_s: 1.0}
  kwargs: {pixelscale: 0.1, pixels_x: 3}
  lens:
    name: lens
    kind: SIE
    params: {z_l: 0.5, x0: 0.0, y0: 0.0, phi: 0.0, b: 1.0}
  src:
    name: src
    kind: Sersic
    params: {x0: 0.0, y0: 0.0, q: 1.0, phi: 0.0, n: 1.0, Re: 0.1, Ie: 1.0}
"#;
    let sim = build(yaml);
    match sim.call(vec![1.5]).unwrap_err() {
        CausticsError::Numeric(NumericError::InvalidParameter { module, name, .. }) => {
            assert_eq!(module, "lens");
            assert_eq!(name, "q");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Forward scripts
// ============================================================================

#[test]
fn test_script_scales_unlensed_image() {
    let kwargs = "{pixelscale: 0.05, pixels_x: 5}";
    let script = r#"  forward:
    script:
      description: doubled source
      constants: {gain: 2.0}
      image:
        compute:
          op: "*"
          left: {layer: source}
          right: {constant: gain}
"#;
    let scripted = build(&sis_yaml(kwargs, script)).call(Vec::new()).unwrap();
    let unlensed = build(&sis_yaml(kwargs, "  forward: unlensed\n"))
        .call(Vec::new())
        .unwrap();

    for (s, u) in scripted.data.iter().zip(&unlensed.data) {
        assert_close(*s, 2.0 * u);
    }
}

#[test]
fn test_script_runtime_division_by_zero() {
    let script = r#"  forward:
    script:
      image:
        compute:
          op: "/"
          left: {layer: lensed_source}
          right: {param: lens.th_ein}
"#;
    let sim = build(&sis_yaml("{pixelscale: 0.05, pixels_x: 3}", script));
    assert!(sim.call(vec![0.5]).is_ok());
    assert!(matches!(
        sim.call(vec![0.0]),
        Err(CausticsError::Forward(ForwardError::DivisionByZero))
    ));
}

#[test]
fn test_script_with_unknown_reference_fails_build() {
    let script = r#"  forward:
    script:
      image:
        compute:
          op: "*"
          left: {layer: source}
          right: {param: lens.mass}
"#;
    let err =
        build_simulator(ConfigSource::yaml(sis_yaml("{pixelscale: 0.05, pixels_x: 3}", script)))
            .unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(errors[0].path, "simulator.forward.script");
    assert!(errors[0].received.contains("lens.mass"));
}

#[test]
fn test_script_literal_division_by_zero_fails_build() {
    let script = r#"  forward:
    script:
      image:
        compute:
          op: "/"
          left: {layer: source}
          right: {value: 0.0}
"#;
    let result =
        build_simulator(ConfigSource::yaml(sis_yaml("{pixelscale: 0.05, pixels_x: 3}", script)));
    assert!(matches!(result, Err(CausticsError::Validation(_))));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_calls_agree() {
    let sim = build(&sis_yaml("{pixelscale: 0.05, pixels_x: 8, psf: 0.05}", ""));
    let reference = sim.call(vec![0.2]).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| sim.call(vec![0.2]).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), reference);
        }
    });
}
