//! Template Tests
//!
//! Critical invariants tested:
//! - A written template loads back as a valid configuration
//! - The reloaded simulator has the same names, kinds and parameter keys
//! - Every parameter in a template is dynamic

use caustics_core_rs::schema::{ForwardSpec, LensConfig};
use caustics_core_rs::{build_simulator, load_config, render_template, ConfigSource, Simulator};
use std::fs;
use std::path::PathBuf;

// ============================================================================
// Test Helpers
// ============================================================================

const MULTIPLANE: &str = r#"
simulator:
  name: sim
  kind: Lens_Source
  params: {z_s: 2.0}
  kwargs: {pixelscale: 0.2, pixels_x: 4, psf_mode: conv2d}
  lens:
    name: stack
    kind: Multiplane
    lenses:
      - name: far
        kind: SIS
        params: {z_l: 1.0, x0: 0.0, y0: 0.0, th_ein: 0.5}
        cosmology: {name: cosmo, kind: FlatLambdaCDM}
      - name: near
        kind: SIE
        params: {z_l: 0.3}
        kwargs: {s: 0.01}
        cosmology: {name: cosmo, kind: FlatLambdaCDM}
  src:
    name: src
    kind: Sersic
  lens_light:
    name: light
    kind: Sersic
    kwargs: {use_lenstronomy_k: true}
  forward: convergence
"#;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("caustics-template-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn sim_near_kwargs(sim: &Simulator) -> caustics_core_rs::schema::KwargMap {
    match &sim.config().lens {
        LensConfig::Multiplane(multi) => match &multi.lenses[1] {
            LensConfig::Leaf(leaf) => leaf.kwargs.clone(),
            LensConfig::Multiplane(_) => panic!("expected a single plane child"),
        },
        LensConfig::Leaf(_) => panic!("expected a multiplane lens"),
    }
}

fn keys(sim: &Simulator) -> Vec<String> {
    sim.input_signature()
        .entries()
        .iter()
        .map(|e| e.key())
        .collect()
}

// ============================================================================
// Round trip through a file
// ============================================================================

#[test]
fn test_template_reloads_with_same_structure() {
    let dir = scratch_dir();
    let sim = build_simulator(ConfigSource::yaml(MULTIPLANE)).unwrap();

    let path = sim.write_template(&dir).unwrap();
    assert!(path.ends_with("sim_template.yaml"));

    let config = load_config(&path).unwrap();
    let reloaded = build_simulator(&path).unwrap();

    assert_eq!(reloaded.name(), sim.name());
    assert_eq!(reloaded.kind(), sim.kind());
    assert_eq!(reloaded.forward_name(), "convergence");
    assert_eq!(reloaded.build_order(), sim.build_order());
    assert_eq!(reloaded.structure_hash(), sim.structure_hash());
    assert_eq!(keys(&reloaded), keys(&sim));
    assert_eq!(
        config.simulator.forward,
        Some(ForwardSpec::Builtin("convergence".into()))
    );

    let LensConfig::Multiplane(multi) = &config.simulator.lens else {
        panic!("expected a multiplane lens");
    };
    let children: Vec<_> = multi.lenses.iter().map(|l| (l.name(), l.kind())).collect();
    assert_eq!(children, vec![("far", "SIS"), ("near", "SIE")]);
    assert_eq!(
        config.simulator.lens_light.as_ref().map(|l| l.kind.as_str()),
        Some("Sersic")
    );

    fs::remove_dir_all(dir).ok();
}

#[test]
fn test_template_parameters_are_dynamic() {
    let sim = build_simulator(ConfigSource::yaml(MULTIPLANE)).unwrap();
    let reloaded = build_simulator(ConfigSource::yaml(render_template(&sim).unwrap())).unwrap();

    let signature = reloaded.input_signature();
    assert_eq!(signature.dynamic_len(), signature.entries().len());
}

#[test]
fn test_template_keeps_kwargs() {
    let sim = build_simulator(ConfigSource::yaml(MULTIPLANE)).unwrap();
    let reloaded = build_simulator(ConfigSource::yaml(render_template(&sim).unwrap())).unwrap();

    assert_eq!(reloaded.kwargs(), sim.kwargs());
    assert_eq!(reloaded.config().kwargs, sim.config().kwargs);

    let light_kwargs = |s: &Simulator| s.config().lens_light.as_ref().map(|l| l.kwargs.clone());
    assert_eq!(light_kwargs(&reloaded), light_kwargs(&sim));

    let LensConfig::Multiplane(multi) = &reloaded.config().lens else {
        panic!("expected a multiplane lens");
    };
    let LensConfig::Leaf(near) = &multi.lenses[1] else {
        panic!("expected a single plane child");
    };
    assert_eq!(near.kwargs, sim_near_kwargs(&sim));
}

#[test]
fn test_template_documents_parameters() {
    let sim = build_simulator(ConfigSource::yaml(MULTIPLANE)).unwrap();
    let text = render_template(&sim).unwrap();

    assert!(text.starts_with("# Template for simulator 'sim' (Lens_Source)"));
    assert!(text.contains("th_ein: null  #"));
    assert!(text.contains("    - name: far"));
}

// ============================================================================
// Forward scripts
// ============================================================================

#[test]
fn test_script_forward_survives_template() {
    let yaml = MULTIPLANE.replace(
        "  forward: convergence\n",
        r#"  forward:
    script:
      description: half source
      image:
        compute:
          op: "*"
          left: {layer: source}
          right: {value: 0.5}
"#,
    );
    let sim = build_simulator(ConfigSource::yaml(yaml)).unwrap();
    let reloaded = build_simulator(ConfigSource::yaml(render_template(&sim).unwrap())).unwrap();

    assert_eq!(reloaded.config().forward, sim.config().forward);
    assert_eq!(keys(&reloaded), keys(&sim));
}
