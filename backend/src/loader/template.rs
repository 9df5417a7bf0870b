// Configuration templates
//
// Renders a built simulator back into a YAML configuration with every
// declared parameter set to null. Loading the template reproduces the
// names, kinds and key structure of the simulator it came from.

use crate::error::{CausticsError, ParseError};
use crate::io;
use crate::registry::KwargValue;
use crate::schema::{CosmologyConfig, ForwardSpec, KwargMap, LensConfig, SourceConfig};
use crate::sims::{ParamTable, Simulator};
use std::path::{Path, PathBuf};
use tracing::info;

const INDENT: &str = "  ";

/// Write `<name>_template.yaml` into `dir` and return its path.
pub fn write_template(sim: &Simulator, dir: impl AsRef<Path>) -> Result<PathBuf, CausticsError> {
    let path = dir.as_ref().join(format!("{}_template.yaml", sim.name()));
    let written = io::to_file(&path, &render_template(sim)?)?;
    info!(simulator = %sim.name(), path = %written.display(), "wrote template");
    Ok(written)
}

pub fn render_template(sim: &Simulator) -> Result<String, CausticsError> {
    let config = sim.config();
    let mut out = Writer {
        table: sim.params(),
        text: format!("# Template for simulator '{}' ({})\n", sim.name(), sim.kind()),
    };

    out.line(0, "simulator:");
    out.header(1, &config.name, &config.kind);
    out.params(1, &config.name);
    out.kwargs(1, &config.kwargs);
    out.line(1, "lens:");
    out.lens(2, &config.lens);
    out.line(1, "src:");
    out.source(2, &config.src);
    if let Some(light) = &config.lens_light {
        out.line(1, "lens_light:");
        out.source(2, light);
    }

    match &config.forward {
        Some(ForwardSpec::Builtin(name)) => out.line(1, &format!("forward: {}", scalar(name))),
        Some(ForwardSpec::Script(script)) => {
            let yaml = serde_yaml::to_string(script)
                .map_err(|e| ParseError::from_yaml("forward script", &e))?;
            out.line(1, "forward:");
            out.line(2, "script:");
            for line in yaml.lines() {
                out.line(3, line);
            }
        }
        None => out.line(1, &format!("# forward: {} (default)", sim.forward_name())),
    }

    Ok(out.text)
}

/// YAML scalar for a user-supplied string.
fn scalar(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
        && s.parse::<f64>().is_err()
        && !matches!(s, "null" | "true" | "false" | "~");
    if plain {
        s.to_string()
    } else {
        serde_json::Value::String(s.to_string()).to_string()
    }
}

fn kwarg_scalar(value: &KwargValue) -> String {
    match value {
        // Keep a decimal point so the value reloads as a float
        KwargValue::Float(v) => format!("{v:?}"),
        KwargValue::Str(s) => scalar(s),
        other => other.to_string(),
    }
}

struct Writer<'a> {
    table: &'a ParamTable,
    text: String,
}

impl Writer<'_> {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.text.push_str(INDENT);
        }
        self.text.push_str(text);
        self.text.push('\n');
    }

    fn header(&mut self, depth: usize, name: &str, kind: &str) {
        self.line(depth, &format!("name: {}", scalar(name)));
        self.line(depth, &format!("kind: {}", scalar(kind)));
    }

    fn params(&mut self, depth: usize, module: &str) {
        let Some(entry) = self.table.get(module) else {
            return;
        };
        if entry.decls.is_empty() {
            self.line(depth, "params: {}");
            return;
        }
        self.line(depth, "params:");
        for decl in &entry.decls {
            let comment = match decl.unit {
                "" => decl.description.to_string(),
                unit => format!("{} [{unit}]", decl.description),
            };
            self.line(depth + 1, &format!("{}: null  # {comment}", decl.name));
        }
    }

    fn kwargs(&mut self, depth: usize, kwargs: &KwargMap) {
        if kwargs.is_empty() {
            return;
        }
        self.line(depth, "kwargs:");
        for (name, value) in kwargs {
            self.line(depth + 1, &format!("{}: {}", scalar(name), kwarg_scalar(value)));
        }
    }

    fn cosmology(&mut self, depth: usize, cosmo: &CosmologyConfig) {
        self.header(depth, &cosmo.name, &cosmo.kind);
        self.params(depth, &cosmo.name);
    }

    fn lens(&mut self, depth: usize, lens: &LensConfig) {
        match lens {
            LensConfig::Leaf(leaf) => {
                self.header(depth, &leaf.name, &leaf.kind);
                self.params(depth, &leaf.name);
                self.kwargs(depth, &leaf.kwargs);
                if let Some(cosmo) = &leaf.cosmology {
                    self.line(depth, "cosmology:");
                    self.cosmology(depth + 1, cosmo);
                }
            }
            LensConfig::Multiplane(multi) => {
                self.header(depth, &multi.name, lens.kind());
                self.line(depth, "lenses:");
                for child in &multi.lenses {
                    // First key on the dash line, the rest aligned under it
                    let start = self.text.len();
                    self.lens(depth + 1, child);
                    let indent = INDENT.repeat(depth + 1);
                    let item_start = start + indent.len() - INDENT.len();
                    self.text.replace_range(item_start..start + indent.len(), "- ");
                }
            }
        }
    }

    fn source(&mut self, depth: usize, src: &SourceConfig) {
        self.header(depth, &src.name, &src.kind);
        self.params(depth, &src.name);
        self.kwargs(depth, &src.kwargs);
    }
}
