use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::utils::shader_shell::prepare_stage_source;
use crate::utils::source_loader::{self, LoadError, ShaderSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => write!(f, "vertex"),
            Stage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Compiler output for a stage that failed.
#[derive(Debug, Clone)]
pub struct StageDiagnostic {
    pub stage: Stage,
    pub path: PathBuf,
    pub log: String,
}

impl fmt::Display for StageDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stage ({}) failed to compile:\n{}",
            self.stage,
            self.path.display(),
            self.log
        )
    }
}

/// A stage that passed the GLSL frontend and validation, lowered to WGSL for wgpu.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub stage: Stage,
    pub wgsl: String,
    /// Byte size of the stage's view of the shared uniform block.
    pub uniform_block_size: u32,
    /// User uniforms appended to the shared block after the builtins.
    pub block_extras: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub vertex: CompiledStage,
    pub fragment: CompiledStage,
}

impl CompiledProgram {
    pub fn uniform_block_size(&self) -> u32 {
        self.vertex
            .uniform_block_size
            .max(self.fragment.uniform_block_size)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{stage} shader source unavailable: {source}")]
    SourceUnavailable { stage: Stage, source: LoadError },
    #[error("{}", join_diagnostics(.failures))]
    CompileFailed { failures: Vec<StageDiagnostic> },
    #[error("program link failed:\n{log}")]
    LinkFailed { log: String },
}

impl BuildError {
    /// One-line description, used where the full compiler log does not fit.
    pub fn summary(&self) -> String {
        match self {
            BuildError::SourceUnavailable { stage, .. } => {
                format!("{stage} source unavailable")
            }
            BuildError::CompileFailed { failures } => {
                let stages: Vec<String> = failures.iter().map(|f| f.stage.to_string()).collect();
                format!("{} stage failed to compile", stages.join(" and "))
            }
            BuildError::LinkFailed { .. } => "link failed".to_string(),
        }
    }
}

fn join_diagnostics(failures: &[StageDiagnostic]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// AIDEV-NOTE: Compile one stage with naga (GLSL in, WGSL out) without touching the GPU
pub fn compile_stage(stage: Stage, source: &ShaderSource) -> Result<CompiledStage, StageDiagnostic> {
    let diagnostic = |log: String| StageDiagnostic {
        stage,
        path: source.path.clone(),
        log,
    };

    let prepared = prepare_stage_source(&source.text);
    if !prepared.hoisted.is_empty() {
        tracing::debug!(
            "{stage} stage: moved uniforms {:?} into the shared block",
            prepared.hoisted
        );
    }
    if !prepared.layout_issues.is_empty() {
        let log = prepared
            .layout_issues
            .iter()
            .map(|issue| format!("{}:{}: {}", source.path.display(), issue.line, issue.message))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(diagnostic(log));
    }

    // Diagnostics are rendered against the user's file, not the prepared text.
    let to_user_span = |span: naga::Span| match span.to_range() {
        Some(range) => naga::Span::new(
            prepared.user_offset(&source.text, range.start) as u32,
            prepared.user_offset(&source.text, range.end) as u32,
        ),
        None => span,
    };

    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.naga_stage());
    let module = frontend
        .parse(&options, &prepared.text)
        .map_err(|mut errors| {
            for error in &mut errors.errors {
                error.meta = to_user_span(error.meta);
            }
            diagnostic(errors.emit_to_string(&source.text))
        })?;

    let info = validator().validate(&module).map_err(|error| {
        let spans: Vec<naga::SpanContext> = error.spans().cloned().collect();
        let error = spans
            .into_iter()
            .fold(naga::WithSpan::new(error.into_inner()), |error, (span, label)| {
                error.with_span(to_user_span(span), label)
            });
        diagnostic(error.emit_to_string_with_path(&source.text, &source.path))
    })?;

    let mut wgsl = String::new();
    naga::back::wgsl::Writer::new(&mut wgsl, naga::back::wgsl::WriterFlags::empty())
        .write(&module, &info)
        .map_err(|error| diagnostic(format!("WGSL generation failed: {error}")))?;

    // wgpu re-validates the WGSL; layouts that only hold in the GLSL module fail here, not at link.
    check_generated_wgsl(&wgsl).map_err(diagnostic)?;

    Ok(CompiledStage {
        stage,
        wgsl,
        uniform_block_size: uniform_block_size(&module),
        block_extras: prepared.hoisted,
    })
}

fn validator() -> naga::valid::Validator {
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
}

fn check_generated_wgsl(wgsl: &str) -> Result<(), String> {
    let module = naga::front::wgsl::parse_str(wgsl)
        .map_err(|error| format!("generated WGSL does not parse: {error}"))?;
    validator().validate(&module).map_err(|error| {
        let mut message = format!("generated WGSL is not valid: {}", error.as_inner());
        let mut cause = std::error::Error::source(error.as_inner());
        while let Some(inner) = cause {
            message.push_str(&format!(": {inner}"));
            cause = std::error::Error::source(inner);
        }
        message
    })?;
    Ok(())
}

fn uniform_block_size(module: &naga::Module) -> u32 {
    module
        .global_variables
        .iter()
        .filter(|(_, var)| {
            var.space == naga::AddressSpace::Uniform
                && var
                    .binding
                    .as_ref()
                    .is_some_and(|binding| binding.group == 0 && binding.binding == 0)
        })
        .map(|(_, var)| module.types[var.ty].inner.size(module.to_ctx()))
        .max()
        .unwrap_or(0)
}

fn load_stage(stage: Stage, path: &Path) -> Result<ShaderSource, BuildError> {
    source_loader::load(path).map_err(|source| {
        tracing::error!("{stage} shader unavailable: {source}");
        BuildError::SourceUnavailable { stage, source }
    })
}

/// Both stages bind the same buffer, so extras line up only when one stage's
/// list is a prefix of the other's.
fn block_extras_conflict(vertex: &[String], fragment: &[String]) -> bool {
    !(vertex.starts_with(fragment) || fragment.starts_with(vertex))
}

/// Loads and compiles both stages. Both stages are always compiled so a single
/// pass reports every diagnostic; vertex diagnostics are logged first.
pub fn compile_program_sources(
    vertex_path: &Path,
    fragment_path: &Path,
) -> Result<CompiledProgram, BuildError> {
    let vertex_source = load_stage(Stage::Vertex, vertex_path)?;
    let fragment_source = load_stage(Stage::Fragment, fragment_path)?;

    let vertex = compile_stage(Stage::Vertex, &vertex_source);
    let fragment = compile_stage(Stage::Fragment, &fragment_source);

    match (vertex, fragment) {
        (Ok(vertex), Ok(fragment)) => {
            if block_extras_conflict(&vertex.block_extras, &fragment.block_extras) {
                tracing::warn!(
                    "vertex uniforms {:?} and fragment uniforms {:?} share one block and will alias; declare extra uniforms in one stage",
                    vertex.block_extras,
                    fragment.block_extras
                );
            }
            Ok(CompiledProgram { vertex, fragment })
        }
        (vertex, fragment) => {
            let failures: Vec<StageDiagnostic> =
                [vertex.err(), fragment.err()].into_iter().flatten().collect();
            for failure in &failures {
                tracing::error!("{failure}");
            }
            Err(BuildError::CompileFailed { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VERTEX: &str = r#"#version 330 core
layout (location = 0) in vec3 aPos;

void main() {
    gl_Position = vec4(aPos, 1.0);
}
"#;

    const FRAGMENT: &str = r#"#version 330 core
layout(location = 0) out vec4 FragColor;
uniform float u_time;
uniform vec2 u_resolution;

void main() {
    vec2 uv = gl_FragCoord.xy / u_resolution;
    FragColor = vec4(uv, 0.5 + 0.5 * sin(u_time), 1.0);
}
"#;

    const BROKEN_FRAGMENT: &str = r#"#version 330 core
layout(location = 0) out vec4 FragColor;

void main() {
    FragColor = vec4(1.0, 0.0, 0.0, 1.0);
"#;

    fn source(name: &str, text: &str) -> ShaderSource {
        ShaderSource {
            path: PathBuf::from(name),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_compile_valid_stages() {
        let vertex = compile_stage(Stage::Vertex, &source("shader.vert", VERTEX)).unwrap();
        let fragment = compile_stage(Stage::Fragment, &source("main.frag", FRAGMENT)).unwrap();

        assert!(vertex.wgsl.contains("@vertex"));
        assert!(fragment.wgsl.contains("@fragment"));
        assert_eq!(fragment.uniform_block_size, 16);
    }

    #[test]
    fn test_compiled_wgsl_is_valid() {
        let fragment = compile_stage(Stage::Fragment, &source("main.frag", FRAGMENT)).unwrap();

        let module = naga::front::wgsl::parse_str(&fragment.wgsl).unwrap();
        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        assert!(validator.validate(&module).is_ok());
    }

    #[test]
    fn test_compile_reports_fragment_syntax_error() {
        let error =
            compile_stage(Stage::Fragment, &source("broken.frag", BROKEN_FRAGMENT)).unwrap_err();

        assert_eq!(error.stage, Stage::Fragment);
        assert_eq!(error.path, PathBuf::from("broken.frag"));
        assert!(!error.log.is_empty());
    }

    #[test]
    fn test_extra_uniforms_grow_block() {
        let fragment_src = r#"
layout(location = 0) out vec4 FragColor;
uniform vec3 u_tint;

void main() {
    FragColor = vec4(u_tint, 1.0);
}
"#;
        let fragment = compile_stage(Stage::Fragment, &source("tint.frag", fragment_src)).unwrap();

        assert!(fragment.uniform_block_size > 16);
    }

    #[test]
    fn test_bundled_shaders_compile() {
        let vertex = source("shader.vert", include_str!("../../shaders/shader.vert"));
        assert!(compile_stage(Stage::Vertex, &vertex).is_ok());

        for (name, text) in [
            ("solid.frag", include_str!("../../shaders/solid.frag")),
            ("plasma.frag", include_str!("../../shaders/plasma.frag")),
        ] {
            assert!(
                compile_stage(Stage::Fragment, &source(name, text)).is_ok(),
                "{name} should compile"
            );
        }

        let broken = source("broken.frag", include_str!("../../shaders/broken.frag"));
        assert!(compile_stage(Stage::Fragment, &broken).is_err());
    }

    #[test]
    fn test_compile_program_reports_both_stages_in_order() {
        let dir = TempDir::new().unwrap();
        let vertex_path = dir.path().join("shader.vert");
        let fragment_path = dir.path().join("broken.frag");
        fs::write(&vertex_path, "void main() { gl_Position = vec4(1.0) }").unwrap();
        fs::write(&fragment_path, BROKEN_FRAGMENT).unwrap();

        match compile_program_sources(&vertex_path, &fragment_path) {
            Err(BuildError::CompileFailed { failures }) => {
                let stages: Vec<Stage> = failures.iter().map(|f| f.stage).collect();
                assert_eq!(stages, vec![Stage::Vertex, Stage::Fragment]);
            }
            other => panic!("expected compile failure, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_program_missing_source_names_stage() {
        let dir = TempDir::new().unwrap();
        let vertex_path = dir.path().join("shader.vert");
        fs::write(&vertex_path, VERTEX).unwrap();

        let error =
            compile_program_sources(&vertex_path, &dir.path().join("missing.frag")).unwrap_err();

        assert!(matches!(
            error,
            BuildError::SourceUnavailable {
                stage: Stage::Fragment,
                source: LoadError::NotFound { .. }
            }
        ));
        assert_eq!(error.summary(), "fragment source unavailable");
    }

    #[test]
    fn test_compile_program_success() {
        let dir = TempDir::new().unwrap();
        let vertex_path = dir.path().join("shader.vert");
        let fragment_path = dir.path().join("main.frag");
        fs::write(&vertex_path, VERTEX).unwrap();
        fs::write(&fragment_path, FRAGMENT).unwrap();

        let program = compile_program_sources(&vertex_path, &fragment_path).unwrap();
        assert_eq!(program.uniform_block_size(), 16);
    }

    #[test]
    fn test_narrow_uniform_array_fails_before_link() {
        let fragment_src = r#"#version 330 core
layout(location = 0) out vec4 FragColor;
uniform float weights[4];

void main() {
    FragColor = vec4(weights[1], 0.0, 0.0, 1.0);
}
"#;
        let error =
            compile_stage(Stage::Fragment, &source("weights.frag", fragment_src)).unwrap_err();

        assert!(error.log.contains("weights.frag:3:"), "log: {}", error.log);
        assert!(error.log.contains("vec4"));
    }

    #[test]
    fn test_vec4_uniform_array_compiles_to_valid_wgsl() {
        let fragment_src = r#"#version 330 core
layout(location = 0) out vec4 FragColor;
uniform vec4 palette[3];

void main() {
    FragColor = palette[1];
}
"#;
        let fragment = compile_stage(Stage::Fragment, &source("palette.frag", fragment_src)).unwrap();

        assert_eq!(fragment.block_extras, vec!["palette"]);
        assert!(check_generated_wgsl(&fragment.wgsl).is_ok());
        assert!(fragment.uniform_block_size >= 16 + 3 * 16);
    }

    #[test]
    fn test_diagnostic_lines_match_user_file() {
        let fragment_src = "#version 330 core\nlayout(location = 0) out vec4 FragColor;\nuniform float u_time;\n\nvoid main() {\n    FragColor = vec4(1.0)\n}\n";
        let error = compile_stage(Stage::Fragment, &source("semi.frag", fragment_src)).unwrap_err();

        // The missing `;` on line 6 is reported at the `}` on line 7.
        assert!(error.log.contains(":7:"), "log: {}", error.log);
        assert!(!error.log.contains("ShaderGlobals"));
    }

    #[test]
    fn test_block_extras_conflict_only_when_lists_diverge() {
        let names = |list: &[&str]| list.iter().map(|name| name.to_string()).collect::<Vec<_>>();

        assert!(!block_extras_conflict(&names(&[]), &names(&["u_tint"])));
        assert!(!block_extras_conflict(&names(&["u_tint"]), &names(&["u_tint", "u_gain"])));
        assert!(block_extras_conflict(&names(&["u_gain"]), &names(&["u_tint"])));
    }
}
