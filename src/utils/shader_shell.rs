use std::sync::LazyLock;

use regex::Regex;

// AIDEV-NOTE: Every stage is wrapped in the same preamble so both see the uniform block at set 0, binding 0
const GLSL_VERSION: &str = "#version 450";
const UNIFORM_BLOCK_NAME: &str = "ShaderGlobals";

/// Uniforms the host writes every frame, in block order.
pub const BUILTIN_UNIFORMS: [(&str, &str); 2] = [("float", "u_time"), ("vec2", "u_resolution")];

static LOOSE_UNIFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*uniform\s+(?:(?:lowp|mediump|highp)\s+)?(\w+)\s+(\w+)\s*(\[\s*\d+\s*\])?\s*;\s*(?://.*)?$",
    )
    .expect("loose uniform pattern is valid")
});

static PRECISION_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*precision\s+\w+\s+\w+\s*;").expect("precision pattern is valid")
});

/// Element types whose arrays get a 16-byte stride in a std140 block but a
/// tighter one in WGSL's uniform address space.
const NARROW_ARRAY_ELEMENTS: [&str; 12] = [
    "float", "int", "uint", "bool", "vec2", "vec3", "ivec2", "ivec3", "uvec2", "uvec3", "bvec2",
    "bvec3",
];

/// A hoisted uniform the shared block cannot carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutIssue {
    /// 1-based line in the user's source.
    pub line: usize,
    pub message: String,
}

/// A stage source ready for the GLSL frontend.
#[derive(Debug, Clone)]
pub struct PreparedShader {
    pub text: String,
    /// User uniforms moved into the shared block, in declaration order.
    pub hoisted: Vec<String>,
    pub layout_issues: Vec<LayoutIssue>,
    preamble_len: usize,
}

impl PreparedShader {
    /// Maps a byte offset in `text` back to the same position in `user_source`.
    ///
    /// The body keeps the user's lines one for one, so only the preamble has to
    /// be skipped; blanked lines map to their start. Offsets inside the preamble
    /// map to 0.
    pub fn user_offset(&self, user_source: &str, offset: usize) -> usize {
        let Some(relative) = offset.checked_sub(self.preamble_len) else {
            return 0;
        };
        let body = &self.text[self.preamble_len..];
        let before = body.get(..relative).unwrap_or(body);
        let line = before.matches('\n').count();
        let column = before.len() - before.rfind('\n').map_or(0, |newline| newline + 1);

        let mut line_start = 0;
        for (index, user_line) in user_source.split_inclusive('\n').enumerate() {
            if index == line {
                let content = user_line.trim_end_matches(['\n', '\r']).len();
                return line_start + column.min(content);
            }
            line_start += user_line.len();
        }
        user_source.len()
    }
}

struct BlockMember {
    ty: String,
    name: String,
    array: String,
}

fn is_opaque_type(ty: &str) -> bool {
    ty.contains("sampler") || ty.contains("texture") || ty.contains("image")
}

/// Rewrites desktop-GL style stage source into Vulkan-style GLSL.
///
/// `#version` and `precision` lines are blanked (line count is preserved),
/// loose non-opaque `uniform` declarations move into a std140 block, and a
/// `#version 450` preamble declaring that block is prepended. Declarations of
/// the builtin uniforms are dropped in favour of the block's own members.
/// Positions in `text` map back to the user's source through
/// [`PreparedShader::user_offset`].
pub fn prepare_stage_source(user_source: &str) -> PreparedShader {
    let mut members: Vec<BlockMember> = BUILTIN_UNIFORMS
        .iter()
        .map(|(ty, name)| BlockMember {
            ty: (*ty).to_string(),
            name: (*name).to_string(),
            array: String::new(),
        })
        .collect();
    let mut hoisted = Vec::new();
    let mut layout_issues = Vec::new();
    let mut body = String::with_capacity(user_source.len());

    for (index, line) in user_source.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#version") || PRECISION_STATEMENT.is_match(line) {
            body.push('\n');
            continue;
        }

        if let Some(captures) = LOOSE_UNIFORM.captures(line) {
            let ty = &captures[1];
            let name = &captures[2];
            if !is_opaque_type(ty) {
                if !members.iter().any(|member| member.name == name) {
                    let array = captures
                        .get(3)
                        .map(|m| m.as_str().replace(char::is_whitespace, ""))
                        .unwrap_or_default();
                    if !array.is_empty() && NARROW_ARRAY_ELEMENTS.contains(&ty) {
                        layout_issues.push(LayoutIssue {
                            line: index + 1,
                            message: format!(
                                "uniform array `{name}` of {ty} needs a 16-byte element stride that WGSL cannot express; declare it as an array of vec4"
                            ),
                        });
                    }
                    members.push(BlockMember {
                        ty: ty.to_string(),
                        name: name.to_string(),
                        array,
                    });
                    if !BUILTIN_UNIFORMS.iter().any(|(_, builtin)| *builtin == name) {
                        hoisted.push(name.to_string());
                    }
                }
                body.push('\n');
                continue;
            }
        }

        body.push_str(line);
        body.push('\n');
    }

    let mut text = String::with_capacity(body.len() + 256);
    text.push_str(GLSL_VERSION);
    text.push('\n');
    text.push_str(&format!(
        "layout(std140, set = 0, binding = 0) uniform {UNIFORM_BLOCK_NAME} {{\n"
    ));
    for member in &members {
        text.push_str(&format!("    {} {}{};\n", member.ty, member.name, member.array));
    }
    text.push_str("};\n");
    let preamble_len = text.len();
    text.push_str(&body);

    PreparedShader {
        text,
        hoisted,
        layout_issues,
        preamble_len,
    }
}
