//! Rendering of `asset`, `url` and `files[].src` templates.
//!
//! Registries use a narrow subset of Go template syntax: field references
//! (`{{.Version}}`), helper calls (`{{trimV .Version}}`,
//! `{{trimPrefix "v" .Version}}`) and pipes (`{{.Version | trimV}}`).

/// Failure to render a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// `{{` without a matching `}}`.
    #[error("unclosed action in template {0:?}")]
    Unclosed(String),

    /// Reference to a field that is not provided.
    #[error("unknown template variable .{0}")]
    UnknownVariable(String),

    /// Call to an unknown helper.
    #[error("unknown template function {0}")]
    UnknownFunction(String),

    /// Malformed action body.
    #[error("invalid template action {0:?}")]
    InvalidAction(String),
}

/// Values available to a template.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TemplateVars {
    /// `.Version`: the raw tag.
    pub version: String,
    /// `.SemVer`: the tag without its version prefix.
    pub semver: String,
    /// `.OS`: runtime OS after replacements.
    pub os: String,
    /// `.Arch`: runtime arch after emulation and replacements.
    pub arch: String,
    /// `.GOOS`: runtime OS.
    pub goos: String,
    /// `.GOARCH`: runtime arch.
    pub goarch: String,
    /// `.Format`
    pub format: String,
    /// `.Asset`: the rendered asset name.
    pub asset: String,
    /// `.AssetWithoutExt`
    pub asset_without_ext: String,
    /// `.FileName`: `files[].name` being rendered.
    pub file_name: String,
}

impl TemplateVars {
    fn lookup(&self, name: &str) -> Option<&str> {
        let v = match name {
            "Version" => &self.version,
            "SemVer" => &self.semver,
            "OS" => &self.os,
            "Arch" => &self.arch,
            "GOOS" => &self.goos,
            "GOARCH" => &self.goarch,
            "Format" => &self.format,
            "Asset" => &self.asset,
            "AssetWithoutExt" => &self.asset_without_ext,
            "FileName" => &self.file_name,
            _ => return None,
        };
        Some(v)
    }
}

/// Render `tpl` with `vars`.
///
/// # Errors
///
/// Returns [`TemplateError`] on malformed actions, unknown fields or unknown
/// helpers.
pub fn render(tpl: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(tpl.len());
    let mut rest = tpl;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::Unclosed(tpl.to_string()))?;
        out.push_str(&eval_action(after[..end].trim(), vars)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Whether `s` contains any template action.
pub fn is_template(s: &str) -> bool {
    s.contains("{{")
}

fn eval_action(action: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut stages = action.split('|').map(str::trim);
    let first = stages
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TemplateError::InvalidAction(action.to_string()))?;

    let mut value = eval_command(first, None, vars)?;
    for stage in stages {
        value = eval_command(stage, Some(value), vars)?;
    }
    Ok(value)
}

fn eval_command(
    cmd: &str,
    piped: Option<String>,
    vars: &TemplateVars,
) -> Result<String, TemplateError> {
    let words = split_words(cmd).ok_or_else(|| TemplateError::InvalidAction(cmd.to_string()))?;
    let Some((head, rest)) = words.split_first() else {
        return Err(TemplateError::InvalidAction(cmd.to_string()));
    };

    if words.len() == 1 && piped.is_none() && !is_function(head) {
        return eval_arg(head, vars);
    }

    let mut args = rest
        .iter()
        .map(|w| eval_arg(w, vars))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(p) = piped {
        args.push(p);
    }

    match (head.as_str(), args.as_slice()) {
        ("trimV", [s]) => Ok(s.strip_prefix('v').unwrap_or(s).to_string()),
        ("trimPrefix", [prefix, s]) => Ok(s.strip_prefix(prefix.as_str()).unwrap_or(s).to_string()),
        ("trimSuffix", [suffix, s]) => Ok(s.strip_suffix(suffix.as_str()).unwrap_or(s).to_string()),
        ("lower", [s]) => Ok(s.to_lowercase()),
        ("upper", [s]) => Ok(s.to_uppercase()),
        (name, _) if is_function(name) => Err(TemplateError::InvalidAction(cmd.to_string())),
        (name, _) => Err(TemplateError::UnknownFunction(name.to_string())),
    }
}

fn is_function(name: &str) -> bool {
    matches!(name, "trimV" | "trimPrefix" | "trimSuffix" | "lower" | "upper")
}

fn eval_arg(word: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    if let Some(field) = word.strip_prefix('.') {
        return vars
            .lookup(field)
            .map(str::to_string)
            .ok_or_else(|| TemplateError::UnknownVariable(field.to_string()));
    }
    if let Some(lit) = word.strip_prefix('"').and_then(|w| w.strip_suffix('"')) {
        return Ok(lit.to_string());
    }
    Err(TemplateError::InvalidAction(word.to_string()))
}

/// Split on whitespace, keeping quoted strings whole.
fn split_words(s: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut word = String::new();
        if c == '"' {
            word.push(c);
            chars.next();
            let mut closed = false;
            for c in chars.by_ref() {
                word.push(c);
                if c == '"' {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return None;
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                word.push(c);
                chars.next();
            }
        }
        words.push(word);
    }
    Some(words)
}
