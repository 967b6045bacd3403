//! Rendering a resolved package for a concrete version and runtime.

use thiserror::Error;

use super::{File, PackageInfo, PackageType};
use crate::runtime::Runtime;
use crate::template::{self, TemplateError, TemplateVars};

/// Failure to render an asset, URL or file path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The template does not render.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The package has no template for this field. Holds the package name and the field.
    #[error("package {0} has no {1} to render")]
    Missing(String, &'static str),
}

impl PackageInfo {
    /// Extension appended to executables on Windows.
    pub fn windows_ext(&self) -> &str {
        if !self.windows_ext.is_empty() {
            return &self.windows_ext;
        }
        match self.pkg_type {
            Some(PackageType::GithubContent | PackageType::GithubArchive) => ".sh",
            _ => ".exe",
        }
    }

    fn complete_windows_ext(&self, s: &str) -> String {
        let complete = self.complete_windows_ext.unwrap_or(!matches!(
            self.pkg_type,
            Some(PackageType::GithubContent | PackageType::GithubArchive)
        ));
        if complete {
            format!("{s}{}", self.windows_ext())
        } else {
            s.to_string()
        }
    }

    fn complete_windows_ext_to_asset(&self, asset: &str) -> String {
        if asset.ends_with(".exe") {
            return asset.to_string();
        }
        match self.format.as_str() {
            "raw" => self.complete_windows_ext(asset),
            "" => {
                let base = asset.rsplit('/').next().unwrap_or(asset);
                if base.contains('.') {
                    asset.to_string()
                } else {
                    self.complete_windows_ext(asset)
                }
            }
            _ => asset.to_string(),
        }
    }

    fn replace<'a>(&'a self, key: &'a str) -> &'a str {
        self.replacements.get(key).map_or(key, String::as_str)
    }

    /// Template values for `version` on `rt`.
    pub fn template_vars(&self, version: &str, rt: &Runtime) -> TemplateVars {
        let semver = if self.version_prefix.is_empty() {
            version
        } else {
            version.strip_prefix(&self.version_prefix).unwrap_or(version)
        };
        let arch = rt.arch(self.get_rosetta2(), self.get_windows_arm_emulation());
        TemplateVars {
            version: version.to_string(),
            semver: semver.to_string(),
            os: self.replace(&rt.goos).to_string(),
            arch: self.replace(arch).to_string(),
            goos: rt.goos.clone(),
            goarch: rt.goarch.clone(),
            format: self.get_format().to_string(),
            ..TemplateVars::default()
        }
    }

    /// Name of the release asset for `version` on `rt`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when `asset` is empty or does not render.
    pub fn render_asset(&self, version: &str, rt: &Runtime) -> Result<String, RenderError> {
        if self.asset.is_empty() {
            return Err(RenderError::Missing(self.get_name(), "asset"));
        }
        let asset = template::render(&self.asset, &self.template_vars(version, rt))?;
        if rt.is_windows() {
            return Ok(self.complete_windows_ext_to_asset(&asset));
        }
        Ok(asset)
    }

    /// Download URL of an `http` package.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when `url` is empty or does not render.
    pub fn render_url(&self, version: &str, rt: &Runtime) -> Result<String, RenderError> {
        if self.url.is_empty() {
            return Err(RenderError::Missing(self.get_name(), "url"));
        }
        let url = template::render(&self.url, &self.template_vars(version, rt))?;
        if rt.is_windows() {
            return Ok(self.complete_windows_ext_to_asset(&url));
        }
        Ok(url)
    }

    /// Repository path of a `github_content` package.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when `path` is empty or does not render.
    pub fn render_path(&self, version: &str, rt: &Runtime) -> Result<String, RenderError> {
        if self.path.is_empty() {
            return Err(RenderError::Missing(self.get_name(), "path"));
        }
        let path = template::render(&self.path, &self.template_vars(version, rt))?;
        if rt.is_windows() && !path.ends_with(self.windows_ext()) {
            return Ok(self.complete_windows_ext(&path));
        }
        Ok(path)
    }

    /// Path of `file` inside the unpacked artifact.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when `src` does not render.
    pub fn render_src(
        &self,
        file: &File,
        version: &str,
        rt: &Runtime,
    ) -> Result<String, RenderError> {
        let src = if file.src.is_empty() {
            file.name.clone()
        } else {
            let mut vars = self.template_vars(version, rt);
            vars.file_name.clone_from(&file.name);
            if let Ok(asset) = self.render_asset(version, rt) {
                vars.asset_without_ext = strip_archive_ext(&asset).to_string();
                vars.asset = asset;
            }
            template::render(&file.src, &vars)?
        };
        if rt.is_windows() && !src.ends_with(self.windows_ext()) {
            return Ok(self.complete_windows_ext(&src));
        }
        Ok(src)
    }
}

fn strip_archive_ext(asset: &str) -> &str {
    const EXTS: [&str; 10] = [
        ".tar.gz", ".tar.bz2", ".tar.xz", ".tar.zst", ".tgz", ".tbz2", ".txz", ".zip", ".gz",
        ".exe",
    ];
    EXTS.iter()
        .find_map(|ext| asset.strip_suffix(ext))
        .unwrap_or(asset)
}
