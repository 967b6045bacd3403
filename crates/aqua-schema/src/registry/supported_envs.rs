//! `supported_envs` matching and normalization.

use crate::runtime::Runtime;

/// Elements are `all`, a bare OS, a bare arch, or `os/arch`.
pub type SupportedEnvs = Vec<String>;

/// Whether any element of `envs` names `rt`.
pub fn matches_runtime(envs: &[String], rt: &Runtime) -> bool {
    let env = rt.env();
    envs.iter()
        .any(|e| e == "all" || *e == rt.goos || *e == rt.goarch || *e == env)
}

/// Canonicalize a generated `supported_envs` list.
///
/// `None` means every environment is supported. Lists that do not
/// correspond to one of the known shapes pass through unchanged.
///
/// ```
/// use aqua_schema::registry::normalize_supported_envs;
///
/// let envs = vec!["linux".to_string(), "darwin".to_string(), "windows".to_string()];
/// assert_eq!(normalize_supported_envs(envs), None);
/// ```
pub fn normalize_supported_envs(envs: SupportedEnvs) -> Option<SupportedEnvs> {
    let mut sorted: Vec<&str> = envs.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    match sorted.as_slice() {
        ["darwin", "linux", "windows"] | ["all"] => None,
        ["darwin", "linux", "windows/amd64"] => Some(vec![
            "darwin".to_string(),
            "linux".to_string(),
            "amd64".to_string(),
        ]),
        ["darwin", "linux/amd64", "windows/amd64"] => {
            Some(vec!["darwin".to_string(), "amd64".to_string()])
        }
        _ => Some(envs),
    }
}
