//! Well-known variable names and macro delimiters.

/// Opening delimiter of a variable macro: `$(name)`.
pub const MACRO_PREFIX: &str = "$(";

/// Closing delimiter of a variable macro.
pub const MACRO_SUFFIX: &str = ")";

/// Maximum nesting of macro references resolved for a single variable.
pub const MAX_DEPTH: usize = 50;

/// Current job outcome, kept up to date by the step runner.
pub const AGENT_JOB_STATUS: &str = "Agent.JobStatus";

/// When `true`, read-only and reserved system variables reject overwrites
/// coming from logging commands.
pub const AGENT_READ_ONLY_VARIABLES: &str = "agent.readOnlyVariables";

/// Enables debug-level step output.
pub const SYSTEM_DEBUG: &str = "system.debug";

/// Default working directory for script steps.
pub const SYSTEM_DEFAULT_WORKING_DIRECTORY: &str = "System.DefaultWorkingDirectory";

pub const SYSTEM_JOB_NAME: &str = "System.JobName";

/// Prefixes under which system variables live.
pub const RESERVED_PREFIXES: &[&str] = &["system.", "build.", "agent."];

/// System variables that are always read-only when read-only enforcement
/// is enabled, regardless of how they were set.
pub const RESERVED_VARIABLES: &[&str] = &[
    AGENT_JOB_STATUS,
    AGENT_READ_ONLY_VARIABLES,
    "Agent.BuildDirectory",
    "Agent.HomeDirectory",
    "Agent.Id",
    "Agent.Name",
    "Agent.OS",
    "Agent.TempDirectory",
    "Agent.WorkFolder",
    "Build.BuildId",
    "Build.BuildNumber",
    "Build.SourceBranch",
    "Build.SourceVersion",
    "Build.SourcesDirectory",
    "Build.ArtifactStagingDirectory",
    SYSTEM_DEBUG,
    SYSTEM_DEFAULT_WORKING_DIRECTORY,
    SYSTEM_JOB_NAME,
    "System.JobId",
    "System.TeamProject",
    "System.AccessToken",
];

/// Check whether `name` is one of the reserved system variables.
pub fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED_PREFIXES.iter().any(|p| lower.starts_with(p))
        && RESERVED_VARIABLES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Convert a variable name to the environment variable a child process sees.
///
/// `Build.SourcesDirectory` becomes `BUILD_SOURCESDIRECTORY`.
pub fn to_env_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '.' | ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_match_case_insensitively() {
        assert!(is_reserved("agent.jobstatus"));
        assert!(is_reserved("BUILD.SOURCEVERSION"));
        assert!(!is_reserved("build.custom"));
        assert!(!is_reserved("configuration"));
    }

    #[test]
    fn env_names_are_upper_snake() {
        assert_eq!(to_env_name("Build.SourcesDirectory"), "BUILD_SOURCESDIRECTORY");
        assert_eq!(to_env_name("my var-name"), "MY_VAR_NAME");
    }
}
