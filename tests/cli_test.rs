//! Integration tests for the stepworker binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_job(content: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("job.yml"), content).unwrap();
    temp
}

fn stepworker() -> Command {
    Command::new(cargo_bin("stepworker"))
}

const DELAY_JOB: &str = r#"
name: smoke
steps:
  - task: Delay@1
    displayName: Short wait
    inputs:
      delayForSeconds: "0"
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    stepworker()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    stepworker()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_requires_a_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    stepworker().assert().failure().code(2);
    Ok(())
}

#[test]
fn run_succeeds_and_prints_summary() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job(DELAY_JOB);
    stepworker()
        .current_dir(temp.path())
        .args(["run", "job.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Short wait"))
        .stdout(predicate::str::contains("Job 'smoke' finished: Succeeded"));
    Ok(())
}

#[test]
fn quiet_run_prints_only_the_job_line() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job(DELAY_JOB);
    stepworker()
        .current_dir(temp.path())
        .args(["run", "job.yml", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Short wait").not())
        .stdout(predicate::str::contains("finished: Succeeded"));
    Ok(())
}

#[test]
fn run_missing_file_is_a_config_error() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    stepworker()
        .current_dir(temp.path())
        .args(["run", "nope.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
    Ok(())
}

#[test]
fn run_rejects_bad_var_syntax() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job(DELAY_JOB);
    stepworker()
        .current_dir(temp.path())
        .args(["run", "job.yml", "--var", "novalue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NAME=VALUE"));
    Ok(())
}

#[test]
fn validate_reports_problems() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job("steps:\n  - displayName: empty\n");
    stepworker()
        .current_dir(temp.path())
        .args(["validate", "job.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing-kind"));
    Ok(())
}

#[test]
fn validate_accepts_good_job() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_job(DELAY_JOB);
    stepworker()
        .current_dir(temp.path())
        .args(["validate", "job.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
    Ok(())
}

#[cfg(unix)]
mod scripts {
    use super::*;

    #[test]
    fn failing_script_exits_one() -> Result<(), Box<dyn std::error::Error>> {
        let temp = setup_job("steps:\n  - script: exit 3\n    displayName: Broken\n");
        stepworker()
            .current_dir(temp.path())
            .args(["run", "job.yml"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("[FAIL] Broken"));
        Ok(())
    }

    #[test]
    fn continue_on_error_exits_zero() -> Result<(), Box<dyn std::error::Error>> {
        let temp = setup_job(
            "steps:\n  - script: exit 1\n    continueOnError: true\n  - script: echo after\n    condition: succeeded()\n",
        );
        stepworker()
            .current_dir(temp.path())
            .args(["run", "job.yml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("finished: SucceededWithIssues"));
        Ok(())
    }

    #[test]
    fn vars_reach_the_script() -> Result<(), Box<dyn std::error::Error>> {
        let temp = setup_job(
            "steps:\n  - script: test \"$(target)\" = prod\n    displayName: Check target\n",
        );
        stepworker()
            .current_dir(temp.path())
            .args(["run", "job.yml", "--var", "target=prod"])
            .assert()
            .success();
        Ok(())
    }

    #[test]
    fn secrets_are_masked_in_log_output() -> Result<(), Box<dyn std::error::Error>> {
        let temp = setup_job("steps:\n  - script: echo \"token=$(token)\"\n");
        stepworker()
            .current_dir(temp.path())
            .args(["run", "job.yml", "--secret", "token=hunter2hunter2"])
            .assert()
            .success()
            .stderr(predicate::str::contains("token=***"))
            .stderr(predicate::str::contains("hunter2hunter2").not());
        Ok(())
    }

    #[test]
    fn logging_command_sets_a_variable_for_later_steps() -> Result<(), Box<dyn std::error::Error>> {
        let temp = setup_job(
            r###"
steps:
  - script: echo "##vso[task.setvariable variable=stage]deploy"
  - script: echo skipped
    displayName: Gated
    condition: eq(variables['stage'], 'deploy')
"###,
        );
        stepworker()
            .current_dir(temp.path())
            .args(["run", "job.yml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[ok] Gated"));
        Ok(())
    }
}
