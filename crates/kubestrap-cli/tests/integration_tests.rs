//! Integration tests for CLI commands

use std::path::Path;
use std::process::Command;

/// Helper to run kubestrap command
fn kubestrap(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_kubestrap"))
        .args(args)
        .env_remove("RUST_LOG")
        .env("AWS_EC2_METADATA_DISABLED", "true")
        .output()
        .expect("Failed to execute kubestrap")
}

fn write_config(dir: &Path, contents: &str) -> String {
    let path = dir.join("kubestrap.yaml");
    std::fs::write(&path, contents).unwrap();
    path.display().to_string()
}

mod config_command {
    use super::*;

    #[test]
    fn test_prints_defaults() {
        let output = kubestrap(&["config"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("name: k8s"));
        assert!(stdout.contains("region: us-east-1"));
        assert!(stdout.contains("CAPABILITY_NAMED_IAM"));
    }

    #[test]
    fn test_user_file_and_set_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "project:\n  name: acme\ncloudformation:\n  Parameters:\n    NodeCount: 3\n",
        );

        let output = kubestrap(&[
            "config",
            "-c",
            &config,
            "--set",
            "project.environment.region=eu-west-1",
        ]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("name: acme"));
        assert!(stdout.contains("name: dev"));
        assert!(stdout.contains("region: eu-west-1"));
        assert!(stdout.contains("NodeCount: 3"));
    }

    #[test]
    fn test_missing_config_file() {
        let output = kubestrap(&["config", "-c", "/nonexistent/kubestrap.yaml"]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("not found"));
    }

    #[test]
    fn test_invalid_project_name() {
        let output = kubestrap(&["config", "--set", "project.name=Not_Valid"]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("project.name"));
    }
}

mod deploy_command {
    use super::*;

    #[test]
    fn test_invalid_capabilities_abort_before_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "cloudformation:\n  Capabilities:\n    - CAPABILITY_IAM\n    - CAPABILITY_ADMIN\n",
        );

        let output = kubestrap(&["deploy", "-c", &config]);

        assert_eq!(output.status.code(), Some(9));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("CAPABILITY_ADMIN"));
    }

    #[test]
    fn test_bad_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "- not\n- a mapping\n");

        let output = kubestrap(&["deploy", "-c", &config]);
        assert_eq!(output.status.code(), Some(2));
    }
}

mod cli_usage {
    use super::*;

    #[test]
    fn test_help_lists_commands() {
        let output = kubestrap(&["--help"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("deploy"));
        assert!(stdout.contains("config"));
    }

    #[test]
    fn test_unknown_command() {
        let output = kubestrap(&["destroy"]);
        assert!(!output.status.success());
    }
}
