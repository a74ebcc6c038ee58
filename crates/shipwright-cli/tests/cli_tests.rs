//! CLI integration tests for the `shipwright` binary.
//!
//! These tests run the binary against generated projects and check output
//! and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use shipwright_core::test_utils::{
    TEST_KEY_ALIAS, TEST_KEY_PASSWORD, TEST_STORE_PASSWORD, TestProject,
};

const APPLICATION_ID: &str = "com.edinky.smartframedev.aurora";

/// Helper to create a command rooted at `project` with a clean environment.
fn shipwright(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("shipwright").expect("binary built");
    cmd.arg("-C").arg(project.root());
    for var in [
        "SHIPWRIGHT_APPLICATION_ID",
        "SHIPWRIGHT_KEY_PROPERTIES",
        "SHIPWRIGHT_TOOLCHAIN",
        "SHIPWRIGHT_OUTPUT_DIR",
        "SHIPWRIGHT_SIGNER",
        "SHIPWRIGHT_STORE_PASSWORD",
        "SHIPWRIGHT_KEY_PASSWORD",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_project_file(project: &TestProject, content: &str) {
    std::fs::write(project.root().join("shipwright.yaml"), content).unwrap();
}

// =============================================================================
// Basic Commands
// =============================================================================

mod basics {
    use super::*;

    #[test]
    fn version_prints_crate_version() {
        let project = TestProject::new();
        shipwright(&project)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains(shipwright_core::VERSION));
    }

    #[test]
    fn missing_application_id_is_usage_error() {
        let project = TestProject::new();
        shipwright(&project)
            .args(["build", "debug"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("application id"));
    }

    #[test]
    fn invalid_project_file_exits_with_config_code() {
        let project = TestProject::new();
        write_project_file(&project, "signer: jarsigner\n");

        shipwright(&project)
            .args(["build", "debug"])
            .assert()
            .code(22);
    }
}

// =============================================================================
// Build Command
// =============================================================================

mod build {
    use super::*;

    #[test]
    fn release_build_succeeds() {
        let project = TestProject::new();
        write_project_file(&project, &format!("application_id: {}\n", APPLICATION_ID));

        shipwright(&project)
            .args(["build", "release"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Signed:   yes"));

        assert!(project.output_dir().join("release/app-release.tar").is_file());
        assert!(project.output_dir().join("release/artifact.json").is_file());
    }

    #[test]
    fn json_output_is_the_artifact_record() {
        let project = TestProject::new();

        let output = shipwright(&project)
            .args(["build", "debug", "--json", "--application-id", APPLICATION_ID])
            .output()
            .unwrap();
        assert!(output.status.success());

        let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(record["variant"], "debug");
        assert_eq!(record["signed"], false);
        assert_eq!(record["sha256"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn malformed_properties_exit_code() {
        let project = TestProject::new();
        project.write_key_properties(&format!(
            "storePassword={}\nkeyPassword={}\nkeyAlias={}\n",
            TEST_STORE_PASSWORD, TEST_KEY_PASSWORD, TEST_KEY_ALIAS
        ));

        shipwright(&project)
            .args(["build", "release", "--application-id", APPLICATION_ID])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("storeFile"));
    }

    #[test]
    fn missing_properties_exit_code() {
        let project = TestProject::new();

        shipwright(&project)
            .args(["build", "release", "--application-id", APPLICATION_ID])
            .arg("--key-properties")
            .arg(project.root().join("missing.properties"))
            .assert()
            .code(10);
    }

    #[test]
    fn missing_keystore_exit_code() {
        let project = TestProject::new();
        std::fs::remove_file(project.root().join("android/app/upload-keystore.jks")).unwrap();

        shipwright(&project)
            .args(["build", "release", "--application-id", APPLICATION_ID])
            .assert()
            .code(12);
        assert!(!project.output_dir().join("release").exists());
    }

    #[test]
    fn invalid_bounds_exit_code() {
        let project = TestProject::new();
        std::fs::write(
            project.toolchain_path(),
            "minSdkVersion: 30\ntargetSdkVersion: 21\ncompileSdkVersion: 34\n",
        )
        .unwrap();

        shipwright(&project)
            .args(["build", "release", "--application-id", APPLICATION_ID])
            .assert()
            .code(20)
            .stderr(predicate::str::contains("minSdk (30)"));
    }

    #[test]
    fn wrong_password_exit_code_hides_password() {
        let project = TestProject::new();
        project.write_key_properties(&format!(
            "storePassword=hunter2-wrong\nkeyPassword={}\nkeyAlias={}\nstoreFile=app/upload-keystore.jks\n",
            TEST_KEY_PASSWORD, TEST_KEY_ALIAS
        ));

        shipwright(&project)
            .args(["build", "release", "--application-id", APPLICATION_ID])
            .assert()
            .code(30)
            .stderr(predicate::str::contains("hunter2-wrong").not());
    }

    #[cfg(unix)]
    #[test]
    fn failing_build_command_exit_code() {
        let project = TestProject::new();

        shipwright(&project)
            .args(["build", "debug", "--application-id", APPLICATION_ID])
            .args(["--build-command", "exit 4", "--artifact-glob", "out/*.apk"])
            .assert()
            .code(31);
    }

    #[cfg(unix)]
    #[test]
    fn build_command_artifact_is_published() {
        let project = TestProject::new();
        write_project_file(
            &project,
            &format!(
                "application_id: {}\ncompiler:\n  command: mkdir -p out && echo apk > out/app.apk\n  artifact_glob: out/*.apk\n",
                APPLICATION_ID
            ),
        );

        shipwright(&project)
            .args(["build", "release"])
            .assert()
            .success();

        assert!(project.output_dir().join("release/app-release.apk").is_file());
    }
}

// =============================================================================
// Check Command
// =============================================================================

mod check {
    use super::*;

    #[test]
    fn valid_release_configuration() {
        let project = TestProject::new();

        shipwright(&project)
            .args(["check", "release", "--application-id", APPLICATION_ID])
            .assert()
            .success()
            .stdout(predicate::str::contains("passwords and alias verified"))
            .stdout(predicate::str::contains("1.2.0 (7)"))
            .stdout(predicate::str::contains(TEST_STORE_PASSWORD).not());

        assert!(!project.output_dir().exists());
    }

    #[test]
    fn release_without_properties_is_missing() {
        let project = TestProject::new();
        std::fs::remove_file(project.key_properties_path()).unwrap();

        shipwright(&project)
            .args(["check", "release", "--application-id", APPLICATION_ID])
            .assert()
            .code(10);
    }

    #[test]
    fn unknown_variant() {
        let project = TestProject::new();

        shipwright(&project)
            .args(["check", "profile", "--application-id", APPLICATION_ID])
            .assert()
            .code(22);
    }
}

// =============================================================================
// Keystore Commands
// =============================================================================

mod keystore {
    use super::*;

    #[test]
    fn inspect_lists_alias() {
        let project = TestProject::new();

        shipwright(&project)
            .arg("inspect-keystore")
            .arg(project.root().join("android/app/upload-keystore.jks"))
            .env("SHIPWRIGHT_STORE_PASSWORD", TEST_STORE_PASSWORD)
            .assert()
            .success()
            .stdout(predicate::str::contains("JKS"))
            .stdout(predicate::str::contains(TEST_KEY_ALIAS))
            .stdout(predicate::str::contains("PrivateKeyEntry"));
    }

    #[test]
    fn inspect_from_key_properties() {
        let project = TestProject::new();

        shipwright(&project)
            .arg("inspect-keystore")
            .arg("--key-properties")
            .arg(project.key_properties_path())
            .assert()
            .success()
            .stdout(predicate::str::contains(TEST_KEY_ALIAS));
    }

    #[test]
    fn inspect_with_wrong_password() {
        let project = TestProject::new();

        shipwright(&project)
            .arg("inspect-keystore")
            .arg(project.root().join("android/app/upload-keystore.jks"))
            .args(["--store-password", "nope"])
            .assert()
            .code(30);
    }

    #[test]
    fn generate_key_properties() {
        let project = TestProject::new();
        let output = project.root().join("signing/key.properties");

        shipwright(&project)
            .arg("key-properties")
            .args(["--alias", TEST_KEY_ALIAS])
            .arg("--store-file")
            .arg(project.root().join("android/app/upload-keystore.jks"))
            .arg("--output")
            .arg(&output)
            .env("SHIPWRIGHT_STORE_PASSWORD", TEST_STORE_PASSWORD)
            .env("SHIPWRIGHT_KEY_PASSWORD", TEST_KEY_PASSWORD)
            .assert()
            .success()
            .stdout(predicate::str::contains(TEST_STORE_PASSWORD).not());

        let credentials = shipwright_core::signing::load(&output).unwrap();
        assert_eq!(credentials.alias(), TEST_KEY_ALIAS);

        // The generated file drives a release build
        shipwright(&project)
            .args(["build", "release", "--application-id", APPLICATION_ID])
            .arg("--key-properties")
            .arg(&output)
            .assert()
            .success();
    }

    #[test]
    fn generate_refuses_to_overwrite() {
        let project = TestProject::new();

        shipwright(&project)
            .arg("key-properties")
            .args(["--alias", TEST_KEY_ALIAS])
            .arg("--store-file")
            .arg(project.root().join("android/app/upload-keystore.jks"))
            .env("SHIPWRIGHT_STORE_PASSWORD", TEST_STORE_PASSWORD)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("--force"));
    }

    #[test]
    fn generate_with_wrong_key_password() {
        let project = TestProject::new();

        shipwright(&project)
            .arg("key-properties")
            .args(["--alias", TEST_KEY_ALIAS, "--force"])
            .arg("--store-file")
            .arg(project.root().join("android/app/upload-keystore.jks"))
            .env("SHIPWRIGHT_STORE_PASSWORD", TEST_STORE_PASSWORD)
            .env("SHIPWRIGHT_KEY_PASSWORD", "wrong")
            .assert()
            .code(30);
    }
}
