//! Integration tests for the vivo-site binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn site() -> Command {
    let mut cmd = cargo_bin_cmd!("vivo-site");
    cmd.env_remove("RUST_LOG");
    cmd
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        site()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("plans"));
    }

    #[test]
    fn test_version() {
        site().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        site().arg("frobnicate").assert().failure();
    }
}

mod plans {
    use super::*;

    #[test]
    fn test_plans_table() {
        site()
            .arg("plans")
            .assert()
            .success()
            .stdout(predicate::str::contains("Premium"))
            .stdout(predicate::str::contains("$10.000"))
            .stdout(predicate::str::contains("(featured)"))
            .stdout(predicate::str::contains("Básico Anual"));
    }

    #[test]
    fn test_plans_json() {
        let output = site().args(["plans", "--json"]).output().unwrap();
        assert!(output.status.success());
        let plans: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let plans = plans.as_array().unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[2]["period"], "año");
        assert_eq!(plans[2]["price"], 80000);
    }
}

mod database {
    use super::*;

    #[test]
    fn test_init_db_creates_file() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("data").join("site.db");

        site()
            .current_dir(dir.path())
            .args(["init-db", "--db-path"])
            .arg(&db_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Site database initialized"));

        assert!(db_path.exists());
    }

    #[test]
    fn test_init_db_uses_config_path() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("site.toml"),
            "[server]\ndb_path = \"state/custom.db\"\n",
        )
        .unwrap();

        site()
            .current_dir(dir.path())
            .arg("init-db")
            .assert()
            .success();

        assert!(dir.path().join("state/custom.db").exists());
    }
}

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        site()
            .current_dir(dir.path())
            .env_remove("BREVO_SMTP_USER")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No site.toml found"))
            .stdout(predicate::str::contains("[patpass]"))
            .stdout(predicate::str::contains("BREVO_SMTP_USER = not set"));
    }

    #[test]
    fn test_config_init_then_validate() {
        let dir = TempDir::new().unwrap();
        site()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created default configuration"));
        assert!(dir.path().join("site.toml").exists());

        site()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_reports_problems() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[patpass]\nsuccess_rate = 1.5\ncommerce_code = \"\"\n").unwrap();

        site()
            .arg("--config")
            .arg(&path)
            .args(["config", "validate"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("success_rate"))
            .stdout(predicate::str::contains("commerce_code"));
    }

    #[test]
    fn test_serve_refuses_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.toml");
        fs::write(
            &path,
            "[server]\npending_backend = \"memory\"\n[patpass]\nsuccess_rate = nan\n",
        )
        .unwrap();

        site()
            .current_dir(dir.path())
            .arg("--config")
            .arg(&path)
            .args(["serve", "--port", "0"])
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .failure()
            .stderr(predicate::str::contains("success_rate"));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        site()
            .arg("--config")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse site.toml"));
    }
}
