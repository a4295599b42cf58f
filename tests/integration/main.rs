//! Integration tests for smartcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Isolated project, cache root, metrics dir and config file
    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let fixture = Self { dir };
            fs::create_dir_all(fixture.project()).unwrap();
            fixture.write_manifest("build.txt", "a");
            fixture.write_manifest("lock.txt", "b");

            let config = format!(
                r#"
[cache]
manifests = ["build.txt", "lock.txt"]
warm_command = ["sh", "-c", "mkdir -p \"$DEPS_HOME/lib\" && echo jar > \"$DEPS_HOME/lib/dep.jar\""]
warm_env_var = "DEPS_HOME"
lock_timeout_secs = 10

[metrics]
backend = "jsonl"
data_dir = "{}"
"#,
                fixture.path("metrics").display()
            );
            fs::write(fixture.config(), config).unwrap();
            fixture
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn project(&self) -> PathBuf {
            self.path("project")
        }

        fn config(&self) -> PathBuf {
            self.path("config.toml")
        }

        fn entry_dir(&self) -> PathBuf {
            self.path("cache").join("entry")
        }

        /// Point metrics at postgres through a psql binary that does not exist
        fn use_unreachable_postgres(&self, strict_track: bool) {
            let config = fs::read_to_string(self.config()).unwrap().replace(
                "backend = \"jsonl\"",
                &format!(
                    "backend = \"postgres\"\npsql_path = \"smartcache-test-no-such-psql\"\nstrict_track = {strict_track}"
                ),
            );
            fs::write(self.config(), config).unwrap();
        }

        fn write_manifest(&self, name: &str, content: &str) {
            fs::write(self.project().join(name), content).unwrap();
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("smartcache");
            cmd.env("SMARTCACHE_CONFIG", self.config())
                .env_remove("SMARTCACHE_METRICS_BACKEND")
                .env_remove("SMARTCACHE_CACHE_DIR")
                .env_remove("SMARTCACHE_PROJECT_DIR")
                .env_remove("BUILD_ID")
                .arg("--no-local")
                .arg("--project-dir")
                .arg(self.project())
                .arg("--cache-dir")
                .arg(self.path("cache"));
            cmd
        }
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("smartcache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("dependency caching"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("smartcache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("smartcache"));
    }

    #[test]
    fn status_reports_absent() {
        let fx = Fixture::new();
        fx.cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("ABSENT"));
    }

    #[test]
    fn warm_populates_then_is_idempotent() {
        let fx = Fixture::new();
        fx.cmd()
            .arg("warm")
            .assert()
            .success()
            .stdout(predicate::str::contains("Cache warmed"));

        assert!(fx.entry_dir().join("lib").join("dep.jar").exists());
        let metadata = fs::read_to_string(fx.entry_dir().join(".smartcache-entry.json")).unwrap();

        fx.cmd()
            .arg("warm")
            .assert()
            .success()
            .stdout(predicate::str::contains("already present"));

        let after = fs::read_to_string(fx.entry_dir().join(".smartcache-entry.json")).unwrap();
        assert_eq!(metadata, after);

        fx.cmd()
            .args(["status", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"state\": \"PRESENT\""))
            .stdout(predicate::str::contains("\"dependency_count\": 1"));
    }

    #[test]
    fn manifest_change_makes_cache_stale() {
        let fx = Fixture::new();
        fx.cmd().arg("warm").assert().success();

        fx.write_manifest("lock.txt", "c");

        fx.cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("STALE"));

        // Stale entries are evicted without --force
        fx.cmd()
            .arg("invalidate")
            .assert()
            .success()
            .stdout(predicate::str::contains("Evicted STALE entry"));
        assert!(!fx.entry_dir().exists());
    }

    #[test]
    fn status_survives_foreign_metadata() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.entry_dir()).unwrap();
        fs::write(
            fx.entry_dir().join(".smartcache-entry.json"),
            r#"{"fingerprint":"abc","populated_at":"2026-01-01T00:00:00Z","size_bytes":1,"dependency_count":1}"#,
        )
        .unwrap();

        fx.cmd()
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("STALE"));
    }

    #[test]
    fn invalidate_refuses_fresh_entry_without_force() {
        let fx = Fixture::new();
        fx.cmd().arg("warm").assert().success();

        fx.cmd()
            .arg("invalidate")
            .assert()
            .success()
            .stdout(predicate::str::contains("already fresh"));
        assert!(fx.entry_dir().exists());

        fx.cmd()
            .args(["invalidate", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("forced"));
        assert!(!fx.entry_dir().exists());
    }

    #[test]
    fn invalidate_on_absent_is_noop() {
        let fx = Fixture::new();
        for args in [vec!["invalidate"], vec!["invalidate", "--force"]] {
            fx.cmd()
                .args(args)
                .assert()
                .success()
                .stdout(predicate::str::contains("nothing to remove"));
        }
    }

    #[test]
    fn failed_warm_exits_nonzero_and_keeps_state() {
        let fx = Fixture::new();
        let config = fs::read_to_string(fx.config())
            .unwrap()
            .replace("mkdir -p", "exit 3; mkdir -p");
        fs::write(fx.config(), config).unwrap();

        fx.cmd()
            .arg("warm")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
        assert!(!fx.entry_dir().exists());
    }

    #[test]
    fn track_and_analyze_hit_rate() {
        let fx = Fixture::new();
        for (outcome, id) in [("hit", "1"), ("hit", "2"), ("miss", "3")] {
            fx.cmd()
                .args(["track", outcome, "--build-id", id])
                .assert()
                .success();
        }

        fx.cmd()
            .args(["analyze", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"hits\": 2"))
            .stdout(predicate::str::contains("\"misses\": 1"))
            .stdout(predicate::str::contains("\"hit_rate\": 0.666"));
    }

    #[test]
    fn track_tolerates_unreachable_store() {
        let fx = Fixture::new();
        fx.use_unreachable_postgres(false);

        fx.cmd()
            .args(["track", "hit", "--build-id", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not recorded"));
    }

    #[test]
    fn strict_track_fails_on_unreachable_store() {
        let fx = Fixture::new();
        fx.use_unreachable_postgres(true);

        fx.cmd()
            .args(["track", "hit", "--build-id", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Metrics store unavailable"));
    }

    #[test]
    fn analyze_without_events_is_no_data() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["analyze", "--format", "json"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"hit_rate\": null"))
            .stderr(predicate::str::contains("No data"));
    }

    #[test]
    fn resources_without_history_is_no_data() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["resources", "--branch=main"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No data"));
    }

    #[test]
    fn resources_rejects_bad_branch() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["resources", "--branch=../etc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid branch"));
    }

    #[test]
    fn resources_from_recorded_builds() {
        let fx = Fixture::new();
        for i in 0..6 {
            fx.cmd()
                .args([
                    "record-build",
                    "--build-id",
                    &format!("b{i}"),
                    "--branch",
                    "main",
                    "--duration",
                    "300",
                    "--peak-memory",
                    "2000",
                    "--cpu",
                    "2",
                    "--result",
                    "success",
                ])
                .assert()
                .success();
        }

        fx.cmd()
            .args(["resources", "--branch=main", "--format", "env"])
            .assert()
            .success()
            .stdout(predicate::str::contains("BUILD_MEMORY_MB=2432"))
            .stdout(predicate::str::contains("BUILD_CPU_CORES=3"))
            .stdout(predicate::str::contains("RECOMMENDATION_CONFIDENCE=medium"));

        let out = fx.path("out").join("rec.json");
        fx.cmd()
            .args(["resources", "--branch=main", "--output"])
            .arg(&out)
            .assert()
            .success();
        let written = fs::read_to_string(&out).unwrap();
        assert!(written.contains("\"memory_mb\": 2432"));
    }

    #[test]
    fn completions_generate() {
        cargo_bin_cmd!("smartcache")
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("smartcache"));
    }

    #[test]
    fn config_show_merges_file() {
        let fx = Fixture::new();
        fx.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("warm_env_var = \"DEPS_HOME\""));
    }
}
