//! Integration tests for kiln

mod fixture {
    use std::path::Path;
    use tempfile::TempDir;

    /// A two-package workspace: `mjl` (lexer) and `mjp` (parser, depends on
    /// `mjl`), both depending on a consistent `workspace-hack`
    pub struct Fixture {
        pub dir: TempDir,
    }

    impl Fixture {
        pub fn new() -> Self {
            let fixture = Self {
                dir: TempDir::new().unwrap(),
            };
            fixture.write(
                "Cargo.toml",
                "[workspace]\nresolver = \"2\"\nmembers = [\"crates/*\"]\n",
            );
            fixture.write("Cargo.lock", "version = 3\n");
            for (name, version, extra) in [
                ("mjl", "0.1.0", ""),
                ("mjp", "0.2.0", "mjl = { path = \"../mjl\" }\n"),
            ] {
                fixture.write(
                    &format!("crates/{name}/Cargo.toml"),
                    &format!(
                        "[package]\nname = \"{name}\"\nversion = \"{version}\"\nedition = \"2021\"\n\n\
                         [dependencies]\n{extra}serde = {{ version = \"1\", features = [\"derive\"] }}\n\
                         workspace-hack = {{ version = \"0.1\", path = \"../workspace-hack\" }}\n"
                    ),
                );
                fixture.write(&format!("crates/{name}/src/lib.rs"), "pub fn run() {}\n");
            }
            fixture.write(
                "crates/workspace-hack/Cargo.toml",
                "[package]\nname = \"workspace-hack\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n\
                 [dependencies]\nserde = { version = \"1\", features = [\"derive\"] }\n",
            );
            fixture.write("crates/workspace-hack/src/lib.rs", "");
            fixture
        }

        pub fn path(&self) -> &Path {
            self.dir.path()
        }

        pub fn write(&self, rel: &str, content: &str) {
            let path = self.dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
    }
}

mod cli_tests {
    use crate::fixture::Fixture;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Isolated from the user's config, state and cache directories
    struct Env {
        home: TempDir,
    }

    impl Env {
        fn new() -> Self {
            let home = TempDir::new().unwrap();
            let config = home.path().join("config.toml");
            std::fs::write(
                &config,
                format!(
                    "[general]\nrun_log = false\n\n[cache]\ndir = \"{}\"\n",
                    home.path().join("cache").display()
                ),
            )
            .unwrap();
            Self { home }
        }

        fn kiln(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("kiln");
            cmd.env("HOME", self.home.path())
                .env("XDG_STATE_HOME", self.home.path().join("state"))
                .env("XDG_CACHE_HOME", self.home.path().join("cache"))
                .env("KILN_CONFIG", self.home.path().join("config.toml"))
                .env_remove("KILN_ROOT")
                .env_remove("KILN_CHECKS")
                .arg("--no-local");
            cmd
        }
    }

    #[test]
    fn help_displays() {
        Env::new()
            .kiln()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("incremental builds and checks"));
    }

    #[test]
    fn version_displays() {
        Env::new()
            .kiln()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn completions_generate() {
        Env::new()
            .kiln()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn config_path_honors_override() {
        let env = Env::new();
        env.kiln()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        Env::new()
            .kiln()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[checks]"))
            .stdout(predicate::str::contains("run_log = false"));
    }

    #[test]
    fn plan_reports_declared_dependencies() {
        let ws = Fixture::new();
        let output = Env::new()
            .kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["--format", "json", "plan", "mjp"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let plan: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(plan["package"], "mjp");
        assert_eq!(plan["declared"], serde_json::json!(["mjl"]));
        let files: Vec<&str> = plan["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f.as_str().unwrap())
            .collect();
        assert!(files.contains(&"crates/mjl/src/lib.rs"));
        assert!(!files.iter().any(|f| f.starts_with("crates/workspace-hack/src")));
    }

    #[test]
    fn plan_unknown_package_fails() {
        let ws = Fixture::new();
        Env::new()
            .kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["plan", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Package not found"));
    }

    #[test]
    fn hakari_verify_passes_on_consistent_workspace() {
        let ws = Fixture::new();
        Env::new()
            .kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["hakari", "verify"])
            .assert()
            .success()
            .stdout(predicate::str::contains("up to date"));
    }

    #[test]
    fn hakari_generate_repairs_drift() {
        let ws = Fixture::new();
        ws.write(
            "crates/workspace-hack/Cargo.toml",
            "[package]\nname = \"workspace-hack\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n\
             [dependencies]\nserde = \"1\"\n",
        );
        let env = Env::new();

        env.kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["hakari", "verify"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("+serde"))
            .stderr(predicate::str::contains("kiln hakari generate"));

        env.kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["hakari", "generate"])
            .assert()
            .success();

        env.kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["hakari", "verify"])
            .assert()
            .success();
    }

    #[test]
    fn check_list_shows_every_check() {
        let ws = Fixture::new();
        Env::new()
            .kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["check", "--list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("clippy"))
            .stdout(predicate::str::contains("toml-fmt"))
            .stdout(predicate::str::contains("nextest"));
    }

    #[test]
    fn unknown_check_is_rejected() {
        let ws = Fixture::new();
        Env::new()
            .kiln()
            .arg("--root")
            .arg(ws.path())
            .args(["check", "lint"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown check: lint"));
    }

    #[test]
    fn build_outside_workspace_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        Env::new()
            .kiln()
            .current_dir(dir.path())
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No Cargo workspace found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn cache_list_empty() {
        Env::new()
            .kiln()
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No artifacts"));
    }
}

mod orchestration_tests {
    use crate::fixture::Fixture;
    use async_trait::async_trait;
    use kiln::build::{BuildPlan, PackageBuilder};
    use kiln::cache::{ArtifactStore, CommonBuildConfig, DependencyCache};
    use kiln::checks::{CheckKind, CheckSuite};
    use kiln::config::Config;
    use kiln::runner::{Invocation, StepOutput, StepRunner};
    use kiln::workspace::Workspace;
    use kiln::KilnResult;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    /// Stands in for cargo and its subcommands
    ///
    /// `build -p NAME` writes `NAME` into the profile directory of
    /// `CARGO_TARGET_DIR`; `fmt -- --check` fails when a Rust file under the
    /// working directory has trailing whitespace. Everything else, taplo
    /// included, succeeds.
    #[derive(Default)]
    struct FakeCargo {
        calls: Mutex<Vec<Invocation>>,
    }

    impl FakeCargo {
        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Invocation) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }

        fn unformatted_files(root: &Path) -> Vec<String> {
            WalkDir::new(root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|x| x == "rs"))
                .filter(|e| {
                    std::fs::read_to_string(e.path())
                        .map(|s| s.lines().any(|l| l.ends_with(' ')))
                        .unwrap_or(false)
                })
                .map(|e| e.path().display().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl StepRunner for FakeCargo {
        async fn run(
            &self,
            invocation: &Invocation,
            on_output: &(dyn Fn(String) + Send + Sync),
        ) -> KilnResult<StepOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            let mut code = 0;
            let mut lines = Vec::new();

            let is_cargo = invocation.program == "cargo";
            if is_cargo && invocation.has_arg("fmt") && invocation.has_arg("--check") {
                for file in Self::unformatted_files(&invocation.cwd) {
                    lines.push(format!("Diff in {}", file));
                    code = 1;
                }
            } else if invocation.has_arg("build") && invocation.has_arg("-p") {
                let idx = invocation.args.iter().position(|a| a == "-p").unwrap();
                let package = &invocation.args[idx + 1];
                let profile = Path::new(&invocation.env["CARGO_TARGET_DIR"]).join("release");
                std::fs::create_dir_all(&profile).unwrap();
                std::fs::write(profile.join(package), b"\x7fELF").unwrap();
                lines.push(format!("   Compiling {} v0.1.0", package));
            }

            for line in &lines {
                on_output(line.clone());
            }
            Ok(StepOutput {
                code: Some(code),
                lines,
                duration: Duration::from_millis(1),
            })
        }

        async fn run_interactive(&self, _invocation: &Invocation) -> KilnResult<i32> {
            Ok(0)
        }

        async fn is_available(&self, _invocation: &Invocation) -> bool {
            true
        }

        fn runner_name(&self) -> &'static str {
            "fake-cargo"
        }
    }

    struct Harness {
        ws: Fixture,
        _store_dir: TempDir,
        store: ArtifactStore,
        config: Config,
        runner: Arc<FakeCargo>,
    }

    impl Harness {
        fn new() -> Self {
            let store_dir = TempDir::new().unwrap();
            let store = ArtifactStore::open(store_dir.path()).unwrap();
            Self {
                ws: Fixture::new(),
                _store_dir: store_dir,
                store,
                config: Config::default(),
                runner: Arc::new(FakeCargo::default()),
            }
        }

        fn load(&self) -> (Workspace, CommonBuildConfig) {
            let workspace = Workspace::load(self.ws.path(), "workspace-hack").unwrap();
            let common =
                CommonBuildConfig::from_workspace(&workspace, &self.config.build, "test").unwrap();
            (workspace, common)
        }

        fn deps(&self) -> DependencyCache {
            DependencyCache::new(self.store.clone(), self.runner.clone())
        }
    }

    fn is_deps_build(inv: &Invocation) -> bool {
        inv.has_arg("--all-targets") && inv.has_arg("build")
    }

    fn is_package_build(inv: &Invocation) -> bool {
        inv.has_arg("build") && inv.has_arg("-p")
    }

    #[tokio::test]
    async fn two_package_workspace_end_to_end() {
        let h = Harness::new();
        let (workspace, common) = h.load();
        let deps = h.deps();
        let builder = PackageBuilder::new(&workspace, &h.config, &common, &deps);

        let names = vec!["mjl".to_string(), "mjp".to_string()];
        let results = builder.build_many(&names).await;

        for (name, result) in &results {
            let outcome = result.as_ref().unwrap();
            assert!(!outcome.cache_hit);
            assert!(outcome.output_dir.join(name).is_file());
        }
        assert_eq!(deps.builds_executed(), 1);
        assert_eq!(h.runner.count(is_deps_build), 1);
        assert_eq!(h.runner.count(is_package_build), 2);

        // Package builds run in scratch copies, never in the workspace
        let mjp = h
            .runner
            .calls()
            .into_iter()
            .find(|c| is_package_build(c) && c.has_arg("mjp"))
            .unwrap();
        assert!(!mjp.cwd.starts_with(h.ws.path()));
    }

    #[tokio::test]
    async fn unchanged_inputs_are_cache_hits() {
        let h = Harness::new();
        let (workspace, common) = h.load();

        let first = {
            let deps = h.deps();
            let builder = PackageBuilder::new(&workspace, &h.config, &common, &deps);
            builder.build("mjp").await.unwrap()
        };
        let calls_after_first = h.runner.calls().len();

        // A fresh process: new memo, same store
        let deps = h.deps();
        let builder = PackageBuilder::new(&workspace, &h.config, &common, &deps);
        let second = builder.build("mjp").await.unwrap();

        assert!(second.cache_hit);
        assert_eq!(second.key, first.key);
        assert_eq!(h.runner.calls().len(), calls_after_first);
        assert_eq!(deps.builds_executed(), 0);
    }

    #[tokio::test]
    async fn dependency_change_invalidates_only_dependents() {
        let h = Harness::new();
        let (workspace, common) = h.load();
        let before_mjl = BuildPlan::new(&workspace, &h.config, &common, "mjl").unwrap();
        let before_mjp = BuildPlan::new(&workspace, &h.config, &common, "mjp").unwrap();

        h.ws.write("crates/mjl/src/lib.rs", "pub fn run() { let _ = 1; }\n");
        let after_mjl = BuildPlan::new(&workspace, &h.config, &common, "mjl").unwrap();
        let after_mjp = BuildPlan::new(&workspace, &h.config, &common, "mjp").unwrap();
        assert_ne!(before_mjl.key, after_mjl.key);
        assert_ne!(before_mjp.key, after_mjp.key);

        h.ws.write("crates/mjp/src/lib.rs", "pub fn run() { let _ = 2; }\n");
        let final_mjl = BuildPlan::new(&workspace, &h.config, &common, "mjl").unwrap();
        assert_eq!(after_mjl.key, final_mjl.key);
    }

    #[tokio::test]
    async fn unformatted_file_fails_only_fmt() {
        let h = Harness::new();
        h.ws.write("crates/mjp/src/lib.rs", "pub fn run() {} \n");
        let (workspace, common) = h.load();
        let deps = h.deps();

        let report = CheckSuite::new(&workspace, &h.config, &common, &deps)
            .run(&CheckKind::ALL)
            .await;

        assert_eq!(report.results.len(), CheckKind::ALL.len());
        let failed: Vec<CheckKind> = report.failed().iter().map(|r| r.kind).collect();
        assert_eq!(failed, vec![CheckKind::Fmt]);
        let fmt = report.get(CheckKind::Fmt).unwrap();
        assert!(fmt.log.iter().any(|l| l.contains("mjp")));
        assert_eq!(deps.builds_executed(), 1);
    }

    #[tokio::test]
    async fn clean_workspace_passes_every_check() {
        let h = Harness::new();
        let (workspace, common) = h.load();
        let deps = h.deps();

        let report = CheckSuite::new(&workspace, &h.config, &common, &deps)
            .run(&CheckKind::ALL)
            .await;

        assert!(report.passed(), "{:?}", report.failed());
    }
}
