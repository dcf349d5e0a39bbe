//! Build planning: source set, declared dependencies and build key

use crate::cache::{CommonBuildConfig, Fingerprint};
use crate::config::Config;
use crate::error::KilnResult;
use crate::workspace::{MinimalSourceSet, SourceSetResolver, Workspace};
use serde::Serialize;
use std::path::PathBuf;

/// Everything that identifies one package build
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub package: String,
    pub version: String,
    /// Content key of the build
    pub key: String,
    /// Key of the dependency artifact the build consumes
    pub config_key: String,
    /// Declared intra-workspace dependencies
    pub declared: Vec<String>,
    /// Real dependencies missing from `declared`
    pub undeclared: Vec<String>,
    /// Extra `cargo build` arguments
    pub build_args: Vec<String>,
    /// Files of the minimal source set
    pub files: Vec<PathBuf>,
    #[serde(skip)]
    pub source_set: MinimalSourceSet,
}

impl BuildPlan {
    /// Plan the build of `name`
    pub fn new(
        workspace: &Workspace,
        config: &Config,
        common: &CommonBuildConfig,
        name: &str,
    ) -> KilnResult<Self> {
        let package = workspace.package(name)?;
        let resolver = SourceSetResolver::new(workspace);
        let declared = resolver.declared_dependencies(name, config)?;
        let undeclared = resolver.undeclared_dependencies(name, &declared)?;
        let source_set = resolver.resolve(name, &declared)?;
        let build_args = config.package(name).build_args;
        let config_key = common.key();

        let mut fp = Fingerprint::new("package-build");
        fp.field("sources", &source_set.fingerprint(workspace.root())?)
            .field("config", config_key.as_str())
            .field("name", &package.name)
            .field("version", &package.version.to_string());
        for arg in &build_args {
            fp.field("arg", arg);
        }

        Ok(Self {
            package: package.name.clone(),
            version: package.version.to_string(),
            key: fp.finish_short(),
            config_key: config_key.to_string(),
            declared,
            undeclared,
            build_args,
            files: source_set.files.iter().cloned().collect(),
            source_set,
        })
    }

    /// `name@version`
    pub fn label(&self) -> String {
        format!("{}@{}", self.package, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::workspace::testing::WorkspaceFixture;

    fn plan(fixture: &WorkspaceFixture, config: &Config, name: &str) -> BuildPlan {
        let ws = Workspace::load(fixture.path(), "workspace-hack").unwrap();
        let common = CommonBuildConfig::from_workspace(&ws, &BuildConfig::default(), "t").unwrap();
        BuildPlan::new(&ws, config, &common, name).unwrap()
    }

    #[test]
    fn key_changes_with_own_sources_only() {
        let fixture = WorkspaceFixture::two_packages();
        let config = Config::default();
        let mjl = plan(&fixture, &config, "mjl").key;
        let mjp = plan(&fixture, &config, "mjp").key;

        fixture.write("crates/mjp/src/lib.rs", "pub fn parse() -> u8 { 1 }\n");
        assert_eq!(plan(&fixture, &config, "mjl").key, mjl);
        assert_ne!(plan(&fixture, &config, "mjp").key, mjp);
    }

    #[test]
    fn dependency_edit_invalidates_dependent() {
        let fixture = WorkspaceFixture::two_packages();
        let config = Config::default();
        let mjp = plan(&fixture, &config, "mjp").key;

        fixture.write("crates/mjl/src/token.rs", "pub enum Token { Colon }\n");
        assert_ne!(plan(&fixture, &config, "mjp").key, mjp);
    }

    #[test]
    fn build_args_are_part_of_the_key() {
        let fixture = WorkspaceFixture::two_packages();
        let plain = plan(&fixture, &Config::default(), "mjl");
        let config: Config =
            toml::from_str("[packages.mjl]\nbuild_args = [\"--features\", \"simd\"]\n").unwrap();
        let featured = plan(&fixture, &config, "mjl");

        assert_ne!(plain.key, featured.key);
        assert_eq!(featured.build_args, vec!["--features", "simd"]);
    }

    #[test]
    fn undeclared_dependencies_are_reported() {
        let fixture = WorkspaceFixture::two_packages();
        let config: Config = toml::from_str("[packages.mjp]\ndeps = []\n").unwrap();
        let plan = plan(&fixture, &config, "mjp");

        assert!(plan.declared.is_empty());
        assert_eq!(plan.undeclared, vec!["mjl"]);
        assert_eq!(plan.label(), "mjp@0.2.0");
    }
}
