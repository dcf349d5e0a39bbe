//! Shared-dependency ("workspace-hack") consistency
//!
//! The canonical hack manifest lists every external normal and build
//! dependency of every other member, with the union of the features they
//! enable. `default-features` stays on if any member keeps it on. Optional
//! and non-member path dependencies are not unified.

use crate::error::{KilnError, KilnResult};
use crate::workspace::{DependencySource, ResolvedDependency, Workspace, MANIFEST_NAME};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use tracing::{debug, info, warn};

/// What the hack package must declare for one external dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HackRequirement {
    pub version_req: Option<String>,
    /// Git or registry source, shared by every member using the dependency
    pub source: DependencySource,
    pub features: BTreeSet<String>,
    pub default_features: bool,
}

impl HackRequirement {
    fn from_dependency(dep: &ResolvedDependency) -> Self {
        Self {
            version_req: None,
            source: dep.source.clone(),
            features: BTreeSet::new(),
            default_features: false,
        }
    }

    fn merge(&mut self, dep: &ResolvedDependency) {
        if dep.source != self.source {
            // Cargo treats differently sourced crates as distinct packages
            warn!(
                "{} is used from both {} and {}; keeping {}",
                dep.name, self.source, dep.source, self.source
            );
        }
        self.features.extend(dep.features.iter().cloned());
        self.default_features |= dep.default_features;
        if let Some(req) = dep.version_req.as_deref() {
            let replace = match &self.version_req {
                None => true,
                // Prefer the most specific requirement
                Some(current) => (req.len(), req) > (current.len(), current.as_str()),
            };
            if replace {
                self.version_req = Some(req.to_string());
            }
        }
    }

    /// Inline TOML rendering, e.g. `{ version = "1", features = ["std"] }`
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some(v) = &self.version_req {
            parts.push(format!("version = \"{}\"", v));
        }
        for (key, value) in self.source.entries() {
            parts.push(format!("{} = \"{}\"", key, value));
        }
        if !self.default_features {
            parts.push("default-features = false".to_string());
        }
        if !self.features.is_empty() {
            let quoted: Vec<String> = self.features.iter().map(|f| format!("\"{}\"", f)).collect();
            parts.push(format!("features = [{}]", quoted.join(", ")));
        }
        format!("{{ {} }}", parts.join(", "))
    }
}

/// One way the hack manifest differs from the canonical regeneration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Drift {
    MissingDependency { name: String },
    ExtraDependency { name: String },
    MissingFeatures { name: String, features: Vec<String> },
    ExtraFeatures { name: String, features: Vec<String> },
    DefaultFeatures { name: String, expected: bool, actual: bool },
    Source { name: String, expected: String, actual: String },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDependency { name } => write!(f, "{} is missing", name),
            Self::ExtraDependency { name } => write!(f, "{} is not used by any member", name),
            Self::MissingFeatures { name, features } => {
                write!(f, "{} lacks features {}", name, features.join(", "))
            }
            Self::ExtraFeatures { name, features } => {
                write!(f, "{} enables unused features {}", name, features.join(", "))
            }
            Self::DefaultFeatures {
                name,
                expected,
                actual,
            } => write!(
                f,
                "{} has default-features = {} but members need {}",
                name, actual, expected
            ),
            Self::Source {
                name,
                expected,
                actual,
            } => write!(f, "{} comes from {} but members use {}", name, actual, expected),
        }
    }
}

/// Result of comparing the hack package with the canonical regeneration
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub hack_package: String,
    pub drift: Vec<Drift>,
    /// Members that do not depend on the hack package
    pub missing_dependents: Vec<String>,
    #[serde(skip)]
    canonical: BTreeMap<String, HackRequirement>,
    #[serde(skip)]
    declared: BTreeMap<String, HackRequirement>,
}

impl ConsistencyReport {
    /// Pass iff no drift and every member depends on the hack package
    pub fn passed(&self) -> bool {
        self.drift.is_empty() && self.missing_dependents.is_empty()
    }

    /// Actionable diff: `-` current line, `+` canonical line
    pub fn render_diff(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let names: BTreeSet<&String> = self.canonical.keys().chain(self.declared.keys()).collect();
        for name in names {
            let current = self.declared.get(name);
            let wanted = self.canonical.get(name);
            if current == wanted {
                continue;
            }
            if let Some(req) = current {
                lines.push(format!("-{} = {}", name, req.render()));
            }
            if let Some(req) = wanted {
                lines.push(format!("+{} = {}", name, req.render()));
            }
        }
        for member in &self.missing_dependents {
            lines.push(format!(
                "! {} does not depend on {}",
                member, self.hack_package
            ));
        }
        lines
    }
}

/// Canonical dependency table of the hack package
pub fn canonical(workspace: &Workspace) -> BTreeMap<String, HackRequirement> {
    let mut canonical: BTreeMap<String, HackRequirement> = BTreeMap::new();
    for package in workspace.buildable() {
        for dep in &package.dependencies {
            if !dep.kind.is_compile() || dep.optional || dep.path.is_some() {
                continue;
            }
            if workspace.contains(&dep.name) {
                continue;
            }
            canonical
                .entry(dep.name.clone())
                .or_insert_with(|| HackRequirement::from_dependency(dep))
                .merge(dep);
        }
    }
    canonical
}

fn declared(workspace: &Workspace) -> KilnResult<BTreeMap<String, HackRequirement>> {
    let hack = workspace.hack()?;
    let mut declared: BTreeMap<String, HackRequirement> = BTreeMap::new();
    for dep in hack.dependencies.iter().filter(|d| d.kind.is_compile()) {
        declared
            .entry(dep.name.clone())
            .or_insert_with(|| HackRequirement::from_dependency(dep))
            .merge(dep);
    }
    Ok(declared)
}

/// Compare the hack package with its canonical regeneration
pub fn verify(workspace: &Workspace) -> KilnResult<ConsistencyReport> {
    let canonical = canonical(workspace);
    let declared = declared(workspace)?;
    let mut drift = Vec::new();

    for (name, wanted) in &canonical {
        let Some(current) = declared.get(name) else {
            drift.push(Drift::MissingDependency { name: name.clone() });
            continue;
        };
        let missing: Vec<String> = wanted.features.difference(&current.features).cloned().collect();
        if !missing.is_empty() {
            drift.push(Drift::MissingFeatures {
                name: name.clone(),
                features: missing,
            });
        }
        let extra: Vec<String> = current.features.difference(&wanted.features).cloned().collect();
        if !extra.is_empty() {
            drift.push(Drift::ExtraFeatures {
                name: name.clone(),
                features: extra,
            });
        }
        if wanted.source != current.source {
            drift.push(Drift::Source {
                name: name.clone(),
                expected: wanted.source.to_string(),
                actual: current.source.to_string(),
            });
        }
        if wanted.default_features != current.default_features {
            drift.push(Drift::DefaultFeatures {
                name: name.clone(),
                expected: wanted.default_features,
                actual: current.default_features,
            });
        }
    }
    for name in declared.keys().filter(|n| !canonical.contains_key(*n)) {
        drift.push(Drift::ExtraDependency { name: name.clone() });
    }

    let hack_name = workspace.hack_name();
    let mut missing_dependents = Vec::new();
    for package in workspace.buildable() {
        if !workspace
            .workspace_dependencies(&package.name, false)?
            .contains(hack_name)
        {
            missing_dependents.push(package.name.clone());
        }
    }

    debug!(
        "Consistency: {} drift entries, {} members missing {}",
        drift.len(),
        missing_dependents.len(),
        hack_name
    );
    Ok(ConsistencyReport {
        hack_package: hack_name.to_string(),
        drift,
        missing_dependents,
        canonical,
        declared,
    })
}

/// Rewrite the hack manifest's `[dependencies]` to the canonical regeneration
///
/// Everything else in the manifest (comments, other tables) is preserved.
/// Returns whether the file changed.
pub fn generate(workspace: &Workspace) -> KilnResult<bool> {
    let hack = workspace.hack()?;
    let path = workspace.root().join(&hack.dir).join(MANIFEST_NAME);
    let original = fs::read_to_string(&path)
        .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
    let mut doc: toml_edit::DocumentMut = original.parse()?;

    let mut entries = Vec::new();
    for (name, req) in canonical(workspace) {
        let mut table = toml_edit::InlineTable::new();
        if let Some(v) = &req.version_req {
            table.insert("version", v.as_str().into());
        }
        for (key, value) in req.source.entries() {
            table.insert(key, value.into());
        }
        if !req.default_features {
            table.insert("default-features", false.into());
        }
        if !req.features.is_empty() {
            let features: toml_edit::Array = req.features.iter().map(String::as_str).collect();
            table.insert("features", features.into());
        }
        entries.push((name, toml_edit::value(table)));
    }

    match doc.get_mut("dependencies").and_then(toml_edit::Item::as_table_mut) {
        Some(deps) => {
            deps.clear();
            for (name, item) in entries {
                deps.insert(&name, item);
            }
        }
        None => {
            let mut deps = toml_edit::Table::new();
            for (name, item) in entries {
                deps.insert(&name, item);
            }
            doc.insert("dependencies", toml_edit::Item::Table(deps));
        }
    }

    let updated = doc.to_string();
    if updated == original {
        return Ok(false);
    }
    fs::write(&path, updated).map_err(|e| KilnError::io(format!("writing {}", path.display()), e))?;
    info!("Regenerated {}", path.display());
    Ok(true)
}
