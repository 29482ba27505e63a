//! MSBuild project cracking
//!
//! Reads the handful of items and properties the compiler needs straight out
//! of the project XML. Conditions are not evaluated and no SDK targets are
//! imported; every `Compile` item is taken in document order, and referenced
//! projects contribute their sources ahead of the referencing project.

use std::{
  collections::HashSet,
  path::Path,
};

use quick_xml::{
  Reader,
  escape::{resolve_predefined_entity, unescape},
  events::Event,
};
use tracing::debug;

use super::{
  CompilerError,
  project::{ProjectConfig, ResolvedProject, normalize_path, resolve_relative},
};

/// The parts of a single project file we care about.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ProjectFile {
  pub compile_items: Vec<String>,
  pub project_references: Vec<String>,
  pub defines: Vec<String>,
  pub target_framework: Option<String>,
  pub other_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
  DefineConstants,
  TargetFramework,
  TargetFrameworks,
  OtherFlags,
}

impl Property {
  fn from_name(name: &[u8]) -> Option<Self> {
    match name {
      b"DefineConstants" => Some(Self::DefineConstants),
      b"TargetFramework" => Some(Self::TargetFramework),
      b"TargetFrameworks" => Some(Self::TargetFrameworks),
      b"OtherFlags" => Some(Self::OtherFlags),
      _ => None,
    }
  }
}

/// Parse project XML. Relative includes are resolved against `project_dir`.
pub(crate) fn parse_project(xml: &str, project_dir: &str) -> Result<ProjectFile, String> {
  // Text is left untrimmed: entity references split a value into several
  // events, and every property value is trimmed when applied.
  let mut reader = Reader::from_str(xml);

  let mut project = ProjectFile::default();
  let mut property: Option<(Property, String)> = None;

  loop {
    match reader.read_event() {
      Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
        let name = e.local_name();
        match name.as_ref() {
          b"Compile" | b"ProjectReference" => {
            let attr = e
              .try_get_attribute("Include")
              .map_err(|err| err.to_string())?
              .ok_or_else(|| format!("<{}> without Include", String::from_utf8_lossy(name.as_ref())))?;
            let raw = String::from_utf8_lossy(&attr.value);
            let include = unescape(&raw).map_err(|err| err.to_string())?;
            if include.contains('*') {
              return Err(format!("wildcard includes are not supported: {include}"));
            }

            let resolved = resolve_relative(project_dir, &include);
            if name.as_ref() == b"Compile" {
              project.compile_items.push(resolved);
            } else {
              project.project_references.push(resolved);
            }
          }
          other => {
            if let Some(p) = Property::from_name(other) {
              property = Some((p, String::new()));
            }
          }
        }
      }
      Ok(Event::Text(t)) => {
        if let Some((_, buf)) = property.as_mut() {
          let raw = String::from_utf8_lossy(&t);
          buf.push_str(&unescape(&raw).map_err(|err| err.to_string())?);
        }
      }
      Ok(Event::GeneralRef(r)) => {
        if let Some((_, buf)) = property.as_mut() {
          if let Some(ch) = r.resolve_char_ref().map_err(|err| err.to_string())? {
            buf.push(ch);
          } else {
            let name = r.decode().map_err(|err| err.to_string())?;
            let resolved = resolve_predefined_entity(&name).ok_or_else(|| format!("unknown entity &{name};"))?;
            buf.push_str(resolved);
          }
        }
      }
      Ok(Event::End(e)) => {
        if let Some((p, value)) = property.take() {
          if Property::from_name(e.local_name().as_ref()) == Some(p) {
            apply_property(&mut project, p, &value);
          } else {
            property = Some((p, value));
          }
        }
      }
      Ok(Event::Eof) => break,
      Ok(_) => {}
      Err(e) => return Err(format!("error at position {}: {}", reader.error_position(), e)),
    }
  }

  Ok(project)
}

fn apply_property(project: &mut ProjectFile, property: Property, value: &str) {
  match property {
    Property::DefineConstants => {
      for define in value.split(';').map(str::trim) {
        if define.is_empty() || define.starts_with("$(") || project.defines.iter().any(|d| d == define) {
          continue;
        }
        project.defines.push(define.to_string());
      }
    }
    Property::TargetFramework => {
      if project.target_framework.is_none() && !value.trim().is_empty() {
        project.target_framework = Some(value.trim().to_string());
      }
    }
    Property::TargetFrameworks => {
      if project.target_framework.is_none() {
        project.target_framework = value
          .split(';')
          .map(str::trim)
          .find(|tf| !tf.is_empty())
          .map(str::to_string);
      }
    }
    Property::OtherFlags => {
      project.other_flags.extend(
        value
          .split_whitespace()
          .filter(|flag| !flag.starts_with("$("))
          .map(str::to_string),
      );
    }
  }
}

/// Crack the project named by `config`, following project references.
pub(crate) async fn crack(config: &ProjectConfig) -> Result<ResolvedProject, CompilerError> {
  let project_file = config.project_file.clone();
  let base_defines = config.compiler.defines.clone();

  tokio::task::spawn_blocking(move || crack_blocking(&project_file, base_defines))
    .await
    .map_err(|e| CompilerError::Internal(format!("project cracking task failed: {e}")))?
}

fn crack_blocking(project_file: &str, base_defines: Vec<String>) -> Result<ResolvedProject, CompilerError> {
  let mut walk = ProjectWalk::default();
  let root = walk.visit(project_file)?;

  let mut defines = base_defines;
  for define in root.defines {
    if !defines.contains(&define) {
      defines.push(define);
    }
  }

  debug!(
    project = project_file,
    sources = walk.sources.len(),
    references = walk.references.len(),
    "Cracked project"
  );

  Ok(ResolvedProject {
    project_file: normalize_path(project_file),
    source_files: walk.sources,
    defines,
    target_framework: root.target_framework,
    other_options: root.other_flags,
    references: walk.references,
  })
}

#[derive(Default)]
struct ProjectWalk {
  visited: HashSet<String>,
  seen_sources: HashSet<String>,
  sources: Vec<String>,
  references: Vec<String>,
}

impl ProjectWalk {
  fn visit(&mut self, path: &str) -> Result<ProjectFile, CompilerError> {
    let path = normalize_path(path);
    if !Path::new(&path).is_file() {
      return Err(CompilerError::ProjectNotFound(path));
    }

    let xml = std::fs::read_to_string(&path).map_err(|source| CompilerError::Io {
      path: path.clone(),
      source,
    })?;
    let dir = Path::new(&path)
      .parent()
      .map(|p| normalize_path(&p.to_string_lossy()))
      .unwrap_or_else(|| ".".to_string());

    let project = parse_project(&xml, &dir).map_err(|message| CompilerError::InvalidProject {
      path: path.clone(),
      message,
    })?;
    self.visited.insert(path);

    for reference in &project.project_references {
      if self.visited.contains(reference) {
        continue;
      }
      self.references.push(reference.clone());
      self.visit(reference)?;
    }

    for source in &project.compile_items {
      if self.seen_sources.insert(source.clone()) {
        self.sources.push(source.clone());
      }
    }

    Ok(project)
  }
}
