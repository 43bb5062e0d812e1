use std::path::{Path, PathBuf};

use complemake_job::Transform;
use complemake_platform::Platform;
use complemake_target::{
    resolve_undetermined_libs, CxxSourcePayload, Dependency, DynLibPayload, ExecutablePayload,
    ExecutableTestPayload, Target, TargetArena, TargetId, TargetKind, ToolTestPayload,
};

use crate::{
    error::ProjectError,
    spec::{ExeSpec, ExeTestSpec, ProjectDocument, SourceEntry, TargetSpec, ToolTestSpec},
};

/// Parses a project file and builds its target graph (spec §6). `platform`
/// must already be resolved (host or `--system-type`) since output-file
/// naming is platform-dependent. Returns the arena plus the ids of the
/// explicitly declared top-level targets, in declaration order — the
/// default build roots when no `--target-name`/`--target-file` is given.
pub fn load_project(
    source_name: &str,
    yaml: &str,
    out_dir: &Path,
    platform: Platform,
) -> Result<(TargetArena, Vec<TargetId>), ProjectError> {
    let body = strip_document_header(yaml);
    let doc: ProjectDocument =
        serde_yaml::from_str(&body).map_err(|e| ProjectError::parse(source_name, e))?;

    if doc.kind != "complemake/project" {
        return Err(ProjectError::WrongDocumentKind {
            source_name: source_name.to_string(),
            kind: doc.kind,
        });
    }
    if doc.targets.is_empty() {
        return Err(ProjectError::EmptyProject {
            source_name: source_name.to_string(),
        });
    }

    let mut arena = TargetArena::new();
    let mut roots = Vec::new();
    for spec in &doc.targets {
        let id = match spec {
            TargetSpec::Exe(e) => build_linked_target(&mut arena, out_dir, platform, e, false)?,
            TargetSpec::DynLib(e) => build_linked_target(&mut arena, out_dir, platform, e, true)?,
            TargetSpec::ExeTest(t) => build_exetest(&mut arena, out_dir, platform, t)?,
            TargetSpec::ToolTest(t) => build_tooltest(&mut arena, out_dir, source_name, platform, t)?,
        };
        roots.push(id);
    }
    resolve_undetermined_libs(&mut arena);
    Ok((arena, roots))
}

/// Strips the `%YAML 1.2` directive line and the `---` document marker;
/// `serde_yaml` is handed the bare mapping.
fn strip_document_header(yaml: &str) -> String {
    yaml.lines()
        .skip_while(|line| {
            let trimmed = line.trim();
            trimmed.starts_with('%') || trimmed == "---"
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn transforms_from(patterns: &[String]) -> Vec<Transform> {
    patterns
        .iter()
        .map(|pattern| Transform::Filter {
            pattern: pattern.clone(),
        })
        .collect()
}

fn make_source_target(
    arena: &mut TargetArena,
    out_dir: &Path,
    platform: Platform,
    entry: &SourceEntry,
    force_preprocess: bool,
) -> Result<TargetId, ProjectError> {
    let source_path = PathBuf::from(entry.path());
    let preprocess_only = force_preprocess || entry.wants_preprocess_only();
    let suffix = if preprocess_only { ".i" } else { platform.object_suffix() };
    let output_path = complemake_paths::intermediate_path(out_dir, &source_path, suffix);
    let payload = CxxSourcePayload {
        source: source_path.clone(),
        final_output: None,
    };
    let kind = if preprocess_only {
        TargetKind::CxxPreprocessed(payload)
    } else {
        TargetKind::CxxObject(payload)
    };
    let target = Target::new(
        None,
        Some(output_path),
        vec![Dependency::ForeignSource(source_path)],
        kind,
    );
    Ok(arena.insert(target)?)
}

fn set_final_output(arena: &mut TargetArena, id: TargetId, final_output: TargetId) {
    match &mut arena.get_mut(id).kind {
        TargetKind::CxxPreprocessed(payload) | TargetKind::CxxObject(payload) => {
            payload.final_output = Some(final_output);
        }
        _ => {}
    }
}

fn build_linked_target(
    arena: &mut TargetArena,
    out_dir: &Path,
    platform: Platform,
    spec: &ExeSpec,
    is_dynlib: bool,
) -> Result<TargetId, ProjectError> {
    let mut deps = Vec::new();
    let mut source_ids = Vec::new();
    for entry in &spec.sources {
        let id = make_source_target(arena, out_dir, platform, entry, false)?;
        source_ids.push(id);
        deps.push(Dependency::Target(id));
    }
    for lib in &spec.libraries {
        deps.push(Dependency::UndeterminedLib(lib.clone()));
    }

    let output_path = match &spec.path {
        Some(path) => PathBuf::from(path),
        None if is_dynlib => complemake_paths::lib_path(out_dir, &platform.dynlib_file_name(&spec.name)),
        None => complemake_paths::bin_path(out_dir, &platform.exe_file_name(&spec.name)),
    };

    let kind = if is_dynlib {
        TargetKind::DynLib(DynLibPayload::for_name(&spec.name))
    } else {
        TargetKind::Executable(ExecutablePayload::default())
    };

    let target = Target::new(Some(spec.name.clone()), Some(output_path), deps, kind);
    let id = arena.insert(target)?;
    for source_id in source_ids {
        set_final_output(arena, source_id, id);
    }
    Ok(id)
}

fn build_exetest(
    arena: &mut TargetArena,
    out_dir: &Path,
    platform: Platform,
    spec: &ExeTestSpec,
) -> Result<TargetId, ProjectError> {
    let mut deps = Vec::new();
    let mut source_ids = Vec::new();
    for entry in &spec.sources {
        let id = make_source_target(arena, out_dir, platform, entry, false)?;
        source_ids.push(id);
        deps.push(Dependency::Target(id));
    }

    let mut uses_abaclade_testing = false;
    for lib in &spec.libraries {
        if lib == "abaclade-testing" {
            uses_abaclade_testing = true;
        }
        deps.push(Dependency::UndeterminedLib(lib.clone()));
    }
    if let Some(script) = &spec.script {
        deps.push(Dependency::TestExecScript(PathBuf::from(script)));
    }
    if let Some(expected) = &spec.expected_output {
        deps.push(Dependency::OutputReference(PathBuf::from(expected)));
    }

    let output_path = complemake_paths::test_bin_path(out_dir, &platform.exe_file_name(&spec.name));
    let kind = TargetKind::ExecutableTest(ExecutableTestPayload {
        transforms: transforms_from(&spec.output_transform),
        uses_abaclade_testing,
    });

    let target = Target::new(Some(spec.name.clone()), Some(output_path), deps, kind);
    let id = arena.insert(target)?;
    for source_id in source_ids {
        set_final_output(arena, source_id, id);
    }
    Ok(id)
}

fn build_tooltest(
    arena: &mut TargetArena,
    out_dir: &Path,
    source_name: &str,
    platform: Platform,
    spec: &ToolTestSpec,
) -> Result<TargetId, ProjectError> {
    let mut operands = Vec::new();
    for entry in &spec.sources {
        let id = make_source_target(arena, out_dir, platform, entry, true)?;
        operands.push(Dependency::Target(id));
    }
    if let Some(expected) = &spec.expected_output {
        operands.push(Dependency::OutputReference(PathBuf::from(expected)));
    }

    if operands.len() != 2 {
        return Err(ProjectError::ToolTestOperandCount {
            source_name: source_name.to_string(),
            name: spec.name.clone(),
            count: operands.len(),
        });
    }

    let kind = TargetKind::ToolTest(ToolTestPayload {
        transforms: transforms_from(&spec.output_transform),
    });
    let target = Target::new(Some(spec.name.clone()), None, operands, kind);
    Ok(arena.insert(target)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXE_PROJECT: &str = r#"
%YAML 1.2
---
kind: complemake/project
targets:
  - kind: complemake/target/exe
    name: app
    sources:
      - a.cpp
      - b.cpp
"#;

    #[test]
    fn simple_exe_project_produces_two_object_targets_and_a_link() {
        let (arena, roots) = load_project(
            "project.yaml",
            EXE_PROJECT,
            Path::new("/out"),
            Platform::Gnu,
        )
        .unwrap();
        assert_eq!(roots.len(), 1);
        let app = arena.get(roots[0]);
        assert_eq!(app.name.as_deref(), Some("app"));
        assert_eq!(app.target_dependencies().count(), 2);
        assert_eq!(
            app.output_path,
            Some(PathBuf::from("/out/bin/app"))
        );
    }

    const DYNLIB_AND_EXE_PROJECT: &str = r#"
kind: complemake/project
targets:
  - kind: complemake/target/dynlib
    name: greet
    sources: [greet.cpp]
  - kind: complemake/target/exe
    name: hello
    sources: [main.cpp]
    libraries: [greet]
"#;

    #[test]
    fn library_reference_resolves_to_sibling_dynlib_target() {
        let (arena, roots) = load_project(
            "project.yaml",
            DYNLIB_AND_EXE_PROJECT,
            Path::new("/out"),
            Platform::Gnu,
        )
        .unwrap();
        let hello = roots.iter().find(|id| arena.get(**id).name.as_deref() == Some("hello")).unwrap();
        let greet = arena.find_by_name("greet").unwrap();
        assert!(arena.get(*hello).dependencies.contains(&Dependency::Target(greet)));
    }

    const TOOLTEST_PROJECT: &str = r#"
kind: complemake/project
targets:
  - kind: complemake/target/tooltest
    name: t1
    sources: [src.cpp]
    expected output: expected.txt
    output transform: ["ABCMK_CMP_BEGIN.*?ABCMK_CMP_END"]
"#;

    #[test]
    fn tooltest_with_one_source_and_expected_output_has_two_operands() {
        let (arena, roots) = load_project(
            "project.yaml",
            TOOLTEST_PROJECT,
            Path::new("/out"),
            Platform::Gnu,
        )
        .unwrap();
        let t1 = arena.get(roots[0]);
        assert_eq!(t1.dependencies.len(), 2);
        match &t1.kind {
            TargetKind::ToolTest(payload) => assert_eq!(payload.transforms.len(), 1),
            _ => panic!("expected a tooltest target"),
        }
    }

    const BAD_TOOLTEST_PROJECT: &str = r#"
kind: complemake/project
targets:
  - kind: complemake/target/tooltest
    name: t1
    sources: [a.cpp, b.cpp, c.cpp]
"#;

    #[test]
    fn tooltest_with_wrong_operand_count_is_rejected() {
        let err = load_project(
            "project.yaml",
            BAD_TOOLTEST_PROJECT,
            Path::new("/out"),
            Platform::Gnu,
        )
        .unwrap_err();
        assert!(matches!(err, ProjectError::ToolTestOperandCount { count: 3, .. }));
    }
}
