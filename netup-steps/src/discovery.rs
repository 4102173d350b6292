//! Project discovery.
//!
//! Solution files win: when any `.sln` exists, the project list is exactly
//! what the solutions reference, and loose project files are excluded so
//! nothing is processed twice. Only with no solution at all does the
//! directory scan for individual project files take over.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

const PROJECT_EXTENSIONS: &[&str] = &["csproj", "fsproj", "vbproj"];
const SKIPPED_DIRS: &[&str] = &["bin", "obj", ".git", "node_modules", ".vs"];

/// Everything upgradeable found under a repo root.
#[derive(Debug, Clone, Default)]
pub struct ProjectSet {
    pub solutions: Vec<Utf8PathBuf>,
    pub projects: Vec<Utf8PathBuf>,
}

fn solution_project_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Project("{GUID}") = "Name", "rel\path\proj.csproj", "{GUID}"
    RE.get_or_init(|| Regex::new(r#"^Project\("\{[^}]*\}"\)\s*=\s*"[^"]*",\s*"([^"]+)""#).expect("solution regex"))
}

pub fn discover_projects(repo_root: &Utf8Path) -> anyhow::Result<ProjectSet> {
    let mut solutions = Vec::new();
    let mut loose_projects = Vec::new();

    for entry in WalkDir::new(repo_root)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("directory walk error: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            continue;
        };
        match path.extension() {
            Some("sln") => solutions.push(path.to_path_buf()),
            Some(ext) if PROJECT_EXTENSIONS.contains(&ext) => {
                loose_projects.push(path.to_path_buf());
            }
            _ => {}
        }
    }
    solutions.sort();
    loose_projects.sort();

    let projects = if solutions.is_empty() {
        loose_projects
    } else {
        let mut referenced = BTreeSet::new();
        for solution in &solutions {
            for project in parse_solution_projects(solution)? {
                if project.exists() {
                    referenced.insert(project);
                } else {
                    warn!(%solution, %project, "solution references a missing project");
                }
            }
        }
        referenced.into_iter().collect()
    };

    debug!(
        solutions = solutions.len(),
        projects = projects.len(),
        "project discovery finished"
    );
    Ok(ProjectSet {
        solutions,
        projects,
    })
}

fn parse_solution_projects(solution: &Utf8Path) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let contents =
        fs::read_to_string(solution).with_context(|| format!("read solution {solution}"))?;
    let base = solution.parent().unwrap_or(Utf8Path::new(""));

    let mut projects = Vec::new();
    for line in contents.lines() {
        let Some(caps) = solution_project_re().captures(line) else {
            continue;
        };
        // Solution files spell paths with backslashes regardless of host OS.
        let rel = caps[1].replace('\\', "/");
        let path = base.join(rel);
        if path
            .extension()
            .is_some_and(|ext| PROJECT_EXTENSIONS.contains(&ext))
        {
            projects.push(path);
        }
    }
    Ok(projects)
}

pub(crate) fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn seed(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        for (rel, contents) in files {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(&path, contents).expect("write");
        }
        (dir, root)
    }

    const SLN: &str = "\
Microsoft Visual Studio Solution File, Format Version 12.00
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"App\", \"src\\App\\App.csproj\", \"{11111111-1111-1111-1111-111111111111}\"
EndProject
Project(\"{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}\") = \"Lib\", \"src\\Lib\\Lib.csproj\", \"{22222222-2222-2222-2222-222222222222}\"
EndProject
Project(\"{2150E333-8FDC-42A3-9474-1A3956D46DE8}\") = \"Solution Items\", \"Solution Items\", \"{33333333-3333-3333-3333-333333333333}\"
EndProject
";

    #[test]
    fn solution_wins_and_loose_projects_are_excluded() {
        let (_dir, root) = seed(&[
            ("All.sln", SLN),
            ("src/App/App.csproj", "<Project/>"),
            ("src/Lib/Lib.csproj", "<Project/>"),
            ("tools/Loose/Loose.csproj", "<Project/>"),
        ]);
        let set = discover_projects(&root).expect("discover");

        assert_eq!(set.solutions.len(), 1);
        let names: Vec<_> = set
            .projects
            .iter()
            .map(|p| p.file_name().expect("name"))
            .collect();
        assert_eq!(names, vec!["App.csproj", "Lib.csproj"]);
    }

    #[test]
    fn without_solutions_loose_projects_are_scanned() {
        let (_dir, root) = seed(&[
            ("a/A.csproj", "<Project/>"),
            ("b/B.fsproj", "<Project/>"),
            ("c/C.vbproj", "<Project/>"),
            ("d/readme.md", "nope"),
        ]);
        let set = discover_projects(&root).expect("discover");

        assert!(set.solutions.is_empty());
        assert_eq!(set.projects.len(), 3);
    }

    #[test]
    fn build_output_directories_are_not_scanned() {
        let (_dir, root) = seed(&[
            ("app/App.csproj", "<Project/>"),
            ("app/obj/App.csproj", "<Project/>"),
            ("app/bin/Debug/App.csproj", "<Project/>"),
        ]);
        let set = discover_projects(&root).expect("discover");
        assert_eq!(set.projects.len(), 1);
    }

    #[test]
    fn missing_referenced_projects_are_dropped_with_a_warning() {
        let (_dir, root) = seed(&[("All.sln", SLN), ("src/App/App.csproj", "<Project/>")]);
        let set = discover_projects(&root).expect("discover");
        assert_eq!(set.projects.len(), 1);
    }
}
