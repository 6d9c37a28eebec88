//! Per-language run plans: which file to write and which commands to run.

use std::path::Path;

use crate::domain::TargetLanguage;

/// What a step does; decides how a non-zero exit is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Run,
}

/// One child process of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStep {
    pub phase: Phase,
    pub program: String,
    pub args: Vec<String>,
}

impl RunStep {
    fn new(phase: Phase, program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            phase,
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Program name for messages ("`g++`").
    pub fn display_name(&self) -> String {
        let name = Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone());
        format!("`{}`", name)
    }
}

/// Everything needed to execute one candidate inside a scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub file_name: &'static str,
    pub steps: Vec<RunStep>,
    pub env: Vec<(String, String)>,
}

impl RunPlan {
    /// Build the plan for `language` rooted at `workdir`.
    ///
    /// `program` overrides the interpreter (or, for compiled languages, the
    /// compiler). Compiled binaries are run by absolute path.
    pub fn for_language(language: TargetLanguage, workdir: &Path, program: Option<&str>) -> Self {
        let pick = |default: &str| program.unwrap_or(default).to_string();
        let binary = workdir.join("main").to_string_lossy().into_owned();

        match language {
            TargetLanguage::Python => Self {
                file_name: "main.py",
                steps: vec![RunStep::new(Phase::Run, pick("python3"), &["main.py"])],
                env: vec![
                    ("PYTHONDONTWRITEBYTECODE".into(), "1".into()),
                    ("PYTHONUNBUFFERED".into(), "1".into()),
                ],
            },
            TargetLanguage::JavaScript => Self {
                file_name: "main.js",
                steps: vec![RunStep::new(Phase::Run, pick("node"), &["main.js"])],
                env: Vec::new(),
            },
            // Single-file source launch (JDK 11+); the class name need not match the file
            TargetLanguage::Java => Self {
                file_name: "Main.java",
                steps: vec![RunStep::new(Phase::Run, pick("java"), &["Main.java"])],
                env: Vec::new(),
            },
            TargetLanguage::Cpp => Self {
                file_name: "main.cpp",
                steps: vec![
                    RunStep::new(Phase::Compile, pick("g++"), &["-std=c++17", "-O0", "-o", "main", "main.cpp"]),
                    RunStep::new(Phase::Run, binary, &[]),
                ],
                env: Vec::new(),
            },
            // Build then run, so the process we time out is the program itself
            TargetLanguage::Go => Self {
                file_name: "main.go",
                steps: vec![
                    RunStep::new(Phase::Compile, pick("go"), &["build", "-o", "main", "main.go"]),
                    RunStep::new(Phase::Run, binary, &[]),
                ],
                env: vec![
                    ("GOCACHE".into(), workdir.join(".gocache").to_string_lossy().into_owned()),
                    ("GOPATH".into(), workdir.join(".gopath").to_string_lossy().into_owned()),
                ],
            },
            TargetLanguage::Shell => Self {
                file_name: "main.sh",
                steps: vec![RunStep::new(Phase::Run, pick("sh"), &["main.sh"])],
                env: Vec::new(),
            },
        }
    }
}
