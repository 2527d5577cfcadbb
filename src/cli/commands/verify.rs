//! Verify command - check dependencies, project files and credentials.

use crate::cli::Output;
use crate::config::{load_env_file, Settings};
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            hint: None,
        }
    }

    fn fail(name: &str, message: &str, hint: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            hint: hint.map(str::to_string),
        }
    }

    fn print(&self) {
        let icon = if self.passed {
            style("✓").green()
        } else {
            style("✗").red()
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            for line in hint.lines() {
                println!("    {} {}", style("→").dim(), style(line).dim());
            }
        }
    }
}

/// A named group of checks.
#[derive(Debug)]
pub struct Section {
    pub name: &'static str,
    pub checks: Vec<CheckResult>,
}

impl Section {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    fn print(&self) {
        println!("{}", style(self.name).bold());
        for check in &self.checks {
            check.print();
        }
        println!();
    }
}

/// Run the setup verification and exit non-zero if anything is missing.
pub fn run_verify(settings: &Settings) -> anyhow::Result<()> {
    Output::header("MediCore Setup Verification");
    println!();

    let base = std::env::current_dir()?;

    if let Err(e) = load_env_file(&base) {
        tracing::warn!("{}", e);
    }

    let sections = vec![
        check_dependencies(&settings.sandbox.python, &settings.verify.packages),
        check_project_files(&base, &settings.verify.required_files),
        check_environment(&base, &settings.verify.required_env, |key| {
            std::env::var(key).ok()
        }),
    ];

    for section in &sections {
        section.print();
    }

    println!("{}", style("Summary").bold());
    for section in &sections {
        let verdict = if section.passed() {
            style("✓ PASS").green()
        } else {
            style("✗ FAIL").red()
        };
        println!("  {}: {}", section.name, verdict);
    }
    println!();

    let code = exit_code(&sections);
    if code == 0 {
        Output::success("All checks passed! MediCore is ready to use.");
        println!();
        println!("Next steps:");
        Output::list_item("Start the web form: medicore serve");
        Output::list_item("Run a single request: medicore run \"<request>\"");
        Ok(())
    } else {
        let failed = sections
            .iter()
            .flat_map(|s| s.checks.iter())
            .filter(|c| !c.passed)
            .count();
        Output::error(&format!(
            "{} check(s) failed. Please fix them before using MediCore.",
            failed
        ));
        std::process::exit(code);
    }
}

/// Process exit code for a finished checklist: 0 only when every check passed.
pub fn exit_code(sections: &[Section]) -> i32 {
    if sections.iter().all(Section::passed) {
        0
    } else {
        1
    }
}

/// Check the Python interpreter and each required package.
pub fn check_dependencies<S: AsRef<str>>(python: &str, packages: &[S]) -> Section {
    let mut checks = vec![check_interpreter(python)];

    // Package imports are meaningless without an interpreter.
    if checks[0].passed {
        checks.extend(packages.iter().map(|p| check_package(python, p.as_ref())));
    } else {
        checks.extend(packages.iter().map(|p| {
            CheckResult::fail(p.as_ref(), "not checked", Some("Install Python first"))
        }));
    }

    Section {
        name: "Dependencies",
        checks,
    }
}

fn check_interpreter(python: &str) -> CheckResult {
    match Command::new(python).arg("--version").output() {
        Ok(output) if output.status.success() => {
            // Older interpreters print the version on stderr.
            let raw = if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            let version = String::from_utf8_lossy(&raw)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::pass(python, &version)
        }
        Ok(_) => CheckResult::fail(python, "failed to run", Some("Check your Python installation")),
        Err(_) => CheckResult::fail(
            python,
            "not found",
            Some("Install Python 3 and make sure it is on your PATH"),
        ),
    }
}

fn check_package(python: &str, package: &str) -> CheckResult {
    let status = Command::new(python)
        .arg("-c")
        .arg(format!("import {}", package))
        .output();

    match status {
        Ok(output) if output.status.success() => CheckResult::pass(package, "importable"),
        _ => CheckResult::fail(
            package,
            "not installed",
            Some(&format!("Run: {} -m pip install {}", python, package)),
        ),
    }
}

/// Check that each required file exists under `base`.
pub fn check_project_files<S: AsRef<str>>(base: &Path, files: &[S]) -> Section {
    let checks = files
        .iter()
        .map(|f| {
            let name = f.as_ref();
            if base.join(name).is_file() {
                CheckResult::pass(name, "found")
            } else {
                CheckResult::fail(name, "missing", None)
            }
        })
        .collect();

    Section {
        name: "Project Files",
        checks,
    }
}

/// Check the `.env` file and the required variables.
///
/// `lookup` resolves a variable name to its value, after `.env` has been loaded.
pub fn check_environment<S, F>(base: &Path, required: &[S], lookup: F) -> Section
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<String>,
{
    let mut checks = Vec::new();

    if base.join(".env").is_file() {
        checks.push(CheckResult::pass(".env", "found"));
    } else {
        checks.push(CheckResult::fail(
            ".env",
            "missing",
            Some("Run: cp .env.example .env\nThen edit .env with your API keys"),
        ));
    }

    for key in required {
        let key = key.as_ref();
        let check = match lookup(key) {
            Some(value) if is_configured(&value) => CheckResult::pass(key, "set"),
            Some(value) if !value.trim().is_empty() => CheckResult::fail(
                key,
                "still a placeholder",
                Some(&format!("Set a real value for {} in .env", key)),
            ),
            _ => CheckResult::fail(
                key,
                "not set",
                Some(&format!("Add {}=... to .env", key)),
            ),
        };
        checks.push(check);
    }

    Section {
        name: "Environment Configuration",
        checks,
    }
}

/// A value counts as configured when it is non-empty and not a `your-...` placeholder.
fn is_configured(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.starts_with("your-")
}
