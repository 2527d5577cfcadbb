//! Import screening for generated code.

use crate::error::{MediCoreError, Result};
use regex::Regex;
use std::collections::BTreeSet;

/// Standard-library modules every snippet may import.
pub const BASE_AUTHORIZED_IMPORTS: &[&str] = &[
    "collections",
    "datetime",
    "itertools",
    "json",
    "math",
    "queue",
    "random",
    "re",
    "stat",
    "statistics",
    "time",
    "unicodedata",
];

/// Set of top-level modules generated code is allowed to import.
#[derive(Debug, Clone)]
pub struct ImportPolicy {
    allowed: BTreeSet<String>,
    allow_all: bool,
    import_regex: Regex,
    from_regex: Regex,
    clause_regex: Regex,
    dynamic_regex: Regex,
}

impl ImportPolicy {
    /// Base modules plus the given extras. A `"*"` entry authorizes everything.
    pub fn new<S: AsRef<str>>(additional: &[S]) -> Self {
        let mut allowed: BTreeSet<String> =
            BASE_AUTHORIZED_IMPORTS.iter().map(|m| m.to_string()).collect();
        let mut allow_all = false;
        for module in additional {
            let module = module.as_ref().trim();
            if module == "*" {
                allow_all = true;
            } else if !module.is_empty() {
                allowed.insert(root_module(module).to_string());
            }
        }

        Self {
            allowed,
            allow_all,
            import_regex: Regex::new(r"^\s*import\s+(.+)$").unwrap(),
            from_regex: Regex::new(r"^\s*from\s+([\w.]+)\s+import\b").unwrap(),
            // Greedy up to the last colon: import statements never contain one.
            clause_regex: Regex::new(
                r"^\s*(?:if|elif|else|for|while|with|try|except|finally|def|class|async)\b.*:(.*)$",
            )
            .unwrap(),
            dynamic_regex: Regex::new(r"\b__import__\s*\(|\bimportlib\b").unwrap(),
        }
    }

    /// Authorized modules, sorted.
    pub fn allowed(&self) -> Vec<String> {
        if self.allow_all {
            return vec!["*".to_string()];
        }
        self.allowed.iter().cloned().collect()
    }

    /// Top-level modules imported by `code`, in order of appearance.
    ///
    /// Statements after `;` and bodies of one-line compound statements
    /// (`if x: import os`) are screened too.
    pub fn imported_modules(&self, code: &str) -> Vec<String> {
        let mut modules = Vec::new();
        for line in code.lines() {
            let line = line.split('#').next().unwrap_or_default();
            for statement in line.split(';') {
                let statement = match self.clause_regex.captures(statement) {
                    Some(cap) => cap.get(1).map_or("", |m| m.as_str()),
                    None => statement,
                };
                self.collect_statement(statement, &mut modules);
            }
        }
        modules
    }

    fn collect_statement(&self, statement: &str, modules: &mut Vec<String>) {
        if let Some(cap) = self.from_regex.captures(statement) {
            let module = &cap[1];
            // Relative imports have no root to check.
            if !module.starts_with('.') {
                modules.push(root_module(module).to_string());
            }
        } else if let Some(cap) = self.import_regex.captures(statement) {
            for item in cap[1].split(',') {
                let name = item.split_whitespace().next().unwrap_or_default();
                if !name.is_empty() {
                    modules.push(root_module(name).to_string());
                }
            }
        }
    }

    /// First dynamic import mechanism used by `code`, if any.
    pub fn dynamic_import(&self, code: &str) -> Option<String> {
        code.lines()
            .map(|line| line.split('#').next().unwrap_or_default())
            .find_map(|line| self.dynamic_regex.find(line))
            .map(|m| m.as_str().trim_end_matches(['(', ' ', '\t']).to_string())
    }

    /// Fail on the first import outside the policy.
    ///
    /// `__import__(...)` and `importlib` are always refused since they would
    /// load modules the line-based screening cannot see.
    pub fn check(&self, code: &str) -> Result<()> {
        if self.allow_all {
            return Ok(());
        }
        if let Some(module) = self.dynamic_import(code) {
            return Err(MediCoreError::ImportNotAllowed {
                module,
                allowed: self.allowed().join(", "),
            });
        }
        for module in self.imported_modules(code) {
            if !self.allowed.contains(&module) {
                return Err(MediCoreError::ImportNotAllowed {
                    module,
                    allowed: self.allowed().join(", "),
                });
            }
        }
        Ok(())
    }
}

fn root_module(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ImportPolicy {
        ImportPolicy::new(&["pandas", "numpy", "scipy"])
    }

    #[test]
    fn test_allows_base_and_additional() {
        let code = "import math\nimport numpy as np\nfrom scipy.stats import norm\nprint(math.pi)";
        assert!(policy().check(code).is_ok());
    }

    #[test]
    fn test_rejects_unlisted_module() {
        let err = policy().check("import os\nos.listdir('.')").unwrap_err();
        match err {
            MediCoreError::ImportNotAllowed { module, allowed } => {
                assert_eq!(module, "os");
                assert!(allowed.contains("pandas"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_submodule_of_unlisted_root() {
        assert!(policy().check("from urllib.request import urlopen").is_err());
        assert!(policy().check("import subprocess.run").is_err());
    }

    #[test]
    fn test_comma_separated_imports() {
        let modules = policy().imported_modules("import json, numpy as np, sys");
        assert_eq!(modules, vec!["json", "numpy", "sys"]);
        assert!(policy().check("import json, sys").is_err());
    }

    #[test]
    fn test_comments_and_relative_imports_ignored() {
        let code = "x = 1  # import os\nfrom . import helpers";
        assert!(policy().imported_modules(code).is_empty());
    }

    #[test]
    fn test_wildcard_allows_everything() {
        let policy = ImportPolicy::new(&["*"]);
        assert!(policy.check("import os").is_ok());
        assert_eq!(policy.allowed(), vec!["*"]);
    }

    #[test]
    fn test_import_after_semicolon() {
        let policy = ImportPolicy::new(&["numpy"]);
        assert_eq!(policy.imported_modules("x = 1; import os"), vec!["os"]);
        assert!(policy.check("x = 1; import os").is_err());
        assert!(policy.check("x = 1; import math; from numpy import array").is_ok());
    }

    #[test]
    fn test_import_inside_one_line_compound_statement() {
        let policy = ImportPolicy::new(&["numpy"]);
        assert_eq!(
            policy.imported_modules("if True: import subprocess"),
            vec!["subprocess"]
        );
        assert!(policy.check("if True: import subprocess").is_err());
        assert!(policy.check("try: from os import path").is_err());
        assert!(policy.check("def f(x: int): import shutil").is_err());
        assert!(policy.check("for k in {'a': 1}: import math").is_ok());
    }

    #[test]
    fn test_dynamic_imports_always_rejected() {
        let policy = ImportPolicy::new(&["numpy", "importlib"]);
        let err = policy.check("os = __import__('os')").unwrap_err();
        assert!(matches!(
            err,
            MediCoreError::ImportNotAllowed { ref module, .. } if module == "__import__"
        ));
        assert!(policy.check("m = __import__ ('math')").is_err());
        assert!(policy.check("import importlib").is_err());
        assert!(policy.check("x = 1; importlib.import_module('os')").is_err());
        assert!(policy.check("# __import__('os') is not used\nprint(1)").is_ok());
    }
}
