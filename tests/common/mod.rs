//! Shared fixtures for the integration tests.
//!
//! The compiler and toolchain are replaced by two shell scripts:
//!
//! - the fake compiler reads directives from comments in the source file.
//!   `// reject: MSG` makes it print MSG on stderr and exit 1, `// noasm`
//!   makes it exit 0 without output, `// hang` makes it never finish, and
//!   every `// body: CMD` line is copied into `out.s` in its working directory.
//! - the fake `cc` refuses any assembly containing a `BAD` line, never
//!   finishes on a `HANG` line, and otherwise turns the assembly into an
//!   executable shell script.
//!
//! The scripts are written exactly once per test binary, before any test
//! spawns a process, so no child can inherit a half-written script.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use goldrun::report::{Reporter, SuiteSummary};
use goldrun::runner::{run_all, RunOptions};
use goldrun::{Category, SuiteConfig};
use tempfile::TempDir;
use termcolor::Buffer;

const FAKE_COMPILER: &str = r#"#!/bin/sh
src="$1"
if grep -q '^// hang' "$src"; then
    exec sleep 30
fi
reject=$(sed -n 's|^// reject: ||p' "$src")
if [ -n "$reject" ]; then
    echo "$reject" >&2
    exit 1
fi
if grep -q '^// noasm' "$src"; then
    exit 0
fi
sed -n 's|^// body: ||p' "$src" > out.s
"#;

const FAKE_CC: &str = r#"#!/bin/sh
# cc -o EXE ASM RUNTIME
exe="$2"
asm="$3"
rt="$4"
if [ ! -f "$rt" ]; then
    echo "cc: $rt: no such file" >&2
    exit 1
fi
if grep -q '^HANG' "$asm"; then
    exec sleep 30
fi
if grep -q '^BAD' "$asm"; then
    echo "$asm:1: Error: no such instruction: 'BAD'" >&2
    exit 1
fi
{ echo '#!/bin/sh'; cat "$asm"; } > "$exe"
chmod +x "$exe"
"#;

pub struct Tools {
    _dir: TempDir,
    pub compiler: PathBuf,
    pub cc: PathBuf,
    pub runtime: PathBuf,
}

pub fn tools() -> &'static Tools {
    static TOOLS: OnceLock<Tools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let compiler = write_script(dir.path(), "myComp", FAKE_COMPILER);
        let cc = write_script(dir.path(), "fake-cc", FAKE_CC);
        let runtime = dir.path().join("printint.c");
        fs::write(&runtime, "void printint(long x) {}\n").unwrap();
        Tools {
            _dir: dir,
            compiler,
            cc,
            runtime,
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A fixture store under a temporary root.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        tools();
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Adds a case whose program runs the given shell commands.
    pub fn program(&self, category: &str, name: &str, body: &[&str], expected: &str) -> &Self {
        let source: String = body.iter().map(|line| format!("// body: {line}\n")).collect();
        self.source(category, name, &source, expected)
    }

    /// Adds a case the fake compiler rejects with `diagnostic`.
    pub fn rejected(&self, category: &str, name: &str, diagnostic: &str, expected: &str) -> &Self {
        self.source(category, name, &format!("// reject: {diagnostic}\n"), expected)
    }

    pub fn source(&self, category: &str, name: &str, source: &str, expected: &str) -> &Self {
        let codes = self.root().join(category).join("codes");
        let outputs = self.root().join(category).join("outputs");
        fs::create_dir_all(&codes).unwrap();
        fs::create_dir_all(&outputs).unwrap();
        fs::write(codes.join(format!("{name}.c")), source).unwrap();
        fs::write(outputs.join(format!("{name}.out")), expected).unwrap();
        self
    }

    pub fn stdin(&self, category: &str, name: &str, input: &str) -> &Self {
        let outputs = self.root().join(category).join("outputs");
        fs::create_dir_all(&outputs).unwrap();
        fs::write(outputs.join(format!("{name}.in")), input).unwrap();
        self
    }

    pub fn expected(&self, category: &str, name: &str, expected: &str) -> &Self {
        let path = self
            .root()
            .join(category)
            .join("outputs")
            .join(format!("{name}.out"));
        fs::write(path, expected).unwrap();
        self
    }

    /// A suite config whose subprocesses give up after one second.
    pub fn impatient_config(&self) -> SuiteConfig {
        SuiteConfig {
            timeout_secs: 1,
            ..self.config()
        }
    }

    pub fn config(&self) -> SuiteConfig {
        let tools = tools();
        SuiteConfig {
            fixture_root: self.root().to_path_buf(),
            compiler: tools.compiler.clone(),
            toolchain: tools.cc.clone(),
            runtime_support: tools.runtime.clone(),
            timeout_secs: 5,
            categories: vec![
                Category::new("algorithm"),
                Category::new("function"),
                Category::rejecting("error"),
            ],
            ..SuiteConfig::default()
        }
    }

    /// Runs the suite and returns the summary with the uncoloured console text.
    pub fn run(&self, config: &SuiteConfig, options: &RunOptions) -> (SuiteSummary, String) {
        let mut reporter = Reporter::new(Buffer::no_color());
        let summary = run_all(config, options, &mut reporter).unwrap();
        let text = String::from_utf8(reporter.into_inner().into_inner()).unwrap();
        (summary, text)
    }

    /// Files anywhere under the fixture root, for leak checks.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = walkdir::WalkDir::new(self.root())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }
}
