use std::path::{Path, PathBuf};

fn exe_name(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

// The fake binary finds its files next to its own path, which a symlink
// would resolve away.
fn link_or_copy(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::hard_link(src, dest).or_else(|_| std::fs::copy(src, dest).map(|_| ()))
}

/// A temporary directory holding a copy of the fake restic binary and the
/// files it reads and writes.
pub struct Workdir {
    dir: tempfile::TempDir,
}

impl Workdir {
    const TARGET_BINARY_NAME: &'static str = "test-binary";

    pub fn new(binary: impl AsRef<Path>) -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        link_or_copy(
            binary.as_ref(),
            &dir.path().join(exe_name(Self::TARGET_BINARY_NAME)),
        )
        .unwrap();
        Self { dir }
    }

    pub fn with_exit_status(self, exit_status: i32) -> Self {
        std::fs::write(self.path().join("exit-status"), exit_status.to_string()).unwrap();
        self
    }

    /// Makes invocations of one restic subcommand exit with `exit_status`.
    pub fn with_command_exit_status(self, subcommand: &str, exit_status: i32) -> Self {
        std::fs::write(
            self.path().join(format!("exit-status-{}", subcommand)),
            exit_status.to_string(),
        )
        .unwrap();
        self
    }

    pub fn with_stdout(self, stdout: impl AsRef<[u8]>) -> Self {
        std::fs::write(self.path().join("stdout"), stdout.as_ref()).unwrap();
        self
    }

    pub fn with_stderr(self, stderr: impl AsRef<[u8]>) -> Self {
        std::fs::write(self.path().join("stderr"), stderr.as_ref()).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn test_binary(&self) -> PathBuf {
        self.dir.path().join(exe_name(Self::TARGET_BINARY_NAME))
    }

    pub fn invocations(&self) -> Invocations {
        Invocations::new(&self.path().join("invocations")).unwrap_or_default()
    }

    pub fn env(&self) -> Env {
        Env::new(&self.path().join("env")).unwrap()
    }
}

/// The argument lists of every run of the fake binary, oldest first.
#[derive(Debug, Default)]
pub struct Invocations {
    runs: Vec<Vec<String>>,
}

impl Invocations {
    fn new(file: &Path) -> std::io::Result<Self> {
        let runs = std::fs::read_to_string(file)?
            .lines()
            .map(|line| {
                if line.is_empty() {
                    vec![]
                } else {
                    line.split('\t').map(str::to_owned).collect()
                }
            })
            .collect();
        Ok(Invocations { runs })
    }

    pub fn runs(&self) -> &[Vec<String>] {
        &self.runs
    }

    /// The subcommand of each run.
    pub fn subcommands(&self) -> Vec<&str> {
        self.runs
            .iter()
            .map(|run| run.first().map(String::as_str).unwrap_or(""))
            .collect()
    }

    /// The first run of `subcommand`.
    pub fn find(&self, subcommand: &str) -> Option<&[String]> {
        self.runs
            .iter()
            .find(|run| run.first().map(String::as_str) == Some(subcommand))
            .map(Vec::as_slice)
    }

    pub fn assert_args(&self, idx: usize, args: &[impl AsRef<str>]) -> &Self {
        let args = args.iter().map(|s| s.as_ref()).collect::<Vec<_>>();
        assert_eq!(self.runs[idx], args);
        self
    }
}

pub struct Env {
    env: Vec<(String, String)>,
}

impl Env {
    fn new(env_file: &Path) -> std::io::Result<Self> {
        let env = std::fs::read_to_string(env_file)?
            .lines()
            .filter_map(|s| s.split_once('='))
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        Ok(Env { env })
    }

    pub fn assert_var(&self, key: impl AsRef<str>, value: impl AsRef<str>) -> &Self {
        let key = key.as_ref();
        let value = value.as_ref();
        assert!(self.env.iter().any(|(k, v)| k == key && v == value));
        self
    }
}
