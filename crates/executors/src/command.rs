use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::gateway::{Expectation, InvocationSpec};

/// Variables every worker inherits from the server process, when set.
pub const BASE_INHERITED_ENV: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "LC_ALL",
    "TMPDIR",
    "TEMP",
    "TMP",
    "SYSTEMROOT",
    "USERPROFILE",
];

/// Credentials and provider switches the recognizer reads.
pub const RECOGNIZER_SECRETS: &[&str] = &["GEMINI_API_KEY", "ANTHROPIC_API_KEY", "AI_PROVIDER"];

/// Child process environment.
///
/// The child starts from an empty environment. Only the variables named in
/// `inherit` are copied from the parent, then `set` is applied on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvPolicy {
    #[serde(default = "default_inherit")]
    pub inherit: Vec<String>,
    #[serde(default = "default_set")]
    pub set: BTreeMap<String, String>,
}

fn default_inherit() -> Vec<String> {
    BASE_INHERITED_ENV.iter().map(|s| s.to_string()).collect()
}

fn default_set() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
        ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
    ])
}

impl Default for EnvPolicy {
    fn default() -> Self {
        Self {
            inherit: default_inherit(),
            set: default_set(),
        }
    }
}

impl EnvPolicy {
    /// A policy that forwards nothing and sets nothing.
    pub fn empty() -> Self {
        Self {
            inherit: Vec::new(),
            set: BTreeMap::new(),
        }
    }

    pub fn inherit<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.inherit.contains(&name) {
                self.inherit.push(name);
            }
        }
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    /// The exact environment a child would receive right now.
    pub fn resolve(&self) -> Vec<(String, OsString)> {
        let mut vars: BTreeMap<String, OsString> = BTreeMap::new();
        for name in &self.inherit {
            if let Some(value) = std::env::var_os(name) {
                vars.insert(name.clone(), value);
            }
        }
        for (key, value) in &self.set {
            vars.insert(key.clone(), OsString::from(value));
        }
        vars.into_iter().collect()
    }

    pub(crate) fn apply(&self, command: &mut Command) {
        command.env_clear();
        command.envs(self.resolve());
    }
}

/// A configured external worker: program, leading arguments (usually the
/// script path), environment and time limit. Job arguments are appended per
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: EnvPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_dir: Option<PathBuf>,
}

/// Interpreter name the reference Python workers expect on this platform.
pub fn python_program() -> &'static str {
    if cfg!(windows) { "python" } else { "python3" }
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: EnvPolicy::default(),
            timeout_secs: None,
            current_dir: None,
        }
    }

    /// `python3 <script>` with the default environment policy.
    pub fn python(script: impl Into<String>) -> Self {
        Self::new(python_program()).arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, env: EnvPolicy) -> Self {
        self.env = env;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn spec(&self, job_args: Vec<String>, expectation: Expectation) -> InvocationSpec {
        let mut args = self.args.clone();
        args.extend(job_args);
        InvocationSpec::builder()
            .program(self.program.clone())
            .args(args)
            .env(self.env.clone())
            .expectation(expectation)
            .maybe_timeout(self.timeout())
            .maybe_current_dir(self.current_dir.clone())
            .build()
    }

    /// `<worker> <image-path>`, board JSON on stdout.
    pub fn recognize(&self, image: &Path) -> InvocationSpec {
        self.spec(vec![path_arg(image)], Expectation::RecognitionJson)
    }

    /// `<worker> <json-payload> <output-path>`, spreadsheet written to the path.
    pub fn generate(&self, payload: &str, output: &Path) -> InvocationSpec {
        self.spec(
            vec![payload.to_string(), path_arg(output)],
            Expectation::OutputFile(output.to_path_buf()),
        )
    }

    /// `<worker> <input-path> <output-path>`, converted spreadsheet written to the path.
    pub fn convert(&self, input: &Path, output: &Path) -> InvocationSpec {
        self.spec(
            vec![path_arg(input), path_arg(output)],
            Expectation::OutputFile(output.to_path_buf()),
        )
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_policy_forwards_nothing() {
        assert!(EnvPolicy::empty().resolve().is_empty());
    }

    #[test]
    fn test_policy_only_forwards_named_variables() {
        let policy = EnvPolicy::empty()
            .inherit(["PATH", "BOARD_SURELY_UNSET_VARIABLE"])
            .set("PYTHONIOENCODING", "utf-8");
        let vars = policy.resolve();
        let names: Vec<&str> = vars.iter().map(|(k, _)| k.as_str()).collect();

        assert!(names.contains(&"PYTHONIOENCODING"));
        assert!(!names.contains(&"BOARD_SURELY_UNSET_VARIABLE"));
        if std::env::var_os("PATH").is_some() {
            assert!(names.contains(&"PATH"));
        }
        assert!(names.iter().all(|n| *n == "PATH" || *n == "PYTHONIOENCODING"));
    }

    #[test]
    fn test_set_overrides_inherited_value() {
        let policy = EnvPolicy::empty().inherit(["PATH"]).set("PATH", "/opt/worker/bin");
        let vars = policy.resolve();
        assert_eq!(vars, vec![("PATH".to_string(), OsString::from("/opt/worker/bin"))]);
    }

    #[test]
    fn test_inherit_deduplicates() {
        let policy = EnvPolicy::default().inherit(["PATH", "GEMINI_API_KEY"]);
        assert_eq!(policy.inherit.iter().filter(|n| *n == "PATH").count(), 1);
        assert!(policy.inherit.contains(&"GEMINI_API_KEY".to_string()));
    }

    #[test]
    fn test_job_arguments_follow_script() {
        let worker = WorkerCommand::python("basic_excel_generator.py").timeout_secs(30);
        let spec = worker.generate("{\"data\":[]}", Path::new("uploads/out.xlsx"));

        assert_eq!(spec.program, python_program());
        assert_eq!(
            spec.args,
            vec!["basic_excel_generator.py", "{\"data\":[]}", "uploads/out.xlsx"]
        );
        assert_eq!(spec.timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            spec.expectation,
            Expectation::OutputFile(PathBuf::from("uploads/out.xlsx"))
        );
    }

    #[test]
    fn test_recognize_expects_json() {
        let spec = WorkerCommand::python("ocr_engine_v3.py").recognize(Path::new("a.png"));
        assert_eq!(spec.args, vec!["ocr_engine_v3.py", "a.png"]);
        assert_eq!(spec.expectation, Expectation::RecognitionJson);
        assert_eq!(spec.timeout, None);
    }

    #[test]
    fn test_worker_command_deserializes_with_defaults() {
        let worker: WorkerCommand =
            serde_json::from_str(r#"{"program":"python3","args":["excel_converter.py"]}"#).unwrap();
        assert_eq!(worker.env, EnvPolicy::default());
        assert_eq!(worker.env.set.get("PYTHONIOENCODING").map(String::as_str), Some("utf-8"));
    }
}
