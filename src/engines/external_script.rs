use std::{
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::{debug, info};
use serde::{de::DeserializeOwned, Serialize};

use super::EngineError;
use crate::config::EngineConfig;

/// An external program that answers JSON requests.
///
/// The program receives one JSON document on stdin and must print its answer
/// as JSON values, one per line, on stdout. Blank lines are ignored, so both
/// LF and CR+LF line endings work.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRunner {
    script: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl ScriptRunner {
    /// Create a new runner.
    ///
    /// # Arguments
    /// - `script`: the program to call. A bare name is searched for on `PATH`; a
    ///   relative path is resolved against `working_dir`.
    /// - `args`: arguments to pass to the program. Any paths must be absolute or
    ///   relative to the working directory.
    /// - `working_dir`: directory in which to execute the program.
    pub fn new<S: ToString>(script: &str, args: &[S], working_dir: &Path) -> Self {
        Self {
            script: script.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: working_dir.to_path_buf(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.script, config.args.as_slice(), &config.working_dir)
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    /// Find the full path to the program, failing if it is not an executable file.
    pub fn resolve_program(&self) -> Result<PathBuf, EngineError> {
        which::which_in(&self.script, std::env::var_os("PATH"), &self.working_dir)
            .map_err(|e| EngineError::program_not_found(&self.script, e))
    }

    /// Send `request` to the program and parse every non-empty line of its
    /// output as one `R`.
    pub fn call<Q: Serialize, R: DeserializeOwned>(&self, request: &Q) -> Result<Vec<R>, EngineError> {
        let program = self.resolve_program()?;
        let input = serde_json::to_vec(request)
            .map_err(|e| EngineError::RequestError { script: self.script.clone(), error: e })?;

        info!(
            "Calling script '{}' in directory '{}'",
            self.script, self.working_dir.display()
        );
        let mut child = Command::new(&program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| EngineError::script_run_error(&self.script, e))?;

        // the program may start answering before it has read the whole request
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || stdin.write_all(&input))
        });

        let output = child.wait_with_output()
            .map_err(|e| EngineError::script_run_error(&self.script, e))?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => (),
                // a broken pipe here is only an error if the exit status says so
                Ok(Err(e)) => debug!("Could not write the full request to '{}': {e}", self.script),
                Err(_) => debug!("The thread writing to '{}' panicked", self.script),
            }
        }

        if !output.status.success() {
            return Err(EngineError::script_failed_error(
                &self.script,
                &self.args,
                output.status.code(),
            ));
        }

        let mut entries = vec![];
        let mut ientry = 0;
        for line in output.stdout.split(|b| *b == b'\n' || *b == b'\r') {
            let line = line.trim_ascii();
            if !line.is_empty() {
                ientry += 1;
                let entry: R = serde_json::from_slice(line)
                    .map_err(|e| EngineError::entry_parse_error(&self.script, ientry, e, line))?;
                entries.push(entry);
            }
        }

        debug!("Script '{}' returned {} entries", self.script, entries.len());
        Ok(entries)
    }

    /// Like [`ScriptRunner::call`], but fail unless exactly `n` entries are returned.
    pub fn call_expecting<Q: Serialize, R: DeserializeOwned>(&self, request: &Q, n: usize) -> Result<Vec<R>, EngineError> {
        let entries: Vec<R> = self.call(request)?;
        if entries.len() != n {
            return Err(EngineError::WrongNumberOfEntries {
                script: self.script.clone(),
                expected: n,
                actual: entries.len(),
            });
        }
        Ok(entries)
    }

    /// Call the program with a request expecting a single response.
    pub fn call_one<Q: Serialize, R: DeserializeOwned>(&self, request: &Q) -> Result<R, EngineError> {
        let mut entries: Vec<R> = self.call_expecting(request, 1)?;
        entries.pop().ok_or_else(|| EngineError::WrongNumberOfEntries {
            script: self.script.clone(),
            expected: 1,
            actual: 0,
        })
    }
}
