//! Subprocess management for native LP solvers.
//!
//! Each solve runs in its own scratch directory: the LP file is written there,
//! the solver binary is spawned with that directory as its working directory,
//! and the solution file it writes is parsed once the process exits.

use crate::error::{ExitCode, SolverError, SolverResult};
use crate::lp::LinearProgram;
use crate::solution::{parse_cbc, parse_highs, NativeSolution};
use crate::SolverId;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

const MODEL_FILE: &str = "model.lp";
const SOLUTION_FILE: &str = "solution.txt";

/// Handle for running one native solver binary.
#[derive(Debug, Clone)]
pub struct SolverProcess {
    solver_id: SolverId,
    binary_path: PathBuf,
    /// `None` waits for the solver indefinitely.
    timeout_seconds: Option<u64>,
    verbose: bool,
}

impl SolverProcess {
    pub fn new(solver_id: SolverId, binary_path: PathBuf, timeout_seconds: Option<u64>) -> Self {
        Self {
            solver_id,
            binary_path,
            timeout_seconds,
            verbose: false,
        }
    }

    /// Locate the binary and build a handle for it.
    pub fn locate(solver_id: SolverId, timeout_seconds: Option<u64>) -> SolverResult<Self> {
        let binary = Self::find_binary(solver_id)?;
        Ok(Self::new(solver_id, binary, timeout_seconds))
    }

    /// Forward solver output at `info` level instead of `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Find the solver binary.
    ///
    /// Search order:
    /// 1. ~/.ensys/solvers/<binary_name>
    /// 2. System PATH
    pub fn find_binary(solver_id: SolverId) -> SolverResult<PathBuf> {
        let binary_name = solver_id.binary_name();

        if let Some(home) = dirs::home_dir() {
            let local = home.join(".ensys").join("solvers").join(binary_name);
            if local.exists() {
                return Ok(local);
            }
        }

        if let Ok(path) = which::which(binary_name) {
            return Ok(path);
        }

        Err(SolverError::NotInstalled {
            solver: solver_id,
            hint: binary_name.to_string(),
        })
    }

    pub fn is_installed(solver_id: SolverId) -> bool {
        Self::find_binary(solver_id).is_ok()
    }

    pub fn solver_id(&self) -> SolverId {
        self.solver_id
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// The time limit is enforced by the kill timer in [`SolverProcess::solve`],
    /// never passed to the solver.
    fn arguments(&self) -> Vec<String> {
        let args: &[&str] = match self.solver_id {
            SolverId::Cbc => &[MODEL_FILE, "solve", "solu", SOLUTION_FILE],
            SolverId::Highs => &["--model_file", MODEL_FILE, "--solution_file", SOLUTION_FILE],
        };
        args.iter().map(|a| a.to_string()).collect()
    }

    /// Solve `lp` by spawning the solver binary.
    ///
    /// The child is killed if the time limit expires or the future is dropped.
    pub async fn solve(&self, lp: &LinearProgram) -> SolverResult<NativeSolution> {
        let start = Instant::now();
        let workdir = tempfile::Builder::new().prefix("ensys-solve-").tempdir()?;
        lp.write_lp_file(&workdir.path().join(MODEL_FILE))?;

        tracing::debug!(
            solver = %self.solver_id,
            binary = %self.binary_path.display(),
            columns = lp.num_columns(),
            rows = lp.num_rows(),
            "spawning solver"
        );

        let child = Command::new(&self.binary_path)
            .args(self.arguments())
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SolverError::ProcessStart)?;

        let output = match self.timeout_seconds {
            Some(seconds) => {
                // Dropping the wait future on expiry drops the child, which kills it.
                match timeout(Duration::from_secs(seconds), child.wait_with_output()).await {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::warn!(solver = %self.solver_id, seconds, "solver timed out");
                        return Err(SolverError::Timeout { seconds });
                    }
                }
            }
            None => child.wait_with_output().await?,
        };

        self.forward_output(&output.stdout);
        let exit_code = ExitCode::from_status(output.status);
        if !exit_code.is_success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SolverError::ProcessFailed {
                exit_code,
                message: stderr.trim().to_string(),
            });
        }

        let solution_path = workdir.path().join(SOLUTION_FILE);
        let text = std::fs::read_to_string(&solution_path).map_err(|e| {
            SolverError::MalformedSolution(format!(
                "{} produced no readable solution file: {}",
                self.solver_id.display_name(),
                e
            ))
        })?;

        let mut solution = match self.solver_id {
            SolverId::Cbc => parse_cbc(&text, lp)?,
            SolverId::Highs => parse_highs(&text, lp)?,
        };
        // Limits set through solver option files still end up here.
        if solution.time_limited {
            let seconds = self.timeout_seconds.unwrap_or(0);
            tracing::warn!(solver = %self.solver_id, seconds, "solver stopped on its time limit");
            return Err(SolverError::Timeout { seconds });
        }
        solution.solve_time_ms = start.elapsed().as_millis() as u64;
        Ok(solution)
    }

    /// Blocking version of [`SolverProcess::solve`] on a current-thread runtime.
    pub fn solve_blocking(&self, lp: &LinearProgram) -> SolverResult<NativeSolution> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.solve(lp))
    }

    fn forward_output(&self, stdout: &[u8]) {
        let text = String::from_utf8_lossy(stdout);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if self.verbose {
                tracing::info!(solver = %self.solver_id, "{}", line);
            } else {
                tracing::debug!(solver = %self.solver_id, "{}", line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbc_arguments() {
        let process = SolverProcess::new(SolverId::Cbc, PathBuf::from("cbc"), Some(30));
        assert_eq!(
            process.arguments(),
            vec!["model.lp", "solve", "solu", "solution.txt"]
        );
    }

    #[test]
    fn test_highs_arguments() {
        let process = SolverProcess::new(SolverId::Highs, PathBuf::from("highs"), Some(30));
        assert_eq!(
            process.arguments(),
            vec!["--model_file", "model.lp", "--solution_file", "solution.txt"]
        );
    }

    #[test]
    fn test_missing_binary_fails_to_start() {
        let process = SolverProcess::new(
            SolverId::Cbc,
            PathBuf::from("/nonexistent/ensys/cbc"),
            Some(5),
        );
        let lp = LinearProgram::new("empty");
        assert!(matches!(
            process.solve_blocking(&lp),
            Err(SolverError::ProcessStart(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-solver");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let process = SolverProcess::new(SolverId::Cbc, script, Some(1));
        let start = Instant::now();
        let err = process.solve_blocking(&LinearProgram::new("slow")).unwrap_err();
        assert!(matches!(err, SolverError::Timeout { seconds: 1 }));
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_process_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("broken-solver");
        std::fs::write(&script, "#!/bin/sh\necho 'license error' >&2\nexit 2\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let process = SolverProcess::new(SolverId::Highs, script, None);
        match process.solve_blocking(&LinearProgram::new("broken")) {
            Err(SolverError::ProcessFailed { exit_code, message }) => {
                assert_eq!(exit_code, ExitCode::Failure(2));
                assert!(message.contains("license error"));
            }
            other => panic!("expected process failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_solution_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("silent-solver");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let process = SolverProcess::new(SolverId::Cbc, script, None);
        assert!(matches!(
            process.solve_blocking(&LinearProgram::new("silent")),
            Err(SolverError::MalformedSolution(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_scripted_cbc_solution_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-cbc");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'Optimal - objective value 0\\n 0 x 4 0\\n' > solution.txt\n",
        )
        .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut lp = LinearProgram::new("fake");
        lp.add_column("x".into(), 0.0, 10.0, 0.0);
        let process = SolverProcess::new(SolverId::Cbc, script, Some(10)).verbose(true);
        let solution = process.solve_blocking(&lp).unwrap();
        assert_eq!(solution.values, vec![4.0]);
    }

    #[cfg(unix)]
    #[test]
    fn test_solver_time_limit_is_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-cbc");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'Stopped on time - objective value 0\\n' > solution.txt\nexit 0\n",
        )
        .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut lp = LinearProgram::new("limited");
        lp.add_column("x".into(), 0.0, 10.0, 0.0);
        let process = SolverProcess::new(SolverId::Cbc, script, Some(7));
        assert!(matches!(
            process.solve_blocking(&lp),
            Err(SolverError::Timeout { seconds: 7 })
        ));
    }
}
