//! Artifact pipeline.
//!
//! Turns `X.asc` into a reversed grid, a BRL-CAD displacement map, an mged
//! script, a compiled `.g` database and a rendered PNG. Every step is an
//! entry in an ordered list; external programs are started through a
//! [`ToolRunner`] and each step reports a [`StepOutcome`].

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::commons::basic_functions::with_suffix;
use crate::commons::global_variables::{
    AZIMUTH, DSP_TOOL, ELEVATION, MGED_TOOL, PNG_TOOL, RAYTRACE_TOOL, RENDER_SIZE, REVERSE_TOOL,
};
use crate::error::DemError;

/// Tool names and render parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub reverse_tool: String,
    pub dsp_tool: String,
    pub mged_tool: String,
    pub raytrace_tool: String,
    pub png_tool: String,
    pub azimuth: i32,
    pub elevation: i32,
    pub render_size: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            reverse_tool: REVERSE_TOOL.to_string(),
            dsp_tool: DSP_TOOL.to_string(),
            mged_tool: MGED_TOOL.to_string(),
            raytrace_tool: RAYTRACE_TOOL.to_string(),
            png_tool: PNG_TOOL.to_string(),
            azimuth: AZIMUTH,
            elevation: ELEVATION,
            render_size: RENDER_SIZE,
        }
    }
}

/// What to do when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and keep going; later steps may produce missing or empty files
    #[default]
    Continue,
    /// Stop at the first failed step or missing input
    Abort,
}

/// Where a child's output stream goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Inherit,
    Null,
    File(PathBuf),
}

/// One external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<OsString>,
    pub stdin: Option<PathBuf>,
    pub stdout: Redirect,
    pub stderr: Redirect,
}

impl ToolCommand {
    fn new(program: &str) -> Self {
        ToolCommand {
            program: program.to_string(),
            args: Vec::new(),
            stdin: None,
            stdout: Redirect::Inherit,
            stderr: Redirect::Inherit,
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn stdin(mut self, path: &Path) -> Self {
        self.stdin = Some(path.to_path_buf());
        self
    }

    fn stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = redirect;
        self
    }

    fn stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = redirect;
        self
    }
}

/// Starts external programs and waits for them
pub trait ToolRunner {
    /// Run to completion; `Ok(None)` when the child had no exit code
    fn run(&mut self, command: &ToolCommand) -> io::Result<Option<i32>>;
}

/// Runs tools with `std::process::Command`
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, command: &ToolCommand) -> io::Result<Option<i32>> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(path) = &command.stdin {
            cmd.stdin(File::open(path)?);
        }
        cmd.stdout(stdio_for(&command.stdout)?);
        cmd.stderr(stdio_for(&command.stderr)?);
        let status = cmd.status()?;
        Ok(status.code())
    }
}

fn stdio_for(redirect: &Redirect) -> io::Result<Stdio> {
    Ok(match redirect {
        Redirect::Inherit => Stdio::inherit(),
        Redirect::Null => Stdio::null(),
        Redirect::File(path) => Stdio::from(File::create(path)?),
    })
}

/// Work done by a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Run(ToolCommand),
    /// Write the given text to the step's output
    WriteScript(String),
}

/// One entry of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStep {
    pub label: &'static str,
    pub action: StepAction,
    /// Files that must exist for the step to make sense
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Deleted before the step runs
    pub remove_first: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    /// Exit code, `None` when killed by a signal
    Failed(Option<i32>),
    /// The step never ran: missing input, spawn error or write error
    NotRun(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub label: &'static str,
    pub output: PathBuf,
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// File names derived from the base name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub grid: PathBuf,
    pub info: PathBuf,
    pub reversed: PathBuf,
    pub dsp: PathBuf,
    pub mged: PathBuf,
    pub database: PathBuf,
    pub pix: PathBuf,
    pub png: PathBuf,
    /// Object names inside the model database
    pub solid: String,
    pub region: String,
}

impl ArtifactPaths {
    pub fn new(base: &Path, config: &PipelineConfig) -> Self {
        let view = format!("-az{}-el{}", config.azimuth, config.elevation);
        // mged object names cannot contain directories
        let object = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| base.to_string_lossy().into_owned());
        ArtifactPaths {
            grid: with_suffix(base, ".asc"),
            info: with_suffix(base, ".info"),
            reversed: with_suffix(base, "-reversed.asc"),
            dsp: with_suffix(base, ".dsp"),
            mged: with_suffix(base, ".mged"),
            database: with_suffix(base, ".g"),
            pix: with_suffix(base, &format!("{}.pix", view)),
            png: with_suffix(base, &format!("{}.png", view)),
            solid: format!("{}.s", object),
            region: format!("{}.r", object),
        }
    }

    /// Every file the run produces, in creation order
    pub fn all(&self) -> Vec<&Path> {
        [
            &self.grid,
            &self.info,
            &self.reversed,
            &self.dsp,
            &self.mged,
            &self.database,
            &self.pix,
            &self.png,
        ]
        .into_iter()
        .map(PathBuf::as_path)
        .collect()
    }
}

/// Text of the mged script that builds the displacement-map solid
pub fn mged_script(paths: &ArtifactPaths, width: usize, height: usize, cell_size: i64) -> String {
    format!(
        "units m\nin {} dsp f {} {} {} 0 ad {} 1\nr {} u {}\n",
        paths.solid,
        paths.dsp.display(),
        width,
        height,
        cell_size,
        paths.region,
        paths.solid
    )
}

/// Ordered artifact steps
pub fn build_steps(
    paths: &ArtifactPaths,
    config: &PipelineConfig,
    width: usize,
    height: usize,
    cell_size: i64,
) -> Vec<ArtifactStep> {
    let size = format!("-s{}", config.render_size);
    vec![
        ArtifactStep {
            label: "reverse grid",
            action: StepAction::Run(
                ToolCommand::new(&config.reverse_tool)
                    .arg(&paths.grid)
                    .stdout(Redirect::File(paths.reversed.clone())),
            ),
            inputs: vec![paths.grid.clone()],
            output: paths.reversed.clone(),
            remove_first: Vec::new(),
        },
        ArtifactStep {
            label: "displacement map",
            action: StepAction::Run(
                ToolCommand::new(&config.dsp_tool)
                    .arg(&paths.reversed)
                    .arg(&paths.dsp),
            ),
            inputs: vec![paths.reversed.clone()],
            output: paths.dsp.clone(),
            remove_first: Vec::new(),
        },
        ArtifactStep {
            label: "mged script",
            action: StepAction::WriteScript(mged_script(paths, width, height, cell_size)),
            inputs: Vec::new(),
            output: paths.mged.clone(),
            remove_first: Vec::new(),
        },
        ArtifactStep {
            label: "model database",
            action: StepAction::Run(
                ToolCommand::new(&config.mged_tool)
                    .arg("-c")
                    .arg(&paths.database)
                    .stdin(&paths.mged),
            ),
            inputs: vec![paths.mged.clone(), paths.dsp.clone()],
            output: paths.database.clone(),
            remove_first: vec![paths.database.clone()],
        },
        ArtifactStep {
            label: "raytrace",
            action: StepAction::Run(
                ToolCommand::new(&config.raytrace_tool)
                    .arg("-R")
                    .arg("-o")
                    .arg(&paths.pix)
                    .arg(&size)
                    .arg(format!("-a{}", config.azimuth))
                    .arg(format!("-e{}", config.elevation))
                    .arg(&paths.database)
                    .arg(&paths.region)
                    .stdout(Redirect::Null)
                    .stderr(Redirect::Null),
            ),
            inputs: vec![paths.database.clone()],
            output: paths.pix.clone(),
            remove_first: vec![paths.pix.clone(), paths.png.clone()],
        },
        ArtifactStep {
            label: "png image",
            action: StepAction::Run(
                ToolCommand::new(&config.png_tool)
                    .arg(&size)
                    .arg(&paths.pix)
                    .stdout(Redirect::File(paths.png.clone())),
            ),
            inputs: vec![paths.pix.clone()],
            output: paths.png.clone(),
            remove_first: Vec::new(),
        },
    ]
}

/// Run the steps in order.
/// Under [`FailurePolicy::Abort`] the first failure or missing input is
/// returned as [`DemError::StepFailed`]; otherwise every step runs and
/// failures are only logged.
pub fn run_steps(
    steps: &[ArtifactStep],
    runner: &mut dyn ToolRunner,
    policy: FailurePolicy,
) -> Result<Vec<StepOutcome>> {
    let mut outcomes = Vec::with_capacity(steps.len());
    for step in steps {
        let outcome = run_step(step, runner, policy)?;
        if !outcome.succeeded() {
            let reason = describe(&outcome.status);
            if policy == FailurePolicy::Abort {
                return Err(DemError::StepFailed {
                    step: step.label,
                    reason,
                }
                .into());
            }
            warn!(step = step.label, "{}", reason);
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

fn run_step(
    step: &ArtifactStep,
    runner: &mut dyn ToolRunner,
    policy: FailurePolicy,
) -> Result<StepOutcome> {
    for stale in &step.remove_first {
        match std::fs::remove_file(stale) {
            Ok(()) => debug!(path = %stale.display(), "removed stale output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) if policy == FailurePolicy::Abort => {
                return Err(e).context(format!("Failed to remove {}", stale.display()));
            }
            Err(e) => warn!(path = %stale.display(), "could not remove stale output: {}", e),
        }
    }

    let missing: Vec<String> = step
        .inputs
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();
    if !missing.is_empty() {
        let reason = format!("missing input {}", missing.join(", "));
        if policy == FailurePolicy::Abort {
            return Ok(StepOutcome {
                label: step.label,
                output: step.output.clone(),
                status: StepStatus::NotRun(reason),
            });
        }
        warn!(step = step.label, "{}", reason);
    }

    let status = match &step.action {
        StepAction::Run(command) => {
            info!(step = step.label, program = %command.program, "running");
            match runner.run(command) {
                Ok(Some(0)) => StepStatus::Succeeded,
                Ok(code) => StepStatus::Failed(code),
                Err(e) => StepStatus::NotRun(format!("could not run {}: {}", command.program, e)),
            }
        }
        StepAction::WriteScript(text) => match std::fs::write(&step.output, text) {
            Ok(()) => StepStatus::Succeeded,
            Err(e) => StepStatus::NotRun(format!(
                "could not write {}: {}",
                step.output.display(),
                e
            )),
        },
    };

    Ok(StepOutcome {
        label: step.label,
        output: step.output.clone(),
        status,
    })
}

fn describe(status: &StepStatus) -> String {
    match status {
        StepStatus::Succeeded => "succeeded".to_string(),
        StepStatus::Failed(Some(code)) => format!("exited with status {}", code),
        StepStatus::Failed(None) => "terminated by signal".to_string(),
        StepStatus::NotRun(reason) => reason.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records commands instead of running them
    #[derive(Default)]
    struct RecordingRunner {
        commands: Vec<ToolCommand>,
        fail_program: Option<String>,
    }

    impl ToolRunner for RecordingRunner {
        fn run(&mut self, command: &ToolCommand) -> io::Result<Option<i32>> {
            self.commands.push(command.clone());
            if self.fail_program.as_deref() == Some(command.program.as_str()) {
                return Ok(Some(1));
            }
            // pretend the tool produced its output
            if let Redirect::File(path) = &command.stdout {
                std::fs::write(path, b"x")?;
            }
            if let Some(last) = command.args.last() {
                let last = PathBuf::from(last);
                if command.program == DSP_TOOL || command.program == MGED_TOOL {
                    std::fs::write(&last, b"x")?;
                }
            }
            if command.program == RAYTRACE_TOOL {
                std::fs::write(PathBuf::from(&command.args[2]), b"x")?;
            }
            Ok(Some(0))
        }
    }

    fn setup() -> (tempfile::TempDir, ArtifactPaths, Vec<ArtifactStep>) {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default();
        let paths = ArtifactPaths::new(&dir.path().join("crater"), &config);
        std::fs::write(&paths.grid, " 1 2\n 3 4\n").unwrap();
        let steps = build_steps(&paths, &config, 2, 2, 30);
        (dir, paths, steps)
    }

    #[test]
    fn test_artifact_paths() {
        let paths = ArtifactPaths::new(Path::new("out/grand"), &PipelineConfig::default());
        assert_eq!(paths.grid, PathBuf::from("out/grand.asc"));
        assert_eq!(paths.reversed, PathBuf::from("out/grand-reversed.asc"));
        assert_eq!(paths.pix, PathBuf::from("out/grand-az35-el25.pix"));
        assert_eq!(paths.png, PathBuf::from("out/grand-az35-el25.png"));
        assert_eq!(paths.solid, "grand.s");
        assert_eq!(paths.region, "grand.r");
        assert_eq!(paths.all().len(), 8);
    }

    #[test]
    fn test_mged_script() {
        let paths = ArtifactPaths::new(Path::new("out"), &PipelineConfig::default());
        assert_eq!(
            mged_script(&paths, 1201, 1198, 30),
            "units m\nin out.s dsp f out.dsp 1201 1198 0 ad 30 1\nr out.r u out.s\n"
        );
    }

    #[test]
    fn test_build_steps_order_and_commands() {
        let (_dir, paths, steps) = setup();
        let labels: Vec<_> = steps.iter().map(|s| s.label).collect();
        assert_eq!(
            labels,
            vec![
                "reverse grid",
                "displacement map",
                "mged script",
                "model database",
                "raytrace",
                "png image"
            ]
        );

        match &steps[4].action {
            StepAction::Run(cmd) => {
                assert_eq!(cmd.program, "rt");
                let args: Vec<String> = cmd
                    .args
                    .iter()
                    .map(|a| a.to_string_lossy().into_owned())
                    .collect();
                assert_eq!(args[0], "-R");
                assert_eq!(args[3], "-s1536");
                assert_eq!(args[4], "-a35");
                assert_eq!(args[5], "-e25");
                assert_eq!(args[7], "crater.r");
                assert_eq!(cmd.stdout, Redirect::Null);
            }
            other => panic!("unexpected action: {:?}", other),
        }
        match &steps[3].action {
            StepAction::Run(cmd) => assert_eq!(cmd.stdin.as_ref(), Some(&paths.mged)),
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_run_steps_all_succeed() {
        let (_dir, paths, steps) = setup();
        let mut runner = RecordingRunner::default();
        let outcomes = run_steps(&steps, &mut runner, FailurePolicy::Continue).unwrap();

        assert_eq!(outcomes.len(), 6);
        assert!(outcomes.iter().all(StepOutcome::succeeded));
        // five external programs, the script is written in-process
        let programs: Vec<_> = runner.commands.iter().map(|c| c.program.as_str()).collect();
        assert_eq!(programs, vec!["tac", "asc2dsp", "mged", "rt", "pix-png"]);
        assert!(std::fs::read_to_string(&paths.mged)
            .unwrap()
            .starts_with("units m\n"));
    }

    #[test]
    fn test_run_steps_continue_after_failure() {
        let (_dir, _paths, steps) = setup();
        let mut runner = RecordingRunner {
            fail_program: Some("asc2dsp".to_string()),
            ..Default::default()
        };
        let outcomes = run_steps(&steps, &mut runner, FailurePolicy::Continue).unwrap();

        assert_eq!(outcomes.len(), 6);
        assert_eq!(outcomes[1].status, StepStatus::Failed(Some(1)));
        // later tools still ran
        assert_eq!(runner.commands.len(), 5);
        assert_eq!(outcomes.iter().filter(|o| !o.succeeded()).count(), 1);
    }

    #[test]
    fn test_run_steps_abort_on_failure() {
        let (_dir, _paths, steps) = setup();
        let mut runner = RecordingRunner {
            fail_program: Some("asc2dsp".to_string()),
            ..Default::default()
        };
        let err = run_steps(&steps, &mut runner, FailurePolicy::Abort).unwrap_err();
        match err.downcast_ref::<DemError>() {
            Some(DemError::StepFailed { step, .. }) => assert_eq!(*step, "displacement map"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(runner.commands.len(), 2);
    }

    #[test]
    fn test_abort_on_missing_input() {
        let (_dir, paths, steps) = setup();
        std::fs::remove_file(&paths.grid).unwrap();
        let mut runner = RecordingRunner::default();
        let err = run_steps(&steps, &mut runner, FailurePolicy::Abort).unwrap_err();
        assert!(err.to_string().contains("missing input"));
        assert!(runner.commands.is_empty());
    }

    #[test]
    fn test_stale_outputs_removed() {
        let (_dir, paths, steps) = setup();
        std::fs::write(&paths.png, b"old").unwrap();
        let mut runner = RecordingRunner {
            fail_program: Some("pix-png".to_string()),
            ..Default::default()
        };
        run_steps(&steps, &mut runner, FailurePolicy::Continue).unwrap();
        assert!(!paths.png.exists());
    }

    #[test]
    fn test_unremovable_stale_output() {
        let (_dir, paths, steps) = setup();
        // a directory cannot be removed with remove_file
        std::fs::create_dir(&paths.database).unwrap();

        let mut runner = RecordingRunner::default();
        let outcomes = run_steps(&steps, &mut runner, FailurePolicy::Continue).unwrap();
        assert_eq!(outcomes.len(), 6);
        let programs: Vec<_> = runner.commands.iter().map(|c| c.program.as_str()).collect();
        assert_eq!(programs, vec!["tac", "asc2dsp", "mged", "rt", "pix-png"]);
        assert!(paths.database.is_dir());

        let mut runner = RecordingRunner::default();
        let err = run_steps(&steps, &mut runner, FailurePolicy::Abort).unwrap_err();
        assert!(err.to_string().contains("Failed to remove"));
        assert!(!runner.commands.iter().any(|c| c.program == "mged"));
    }

    #[test]
    fn test_spawn_error_is_reported() {
        struct Unavailable;
        impl ToolRunner for Unavailable {
            fn run(&mut self, _command: &ToolCommand) -> io::Result<Option<i32>> {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such program"))
            }
        }

        let (_dir, _paths, steps) = setup();
        let outcomes = run_steps(&steps[..1], &mut Unavailable, FailurePolicy::Continue).unwrap();
        match &outcomes[0].status {
            StepStatus::NotRun(reason) => assert!(reason.contains("could not run tac")),
            other => panic!("unexpected status: {:?}", other),
        }
    }
}
