//! CLI logic for the Floorplan layout compiler.
//!
//! This module wires the command-line arguments to the compiler: it loads the
//! configuration, reads the input payloads, selects an orientation oracle,
//! writes the compilation artifacts and optionally hands the target graph to
//! the execution collaborator.

pub mod error_adapter;

mod args;
mod config;
mod oracle;

pub use args::Args;
pub use oracle::CommandOracle;

use std::{fs, path::Path};

use log::{info, warn};

use floorplan::{
    CancelFlag, CompileInput, DOCUMENT_FILE, FloorplanError, LayoutCompiler,
    handoff::{Automation, CommandAutomation, FileHandoff},
    orientation::{OrientationOracle, StaticOracle},
};

/// Run the Floorplan CLI application
///
/// This function compiles the detection document into `document.json` and
/// `target.json` inside the output directory and, with `--execute`, hands the
/// target graph to the configured automation command (or writes it next to
/// the destination when none is configured).
///
/// # Arguments
///
/// * `args` - Command-line arguments
/// * `cancel` - Flag checked at every stage boundary
///
/// # Errors
///
/// Returns `FloorplanError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Input parsing errors
/// - Any compilation stage error
/// - Execution handoff failures
pub async fn run(args: &Args, cancel: &CancelFlag) -> Result<(), FloorplanError> {
    info!(
        input_path = args.input,
        out_dir = args.out_dir;
        "Compiling layout"
    );

    let app_config = config::load_config(args.config.as_ref())?;
    let compiler = LayoutCompiler::new(app_config);

    let source = fs::read_to_string(&args.input)?;
    let mut input = CompileInput::new(compiler.parse_detections(&source)?);

    if let Some(path) = &args.properties {
        let source = fs::read_to_string(path)?;
        input = input.with_properties(compiler.parse_properties(&source)?);
    }
    if let Some(image) = &args.image {
        input = input.with_image(image);
    }

    let oracle = select_oracle(args)?;
    let out_dir = Path::new(&args.out_dir);
    let compilation = compiler
        .compile_to_dir(&input, oracle.as_ref(), cancel, out_dir)
        .await?;

    let report = compilation.report();
    if !report.conflicts().is_empty() {
        warn!(
            conflicts = report.conflicts().len();
            "Orientation judgments disagreed; first judgments were kept"
        );
    }
    info!(
        objects = compilation.document().layout_objects().len(),
        iterations = report.iterations();
        "Artifacts written"
    );

    if args.execute {
        let destination = args
            .destination
            .as_ref()
            .map_or_else(|| out_dir.join("model"), |path| Path::new(path).to_path_buf());
        let automation: Box<dyn Automation> =
            match CommandAutomation::from_config(compiler.config().automation()) {
                Some(command) => Box::new(command),
                None => Box::new(FileHandoff),
            };

        let execution = compiler
            .execute(
                compilation.target(),
                &destination,
                &out_dir.join(DOCUMENT_FILE),
                automation.as_ref(),
            )
            .await?;
        info!(
            destination = destination.display().to_string(),
            log = execution.log().unwrap_or_default();
            "Model built"
        );
    }

    Ok(())
}

fn select_oracle(args: &Args) -> Result<Box<dyn OrientationOracle>, FloorplanError> {
    if let Some(command) = &args.oracle_command {
        info!(command; "Using oracle command");
        return Ok(Box::new(CommandOracle::new(command, args.oracle_args.clone())));
    }

    if let Some(path) = &args.judgments {
        info!(path; "Replaying recorded judgments");
        let source = fs::read_to_string(path)?;
        let judgments = floorplan_parser::parse_judgments(&source)
            .map_err(|err| FloorplanError::new_parse_error(err, source.as_str()))?;
        return Ok(Box::new(StaticOracle::new(judgments)));
    }

    warn!("No orientation oracle configured; only unjudged kinds can be oriented");
    Ok(Box::new(StaticOracle::default()))
}
