//! Jarvis CLI Entry Point
//!
//! Manages stored workflows and runs their tasks.
//!
//! # Usage
//!
//! ```bash
//! # Import workflows from a file and list them
//! jarvis import deploy.yaml
//! jarvis list
//!
//! # Run tasks in order; later tasks can reference earlier output
//! jarvis run deploy 1 2 --dump-cache
//!
//! # Run a whole workflow in a specific terminal
//! jarvis run-all deploy --terminal xterm
//!
//! # Edit a workflow
//! jarvis add-task deploy "Greet" --script user-greeting
//! jarvis set-param deploy <task-id> platform '${task-1.output.os.platform}'
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{debug, error, info, warn};

use jarvis::execution::{OutputCache, RunResult, TaskRunner};
use jarvis::paths::{SCRIPTS_DIR, STORE_PATH};
use jarvis::scripts::{ScriptCatalog, ScriptRegistry};
use jarvis::terminal::{SystemTerminal, TerminalLauncher};
use jarvis::variables::{available_references, preview};
use jarvis::workflow::{reference_warnings, Task, Workflow, WorkflowStore};
use jarvis::{APP_NAME, VERSION};

/// Script definitions picked up from the scripts directory when present.
const DEFAULT_SCRIPTS_FILE: &str = "scripts.yaml";

/// Subcommand selected on the command line.
#[derive(Debug, PartialEq)]
enum Command {
    List,
    Show(String),
    Run { workflow: String, tasks: Vec<String> },
    RunAll(String),
    Preview { workflow: String, task: String },
    Scripts,
    Terminals,
    Import(String),
    AddWorkflow(String),
    AddTask { workflow: String, name: String },
    AddCommand { workflow: String, task: String, command: String },
    SetParam { workflow: String, task: String, key: String, value: String },
    DeleteWorkflow(String),
    DeleteTask { workflow: String, task: String },
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    command: Command,
    store_path: Option<PathBuf>,
    scripts_file: Option<PathBuf>,
    terminal: Option<String>,
    script: Option<String>,
    dump_cache: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: Command::List,
            store_path: None,
            scripts_file: None,
            terminal: None,
            script: None,
            dump_cache: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: jarvis [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("Commands:");
    println!("  list                                  List stored workflows");
    println!("  show <WORKFLOW>                       Show a workflow's tasks");
    println!("  run <WORKFLOW> <TASK>...              Run tasks in the given order");
    println!("  run-all <WORKFLOW>                    Run every task of a workflow");
    println!("  preview <WORKFLOW> <TASK>             Show how a task's parameters resolve");
    println!("  scripts                               List available scripts");
    println!("  terminals                             List detected terminals");
    println!("  import <FILE>                         Import workflows from YAML or JSON");
    println!("  add-workflow <NAME>                   Create an empty workflow");
    println!("  add-task <WORKFLOW> <NAME>            Add a task (see --script)");
    println!("  add-command <WORKFLOW> <TASK> <CMD>   Append a command to a task");
    println!("  set-param <WORKFLOW> <TASK> <KEY> <VALUE>");
    println!("                                        Set a script parameter");
    println!("  delete-workflow <WORKFLOW>            Delete a workflow");
    println!("  delete-task <WORKFLOW> <TASK>         Delete a task");
    println!();
    println!("Workflows and tasks are matched by id, then by name.");
    println!();
    println!("Options:");
    println!("  --store PATH         Workflow store file (default: {})", STORE_PATH.display());
    println!("  --scripts-file PATH  Extra script definitions (YAML or JSON)");
    println!("  --terminal ID        Terminal used for command tasks");
    println!("  --script ID          Script for add-task (makes a script task)");
    println!("  --dump-cache         Print the output cache after running");
    println!("  --verbose            Enable debug logging");
    println!("  --help               Show this help message");
    println!("  --version            Show version information");
    println!();
    println!("Environment:");
    println!("  JARVIS_STORE         Default workflow store file");
    println!("  JARVIS_SCRIPTS_DIR   Directory relative script paths resolve against");
}

/// Builds a subcommand from positional arguments.
fn parse_command(positional: &[String]) -> Result<Command, String> {
    let Some((name, rest)) = positional.split_first() else {
        return Err("No command given".to_string());
    };

    let expect = |count: usize, usage: &str| -> Result<(), String> {
        if rest.len() == count {
            Ok(())
        } else {
            Err(format!("Usage: jarvis {}", usage))
        }
    };

    let command = match name.as_str() {
        "list" => {
            expect(0, "list")?;
            Command::List
        }
        "show" => {
            expect(1, "show <WORKFLOW>")?;
            Command::Show(rest[0].clone())
        }
        "run" => {
            if rest.len() < 2 {
                return Err("Usage: jarvis run <WORKFLOW> <TASK>...".to_string());
            }
            Command::Run {
                workflow: rest[0].clone(),
                tasks: rest[1..].to_vec(),
            }
        }
        "run-all" => {
            expect(1, "run-all <WORKFLOW>")?;
            Command::RunAll(rest[0].clone())
        }
        "preview" => {
            expect(2, "preview <WORKFLOW> <TASK>")?;
            Command::Preview {
                workflow: rest[0].clone(),
                task: rest[1].clone(),
            }
        }
        "scripts" => {
            expect(0, "scripts")?;
            Command::Scripts
        }
        "terminals" => {
            expect(0, "terminals")?;
            Command::Terminals
        }
        "import" => {
            expect(1, "import <FILE>")?;
            Command::Import(rest[0].clone())
        }
        "add-workflow" => {
            expect(1, "add-workflow <NAME>")?;
            Command::AddWorkflow(rest[0].clone())
        }
        "add-task" => {
            expect(2, "add-task <WORKFLOW> <NAME> [--script ID]")?;
            Command::AddTask {
                workflow: rest[0].clone(),
                name: rest[1].clone(),
            }
        }
        "add-command" => {
            expect(3, "add-command <WORKFLOW> <TASK> <CMD>")?;
            Command::AddCommand {
                workflow: rest[0].clone(),
                task: rest[1].clone(),
                command: rest[2].clone(),
            }
        }
        "set-param" => {
            expect(4, "set-param <WORKFLOW> <TASK> <KEY> <VALUE>")?;
            Command::SetParam {
                workflow: rest[0].clone(),
                task: rest[1].clone(),
                key: rest[2].clone(),
                value: rest[3].clone(),
            }
        }
        "delete-workflow" => {
            expect(1, "delete-workflow <WORKFLOW>")?;
            Command::DeleteWorkflow(rest[0].clone())
        }
        "delete-task" => {
            expect(2, "delete-task <WORKFLOW> <TASK>")?;
            Command::DeleteTask {
                workflow: rest[0].clone(),
                task: rest[1].clone(),
            }
        }
        other => return Err(format!("Unknown command: {}", other)),
    };

    Ok(command)
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional = Vec::new();
    let mut i = 1; // Skip program name

    // Fetches the value following an option.
    let value = |i: &mut usize, option: &str| -> Result<String, String> {
        *i += 1;
        args.get(*i)
            .cloned()
            .ok_or_else(|| format!("{} requires an argument", option))
    };

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => config.verbose = true,
            "--dump-cache" => config.dump_cache = true,
            "--store" => config.store_path = Some(PathBuf::from(value(&mut i, arg)?)),
            "--scripts-file" => config.scripts_file = Some(PathBuf::from(value(&mut i, arg)?)),
            "--terminal" => config.terminal = Some(value(&mut i, arg)?),
            "--script" => config.script = Some(value(&mut i, arg)?),
            arg if arg.starts_with("--") => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => positional.push(arg.clone()),
        }
        i += 1;
    }

    config.command = parse_command(&positional)?;
    Ok(config)
}

/// Builds the script catalog, including any definitions file.
fn build_catalog(config: &Config) -> Result<ScriptCatalog, Box<dyn std::error::Error>> {
    let mut catalog = ScriptCatalog::with_builtins(SCRIPTS_DIR.as_path());

    let definitions = match &config.scripts_file {
        Some(path) => Some(path.clone()),
        None => Some(SCRIPTS_DIR.join(DEFAULT_SCRIPTS_FILE)).filter(|p| p.exists()),
    };
    if let Some(path) = definitions {
        catalog.load_definitions(&path)?;
    }

    Ok(catalog)
}

/// Finds a workflow by id, then by name.
fn find_workflow<'a>(store: &'a WorkflowStore, key: &str) -> Result<&'a Workflow, String> {
    store
        .get_workflow(key)
        .or_else(|| store.all_workflows().iter().find(|w| w.name == key))
        .ok_or_else(|| format!("Workflow '{}' not found", key))
}

/// Finds a task by id, then by name.
fn find_task<'a>(workflow: &'a Workflow, key: &str) -> Result<&'a Task, String> {
    workflow
        .get_task(key)
        .or_else(|| workflow.tasks.iter().find(|t| t.name == key))
        .ok_or_else(|| format!("Task '{}' not found in workflow '{}'", key, workflow.name))
}

/// Resolves workflow and task keys to ids.
fn task_ids(store: &WorkflowStore, workflow: &str, task: &str) -> Result<(String, String), String> {
    let workflow = find_workflow(store, workflow)?;
    let task = find_task(workflow, task)?;
    Ok((workflow.id.clone(), task.id.clone()))
}

fn print_result(task: &Task, result: &RunResult) {
    let label = format!("{} ({})", task.name, task.id);
    if result.success {
        let message = result.message.as_deref().unwrap_or("done");
        println!("{} {} {}", "OK".green().bold(), label, message.dimmed());
        if let Some(output) = &result.output {
            match serde_json::to_string_pretty(output) {
                Ok(text) => println!("{}", text),
                Err(e) => warn!("Could not render output: {}", e),
            }
        }
    } else {
        let error = result.error.as_deref().unwrap_or("unknown error");
        println!("{} {} {}", "FAILED".red().bold(), label, error);
    }
}

/// Runs tasks in order with one shared cache. Returns false if any failed.
async fn run_tasks(config: &Config, workflow: &Workflow, tasks: &[&Task]) -> Result<bool, Box<dyn std::error::Error>> {
    let catalog = build_catalog(config)?;
    let launcher = SystemTerminal::detect();
    let mut runner = TaskRunner::new(Arc::new(catalog), Arc::new(launcher), OutputCache::new());
    if let Some(terminal) = &config.terminal {
        runner.set_default_terminal(terminal.clone());
    }

    info!("Running {} task(s) of workflow '{}'", tasks.len(), workflow.name);

    let mut all_ok = true;
    for task in tasks {
        for param in &task.parameters {
            debug!(
                "  {} = {}",
                param.key,
                preview(&param.value, &workflow.id, runner.cache())
            );
        }
        let result = runner.run_task(task, &workflow.id, None).await;
        print_result(task, &result);
        all_ok &= result.success;
    }

    if config.dump_cache {
        println!("{}", serde_json::to_string_pretty(&runner.cache().snapshot())?);
    }

    Ok(all_ok)
}

fn show_workflow(workflow: &Workflow) {
    println!("{} {}", workflow.name.bold(), format!("({})", workflow.id).dimmed());
    for task in &workflow.tasks {
        let target = task.script_id.as_deref().unwrap_or("");
        println!("  {} {} [{}] {}", task.id, task.name, task.task_type, target);
        for command in &task.commands {
            println!("      $ {}", command);
        }
        for param in &task.parameters {
            println!("      {} = {}", param.key, param.value);
        }
    }
    for warning in reference_warnings(workflow) {
        println!("  {} {}", "warning:".yellow(), warning);
    }
}

/// Main application logic. Returns false if a task run failed.
async fn run(config: Config) -> Result<bool, Box<dyn std::error::Error>> {
    let store_path = config.store_path.clone().unwrap_or_else(|| STORE_PATH.to_path_buf());
    let mut store = WorkflowStore::open(store_path)?;

    match &config.command {
        Command::List => {
            if store.all_workflows().is_empty() {
                println!("No workflows in {}", store.path().display());
            }
            for workflow in store.all_workflows() {
                println!("{}  {} ({} tasks)", workflow.id, workflow.name, workflow.len());
            }
        }
        Command::Show(key) => show_workflow(find_workflow(&store, key)?),
        Command::Run { workflow, tasks } => {
            let workflow = find_workflow(&store, workflow)?;
            let tasks = tasks
                .iter()
                .map(|key| find_task(workflow, key))
                .collect::<Result<Vec<_>, _>>()?;
            return run_tasks(&config, workflow, &tasks).await;
        }
        Command::RunAll(key) => {
            let workflow = find_workflow(&store, key)?;
            let tasks: Vec<&Task> = workflow.tasks.iter().collect();
            return run_tasks(&config, workflow, &tasks).await;
        }
        Command::Preview { workflow, task } => {
            let workflow = find_workflow(&store, workflow)?;
            let task = find_task(workflow, task)?;
            let cache = OutputCache::new();

            for param in &task.parameters {
                println!("{} = {}", param.key, preview(&param.value, &workflow.id, &cache));
            }
            let references = available_references(workflow, Some(&task.id), &cache);
            if references.is_empty() {
                println!("{}", "No task output available in this process".dimmed());
            }
            for reference in references {
                println!("  {}  {}", reference.expression, reference.value);
            }
        }
        Command::Scripts => {
            let catalog = build_catalog(&config)?;
            for script in catalog.all_scripts() {
                let required = if script.required_params.is_empty() {
                    String::new()
                } else {
                    format!(" (requires: {})", script.required_params.join(", "))
                };
                println!("{}  {}{}", script.id.bold(), script.description, required.dimmed());
            }
        }
        Command::Terminals => {
            let terminals = SystemTerminal::detect().available_terminals();
            if terminals.is_empty() {
                println!("No supported terminals found");
            }
            for terminal in terminals {
                println!("{}  {}", terminal.id.bold(), terminal.name);
            }
        }
        Command::Import(path) => {
            let ids = store.import(path)?;
            println!("{} Imported {}", "OK".green().bold(), ids.join(", "));
        }
        Command::AddWorkflow(name) => {
            let workflow = store.add_workflow(name)?;
            println!("{} Created workflow {}", "OK".green().bold(), workflow.id);
        }
        Command::AddTask { workflow, name } => {
            let workflow_id = find_workflow(&store, workflow)?.id.clone();
            let task = store.add_task(&workflow_id, name, config.script.as_deref())?;
            println!("{} Created task {}", "OK".green().bold(), task.id);
        }
        Command::AddCommand { workflow, task, command } => {
            let (workflow_id, task_id) = task_ids(&store, workflow, task)?;
            store.add_command(&workflow_id, &task_id, command)?;
        }
        Command::SetParam { workflow, task, key, value } => {
            let (workflow_id, task_id) = task_ids(&store, workflow, task)?;
            store.set_parameter(&workflow_id, &task_id, key, value)?;
        }
        Command::DeleteWorkflow(key) => {
            let workflow_id = find_workflow(&store, key)?.id.clone();
            let removed = store.delete_workflow(&workflow_id)?;
            println!("{} Deleted workflow {}", "OK".green().bold(), removed.name);
        }
        Command::DeleteTask { workflow, task } => {
            let (workflow_id, task_id) = task_ids(&store, workflow, task)?;
            let removed = store.delete_task(&workflow_id, &task_id)?;
            println!("{} Deleted task {}", "OK".green().bold(), removed.name);
        }
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let config = match parse_arguments(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    setup_logging(config.verbose);

    match run(config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("jarvis")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_run_with_options() {
        let config = parse_arguments(&args(&[
            "--terminal", "xterm", "run", "deploy", "1", "2", "--dump-cache",
        ]))
        .unwrap();

        assert_eq!(config.terminal.as_deref(), Some("xterm"));
        assert!(config.dump_cache);
        assert_eq!(
            config.command,
            Command::Run {
                workflow: "deploy".into(),
                tasks: vec!["1".into(), "2".into()],
            }
        );
    }

    #[test]
    fn test_parse_add_task_with_script() {
        let config = parse_arguments(&args(&["add-task", "w", "Greet", "--script", "user-greeting"])).unwrap();
        assert_eq!(config.script.as_deref(), Some("user-greeting"));
        assert_eq!(
            config.command,
            Command::AddTask {
                workflow: "w".into(),
                name: "Greet".into(),
            }
        );
    }

    #[test]
    fn test_parse_set_param_keeps_reference_text() {
        let config = parse_arguments(&args(&[
            "set-param", "w", "2", "platform", "${task-1.output.os.platform}",
        ]))
        .unwrap();
        match config.command {
            Command::SetParam { value, .. } => assert_eq!(value, "${task-1.output.os.platform}"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&[])).is_err());
        assert!(parse_arguments(&args(&["frobnicate"])).is_err());
        assert!(parse_arguments(&args(&["run", "w"])).is_err());
        assert!(parse_arguments(&args(&["show"])).is_err());
        assert!(parse_arguments(&args(&["list", "--store"])).is_err());
        assert!(parse_arguments(&args(&["list", "--bogus"])).is_err());
    }

    #[test]
    fn test_find_by_id_or_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = WorkflowStore::open(dir.path().join("w.json")).unwrap();
        let id = store.add_workflow("Deploy").unwrap().id.clone();
        store.add_task(&id, "Build", None).unwrap();

        let by_name = find_workflow(&store, "Deploy").unwrap();
        assert_eq!(by_name.id, id);
        assert!(find_workflow(&store, &id).is_ok());
        assert!(find_workflow(&store, "nope").is_err());

        assert!(find_task(by_name, "Build").is_ok());
        assert!(find_task(by_name, "Test").is_err());
    }
}
