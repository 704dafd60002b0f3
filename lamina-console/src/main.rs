mod command;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use lamina_core::action::ActionSource;
use lamina_core::{ActionContext, ActionDispatcher, ActionRegistry, AppState, Config, ParamValue, ResourceLockHandle};

use command::{Command, CommandError, HELP};

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lamina")
        .join("lamina.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path).or_else(|_| File::create(std::env::temp_dir().join("lamina.log"))) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("lamina: cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, simplelog::Config::default(), log_file) {
        eprintln!("lamina: failed to initialize logger: {}", e);
        return;
    }

    log::info!("lamina starting (log level: {:?})", log_level);
}

/// Prints an action's outcome, prefixed with the line that issued it.
struct PrintContext {
    label: String,
}

impl ActionContext for PrintContext {
    fn report_error(&self, message: &str) {
        println!("[{}] error: {}", self.label, message);
    }

    fn report_need_resource(&self, lock: &ResourceLockHandle) {
        println!("[{}] waiting for {}", self.label, lock.name());
    }

    fn report_success(&self, result: Option<&ParamValue>) {
        match result {
            Some(value) => println!("[{}] ok -> {}", self.label, value),
            None => println!("[{}] ok", self.label),
        }
    }

    fn report_message(&self, message: &str) {
        println!("[{}] {}", self.label, message);
    }

    fn source(&self) -> ActionSource {
        ActionSource::Script
    }
}

enum Flow {
    Continue,
    Quit,
}

struct Console {
    app: AppState,
    registry: ActionRegistry,
    issued: usize,
}

impl Console {
    fn execute(&mut self, line: &str) -> Result<Flow, lamina_core::ActionError> {
        match Command::parse(line) {
            Command::Empty => {}
            Command::Help => println!("{}", HELP),
            Command::List => {
                for usage in self.registry.usage() {
                    println!("  {}", usage);
                }
            }
            Command::States(prefix) => {
                for (id, value) in self.app.states.export_all() {
                    if prefix.map_or(true, |p| id.starts_with(p)) {
                        println!("  {} = {}", id, value);
                    }
                }
            }
            Command::Get(id) => match self.app.states.get_string(id) {
                Ok(value) => println!("  {} = {}", id, value),
                Err(e) => println!("  {}", e),
            },
            Command::Layers => {
                let active = self.app.layers.active_layer.get();
                for layer in self.app.layers.layers() {
                    let marker = if Some(layer.id()) == active { "*" } else { " " };
                    println!(
                        " {} {} '{}' {:?} {}",
                        marker,
                        layer.id(),
                        layer.name.get(),
                        layer.dims(),
                        if layer.is_locked() { "(locked)" } else { "" }
                    );
                }
            }
            Command::Windows => println!("  {}", self.app.interface.windowids().join(" ")),
            Command::Quit => return Ok(Flow::Quit),
            Command::Action(text) => {
                self.issued += 1;
                let context = PrintContext {
                    label: self.issued.to_string(),
                };
                self.registry.dispatch_string(text, &self.app, Box::new(context))?;
                // Let the outcome print before the next prompt. Parked actions
                // report later, when they run.
                self.app.dispatcher.sync();
            }
        }
        Ok(Flow::Continue)
    }
}

fn run(script: Option<PathBuf>) -> Result<(), CommandError> {
    let config = Config::load();
    let dispatcher = ActionDispatcher::spawn(&config)?;
    let app = AppState::new(&config, dispatcher.handle());
    let watcher = app.states.watch(|id, value| println!("  {} -> {}", id, value));

    let mut console = Console {
        app,
        registry: ActionRegistry::with_builtin_actions(),
        issued: 0,
    };

    let interactive = script.is_none();
    let input: Box<dyn BufRead> = match &script {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    if interactive {
        println!("lamina console; 'help' lists commands");
        prompt()?;
    }
    let mut result = Ok(());
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        match console.execute(&line) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            // Already reported through the context.
            Err(_) if interactive => {}
            Err(source) => {
                result = Err(CommandError::Script { line: index + 1, source });
                break;
            }
        }
        if interactive {
            prompt()?;
        }
    }

    // Let whatever is still queued print before shutting down.
    console.app.dispatcher.sync();
    console.app.states.unwatch(watcher);
    dispatcher.shutdown();
    result
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let script = args
        .iter()
        .position(|a| a == "--script")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    match run(script) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lamina: {}", e);
            ExitCode::FAILURE
        }
    }
}
