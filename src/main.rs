use std::io::Write;
use std::process;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use xpathfinder::assistant::AssistantClient;
use xpathfinder::buffer::BufferKind;
use xpathfinder::cli::{Cli, VerbosityLevel};
use xpathfinder::config::{Config, ConfigManager, SystemEnvProvider};
use xpathfinder::output::Output;
use xpathfinder::repl::{Command, HELP};
use xpathfinder::script::CommandRunner;
use xpathfinder::session::Session;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(2);
    }

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;

    let verbosity = effective_verbosity(&cli, &config);
    init_tracing(verbosity);

    let output = Output::new(verbosity)
        .with_colors(atty::is(atty::Stream::Stdout) && !config.display.no_color);
    let mut session = Session::new();

    if let Some(file) = &cli.file {
        session
            .load(file)
            .with_context(|| format!("Failed to load {}", file.display()))?;
    }

    if cli.is_one_shot() {
        return Ok(one_shot(&cli, &mut session, &output));
    }

    repl(&config, &mut session, &output).await?;
    Ok(0)
}

fn effective_verbosity(cli: &Cli, config: &Config) -> VerbosityLevel {
    match cli.verbosity() {
        VerbosityLevel::Normal if config.display.quiet => VerbosityLevel::Quiet,
        VerbosityLevel::Normal if config.display.verbose => VerbosityLevel::Verbose,
        level => level,
    }
}

fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// `-x` / `--structure`: print and exit with 0 on success, 1 on error
fn one_shot(cli: &Cli, session: &mut Session, output: &Output) -> i32 {
    let mut code = 0;

    if cli.structure {
        match session.structure() {
            Ok(outline) => print!("{}", outline),
            Err(err) => {
                eprintln!("{}", output.format_error(&err));
                code = 1;
            }
        }
    }

    if let Some(expression) = &cli.expression {
        session.buffer_mut(BufferKind::Expression).set_text(expression.clone());
        match session.run_expression() {
            Ok(Some(evaluation)) => {
                for line in &evaluation.rendered {
                    println!("{}", line);
                }
            }
            Ok(None) => {}
            Err(err) => {
                eprintln!("{}", output.format_error(&err));
                code = 1;
            }
        }
    }

    code
}

async fn repl(config: &Config, session: &mut Session, output: &Output) -> Result<()> {
    let mut runner = CommandRunner::new(config.script.program.clone(), config.script.args.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("{}", output.format_notice("xpathfinder: type :help for commands"));
    loop {
        print!("xpathfinder> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        execute(command, config, session, &mut runner, output).await;
    }
    Ok(())
}

async fn execute(
    command: Command,
    config: &Config,
    session: &mut Session,
    runner: &mut CommandRunner,
    output: &Output,
) {
    let result: xpathfinder::Result<()> = match command {
        Command::Evaluate(expression) => {
            session.buffer_mut(BufferKind::Expression).set_text(expression);
            evaluate(session, output)
        }
        Command::Rerun => evaluate(session, output),
        Command::Open(path) => session.load(&path).map(|()| {
            print!("{}", output.format_notice(&format!("Loaded {}", path.display())));
            if let Some(prefix) = session.document().and_then(|loaded| loaded.default_prefix()) {
                print!(
                    "{}",
                    output.format_notice(&format!("Default namespace prefix: {}", prefix))
                );
            }
        }),
        Command::ShowNamespaces => {
            match session.document().and_then(|loaded| loaded.namespaces()) {
                Some(namespaces) => {
                    for (prefix, uri) in namespaces.iter() {
                        println!("{} = {}", prefix, uri);
                    }
                }
                None => print!("{}", output.format_notice("No default namespace")),
            }
            Ok(())
        }
        Command::RenamePrefix(prefix) => session.set_prefix(&prefix),
        Command::Undo(kind) => {
            session.buffer_mut(kind).undo();
            show_buffer(session, kind);
            Ok(())
        }
        Command::Redo(kind) => {
            session.buffer_mut(kind).redo();
            show_buffer(session, kind);
            Ok(())
        }
        Command::Clear(kind) => {
            session.buffer_mut(kind).clear();
            Ok(())
        }
        Command::ShowScript => {
            show_buffer(session, BufferKind::Script);
            Ok(())
        }
        Command::SetScript(script) => {
            session.buffer_mut(BufferKind::Script).set_text(script);
            Ok(())
        }
        Command::Exec => exec(session, runner, output),
        Command::Ask(prompt) => ask(prompt, config, session, runner, output).await,
        Command::Structure => session.structure().map(|outline| print!("{}", outline)),
        Command::Save(path) => session.save(&path).map(|()| {
            print!("{}", output.format_notice(&format!("Saved {}", path.display())));
        }),
        Command::ShowLog => {
            print!("{}", output.format_log(session.log()));
            Ok(())
        }
        Command::ClearLog => {
            session.clear_log();
            Ok(())
        }
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Quit => Ok(()),
    };

    if let Err(err) = result {
        eprintln!("{}", output.format_error(&err));
    }
}

fn show_buffer(session: &Session, kind: BufferKind) {
    println!("[{}] {}", kind, session.buffer(kind).text());
}

fn evaluate(session: &mut Session, output: &Output) -> xpathfinder::Result<()> {
    if let Some(evaluation) = session.run_expression()? {
        print!(
            "{}",
            output.format_evaluation(
                &evaluation.expression,
                &evaluation.rendered.join("\n"),
                evaluation.len()
            )
        );
    }
    Ok(())
}

fn exec(
    session: &mut Session,
    runner: &mut CommandRunner,
    output: &Output,
) -> xpathfinder::Result<()> {
    if let Some(result) = session.run_script(runner)? {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
        if result.document.is_some() {
            print!("{}", output.format_notice("Document updated by script"));
        }
    }
    Ok(())
}

async fn ask(
    prompt: String,
    config: &Config,
    session: &mut Session,
    runner: &mut CommandRunner,
    output: &Output,
) -> xpathfinder::Result<()> {
    session.buffer_mut(BufferKind::Query).set_text(prompt);
    let Some(request) = session.assistant_request(config.assistant.sample_bytes)? else {
        return Ok(());
    };

    let client = AssistantClient::from_env(config.assistant.clone(), &SystemEnvProvider)?;
    let reply = client.ask(&request).await?;
    let applied = session.apply_reply(reply);

    if let Some(text) = &applied.text {
        println!("{}", text);
    }
    if applied.expression {
        show_buffer(session, BufferKind::Expression);
        if session.document().is_some() {
            evaluate(session, output)?;
        }
    }
    if applied.script {
        show_buffer(session, BufferKind::Script);
        if session.document().is_some() {
            exec(session, runner, output)?;
        }
    }
    Ok(())
}
