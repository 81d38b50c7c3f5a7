//! mcpchat CLI binary entry point.

use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use mcpchat::agent_loop::{Orchestrator, RunSummary};
use mcpchat::cli::{ChatArgs, Cli, Commands};
use mcpchat::config::ChatConfig;
use mcpchat::error::ChatError;
use mcpchat::provider::create_provider;
use mcpchat::session::{SessionKey, SessionStore};

#[tokio::main]
async fn main() {
    mcpchat::cli::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(ref args) => handle_chat(&cli, args).await,
        Commands::Tools => handle_tools(&cli).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_tools(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = mcpchat::cli::load_config(cli)?;
    let router = mcpchat::cli::build_router(&config).await?;
    for tool in router.catalog() {
        println!("{:<32} {}", tool.name, tool.description);
    }
    router.close_all().await;
    Ok(())
}

async fn handle_chat(cli: &Cli, args: &ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = mcpchat::cli::load_config(cli)?;
    args.apply(&mut config);
    config.validate()?;

    let provider = create_provider(&config.model, &config)?;
    let router = Arc::new(mcpchat::cli::build_router(&config).await?);
    let orchestrator = Orchestrator::new(
        provider,
        router.clone(),
        Arc::new(SessionStore::new()),
        config.orchestrator_options(),
    );
    let key = match args.created_at {
        Some(ts) => SessionKey::new(ts, &args.user),
        None => SessionKey::now(&args.user),
    };
    tracing::info!(session = %key, model = %config.model, tools = router.catalog().len(), "session ready");

    let result = match args.prompt {
        Some(ref prompt) => run_prompt(&orchestrator, &key, prompt, &config)
            .await
            .map(|_| ())
            .map_err(Into::into),
        None => repl(&orchestrator, &key, &config).await,
    };

    router.close_all().await;
    result
}

async fn repl(
    orchestrator: &Orchestrator,
    key: &SessionKey,
    config: &ChatConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("session {key} (empty line or Ctrl-D to quit)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            break;
        }
        match run_prompt(orchestrator, key, prompt, config).await {
            Ok(_) => {}
            Err(ChatError::Canceled) => eprintln!("(canceled)"),
            Err(e) => eprintln!("Error: {}", mcpchat::cli::describe_error(&e)),
        }
    }
    Ok(())
}

/// Run one prompt, printing fragments as they arrive. Ctrl-C disconnects.
async fn run_prompt(
    orchestrator: &Orchestrator,
    key: &SessionKey,
    prompt: &str,
    config: &ChatConfig,
) -> Result<RunSummary, ChatError> {
    let (sink, receiver) = mcpchat::sink::channel(config.queue_capacity, config.chunk_size);
    let disconnect = receiver.disconnect_handle();

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        let mut fragments = Box::pin(receiver.into_stream());
        while let Some(fragment) = fragments.next().await {
            stdout.write_all(fragment.as_bytes()).await?;
            stdout.flush().await?;
        }
        stdout.write_all(b"\n").await?;
        stdout.flush().await
    });

    let run = orchestrator.run_turn(key, prompt, sink);
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            disconnect.cancel();
            run.await
        }
    };

    match printer.await {
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to write output"),
        Err(e) => tracing::warn!(error = %e, "output task failed"),
        Ok(Ok(())) => {}
    }
    result
}
