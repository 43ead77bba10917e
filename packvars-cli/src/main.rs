use clap::Parser;
use packvars_cli::{
    commands::{Command, CommandHandler},
    ctx::{AppContext, GlobalArgs},
};

#[derive(Debug, Parser)]
#[command(name = "packvars", author, version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.global.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(format!("packvars={level},packvars_cli={level}")),
    )
    .init();

    let ctx = AppContext::from_args(&cli.global).await?;
    CommandHandler::handle(&ctx, cli.command).await
}
