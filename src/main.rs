use clap::Parser;
use payops_core::cli::{self, Cli, Commands, DbCommands, UserCommands};
use payops_core::config::Config;
use payops_core::startup::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command {
        None => cli::handle_serve(config, false).await,
        Some(Commands::Serve { ephemeral }) => cli::handle_serve(config, ephemeral).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Users(UserCommands::Create(args))) => {
            cli::handle_users_create(&config, args).await
        }
        Some(Commands::Config) => cli::handle_config_validate(&config).await,
    }
}
