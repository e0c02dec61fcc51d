use clap::Parser;
use torii::cli::Cli;
use torii::config::Config;
use torii::error::ToriiError;
use torii::net::Server;

fn main() -> Result<(), ToriiError> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    config.apply_overrides(cli.bind, cli.schemas.clone());

    let mut server = Server::bind(&config)?;
    log::info!(
        "torii listening on {} (schemas: {:?}, {} message type(s) registered)",
        config.bind,
        config.schemas_dir,
        server.registry().schema_count()
    );
    server.run()?;
    Ok(())
}
