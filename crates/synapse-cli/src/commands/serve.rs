use synapse_config::ConfigLoader;
use synapse_server::bootstrap;
use tracing::info;

pub(super) async fn cmd_serve(
    config_loader: ConfigLoader,
    listen: Option<String>,
) -> synapse_core::Result<()> {
    let mut config = config_loader.get();
    if let Some(listen) = listen {
        config.server.listen = listen;
    }

    println!("Synapse v{}", env!("CARGO_PKG_VERSION"));
    println!("   Listen: {}", config.server.listen);
    println!("   Store: {:?}", config.store.backend);
    println!("   Model: {}", config.generator.model);
    println!("   Relay: {:?}", config.relay.mode);
    println!();

    let db_path = config_loader.db_path();
    let directory = bootstrap::build_directory(&config, &db_path)?;
    info!(db_path = %db_path.display(), "mesh ready");

    synapse_server::start_server(config.server.clone(), directory).await
}
