use rtg_server::{ServerBuilder, config::loader, init_tracing};

#[tokio::main]
async fn main() {
    let upstream_arg = std::env::args().nth(1);

    let config = match loader::load_config(upstream_arg.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    let server = match ServerBuilder::new().with_config(config).build().await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "failed to start gateway");
            std::process::exit(1);
        }
    };

    if let Err(err) = server.run().await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }
}
