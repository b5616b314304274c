//! CLI entry point: parse arguments, wire up logging and Ctrl-C, build the
//! default static-file router, and run the reactor until told to stop.

use std::sync::atomic::Ordering;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webserv::config::Args;
use webserv::reactor::Server;
use webserv::router::StaticFileRouter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() {
    init_logging();
    let args = Args::parse_cli();

    let router = match StaticFileRouter::new(&args.web_root_path, args.browse_enabled) {
        Ok(router) => router,
        Err(e) => {
            error!(error = %e, "failed to initialize router");
            std::process::exit(1);
        }
    };

    let mut server = match Server::new(args.port, args.conn_timeout, Box::new(router)) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    let stop_flag = server.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        stop_flag.store(true, Ordering::SeqCst);
    }) {
        error!(error = %e, "failed to install signal handler");
        std::process::exit(1);
    }

    info!(port = args.port, root = %args.web_root_path.display(), "listening");
    match server.run() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!(error = %e, "server exited with error");
            std::process::exit(1);
        }
    }
}
