use plinth::{Server, routes};
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port = std::env::var("PORT")
        .ok()
        .map(|raw| match raw.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                warn!(%raw, "ignoring unparseable PORT, using 3000");
                3000
            }
        })
        .unwrap_or(3000);

    if let Err(e) = Server::bind(&format!("0.0.0.0:{port}")).serve(routes::app()).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
