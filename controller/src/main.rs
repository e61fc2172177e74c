mod host;
mod registry;
mod sink;
mod store;
mod zone;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
