#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mokuso_lib::run().await
}
