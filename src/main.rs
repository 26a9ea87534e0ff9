#[tokio::main]
async fn main() -> anyhow::Result<()> {
    studyforge_rust::run().await
}
