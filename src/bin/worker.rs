#[tokio::main]
async fn main() -> anyhow::Result<()> {
    studyforge_rust::run_worker().await
}
