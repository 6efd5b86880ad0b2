use pipestep::Result;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pipestep::cli::run().await
}
