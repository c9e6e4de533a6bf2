#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();
    nlsql_gateway::gateway::run().await
}
