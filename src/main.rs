#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    activity_report_server::run().await
}
