use clinic_services::ServiceKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clinic_services::run(ServiceKind::Doctor).await
}
