#[tokio::main]
async fn main() {
    facade_backend::run().await;
}
