//! Binary entry point — everything lives in the library.

#[tokio::main]
async fn main() {
    answerglass::run().await;
}
