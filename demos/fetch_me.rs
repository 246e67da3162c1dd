use bearer_dispatch::{Config, Dispatcher, RequestDescriptor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the example
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    // Reads DISPATCH_REFRESH_URL, DISPATCH_BASE_URL, DISPATCH_TOKEN_PATH, ...
    let dispatcher = Dispatcher::from_config(Config::from_env()?)?;

    let mut loading = dispatcher.loading();
    tokio::spawn(async move {
        while loading.changed().await.is_ok() {
            let busy = *loading.borrow_and_update();
            tracing::info!(busy, "loading");
        }
    });

    let (me, profile) = tokio::join!(
        dispatcher.get("/me"),
        dispatcher.execute(RequestDescriptor::get("/profile").with_query("fields", "name")),
    );
    println!("me: {}", me?.body);
    println!("profile: {}", profile?.body);
    Ok(())
}
