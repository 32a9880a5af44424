//! Local HTTP stand-ins for the remote services.

use axum::Router;

/// Bind a free port, build the app with its base URL, serve it in the background.
/// The server task is left running when the test ends.
pub async fn spawn_server(build: impl FnOnce(String) -> Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let base = format!("http://{}", listener.local_addr().expect("local_addr"));
    let app = build(base.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    base
}
