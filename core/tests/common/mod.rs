//! Shared harness: the mock server on a random local port.

use std::net::SocketAddr;

use cloud_sdk_core::{HcHttpClient, TokenCredentials};

pub const PROJECT_ID: &str = "p1";

/// Start the mock server on its own runtime thread and return its address.
pub fn spawn_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

pub fn endpoint(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

/// A client for `addr` authenticated for [`PROJECT_ID`].
pub fn client(addr: SocketAddr) -> HcHttpClient {
    HcHttpClient::builder()
        .with_endpoints([endpoint(addr)])
        .with_credentials(TokenCredentials::new("test-token").with_project_id(PROJECT_ID))
        .build()
        .unwrap()
}
