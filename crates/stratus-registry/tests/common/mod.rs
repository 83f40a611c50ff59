use axum::Router;
use axum::http::HeaderMap;
use tokio::net::TcpListener;

/// `admin:admin`
#[allow(dead_code)]
pub const BASIC_AUTH: &str = "Basic YWRtaW46YWRtaW4=";

pub struct TestServer {
    pub listener: TcpListener,
    pub base_url: String,
}

impl TestServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        Self { listener, base_url }
    }

    pub fn serve(self, app: Router) -> String {
        let TestServer { listener, base_url } = self;
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base_url
    }
}

/// An address nothing listens on
#[allow(dead_code)]
pub fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[allow(dead_code)]
pub fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(BASIC_AUTH)
}
