//! Minimal server: `POST /hi` with `{"name":"imchuncai"}`.
//!
//! ```text
//! cargo run --example hello
//! curl -d '{"name":"imchuncai"}' localhost:8080/hi
//! {"success":true,"code":0,"data":{"message":"hello, imchuncai!"}}
//! ```

use serde::{Deserialize, Serialize};

use jsonhttp::config::LoggingConfig;
use jsonhttp::observability::init_logging;
use jsonhttp::{Envelope, Fault, JsonRequest, Server, ServerConfig};

#[derive(Deserialize)]
struct Hello {
    name: String,
}

#[derive(Serialize)]
struct Greeting {
    message: String,
}

async fn hello(request: JsonRequest) -> Result<Envelope<Greeting>, Fault> {
    let Hello { name } = request.decode()?;
    if name.is_empty() {
        return Err(Fault::bad_request("name is empty"));
    }
    Ok(Envelope::success(Greeting {
        message: format!("hello, {name}!"),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = init_logging(&LoggingConfig::default())?;

    Server::new(ServerConfig::new("0.0.0.0:8080", 3))?
        .handle("/hi", hello)
        .listen()
        .await?;
    Ok(())
}
