//! HTTP execution boundary
//!
//! The pool never talks to the network directly. Each worker owns an
//! [`HttpExecutor`] created by an [`ExecutorFactory`] when the pool starts, so
//! workers share no mutable executor state.
//!
//! ## Architecture
//!
//! - [`HttpExecutor`]: performs one HTTP call and reports a structured
//!   [`HttpResponse`](crate::types::HttpResponse) or an
//!   [`ExecutorError`](crate::error::ExecutorError)
//! - [`ExecutorFactory`]: builds one executor per worker
//! - [`ReqwestExecutor`] / [`ReqwestExecutorFactory`]: default implementation on top of reqwest
//!
//! ## Usage
//!
//! ```no_run
//! use http_batch::executor::{HttpExecutor, HttpRequest, ReqwestExecutor};
//! use http_batch::config::ApiConfig;
//! use http_batch::HttpMethod;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = ReqwestExecutor::new(&ApiConfig::default())?;
//!     let request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/users/1".parse()?);
//!     let response = executor.execute(&request).await?;
//!     println!("HTTP {}", response.status_code);
//!     Ok(())
//! }
//! ```

mod http_client;
mod traits;

pub use http_client::{ReqwestExecutor, ReqwestExecutorFactory};
pub use traits::{ExecutorFactory, HttpExecutor, HttpRequest, build_url};
