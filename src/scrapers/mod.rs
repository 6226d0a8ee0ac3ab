pub mod http;
pub mod runner;
pub mod traits;

pub use http::HttpFetcher;
pub use runner::{FetchFailure, RunReport, ScrapeRunner};
pub use traits::PageFetcher;
