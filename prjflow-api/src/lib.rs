// PrjFlow API Library
//
// HTTP surface of the WeChat sign-in flows

pub mod http;

pub use http::{create_router, AppState};
