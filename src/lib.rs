pub mod chart;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod html;
pub mod http_client;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod provider;
pub mod snapshot;
pub mod source;
pub mod state;
pub mod table;
