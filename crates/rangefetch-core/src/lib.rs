pub mod budget;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod fetch_head;
pub mod fetcher;
pub mod keywords;
pub mod logging;
pub mod protocol;
pub mod router;
pub mod segmenter;
