pub mod cli;
pub mod client;
pub mod dashboard;
pub mod errors;
pub mod models;
pub mod poller;
pub mod progress;
pub mod state;
pub mod uploader;
pub mod video_list;

#[cfg(test)]
mod testing;
