pub mod fetcher;
pub mod orchestrator;
pub mod persister;
pub mod poller;
pub mod schema;
pub mod storage;
pub mod submitter;
