//! Per-connection FTP/FTPS sender worker for an Automatic File Distribution
//! agent: one process invocation delivers a staged batch of files to one
//! configured peer and exits with a taxonomy-coded status the supervisor
//! consumes to decide the next retry (see `SPEC_FULL.md`).

pub mod archive;
pub mod cli;
pub mod control;
pub mod dedup;
pub mod ftp;
pub mod logs;
pub mod message;
pub mod rate;
pub mod ssp;
pub mod taxonomy;
pub mod worker;
