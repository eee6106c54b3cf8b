//! Worker CLI surface (§6 "CLI (worker)"): five positionals plus the retry/
//! archive/resend/toggle flags the supervisor passes on every invocation.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "afd_sender", version, about = "Per-connection FTP/FTPS sender worker")]
pub struct Args {
    /// Staging directory this invocation owns for the life of the batch.
    pub work_dir: PathBuf,
    /// Job id, echoed into every output/delete log record.
    pub job_no: u32,
    /// Identifies which Host Status table entry this invocation targets.
    pub host_status_id: u32,
    /// Index of this invocation's Job Status Slot within that host entry.
    pub host_status_pos: u32,
    /// Message file name under `work_dir` describing the destination.
    pub msg_name: String,

    /// Files older than now minus this many seconds are pre-deleted, locally
    /// and remotely, rather than sent.
    #[arg(short = 'a', long = "age-limit")]
    pub age_limit: Option<u32>,

    /// Disable archiving; delivered files are unlinked instead.
    #[arg(short = 'A', long = "no-archive")]
    pub no_archive: bool,

    /// This is a retry attempt; value is the prior attempt count.
    #[arg(short = 'o', long = "retries", default_value_t = 0)]
    pub retries: u32,

    /// Resend from archive rather than from the staging directory.
    #[arg(short = 'r', long = "resend")]
    pub resend: bool,

    /// Use the host's temporary toggle hostname for this invocation.
    #[arg(short = 't', long = "toggle")]
    pub toggle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_positionals() {
        let args = Args::parse_from(["afd_sender", "/spool/job17", "17", "3", "0", "job17.msg"]);
        assert_eq!(args.work_dir, PathBuf::from("/spool/job17"));
        assert_eq!(args.job_no, 17);
        assert_eq!(args.host_status_id, 3);
        assert_eq!(args.host_status_pos, 0);
        assert_eq!(args.msg_name, "job17.msg");
        assert_eq!(args.retries, 0);
        assert!(!args.no_archive);
    }

    #[test]
    fn parses_optional_flags() {
        let args = Args::parse_from([
            "afd_sender",
            "/spool/job17",
            "17",
            "3",
            "0",
            "job17.msg",
            "-a",
            "3600",
            "-A",
            "-o",
            "2",
            "-r",
            "-t",
        ]);
        assert_eq!(args.age_limit, Some(3600));
        assert!(args.no_archive);
        assert_eq!(args.retries, 2);
        assert!(args.resend);
        assert!(args.toggle);
    }
}
