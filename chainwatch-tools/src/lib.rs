use std::path::PathBuf;

use chainwatch::alert::FileStore;
use chainwatch::feed::ws;
use getopts::Options;

/// Options shared by every tool: where the dashboard feed lives and
/// where alert preferences are kept.
pub fn cw_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt(
        "r",
        "",
        &format!("dashboard origin (default {})", ws::default_origin()),
        "origin",
    );
    opts.optopt(
        "p",
        "",
        "alert preference file (default ~/.chainwatch-alerts.json)",
        "path",
    );
    opts
}

pub fn cw_parseopts(opts: &Options, args: &[String]) -> (getopts::Matches, String, PathBuf) {
    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            panic!("{}", failure.to_string())
        }
    };
    let origin = matches
        .opt_str("r")
        .unwrap_or_else(|| ws::default_origin().to_string());
    let prefs_path = matches
        .opt_str("p")
        .map(PathBuf::from)
        .unwrap_or_else(FileStore::default_path);
    (matches, origin, prefs_path)
}
