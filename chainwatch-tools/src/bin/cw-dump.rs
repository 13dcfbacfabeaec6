// cw-dump
//
// Prints every decoded feed frame as one line, for eyeballing a feed or
// capturing it to a file. With -b, also prints a line whenever a chain's
// best height moves.

use chainwatch::alert::{MemStore, PreferenceSet, Silent};
use chainwatch::engine::Dashboard;
use chainwatch::feed::conn::Status;
use chainwatch::feed::{Conn, FeedEvent, Frame};
use chainwatch::util::unix_now;
use chainwatch_tools::{cw_opts, cw_parseopts};
use chrono::Local;

fn stamp() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

fn main() {
    let mut opts = cw_opts();
    opts.optflag("h", "help", "Show help");
    opts.optflag("b", "best", "Also print best-height changes");

    let args: Vec<String> = std::env::args().collect();
    let (matches, origin, _prefs_path) = cw_parseopts(&opts, &args);
    if matches.opt_present("help") {
        let program = args.first().map(String::as_str).unwrap_or("cw-dump");
        let brief = format!("Usage: {program} [options]\n\nDump feed frames as text.");
        eprintln!("{}", opts.usage(&brief));
        std::process::exit(0);
    }
    let show_best = matches.opt_present("best");

    let conn = match Conn::new(&origin) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("Bad origin {:?}: {:?}", origin, err);
            std::process::exit(1);
        }
    };

    // Dump runs are throwaway; don't touch the real preference file.
    let mut board = Dashboard::new(PreferenceSet::load(MemStore::new()), Silent);

    for event in conn.iter() {
        match event {
            FeedEvent::Frame(frame) => {
                match &frame {
                    Frame::Init { sources, chains } => {
                        println!(
                            "[{}] init: {} sources, {} chains",
                            stamp(),
                            sources.len(),
                            chains.len()
                        );
                    }
                    Frame::Update(update) => {
                        println!(
                            "[{}] {} {} height={} hash={} ts={}",
                            stamp(),
                            update.chain,
                            update.source,
                            update.height,
                            update.hash,
                            update.ts
                        );
                    }
                    Frame::Unknown(tag) => {
                        eprintln!("[{}] skipping unknown frame type {:?}", stamp(), tag);
                    }
                }
                let chain = match &frame {
                    Frame::Update(update) => Some(update.chain.clone()),
                    _ => None,
                };
                match board.handle_frame(frame) {
                    Ok(Some(delta)) => {
                        if show_best && delta.best_height_changed {
                            if let Some(chain) = chain {
                                let best = board.snapshot(unix_now()).best_observations();
                                if let Some(observation) = best.get(&chain) {
                                    println!(
                                        "[{}] best {} = {} ({})",
                                        stamp(),
                                        chain,
                                        observation.height,
                                        observation.hash
                                    );
                                }
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        eprintln!("[{}] dropped update: {:?}", stamp(), err);
                    }
                }
            }
            FeedEvent::Status(status) => {
                eprintln!("[{}] conn: {:?}", stamp(), status);
                if let Status::Exiting = status {
                    break;
                }
            }
        }
    }
}
