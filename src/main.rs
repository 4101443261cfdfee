use reddit_inline::app::{self, PreviewFormat};

const HELP: &str = "RIC: Reddit Inline Comments.

Usage:
  ric [--outline] <permalink>          Render a post's inline comments (HTML by default)
  ric vote <thing_id> <up|down|none>   Set the vote on a comment (t1_...) or post

Options:
  --outline            Print an indented text outline instead of HTML
  --version, -V        Show version and exit
  --help,    -h        Show this help message

Configuration is read from ~/.config/reddit-inline/config.yaml and RIC_* variables,
e.g. RIC_REDDIT__COOKIE for the session cookie used when voting.";

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if handle_cli_flags(&args) {
        return;
    }

    if let Err(err) = run(&args) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags(args: &[String]) -> bool {
    let mut saw_flag = false;
    for arg in args {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("RIC {}", reddit_inline::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let cfg = app::load_config()?;
    let services = app::connect(&cfg)?;

    match args.first().map(String::as_str) {
        Some("vote") => {
            let (Some(thing_id), Some(direction)) = (args.get(1), args.get(2)) else {
                anyhow::bail!("usage: ric vote <thing_id> <up|down|none>");
            };
            let state = app::parse_vote_state(direction)?;
            app::vote(&services, thing_id, state)?;
            println!("{} set to {}", thing_id, state.as_str());
        }
        _ => {
            let outline = args.iter().any(|arg| arg == "--outline");
            let Some(permalink) = args.iter().find(|arg| !arg.starts_with("--")) else {
                anyhow::bail!("usage: ric [--outline] <permalink>");
            };
            let format = if outline {
                PreviewFormat::Outline
            } else {
                PreviewFormat::Html
            };
            print!("{}", app::preview(&cfg, &services, permalink, format)?);
        }
    }
    Ok(())
}
