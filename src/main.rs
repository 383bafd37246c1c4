fn main() {
    if handle_cli_flags() {
        return;
    }

    if let Err(err) = threadview::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("threadview {}", threadview::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "threadview - print a discussion thread the way a reader would see it.\n\n\
                     Usage: threadview [OPTIONS] (<SNAPSHOT> | --demo SEED)\n\n  \
                     --mode M             threaded, timeline or gallery\n  \
                     --sub S              all, new or latest\n  \
                     --cover              include the thread's cover post in gallery mode\n  \
                     --all                keep loading until the whole thread is displayed\n  \
                     --category C         only show posts in category C (repeatable)\n  \
                     --exclude N          hide posts carrying content notice N (repeatable)\n  \
                     --config PATH        read settings from PATH\n  \
                     --demo SEED          render a generated thread\n  \
                     --version, -V        Show version and exit\n  \
                     --help,    -h        Show this help message"
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
