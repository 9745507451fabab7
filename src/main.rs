use parentscan::cli::Cli;

fn main() {
    if let Err(err) = Cli::handle_command_line() {
        eprintln!("Fatal error: {}", err);
        std::process::exit(1);
    }
}
