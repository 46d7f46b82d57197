#![forbid(unsafe_code)]

fn main() {
    keybridge_replay::init_tracing();
    if let Err(error) = keybridge_replay::run_from_env() {
        eprintln!("{error}");
        std::process::exit(error.exit_code());
    }
}
