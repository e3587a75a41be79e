use std::process::ExitCode;

use surge_app::{DefaultEngineArgs, Engine, EngineArgs, fatal, launcher};

fn main() -> ExitCode {
    let args = DefaultEngineArgs::parse();

    let filter = if args.verbose() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match launcher::run_command(args.command(), args.assume_yes()) {
        Ok(true) => return ExitCode::SUCCESS,
        Ok(false) => {}
        Err(err) => return fatal(&err, None),
    }

    let mut engine = match Engine::new(&args) {
        Ok(engine) => engine,
        Err(err) => return fatal(&err, None),
    };
    if let Err(err) = engine.run() {
        let code = fatal(&err, Some(engine.resources_mut()));
        engine.shutdown();
        return code;
    }
    engine.shutdown();
    ExitCode::SUCCESS
}
