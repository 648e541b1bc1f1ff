use env_logger::{Builder, Env, Target};
use std::fs::File;
use std::path::Path;

/// Installs the global logger.
///
/// Records go to `log_file` when given (recreated on every start, then written
/// in order) and to stderr otherwise. `RUST_LOG` overrides the `info` default.
pub fn init(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let file = File::create(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}
