pub mod logging;
pub mod shell;

pub use shell::{run, App, AppError, AppResult};
