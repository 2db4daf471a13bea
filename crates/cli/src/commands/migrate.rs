use crate::commands::{run_with_database, CommandResult};

pub fn run() -> CommandResult {
    run_with_database("migrate", |_config, _pool| async {
        Ok(CommandResult::success("migrate", "applied pending migrations"))
    })
}
