pub mod command_task;
pub mod poll_task;
