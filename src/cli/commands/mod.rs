mod check_config;
mod init;
mod points;

pub use check_config::cmd_check_config;
pub use init::cmd_init;
pub use points::cmd_points;
