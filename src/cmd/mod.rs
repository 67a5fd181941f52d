//! CLI command implementations.
//!
//! | Module    | Commands handled    |
//! |-----------|---------------------|
//! | `serve`   | `Serve`, `InitDb`   |
//! | `plans`   | `Plans`             |
//! | `config`  | `Config`            |

pub mod config;
pub mod plans;
pub mod serve;

pub use config::cmd_config;
pub use plans::cmd_plans;
pub use serve::{cmd_init_db, cmd_serve};
